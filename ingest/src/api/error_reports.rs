use super::{Handler, SinkContext, log_record};
use crate::enrich::{Enriched, RequestMeta};
use crate::errors::IngestError;
use crate::fanout::{SinkOutcome, SinkTask};
use crate::payload::{ErrorReport, parse_payload};
use crate::sinks::{SinkKind, error_tracking, webhook};
use async_trait::async_trait;
use hyper::body::Bytes;

/// Client-side error reports.
///
/// Forwarded to the error tracker as a store event and to the alert webhook
/// as a formatted chat message.
pub struct ErrorReportHandler {
    sinks: SinkContext,
}

impl ErrorReportHandler {
    pub fn new(sinks: SinkContext) -> Self {
        Self { sinks }
    }

    fn tasks(&self, report: &ErrorReport, meta: &RequestMeta) -> Vec<SinkTask> {
        let config = self.sinks.config();
        let mut tasks = Vec::new();

        if let Some(tracker) = &config.error_tracking {
            let event = error_tracking::build_event(report, meta);
            let client = self.sinks.client().clone();
            let tracker = tracker.clone();
            tasks.push(SinkTask::new(SinkKind::ErrorTracking, async move {
                error_tracking::send(&client, &tracker, &event).await
            }));
        }

        if let Some(hook) = &config.webhook {
            let message = webhook::format_message(report, meta);
            let client = self.sinks.client().clone();
            let hook = hook.clone();
            tasks.push(SinkTask::new(SinkKind::Webhook, async move {
                webhook::send(&client, &hook, &message).await
            }));
        }

        tasks
    }
}

#[async_trait]
impl Handler for ErrorReportHandler {
    fn name(&self) -> &'static str {
        "errors"
    }

    async fn handle(
        &self,
        body: Bytes,
        meta: RequestMeta,
    ) -> Result<Vec<SinkOutcome>, IngestError> {
        let report: ErrorReport = parse_payload(&body)?;
        let record = Enriched::new(report, meta);
        log_record(self.name(), &record)?;

        let tasks = self.tasks(&record.payload, &record.meta);
        Ok(self.sinks.fanout().execute(tasks).await)
    }
}
