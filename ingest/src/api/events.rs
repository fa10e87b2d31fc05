use super::{Handler, SinkContext, log_record};
use crate::enrich::{Enriched, RequestMeta};
use crate::errors::IngestError;
use crate::fanout::{SinkOutcome, SinkTask};
use crate::payload::{AnalyticsEvent, parse_payload};
use crate::sinks::{SinkKind, analytics, product_analytics};
use async_trait::async_trait;
use hyper::body::Bytes;

/// Named analytics events, sent to GA4 and PostHog.
pub struct EventHandler {
    sinks: SinkContext,
}

impl EventHandler {
    pub fn new(sinks: SinkContext) -> Self {
        Self { sinks }
    }

    fn tasks(&self, event: &AnalyticsEvent, meta: &RequestMeta) -> Vec<SinkTask> {
        let config = self.sinks.config();
        let mut tasks = Vec::new();

        if let Some(ga) = &config.analytics {
            let batch = analytics::event_batch(event);
            let client = self.sinks.client().clone();
            let ga = ga.clone();
            tasks.push(SinkTask::new(SinkKind::Analytics, async move {
                analytics::send(&client, &ga, &batch).await
            }));
        }

        if let Some(posthog) = &config.product_analytics {
            let capture = product_analytics::capture_request(event, meta, &posthog.api_key);
            let client = self.sinks.client().clone();
            let posthog = posthog.clone();
            tasks.push(SinkTask::new(SinkKind::ProductAnalytics, async move {
                product_analytics::send(&client, &posthog, &capture).await
            }));
        }

        tasks
    }
}

#[async_trait]
impl Handler for EventHandler {
    fn name(&self) -> &'static str {
        "events"
    }

    async fn handle(
        &self,
        body: Bytes,
        meta: RequestMeta,
    ) -> Result<Vec<SinkOutcome>, IngestError> {
        let event: AnalyticsEvent = parse_payload(&body)?;
        let record = Enriched::new(event, meta);
        log_record(self.name(), &record)?;

        let tasks = self.tasks(&record.payload, &record.meta);
        Ok(self.sinks.fanout().execute(tasks).await)
    }
}
