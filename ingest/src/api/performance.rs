use super::{Handler, SinkContext, log_record};
use crate::enrich::{Enriched, RequestMeta};
use crate::errors::IngestError;
use crate::fanout::{SinkOutcome, SinkTask};
use crate::payload::{PerformanceMetric, parse_payload};
use crate::sinks::{SinkKind, analytics, monitoring};
use async_trait::async_trait;
use hyper::body::Bytes;

/// Web performance metrics.
///
/// Every metric becomes a DataDog gauge. Only Core Web Vitals are also sent
/// to GA4.
pub struct PerformanceHandler {
    sinks: SinkContext,
}

impl PerformanceHandler {
    pub fn new(sinks: SinkContext) -> Self {
        Self { sinks }
    }

    fn tasks(&self, metric: &PerformanceMetric, meta: &RequestMeta) -> Vec<SinkTask> {
        let config = self.sinks.config();
        let mut tasks = Vec::new();

        if let Some(ga) = &config.analytics
            && let Some(batch) = analytics::web_vitals_batch(metric)
        {
            let client = self.sinks.client().clone();
            let ga = ga.clone();
            tasks.push(SinkTask::new(SinkKind::Analytics, async move {
                analytics::send(&client, &ga, &batch).await
            }));
        }

        if let Some(datadog) = &config.monitoring {
            let payload = monitoring::series_payload(metric, meta);
            let client = self.sinks.client().clone();
            let datadog = datadog.clone();
            tasks.push(SinkTask::new(SinkKind::Monitoring, async move {
                monitoring::send(&client, &datadog, &payload).await
            }));
        }

        tasks
    }
}

#[async_trait]
impl Handler for PerformanceHandler {
    fn name(&self) -> &'static str {
        "metrics"
    }

    async fn handle(
        &self,
        body: Bytes,
        meta: RequestMeta,
    ) -> Result<Vec<SinkOutcome>, IngestError> {
        let metric: PerformanceMetric = parse_payload(&body)?;
        let record = Enriched::new(metric, meta);
        log_record(self.name(), &record)?;

        let tasks = self.tasks(&record.payload, &record.meta);
        Ok(self.sinks.fanout().execute(tasks).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AnalyticsConfig, MonitoringConfig, SinksConfig};
    use crate::testutils::{CaptureServer, test_client};
    use hyper::StatusCode;
    use hyper::header::HeaderMap;
    use std::time::Duration;

    struct Sinks {
        ga: CaptureServer,
        datadog: CaptureServer,
        handler: PerformanceHandler,
    }

    async fn sinks() -> Sinks {
        let ga = CaptureServer::start(StatusCode::NO_CONTENT).await;
        let datadog = CaptureServer::start(StatusCode::ACCEPTED).await;
        let config = SinksConfig {
            analytics: Some(AnalyticsConfig {
                measurement_id: "G-TEST".into(),
                api_secret: "secret".into(),
                endpoint: ga.url("/mp/collect"),
            }),
            monitoring: Some(MonitoringConfig {
                api_key: "dd".into(),
                endpoint: datadog.url("/api/v1/series"),
            }),
            ..Default::default()
        };
        let handler = PerformanceHandler::new(SinkContext::new(
            test_client(),
            config,
            Duration::from_secs(5),
        ));
        Sinks {
            ga,
            datadog,
            handler,
        }
    }

    fn meta() -> RequestMeta {
        RequestMeta::from_headers(&HeaderMap::new())
    }

    #[tokio::test]
    async fn test_core_web_vital_reaches_both() {
        let sinks = sinks().await;
        let body = br#"{"name":"LCP","value":2450.5,"rating":"needs-improvement"}"#;
        let outcomes = sinks
            .handler
            .handle(Bytes::from_static(body), meta())
            .await
            .unwrap();
        assert_eq!(outcomes.len(), 2);

        let ga_body = &sinks.ga.requests().await[0].body;
        assert_eq!(ga_body["events"][0]["name"], "web_vitals");
        assert_eq!(ga_body["events"][0]["params"]["metric_name"], "LCP");
        assert_eq!(ga_body["events"][0]["params"]["metric_rating"], "needs-improvement");

        let series = &sinks.datadog.requests().await[0].body["series"][0];
        assert_eq!(series["metric"], "web.performance.lcp");
        assert_eq!(series["points"][0][1], 2450.5);
    }

    #[tokio::test]
    async fn test_custom_metric_skips_analytics() {
        let sinks = sinks().await;
        let outcomes = sinks
            .handler
            .handle(
                Bytes::from_static(br#"{"name":"custom_timer","value":12}"#),
                meta(),
            )
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].kind, SinkKind::Monitoring);
        assert!(sinks.ga.requests().await.is_empty());
        assert_eq!(
            sinks.datadog.requests().await[0].body["series"][0]["metric"],
            "web.performance.custom_timer"
        );
    }

    #[tokio::test]
    async fn test_value_must_be_numeric() {
        let sinks = sinks().await;
        for body in [
            r#"{"name":"LCP","value":"fast"}"#,
            r#"{"name":"LCP","value":null}"#,
            r#"{"name":"LCP"}"#,
        ] {
            let result = sinks
                .handler
                .handle(Bytes::from(body.to_string()), meta())
                .await;
            match result {
                Err(IngestError::BadRequest(message)) => {
                    assert_eq!(message, "Field 'value' must be a number")
                }
                other => panic!("expected BadRequest for {body}, got {other:?}"),
            }
        }
        assert!(sinks.datadog.requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_zero_is_a_valid_value() {
        let sinks = sinks().await;
        let outcomes = sinks
            .handler
            .handle(Bytes::from_static(br#"{"name":"CLS","value":0}"#), meta())
            .await
            .unwrap();
        assert_eq!(outcomes.len(), 2);
    }
}
