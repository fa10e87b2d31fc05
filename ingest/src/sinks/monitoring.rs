//! DataDog series API.

use super::{SinkError, post_json};
use crate::config::MonitoringConfig;
use crate::enrich::{RequestMeta, UNKNOWN};
use crate::payload::PerformanceMetric;
use serde::Serialize;

pub const METRIC_PREFIX: &str = "web.performance";

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SeriesPayload {
    pub series: Vec<Series>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Series {
    pub metric: String,
    /// `[unix seconds, value]` pairs
    pub points: Vec<(i64, f64)>,
    #[serde(rename = "type")]
    pub metric_type: &'static str,
    pub tags: Vec<String>,
}

pub fn series_name(metric_name: &str) -> String {
    format!("{METRIC_PREFIX}.{}", metric_name.to_lowercase())
}

/// One gauge point stamped with the second the request arrived.
pub fn series_payload(metric: &PerformanceMetric, meta: &RequestMeta) -> SeriesPayload {
    let rating = metric.rating.map(|r| r.as_str()).unwrap_or(UNKNOWN);
    let navigation_type = metric.navigation_type.as_deref().unwrap_or(UNKNOWN);

    SeriesPayload {
        series: vec![Series {
            metric: series_name(&metric.name),
            points: vec![(meta.received_at.timestamp(), metric.value)],
            metric_type: "gauge",
            tags: vec![
                format!("rating:{rating}"),
                format!("navigation_type:{navigation_type}"),
                format!("browser:{}", meta.browser()),
            ],
        }],
    }
}

pub async fn send(
    client: &reqwest::Client,
    config: &MonitoringConfig,
    payload: &SeriesPayload,
) -> Result<(), SinkError> {
    let request = client
        .post(config.endpoint.clone())
        .header("DD-API-KEY", &config.api_key);
    post_json(request, payload).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::Rating;
    use crate::testutils::{CaptureServer, test_client};
    use chrono::DateTime;
    use hyper::StatusCode;
    use hyper::header::HeaderMap;

    fn metric(name: &str) -> PerformanceMetric {
        PerformanceMetric {
            name: name.into(),
            value: 1834.2,
            rating: Some(Rating::Good),
            delta: None,
            id: None,
            navigation_type: Some("navigate".into()),
            session_id: None,
            user_id: None,
            timestamp: None,
        }
    }

    fn meta(user_agent: Option<&'static str>) -> RequestMeta {
        let mut headers = HeaderMap::new();
        if let Some(ua) = user_agent {
            headers.insert("user-agent", ua.parse().unwrap());
        }
        RequestMeta::observed_at(&headers, DateTime::from_timestamp(1_700_000_000, 0).unwrap())
    }

    #[test]
    fn test_series_payload() {
        let payload = series_payload(&metric("LCP"), &meta(Some("Mozilla/5.0 (X11; Linux)")));
        let series = &payload.series[0];

        assert_eq!(series.metric, "web.performance.lcp");
        assert_eq!(series.points, vec![(1_700_000_000, 1834.2)]);
        assert_eq!(
            series.tags,
            vec!["rating:good", "navigation_type:navigate", "browser:Mozilla/5.0"]
        );
    }

    #[test]
    fn test_defaults_to_unknown_tags() {
        let mut metric = metric("custom_timer");
        metric.rating = None;
        metric.navigation_type = None;

        let payload = series_payload(&metric, &meta(None));
        assert_eq!(payload.series[0].metric, "web.performance.custom_timer");
        assert_eq!(
            payload.series[0].tags,
            vec!["rating:unknown", "navigation_type:unknown", "browser:unknown"]
        );
    }

    #[tokio::test]
    async fn test_send_sets_api_key() {
        let server = CaptureServer::start(StatusCode::ACCEPTED).await;
        let config = MonitoringConfig {
            api_key: "dd-key".into(),
            endpoint: server.url("/api/v1/series"),
        };

        let payload = series_payload(&metric("TTFB"), &meta(None));
        send(&test_client(), &config, &payload).await.unwrap();

        let requests = server.requests().await;
        assert_eq!(requests[0].headers.get("dd-api-key").unwrap(), "dd-key");
        assert_eq!(
            requests[0].body,
            serde_json::json!({
                "series": [{
                    "metric": "web.performance.ttfb",
                    "points": [[1_700_000_000, 1834.2]],
                    "type": "gauge",
                    "tags": ["rating:good", "navigation_type:navigate", "browser:unknown"]
                }]
            })
        );
    }
}
