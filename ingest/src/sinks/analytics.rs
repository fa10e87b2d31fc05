//! GA4 Measurement Protocol.

use super::{SinkError, post_json};
use crate::config::AnalyticsConfig;
use crate::payload::{AnalyticsEvent, PerformanceMetric, Properties};
use serde::Serialize;

pub const ANONYMOUS_CLIENT: &str = "anonymous";
pub const WEB_VITALS_EVENT: &str = "web_vitals";

/// Metric names forwarded as `web_vitals` events.
pub const CORE_WEB_VITALS: &[&str] = &["CLS", "FCP", "FID", "INP", "LCP", "TTFB"];

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MeasurementBatch {
    pub client_id: String,
    pub events: Vec<MeasurementEvent>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MeasurementEvent {
    pub name: String,
    pub params: Properties,
}

/// Replaces every character outside `[A-Za-z0-9_]` with `_`.
pub fn sanitize_event_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub fn is_core_web_vital(name: &str) -> bool {
    CORE_WEB_VITALS.contains(&name)
}

fn client_id(session_id: Option<&String>) -> String {
    session_id
        .cloned()
        .unwrap_or_else(|| ANONYMOUS_CLIENT.to_string())
}

pub fn event_batch(event: &AnalyticsEvent) -> MeasurementBatch {
    MeasurementBatch {
        client_id: client_id(event.session_id.as_ref()),
        events: vec![MeasurementEvent {
            name: sanitize_event_name(&event.name),
            params: event.properties.clone().unwrap_or_default(),
        }],
    }
}

/// `web_vitals` event for a Core Web Vital, `None` for any other metric.
pub fn web_vitals_batch(metric: &PerformanceMetric) -> Option<MeasurementBatch> {
    if !is_core_web_vital(&metric.name) {
        return None;
    }

    let mut params = Properties::new();
    params.insert("metric_name".into(), metric.name.clone().into());
    params.insert("metric_value".into(), metric.value.into());
    if let Some(rating) = metric.rating {
        params.insert("metric_rating".into(), rating.as_str().into());
    }
    if let Some(delta) = metric.delta {
        params.insert("metric_delta".into(), delta.into());
    }
    if let Some(navigation_type) = &metric.navigation_type {
        params.insert("navigation_type".into(), navigation_type.clone().into());
    }

    Some(MeasurementBatch {
        client_id: client_id(metric.session_id.as_ref()),
        events: vec![MeasurementEvent {
            name: WEB_VITALS_EVENT.to_string(),
            params,
        }],
    })
}

pub async fn send(
    client: &reqwest::Client,
    config: &AnalyticsConfig,
    batch: &MeasurementBatch,
) -> Result<(), SinkError> {
    let request = client.post(config.endpoint.clone()).query(&[
        ("measurement_id", config.measurement_id.as_str()),
        ("api_secret", config.api_secret.as_str()),
    ]);
    post_json(request, batch).await
}
