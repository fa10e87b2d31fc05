//! PostHog capture API.

use super::{SinkError, post_json};
use crate::config::ProductAnalyticsConfig;
use crate::enrich::RequestMeta;
use crate::payload::{AnalyticsEvent, Properties};
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CaptureRequest {
    pub api_key: String,
    pub event: String,
    pub properties: Properties,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Distinct id used to stitch events to a person: user, then session.
fn distinct_id(event: &AnalyticsEvent) -> String {
    event
        .user_id
        .as_ref()
        .or(event.session_id.as_ref())
        .cloned()
        .unwrap_or_else(|| "anonymous".to_string())
}

/// Capture call carrying the raw event name and the caller's properties.
pub fn capture_request(event: &AnalyticsEvent, meta: &RequestMeta, api_key: &str) -> CaptureRequest {
    let mut properties = event.properties.clone().unwrap_or_default();
    properties.insert("distinct_id".into(), distinct_id(event).into());
    properties.insert("$ip".into(), meta.ip.clone().into());
    properties.insert("$user_agent".into(), meta.user_agent.clone().into());

    CaptureRequest {
        api_key: api_key.to_string(),
        event: event.name.clone(),
        properties,
        timestamp: event.timestamp.as_ref().and_then(|ts| ts.to_iso()),
    }
}

pub async fn send(
    client: &reqwest::Client,
    config: &ProductAnalyticsConfig,
    capture: &CaptureRequest,
) -> Result<(), SinkError> {
    post_json(client.post(config.endpoint.clone()), capture).await
}
