//! Request bodies accepted by the ingest endpoints.
//!
//! Bodies are decoded in two steps: the raw JSON object is checked for the
//! required fields first, so a missing `message`/`name` or a non-numeric
//! `value` produces a precise 400, and only then decoded into the typed
//! record. Optional fields never reject a request: a value of the wrong type
//! is dropped.

use crate::errors::IngestError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Free-form event properties, kept in the order the client sent them.
pub type Properties = IndexMap<String, Value>;

/// Client-side timestamp, either epoch milliseconds or an ISO 8601 string.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ClientTimestamp {
    Millis(f64),
    Text(String),
}

impl ClientTimestamp {
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            ClientTimestamp::Millis(ms) => DateTime::from_timestamp_millis(*ms as i64),
            ClientTimestamp::Text(text) => parse_text_timestamp(text.trim()),
        }
    }

    /// ISO 8601 form, or `None` when the client value is not a valid instant.
    pub fn to_iso(&self) -> Option<String> {
        self.to_datetime()
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}

/// Offset-less text is taken as UTC; a bare date is midnight UTC.
fn parse_text_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Deserializers for optional fields that drop unusable values.
mod lenient {
    use super::*;

    /// `None` when the value does not fit `T`.
    pub fn optional<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(serde_json::from_value(value).ok())
    }

    /// Identifiers sent as strings or numbers, kept as strings.
    pub fn id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(id) => Some(id),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub message: String,
    #[serde(
        default,
        deserialize_with = "lenient::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub stack: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub filename: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub lineno: Option<u64>,
    #[serde(
        default,
        deserialize_with = "lenient::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub colno: Option<u64>,
    #[serde(
        default,
        deserialize_with = "lenient::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<ClientTimestamp>,
    #[serde(
        default,
        deserialize_with = "lenient::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub user_agent: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub url: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::id",
        skip_serializing_if = "Option::is_none"
    )]
    pub user_id: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::id",
        skip_serializing_if = "Option::is_none"
    )]
    pub session_id: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub component_stack: Option<String>,
}

impl ErrorReport {
    /// Stack text, treating an empty string as absent.
    pub fn stack(&self) -> Option<&str> {
        self.stack.as_deref().filter(|stack| !stack.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEvent {
    pub name: String,
    #[serde(
        default,
        deserialize_with = "lenient::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub properties: Option<Properties>,
    #[serde(
        default,
        deserialize_with = "lenient::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<ClientTimestamp>,
    #[serde(
        default,
        deserialize_with = "lenient::id",
        skip_serializing_if = "Option::is_none"
    )]
    pub user_id: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::id",
        skip_serializing_if = "Option::is_none"
    )]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rating {
    Good,
    NeedsImprovement,
    Poor,
}

impl Rating {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Rating::Good => "good",
            Rating::NeedsImprovement => "needs-improvement",
            Rating::Poor => "poor",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetric {
    pub name: String,
    pub value: f64,
    #[serde(
        default,
        deserialize_with = "lenient::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub rating: Option<Rating>,
    #[serde(
        default,
        deserialize_with = "lenient::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub delta: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient::id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub navigation_type: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::id",
        skip_serializing_if = "Option::is_none"
    )]
    pub session_id: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::id",
        skip_serializing_if = "Option::is_none"
    )]
    pub user_id: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::optional",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<ClientTimestamp>,
}

/// A request body with required fields checked ahead of typed decoding.
pub trait Payload: DeserializeOwned {
    fn check_required(object: &Map<String, Value>) -> Result<(), IngestError>;
}

impl Payload for ErrorReport {
    fn check_required(object: &Map<String, Value>) -> Result<(), IngestError> {
        require_non_empty_string(object, "message")
    }
}

impl Payload for AnalyticsEvent {
    fn check_required(object: &Map<String, Value>) -> Result<(), IngestError> {
        require_non_empty_string(object, "name")
    }
}

impl Payload for PerformanceMetric {
    fn check_required(object: &Map<String, Value>) -> Result<(), IngestError> {
        require_non_empty_string(object, "name")?;
        match object.get("value") {
            Some(Value::Number(_)) => Ok(()),
            _ => Err(IngestError::BadRequest(
                "Field 'value' must be a number".to_string(),
            )),
        }
    }
}

fn require_non_empty_string(object: &Map<String, Value>, field: &str) -> Result<(), IngestError> {
    match object.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Ok(()),
        _ => Err(IngestError::BadRequest(format!(
            "Missing required field: {field}"
        ))),
    }
}

/// Decodes and validates a request body.
pub fn parse_payload<T: Payload>(body: &[u8]) -> Result<T, IngestError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| IngestError::BadRequest(format!("Invalid JSON body: {e}")))?;

    let Value::Object(object) = value else {
        return Err(IngestError::BadRequest(
            "Request body must be a JSON object".to_string(),
        ));
    };

    T::check_required(&object)?;

    // Decoded from the raw bytes so objects keep the client's key order
    serde_json::from_slice(body)
        .map_err(|e| IngestError::BadRequest(format!("Invalid payload: {e}")))
}
