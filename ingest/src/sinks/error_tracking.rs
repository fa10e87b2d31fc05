use super::{SinkError, post_json};
use crate::config::ErrorTrackingConfig;
use crate::enrich::RequestMeta;
use crate::payload::ErrorReport;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

const PROTOCOL_VERSION: u8 = 7;
const CLIENT_NAME: &str = concat!("beacon/", env!("CARGO_PKG_VERSION"));

/// Event in the shape accepted by a Sentry-style store endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct StoreEvent {
    pub message: String,
    pub level: &'static str,
    pub platform: &'static str,
    pub timestamp: DateTime<Utc>,
    pub exception: ExceptionList,
    pub user: User,
    pub tags: BTreeMap<&'static str, String>,
    pub extra: BTreeMap<&'static str, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExceptionList {
    pub values: Vec<Exception>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Exception {
    #[serde(rename = "type")]
    pub exception_type: &'static str,
    pub value: String,
    pub stacktrace: Stacktrace,
}

#[derive(Debug, Clone, Serialize)]
pub struct Stacktrace {
    pub frames: Vec<Frame>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Frame {
    pub filename: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub ip_address: String,
}

/// One frame per stack line, in the order the browser printed them.
fn frames(stack: Option<&str>) -> Vec<Frame> {
    stack
        .map(|stack| {
            stack
                .lines()
                .map(|line| Frame {
                    filename: line.trim().to_string(),
                })
                .collect()
        })
        .unwrap_or_default()
}

pub fn build_event(report: &ErrorReport, meta: &RequestMeta) -> StoreEvent {
    let mut tags = BTreeMap::new();
    if let Some(session_id) = &report.session_id {
        tags.insert("sessionId", session_id.clone());
    }
    if let Some(component_stack) = &report.component_stack {
        tags.insert("componentStack", component_stack.clone());
    }

    let user_agent = report.user_agent.as_ref().or(meta.user_agent.as_ref());

    let mut extra = BTreeMap::new();
    extra.insert("url", report.url.clone().into());
    extra.insert("userAgent", user_agent.cloned().into());
    extra.insert("referer", meta.referer.clone().into());
    if let Some(filename) = &report.filename {
        extra.insert("filename", filename.clone().into());
    }
    if let Some(lineno) = report.lineno {
        extra.insert("lineno", lineno.into());
    }
    if let Some(colno) = report.colno {
        extra.insert("colno", colno.into());
    }

    StoreEvent {
        message: report.message.clone(),
        level: "error",
        platform: "javascript",
        timestamp: meta.received_at,
        exception: ExceptionList {
            values: vec![Exception {
                exception_type: "Error",
                value: report.message.clone(),
                stacktrace: Stacktrace {
                    frames: frames(report.stack()),
                },
            }],
        },
        user: User {
            id: report.user_id.clone(),
            ip_address: meta.ip.clone(),
        },
        tags,
        extra,
    }
}

fn auth_header(key: &str) -> String {
    format!(
        "Sentry sentry_version={PROTOCOL_VERSION}, sentry_key={key}, sentry_client={CLIENT_NAME}"
    )
}

pub async fn send(
    client: &reqwest::Client,
    config: &ErrorTrackingConfig,
    event: &StoreEvent,
) -> Result<(), SinkError> {
    let request = client
        .post(config.endpoint.clone())
        .header("X-Sentry-Auth", auth_header(&config.key));
    post_json(request, event).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::{CaptureServer, test_client};
    use hyper::StatusCode;
    use hyper::header::HeaderMap;

    fn report(stack: Option<&str>) -> ErrorReport {
        ErrorReport {
            message: "x is not a function".into(),
            stack: stack.map(str::to_string),
            filename: Some("https://example.com/app.js".into()),
            lineno: Some(12),
            colno: Some(7),
            timestamp: None,
            user_agent: None,
            url: Some("https://example.com/contact".into()),
            user_id: Some("u-42".into()),
            session_id: Some("s-1".into()),
            component_stack: None,
        }
    }

    fn meta() -> RequestMeta {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7".parse().unwrap());
        headers.insert("user-agent", "Mozilla/5.0 (X11; Linux)".parse().unwrap());
        RequestMeta::observed_at(&headers, DateTime::from_timestamp(0, 0).unwrap())
    }

    #[test]
    fn test_stack_split_into_frames() {
        let event = build_event(
            &report(Some("TypeError: x is not a function\n    at onClick (app.js:12:7)\n    at HTMLButtonElement.dispatch (vendor.js:3:100)")),
            &meta(),
        );

        let frames = &event.exception.values[0].stacktrace.frames;
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].filename, "TypeError: x is not a function");
        assert_eq!(frames[1].filename, "at onClick (app.js:12:7)");
    }

    #[test]
    fn test_event_shape() {
        let event = build_event(&report(None), &meta());
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["message"], "x is not a function");
        assert_eq!(value["platform"], "javascript");
        assert_eq!(value["exception"]["values"][0]["type"], "Error");
        assert_eq!(value["exception"]["values"][0]["value"], "x is not a function");
        assert_eq!(
            value["exception"]["values"][0]["stacktrace"]["frames"],
            serde_json::json!([])
        );
        assert_eq!(value["user"], serde_json::json!({"id": "u-42", "ip_address": "203.0.113.7"}));
        assert_eq!(value["tags"], serde_json::json!({"sessionId": "s-1"}));
        assert_eq!(value["extra"]["url"], "https://example.com/contact");
        // Falls back to the server-observed user agent
        assert_eq!(value["extra"]["userAgent"], "Mozilla/5.0 (X11; Linux)");
        assert_eq!(value["extra"]["referer"], serde_json::Value::Null);
        assert_eq!(value["extra"]["lineno"], 12);
    }

    #[tokio::test]
    async fn test_send_sets_auth_header() {
        let server = CaptureServer::start(StatusCode::OK).await;
        let config = ErrorTrackingConfig {
            endpoint: server.url("/api/42/store/"),
            key: "public-key".into(),
        };

        let event = build_event(&report(Some("Error\n  at a")), &meta());
        send(&test_client(), &config, &event).await.unwrap();

        let requests = server.requests().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].path, "/api/42/store/");
        let auth = requests[0].headers.get("x-sentry-auth").unwrap().to_str().unwrap();
        assert!(auth.starts_with("Sentry sentry_version=7, sentry_key=public-key"));
        assert_eq!(requests[0].body["message"], "x is not a function");
    }
}
