use super::{SinkError, post_json};
use crate::config::WebhookConfig;
use crate::enrich::{RequestMeta, UNKNOWN};
use crate::payload::ErrorReport;
use serde::Serialize;

/// Stack text beyond this many characters is cut from alerts.
pub const MAX_STACK_CHARS: usize = 500;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WebhookMessage {
    pub text: String,
}

/// Human-readable alert for a chat channel.
///
/// Reports carrying a stack trace are flagged critical, everything else is a
/// warning.
pub fn format_message(report: &ErrorReport, meta: &RequestMeta) -> WebhookMessage {
    let severity = match report.stack() {
        Some(_) => ":rotating_light: *CRITICAL* client error",
        None => ":warning: *WARNING* client error",
    };

    let user_agent = report
        .user_agent
        .as_deref()
        .or(meta.user_agent.as_deref())
        .unwrap_or(UNKNOWN);

    let mut text = format!(
        "{severity}\n*Message:* {}\n*URL:* {}\n*User Agent:* {}\n*Session:* {}\n*Time:* {}",
        report.message,
        report.url.as_deref().unwrap_or(UNKNOWN),
        user_agent,
        report.session_id.as_deref().unwrap_or(UNKNOWN),
        meta.timestamp_iso(),
    );

    if let Some(stack) = report.stack() {
        let excerpt: String = stack.chars().take(MAX_STACK_CHARS).collect();
        text.push_str("\n```");
        text.push_str(&excerpt);
        text.push_str("```");
    }

    WebhookMessage { text }
}

pub async fn send(
    client: &reqwest::Client,
    config: &WebhookConfig,
    message: &WebhookMessage,
) -> Result<(), SinkError> {
    post_json(client.post(config.url.clone()), message).await
}
