//! Third-party destinations for enriched payloads.
//!
//! Every sink module exposes a pure payload builder and an async `send`
//! taking the built payload and the sink's config. Failures are reported as
//! [`SinkError`] and never reach the caller of an ingest endpoint.

pub mod analytics;
pub mod error_tracking;
pub mod monitoring;
pub mod product_analytics;
pub mod webhook;

use reqwest::{RequestBuilder, StatusCode};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Longest error-body excerpt kept from a rejecting sink.
const MAX_ERROR_BODY_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SinkKind {
    ErrorTracking,
    Webhook,
    Analytics,
    ProductAnalytics,
    Monitoring,
}

impl SinkKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SinkKind::ErrorTracking => "error_tracking",
            SinkKind::Webhook => "webhook",
            SinkKind::Analytics => "analytics",
            SinkKind::ProductAnalytics => "product_analytics",
            SinkKind::Monitoring => "monitoring",
        }
    }
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("sink responded with {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("sink did not respond within {0:?}")]
    Timeout(Duration),

    #[error("sink task panicked: {0}")]
    Panicked(String),
}

/// Posts `body` as JSON and maps any non-2xx status to [`SinkError::Status`].
pub(crate) async fn post_json<T>(request: RequestBuilder, body: &T) -> Result<(), SinkError>
where
    T: Serialize + ?Sized,
{
    let response = request.json(body).send().await?;
    let status = response.status();

    if status.is_success() {
        return Ok(());
    }

    let body = response
        .text()
        .await
        .unwrap_or_default()
        .chars()
        .take(MAX_ERROR_BODY_CHARS)
        .collect();

    Err(SinkError::Status { status, body })
}
