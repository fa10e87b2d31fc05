use chrono::{DateTime, SecondsFormat, Utc};
use http::HeaderMap;
use http::header::{REFERER, USER_AGENT};
use serde::Serialize;

pub const UNKNOWN: &str = "unknown";

/// Metadata observed at the server boundary for one request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestMeta {
    #[serde(rename = "serverTimestamp")]
    pub received_at: DateTime<Utc>,
    #[serde(rename = "serverUserAgent")]
    pub user_agent: Option<String>,
    pub ip: String,
    pub referer: Option<String>,
}

impl RequestMeta {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self::observed_at(headers, Utc::now())
    }

    pub fn observed_at(headers: &HeaderMap, received_at: DateTime<Utc>) -> Self {
        Self {
            received_at,
            user_agent: header_str(headers, USER_AGENT.as_str()).map(str::to_string),
            ip: resolve_client_ip(headers),
            referer: header_str(headers, REFERER.as_str()).map(str::to_string),
        }
    }

    pub fn timestamp_iso(&self) -> String {
        self.received_at
            .to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// First whitespace-delimited token of the user agent.
    pub fn browser(&self) -> &str {
        self.user_agent
            .as_deref()
            .and_then(|ua| ua.split_whitespace().next())
            .unwrap_or(UNKNOWN)
    }
}

/// Client address as reported by the proxy chain.
///
/// `x-forwarded-for` wins over `x-real-ip`; only the first (client-most)
/// entry of `x-forwarded-for` is used.
pub fn resolve_client_ip(headers: &HeaderMap) -> String {
    if let Some(forwarded) = header_str(headers, "x-forwarded-for")
        && let Some(first) = forwarded.split(',').map(str::trim).find(|ip| !ip.is_empty())
    {
        return first.to_string();
    }

    header_str(headers, "x-real-ip")
        .unwrap_or(UNKNOWN)
        .to_string()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// A client payload together with what the server saw when it arrived.
#[derive(Debug, Clone, Serialize)]
pub struct Enriched<T> {
    #[serde(flatten)]
    pub payload: T,
    #[serde(flatten)]
    pub meta: RequestMeta,
}

impl<T> Enriched<T> {
    pub fn new(payload: T, meta: RequestMeta) -> Self {
        Self { payload, meta }
    }
}
