pub mod error_reports;
pub mod events;
pub mod performance;
pub mod utils;

use crate::config::SinksConfig;
use crate::enrich::{Enriched, RequestMeta};
use crate::errors::IngestError;
use crate::fanout::{FanOut, SinkOutcome};
use async_trait::async_trait;
use hyper::body::Bytes;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Handler for a single ingest endpoint
///
/// The handler implements endpoint-specific logic:
/// - Validating the request body
/// - Enriching it with request metadata
/// - Choosing which configured sinks receive it, and in what shape
#[async_trait]
pub trait Handler: Send + Sync {
    fn name(&self) -> &'static str;

    /// Validate, enrich and fan out one request body.
    ///
    /// Returns the per-sink outcomes once every sink has finished. Sink
    /// failures are part of the outcomes, never an `Err`.
    async fn handle(
        &self,
        body: Bytes,
        meta: RequestMeta,
    ) -> Result<Vec<SinkOutcome>, IngestError>;
}

/// Outbound side shared by all handlers: HTTP client, destinations, fan-out.
#[derive(Clone)]
pub struct SinkContext {
    client: reqwest::Client,
    config: Arc<SinksConfig>,
    fanout: FanOut,
}

impl SinkContext {
    pub fn new(client: reqwest::Client, config: SinksConfig, sink_timeout: Duration) -> Self {
        Self {
            client,
            config: Arc::new(config),
            fanout: FanOut::new(sink_timeout),
        }
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn config(&self) -> &SinksConfig {
        &self.config
    }

    pub fn fanout(&self) -> &FanOut {
        &self.fanout
    }
}

/// Logs the enriched record as a single JSON field.
pub(crate) fn log_record<T: Serialize>(
    endpoint: &'static str,
    record: &Enriched<T>,
) -> Result<(), IngestError> {
    let json = serde_json::to_string(record).map_err(|e| {
        IngestError::InternalError(format!("Failed to serialize enriched record: {e}"))
    })?;
    tracing::info!(endpoint = endpoint, ip = %record.meta.ip, record = %json, "Ingested payload");
    Ok(())
}
