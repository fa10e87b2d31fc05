use crate::metrics_defs::SINK_FAILURES;
use crate::sinks::{SinkError, SinkKind};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use tokio::task::{JoinError, JoinSet};
use tokio::time::{Duration, timeout};

pub type SinkFuture = Pin<Box<dyn Future<Output = Result<(), SinkError>> + Send + 'static>>;

/// One delivery to one sink.
pub struct SinkTask {
    kind: SinkKind,
    future: SinkFuture,
}

impl SinkTask {
    pub fn new<F>(kind: SinkKind, future: F) -> Self
    where
        F: Future<Output = Result<(), SinkError>> + Send + 'static,
    {
        Self {
            kind,
            future: Box::pin(future),
        }
    }
}

#[derive(Debug)]
pub struct SinkOutcome {
    pub kind: SinkKind,
    pub result: Result<(), SinkError>,
}

/// Runs sink deliveries concurrently, each inside its own failure boundary.
///
/// Every task is bounded by the same timeout. Failures, timeouts and panics
/// are logged and counted, then handed back as outcomes; they never abort
/// the other tasks.
#[derive(Clone, Debug)]
pub struct FanOut {
    timeout: Duration,
}

impl FanOut {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub async fn execute(&self, tasks: Vec<SinkTask>) -> Vec<SinkOutcome> {
        let mut join_set = JoinSet::new();
        let mut task_sinks = HashMap::new();

        for SinkTask { kind, future } in tasks {
            let limit = self.timeout;
            let handle = join_set.spawn(async move {
                let result = match timeout(limit, future).await {
                    Ok(result) => result,
                    Err(_) => Err(SinkError::Timeout(limit)),
                };
                (kind, result)
            });
            task_sinks.insert(handle.id(), kind);
        }

        let mut outcomes = Vec::with_capacity(task_sinks.len());

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((kind, result)) => outcomes.push(SinkOutcome { kind, result }),
                Err(e) => {
                    let Some(kind) = task_sinks.remove(&e.id()) else {
                        tracing::error!("Unknown sink task failed: {}", e);
                        continue;
                    };
                    outcomes.push(SinkOutcome {
                        kind,
                        result: Err(SinkError::Panicked(panic_message(e))),
                    });
                }
            }
        }

        for outcome in &outcomes {
            match &outcome.result {
                Ok(()) => tracing::debug!(sink = %outcome.kind, "Delivered to sink"),
                Err(e) => {
                    tracing::warn!(sink = %outcome.kind, error = %e, "Sink delivery failed");
                    shared::counter!(SINK_FAILURES, "sink" => outcome.kind.as_str()).increment(1);
                }
            }
        }

        outcomes
    }
}

fn panic_message(error: JoinError) -> String {
    if !error.is_panic() {
        return error.to_string();
    }
    let payload = error.into_panic();
    payload
        .downcast_ref::<&str>()
        .map(|message| message.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string())
}
