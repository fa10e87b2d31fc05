pub mod api;
pub mod config;
pub mod enrich;
pub mod errors;
pub mod fanout;
pub mod metrics_defs;
pub mod payload;
pub mod router;
pub mod sinks;

#[cfg(test)]
mod testutils;

use crate::api::SinkContext;
use crate::api::utils::HandlerBody;
use crate::errors::IngestError;
use crate::router::Router;
use hyper::body::Incoming;
use hyper::service::Service;
use hyper::{Request, Response};
use shared::admin_service::AdminService;
use shared::http::run_http_service;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Serves until Ctrl-C.
pub async fn run(config: config::Config) -> Result<(), IngestError> {
    run_until(config, tokio::signal::ctrl_c()).await
}

/// Serves the ingest and admin listeners until `shutdown` resolves.
///
/// After the signal, `/ready` fails while both listeners keep serving for
/// `shutdown_drain_secs`, so load balancers can take the instance out of
/// rotation before it goes away.
pub async fn run_until<F>(config: config::Config, shutdown: F) -> Result<(), IngestError>
where
    F: Future<Output = std::io::Result<()>>,
{
    config.validate()?;

    let client = reqwest::Client::builder()
        .user_agent(concat!("beacon/", env!("CARGO_PKG_VERSION")))
        .build()?;

    tracing::info!(sinks = ?config.sinks.enabled(), "Configured sinks");

    let sinks = SinkContext::new(
        client,
        config.sinks.clone(),
        Duration::from_secs(config.sink_timeout_secs),
    );
    let router = Router::new(sinks, config.max_body_bytes);

    let ready = Arc::new(AtomicBool::new(true));
    let readiness = ready.clone();

    let ingest_task = run_http_service(
        &config.listener.host,
        config.listener.port,
        IngestService::new(router),
    );
    let admin_task = run_http_service(
        &config.admin_listener.host,
        config.admin_listener.port,
        AdminService::<_, IngestError>::new(move || readiness.load(Ordering::Relaxed)),
    );

    let servers = async { tokio::try_join!(ingest_task, admin_task) };
    tokio::pin!(servers);

    tokio::select! {
        result = &mut servers => {
            result?;
            return Ok(());
        }
        signal = shutdown => signal?,
    }

    ready.store(false, Ordering::Relaxed);
    let drain = Duration::from_secs(config.shutdown_drain_secs);
    tracing::info!(drain_secs = config.shutdown_drain_secs, "Shutting down");

    if let Ok(result) = tokio::time::timeout(drain, &mut servers).await {
        result?;
    }

    Ok(())
}

pub struct IngestService {
    router: Router,
}

impl IngestService {
    pub fn new(router: Router) -> Self {
        Self { router }
    }
}

impl Service<Request<Incoming>> for IngestService {
    type Response = Response<HandlerBody>;
    type Error = IngestError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let router = self.router.clone();
        Box::pin(async move { Ok(router.route(req).await) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::{free_port, test_client};
    use hyper::StatusCode;
    use tokio::sync::oneshot;

    async fn ready_status(client: &reqwest::Client, port: u16) -> Option<StatusCode> {
        client
            .get(format!("http://127.0.0.1:{port}/ready"))
            .send()
            .await
            .ok()
            .map(|response| response.status())
    }

    #[tokio::test]
    async fn test_ready_fails_while_draining() {
        let mut config = config::Config::default();
        config.listener.host = "127.0.0.1".into();
        config.listener.port = free_port();
        config.admin_listener.port = free_port();
        config.shutdown_drain_secs = 2;
        let admin_port = config.admin_listener.port;

        let (tx, rx) = oneshot::channel::<()>();
        let server = tokio::spawn(run_until(config, async move {
            let _ = rx.await;
            Ok(())
        }));

        let client = test_client();
        let mut status = None;
        for _ in 0..50 {
            status = ready_status(&client, admin_port).await;
            if status.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(status, Some(StatusCode::OK));

        tx.send(()).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(
            ready_status(&client, admin_port).await,
            Some(StatusCode::SERVICE_UNAVAILABLE)
        );

        server.await.unwrap().unwrap();
        // A fresh client, so no pooled connection outlives the listener
        assert_eq!(ready_status(&test_client(), admin_port).await, None);
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let mut config = config::Config::default();
        config.sink_timeout_secs = 0;
        let result = run_until(config, std::future::pending()).await;
        assert!(matches!(result, Err(IngestError::InvalidConfig(_))));
    }
}
