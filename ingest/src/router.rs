use crate::api::error_reports::ErrorReportHandler;
use crate::api::events::EventHandler;
use crate::api::performance::PerformanceHandler;
use crate::api::utils::{HandlerBody, error_response, read_body, success_response};
use crate::api::{Handler, SinkContext};
use crate::enrich::RequestMeta;
use crate::errors::IngestError;
use crate::fanout::SinkOutcome;
use crate::metrics_defs::{INGEST_REQUESTS, REQUEST_DURATION};
use hyper::{Method, Request, Response};
use std::sync::Arc;
use std::time::Instant;

struct Route {
    path: &'static str,
    handler: Arc<dyn Handler>,
}

/// Dispatches requests to the endpoint handler registered for their path
#[derive(Clone)]
pub struct Router {
    routes: Arc<Vec<Route>>,
    max_body_bytes: usize,
}

impl Router {
    pub fn new(sinks: SinkContext, max_body_bytes: usize) -> Self {
        let routes = vec![
            Route {
                path: "/api/errors",
                handler: Arc::new(ErrorReportHandler::new(sinks.clone())),
            },
            Route {
                path: "/api/events",
                handler: Arc::new(EventHandler::new(sinks.clone())),
            },
            Route {
                path: "/api/metrics",
                handler: Arc::new(PerformanceHandler::new(sinks)),
            },
        ];

        Self {
            routes: Arc::new(routes),
            max_body_bytes,
        }
    }

    /// Routes an incoming request and always produces a JSON response
    pub async fn route<B>(&self, req: Request<B>) -> Response<HandlerBody>
    where
        B: hyper::body::Body + Send + 'static,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let Some(handler) = self.find_handler(req.uri().path()) else {
            tracing::warn!(
                method = %req.method(),
                path = %req.uri().path(),
                "No route matched"
            );
            return error_response(&IngestError::NotFound);
        };

        let endpoint = handler.name();
        let start = Instant::now();

        let response = match self.dispatch(handler, req).await {
            Ok(outcomes) => {
                let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
                tracing::debug!(endpoint, sinks = outcomes.len(), failed, "Request handled");
                success_response()
            }
            Err(e) => {
                if e.status_code().is_server_error() {
                    tracing::error!(endpoint, error = %e, "Request failed");
                } else {
                    tracing::info!(endpoint, error = %e, "Request rejected");
                }
                error_response(&e)
            }
        };

        shared::counter!(
            INGEST_REQUESTS,
            "endpoint" => endpoint,
            "status" => response.status().as_str().to_string()
        )
        .increment(1);
        shared::histogram!(REQUEST_DURATION, "endpoint" => endpoint)
            .record(start.elapsed().as_secs_f64());

        response
    }

    fn find_handler(&self, path: &str) -> Option<&dyn Handler> {
        self.routes
            .iter()
            .find(|route| route.path == path)
            .map(|route| route.handler.as_ref())
    }

    async fn dispatch<B>(
        &self,
        handler: &dyn Handler,
        req: Request<B>,
    ) -> Result<Vec<SinkOutcome>, IngestError>
    where
        B: hyper::body::Body + Send + 'static,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        // Checked before the body is read
        if req.method() != Method::POST {
            return Err(IngestError::MethodNotAllowed);
        }

        let meta = RequestMeta::from_headers(req.headers());
        let body = read_body(req.into_body(), self.max_body_bytes).await?;
        handler.handle(body, meta).await
    }
}
