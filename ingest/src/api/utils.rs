use crate::errors::{ApiResponse, IngestError};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::{Response, StatusCode};
use shared::http::make_json_response;

pub type HandlerBody = BoxBody<Bytes, IngestError>;

/// Reads the whole request body, refusing anything above `limit` bytes.
pub async fn read_body<B>(body: B, limit: usize) -> Result<Bytes, IngestError>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            Err(IngestError::PayloadTooLarge)
        }
        Err(e) => Err(IngestError::InternalError(format!(
            "Failed to read request body: {e}"
        ))),
    }
}

pub fn success_response() -> Response<HandlerBody> {
    make_json_response(StatusCode::OK, &ApiResponse::ok())
}

pub fn error_response(error: &IngestError) -> Response<HandlerBody> {
    make_json_response(error.status_code(), &ApiResponse::from_error(error))
}
