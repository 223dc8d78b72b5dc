//! HTTP types shared by the middleware chain.
//!
//! Requests arrive fully read (`Full<Bytes>`), because request validation
//! needs the body before the downstream handler runs. Responses carry a
//! boxed body so handlers may stream; the response stage reads it frame by
//! frame into a pooled buffer.

use bytes::Bytes;
use http::{header, HeaderValue, StatusCode};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Empty, Full};
use kanon_core::ValidatorError;

/// The HTTP request type used in the middleware chain.
pub type Request = http::Request<Full<Bytes>>;

/// Error type of a streaming response body.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The response body type.
pub type Body = BoxBody<Bytes, BoxError>;

/// The HTTP response type used in the middleware chain.
pub type Response = http::Response<Body>;

/// What a downstream handler (and every middleware) returns.
pub type HandlerResult = Result<Response, HandlerError>;

/// Failure reported by a downstream handler.
///
/// The validator never inspects or rewrites it; it is returned to the host
/// exactly as the handler produced it.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct HandlerError(#[from] anyhow::Error);

impl HandlerError {
    /// Wraps any error.
    pub fn new<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self(anyhow::Error::new(error))
    }

    /// Creates an error from a message.
    pub fn msg(message: impl std::fmt::Display + std::fmt::Debug + Send + Sync + 'static) -> Self {
        Self(anyhow::Error::msg(message))
    }

    /// Wraps a body stream failure.
    pub fn body(error: BoxError) -> Self {
        Self(anyhow::anyhow!(error))
    }

    /// Returns the underlying error.
    pub fn into_inner(self) -> anyhow::Error {
        self.0
    }
}

/// A body holding `bytes`.
pub fn full(bytes: impl Into<Bytes>) -> Body {
    Full::new(bytes.into()).map_err(|never| match never {}).boxed()
}

/// An empty body.
pub fn empty() -> Body {
    Empty::<Bytes>::new().map_err(|never| match never {}).boxed()
}

/// Extension trait for building error responses.
pub trait ResponseExt {
    /// Creates a JSON error response: `{"error":{"code":..,"message":..}}`.
    fn json_error(status: StatusCode, code: &str, message: &str) -> Response;

    /// Creates the response written when enforcement blocks a request.
    fn from_validator_error(error: &ValidatorError) -> Response;
}

impl ResponseExt for Response {
    fn json_error(status: StatusCode, code: &str, message: &str) -> Response {
        let body = serde_json::json!({
            "error": {
                "code": code,
                "message": message
            }
        });

        let mut response = Response::new(full(body.to_string()));
        *response.status_mut() = status;
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        response
    }

    fn from_validator_error(error: &ValidatorError) -> Response {
        let status = error
            .status_code()
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::json_error(status, error.kind().code(), error.message())
    }
}
