//! Error types for Kanon.
//!
//! [`ValidatorError`] is the single error type the validation pipeline
//! produces. Every variant belongs to one [`ErrorKind`], and the kind decides
//! the HTTP status written back to the client when enforcement is on.
//!
//! | `ErrorKind` | Status | Raised by |
//! |---|---|---|
//! | `Configuration` | - | provisioning |
//! | `ServerMismatch` | 404 | route resolution |
//! | `RouteNotFound` | 404 | route resolution |
//! | `MethodNotAllowed` | 405 | route resolution |
//! | `RequestValidation` | 400 | request validation |
//! | `SecurityRequirements` | 403 | request validation |
//! | `ResponseValidation` | 500 | response validation |
//! | `Internal` | 500 | any stage |

use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using [`ValidatorError`].
pub type ValidatorResult<T> = Result<T, ValidatorError>;

/// Classification of a [`ValidatorError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Invalid or incomplete configuration. Fatal at provisioning.
    Configuration,
    /// The request host/scheme/base path matches no declared server.
    ServerMismatch,
    /// No documented path matches the request.
    RouteNotFound,
    /// The path exists but does not support the request method.
    MethodNotAllowed,
    /// Parameters or body violate the operation schema.
    RequestValidation,
    /// None of the operation's security requirements were satisfied.
    SecurityRequirements,
    /// The downstream response violates the contract.
    ResponseValidation,
    /// Unrecognized engine failure or cancellation.
    Internal,
}

impl ErrorKind {
    /// Returns the HTTP status for this kind.
    ///
    /// `Configuration` errors never reach a client and have no status.
    #[must_use]
    pub const fn status_code(&self) -> Option<StatusCode> {
        match self {
            Self::Configuration => None,
            Self::ServerMismatch | Self::RouteNotFound => Some(StatusCode::NOT_FOUND),
            Self::MethodNotAllowed => Some(StatusCode::METHOD_NOT_ALLOWED),
            Self::RequestValidation => Some(StatusCode::BAD_REQUEST),
            Self::SecurityRequirements => Some(StatusCode::FORBIDDEN),
            Self::ResponseValidation | Self::Internal => Some(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }

    /// Machine-readable code used in the JSON error envelope.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Configuration => "CONFIGURATION_ERROR",
            Self::ServerMismatch => "SERVER_MISMATCH",
            Self::RouteNotFound => "ROUTE_NOT_FOUND",
            Self::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            Self::RequestValidation => "REQUEST_VALIDATION_FAILED",
            Self::SecurityRequirements => "SECURITY_REQUIREMENTS_FAILED",
            Self::ResponseValidation => "RESPONSE_VALIDATION_FAILED",
            Self::Internal => "INTERNAL_ERROR",
        }
    }

    /// Short label used as a metrics dimension.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::ServerMismatch => "server_mismatch",
            Self::RouteNotFound => "route_not_found",
            Self::MethodNotAllowed => "method_not_allowed",
            Self::RequestValidation => "request_validation",
            Self::SecurityRequirements => "security_requirements",
            Self::ResponseValidation => "response_validation",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Standard error type for Kanon.
///
/// The `Display` output is the client-facing message. Wrapped causes stay
/// available through [`std::error::Error::source`] for logging.
///
/// # Example
///
/// ```
/// use kanon_core::ValidatorError;
///
/// let err = ValidatorError::security_requirements(vec![
///     "no HTTP basic authentication credentials provided".to_string(),
///     "failed to retrieve API key from query parameter key".to_string(),
/// ]);
/// assert_eq!(
///     err.to_string(),
///     "(0) no HTTP basic authentication credentials provided, \
///      (1) failed to retrieve API key from query parameter key"
/// );
/// ```
#[derive(Error, Debug)]
pub enum ValidatorError {
    /// Invalid configuration detected at provisioning.
    #[error("configuration error: {message}")]
    Configuration {
        /// Human-readable error message.
        message: String,
    },

    /// No declared server matches the request.
    #[error("{message}")]
    ServerMismatch {
        /// Human-readable error message.
        message: String,
    },

    /// No documented path matches the request.
    #[error("{message}")]
    RouteNotFound {
        /// Human-readable error message.
        message: String,
    },

    /// The matched path does not support the method.
    #[error("{message}")]
    MethodNotAllowed {
        /// Human-readable error message.
        message: String,
    },

    /// The request violates the operation schema.
    #[error("{message}")]
    RequestValidation {
        /// First line of the engine's report.
        message: String,
        /// Full engine report.
        #[source]
        source: Option<anyhow::Error>,
    },

    /// No security requirement alternative was satisfied.
    #[error("{message}")]
    SecurityRequirements {
        /// Compound message, `"(0) <err0>, (1) <err1>, ..."`.
        message: String,
        /// Individual scheme failures in evaluation order.
        errors: Vec<String>,
    },

    /// The downstream response violates the contract.
    #[error("{message}")]
    ResponseValidation {
        /// Human-readable error message.
        message: String,
        /// Engine report.
        #[source]
        source: Option<anyhow::Error>,
    },

    /// Unexpected failure inside the engine, including cancellation.
    #[error("{message}")]
    Internal {
        /// Human-readable error message.
        message: String,
        /// The underlying error (not exposed to clients).
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl ValidatorError {
    /// Creates a configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a server mismatch error.
    #[must_use]
    pub fn server_mismatch(message: impl Into<String>) -> Self {
        Self::ServerMismatch {
            message: message.into(),
        }
    }

    /// Creates a route-not-found error.
    #[must_use]
    pub fn route_not_found(message: impl Into<String>) -> Self {
        Self::RouteNotFound {
            message: message.into(),
        }
    }

    /// Creates a method-not-allowed error.
    #[must_use]
    pub fn method_not_allowed(message: impl Into<String>) -> Self {
        Self::MethodNotAllowed {
            message: message.into(),
        }
    }

    /// Creates a request validation error from a (possibly multi-line) engine
    /// report. Only the first line becomes the message.
    #[must_use]
    pub fn request_validation(report: impl Into<String>) -> Self {
        let report = report.into();
        let message = report.lines().next().unwrap_or_default().to_string();
        Self::RequestValidation {
            message,
            source: Some(anyhow::Error::msg(report)),
        }
    }

    /// Creates a security requirements error from the per-scheme failures.
    #[must_use]
    pub fn security_requirements(errors: Vec<String>) -> Self {
        let message = errors
            .iter()
            .enumerate()
            .map(|(i, e)| format!("({i}) {e}"))
            .collect::<Vec<_>>()
            .join(", ");
        Self::SecurityRequirements { message, errors }
    }

    /// Creates a response validation error.
    #[must_use]
    pub fn response_validation(message: impl Into<String>) -> Self {
        Self::ResponseValidation {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a response validation error carrying the engine report.
    pub fn response_validation_with_source(
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::ResponseValidation {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an internal error with a source error.
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::ServerMismatch { .. } => ErrorKind::ServerMismatch,
            Self::RouteNotFound { .. } => ErrorKind::RouteNotFound,
            Self::MethodNotAllowed { .. } => ErrorKind::MethodNotAllowed,
            Self::RequestValidation { .. } => ErrorKind::RequestValidation,
            Self::SecurityRequirements { .. } => ErrorKind::SecurityRequirements,
            Self::ResponseValidation { .. } => ErrorKind::ResponseValidation,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Returns the HTTP status code for this error, if it has one.
    #[must_use]
    pub const fn status_code(&self) -> Option<StatusCode> {
        self.kind().status_code()
    }

    /// Returns the client-facing message without the wrapped cause.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Configuration { message }
            | Self::ServerMismatch { message }
            | Self::RouteNotFound { message }
            | Self::MethodNotAllowed { message }
            | Self::RequestValidation { message, .. }
            | Self::SecurityRequirements { message, .. }
            | Self::ResponseValidation { message, .. }
            | Self::Internal { message, .. } => message,
        }
    }

    /// Converts this error to a serializable error envelope.
    #[must_use]
    pub fn to_envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            error: ErrorDetail {
                code: self.kind().code().to_string(),
                message: self.message().to_string(),
            },
        }
    }
}

/// Serializable error envelope written to clients when a request is blocked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// The error details.
    pub error: ErrorDetail,
}

/// Error detail within an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ErrorKind::Configuration.status_code(), None);
        assert_eq!(ErrorKind::ServerMismatch.status_code(), Some(StatusCode::NOT_FOUND));
        assert_eq!(ErrorKind::RouteNotFound.status_code(), Some(StatusCode::NOT_FOUND));
        assert_eq!(
            ErrorKind::MethodNotAllowed.status_code(),
            Some(StatusCode::METHOD_NOT_ALLOWED)
        );
        assert_eq!(
            ErrorKind::RequestValidation.status_code(),
            Some(StatusCode::BAD_REQUEST)
        );
        assert_eq!(
            ErrorKind::SecurityRequirements.status_code(),
            Some(StatusCode::FORBIDDEN)
        );
        assert_eq!(
            ErrorKind::ResponseValidation.status_code(),
            Some(StatusCode::INTERNAL_SERVER_ERROR)
        );
        assert_eq!(
            ErrorKind::Internal.status_code(),
            Some(StatusCode::INTERNAL_SERVER_ERROR)
        );
    }

    #[test]
    fn test_request_validation_keeps_first_line() {
        let err = ValidatorError::request_validation(
            "parameter \"petId\" in path has an error: value abc: an invalid integer\nSchema:\n  {\"type\": \"integer\"}",
        );
        assert_eq!(err.kind(), ErrorKind::RequestValidation);
        assert_eq!(
            err.to_string(),
            "parameter \"petId\" in path has an error: value abc: an invalid integer"
        );

        let source = err.source().unwrap().to_string();
        assert!(source.contains("Schema:"));
    }

    #[test]
    fn test_request_validation_single_line() {
        let err = ValidatorError::request_validation("request body has an error");
        assert_eq!(err.message(), "request body has an error");
    }

    #[test]
    fn test_security_requirements_compound_message() {
        let err = ValidatorError::security_requirements(vec!["a".into(), "b".into(), "c".into()]);
        assert_eq!(err.to_string(), "(0) a, (1) b, (2) c");
        assert_eq!(err.status_code(), Some(StatusCode::FORBIDDEN));
    }

    #[test]
    fn test_security_requirements_single() {
        let err = ValidatorError::security_requirements(vec!["only".into()]);
        assert_eq!(err.to_string(), "(0) only");
    }

    #[test]
    fn test_internal_with_source() {
        let err = ValidatorError::internal_with_source(
            "error validating request: boom",
            anyhow::anyhow!("boom"),
        );
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.source().unwrap().to_string(), "boom");
    }

    #[test]
    fn test_configuration_display() {
        let err = ValidatorError::configuration("missing filepath");
        assert_eq!(err.to_string(), "configuration error: missing filepath");
        assert_eq!(err.message(), "missing filepath");
    }

    #[test]
    fn test_envelope_serialization() {
        let err = ValidatorError::method_not_allowed("Path doesn't support the HTTP method");
        let json = serde_json::to_value(err.to_envelope()).unwrap();
        assert_eq!(json["error"]["code"], "METHOD_NOT_ALLOWED");
        assert_eq!(json["error"]["message"], "Path doesn't support the HTTP method");
    }

    proptest::proptest! {
        #[test]
        fn test_request_message_never_spans_lines(report in ".*(\n.*)*") {
            let err = ValidatorError::request_validation(report);
            proptest::prop_assert!(!err.message().contains('\n'));
        }
    }

    #[test]
    fn test_kind_serialization() {
        let json = serde_json::to_string(&ErrorKind::SecurityRequirements).unwrap();
        assert_eq!(json, "\"security_requirements\"");
    }
}
