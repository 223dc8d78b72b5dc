//! Specification and engine error types.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading a specification document.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The document could not be read from disk.
    #[error("failed to read specification {path}: {source}")]
    Read {
        /// Path that was read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The document could not be fetched over HTTP.
    #[error("failed to fetch specification {uri}: {message}")]
    Fetch {
        /// Requested URI.
        uri: String,
        /// Transport or status description.
        message: String,
    },

    /// The document is neither valid JSON nor valid YAML for the model.
    #[error("failed to parse specification {origin}: {message}")]
    Parse {
        /// Where the document came from.
        origin: String,
        /// Parser message.
        message: String,
    },
}

/// Why a request could not be routed to an operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// The request URL matches none of the declared servers.
    #[error("Does not match any server")]
    NoMatchingServer,

    /// No path template matches the request path.
    #[error("Path was not found")]
    PathNotFound,

    /// A path template matches but declares no operation for the method.
    #[error("Path doesn't support the HTTP method")]
    MethodNotAllowed,

    /// Any other routing failure.
    #[error("{0}")]
    Other(String),
}

impl RouteError {
    /// The textual reason, as reported to clients.
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

/// A request that violates its operation's declaration.
///
/// The display form is multi-line: a one-line summary followed by the
/// schema and value that failed, when known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestError {
    /// One-line summary.
    pub reason: String,
    /// Additional lines (schema, offending value).
    pub detail: Option<String>,
}

impl RequestError {
    /// Create an error with a summary only.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            detail: None,
        }
    }

    /// Attach detail lines.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)?;
        if let Some(detail) = &self.detail {
            write!(f, "\n{}", detail)?;
        }
        Ok(())
    }
}

impl std::error::Error for RequestError {}

/// A response that violates its operation's declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseError {
    /// One-line summary.
    pub reason: String,
    /// Additional lines (schema, offending value).
    pub detail: Option<String>,
}

impl ResponseError {
    /// Create an error with a summary only.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            detail: None,
        }
    }

    /// Attach detail lines.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl fmt::Display for ResponseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "response {}", self.reason)?;
        if let Some(detail) = &self.detail {
            write!(f, "\n{}", detail)?;
        }
        Ok(())
    }
}

impl std::error::Error for ResponseError {}

/// Errors produced by a [`ValidationEngine`](crate::ValidationEngine).
#[derive(Debug, Error)]
pub enum EngineError {
    /// Routing failed.
    #[error(transparent)]
    Route(#[from] RouteError),

    /// Parameters or body do not conform.
    #[error(transparent)]
    Request(#[from] RequestError),

    /// No security requirement alternative was satisfied.
    #[error("security requirements failed: {}", errors.join(" | "))]
    SecurityRequirements {
        /// One entry per failed scheme check.
        errors: Vec<String>,
    },

    /// The response does not conform.
    #[error(transparent)]
    Response(#[from] ResponseError),

    /// Validation was cancelled before it finished.
    #[error("validation cancelled")]
    Cancelled,

    /// The engine could not be built from the specification.
    #[error("invalid specification: {0}")]
    Build(String),
}

impl EngineError {
    /// Create a build error.
    pub fn build(message: impl Into<String>) -> Self {
        Self::Build(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_reasons() {
        assert_eq!(RouteError::NoMatchingServer.reason(), "Does not match any server");
        assert_eq!(RouteError::PathNotFound.reason(), "Path was not found");
        assert_eq!(
            RouteError::MethodNotAllowed.reason(),
            "Path doesn't support the HTTP method"
        );
    }

    #[test]
    fn test_request_error_is_multiline() {
        let err = RequestError::new("parameter \"petId\" in path has an error: not an integer")
            .with_detail("Schema:\n  {\"type\":\"integer\"}");
        let text = err.to_string();
        assert_eq!(
            text.lines().next(),
            Some("parameter \"petId\" in path has an error: not an integer")
        );
        assert!(text.contains("Schema:"));
    }

    #[test]
    fn test_security_errors_joined() {
        let err = EngineError::SecurityRequirements {
            errors: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(err.to_string(), "security requirements failed: a | b");
    }

    #[test]
    fn test_route_error_is_transparent() {
        let err = EngineError::from(RouteError::PathNotFound);
        assert_eq!(err.to_string(), "Path was not found");
    }
}
