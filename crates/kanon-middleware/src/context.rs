//! Per-request validation context.
//!
//! The [`ValidationContext`] is created by the host for every request and
//! handed to the middleware chain by mutable reference. The validator writes
//! its diagnostics here, so the host can read them after the chain returns,
//! whether or not the violation was enforced.

use kanon_core::{DiagnosticRecord, RequestId, ValidatorError};
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::types::Request;

/// Header used to propagate a request ID from upstream.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Context that flows through the middleware chain.
///
/// # Example
///
/// ```
/// use kanon_middleware::context::ValidationContext;
///
/// let ctx = ValidationContext::new();
/// assert_eq!(ctx.diagnostics().status_code(), -1);
/// assert_eq!(ctx.diagnostics().error_message(), "");
/// assert!(!ctx.is_tls());
/// ```
#[derive(Debug)]
pub struct ValidationContext {
    /// Unique identifier for this request.
    request_id: RequestId,

    /// Operation the request was routed to.
    operation_id: Option<String>,

    /// Whether the connection was TLS-terminated by the host.
    tls: bool,

    /// Last violation observed for this request.
    diagnostics: DiagnosticRecord,

    /// Cancelled by the host when the client goes away.
    cancellation: CancellationToken,

    /// When the request started processing.
    started_at: Instant,
}

impl ValidationContext {
    /// Creates a context with a fresh request ID.
    #[must_use]
    pub fn new() -> Self {
        Self::with_request_id(RequestId::new())
    }

    /// Creates a context with a specific request ID.
    #[must_use]
    pub fn with_request_id(request_id: RequestId) -> Self {
        Self {
            request_id,
            operation_id: None,
            tls: false,
            diagnostics: DiagnosticRecord::new(),
            cancellation: CancellationToken::new(),
            started_at: Instant::now(),
        }
    }

    /// Creates a context for `request`, reusing a valid `x-request-id`.
    #[must_use]
    pub fn for_request(request: &Request) -> Self {
        let request_id = request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(RequestId::parse)
            .unwrap_or_default();
        Self::with_request_id(request_id)
    }

    /// Returns the request ID.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns the operation ID, if resolved.
    #[must_use]
    pub fn operation_id(&self) -> Option<&str> {
        self.operation_id.as_deref()
    }

    /// Sets the operation ID once routing resolved the request.
    pub fn set_operation_id(&mut self, operation_id: impl Into<String>) {
        self.operation_id = Some(operation_id.into());
    }

    /// Whether the request arrived over TLS.
    #[must_use]
    pub fn is_tls(&self) -> bool {
        self.tls
    }

    /// Marks the request as having arrived over TLS.
    pub fn set_tls(&mut self, tls: bool) {
        self.tls = tls;
    }

    /// Builder form of [`set_tls`](Self::set_tls).
    #[must_use]
    pub fn with_tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    /// Returns the diagnostic record.
    #[must_use]
    pub fn diagnostics(&self) -> &DiagnosticRecord {
        &self.diagnostics
    }

    /// Clears the diagnostic record.
    pub fn reset_diagnostics(&mut self) {
        self.diagnostics.reset();
    }

    /// Records `error` as the last violation.
    pub fn record_violation(&mut self, error: &ValidatorError) {
        self.diagnostics.record(error);
    }

    /// Returns the cancellation token passed to the engine.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Replaces the cancellation token, typically with a child of the
    /// connection's token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Returns when the request started processing.
    #[must_use]
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Returns the elapsed time since the request started.
    #[must_use]
    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }
}

impl Default for ValidationContext {
    fn default() -> Self {
        Self::new()
    }
}
