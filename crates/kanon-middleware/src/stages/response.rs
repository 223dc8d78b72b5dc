//! Response capture and validation.
//!
//! ```text
//! NotStarted ──► Buffering ──► Captured ──► Validated ──► Flushed
//!      │                                        │
//!      └────────► Skipped ──────────────────────┴──► (error response)
//! ```

use std::sync::Arc;

use kanon_core::ValidatorError;
use kanon_spec::{EngineError, RequestValidationInput, ResponseValidationInput, ValidationEngine};
use tokio_util::sync::CancellationToken;

use crate::buffer::{BufferPool, BufferedResponse};
use crate::context::ValidationContext;
use crate::middleware::Next;
use crate::types::{HandlerError, Request};

/// Buffers downstream responses and validates them.
pub struct ResponseStage {
    engine: Arc<dyn ValidationEngine>,
    pool: BufferPool,
}

impl ResponseStage {
    /// Creates the stage.
    pub fn new(engine: Arc<dyn ValidationEngine>, pool: BufferPool) -> Self {
        Self { engine, pool }
    }

    /// The pool buffers are checked out from.
    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    /// Runs the downstream handler and buffers its response.
    ///
    /// The buffer is checked out before the handler runs. Handler and body
    /// errors are returned unchanged and release the buffer on the way out.
    pub async fn capture(
        &self,
        next: Next<'_>,
        ctx: &mut ValidationContext,
        request: Request,
    ) -> Result<BufferedResponse, HandlerError> {
        let buffer = self.pool.acquire();
        let response = next.run(ctx, request).await?;
        BufferedResponse::capture(response, buffer).await
    }

    /// Validates a captured response against the routed operation.
    pub fn validate(
        &self,
        input: &RequestValidationInput,
        captured: &BufferedResponse,
        cancellation: &CancellationToken,
    ) -> Result<(), ValidatorError> {
        let response = ResponseValidationInput {
            request: input,
            status: captured.status(),
            headers: captured.headers(),
            body: captured.body(),
        };

        match self.engine.validate_response(&response, cancellation) {
            Ok(()) => Ok(()),
            Err(EngineError::Response(e)) => {
                let message = e.to_string().lines().next().unwrap_or_default().to_string();
                Err(ValidatorError::response_validation_with_source(message, e))
            }
            Err(other) => Err(ValidatorError::internal_with_source(
                format!("error validating response: {other}"),
                other,
            )),
        }
    }
}

impl std::fmt::Debug for ResponseStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseStage")
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}
