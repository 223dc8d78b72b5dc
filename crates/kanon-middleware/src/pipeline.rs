//! Middleware chain and validation stages.
//!
//! [`Pipeline`] runs an ordered list of middleware in front of a downstream
//! handler. Hosts without their own middleware framework use it to mount the
//! validator; the validator itself is just one [`Middleware`].
//!
//! [`Stage`] names the steps the validator walks through for one request:
//!
//! ```text
//! RouteCheck → RequestCheck → Downstream → ResponseCheck → Finalize
//!     │             │                            │
//!     └─────────────┴──────── Blocked ◄──────────┘   (when enforcing)
//! ```

use crate::context::ValidationContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{HandlerResult, Request};
use std::sync::Arc;

/// A type-erased middleware that can be stored in a vector.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// An ordered middleware chain, immutable once built.
///
/// # Example
///
/// ```ignore
/// let pipeline = Pipeline::builder()
///     .add_stage(validator)
///     .build();
///
/// let mut ctx = ValidationContext::for_request(&request);
/// let result = pipeline
///     .process(&mut ctx, request, |_ctx, req| Box::pin(handle(req)))
///     .await;
/// ```
pub struct Pipeline {
    stages: Vec<BoxedMiddleware>,
}

impl Pipeline {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Runs `request` through every stage, then `handler`.
    ///
    /// The context is borrowed so the host can read diagnostics afterwards.
    pub async fn process<H>(
        &self,
        ctx: &mut ValidationContext,
        request: Request,
        handler: H,
    ) -> HandlerResult
    where
        H: FnOnce(&mut ValidationContext, Request) -> BoxFuture<'static, HandlerResult>
            + Send
            + 'static,
    {
        let next = self.build_chain(handler);
        next.run(ctx, request).await
    }

    fn build_chain<'a, H>(&'a self, handler: H) -> Next<'a>
    where
        H: FnOnce(&mut ValidationContext, Request) -> BoxFuture<'static, HandlerResult>
            + Send
            + 'a,
    {
        let mut next = Next::handler(handler);
        for middleware in self.stages.iter().rev() {
            next = Next::new(middleware.as_ref(), next);
        }
        next
    }

    /// Returns the names of all stages in order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|m| m.name()).collect()
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .finish()
    }
}

/// Builder for constructing a [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    stages: Vec<BoxedMiddleware>,
}

impl PipelineBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Appends a middleware. Stages run in insertion order.
    #[must_use]
    pub fn add_stage<M: Middleware>(mut self, middleware: M) -> Self {
        self.stages.push(Arc::new(middleware));
        self
    }

    /// Appends an already shared middleware.
    #[must_use]
    pub fn add_shared_stage(mut self, middleware: BoxedMiddleware) -> Self {
        self.stages.push(middleware);
        self
    }

    /// Builds the pipeline.
    #[must_use]
    pub fn build(self) -> Pipeline {
        Pipeline {
            stages: self.stages,
        }
    }
}

/// A step of the validator's per-request state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Stage {
    /// Resolve the request to a documented operation.
    RouteCheck = 1,
    /// Validate parameters, body and security.
    RequestCheck = 2,
    /// Run the downstream handler.
    Downstream = 3,
    /// Validate the captured response.
    ResponseCheck = 4,
    /// Write the response to the client.
    Finalize = 5,
}

impl Stage {
    /// Returns the stage name, used as log field and metrics label.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::RouteCheck => "route",
            Self::RequestCheck => "request",
            Self::Downstream => "downstream",
            Self::ResponseCheck => "response",
            Self::Finalize => "finalize",
        }
    }

    /// Whether a violation detected in this stage can block the request.
    #[must_use]
    pub const fn can_block(self) -> bool {
        matches!(
            self,
            Self::RouteCheck | Self::RequestCheck | Self::ResponseCheck
        )
    }

    /// Returns all stages in order.
    #[must_use]
    pub const fn all() -> [Stage; 5] {
        [
            Self::RouteCheck,
            Self::RequestCheck,
            Self::Downstream,
            Self::ResponseCheck,
            Self::Finalize,
        ]
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{full, Response};
    use bytes::Bytes;
    use http::{Request as HttpRequest, StatusCode};
    use http_body_util::Full;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        name: &'static str,
        hits: Arc<AtomicUsize>,
    }

    impl Middleware for Counting {
        fn name(&self) -> &'static str {
            self.name
        }

        fn process<'a>(
            &'a self,
            ctx: &'a mut ValidationContext,
            request: Request,
            next: Next<'a>,
        ) -> BoxFuture<'a, HandlerResult> {
            Box::pin(async move {
                self.hits.fetch_add(1, Ordering::SeqCst);
                next.run(ctx, request).await
            })
        }
    }

    #[test]
    fn test_stage_order() {
        let stages = Stage::all();
        assert_eq!(stages.len(), 5);
        assert!(stages.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(stages[0].name(), "route");
        assert_eq!(stages[4].name(), "finalize");
    }

    #[test]
    fn test_blocking_stages() {
        assert!(Stage::RouteCheck.can_block());
        assert!(Stage::RequestCheck.can_block());
        assert!(Stage::ResponseCheck.can_block());
        assert!(!Stage::Downstream.can_block());
        assert!(!Stage::Finalize.can_block());
    }

    #[tokio::test]
    async fn test_pipeline_runs_every_stage() {
        let hits = Arc::new(AtomicUsize::new(0));
        let pipeline = Pipeline::builder()
            .add_stage(Counting { name: "a", hits: hits.clone() })
            .add_stage(Counting { name: "b", hits: hits.clone() })
            .build();

        assert_eq!(pipeline.stage_count(), 2);
        assert_eq!(pipeline.stage_names(), vec!["a", "b"]);

        let mut ctx = ValidationContext::new();
        let request: Request = HttpRequest::builder()
            .uri("/pets")
            .body(Full::new(Bytes::new()))
            .unwrap();

        let response = pipeline
            .process(&mut ctx, request, |_ctx, _req| {
                Box::pin(async { Ok(Response::new(full("done"))) })
            })
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_pipeline_calls_handler() {
        let pipeline = PipelineBuilder::default().build();
        let mut ctx = ValidationContext::new();
        let request: Request = HttpRequest::builder()
            .uri("/")
            .body(Full::new(Bytes::new()))
            .unwrap();

        let response = pipeline
            .process(&mut ctx, request, |_ctx, _req| {
                Box::pin(async {
                    let mut response = Response::new(full(""));
                    *response.status_mut() = StatusCode::NO_CONTENT;
                    Ok(response)
                })
            })
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }
}
