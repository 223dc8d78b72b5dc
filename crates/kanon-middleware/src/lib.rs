//! # Kanon Middleware
//!
//! Inline OpenAPI contract enforcement for HTTP handler chains.
//!
//! The [`OpenApiValidator`] is a [`Middleware`] that resolves every request
//! to a documented operation, validates it, runs the downstream handler and
//! validates the response before it reaches the client.
//!
//! ## Request Flow
//!
//! ```text
//! Request → RouteCheck → RequestCheck → handler → ResponseCheck → Response
//!              │              │                        │
//!              └──────────────┴────────┬───────────────┘
//!                                      ▼
//!                  enforce: JSON error response (400/403/404/405/500)
//!                  observe: diagnostics + log, traffic unchanged
//! ```
//!
//! | Stage | Module | Failure |
//! |-------|--------|---------|
//! | Route check | [`stages::route`] | 404 server mismatch / path, 405 method |
//! | Request check | [`stages::request`] | 400 schema, 403 security |
//! | Response check | [`stages::response`] | 500 contract broken by the service |
//!
//! ## Example
//!
//! ```
//! use kanon_middleware::pipeline::Stage;
//! use kanon_middleware::context::ValidationContext;
//!
//! let stages = Stage::all();
//! assert_eq!(stages[0].name(), "route");
//!
//! let ctx = ValidationContext::new();
//! assert_eq!(ctx.diagnostics().status_code(), -1);
//! ```

#![doc(html_root_url = "https://docs.rs/kanon-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod buffer;
pub mod context;
pub mod middleware;
pub mod pipeline;
pub mod prepare;
pub mod stages;
pub mod types;
pub mod validator;

pub use buffer::{BufferPool, BufferedResponse, PooledBuffer};
pub use context::ValidationContext;
pub use middleware::{BoxFuture, Middleware, Next};
pub use pipeline::{Pipeline, PipelineBuilder, Stage};
pub use prepare::{prepare, PreparedState};
pub use types::{
    empty, full, Body, BoxError, HandlerError, HandlerResult, Request, Response, ResponseExt,
};
pub use validator::OpenApiValidator;
