//! Validation stages.
//!
//! Each stage wraps one engine call and maps its failures onto the
//! [`ValidatorError`](kanon_core::ValidatorError) taxonomy. The
//! [`OpenApiValidator`](crate::OpenApiValidator) runs them in order:
//!
//! 1. [`route`] - resolve method and URL to an operation
//! 2. [`request`] - parameters, body and security
//! 3. [`response`] - capture the downstream response and check it

pub mod request;
pub mod response;
pub mod route;

pub use request::RequestStage;
pub use response::ResponseStage;
pub use route::RouteResolver;
