//! # Kanon
//!
//! **OpenAPI contract validation for HTTP services**
//!
//! Kanon sits in front of a request handler and checks live traffic against
//! an OpenAPI 3 document:
//!
//! - **Route validation** – every request must match a documented server,
//!   path and method
//! - **Request validation** – parameters, bodies and security requirements
//! - **Response validation** – what the service sends back must match the
//!   documented status codes and schemas
//! - **Enforce or observe** – block violations with a JSON error, or record
//!   and log them while traffic flows unchanged
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use kanon::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigLoader::new()
//!         .with_file("kanon.toml")?
//!         .with_env_prefix("KANON")
//!         .load()?;
//!
//!     let validator = OpenApiValidator::provision(config).await?;
//!     let pipeline = Pipeline::builder().add_stage(validator).build();
//!
//!     // pipeline.process(&mut ctx, request, handler).await
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Request → RouteCheck → RequestCheck → handler → ResponseCheck → Response
//! ```

#![doc(html_root_url = "https://docs.rs/kanon/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export error taxonomy and diagnostics
pub use kanon_core as core;

// Re-export configuration
pub use kanon_config as config;

// Re-export specification model and engine
pub use kanon_spec as spec;

// Re-export the middleware
pub use kanon_middleware as middleware;

// Re-export logging and metrics
pub use kanon_telemetry as telemetry;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use kanon::prelude::*;
///
/// let config = ValidatorConfig::builder().enforce(false).build();
/// assert!(!config.should_enforce());
/// assert!(config.should_validate_routes());
/// ```
pub mod prelude {
    pub use kanon_core::{DiagnosticRecord, ErrorKind, RequestId, ValidatorError, ValidatorResult};

    pub use kanon_config::{ConfigError, ConfigLoader, ValidatorConfig, ValidatorConfigBuilder};

    pub use kanon_spec::{
        AuthenticationDispatcher, OpenApiEngine, Specification, SpecificationLoader,
        ValidationEngine,
    };

    pub use kanon_middleware::{
        BufferPool, HandlerError, HandlerResult, Middleware, Next, OpenApiValidator, Pipeline,
        Request, Response, ValidationContext,
    };

    pub use kanon_telemetry::{init_logging, init_telemetry, LogConfig};
}
