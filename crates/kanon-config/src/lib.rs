//! Typed configuration for Kanon.
//!
//! This crate provides the [`ValidatorConfig`] consumed by the validator
//! middleware, with support for:
//! - TOML and JSON configuration files
//! - Environment variable overrides
//! - Strict parsing (fails on unknown fields)
//! - Layered configuration (defaults → file → env)
//!
//! # Tri-state toggles
//!
//! Every validation toggle is an `Option<bool>`: leaving it unset means
//! `true`. Use the `should_*` accessors instead of reading the fields.
//!
//! # Example
//!
//! ```no_run
//! use kanon_config::{ConfigLoader, ValidatorConfig};
//!
//! # fn main() -> Result<(), kanon_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_defaults()
//!     .with_file("kanon.toml")?
//!     .with_env_prefix("KANON")
//!     .load()?;
//!
//! println!("validating against {}", config.filepath);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File Format
//!
//! ```toml
//! filepath = "/etc/kanon/petstore.yaml"
//! validate_routes = true
//! validate_requests = true
//! validate_responses = true
//! validate_servers = false
//! validate_security = true
//! enforce = true
//! log = true
//! path_prefix_to_be_trimmed = "/api"
//! additional_servers = ["https://staging.example.com/api"]
//!
//! [telemetry]
//! service_name = "petstore-gateway"
//!
//! [telemetry.logging]
//! level = "info"
//! format = "json"
//!
//! [telemetry.metrics]
//! enabled = true
//! addr = "0.0.0.0:9090"
//! ```
//!
//! # Environment Variable Overrides
//!
//! Values can be overridden via environment variables using the format
//! `PREFIX__KEY` or `PREFIX__SECTION__KEY`. For example:
//!
//! - `KANON__FILEPATH=/srv/openapi.json`
//! - `KANON__ENFORCE=false`
//! - `KANON__ADDITIONAL_SERVERS=https://a.example.com,https://b.example.com`
//! - `KANON__TELEMETRY__LOGGING__LEVEL=debug`

#![warn(missing_docs)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::*;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::*;
