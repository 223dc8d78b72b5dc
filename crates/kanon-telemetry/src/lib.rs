//! Observability for Kanon.
//!
//! - **Logging**: `tracing-subscriber` setup with JSON or pretty output
//! - **Metrics**: Prometheus-format counters via the `metrics` crate
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                kanon-middleware              │
//! │   tracing::warn!(...)   record_violation(..) │
//! └───────────┬──────────────────────┬───────────┘
//!             │                      │
//!   ┌─────────▼─────────┐  ┌─────────▼─────────┐
//!   │      Logging      │  │      Metrics      │
//!   │ (JSON / pretty)   │  │   (Prometheus)    │
//!   └─────────┬─────────┘  └─────────┬─────────┘
//!             ▼                      ▼
//!       stdout/stderr            /metrics
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use kanon_config::ValidatorConfig;
//!
//! let config = ValidatorConfig::production();
//! kanon_telemetry::init_telemetry(&config.telemetry)?;
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig};
pub use crate::metrics::{
    init_metrics, record_request_validated, record_violation, MetricsConfig, Outcome, StageTimer,
};

use kanon_config::TelemetryConfigSection;

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Initializes logging and metrics from the configuration section.
///
/// # Errors
///
/// Returns the first initialization failure.
pub fn init_telemetry(section: &TelemetryConfigSection) -> TelemetryResult<()> {
    init_logging(&LogConfig::from(section))?;
    init_metrics(&MetricsConfig::from(section))?;
    Ok(())
}
