//! Prometheus metrics for Kanon.
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `kanon_requests_validated_total` | Counter | `outcome` | Requests that went through the validator |
//! | `kanon_violations_total` | Counter | `kind`, `stage`, `enforced` | Contract violations |
//! | `kanon_stage_duration_seconds` | Histogram | `stage` | Time spent in a validation stage |
//!
//! Recording without an installed recorder is a no-op, so the middleware
//! records unconditionally.

use crate::error::TelemetryError;
use crate::TelemetryResult;
use kanon_config::TelemetryConfigSection;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::Instant;

/// Global metrics handle for rendering.
static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metric names.
pub mod names {
    /// Requests that went through the validator.
    pub const REQUESTS_VALIDATED: &str = "kanon_requests_validated_total";
    /// Contract violations.
    pub const VIOLATIONS: &str = "kanon_violations_total";
    /// Stage latency.
    pub const STAGE_DURATION: &str = "kanon_stage_duration_seconds";
}

/// Metrics exporter configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Whether the exporter is installed.
    pub enabled: bool,

    /// Address to expose metrics on (e.g., "0.0.0.0:9090").
    pub addr: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: "0.0.0.0:9090".to_string(),
        }
    }
}

impl From<&TelemetryConfigSection> for MetricsConfig {
    fn from(section: &TelemetryConfigSection) -> Self {
        Self {
            enabled: section.metrics.enabled,
            addr: section.metrics.addr.clone(),
        }
    }
}

/// Installs the Prometheus exporter.
///
/// # Errors
///
/// Returns `TelemetryError::InvalidAddress` for an unparsable address and
/// `TelemetryError::MetricsInit` if the recorder cannot be installed.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let addr: SocketAddr = config
        .addr
        .parse()
        .map_err(|e| TelemetryError::InvalidAddress(format!("{}: {e}", config.addr)))?;

    let handle = PrometheusBuilder::new()
        .with_http_listener(addr)
        .install_recorder()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    let _ = METRICS_HANDLE.set(handle);
    register_metric_descriptions();

    tracing::info!(%addr, "prometheus exporter installed");
    Ok(())
}

/// Renders metrics in Prometheus format, if the exporter is installed.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

fn register_metric_descriptions() {
    describe_counter!(
        names::REQUESTS_VALIDATED,
        "Requests processed by the contract validator by outcome"
    );
    describe_counter!(
        names::VIOLATIONS,
        "Contract violations by kind, stage and enforcement"
    );
    describe_histogram!(
        names::STAGE_DURATION,
        "Time spent in a validation stage in seconds"
    );
}

/// How a request left the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No violation.
    Passed,
    /// Violation recorded, traffic let through.
    Observed,
    /// Violation answered with an error response.
    Blocked,
}

impl Outcome {
    /// Label value.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Observed => "observed",
            Self::Blocked => "blocked",
        }
    }
}

/// Records a request leaving the validator.
pub fn record_request_validated(outcome: Outcome) {
    counter!(names::REQUESTS_VALIDATED, "outcome" => outcome.as_str()).increment(1);
}

/// Records a contract violation.
///
/// * `kind` - error kind label (e.g. "route_not_found")
/// * `stage` - stage that detected it ("route", "request", "response")
/// * `enforced` - whether the violation was blocked
pub fn record_violation(kind: &'static str, stage: &'static str, enforced: bool) {
    counter!(
        names::VIOLATIONS,
        "kind" => kind,
        "stage" => stage,
        "enforced" => if enforced { "true" } else { "false" }
    )
    .increment(1);
}

/// Records the stage duration when dropped.
#[derive(Debug)]
pub struct StageTimer {
    stage: &'static str,
    started: Instant,
}

impl StageTimer {
    /// Starts timing `stage`.
    #[must_use]
    pub fn start(stage: &'static str) -> Self {
        Self {
            stage,
            started: Instant::now(),
        }
    }
}

impl Drop for StageTimer {
    fn drop(&mut self) {
        histogram!(names::STAGE_DURATION, "stage" => self.stage)
            .record(self.started.elapsed().as_secs_f64());
    }
}
