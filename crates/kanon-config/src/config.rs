//! Main configuration types.
//!
//! This module provides the top-level [`ValidatorConfig`] struct and its builder.

use serde::{Deserialize, Serialize};

use crate::{ConfigError, TelemetryConfigSection};

/// Complete validator configuration.
///
/// Immutable once the validator has been provisioned. Use
/// [`ConfigLoader`](crate::ConfigLoader) to load it from files and
/// environment variables, or [`ValidatorConfig::builder`] in code.
///
/// # Example
///
/// ```
/// use kanon_config::ValidatorConfig;
///
/// let config = ValidatorConfig::default();
/// assert!(config.should_validate_requests());
/// assert!(config.should_log());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct ValidatorConfig {
    /// Path or `http(s)` URI of the OpenAPI document.
    #[serde(default)]
    pub filepath: String,

    /// Resolve every request to a documented operation. Unset means `true`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validate_routes: Option<bool>,

    /// Validate parameters, bodies and security of requests. Unset means `true`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validate_requests: Option<bool>,

    /// Capture and validate downstream responses. Unset means `true`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validate_responses: Option<bool>,

    /// Match the request against the declared servers. Unset means `true`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validate_servers: Option<bool>,

    /// Evaluate security requirements. Unset means `true`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validate_security: Option<bool>,

    /// Block violating traffic. When `false`, violations are only recorded.
    /// Unset means `true`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enforce: Option<bool>,

    /// Report violations to the log. Unset means `true`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<bool>,

    /// Prefix removed from the request path before route matching.
    #[serde(default)]
    pub path_prefix_to_be_trimmed: String,

    /// Base URLs appended to the document's server list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_servers: Option<Vec<String>>,

    /// Telemetry configuration (logging, metrics).
    #[serde(default)]
    pub telemetry: TelemetryConfigSection,
}

impl ValidatorConfig {
    /// Create a new configuration builder.
    ///
    /// # Example
    ///
    /// ```
    /// use kanon_config::ValidatorConfig;
    ///
    /// let config = ValidatorConfig::builder()
    ///     .filepath("openapi.json")
    ///     .validate_servers(false)
    ///     .path_prefix_to_be_trimmed("/api")
    ///     .build();
    ///
    /// assert!(!config.should_validate_servers());
    /// assert_eq!(config.path_prefix_to_be_trimmed, "/api");
    /// ```
    #[must_use]
    pub fn builder() -> ValidatorConfigBuilder {
        ValidatorConfigBuilder::new()
    }

    /// Whether route validation is enabled.
    pub fn should_validate_routes(&self) -> bool {
        self.validate_routes.unwrap_or(true)
    }

    /// Whether request validation is enabled.
    pub fn should_validate_requests(&self) -> bool {
        self.validate_requests.unwrap_or(true)
    }

    /// Whether response validation is enabled.
    pub fn should_validate_responses(&self) -> bool {
        self.validate_responses.unwrap_or(true)
    }

    /// Whether server matching is enabled.
    pub fn should_validate_servers(&self) -> bool {
        self.validate_servers.unwrap_or(true)
    }

    /// Whether security requirements are evaluated.
    pub fn should_validate_security(&self) -> bool {
        self.validate_security.unwrap_or(true)
    }

    /// Whether violations are blocked.
    pub fn should_enforce(&self) -> bool {
        self.enforce.unwrap_or(true)
    }

    /// Whether violations are logged.
    pub fn should_log(&self) -> bool {
        self.log.unwrap_or(true)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if request or response
    /// validation is enabled while route validation is disabled, and
    /// `ConfigError::InvalidValue` if the metrics address is not a socket
    /// address while metrics are enabled.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if (self.should_validate_requests() || self.should_validate_responses())
            && !self.should_validate_routes()
        {
            return Err(ConfigError::validation_error(
                "route validation can't be disabled when validation of requests or responses is enabled",
            ));
        }

        if self.telemetry.metrics.enabled
            && self
                .telemetry
                .metrics
                .addr
                .parse::<std::net::SocketAddr>()
                .is_err()
        {
            return Err(ConfigError::invalid_value(
                "telemetry.metrics.addr",
                format!("invalid socket address: {}", self.telemetry.metrics.addr),
            ));
        }

        Ok(())
    }

    /// Validate the configuration and require a specification source.
    ///
    /// # Errors
    ///
    /// Everything [`validate`](Self::validate) reports, plus
    /// `ConfigError::MissingField` when `filepath` is empty.
    pub fn validate_with_source(&self) -> Result<(), ConfigError> {
        self.validate()?;
        if self.filepath.trim().is_empty() {
            return Err(ConfigError::missing_field("filepath"));
        }
        Ok(())
    }

    /// Create a development configuration preset.
    ///
    /// Observe-only with pretty debug logs, so a new contract can be rolled
    /// out without blocking traffic.
    ///
    /// # Example
    ///
    /// ```
    /// use kanon_config::ValidatorConfig;
    ///
    /// let config = ValidatorConfig::development();
    /// assert!(!config.should_enforce());
    /// assert_eq!(config.telemetry.logging.level, "debug");
    /// ```
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();

        config.telemetry.logging.level = "debug".to_string();
        config.telemetry.logging.format = crate::LogFormat::Pretty;
        config.telemetry.logging.ansi_enabled = true;
        config.telemetry.logging.include_location = true;

        config.enforce = Some(false);

        config
    }

    /// Create a production configuration preset.
    ///
    /// # Example
    ///
    /// ```
    /// use kanon_config::ValidatorConfig;
    ///
    /// let config = ValidatorConfig::production();
    /// assert!(config.should_enforce());
    /// assert_eq!(config.telemetry.logging.format, kanon_config::LogFormat::Json);
    /// ```
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();

        config.telemetry.logging.level = "info".to_string();
        config.telemetry.logging.format = crate::LogFormat::Json;
        config.telemetry.logging.ansi_enabled = false;
        config.telemetry.metrics.enabled = true;

        config.enforce = Some(true);

        config
    }
}

/// Builder for [`ValidatorConfig`].
#[derive(Debug, Default)]
pub struct ValidatorConfigBuilder {
    config: ValidatorConfig,
}

impl ValidatorConfigBuilder {
    /// Create a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the specification path or URI.
    #[must_use]
    pub fn filepath(mut self, filepath: impl Into<String>) -> Self {
        self.config.filepath = filepath.into();
        self
    }

    /// Toggle route validation.
    #[must_use]
    pub fn validate_routes(mut self, enabled: bool) -> Self {
        self.config.validate_routes = Some(enabled);
        self
    }

    /// Toggle request validation.
    #[must_use]
    pub fn validate_requests(mut self, enabled: bool) -> Self {
        self.config.validate_requests = Some(enabled);
        self
    }

    /// Toggle response validation.
    #[must_use]
    pub fn validate_responses(mut self, enabled: bool) -> Self {
        self.config.validate_responses = Some(enabled);
        self
    }

    /// Toggle server matching.
    #[must_use]
    pub fn validate_servers(mut self, enabled: bool) -> Self {
        self.config.validate_servers = Some(enabled);
        self
    }

    /// Toggle security requirement evaluation.
    #[must_use]
    pub fn validate_security(mut self, enabled: bool) -> Self {
        self.config.validate_security = Some(enabled);
        self
    }

    /// Toggle enforcement.
    #[must_use]
    pub fn enforce(mut self, enabled: bool) -> Self {
        self.config.enforce = Some(enabled);
        self
    }

    /// Toggle violation logging.
    #[must_use]
    pub fn log(mut self, enabled: bool) -> Self {
        self.config.log = Some(enabled);
        self
    }

    /// Set the path prefix trimmed before matching.
    #[must_use]
    pub fn path_prefix_to_be_trimmed(mut self, prefix: impl Into<String>) -> Self {
        self.config.path_prefix_to_be_trimmed = prefix.into();
        self
    }

    /// Set the additional servers.
    #[must_use]
    pub fn additional_servers<I, S>(mut self, servers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.additional_servers = Some(servers.into_iter().map(Into::into).collect());
        self
    }

    /// Set the telemetry section.
    #[must_use]
    pub fn telemetry(mut self, telemetry: TelemetryConfigSection) -> Self {
        self.config.telemetry = telemetry;
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> ValidatorConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_toggles_default_to_true() {
        let config = ValidatorConfig::default();
        assert!(config.should_validate_routes());
        assert!(config.should_validate_requests());
        assert!(config.should_validate_responses());
        assert!(config.should_validate_servers());
        assert!(config.should_validate_security());
        assert!(config.should_enforce());
        assert!(config.should_log());
    }

    #[test]
    fn test_routes_disabled_with_requests_enabled_is_rejected() {
        let config = ValidatorConfig::builder().validate_routes(false).build();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_routes_disabled_with_responses_only_is_rejected() {
        let config = ValidatorConfig::builder()
            .validate_routes(false)
            .validate_requests(false)
            .build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_everything_disabled_is_accepted() {
        let config = ValidatorConfig::builder()
            .validate_routes(false)
            .validate_requests(false)
            .validate_responses(false)
            .build();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_metrics_addr() {
        let mut config = ValidatorConfig::default();
        config.telemetry.metrics.enabled = true;
        config.telemetry.metrics.addr = "not-an-addr".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_missing_source() {
        let config = ValidatorConfig::default();
        assert!(matches!(
            config.validate_with_source(),
            Err(ConfigError::MissingField { .. })
        ));

        let config = ValidatorConfig::builder().filepath("spec.yaml").build();
        assert!(config.validate_with_source().is_ok());
    }

    #[test]
    fn test_builder_additional_servers() {
        let config = ValidatorConfig::builder()
            .additional_servers(["https://a.example.com", "wss://b.example.com"])
            .build();
        assert_eq!(
            config.additional_servers,
            Some(vec![
                "https://a.example.com".to_string(),
                "wss://b.example.com".to_string()
            ])
        );
    }

    #[test]
    fn test_unset_toggles_are_not_serialized() {
        let json = serde_json::to_value(ValidatorConfig::default()).unwrap();
        assert!(json.get("enforce").is_none());
        assert!(json.get("validate_routes").is_none());
    }
}
