//! Turning a loaded specification into validator state.
//!
//! Preparation never mutates the loaded document. It derives a copy with
//! the optional facets pruned according to the configuration, appends the
//! additional servers and compiles the engine from that copy.

use std::sync::Arc;

use kanon_config::{ConfigError, ValidatorConfig};
use kanon_core::ValidatorError;
use kanon_spec::{
    noop_authentication, with_additional_servers, AuthenticationDispatcher, OpenApiEngine,
    ServerMatching, Specification, ValidationEngine, ValidationOptions,
};
use tracing::{debug, info};

/// Immutable state shared by every request a validator handles.
#[derive(Clone)]
pub struct PreparedState {
    /// The derived specification the engine was built from.
    pub specification: Arc<Specification>,
    /// Router and validator for the derived specification.
    pub engine: Arc<dyn ValidationEngine>,
    /// Defaults copied into every validation input.
    pub options: ValidationOptions,
}

impl std::fmt::Debug for PreparedState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedState")
            .field("servers", &self.specification.servers.len())
            .field("operations", &self.specification.operation_count())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Derives validator state from `specification` and `config`.
///
/// # Errors
///
/// Returns a `Configuration` error when the configuration is inconsistent
/// or the engine cannot be built from the derived specification.
pub fn prepare(
    specification: &Specification,
    config: &ValidatorConfig,
) -> Result<PreparedState, ValidatorError> {
    config.validate().map_err(configuration_error)?;

    let mut derived = specification.clone();

    if !config.should_validate_servers() {
        debug!("server validation disabled, clearing server list");
        derived.servers.clear();
    }

    let authentication = if config.should_validate_security() {
        AuthenticationDispatcher::new().into_func()
    } else {
        debug!("security validation disabled, clearing top-level requirements");
        derived.security.clear();
        noop_authentication()
    };

    let derived = with_additional_servers(&derived, config.additional_servers.as_deref());

    let matching = if config.should_validate_servers() {
        ServerMatching::Strict
    } else {
        ServerMatching::PathOnly
    };
    let engine = OpenApiEngine::with_server_matching(&derived, matching)
        .map_err(|e| ValidatorError::configuration(e.to_string()))?;

    info!(
        title = %derived.info.title,
        servers = derived.servers.len(),
        operations = derived.operation_count(),
        "specification prepared"
    );

    Ok(PreparedState {
        specification: Arc::new(derived),
        engine: Arc::new(engine),
        options: ValidationOptions {
            exclude_request_body: false,
            exclude_response_body: false,
            include_response_status: true,
            authentication,
        },
    })
}

pub(crate) fn configuration_error(error: ConfigError) -> ValidatorError {
    match error {
        ConfigError::ValidationError(message) => ValidatorError::configuration(message),
        other => ValidatorError::configuration(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kanon_core::ErrorKind;
    use kanon_spec::SpecificationLoader;

    const PETSTORE: &str = r#"
openapi: 3.0.0
info: {title: Swagger Petstore, version: 1.0.0}
servers:
  - url: http://petstore.swagger.io/v1
security:
  - basicAuth: []
paths:
  /pets:
    get:
      operationId: listPets
      responses: {"200": {description: ok}}
components:
  securitySchemes:
    basicAuth: {type: http, scheme: basic}
"#;

    fn spec() -> Specification {
        SpecificationLoader::from_yaml_str(PETSTORE).unwrap()
    }

    #[test]
    fn test_route_invariant_fails_preparation() {
        let config = ValidatorConfig::builder().validate_routes(false).build();
        let err = prepare(&spec(), &config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err
            .to_string()
            .contains("route validation can't be disabled"));
    }

    #[test]
    fn test_routes_may_be_disabled_alone() {
        let config = ValidatorConfig::builder()
            .validate_routes(false)
            .validate_requests(false)
            .validate_responses(false)
            .build();
        assert!(prepare(&spec(), &config).is_ok());
    }

    #[test]
    fn test_defaults_keep_servers_and_security() {
        let original = spec();
        let state = prepare(&original, &ValidatorConfig::default()).unwrap();

        assert_eq!(state.specification.servers.len(), 1);
        assert_eq!(state.specification.security.len(), 1);
        assert!(!state.options.exclude_request_body);
        assert!(!state.options.exclude_response_body);
        assert!(state.options.include_response_status);
    }

    #[test]
    fn test_disabled_facets_are_pruned_from_copy() {
        let original = spec();
        let config = ValidatorConfig::builder()
            .validate_servers(false)
            .validate_security(false)
            .build();
        let state = prepare(&original, &config).unwrap();

        assert!(state.specification.servers.is_empty());
        assert!(state.specification.security.is_empty());
        assert_eq!(original.servers.len(), 1);
        assert_eq!(original.security.len(), 1);
    }

    #[test]
    fn test_additional_servers_appended() {
        let config = ValidatorConfig::builder()
            .additional_servers(["https://localhost:9443/api", "", "not a url"])
            .build();
        let state = prepare(&spec(), &config).unwrap();

        let urls: Vec<_> = state
            .specification
            .servers
            .iter()
            .map(|s| s.url.as_str())
            .collect();
        assert_eq!(urls, vec!["http://petstore.swagger.io/v1", "https://localhost:9443/api"]);
    }

    #[test]
    fn test_additional_servers_survive_disabled_server_validation() {
        let config = ValidatorConfig::builder()
            .validate_servers(false)
            .additional_servers(["http://localhost:8080"])
            .build();
        let state = prepare(&spec(), &config).unwrap();
        assert_eq!(state.specification.servers.len(), 1);
        assert_eq!(state.specification.servers[0].url, "http://localhost:8080");
    }

    #[test]
    fn test_disabled_server_validation_routes_any_host() {
        let config = ValidatorConfig::builder()
            .validate_servers(false)
            .additional_servers(["http://localhost:8080/v1"])
            .build();
        let state = prepare(&spec(), &config).unwrap();

        let url = url::Url::parse("http://elsewhere.example/v1/pets").unwrap();
        let (route, _) = state.engine.find_route(&http::Method::GET, &url).unwrap();
        assert_eq!(route.operation_id.as_deref(), Some("listPets"));

        let url = url::Url::parse("http://elsewhere.example/v1/petz").unwrap();
        assert_eq!(
            state.engine.find_route(&http::Method::GET, &url).unwrap_err().to_string(),
            "Path was not found"
        );
    }

    #[test]
    fn test_preparing_twice_is_deterministic() {
        let original = spec();
        let config = ValidatorConfig::builder()
            .additional_servers(["http://localhost:9443/api"])
            .build();
        let a = prepare(&original, &config).unwrap();
        let b = prepare(&original, &config).unwrap();
        assert_eq!(a.specification, b.specification);
    }
}
