//! Operation routing.
//!
//! The router maps a request URL and method to a documented operation. A URL
//! is first matched against the declared servers; the remainder of the path
//! after the server's base path is then matched against the path templates.

use std::collections::HashMap;

use http::Method;
use regex::Regex;
use tracing::debug;
use url::Url;

use crate::error::{EngineError, RouteError};
use crate::model::{Server, Specification};

/// Path parameters extracted from a matched template, by name.
pub type PathParams = HashMap<String, String>;

/// Identifies an operation: method plus path template.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationKey {
    /// HTTP method.
    pub method: Method,
    /// Path template as written in the document.
    pub path_template: String,
}

/// A matched operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Operation identity.
    pub key: OperationKey,
    /// The operation's `operationId`, if declared.
    pub operation_id: Option<String>,
    /// URL template of the server that matched, if servers are declared.
    pub server_url: Option<String>,
}

/// How the router treats the origin (scheme, host and port) of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServerMatching {
    /// A request must match the origin and base path of a declared server.
    #[default]
    Strict,
    /// Origins are ignored. Declared base paths are still stripped when
    /// present, and any path falls back to matching from the root, so
    /// routing never fails with [`RouteError::NoMatchingServer`].
    PathOnly,
}

/// Compiled server and path tables for one specification.
#[derive(Debug)]
pub struct Router {
    servers: Vec<CompiledServer>,
    paths: Vec<CompiledPath>,
}

#[derive(Debug)]
struct CompiledServer {
    url: Option<String>,
    /// Matches `origin + path` (absolute) or `path` (relative) and captures
    /// the remainder after the base path.
    pattern: Regex,
    absolute: bool,
}

#[derive(Debug)]
struct CompiledPath {
    template: String,
    pattern: Regex,
    param_names: Vec<String>,
    operations: Vec<(Method, Option<String>)>,
}

impl Router {
    /// Build a router for `spec` that enforces declared servers.
    pub fn new(spec: &Specification) -> Result<Self, EngineError> {
        Self::with_server_matching(spec, ServerMatching::Strict)
    }

    /// Build a router for `spec` with the given server policy.
    pub fn with_server_matching(
        spec: &Specification,
        matching: ServerMatching,
    ) -> Result<Self, EngineError> {
        let mut servers = spec
            .servers
            .iter()
            .map(|server| CompiledServer::compile(server, matching))
            .collect::<Result<Vec<_>, _>>()?;
        if servers.is_empty() || matching == ServerMatching::PathOnly {
            servers.push(CompiledServer::any()?);
        }

        let mut paths = spec
            .paths
            .iter()
            .map(|(template, item)| {
                let (pattern, param_names) = compile_path(template)?;
                Ok(CompiledPath {
                    template: template.clone(),
                    pattern,
                    param_names,
                    operations: item
                        .operations()
                        .map(|(method, op)| (method, op.operation_id.clone()))
                        .collect(),
                })
            })
            .collect::<Result<Vec<_>, EngineError>>()?;

        // Literal segments beat templated ones.
        paths.sort_by(|a, b| route_specificity(&a.template, &b.template));

        debug!(
            servers = servers.len(),
            paths = paths.len(),
            ?matching,
            "router initialized"
        );

        Ok(Self { servers, paths })
    }

    /// Find the operation for `method` and `url`.
    pub fn find(&self, method: &Method, url: &Url) -> Result<(Route, PathParams), RouteError> {
        let origin = origin_of(url);
        let path = url.path();

        let mut server_matched = false;
        let mut method_not_allowed = false;

        for server in &self.servers {
            let Some(remainder) = server.strip(&origin, path) else {
                continue;
            };
            server_matched = true;

            for compiled in &self.paths {
                let Some(captures) = compiled.pattern.captures(&remainder) else {
                    continue;
                };

                let Some((_, operation_id)) = compiled.operations.iter().find(|(m, _)| m == method)
                else {
                    method_not_allowed = true;
                    continue;
                };

                let params = compiled
                    .param_names
                    .iter()
                    .enumerate()
                    .filter_map(|(i, name)| {
                        captures
                            .get(i + 1)
                            .map(|value| (name.clone(), value.as_str().to_string()))
                    })
                    .collect();

                let route = Route {
                    key: OperationKey {
                        method: method.clone(),
                        path_template: compiled.template.clone(),
                    },
                    operation_id: operation_id.clone(),
                    server_url: server.url.clone(),
                };
                return Ok((route, params));
            }
        }

        if !server_matched {
            Err(RouteError::NoMatchingServer)
        } else if method_not_allowed {
            Err(RouteError::MethodNotAllowed)
        } else {
            Err(RouteError::PathNotFound)
        }
    }
}

impl CompiledServer {
    fn any() -> Result<Self, EngineError> {
        Ok(Self {
            url: None,
            pattern: build_regex("^(/.*)?$")?,
            absolute: false,
        })
    }

    fn compile(server: &Server, matching: ServerMatching) -> Result<Self, EngineError> {
        let (origin, base_path) = split_server_url(&server.url);
        let origin = origin.filter(|_| matching == ServerMatching::Strict);
        let base_path = base_path.trim_end_matches('/');

        let base_re = compile_template(base_path, |name| variable_pattern(server, name)).0;

        let (pattern, absolute) = match origin {
            Some(origin) => {
                let origin = normalize_origin(&origin);
                let origin_re = compile_template(&origin, |name| variable_pattern(server, name)).0;
                (format!("^(?i:{}){}(/.*)?$", origin_re, base_re), true)
            }
            None => (format!("^{}(/.*)?$", base_re), false),
        };

        Ok(Self {
            url: Some(server.url.clone()),
            pattern: build_regex(&pattern)?,
            absolute,
        })
    }

    /// Returns the request path below the server's base path.
    fn strip(&self, origin: &str, path: &str) -> Option<String> {
        let subject = if self.absolute {
            format!("{}{}", origin, path)
        } else {
            path.to_string()
        };

        let captures = self.pattern.captures(&subject)?;
        let remainder = captures
            .get(captures.len() - 1)
            .map_or("/", |m| m.as_str());
        Some(if remainder.is_empty() {
            "/".to_string()
        } else {
            remainder.to_string()
        })
    }
}

fn variable_pattern(server: &Server, name: &str) -> String {
    match server.variables.get(name) {
        Some(variable) if !variable.allowed.is_empty() => {
            let alternatives: Vec<String> =
                variable.allowed.iter().map(|v| regex::escape(v)).collect();
            format!("(?:{})", alternatives.join("|"))
        }
        _ => "(?:[^/]+)".to_string(),
    }
}

/// Splits `scheme://host[:port]/base` into origin and base path. Relative
/// servers have no origin.
fn split_server_url(url: &str) -> (Option<String>, &str) {
    match url.find("://") {
        Some(scheme_end) => {
            let after_scheme = scheme_end + 3;
            match url[after_scheme..].find('/') {
                Some(slash) => (
                    Some(url[..after_scheme + slash].to_string()),
                    &url[after_scheme + slash..],
                ),
                None => (Some(url.to_string()), ""),
            }
        }
        None => (None, url),
    }
}

/// Requests arrive over HTTP even for websocket servers, and default ports
/// are elided the same way `Url` elides them.
fn normalize_origin(origin: &str) -> String {
    let origin = if let Some(rest) = origin.strip_prefix("wss://") {
        format!("https://{}", rest)
    } else if let Some(rest) = origin.strip_prefix("ws://") {
        format!("http://{}", rest)
    } else {
        origin.to_string()
    };

    if origin.contains('{') {
        return origin;
    }

    match Url::parse(&origin) {
        Ok(url) => origin_of(&url),
        Err(_) => origin,
    }
}

fn origin_of(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    }
}

/// Translates `{name}` placeholders into capture groups and escapes the rest.
fn compile_template(
    template: &str,
    mut placeholder: impl FnMut(&str) -> String,
) -> (String, Vec<String>) {
    let mut pattern = String::new();
    let mut names = Vec::new();
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}') else {
            break;
        };
        pattern.push_str(&regex::escape(&rest[..open]));
        let name = &rest[open + 1..open + close];
        pattern.push_str(&placeholder(name));
        names.push(name.to_string());
        rest = &rest[open + close + 1..];
    }
    pattern.push_str(&regex::escape(rest));

    (pattern, names)
}

fn compile_path(template: &str) -> Result<(Regex, Vec<String>), EngineError> {
    if template == "/" {
        return Ok((build_regex("^/$")?, Vec::new()));
    }

    let (body, names) = compile_template(template.trim_end_matches('/'), |_| "([^/]+)".to_string());
    let regex = build_regex(&format!("^{}/?$", body))?;
    Ok((regex, names))
}

fn build_regex(pattern: &str) -> Result<Regex, EngineError> {
    Regex::new(pattern).map_err(|e| EngineError::build(format!("invalid route pattern {}: {}", pattern, e)))
}

/// More specific routes (fewer parameters, then longer templates) come first.
fn route_specificity(a: &str, b: &str) -> std::cmp::Ordering {
    let a_params = a.matches('{').count();
    let b_params = b.matches('{').count();

    if a_params != b_params {
        return a_params.cmp(&b_params);
    }

    b.len().cmp(&a.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::SpecificationLoader;

    const SPEC: &str = r#"
openapi: 3.0.0
info: {title: Pets, version: 1.0.0}
servers:
  - url: http://petstore.swagger.io/v1
  - url: "{scheme}://{env}.example.com:8443/api"
    variables:
      scheme: {default: https, enum: [https]}
      env: {default: prod}
paths:
  /pets:
    get: {operationId: listPets, responses: {"200": {description: ok}}}
    post: {operationId: createPets, responses: {"201": {description: ok}}}
  /pets/{petId}:
    get: {operationId: showPetById, responses: {"200": {description: ok}}}
  /pets/mine:
    get: {operationId: showMine, responses: {"200": {description: ok}}}
"#;

    fn router() -> Router {
        Router::new(&SpecificationLoader::from_yaml_str(SPEC).unwrap()).unwrap()
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_find_literal_path() {
        let (route, params) = router()
            .find(&Method::GET, &url("http://petstore.swagger.io/v1/pets"))
            .unwrap();
        assert_eq!(route.operation_id.as_deref(), Some("listPets"));
        assert_eq!(route.key.path_template, "/pets");
        assert!(params.is_empty());
    }

    #[test]
    fn test_find_extracts_params() {
        let (route, params) = router()
            .find(&Method::GET, &url("http://petstore.swagger.io/v1/pets/42"))
            .unwrap();
        assert_eq!(route.operation_id.as_deref(), Some("showPetById"));
        assert_eq!(params.get("petId").map(String::as_str), Some("42"));
    }

    #[test]
    fn test_literal_preferred_over_template() {
        let (route, _) = router()
            .find(&Method::GET, &url("http://petstore.swagger.io/v1/pets/mine"))
            .unwrap();
        assert_eq!(route.operation_id.as_deref(), Some("showMine"));
    }

    #[test]
    fn test_templated_server() {
        let (route, _) = router()
            .find(&Method::POST, &url("https://staging.example.com:8443/api/pets"))
            .unwrap();
        assert_eq!(route.operation_id.as_deref(), Some("createPets"));
        assert_eq!(
            route.server_url.as_deref(),
            Some("{scheme}://{env}.example.com:8443/api")
        );
    }

    #[test]
    fn test_server_variable_enum_enforced() {
        let err = router()
            .find(&Method::GET, &url("http://staging.example.com:8443/api/pets"))
            .unwrap_err();
        assert_eq!(err, RouteError::NoMatchingServer);
    }

    #[test]
    fn test_no_matching_server() {
        let err = router()
            .find(&Method::GET, &url("http://localhost/v1/pets"))
            .unwrap_err();
        assert_eq!(err, RouteError::NoMatchingServer);
    }

    #[test]
    fn test_path_not_found() {
        let err = router()
            .find(&Method::GET, &url("http://petstore.swagger.io/v1/petz/1"))
            .unwrap_err();
        assert_eq!(err, RouteError::PathNotFound);
    }

    #[test]
    fn test_method_not_allowed() {
        let err = router()
            .find(&Method::DELETE, &url("http://petstore.swagger.io/v1/pets"))
            .unwrap_err();
        assert_eq!(err, RouteError::MethodNotAllowed);
    }

    #[test]
    fn test_no_servers_matches_any_host() {
        let mut spec = SpecificationLoader::from_yaml_str(SPEC).unwrap();
        spec.servers.clear();
        let router = Router::new(&spec).unwrap();
        let (route, _) = router
            .find(&Method::GET, &url("http://anything:1234/pets/7"))
            .unwrap();
        assert_eq!(route.operation_id.as_deref(), Some("showPetById"));
        assert!(route.server_url.is_none());
    }

    #[test]
    fn test_relative_server_and_trailing_slash() {
        let mut spec = SpecificationLoader::from_yaml_str(SPEC).unwrap();
        spec.servers = vec![Server::new("/v1", None)];
        let router = Router::new(&spec).unwrap();
        assert!(router
            .find(&Method::GET, &url("https://any.host/v1/pets/"))
            .is_ok());
        assert_eq!(
            router
                .find(&Method::GET, &url("https://any.host/v2/pets"))
                .unwrap_err(),
            RouteError::NoMatchingServer
        );
    }

    #[test]
    fn test_host_is_case_insensitive_and_default_port_elided() {
        let mut spec = SpecificationLoader::from_yaml_str(SPEC).unwrap();
        spec.servers = vec![Server::new("HTTP://Localhost:80/api", None)];
        let router = Router::new(&spec).unwrap();
        assert!(router
            .find(&Method::GET, &url("http://localhost/api/pets"))
            .is_ok());
    }

    #[test]
    fn test_path_only_ignores_origin() {
        let spec = SpecificationLoader::from_yaml_str(SPEC).unwrap();
        let router = Router::with_server_matching(&spec, ServerMatching::PathOnly).unwrap();

        let (route, params) = router
            .find(&Method::GET, &url("http://elsewhere.example/v1/pets/7"))
            .unwrap();
        assert_eq!(route.operation_id.as_deref(), Some("showPetById"));
        assert_eq!(params["petId"], "7");
        assert_eq!(route.server_url.as_deref(), Some("http://petstore.swagger.io/v1"));

        // No base path prefix: the request path is matched from the root.
        let (route, _) = router
            .find(&Method::GET, &url("http://elsewhere.example/pets"))
            .unwrap();
        assert_eq!(route.operation_id.as_deref(), Some("listPets"));
        assert!(route.server_url.is_none());
    }

    #[test]
    fn test_path_only_still_rejects_paths_and_methods() {
        let spec = SpecificationLoader::from_yaml_str(SPEC).unwrap();
        let router = Router::with_server_matching(&spec, ServerMatching::PathOnly).unwrap();

        assert_eq!(
            router
                .find(&Method::GET, &url("http://elsewhere.example/v1/petz/1"))
                .unwrap_err(),
            RouteError::PathNotFound
        );
        assert_eq!(
            router
                .find(&Method::DELETE, &url("http://elsewhere.example/v1/pets"))
                .unwrap_err(),
            RouteError::MethodNotAllowed
        );
    }

    #[test]
    fn test_compile_template_inline_placeholder() {
        let (pattern, names) = compile_template("/files/{name}.json", |_| "([^/]+)".to_string());
        assert_eq!(names, vec!["name".to_string()]);
        assert_eq!(pattern, "/files/([^/]+)\\.json");
    }
}
