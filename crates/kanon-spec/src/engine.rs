//! Validation engine.
//!
//! [`ValidationEngine`] is the seam between the middleware and the code that
//! knows OpenAPI semantics. [`OpenApiEngine`] is the built-in implementation:
//! it compiles every operation's schemas once and then validates requests
//! and responses without further allocation of validators.
//!
//! Request validation runs in a fixed order: parameters, then the body, then
//! security requirements. The first failing step wins, except that security
//! requirements are only evaluated once the request is otherwise well-formed.

use std::collections::HashMap;
use std::fmt;

use bytes::Bytes;
use http::{header, HeaderMap, Method, StatusCode};
use indexmap::IndexMap;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::auth::{noop_authentication, AuthenticationFunc, AuthenticationInput, RequestFacts};
use crate::error::{EngineError, RequestError, ResponseError};
use crate::model::{
    Components, Header, Parameter, ParameterLocation, RefOr, RequestBody, Response,
    SecurityRequirement, SecurityScheme, Specification,
};
use crate::params::{coerce, cookie_value, query_values};
use crate::router::{OperationKey, PathParams, Route, Router, ServerMatching};
use crate::schema::{CompiledSchema, SchemaResolver};

/// Per-request validation switches and the authentication callback.
#[derive(Clone)]
pub struct ValidationOptions {
    /// Skip request body validation.
    pub exclude_request_body: bool,
    /// Skip response body validation.
    pub exclude_response_body: bool,
    /// Fail responses whose status is not documented.
    pub include_response_status: bool,
    /// Invoked once per security scheme an operation requires.
    pub authentication: AuthenticationFunc,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            exclude_request_body: false,
            exclude_response_body: false,
            include_response_status: true,
            authentication: noop_authentication(),
        }
    }
}

impl fmt::Debug for ValidationOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationOptions")
            .field("exclude_request_body", &self.exclude_request_body)
            .field("exclude_response_body", &self.exclude_response_body)
            .field("include_response_status", &self.include_response_status)
            .finish_non_exhaustive()
    }
}

/// Everything needed to validate one request.
#[derive(Debug, Clone)]
pub struct RequestValidationInput {
    /// The matched operation.
    pub route: Route,
    /// Path parameters extracted by the router.
    pub path_params: PathParams,
    /// Decoded query parameters, in order.
    pub query_params: Vec<(String, String)>,
    /// Request method.
    pub method: Method,
    /// Request headers.
    pub headers: HeaderMap,
    /// Request body.
    pub body: Bytes,
    /// Validation switches.
    pub options: ValidationOptions,
}

/// A captured response paired with the request it answers.
#[derive(Debug, Clone, Copy)]
pub struct ResponseValidationInput<'a> {
    /// The request input the response belongs to.
    pub request: &'a RequestValidationInput,
    /// Response status.
    pub status: StatusCode,
    /// Response headers.
    pub headers: &'a HeaderMap,
    /// Response body.
    pub body: &'a [u8],
}

/// Matches requests to operations and validates traffic against them.
pub trait ValidationEngine: Send + Sync {
    /// Find the operation for `method` and `url`.
    fn find_route(&self, method: &Method, url: &Url) -> Result<(Route, PathParams), EngineError>;

    /// Validate a request against its operation.
    fn validate_request(
        &self,
        input: &RequestValidationInput,
        cancellation: &CancellationToken,
    ) -> Result<(), EngineError>;

    /// Validate a response against its operation.
    fn validate_response(
        &self,
        input: &ResponseValidationInput<'_>,
        cancellation: &CancellationToken,
    ) -> Result<(), EngineError>;
}

/// The built-in OpenAPI 3 engine.
pub struct OpenApiEngine {
    router: Router,
    operations: HashMap<OperationKey, CompiledOperation>,
    security_schemes: IndexMap<String, SecurityScheme>,
}

struct CompiledOperation {
    parameters: Vec<CompiledParameter>,
    request_body: Option<CompiledBody>,
    responses: IndexMap<String, CompiledResponse>,
    security: Vec<SecurityRequirement>,
}

struct CompiledParameter {
    name: String,
    location: ParameterLocation,
    required: bool,
    schema: Option<CompiledSchema>,
}

struct CompiledBody {
    required: bool,
    content: Vec<(String, Option<CompiledSchema>)>,
}

struct CompiledResponse {
    headers: Vec<CompiledHeader>,
    content: Vec<(String, Option<CompiledSchema>)>,
}

struct CompiledHeader {
    name: String,
    required: bool,
    schema: Option<CompiledSchema>,
}

impl OpenApiEngine {
    /// Compile `spec` into an engine that enforces declared servers.
    pub fn new(spec: &Specification) -> Result<Self, EngineError> {
        Self::with_server_matching(spec, ServerMatching::Strict)
    }

    /// Compile `spec` into an engine with the given server policy.
    pub fn with_server_matching(
        spec: &Specification,
        matching: ServerMatching,
    ) -> Result<Self, EngineError> {
        let router = Router::with_server_matching(spec, matching)?;
        let resolver = SchemaResolver::new(&spec.components);

        let mut operations = HashMap::new();
        for (path, method, operation) in spec.operations() {
            let context = format!("{} {}", method, path);
            let item = &spec.paths[path];

            let parameters = merge_parameters(&spec.components, &item.parameters, &operation.parameters)
                .map_err(|e| EngineError::build(format!("{}: {}", context, e)))?
                .into_iter()
                .map(|param| compile_parameter(&resolver, param))
                .collect::<Result<Vec<_>, String>>()
                .map_err(|e| EngineError::build(format!("{}: {}", context, e)))?;

            let request_body = operation
                .request_body
                .as_ref()
                .map(|body| {
                    let body = resolve_component(body, "requestBodies", &spec.components.request_bodies)?;
                    compile_body(&resolver, body)
                })
                .transpose()
                .map_err(|e| EngineError::build(format!("{}: {}", context, e)))?;

            let responses = operation
                .responses
                .iter()
                .map(|(status, response)| {
                    let response = resolve_component(response, "responses", &spec.components.responses)?;
                    Ok((status.clone(), compile_response(&resolver, &spec.components, response)?))
                })
                .collect::<Result<IndexMap<_, _>, String>>()
                .map_err(|e| EngineError::build(format!("{}: {}", context, e)))?;

            let security = operation
                .security
                .clone()
                .unwrap_or_else(|| spec.security.clone());

            operations.insert(
                OperationKey {
                    method,
                    path_template: path.to_string(),
                },
                CompiledOperation {
                    parameters,
                    request_body,
                    responses,
                    security,
                },
            );
        }

        debug!(operations = operations.len(), "validation engine compiled");

        Ok(Self {
            router,
            operations,
            security_schemes: spec.components.security_schemes.clone(),
        })
    }

    fn operation(&self, route: &Route) -> Result<&CompiledOperation, EngineError> {
        self.operations.get(&route.key).ok_or_else(|| {
            EngineError::build(format!(
                "no compiled operation for {} {}",
                route.key.method, route.key.path_template
            ))
        })
    }

    fn validate_parameters(
        &self,
        operation: &CompiledOperation,
        input: &RequestValidationInput,
    ) -> Result<(), RequestError> {
        for param in &operation.parameters {
            let values: Vec<String> = match param.location {
                ParameterLocation::Path => input.path_params.get(&param.name).cloned().into_iter().collect(),
                ParameterLocation::Query => query_values(&input.query_params, &param.name)
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
                ParameterLocation::Header => input
                    .headers
                    .get_all(param.name.as_str())
                    .iter()
                    .filter_map(|v| v.to_str().ok())
                    .map(str::to_string)
                    .collect(),
                ParameterLocation::Cookie => cookie_value(&input.headers, &param.name).into_iter().collect(),
            };

            let summary = |reason: &str| {
                format!(
                    "parameter \"{}\" in {} has an error: {}",
                    param.name, param.location, reason
                )
            };

            if values.is_empty() {
                if param.required {
                    return Err(RequestError::new(summary("value is required but missing")));
                }
                continue;
            }

            if let Some(schema) = &param.schema {
                let raw: Vec<&str> = values.iter().map(String::as_str).collect();
                let value = coerce(&raw, schema.schema());
                schema
                    .validate(&value)
                    .map_err(|v| RequestError::new(summary(&v.message)).with_detail(v.detail))?;
            }
        }

        Ok(())
    }

    fn validate_request_body(
        &self,
        operation: &CompiledOperation,
        input: &RequestValidationInput,
    ) -> Result<(), RequestError> {
        let Some(body) = &operation.request_body else {
            return Ok(());
        };

        let summary = |reason: &str| format!("request body has an error: {}", reason);

        if input.body.is_empty() {
            if body.required {
                return Err(RequestError::new(summary("value is required but missing")));
            }
            return Ok(());
        }

        let content_type = media_type(&input.headers)
            .ok_or_else(|| RequestError::new(summary("header Content-Type is missing")))?;

        let schema = find_media(&body.content, &content_type).ok_or_else(|| {
            RequestError::new(summary(&format!(
                "header Content-Type has unexpected value: {:?}",
                content_type
            )))
        })?;

        let (Some(schema), true) = (schema, is_json(&content_type)) else {
            return Ok(());
        };

        let value: Value = serde_json::from_slice(&input.body).map_err(|e| {
            RequestError::new(summary(&format!("failed to decode request body: {}", e)))
        })?;

        schema.validate(&value).map_err(|v| {
            RequestError::new(summary(&format!("doesn't match schema: {}", v.message)))
                .with_detail(v.detail)
        })
    }

    fn validate_security(
        &self,
        operation: &CompiledOperation,
        input: &RequestValidationInput,
    ) -> Result<(), EngineError> {
        if operation.security.is_empty() {
            return Ok(());
        }

        let facts = RequestFacts {
            method: &input.method,
            headers: &input.headers,
            query: &input.query_params,
        };

        let mut errors = Vec::new();
        'alternatives: for requirement in &operation.security {
            for (name, scopes) in requirement {
                let Some(scheme) = self.security_schemes.get(name) else {
                    errors.push(format!("security scheme {:?} is not declared", name));
                    continue 'alternatives;
                };

                let auth_input = AuthenticationInput {
                    scheme_name: name,
                    scheme,
                    scopes,
                    request: facts,
                };

                if let Err(e) = (input.options.authentication)(&auth_input) {
                    errors.push(e.to_string());
                    continue 'alternatives;
                }
            }

            // Every scheme of this alternative passed (or it was empty).
            return Ok(());
        }

        Err(EngineError::SecurityRequirements { errors })
    }

    fn validate_response_headers(
        &self,
        response: &CompiledResponse,
        headers: &HeaderMap,
    ) -> Result<(), ResponseError> {
        for declared in &response.headers {
            let values: Vec<&str> = headers
                .get_all(declared.name.as_str())
                .iter()
                .filter_map(|v| v.to_str().ok())
                .collect();

            if values.is_empty() {
                if declared.required {
                    return Err(ResponseError::new(format!(
                        "header {:?} is required but missing",
                        declared.name
                    )));
                }
                continue;
            }

            if let Some(schema) = &declared.schema {
                let value = coerce(&values, schema.schema());
                schema.validate(&value).map_err(|v| {
                    ResponseError::new(format!(
                        "header {:?} doesn't match schema: {}",
                        declared.name, v.message
                    ))
                    .with_detail(v.detail)
                })?;
            }
        }

        Ok(())
    }

    fn validate_response_body(
        &self,
        response: &CompiledResponse,
        input: &ResponseValidationInput<'_>,
    ) -> Result<(), ResponseError> {
        if response.content.is_empty() || input.body.is_empty() {
            return Ok(());
        }

        let content_type = media_type(input.headers)
            .ok_or_else(|| ResponseError::new("header Content-Type is missing"))?;

        let schema = find_media(&response.content, &content_type).ok_or_else(|| {
            ResponseError::new(format!(
                "header Content-Type has unexpected value: {:?}",
                content_type
            ))
        })?;

        let (Some(schema), true) = (schema, is_json(&content_type)) else {
            return Ok(());
        };

        let value: Value = serde_json::from_slice(input.body)
            .map_err(|e| ResponseError::new(format!("body has an error: failed to decode: {}", e)))?;

        schema.validate(&value).map_err(|v| {
            ResponseError::new(format!("body doesn't match schema: {}", v.message))
                .with_detail(v.detail)
        })
    }
}

impl ValidationEngine for OpenApiEngine {
    fn find_route(&self, method: &Method, url: &Url) -> Result<(Route, PathParams), EngineError> {
        Ok(self.router.find(method, url)?)
    }

    fn validate_request(
        &self,
        input: &RequestValidationInput,
        cancellation: &CancellationToken,
    ) -> Result<(), EngineError> {
        let operation = self.operation(&input.route)?;

        check_cancelled(cancellation)?;
        self.validate_parameters(operation, input)?;

        if !input.options.exclude_request_body {
            check_cancelled(cancellation)?;
            self.validate_request_body(operation, input)?;
        }

        check_cancelled(cancellation)?;
        self.validate_security(operation, input)
    }

    fn validate_response(
        &self,
        input: &ResponseValidationInput<'_>,
        cancellation: &CancellationToken,
    ) -> Result<(), EngineError> {
        check_cancelled(cancellation)?;
        let operation = self.operation(&input.request.route)?;

        let Some(response) = lookup_response(&operation.responses, input.status) else {
            if input.request.options.include_response_status {
                return Err(ResponseError::new(format!(
                    "status code {} is not documented",
                    input.status.as_u16()
                ))
                .into());
            }
            return Ok(());
        };

        self.validate_response_headers(response, input.headers)?;

        if !input.request.options.exclude_response_body {
            check_cancelled(cancellation)?;
            self.validate_response_body(response, input)?;
        }

        Ok(())
    }
}

impl fmt::Debug for OpenApiEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenApiEngine")
            .field("router", &self.router)
            .field("operations", &self.operations.len())
            .field("security_schemes", &self.security_schemes.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn check_cancelled(cancellation: &CancellationToken) -> Result<(), EngineError> {
    if cancellation.is_cancelled() {
        Err(EngineError::Cancelled)
    } else {
        Ok(())
    }
}

/// Exact code, then `NXX` range, then `default`.
fn lookup_response(
    responses: &IndexMap<String, CompiledResponse>,
    status: StatusCode,
) -> Option<&CompiledResponse> {
    let code = status.as_u16();
    let range = format!("{}XX", code / 100);

    responses
        .get(status.as_str())
        .or_else(|| {
            responses
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(&range))
                .map(|(_, response)| response)
        })
        .or_else(|| responses.get("default"))
}

/// The request or response media type, lowercased and without parameters.
fn media_type(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::CONTENT_TYPE)?.to_str().ok()?;
    let essence = value.split(';').next().unwrap_or_default().trim();
    (!essence.is_empty()).then(|| essence.to_ascii_lowercase())
}

fn is_json(media_type: &str) -> bool {
    media_type == "application/json" || media_type.ends_with("+json") || media_type.ends_with("/json")
}

/// Exact media type, then `type/*`, then `*/*`.
fn find_media<'a>(
    content: &'a [(String, Option<CompiledSchema>)],
    media_type: &str,
) -> Option<&'a Option<CompiledSchema>> {
    let wildcard = media_type
        .split_once('/')
        .map(|(kind, _)| format!("{}/*", kind))
        .unwrap_or_default();

    [media_type, wildcard.as_str(), "*/*"].iter().find_map(|candidate| {
        content
            .iter()
            .find(|(declared, _)| declared.eq_ignore_ascii_case(candidate))
            .map(|(_, schema)| schema)
    })
}

fn resolve_component<'a, T>(
    item: &'a RefOr<T>,
    section: &str,
    components: &'a IndexMap<String, T>,
) -> Result<&'a T, String> {
    match item {
        RefOr::Item(value) => Ok(value),
        RefOr::Ref { reference } => {
            let prefix = format!("#/components/{}/", section);
            let name = reference
                .strip_prefix(&prefix)
                .ok_or_else(|| format!("unsupported reference '{}'", reference))?;
            components
                .get(name)
                .ok_or_else(|| format!("referenced {} '{}' not found", section, name))
        }
    }
}

/// Path-level parameters overridden by operation-level ones with the same
/// name and location.
fn merge_parameters<'a>(
    components: &'a Components,
    path_level: &'a [RefOr<Parameter>],
    operation_level: &'a [RefOr<Parameter>],
) -> Result<Vec<&'a Parameter>, String> {
    let mut merged: Vec<&Parameter> = Vec::new();
    for item in path_level.iter().chain(operation_level) {
        let param = resolve_component(item, "parameters", &components.parameters)?;
        merged.retain(|existing| !(existing.name == param.name && existing.location == param.location));
        merged.push(param);
    }
    Ok(merged)
}

fn compile_parameter(resolver: &SchemaResolver<'_>, param: &Parameter) -> Result<CompiledParameter, String> {
    Ok(CompiledParameter {
        name: param.name.clone(),
        location: param.location,
        required: param.required || param.location == ParameterLocation::Path,
        schema: param
            .schema
            .as_ref()
            .map(|schema| CompiledSchema::compile(resolver, schema))
            .transpose()
            .map_err(|e| format!("parameter {:?}: {}", param.name, e))?,
    })
}

fn compile_content(
    resolver: &SchemaResolver<'_>,
    content: &IndexMap<String, crate::model::MediaType>,
) -> Result<Vec<(String, Option<CompiledSchema>)>, String> {
    content
        .iter()
        .map(|(media, entry)| {
            let schema = entry
                .schema
                .as_ref()
                .map(|schema| CompiledSchema::compile(resolver, schema))
                .transpose()
                .map_err(|e| format!("{}: {}", media, e))?;
            Ok((media.to_ascii_lowercase(), schema))
        })
        .collect()
}

fn compile_body(resolver: &SchemaResolver<'_>, body: &RequestBody) -> Result<CompiledBody, String> {
    Ok(CompiledBody {
        required: body.required,
        content: compile_content(resolver, &body.content)?,
    })
}

fn compile_response(
    resolver: &SchemaResolver<'_>,
    components: &Components,
    response: &Response,
) -> Result<CompiledResponse, String> {
    let headers = response
        .headers
        .iter()
        // Content-Type is described by `content`, not by a header entry.
        .filter(|(name, _)| !name.eq_ignore_ascii_case("content-type"))
        .map(|(name, declared)| {
            let declared: &Header = resolve_component(declared, "headers", &components.headers)?;
            Ok(CompiledHeader {
                name: name.clone(),
                required: declared.required,
                schema: declared
                    .schema
                    .as_ref()
                    .map(|schema| CompiledSchema::compile(resolver, schema))
                    .transpose()
                    .map_err(|e| format!("header {:?}: {}", name, e))?,
            })
        })
        .collect::<Result<Vec<_>, String>>()?;

    Ok(CompiledResponse {
        headers,
        content: compile_content(resolver, &response.content)?,
    })
}
