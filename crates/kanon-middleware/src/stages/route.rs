//! Route resolution.
//!
//! Rebuilds the absolute URL the client addressed (scheme from the TLS
//! marker, host from the `Host` header) and asks the engine's router for the
//! matching operation.

use std::sync::Arc;

use bytes::Bytes;
use http::header;
use http::request::Parts;
use kanon_core::ValidatorError;
use kanon_spec::params::parse_query;
use kanon_spec::{EngineError, RequestValidationInput, RouteError, ValidationEngine, ValidationOptions};
use tracing::debug;
use url::Url;

/// Maps requests to documented operations.
pub struct RouteResolver {
    engine: Arc<dyn ValidationEngine>,
    options: ValidationOptions,
    path_prefix: String,
    validate_servers: bool,
}

impl RouteResolver {
    /// Creates a resolver.
    pub fn new(
        engine: Arc<dyn ValidationEngine>,
        options: ValidationOptions,
        path_prefix: impl Into<String>,
        validate_servers: bool,
    ) -> Self {
        Self {
            engine,
            options,
            path_prefix: path_prefix.into(),
            validate_servers,
        }
    }

    /// Resolves the request to a validation input.
    ///
    /// Returns `Ok(None)` when the request matches no server but server
    /// validation is disabled; later stages then have nothing to check.
    pub fn resolve(
        &self,
        parts: &Parts,
        body: Bytes,
        tls: bool,
    ) -> Result<Option<RequestValidationInput>, ValidatorError> {
        let url = self.request_url(parts, tls)?;

        let (route, path_params) = match self.engine.find_route(&parts.method, &url) {
            Ok(found) => found,
            Err(EngineError::Route(reason)) => return self.route_failure(reason),
            Err(other) => {
                return Err(ValidatorError::internal_with_source(
                    format!("error validating route: {other}"),
                    other,
                ))
            }
        };

        debug!(
            method = %parts.method,
            path = %url.path(),
            template = %route.key.path_template,
            "route resolved"
        );

        Ok(Some(RequestValidationInput {
            route,
            path_params,
            query_params: parse_query(url.query()),
            method: parts.method.clone(),
            headers: parts.headers.clone(),
            body,
            options: self.options.clone(),
        }))
    }

    fn route_failure(
        &self,
        reason: RouteError,
    ) -> Result<Option<RequestValidationInput>, ValidatorError> {
        match reason {
            RouteError::NoMatchingServer if !self.validate_servers => {
                debug!("request matches no server, ignored");
                Ok(None)
            }
            RouteError::NoMatchingServer => Err(ValidatorError::server_mismatch(reason.reason())),
            RouteError::MethodNotAllowed => Err(ValidatorError::method_not_allowed(reason.reason())),
            RouteError::PathNotFound | RouteError::Other(_) => {
                Err(ValidatorError::route_not_found(reason.reason()))
            }
        }
    }

    fn request_url(&self, parts: &Parts, tls: bool) -> Result<Url, ValidatorError> {
        let path = parts.uri.path();
        let path = if self.path_prefix.is_empty() {
            path
        } else {
            path.strip_prefix(self.path_prefix.as_str()).unwrap_or(path)
        };

        let host = parts
            .headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| parts.uri.authority().map(|a| a.as_str().to_string()))
            .ok_or_else(|| ValidatorError::internal("error validating route: request has no host"))?;

        let scheme = if tls { "https" } else { "http" };
        let mut raw = format!("{scheme}://{host}");
        if !path.starts_with('/') {
            raw.push('/');
        }
        raw.push_str(path);
        if let Some(query) = parts.uri.query() {
            raw.push('?');
            raw.push_str(query);
        }

        Url::parse(&raw).map_err(|e| {
            ValidatorError::internal_with_source(format!("error validating route: {e}"), e)
        })
    }
}

impl std::fmt::Debug for RouteResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteResolver")
            .field("path_prefix", &self.path_prefix)
            .field("validate_servers", &self.validate_servers)
            .finish_non_exhaustive()
    }
}
