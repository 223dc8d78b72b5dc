//! Security scheme checks.
//!
//! The [`AuthenticationDispatcher`] evaluates one security scheme against one
//! request. It only verifies that credentials of the declared kind are
//! present and well-formed; it never verifies them against an identity
//! provider.
//!
//! Checks are looked up by `(type, discriminator)`, where the discriminator
//! is the HTTP auth scheme for `http` and the key location for `apiKey`. A
//! `*` discriminator acts as the fallback for its type.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use http::{header, HeaderMap, Method};
use thiserror::Error;
use tracing::warn;

use crate::model::SecurityScheme;
use crate::params::{cookie_value, query_values};

/// Fallback discriminator.
pub const ANY: &str = "*";

/// The request facts a scheme check may consult.
#[derive(Debug, Clone, Copy)]
pub struct RequestFacts<'a> {
    /// Request method.
    pub method: &'a Method,
    /// Request headers.
    pub headers: &'a HeaderMap,
    /// Decoded query parameters.
    pub query: &'a [(String, String)],
}

/// Input to one scheme check.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticationInput<'a> {
    /// Name of the scheme in `components.securitySchemes`.
    pub scheme_name: &'a str,
    /// The scheme declaration.
    pub scheme: &'a SecurityScheme,
    /// Scopes required by the operation.
    pub scopes: &'a [String],
    /// The request being checked.
    pub request: RequestFacts<'a>,
}

/// Why a scheme check failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthenticationError {
    /// No usable Basic credentials.
    #[error("no HTTP basic authentication credentials provided")]
    MissingBasicCredentials,

    /// No bearer token.
    #[error("no HTTP bearer authentication provided")]
    MissingBearerToken,

    /// HTTP auth scheme other than basic or bearer.
    #[error("invalid http scheme {scheme} for credentials")]
    UnsupportedHttpScheme {
        /// Declared scheme.
        scheme: String,
    },

    /// API key query parameter absent or empty.
    #[error("failed to retrieve API key from query parameter {name}")]
    MissingQueryKey {
        /// Parameter name.
        name: String,
    },

    /// API key header absent or empty.
    #[error("failed to retrieve API key from header {name} (canonicalized to: {canonical})")]
    MissingHeaderKey {
        /// Header name as declared.
        name: String,
        /// Canonical header spelling.
        canonical: String,
    },

    /// API key cookie absent.
    #[error("failed to retrieve cookie ({name}): {reason}")]
    MissingCookie {
        /// Cookie name.
        name: String,
        /// Lookup failure.
        reason: String,
    },

    /// API key declared in an unsupported location.
    #[error("invalid property {location} for carrying an apiKey")]
    InvalidApiKeyLocation {
        /// Declared location.
        location: String,
    },

    /// Scheme type without a registered check.
    #[error("security scheme: {scheme_type} for {name:?} is unknown")]
    UnknownScheme {
        /// Declared type.
        scheme_type: String,
        /// Scheme name.
        name: String,
    },
}

/// A single scheme check.
pub type Checker = fn(&AuthenticationInput<'_>) -> Result<(), AuthenticationError>;

/// The callback shape the engine invokes per required scheme.
pub type AuthenticationFunc =
    Arc<dyn Fn(&AuthenticationInput<'_>) -> Result<(), AuthenticationError> + Send + Sync>;

/// A callback that accepts every scheme.
pub fn noop_authentication() -> AuthenticationFunc {
    Arc::new(|_: &AuthenticationInput<'_>| Ok(()))
}

/// Lookup table of scheme checks.
#[derive(Clone)]
pub struct AuthenticationDispatcher {
    checkers: HashMap<(String, String), Checker>,
}

impl AuthenticationDispatcher {
    /// Create a dispatcher with the built-in checks.
    pub fn new() -> Self {
        let mut dispatcher = Self {
            checkers: HashMap::new(),
        };
        dispatcher
            .register("http", "basic", check_basic)
            .register("http", "bearer", check_bearer)
            .register("http", ANY, reject_http_scheme)
            .register("apikey", "query", check_query_key)
            .register("apikey", "header", check_header_key)
            .register("apikey", "cookie", check_cookie_key)
            .register("apikey", ANY, reject_api_key_location)
            .register("oauth2", ANY, not_implemented)
            .register("openidconnect", ANY, not_implemented);
        dispatcher
    }

    /// Register (or replace) the check for `(scheme_type, discriminator)`.
    /// Matching is case-insensitive.
    pub fn register(
        &mut self,
        scheme_type: &str,
        discriminator: &str,
        checker: Checker,
    ) -> &mut Self {
        self.checkers.insert(
            (
                scheme_type.to_ascii_lowercase(),
                discriminator.to_ascii_lowercase(),
            ),
            checker,
        );
        self
    }

    /// Evaluate one scheme.
    pub fn authenticate(&self, input: &AuthenticationInput<'_>) -> Result<(), AuthenticationError> {
        let scheme_type = input.scheme.scheme_type.to_ascii_lowercase();
        let discriminator = match scheme_type.as_str() {
            "http" => input.scheme.scheme.as_deref(),
            "apikey" => input.scheme.location.as_deref(),
            _ => None,
        }
        .unwrap_or_default()
        .to_ascii_lowercase();

        let checker = self
            .checkers
            .get(&(scheme_type.clone(), discriminator))
            .or_else(|| self.checkers.get(&(scheme_type, ANY.to_string())))
            .ok_or_else(|| AuthenticationError::UnknownScheme {
                scheme_type: input.scheme.scheme_type.clone(),
                name: input.scheme_name.to_string(),
            })?;

        checker(input)
    }

    /// Wrap the dispatcher as an engine callback.
    pub fn into_func(self) -> AuthenticationFunc {
        Arc::new(move |input: &AuthenticationInput<'_>| self.authenticate(input))
    }
}

impl Default for AuthenticationDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AuthenticationDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<String> = self
            .checkers
            .keys()
            .map(|(t, d)| format!("{}/{}", t, d))
            .collect();
        keys.sort();
        f.debug_struct("AuthenticationDispatcher")
            .field("checkers", &keys)
            .finish()
    }
}

fn authorization<'a>(input: &AuthenticationInput<'a>) -> Option<&'a str> {
    input
        .request
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
}

fn check_basic(input: &AuthenticationInput<'_>) -> Result<(), AuthenticationError> {
    let encoded = authorization(input)
        .and_then(|value| {
            let (scheme, credentials) = value.split_once(' ')?;
            scheme.eq_ignore_ascii_case("basic").then_some(credentials)
        })
        .ok_or(AuthenticationError::MissingBasicCredentials)?;

    let decoded = STANDARD
        .decode(encoded.trim())
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .ok_or(AuthenticationError::MissingBasicCredentials)?;

    if decoded.contains(':') {
        Ok(())
    } else {
        Err(AuthenticationError::MissingBasicCredentials)
    }
}

fn check_bearer(input: &AuthenticationInput<'_>) -> Result<(), AuthenticationError> {
    match authorization(input) {
        Some(value) if value.starts_with("Bearer ") => Ok(()),
        _ => Err(AuthenticationError::MissingBearerToken),
    }
}

fn reject_http_scheme(input: &AuthenticationInput<'_>) -> Result<(), AuthenticationError> {
    Err(AuthenticationError::UnsupportedHttpScheme {
        scheme: input.scheme.scheme.clone().unwrap_or_default(),
    })
}

fn key_name(input: &AuthenticationInput<'_>) -> String {
    input.scheme.name.clone().unwrap_or_default()
}

fn check_query_key(input: &AuthenticationInput<'_>) -> Result<(), AuthenticationError> {
    let name = key_name(input);
    let present = query_values(input.request.query, &name)
        .first()
        .is_some_and(|value| !value.is_empty());

    if present {
        Ok(())
    } else {
        Err(AuthenticationError::MissingQueryKey { name })
    }
}

fn check_header_key(input: &AuthenticationInput<'_>) -> Result<(), AuthenticationError> {
    let name = key_name(input);
    let present = input
        .request
        .headers
        .get(name.as_str())
        .is_some_and(|value| !value.is_empty());

    if present {
        Ok(())
    } else {
        Err(AuthenticationError::MissingHeaderKey {
            canonical: canonical_header_key(&name),
            name,
        })
    }
}

fn check_cookie_key(input: &AuthenticationInput<'_>) -> Result<(), AuthenticationError> {
    let name = key_name(input);
    match cookie_value(input.request.headers, &name) {
        Some(_) => Ok(()),
        None => Err(AuthenticationError::MissingCookie {
            name,
            reason: "named cookie not present".to_string(),
        }),
    }
}

fn reject_api_key_location(input: &AuthenticationInput<'_>) -> Result<(), AuthenticationError> {
    Err(AuthenticationError::InvalidApiKeyLocation {
        location: input.scheme.location.clone().unwrap_or_default(),
    })
}

fn not_implemented(input: &AuthenticationInput<'_>) -> Result<(), AuthenticationError> {
    warn!(
        scheme = input.scheme_name,
        scheme_type = %input.scheme.scheme_type,
        "security scheme check not implemented, accepting (known limitation)"
    );
    Ok(())
}

/// `x-api-key` becomes `X-Api-Key`.
fn canonical_header_key(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join("-")
}
