//! Kanon Spec - OpenAPI Contract Model and Validation Engine
//!
//! This crate loads OpenAPI 3 documents and validates HTTP traffic against
//! them. It knows nothing about middleware; `kanon-middleware` drives it
//! through the [`ValidationEngine`] trait.
//!
//! # Architecture
//!
//! ```text
//!                      ┌────────────────────────────┐
//!                      │  file / http(s) document   │
//!                      └──────────┬─────────────────┘
//!                                 │ SpecificationLoader
//!                      ┌──────────▼─────────────────┐
//!                      │   Specification            │
//!                      └──────────┬─────────────────┘
//!                                 │ OpenApiEngine::new
//!                      ┌──────────▼─────────────────┐
//!      method + URL ──►│   Router                   │──► Route + path params
//!                      ├────────────────────────────┤
//!      request ───────►│   parameters, body,        │
//!                      │   security (dispatcher)    │──► Result<(), EngineError>
//!      response ──────►│   status, headers, body    │
//!                      └────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use http::Method;
//! use kanon_spec::{OpenApiEngine, SpecificationLoader, ValidationEngine};
//! use url::Url;
//!
//! let spec = SpecificationLoader::from_yaml_str(r#"
//! openapi: 3.0.0
//! info: {title: Pets, version: 1.0.0}
//! paths:
//!   /pets/{petId}:
//!     get:
//!       operationId: showPetById
//!       responses: {"200": {description: ok}}
//! "#).unwrap();
//!
//! let engine = OpenApiEngine::new(&spec).unwrap();
//! let url = Url::parse("http://localhost/pets/7").unwrap();
//! let (route, params) = engine.find_route(&Method::GET, &url).unwrap();
//!
//! assert_eq!(route.operation_id.as_deref(), Some("showPetById"));
//! assert_eq!(params["petId"], "7");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
pub mod engine;
pub mod error;
pub mod loader;
pub mod model;
pub mod params;
pub mod router;
pub mod schema;
pub mod servers;

pub use auth::{
    noop_authentication, AuthenticationDispatcher, AuthenticationError, AuthenticationFunc,
    AuthenticationInput, Checker, RequestFacts,
};
pub use engine::{
    OpenApiEngine, RequestValidationInput, ResponseValidationInput, ValidationEngine,
    ValidationOptions,
};
pub use error::{EngineError, LoadError, RequestError, ResponseError, RouteError};
pub use loader::SpecificationLoader;
pub use model::{
    Operation, Parameter, ParameterLocation, PathItem, SecurityRequirement, SecurityScheme,
    Server, Specification,
};
pub use router::{OperationKey, PathParams, Route, Router, ServerMatching};
pub use servers::with_additional_servers;
