//! The OpenAPI validator middleware.
//!
//! [`OpenApiValidator`] is the per-request controller. It resets the
//! diagnostics, runs the route, request and response stages in order and
//! applies the enforcement policy to whatever they report:
//!
//! - **enforcing**: the violation is answered with its status and a JSON
//!   error body; the downstream handler is not called (route and request
//!   stages) or its response is discarded (response stage)
//! - **observe-only**: the violation is recorded and logged, traffic flows
//!   unchanged
//!
//! Errors from the downstream handler are returned as-is in both modes.

use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use kanon_config::ValidatorConfig;
use kanon_core::ValidatorError;
use kanon_spec::{RequestValidationInput, Specification, SpecificationLoader};
use kanon_telemetry::{record_request_validated, record_violation, Outcome, StageTimer};
use tracing::{debug, info, warn};

use crate::buffer::BufferPool;
use crate::context::ValidationContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::pipeline::Stage;
use crate::prepare::{configuration_error, prepare, PreparedState};
use crate::stages::{RequestStage, ResponseStage, RouteResolver};
use crate::types::{HandlerResult, Request, Response, ResponseExt};

/// Validates live traffic against an OpenAPI document.
///
/// # Example
///
/// ```ignore
/// use kanon_config::ValidatorConfig;
/// use kanon_middleware::{OpenApiValidator, Pipeline};
///
/// let config = ValidatorConfig::builder()
///     .filepath("openapi.yaml")
///     .additional_servers(["http://localhost:8080"])
///     .build();
///
/// let validator = OpenApiValidator::provision(config).await?;
/// let pipeline = Pipeline::builder().add_stage(validator).build();
/// ```
pub struct OpenApiValidator {
    config: ValidatorConfig,
    state: PreparedState,
    routes: RouteResolver,
    requests: RequestStage,
    responses: ResponseStage,
}

impl OpenApiValidator {
    /// Loads the document named by `config.filepath` and prepares a
    /// validator for it.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error when the configuration is invalid,
    /// `filepath` is empty or the document cannot be loaded.
    pub async fn provision(config: ValidatorConfig) -> Result<Self, ValidatorError> {
        config.validate_with_source().map_err(configuration_error)?;

        let specification = SpecificationLoader::load(&config.filepath)
            .await
            .map_err(|e| ValidatorError::configuration(e.to_string()))?;

        info!(source = %config.filepath, "specification loaded");
        Self::from_specification(&specification, config)
    }

    /// Prepares a validator for an in-memory document.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error when the configuration is invalid.
    pub fn from_specification(
        specification: &Specification,
        config: ValidatorConfig,
    ) -> Result<Self, ValidatorError> {
        Self::with_buffer_pool(specification, config, BufferPool::default())
    }

    /// Like [`from_specification`](Self::from_specification), with a
    /// caller-supplied buffer pool.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error when the configuration is invalid.
    pub fn with_buffer_pool(
        specification: &Specification,
        config: ValidatorConfig,
        pool: BufferPool,
    ) -> Result<Self, ValidatorError> {
        let state = prepare(specification, &config)?;

        let routes = RouteResolver::new(
            Arc::clone(&state.engine),
            state.options.clone(),
            config.path_prefix_to_be_trimmed.clone(),
            config.should_validate_servers(),
        );
        let requests = RequestStage::new(Arc::clone(&state.engine), config.should_validate_security());
        let responses = ResponseStage::new(Arc::clone(&state.engine), pool);

        Ok(Self {
            config,
            state,
            routes,
            requests,
            responses,
        })
    }

    /// The configuration the validator was built from.
    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// The prepared specification and engine.
    pub fn state(&self) -> &PreparedState {
        &self.state
    }

    /// The pool response buffers are checked out from.
    pub fn buffer_pool(&self) -> &BufferPool {
        self.responses.pool()
    }

    async fn handle(
        &self,
        ctx: &mut ValidationContext,
        request: Request,
        next: Next<'_>,
    ) -> HandlerResult {
        ctx.reset_diagnostics();

        let (parts, body) = request.into_parts();
        let body: Bytes = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(never) => match never {},
        };

        let mut input: Option<RequestValidationInput> = None;

        if self.config.should_validate_routes() {
            let _timer = StageTimer::start(Stage::RouteCheck.name());
            match self.routes.resolve(&parts, body.clone(), ctx.is_tls()) {
                Ok(resolved) => {
                    if let Some(operation_id) = resolved
                        .as_ref()
                        .and_then(|i| i.route.operation_id.clone())
                    {
                        ctx.set_operation_id(operation_id);
                    }
                    input = resolved;
                }
                Err(err) => {
                    if let Some(blocked) = self.violation(ctx, Stage::RouteCheck, &err) {
                        return Ok(blocked);
                    }
                }
            }
        }

        if self.config.should_validate_requests() {
            let _timer = StageTimer::start(Stage::RequestCheck.name());
            if let Err(err) = self.requests.validate(input.as_ref(), ctx.cancellation()) {
                if let Some(blocked) = self.violation(ctx, Stage::RequestCheck, &err) {
                    return Ok(blocked);
                }
            }
        }

        let request = Request::from_parts(parts, Full::new(body));

        if !self.config.should_validate_responses() {
            let response = next.run(ctx, request).await?;
            record_request_validated(outcome(ctx));
            return Ok(response);
        }

        let captured = self.responses.capture(next, ctx, request).await?;

        if let Some(input) = &input {
            let _timer = StageTimer::start(Stage::ResponseCheck.name());
            if let Err(err) = self.responses.validate(input, &captured, ctx.cancellation()) {
                if let Some(blocked) = self.violation(ctx, Stage::ResponseCheck, &err) {
                    return Ok(blocked);
                }
            }
        }

        debug!(
            request_id = %ctx.request_id(),
            status = captured.status().as_u16(),
            "flushing response"
        );
        record_request_validated(outcome(ctx));
        Ok(captured.flush())
    }

    /// Records a violation and, when enforcing, builds the error response.
    fn violation(
        &self,
        ctx: &mut ValidationContext,
        stage: Stage,
        error: &ValidatorError,
    ) -> Option<Response> {
        let enforced = self.config.should_enforce();
        ctx.record_violation(error);
        record_violation(error.kind().as_str(), stage.name(), enforced);

        if self.config.should_log() {
            warn!(
                request_id = %ctx.request_id(),
                operation_id = ctx.operation_id().unwrap_or_default(),
                stage = stage.name(),
                error.kind = error.kind().as_str(),
                status = ctx.diagnostics().status_code(),
                enforced,
                cause = ?std::error::Error::source(error).map(ToString::to_string),
                "{error}"
            );
        }

        if enforced {
            record_request_validated(Outcome::Blocked);
            Some(Response::from_validator_error(error))
        } else {
            None
        }
    }
}

fn outcome(ctx: &ValidationContext) -> Outcome {
    if ctx.diagnostics().has_violation() {
        Outcome::Observed
    } else {
        Outcome::Passed
    }
}

impl Middleware for OpenApiValidator {
    fn name(&self) -> &'static str {
        "openapi_validator"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut ValidationContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, HandlerResult> {
        Box::pin(self.handle(ctx, request, next))
    }
}

impl std::fmt::Debug for OpenApiValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenApiValidator")
            .field("config", &self.config)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
