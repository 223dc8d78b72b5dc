//! Request validation.

use std::sync::Arc;

use kanon_core::ValidatorError;
use kanon_spec::{EngineError, RequestValidationInput, ValidationEngine};
use tokio_util::sync::CancellationToken;

/// Validates parameters, body and security of a routed request.
pub struct RequestStage {
    engine: Arc<dyn ValidationEngine>,
    validate_security: bool,
}

impl RequestStage {
    /// Creates the stage.
    pub fn new(engine: Arc<dyn ValidationEngine>, validate_security: bool) -> Self {
        Self {
            engine,
            validate_security,
        }
    }

    /// Validates `input`. Without a routed input there is nothing to check.
    pub fn validate(
        &self,
        input: Option<&RequestValidationInput>,
        cancellation: &CancellationToken,
    ) -> Result<(), ValidatorError> {
        let Some(input) = input else {
            return Ok(());
        };

        match self.engine.validate_request(input, cancellation) {
            Ok(()) => Ok(()),
            Err(EngineError::Request(e)) => Err(ValidatorError::request_validation(e.to_string())),
            Err(EngineError::SecurityRequirements { errors }) => {
                if self.validate_security {
                    Err(ValidatorError::security_requirements(errors))
                } else {
                    Ok(())
                }
            }
            Err(other) => Err(ValidatorError::internal_with_source(
                format!("error validating request: {other}"),
                other,
            )),
        }
    }
}

impl std::fmt::Debug for RequestStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestStage")
            .field("validate_security", &self.validate_security)
            .finish_non_exhaustive()
    }
}
