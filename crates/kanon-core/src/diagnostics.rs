//! Per-request diagnostic record.
//!
//! The validator writes the outcome of every request here, whether or not the
//! violation was enforced. Host integrations that expose key/value
//! placeholders use [`DIAGNOSTIC_ERROR_MESSAGE_KEY`] and
//! [`DIAGNOSTIC_STATUS_CODE_KEY`] as the names.

use serde::{Deserialize, Serialize};

use crate::error::ValidatorError;

/// Key under which the last error message is exposed.
pub const DIAGNOSTIC_ERROR_MESSAGE_KEY: &str = "validator.error_message";

/// Key under which the last status code is exposed.
pub const DIAGNOSTIC_STATUS_CODE_KEY: &str = "validator.status_code";

/// Last violation observed while processing a request.
///
/// A fresh record has an empty message and a status code of `-1`, meaning
/// no violation was recorded.
///
/// ```
/// use kanon_core::{DiagnosticRecord, ValidatorError};
///
/// let mut record = DiagnosticRecord::new();
/// assert!(!record.has_violation());
///
/// record.record(&ValidatorError::route_not_found("Path was not found"));
/// assert_eq!(record.status_code(), 404);
/// assert_eq!(record.error_message(), "Path was not found");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticRecord {
    error_message: String,
    status_code: i32,
}

impl DiagnosticRecord {
    /// Status code value meaning "no violation".
    pub const NO_STATUS: i32 = -1;

    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self {
            error_message: String::new(),
            status_code: Self::NO_STATUS,
        }
    }

    /// Resets the record to its empty state.
    pub fn reset(&mut self) {
        self.error_message.clear();
        self.status_code = Self::NO_STATUS;
    }

    /// Stores the message and status of `error`, replacing any earlier value.
    pub fn record(&mut self, error: &ValidatorError) {
        self.error_message = error.to_string();
        self.status_code = error
            .status_code()
            .map_or(Self::NO_STATUS, |s| i32::from(s.as_u16()));
    }

    /// Last error message, empty when no violation was recorded.
    #[must_use]
    pub fn error_message(&self) -> &str {
        &self.error_message
    }

    /// Last status code, `-1` when no violation was recorded.
    #[must_use]
    pub const fn status_code(&self) -> i32 {
        self.status_code
    }

    /// Returns `true` once a violation has been recorded.
    #[must_use]
    pub const fn has_violation(&self) -> bool {
        self.status_code != Self::NO_STATUS
    }

    /// Returns the record as `(key, value)` pairs for placeholder exports.
    #[must_use]
    pub fn as_pairs(&self) -> [(&'static str, String); 2] {
        [
            (DIAGNOSTIC_ERROR_MESSAGE_KEY, self.error_message.clone()),
            (DIAGNOSTIC_STATUS_CODE_KEY, self.status_code.to_string()),
        ]
    }
}

impl Default for DiagnosticRecord {
    fn default() -> Self {
        Self::new()
    }
}
