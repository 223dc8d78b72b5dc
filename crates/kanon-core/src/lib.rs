//! # Kanon Core
//!
//! Core types shared by every Kanon crate.
//!
//! - [`ValidatorError`] - The closed error taxonomy with HTTP status mapping
//! - [`ErrorKind`] - Discriminant of [`ValidatorError`], used for metrics and logs
//! - [`DiagnosticRecord`] - Last violation observed for a request
//! - [`RequestId`] - UUID v7 request identifier
//!
//! The taxonomy is deliberately small: every failure the validator can
//! observe maps to exactly one kind, and every kind except
//! [`ErrorKind::Configuration`] maps to exactly one HTTP status.
//!
//! ```
//! use kanon_core::{ErrorKind, ValidatorError};
//! use http::StatusCode;
//!
//! let err = ValidatorError::route_not_found("Path was not found");
//! assert_eq!(err.kind(), ErrorKind::RouteNotFound);
//! assert_eq!(err.status_code(), Some(StatusCode::NOT_FOUND));
//! ```

#![doc(html_root_url = "https://docs.rs/kanon-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod diagnostics;
mod error;
mod request_id;

pub use diagnostics::{DiagnosticRecord, DIAGNOSTIC_ERROR_MESSAGE_KEY, DIAGNOSTIC_STATUS_CODE_KEY};
pub use error::{ErrorEnvelope, ErrorDetail, ErrorKind, ValidatorError, ValidatorResult};
pub use request_id::RequestId;
