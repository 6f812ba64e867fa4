//! # Error Types
//!
//! Structured error types for dose_core. Every failure a host can encounter
//! carries enough context to be rendered as an inline annotation or a
//! transient notification without string parsing.
//!
//! ## Example
//!
//! ```rust
//! use dose_core::errors::{DoseError, DoseResult};
//!
//! fn require_weight(raw: &str) -> DoseResult<f64> {
//!     raw.trim()
//!         .parse()
//!         .map_err(|_| DoseError::missing_input("weight"))
//! }
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for dose_core operations
pub type DoseResult<T> = Result<T, DoseError>;

/// Structured error type for the calculator engine.
///
/// The taxonomy follows how errors propagate: input errors abort the pending
/// computation and surface as field annotations; persistence and export
/// errors are caught at the boundary and surface as notifications; an absent
/// capability disables its feature instead of failing the flow.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "details")]
pub enum DoseError {
    /// A required field is empty or not parseable as a number.
    /// Never silently coerced to 0.
    #[error("Missing value for '{field}'")]
    MissingInput { field: String },

    /// An input value is outside the hard safety range (blocking)
    #[error("Value for '{field}' out of safe range: {value} (allowed {min}..={max})")]
    OutOfRange {
        field: String,
        value: f64,
        min: f64,
        max: f64,
    },

    /// The user declined to confirm an unusual (warning-range) value
    #[error("Unusual value for '{field}' was not confirmed")]
    UnusualDeclined { field: String },

    /// An input value is invalid for a reason other than range
    #[error("Invalid input for '{field}': {value} - {reason}")]
    InvalidInput {
        field: String,
        value: String,
        reason: String,
    },

    /// Conversion between incompatible unit kinds was requested
    #[error("Cannot convert {from} to {to}: different quantities")]
    UnitMismatch { from: String, to: String },

    /// The persistence layer rejected a write (quota, I/O)
    #[error("Persistence failure for '{key}': {reason}")]
    PersistenceFailure { key: String, reason: String },

    /// Clipboard or document export failed
    #[error("Export to {target} failed: {reason}")]
    ExportFailure { target: String, reason: String },

    /// An optional collaborator is not registered
    #[error("Capability not available: {capability}")]
    DependencyUnavailable { capability: String },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {reason}")]
    SerializationError { reason: String },

    /// Persisted schema version is newer than this build understands
    #[error("Version mismatch: stored version {found}, expected {expected}")]
    VersionMismatch { found: u32, expected: u32 },

    /// Generic internal error (should be rare)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DoseError {
    /// Create a MissingInput error
    pub fn missing_input(field: impl Into<String>) -> Self {
        DoseError::MissingInput {
            field: field.into(),
        }
    }

    /// Create an OutOfRange error
    pub fn out_of_range(field: impl Into<String>, value: f64, min: f64, max: f64) -> Self {
        DoseError::OutOfRange {
            field: field.into(),
            value,
            min,
            max,
        }
    }

    /// Create an InvalidInput error
    pub fn invalid_input(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        DoseError::InvalidInput {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a PersistenceFailure error
    pub fn persistence(key: impl Into<String>, reason: impl Into<String>) -> Self {
        DoseError::PersistenceFailure {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create an ExportFailure error
    pub fn export(target: impl Into<String>, reason: impl Into<String>) -> Self {
        DoseError::ExportFailure {
            target: target.into(),
            reason: reason.into(),
        }
    }

    /// Create a DependencyUnavailable error
    pub fn unavailable(capability: impl Into<String>) -> Self {
        DoseError::DependencyUnavailable {
            capability: capability.into(),
        }
    }

    /// Input errors abort the pending computation; boundary errors
    /// (persistence, export) only produce notifications.
    pub fn aborts_computation(&self) -> bool {
        matches!(
            self,
            DoseError::MissingInput { .. }
                | DoseError::OutOfRange { .. }
                | DoseError::UnusualDeclined { .. }
                | DoseError::InvalidInput { .. }
                | DoseError::UnitMismatch { .. }
        )
    }

    /// Get a short error code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            DoseError::MissingInput { .. } => "MISSING_INPUT",
            DoseError::OutOfRange { .. } => "OUT_OF_RANGE",
            DoseError::UnusualDeclined { .. } => "UNUSUAL_DECLINED",
            DoseError::InvalidInput { .. } => "INVALID_INPUT",
            DoseError::UnitMismatch { .. } => "UNIT_MISMATCH",
            DoseError::PersistenceFailure { .. } => "PERSISTENCE_FAILURE",
            DoseError::ExportFailure { .. } => "EXPORT_FAILURE",
            DoseError::DependencyUnavailable { .. } => "DEPENDENCY_UNAVAILABLE",
            DoseError::SerializationError { .. } => "SERIALIZATION_ERROR",
            DoseError::VersionMismatch { .. } => "VERSION_MISMATCH",
            DoseError::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}
