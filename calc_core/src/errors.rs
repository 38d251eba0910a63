//! # Error Types
//!
//! Structured error types for calc_core. Validation errors carry the field
//! name and the offending value so a form front-end can point the user at the
//! exact input to fix.
//!
//! ## Example
//!
//! ```rust
//! use calc_core::errors::{CalcError, CalcResult};
//!
//! fn validate_length(length_m: f64) -> CalcResult<()> {
//!     if length_m < 0.0 {
//!         return Err(CalcError::InvalidNumericField {
//!             field: "length".to_string(),
//!             value: length_m.to_string(),
//!             reason: "Length cannot be negative".to_string(),
//!         });
//!     }
//!     Ok(())
//! }
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for calc_core operations
pub type CalcResult<T> = Result<T, CalcError>;

/// Structured error type for calculation and bid operations.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "details")]
pub enum CalcError {
    /// A required selection was not made (e.g. no base material chosen)
    #[error("Missing selection: {field}")]
    MissingSelection { field: String },

    /// Material key not present in the catalog snapshot
    #[error("Unknown material: {key}")]
    UnknownMaterial { key: String },

    /// A numeric field could not be parsed or is out of range
    #[error("Invalid value for '{field}': {value} - {reason}")]
    InvalidNumericField {
        field: String,
        value: String,
        reason: String,
    },

    /// Line item index outside the bid
    #[error("Line item index {index} out of range (bid has {len} items)")]
    InvalidIndex { index: usize, len: usize },

    /// Catalog source text could not be read
    #[error("Catalog error: {reason}")]
    CatalogError { reason: String },

    /// File I/O error
    #[error("File error: {operation} on '{path}' - {reason}")]
    FileError {
        operation: String,
        path: String,
        reason: String,
    },

    /// File is locked by another user/process
    #[error("File locked: '{path}' is locked by {locked_by} since {locked_at}")]
    FileLocked {
        path: String,
        locked_by: String,
        locked_at: String,
    },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {reason}")]
    SerializationError { reason: String },

    /// Schema version mismatch
    #[error("Version mismatch: file version {file_version}, expected {expected_version}")]
    VersionMismatch {
        file_version: String,
        expected_version: String,
    },
}

impl CalcError {
    /// Create a MissingSelection error
    pub fn missing_selection(field: impl Into<String>) -> Self {
        CalcError::MissingSelection {
            field: field.into(),
        }
    }

    /// Create an UnknownMaterial error
    pub fn unknown_material(key: impl Into<String>) -> Self {
        CalcError::UnknownMaterial { key: key.into() }
    }

    /// Create an InvalidNumericField error
    pub fn invalid_numeric(field: impl Into<String>, value: impl Into<String>, reason: impl Into<String>) -> Self {
        CalcError::InvalidNumericField {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a CatalogError
    pub fn catalog(reason: impl Into<String>) -> Self {
        CalcError::CatalogError {
            reason: reason.into(),
        }
    }

    /// Create a FileError
    pub fn file_error(operation: impl Into<String>, path: impl Into<String>, reason: impl Into<String>) -> Self {
        CalcError::FileError {
            operation: operation.into(),
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a FileLocked error
    pub fn file_locked(path: impl Into<String>, locked_by: impl Into<String>, locked_at: impl Into<String>) -> Self {
        CalcError::FileLocked {
            path: path.into(),
            locked_by: locked_by.into(),
            locked_at: locked_at.into(),
        }
    }

    /// Whether the user can fix the input and retry
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CalcError::MissingSelection { .. }
                | CalcError::UnknownMaterial { .. }
                | CalcError::InvalidNumericField { .. }
                | CalcError::FileLocked { .. }
        )
    }

    /// Get a short error code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            CalcError::MissingSelection { .. } => "MISSING_SELECTION",
            CalcError::UnknownMaterial { .. } => "UNKNOWN_MATERIAL",
            CalcError::InvalidNumericField { .. } => "INVALID_NUMERIC_FIELD",
            CalcError::InvalidIndex { .. } => "INVALID_INDEX",
            CalcError::CatalogError { .. } => "CATALOG_ERROR",
            CalcError::FileError { .. } => "FILE_ERROR",
            CalcError::FileLocked { .. } => "FILE_LOCKED",
            CalcError::SerializationError { .. } => "SERIALIZATION_ERROR",
            CalcError::VersionMismatch { .. } => "VERSION_MISMATCH",
        }
    }
}

impl From<serde_json::Error> for CalcError {
    fn from(e: serde_json::Error) -> Self {
        CalcError::SerializationError {
            reason: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_serialization() {
        let error = CalcError::invalid_numeric("length", "abc", "Not a number");
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("\"type\":\"InvalidNumericField\""));
        let roundtrip: CalcError = serde_json::from_str(&json).unwrap();
        assert_eq!(error, roundtrip);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(CalcError::missing_selection("material").error_code(), "MISSING_SELECTION");
        assert_eq!(CalcError::unknown_material("X1").error_code(), "UNKNOWN_MATERIAL");
        assert_eq!(
            CalcError::InvalidIndex { index: 3, len: 1 }.error_code(),
            "INVALID_INDEX"
        );
        let mismatch = CalcError::VersionMismatch {
            file_version: "0.0.1".to_string(),
            expected_version: "0.1.0".to_string(),
        };
        assert_eq!(mismatch.error_code(), "VERSION_MISMATCH");
        assert!(!mismatch.is_recoverable());
    }

    #[test]
    fn test_recoverable() {
        assert!(CalcError::missing_selection("material").is_recoverable());
        assert!(CalcError::invalid_numeric("length", "x", "bad").is_recoverable());
        assert!(!CalcError::catalog("broken").is_recoverable());
    }

    #[test]
    fn test_display_includes_field() {
        let error = CalcError::invalid_numeric("dimension", "-5", "Dimension cannot be negative");
        assert_eq!(
            error.to_string(),
            "Invalid value for 'dimension': -5 - Dimension cannot be negative"
        );
    }
}
