//! # Error Types
//!
//! Domain-specific error types for ptl-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  ptl-core errors (this file)                                           │
//! │  ├── CoreError        - Encoding and layout errors                     │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  ptl-link errors (separate crate)                                      │
//! │  └── LinkError        - Controller link failures                       │
//! │                                                                         │
//! │  ptl-station errors (app)                                              │
//! │  └── PickError        - Why a picking operation was rejected           │
//! │                                                                         │
//! │  Flow: CoreError / LinkError → PickError → Rejected(reason) → log      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! "No free basket" is NOT an error: it is an [`AssignmentResult`] variant.
//!
//! [`AssignmentResult`]: crate::cart::AssignmentResult

use thiserror::Error;

use crate::types::LightColor;

// =============================================================================
// Core Error
// =============================================================================

/// Core domain errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// The light state has no entry in the mode-code table.
    ///
    /// ## When This Occurs
    /// - An "off" module asked to blink
    /// - An "off" module asked to sound the buzzer
    ///
    /// This is a programming or configuration defect. It aborts the
    /// current picking operation only.
    #[error("Unsupported light state: color {color}, blinking {blinking}, buzzer {buzzer}")]
    EncodingUnsupported {
        color: LightColor,
        blinking: bool,
        buzzer: bool,
    },

    /// A command was requested for an empty set of modules.
    #[error("Command requires at least one module address")]
    NoModules,

    /// The configured cart layout is unusable.
    #[error("Invalid cart layout: {0}")]
    InvalidLayout(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Invalid format.
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Duplicate value (e.g., two baskets on one module).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_error_message() {
        let err = CoreError::EncodingUnsupported {
            color: LightColor::Off,
            blinking: true,
            buzzer: false,
        };
        assert_eq!(
            err.to_string(),
            "Unsupported light state: color off, blinking true, buzzer false"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "barcode".to_string(),
        };
        assert_eq!(err.to_string(), "barcode is required");

        let err = ValidationError::OutOfRange {
            field: "module address".to_string(),
            min: 0,
            max: 9999,
        };
        assert_eq!(err.to_string(), "module address must be between 0 and 9999");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "barcode".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
