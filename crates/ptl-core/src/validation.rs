//! # Validation Module
//!
//! Input validation for values that reach the station from the outside:
//! scanned barcodes, limit-file rows and the configured cart layout.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Configuration load (ptl-station)                             │
//! │  ├── Type validation (deserialization)                                 │
//! │  └── THIS MODULE: module addresses, basket ids                         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Limit file load (ptl-data)                                   │
//! │  └── THIS MODULE: barcodes, max quantities (bad rows are skipped)      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Scan intake                                                  │
//! │  └── THIS MODULE: barcode normalization                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use ptl_core::validation::{normalize_barcode, validate_max_quantity};
//!
//! assert_eq!(normalize_barcode("  8001234 ").unwrap(), "8001234");
//! assert!(validate_max_quantity(0).is_err());
//! ```

use crate::error::ValidationError;
use crate::MAX_BASKET_QUANTITY;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest barcode the station accepts.
pub const MAX_BARCODE_LENGTH: usize = 64;

// =============================================================================
// String Validators
// =============================================================================

/// Trims a scanned barcode and checks it is usable as a basket key.
///
/// ## Rules
/// - Surrounding whitespace is removed
/// - Must not be empty after trimming
/// - At most [`MAX_BARCODE_LENGTH`] characters
/// - No interior whitespace or control characters
pub fn normalize_barcode(raw: &str) -> ValidationResult<String> {
    let barcode = raw.trim();

    if barcode.is_empty() {
        return Err(ValidationError::Required {
            field: "barcode".to_string(),
        });
    }

    if barcode.chars().count() > MAX_BARCODE_LENGTH {
        return Err(ValidationError::TooLong {
            field: "barcode".to_string(),
            max: MAX_BARCODE_LENGTH,
        });
    }

    if barcode
        .chars()
        .any(|c| c.is_whitespace() || c.is_control())
    {
        return Err(ValidationError::InvalidFormat {
            field: "barcode".to_string(),
            reason: "must not contain whitespace or control characters".to_string(),
        });
    }

    Ok(barcode.to_string())
}

/// Validates a cart or basket identifier from configuration.
pub fn validate_identifier(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    // Identifiers end up in `;`-separated report rows
    if id.contains(';') || id.contains('\n') {
        return Err(ValidationError::InvalidFormat {
            field: field.to_string(),
            reason: "must not contain ';' or line breaks".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates the per-basket maximum quantity of a barcode.
///
/// ## Rules
/// - Must be at least 1
/// - Must not exceed [`MAX_BASKET_QUANTITY`]
pub fn validate_max_quantity(max: u32) -> ValidationResult<()> {
    if max == 0 || max > MAX_BASKET_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "max quantity".to_string(),
            min: 1,
            max: MAX_BASKET_QUANTITY as i64,
        });
    }
    Ok(())
}

/// Parses a limit-file quantity cell (`"3"`, `" 12 "`).
pub fn parse_max_quantity(raw: &str) -> ValidationResult<u32> {
    let value: u32 = raw
        .trim()
        .parse()
        .map_err(|_| ValidationError::InvalidFormat {
            field: "max quantity".to_string(),
            reason: format!("'{}' is not a whole number", raw.trim()),
        })?;
    validate_max_quantity(value)?;
    Ok(value)
}

// =============================================================================
// Unit Tests
// =============================================================================
