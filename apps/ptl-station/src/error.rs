//! # Station Error Types
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Station Error Handling                             │
//! │                                                                         │
//! │  ConfigError  - startup only, the process exits                        │
//! │                                                                         │
//! │  PickError    - one picking operation failed                           │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  rollback + lights off + AssignmentResult::Rejected(reason)            │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  logged; the operator rescans                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::time::Duration;

use ptl_core::CoreError;
use ptl_link::LinkError;
use thiserror::Error;

// =============================================================================
// Pick Error
// =============================================================================

/// Why a picking operation was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PickError {
    /// The barcode has no entry in the limit file.
    #[error("no basket limit configured for barcode {0}")]
    NoLimit(String),

    /// A light command could not be encoded.
    #[error("light command rejected: {0}")]
    Encoding(#[from] CoreError),

    /// The controller link failed.
    #[error("controller link failed: {0}")]
    Link(LinkError),

    /// The operator did not confirm in time.
    #[error("no confirmation within {} s", .0.as_secs())]
    Timeout(Duration),

    /// The station is shutting down.
    #[error("cancelled by shutdown")]
    Cancelled,
}

impl From<LinkError> for PickError {
    fn from(err: LinkError) -> Self {
        match err {
            LinkError::Cancelled => PickError::Cancelled,
            other => PickError::Link(other),
        }
    }
}

// =============================================================================
// Config Error
// =============================================================================

/// Configuration errors. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration sources could not be read or merged.
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// A value is out of range or missing.
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// The cart layout is unusable.
    #[error("Invalid cart layout: {0}")]
    Layout(#[from] CoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_link_error_becomes_cancelled() {
        assert_eq!(PickError::from(LinkError::Cancelled), PickError::Cancelled);
        assert!(matches!(
            PickError::from(LinkError::Disconnected),
            PickError::Link(LinkError::Disconnected)
        ));
    }

    #[test]
    fn test_pick_error_reasons() {
        assert_eq!(
            PickError::Timeout(Duration::from_secs(30)).to_string(),
            "no confirmation within 30 s"
        );
        assert_eq!(
            PickError::NoLimit("X".to_string()).to_string(),
            "no basket limit configured for barcode X"
        );
    }
}
