//! # Domain Types
//!
//! Core domain types used throughout the PTL station.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  ModuleAddress  │   │   LightState    │   │  LightIntent    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  0..=9999       │   │  color          │   │  initial        │       │
//! │  │  "0042" on wire │   │  blinking       │   │  after_confirm  │       │
//! │  └─────────────────┘   │  buzzer         │   └─────────────────┘       │
//! │                        └─────────────────┘                              │
//! │  ┌─────────────────┐   ┌─────────────────┐                              │
//! │  │   LightColor    │   │  WorkedProduct  │                              │
//! │  │  ─────────────  │   │  ─────────────  │                              │
//! │  │  Off            │   │  timestamp      │                              │
//! │  │  Red            │   │  cart / basket  │                              │
//! │  │  Green          │   │  barcode, qty   │                              │
//! │  └─────────────────┘   └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::validation::ValidationResult;

// =============================================================================
// Module Address
// =============================================================================

/// Address of one light module on the controller bus.
///
/// Always rendered as exactly four zero-padded digits on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct ModuleAddress(u16);

impl ModuleAddress {
    /// Highest address the four-digit wire field can carry.
    pub const MAX: u16 = 9999;

    /// Creates an address, rejecting anything above [`ModuleAddress::MAX`].
    pub fn new(raw: u16) -> ValidationResult<Self> {
        if raw > Self::MAX {
            return Err(ValidationError::OutOfRange {
                field: "module address".to_string(),
                min: 0,
                max: Self::MAX as i64,
            });
        }
        Ok(ModuleAddress(raw))
    }

    /// Returns the numeric address.
    #[inline]
    pub const fn value(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for ModuleAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.0)
    }
}

impl TryFrom<u16> for ModuleAddress {
    type Error = ValidationError;

    fn try_from(raw: u16) -> Result<Self, Self::Error> {
        ModuleAddress::new(raw)
    }
}

impl From<ModuleAddress> for u16 {
    fn from(address: ModuleAddress) -> Self {
        address.0
    }
}

impl FromStr for ModuleAddress {
    type Err = ValidationError;

    /// Parses the wire form (`"0042"`) or a plain number (`"42"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim();
        if digits.is_empty() || digits.len() > 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::InvalidFormat {
                field: "module address".to_string(),
                reason: format!("'{}' is not a 1-4 digit number", digits),
            });
        }
        // At most four ASCII digits, so the parse cannot overflow
        let raw: u16 = digits.parse().map_err(|_| ValidationError::InvalidFormat {
            field: "module address".to_string(),
            reason: format!("'{}' is not a number", digits),
        })?;
        ModuleAddress::new(raw)
    }
}

// =============================================================================
// Light Color
// =============================================================================

/// LED color of a light module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightColor {
    Off,
    Red,
    Green,
}

impl fmt::Display for LightColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LightColor::Off => write!(f, "off"),
            LightColor::Red => write!(f, "red"),
            LightColor::Green => write!(f, "green"),
        }
    }
}

// =============================================================================
// Light State
// =============================================================================

/// What one module shows: LED color, blinking and buzzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LightState {
    pub color: LightColor,
    pub blinking: bool,
    pub buzzer: bool,
}

impl LightState {
    /// LED dark, no buzzer.
    #[inline]
    pub const fn off() -> Self {
        LightState {
            color: LightColor::Off,
            blinking: false,
            buzzer: false,
        }
    }

    /// Steady light, no buzzer.
    #[inline]
    pub const fn fixed(color: LightColor) -> Self {
        LightState {
            color,
            blinking: false,
            buzzer: false,
        }
    }

    /// Blinking light, no buzzer.
    #[inline]
    pub const fn blinking(color: LightColor) -> Self {
        LightState {
            color,
            blinking: true,
            buzzer: false,
        }
    }

    /// Same state with the buzzer sounding.
    #[inline]
    pub const fn with_buzzer(self) -> Self {
        LightState {
            buzzer: true,
            ..self
        }
    }
}

// =============================================================================
// Light Intent
// =============================================================================

/// The state a module shows now, and optionally the state it switches to
/// by itself once its button is pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightIntent {
    pub initial: LightState,
    pub after_confirm: Option<LightState>,
}

impl LightIntent {
    /// The module the operator must put the item into:
    /// green blinking, turning steady green on confirm.
    pub const fn target() -> Self {
        LightIntent {
            initial: LightState::blinking(LightColor::Green),
            after_confirm: Some(LightState::fixed(LightColor::Green)),
        }
    }

    /// A non-target module: dark and silent, but listening for a press.
    pub const fn armed() -> Self {
        LightIntent {
            initial: LightState::off(),
            after_confirm: None,
        }
    }

    /// A module that was pressed by mistake: red blinking with buzzer.
    pub const fn error_flash() -> Self {
        LightIntent {
            initial: LightState::blinking(LightColor::Red).with_buzzer(),
            after_confirm: None,
        }
    }
}

// =============================================================================
// Worked Product
// =============================================================================

/// Record of one successful put.
///
/// Appended to the pick log after the operator confirmed the target module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkedProduct {
    /// When the put was confirmed.
    pub timestamp: DateTime<Utc>,

    pub cart_id: String,

    pub basket_id: String,

    pub barcode: String,

    /// Quantity in the basket after this put.
    pub quantity: u32,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_address_display_is_four_digits() {
        assert_eq!(ModuleAddress::new(1).unwrap().to_string(), "0001");
        assert_eq!(ModuleAddress::new(42).unwrap().to_string(), "0042");
        assert_eq!(ModuleAddress::new(9999).unwrap().to_string(), "9999");
    }

    #[test]
    fn test_module_address_range() {
        assert!(ModuleAddress::new(0).is_ok());
        assert!(ModuleAddress::new(10_000).is_err());
    }

    #[test]
    fn test_module_address_parse() {
        assert_eq!("0042".parse::<ModuleAddress>().unwrap().value(), 42);
        assert_eq!("7".parse::<ModuleAddress>().unwrap().value(), 7);
        assert!("".parse::<ModuleAddress>().is_err());
        assert!("12345".parse::<ModuleAddress>().is_err());
        assert!("00a1".parse::<ModuleAddress>().is_err());
        assert!("-1".parse::<ModuleAddress>().is_err());
    }

    #[test]
    fn test_light_intents() {
        let target = LightIntent::target();
        assert_eq!(target.initial, LightState::blinking(LightColor::Green));
        assert_eq!(target.after_confirm, Some(LightState::fixed(LightColor::Green)));

        let armed = LightIntent::armed();
        assert_eq!(armed.initial, LightState::off());
        assert!(armed.after_confirm.is_none());

        let error = LightIntent::error_flash();
        assert_eq!(error.initial.color, LightColor::Red);
        assert!(error.initial.blinking);
        assert!(error.initial.buzzer);
    }

    #[test]
    fn test_light_color_display() {
        assert_eq!(LightColor::Green.to_string(), "green");
    }
}
