//! # ptl-core: Pure Domain Logic for the PTL Station
//!
//! This crate is the **heart** of the put-to-light station. It contains the
//! basket assignment rules and the light-module wire encoder as pure
//! functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        PTL Station Architecture                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Console (barcode scanner)                    │   │
//! │  │        scan ──► status ──► reset ──► exit                       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ lines                                  │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ptl-station (intake + picking orchestrator)        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ ptl-core (THIS CRATE) ★                         │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │ protocol  │  │   cart    │  │ validation│  │   │
//! │  │   │ LightState│  │  PP505    │  │  Basket   │  │  address  │  │   │
//! │  │   │ Address   │  │  off/arm  │  │  Cart     │  │  barcode  │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO SOCKETS • NO FILES • PURE FUNCTIONS              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │          ptl-link (controller link) / ptl-data (CSV files)      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (ModuleAddress, LightState, LightIntent, WorkedProduct)
//! - [`cart`] - Basket, Cart, CartContainer and assignment results
//! - [`protocol`] - Wire command encoder for the light modules
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use ptl_core::{Basket, Cart, CartContainer, ModuleAddress};
//!
//! let basket = Basket::new("1", ModuleAddress::new(1).unwrap());
//! let cart = Cart::new("1", vec![basket]);
//! let mut carts = CartContainer::new(vec![cart]).unwrap();
//!
//! let result = carts.assign_item("8001234567890", 3);
//! assert!(result.is_success());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod error;
pub mod protocol;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{AssignmentResult, Basket, Cart, CartContainer, Placement};
pub use error::{CoreError, CoreResult, ValidationError};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Largest quantity a single basket may be configured to hold.
///
/// Limits above this are treated as configuration mistakes; the display
/// field cannot show them anyway.
pub const MAX_BASKET_QUANTITY: u32 = 9999;
