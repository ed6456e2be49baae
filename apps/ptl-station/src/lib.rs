//! # ptl-station: Put-to-Light Picking Station
//!
//! Assigns scanned items to baskets and guides the operator with the light
//! modules mounted on each basket.
//!
//! ## Module Organization
//! - [`config`] - Layered configuration (defaults, TOML, environment)
//! - [`console`] - Operator command parsing
//! - [`error`] - Station error types
//! - [`intake`] - Reader and processor loops
//! - [`picking`] - Picking orchestrator
//! - [`state`] - Processing gate and shared carts
//! - [`station`] - Wiring and lifecycle

pub mod config;
pub mod console;
pub mod error;
pub mod intake;
pub mod picking;
pub mod state;
pub mod station;

pub use config::StationConfig;
pub use error::{ConfigError, PickError};
pub use intake::{stdin_lines, ChannelLines, LineSource, ReaderExit};
pub use picking::{PickingOrchestrator, PickingSettings};
pub use state::{GateGuard, ProcessingGate, SharedCarts};
pub use station::Station;
