//! # ptl-link: Light Controller Link
//!
//! Everything between the picking orchestrator and the light controller:
//! framing, the TCP transport, reconnection and the command service.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Controller Link                                  │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                 CommandService (command.rs)                      │  │
//! │  │                                                                  │  │
//! │  │  send_raw(addresses, command)   wait_for_button()   drain_events │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │  ┌────────────────────────────▼─────────────────────────────────────┐  │
//! │  │              ConnectionManager (connection.rs)                   │  │
//! │  │                                                                  │  │
//! │  │  Disconnected ──connect ok──► Connected                          │  │
//! │  │       ▲   │                       │                              │  │
//! │  │       │   └─fail: wait, retry     │ connection-level error       │  │
//! │  │       └───────────────────────────┘                              │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │ Connector / Transport (transport.rs)    │
//! │  ┌────────────────────────────▼─────────────────────────────────────┐  │
//! │  │   TcpTransport                                                   │  │
//! │  │   writer ──► STX len body CRLF ETX (frame.rs) ──► controller     │  │
//! │  │   reader task ◄── acks ──► pending send                          │  │
//! │  │               ◄── EVnnnn ──► event queue ──► try_receive_event   │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  Shutdown (shutdown.rs) reaches every wait: connect, backoff, ack,     │
//! │  button poll.                                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`command`] - Command service used by the orchestrator
//! - [`config`] - Link timing settings
//! - [`connection`] - Connection lifecycle manager
//! - [`error`] - Link error types
//! - [`frame`] - Wire framing and reply parsing
//! - [`shutdown`] - Cooperative shutdown signal
//! - [`transport`] - Transport seam and TCP implementation
//! - `testing` - Scripted transport (feature `testing`)

// =============================================================================
// Module Declarations
// =============================================================================

pub mod command;
pub mod config;
pub mod connection;
pub mod error;
pub mod frame;
pub mod shutdown;
pub mod transport;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use command::CommandService;
pub use config::LinkSettings;
pub use connection::{ConnectionManager, LinkState};
pub use error::{LinkError, LinkResult};
pub use shutdown::{Shutdown, ShutdownTrigger};
pub use transport::{ButtonEvent, Connector, TcpConnector, TcpTransport, Transport};
