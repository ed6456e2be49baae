//! # Command Service
//!
//! What the picking orchestrator talks to: send a command and wait for the
//! controller's acknowledgement, wait for a button, drop stale events.
//!
//! ## send_raw
//! ```text
//! ensure_connected ──► transport.send ──► ack within ack_timeout?
//!                                            │
//!         ┌──────────────────────────────────┼─────────────────────┐
//!         ▼                                  ▼                     ▼
//!        OK                     Nak / Checksum / Duplicate   Timeout / I/O
//!                               (returned as is)             (link dropped,
//!                                                             then returned)
//! ```
//!
//! Nothing is retried here. The orchestrator decides what a failure means.

use std::sync::Arc;
use std::time::Duration;

use ptl_core::ModuleAddress;
use tracing::{debug, trace};

use crate::config::LinkSettings;
use crate::connection::{ConnectionManager, LinkState};
use crate::error::{LinkError, LinkResult};
use crate::shutdown::Shutdown;
use crate::transport::Connector;

/// Sends commands to the controller and observes its buttons.
#[derive(Debug)]
pub struct CommandService {
    connection: ConnectionManager,
    ack_timeout: Duration,
    poll_interval: Duration,
}

impl CommandService {
    pub fn new(connector: Arc<dyn Connector>, settings: &LinkSettings) -> Self {
        CommandService {
            connection: ConnectionManager::new(connector, settings),
            ack_timeout: settings.ack_timeout,
            poll_interval: settings.poll_interval,
        }
    }

    pub fn state(&self) -> LinkState {
        self.connection.state()
    }

    /// Connects up front so the first scan does not pay for it.
    pub async fn connect(&mut self, shutdown: &Shutdown) -> LinkResult<()> {
        self.connection.ensure_connected(shutdown).await
    }

    /// Sends one encoded command addressed to `addresses` and waits for the
    /// acknowledgement.
    pub async fn send_raw(
        &mut self,
        addresses: &[ModuleAddress],
        command: &str,
        shutdown: &Shutdown,
    ) -> LinkResult<()> {
        self.connection.ensure_connected(shutdown).await?;

        let result = match self.connection.transport_mut() {
            Some(transport) => {
                tokio::select! {
                    _ = shutdown.wait() => Err(LinkError::Cancelled),
                    sent = tokio::time::timeout(self.ack_timeout, transport.send(command)) => {
                        sent.unwrap_or_else(|_| Err(LinkError::Timeout(self.ack_timeout.as_millis() as u64)))
                    }
                }
            }
            None => Err(LinkError::Disconnected),
        };

        match &result {
            Ok(()) => debug!(modules = addresses.len(), command = %command.escape_debug(), "Command acknowledged"),
            Err(e) if e.is_connection_error() => self.connection.mark_disconnected(e),
            Err(_) => {}
        }

        result
    }

    /// Waits for the next button press and returns its module.
    ///
    /// Polls the event queue every `poll_interval`. Only observes: sends
    /// nothing, changes no light. A closed connection ends the wait with
    /// [`LinkError::Disconnected`].
    pub async fn wait_for_button(&mut self, shutdown: &Shutdown) -> LinkResult<ModuleAddress> {
        loop {
            if shutdown.is_triggered() {
                return Err(LinkError::Cancelled);
            }

            self.connection.ensure_connected(shutdown).await?;
            let polled = match self.connection.transport_mut() {
                Some(transport) => transport.try_receive_event(),
                None => Err(LinkError::Disconnected),
            };
            match polled {
                Ok(Some(event)) => {
                    debug!(address = %event.address, "Button event received");
                    return Ok(event.address);
                }
                Ok(None) => {}
                Err(e) => {
                    self.connection.mark_disconnected(&e);
                    return Err(e);
                }
            }

            tokio::select! {
                _ = shutdown.wait() => return Err(LinkError::Cancelled),
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    /// Discards queued button events. Returns how many were dropped.
    pub fn drain_events(&mut self) -> usize {
        let mut drained = 0;
        let mut lost = None;
        if let Some(transport) = self.connection.transport_mut() {
            loop {
                match transport.try_receive_event() {
                    Ok(Some(event)) => {
                        trace!(address = %event.address, "Discarding stale button event");
                        drained += 1;
                    }
                    Ok(None) => break,
                    Err(e) => {
                        lost = Some(e);
                        break;
                    }
                }
            }
        }
        if let Some(e) = lost {
            self.connection.mark_disconnected(&e);
        }
        if drained > 0 {
            debug!(drained, "Stale button events discarded");
        }
        drained
    }

    /// Closes the link.
    pub async fn disconnect(&mut self) {
        self.connection.disconnect().await;
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
