//! # Connection Lifecycle
//!
//! Keeps at most one open transport and re-establishes it on demand.
//!
//! ## States
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  ┌────────────┐  ensure_connected()   ┌────────────┐                   │
//! │  │Disconnected│ ────────────────────► │ Connected  │                   │
//! │  └────────────┘                       └─────┬──────┘                   │
//! │     ▲     │                                 │                           │
//! │     │     │ attempt fails:                  │ disconnect() or           │
//! │     │     │ wait reconnect_delay, retry     │ connection-level error    │
//! │     │     ▼                                 │                           │
//! │     │  ┌───────┐                            │                           │
//! │     │  │ retry │ ── shutdown ──► Cancelled  │                           │
//! │     │  └───────┘                            │                           │
//! │     └───────────────────────────────────────┘                           │
//! │                                                                         │
//! │  BACKOFF STRATEGY (Constant)                                            │
//! │  Every attempt waits the same reconnect_delay (default 10s).           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use backoff::backoff::{Backoff, Constant};
use tracing::{debug, error, info, warn};

use crate::config::LinkSettings;
use crate::error::{LinkError, LinkResult};
use crate::shutdown::Shutdown;
use crate::transport::{Connector, Transport};

// =============================================================================
// Link State
// =============================================================================

/// Connection state of the controller link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connected,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkState::Disconnected => write!(f, "disconnected"),
            LinkState::Connected => write!(f, "connected"),
        }
    }
}

// =============================================================================
// Connection Manager
// =============================================================================

/// Owns the transport and reconnects when it is gone.
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    transport: Option<Box<dyn Transport>>,
    connect_timeout: Duration,
    reconnect_delay: Duration,
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn Connector>, settings: &LinkSettings) -> Self {
        ConnectionManager {
            connector,
            transport: None,
            connect_timeout: settings.connect_timeout,
            reconnect_delay: settings.reconnect_delay,
        }
    }

    pub fn state(&self) -> LinkState {
        if self.transport.is_some() {
            LinkState::Connected
        } else {
            LinkState::Disconnected
        }
    }

    /// Connects if needed, retrying with a fixed delay until it works.
    ///
    /// Returns [`LinkError::Cancelled`] once `shutdown` fires.
    pub async fn ensure_connected(&mut self, shutdown: &Shutdown) -> LinkResult<()> {
        if self.transport.is_some() {
            return Ok(());
        }

        let mut backoff = Constant::new(self.reconnect_delay);
        let mut attempt = 0u32;

        loop {
            if shutdown.is_triggered() {
                return Err(LinkError::Cancelled);
            }
            attempt += 1;

            let result = tokio::select! {
                _ = shutdown.wait() => return Err(LinkError::Cancelled),
                result = tokio::time::timeout(self.connect_timeout, self.connector.connect()) => result,
            };

            let err = match result {
                Ok(Ok(transport)) => {
                    info!(controller = %self.connector.describe(), attempt, "Controller link up");
                    self.transport = Some(transport);
                    return Ok(());
                }
                Ok(Err(e)) => e,
                Err(_) => LinkError::Timeout(self.connect_timeout.as_millis() as u64),
            };

            // Constant backoff never runs out; fall back to the configured
            // delay regardless
            let delay = backoff.next_backoff().unwrap_or(self.reconnect_delay);
            error!(
                controller = %self.connector.describe(),
                attempt,
                error = %err,
                retry_in_secs = delay.as_secs(),
                "Controller connection failed"
            );

            tokio::select! {
                _ = shutdown.wait() => return Err(LinkError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// The open transport, if connected.
    pub fn transport_mut(&mut self) -> Option<&mut (dyn Transport + 'static)> {
        self.transport.as_deref_mut()
    }

    /// Drops the transport after a connection-level error so the next
    /// operation reconnects.
    pub fn mark_disconnected(&mut self, cause: &LinkError) {
        if self.transport.take().is_some() {
            warn!(error = %cause, "Controller link lost");
        }
    }

    /// Closes the transport. Close errors are logged, not returned.
    pub async fn disconnect(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            match transport.close().await {
                Ok(()) => debug!("Controller link closed"),
                Err(e) => warn!(error = %e, "Error while closing controller link"),
            }
        }
    }
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("controller", &self.connector.describe())
            .field("state", &self.state())
            .finish()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shutdown;
    use crate::testing::ScriptedConnector;

    fn settings() -> LinkSettings {
        LinkSettings::default()
            .connect_timeout(Duration::from_secs(1))
            .reconnect_delay(Duration::from_secs(10))
    }

    #[tokio::test(start_paused = true)]
    async fn test_connects_immediately() {
        let connector = ScriptedConnector::new();
        let mut manager = ConnectionManager::new(Arc::new(connector.clone()), &settings());

        assert_eq!(manager.state(), LinkState::Disconnected);
        manager.ensure_connected(&Shutdown::never()).await.unwrap();

        assert_eq!(manager.state(), LinkState::Connected);
        assert_eq!(connector.connect_count(), 1);

        // Already connected: no new attempt
        manager.ensure_connected(&Shutdown::never()).await.unwrap();
        assert_eq!(connector.connect_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_with_fixed_delay_until_success() {
        let connector = ScriptedConnector::new();
        connector.fail_next_connects(2);
        let mut manager = ConnectionManager::new(Arc::new(connector.clone()), &settings());

        let started = tokio::time::Instant::now();
        manager.ensure_connected(&Shutdown::never()).await.unwrap();

        assert_eq!(connector.connect_count(), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(20));
        assert_eq!(manager.state(), LinkState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_aborts_backoff() {
        let connector = ScriptedConnector::new();
        connector.fail_next_connects(usize::MAX);
        let mut manager = ConnectionManager::new(Arc::new(connector.clone()), &settings());
        let (trigger, shutdown) = shutdown::channel();

        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(25)).await;
            trigger.trigger();
        });

        let result = manager.ensure_connected(&shutdown).await;
        stopper.await.unwrap();

        assert_eq!(result, Err(LinkError::Cancelled));
        assert_eq!(manager.state(), LinkState::Disconnected);
        assert_eq!(connector.connect_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mark_disconnected_forces_reconnect() {
        let connector = ScriptedConnector::new();
        let mut manager = ConnectionManager::new(Arc::new(connector.clone()), &settings());
        manager.ensure_connected(&Shutdown::never()).await.unwrap();

        manager.mark_disconnected(&LinkError::Disconnected);
        assert_eq!(manager.state(), LinkState::Disconnected);

        manager.ensure_connected(&Shutdown::never()).await.unwrap();
        assert_eq!(connector.connect_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_closes_transport() {
        let connector = ScriptedConnector::new();
        let mut manager = ConnectionManager::new(Arc::new(connector.clone()), &settings());
        manager.ensure_connected(&Shutdown::never()).await.unwrap();

        manager.disconnect().await;

        assert_eq!(manager.state(), LinkState::Disconnected);
        assert_eq!(connector.close_count(), 1);
    }
}
