//! # Shutdown Signal
//!
//! One cooperative stop signal for the whole station, built on a tokio
//! watch channel.
//!
//! ```text
//! ShutdownTrigger ──trigger()──► watch(true) ──► Shutdown (clone)  reader loop
//!                                            ├─► Shutdown (clone)  processor loop
//!                                            └─► Shutdown (clone)  link waits
//! ```
//!
//! Dropping the trigger without calling `trigger()` means nobody can stop
//! the station any more; waiters then wait forever.

use tokio::sync::watch;

/// Creates a connected trigger / signal pair.
pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

/// Sending side. Held by whoever decides the station stops.
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    /// Signals every [`Shutdown`] clone. Idempotent.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    /// A new signal observing this trigger.
    pub fn subscribe(&self) -> Shutdown {
        Shutdown {
            rx: self.tx.subscribe(),
        }
    }
}

/// Receiving side. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_trigger, shutdown) = channel();
        shutdown
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Completes once the trigger fires.
    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                // Trigger dropped without firing
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_trigger_reaches_all_clones() {
        let (trigger, shutdown) = channel();
        let other = shutdown.clone();
        let late = trigger.subscribe();

        assert!(!shutdown.is_triggered());
        trigger.trigger();

        assert!(shutdown.is_triggered());
        assert!(other.is_triggered());
        assert!(late.is_triggered());
        shutdown.wait().await;
        other.wait().await;
    }

    #[tokio::test]
    async fn test_wait_wakes_on_trigger() {
        let (trigger, shutdown) = channel();

        let waiter = tokio::spawn(async move { shutdown.wait().await });
        tokio::task::yield_now().await;
        trigger.trigger();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_does_not_fire() {
        let shutdown = Shutdown::never();
        assert!(!shutdown.is_triggered());

        let result = tokio::time::timeout(Duration::from_secs(60), shutdown.wait()).await;
        assert!(result.is_err());
    }
}
