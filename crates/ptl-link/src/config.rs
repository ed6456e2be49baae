//! # Link Settings
//!
//! Timing knobs for the controller link. The station fills these from its
//! own configuration file.

use std::time::Duration;

/// Timing settings for the controller link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSettings {
    /// Bound on one connect attempt.
    /// Default: 5 seconds
    pub connect_timeout: Duration,

    /// Bound on waiting for the controller's reply to one command.
    /// Default: 3 seconds
    pub ack_timeout: Duration,

    /// Fixed wait between failed connect attempts.
    /// Default: 10 seconds
    pub reconnect_delay: Duration,

    /// Interval at which the button event queue is polled.
    /// Default: 50 milliseconds
    pub poll_interval: Duration,
}

impl Default for LinkSettings {
    fn default() -> Self {
        LinkSettings {
            connect_timeout: Duration::from_secs(5),
            ack_timeout: Duration::from_secs(3),
            reconnect_delay: Duration::from_secs(10),
            poll_interval: Duration::from_millis(50),
        }
    }
}

impl LinkSettings {
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}
