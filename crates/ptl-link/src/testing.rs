//! # Scripted Transport
//!
//! An in-memory controller for tests. Every command is recorded and
//! acknowledged, button presses are replayed from a script, and faults can
//! be injected.
//!
//! ```text
//! test ──press_after(2, B)──► script ◄── ScriptedTransport ◄── CommandService
//!      ──fail_send_at(3, e)─►        ──► sent commands ──► test assertions
//! ```
//!
//! Button presses are released by command count: `press_after(n, address)`
//! makes the press visible once `n` commands were sent. This lets a test
//! press a button "after the target module was lit".

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use ptl_core::ModuleAddress;

use crate::error::{LinkError, LinkResult};
use crate::transport::{ButtonEvent, Connector, Transport};

#[derive(Debug, Default)]
struct Script {
    sent: Vec<String>,
    presses: VecDeque<(usize, ModuleAddress)>,
    send_faults: HashMap<usize, LinkError>,
    connect_failures: usize,
    events_closed_after: Option<usize>,
    connects: usize,
    closes: usize,
}

/// Connector handing out scripted transports. Clones share one script.
#[derive(Debug, Clone, Default)]
pub struct ScriptedConnector {
    script: Arc<Mutex<Script>>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queues a press that is visible right away.
    pub fn press(&self, address: ModuleAddress) {
        self.press_after(0, address);
    }

    /// Queues a press that becomes visible once `sends` commands were sent.
    pub fn press_after(&self, sends: usize, address: ModuleAddress) {
        self.script().presses.push_back((sends, address));
    }

    /// Makes the `index`-th command (1-based, counting every attempt) fail.
    pub fn fail_send_at(&self, index: usize, error: LinkError) {
        self.script().send_faults.insert(index, error);
    }

    /// Reports the connection as closed once `sends` commands were sent and
    /// released presses are taken. Fires once.
    pub fn close_events_after(&self, sends: usize) {
        self.script().events_closed_after = Some(sends);
    }

    /// Makes the next `count` connect attempts fail.
    pub fn fail_next_connects(&self, count: usize) {
        self.script().connect_failures = count;
    }

    /// Every command sent so far, in order.
    pub fn sent(&self) -> Vec<String> {
        self.script().sent.clone()
    }

    pub fn connect_count(&self) -> usize {
        self.script().connects
    }

    pub fn close_count(&self) -> usize {
        self.script().closes
    }

    /// Presses not yet consumed.
    pub fn pending_presses(&self) -> usize {
        self.script().presses.len()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self) -> LinkResult<Box<dyn Transport>> {
        let mut script = self.script();
        script.connects += 1;
        if script.connect_failures > 0 {
            script.connect_failures -= 1;
            return Err(LinkError::ConnectionFailed("scripted failure".to_string()));
        }
        Ok(Box::new(ScriptedTransport {
            script: Arc::clone(&self.script),
        }))
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

/// Transport backed by the shared script.
#[derive(Debug)]
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&mut self, command: &str) -> LinkResult<()> {
        let mut script = self.script.lock().unwrap_or_else(|e| e.into_inner());
        script.sent.push(command.to_string());
        let index = script.sent.len();
        match script.send_faults.remove(&index) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn try_receive_event(&mut self) -> LinkResult<Option<ButtonEvent>> {
        let mut script = self.script.lock().unwrap_or_else(|e| e.into_inner());
        let sent = script.sent.len();
        let released = script
            .presses
            .front()
            .map(|(after, _)| *after <= sent)
            .unwrap_or(false);
        if released {
            return Ok(script
                .presses
                .pop_front()
                .map(|(_, address)| ButtonEvent { address }));
        }

        if script.events_closed_after.is_some_and(|after| after <= sent) {
            script.events_closed_after = None;
            return Err(LinkError::Disconnected);
        }
        Ok(None)
    }

    async fn close(&mut self) -> LinkResult<()> {
        self.script.lock().unwrap_or_else(|e| e.into_inner()).closes += 1;
        Ok(())
    }
}
