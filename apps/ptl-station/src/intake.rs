//! # Input Serialization
//!
//! Two loops keep the console responsive while picking operations run one
//! at a time.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  LineSource ──► InputReader ──try_send──► relay (1 slot) ──► processor │
//! │                  │                          │                   │       │
//! │                  │ status / help / reload   │ slot taken:       │       │
//! │                  │ reset (gate must be free)│ scan dropped      │       │
//! │                  │ exit                     │                   ▼       │
//! │                  │                          │        gate.try_acquire() │
//! │                  │ gate busy: scan dropped  │                   │       │
//! │                  ▼                          │                   ▼       │
//! │             ReaderExit                      │    orchestrator.process() │
//! │                                                                         │
//! │  Nothing is queued behind a running operation: the operator rescans.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::io::BufRead;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Local;
use ptl_core::validation::normalize_barcode;
use ptl_data::{BarcodeLimits, ReportSink};
use ptl_link::Shutdown;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, info, warn};

use crate::console::{is_confirmation, ConsoleCommand, HELP_TEXT};
use crate::error::PickError;
use crate::picking::PickingOrchestrator;
use crate::state::{ProcessingGate, SharedCarts};

/// Lines read ahead of the reader loop.
const STDIN_BUFFER: usize = 16;

// =============================================================================
// Line Sources
// =============================================================================

/// Where operator input comes from.
#[async_trait]
pub trait LineSource: Send {
    /// Next line, or `None` at end of input.
    async fn read_line(&mut self) -> Option<String>;
}

/// Lines pushed through a channel. Input ends when every sender is gone.
#[derive(Debug)]
pub struct ChannelLines {
    rx: mpsc::Receiver<String>,
}

impl ChannelLines {
    pub fn new(rx: mpsc::Receiver<String>) -> Self {
        ChannelLines { rx }
    }
}

#[async_trait]
impl LineSource for ChannelLines {
    async fn read_line(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

/// Lines from standard input.
///
/// Read on a dedicated OS thread so a pending read never holds up process
/// exit.
pub fn stdin_lines() -> ChannelLines {
    let (tx, rx) = mpsc::channel(STDIN_BUFFER);

    let spawned = std::thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.blocking_send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to read standard input");
                        break;
                    }
                }
            }
        });

    if let Err(e) = spawned {
        error!(error = %e, "Failed to start the input thread");
    }

    ChannelLines::new(rx)
}

// =============================================================================
// Reader
// =============================================================================

/// Why the reader stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderExit {
    /// `exit`, `quit` or `q`.
    Command,
    EndOfInput,
    Shutdown,
}

/// Reads lines, runs console commands inline and relays scans.
pub struct InputReader<L> {
    lines: L,
    carts: SharedCarts,
    gate: ProcessingGate,
    relay: mpsc::Sender<String>,
    limits: Arc<BarcodeLimits>,
    reports: Arc<dyn ReportSink>,
}

impl<L: LineSource> InputReader<L> {
    pub fn new(
        lines: L,
        carts: SharedCarts,
        gate: ProcessingGate,
        relay: mpsc::Sender<String>,
        limits: Arc<BarcodeLimits>,
        reports: Arc<dyn ReportSink>,
    ) -> Self {
        InputReader {
            lines,
            carts,
            gate,
            relay,
            limits,
            reports,
        }
    }

    /// Runs until `exit`, end of input or shutdown.
    pub async fn run(&mut self, shutdown: &Shutdown) -> ReaderExit {
        info!("Ready. Scan a barcode or type 'help'");

        loop {
            let line = match self.next_line(shutdown).await {
                Ok(line) => line,
                Err(exit) => return exit,
            };

            match ConsoleCommand::parse(&line) {
                ConsoleCommand::Blank => {}
                ConsoleCommand::Help => info!("\n{}", HELP_TEXT),
                ConsoleCommand::Status => self.print_status(),
                ConsoleCommand::Reload => self.reload_limits(),
                ConsoleCommand::Exit => {
                    info!("Exit requested");
                    return ReaderExit::Command;
                }
                ConsoleCommand::Reset => {
                    if let Err(exit) = self.reset(shutdown).await {
                        return exit;
                    }
                }
                ConsoleCommand::Scan(raw) => self.relay_scan(&raw),
            }
        }
    }

    async fn next_line(&mut self, shutdown: &Shutdown) -> Result<String, ReaderExit> {
        tokio::select! {
            _ = shutdown.wait() => Err(ReaderExit::Shutdown),
            line = self.lines.read_line() => match line {
                Some(line) => Ok(line),
                None => {
                    info!("Input closed");
                    Err(ReaderExit::EndOfInput)
                }
            },
        }
    }

    fn print_status(&self) {
        let table = self.carts.with_carts(|c| c.to_string());
        let busy = self.gate.is_busy();
        info!(picking = busy, "Cart status\n{}", table);
    }

    fn reload_limits(&self) {
        match self.limits.reload() {
            Ok(count) => info!(barcodes = count, "Barcode limits reloaded"),
            Err(e) => error!(error = %e, "Reload failed, keeping previous limits"),
        }
    }

    /// Asks for confirmation, then writes the report and empties every basket.
    async fn reset(&mut self, shutdown: &Shutdown) -> Result<(), ReaderExit> {
        if self.gate.is_busy() {
            warn!("Reset refused: a picking operation is in progress");
            return Ok(());
        }

        info!("Reset all baskets? (s/n)");
        let answer = self.next_line(shutdown).await?;
        if !is_confirmation(&answer) {
            info!("Reset cancelled");
            return Ok(());
        }

        let Some(_guard) = self.gate.try_acquire() else {
            warn!("Reset refused: a picking operation is in progress");
            return Ok(());
        };

        write_report(&self.carts, self.reports.as_ref());
        self.carts.with_carts_mut(|c| c.reset_all());
        info!("All baskets reset");
        Ok(())
    }

    fn relay_scan(&self, raw: &str) {
        let barcode = match normalize_barcode(raw) {
            Ok(barcode) => barcode,
            Err(e) => {
                warn!(error = %e, "Invalid scan ignored");
                return;
            }
        };

        if self.gate.is_busy() {
            warn!(%barcode, "Picking in progress, scan dropped. Rescan when done");
            return;
        }

        match self.relay.try_send(barcode) {
            Ok(()) => {}
            Err(TrySendError::Full(barcode)) => {
                warn!(%barcode, "Previous scan still pending, scan dropped")
            }
            Err(TrySendError::Closed(barcode)) => {
                error!(%barcode, "Processor stopped, scan dropped")
            }
        }
    }
}

/// Writes a snapshot of the occupied baskets. Failures are logged.
pub fn write_report(carts: &SharedCarts, reports: &dyn ReportSink) {
    let written = carts.with_carts(|c| reports.write_snapshot(c.carts(), Local::now()));
    match written {
        Ok(Some(path)) => info!(path = %path.display(), "Report written"),
        Ok(None) => debug!("No occupied baskets, no report written"),
        Err(e) => error!(error = %e, "Failed to write report"),
    }
}

// =============================================================================
// Processor
// =============================================================================

/// Drains the relay and runs one picking operation per scan.
///
/// Connects and darkens every module first. Returns on shutdown or once
/// the relay is closed, leaving the link closed.
pub async fn run_processor(
    mut orchestrator: PickingOrchestrator,
    mut relay: mpsc::Receiver<String>,
    gate: ProcessingGate,
    shutdown: Shutdown,
) {
    if let Err(e) = orchestrator.prepare(&shutdown).await {
        match e {
            PickError::Cancelled => debug!("Shutdown before the controller was ready"),
            other => warn!(error = %other, "Controller not ready"),
        }
    }

    loop {
        let barcode = tokio::select! {
            _ = shutdown.wait() => break,
            item = relay.recv() => match item {
                Some(barcode) => barcode,
                None => break,
            },
        };

        let Some(_guard) = gate.try_acquire() else {
            warn!(%barcode, "Station busy, scan dropped");
            continue;
        };

        let result = orchestrator.process(&barcode, &shutdown).await;
        if result.is_success() {
            info!(%barcode, %result, "Scan processed");
        } else {
            warn!(%barcode, %result, "Scan not placed");
        }
    }

    orchestrator.shutdown().await;
    debug!("Processor stopped");
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use ptl_core::{Basket, Cart, CartContainer, ModuleAddress};
    use ptl_data::{LimitLookup, LimitsConfig, MemoryReportSink};

    struct Fixture {
        reader: InputReader<ChannelLines>,
        relay_rx: mpsc::Receiver<String>,
        carts: SharedCarts,
        gate: ProcessingGate,
        reports: Arc<MemoryReportSink>,
    }

    fn fixture(lines: &[&str], limits: BarcodeLimits) -> Fixture {
        let (line_tx, line_rx) = mpsc::channel(16);
        for line in lines {
            line_tx.try_send(line.to_string()).unwrap();
        }
        drop(line_tx);

        let container = CartContainer::new(vec![Cart::new(
            "1",
            vec![Basket::new("1", ModuleAddress::new(1).unwrap())],
        )])
        .unwrap();
        let carts = SharedCarts::new(container);
        let gate = ProcessingGate::new();
        let reports = Arc::new(MemoryReportSink::new());
        let (relay_tx, relay_rx) = mpsc::channel(1);

        let reader = InputReader::new(
            ChannelLines::new(line_rx),
            carts.clone(),
            gate.clone(),
            relay_tx,
            Arc::new(limits),
            reports.clone(),
        );

        Fixture {
            reader,
            relay_rx,
            carts,
            gate,
            reports,
        }
    }

    fn no_limits() -> BarcodeLimits {
        BarcodeLimits::from_entries(LimitsConfig::new("limits.csv"), Vec::<(String, u32)>::new())
    }

    #[tokio::test]
    async fn test_exit_command() {
        let mut f = fixture(&["help", "status", "", "exit", "A"], no_limits());

        assert_eq!(f.reader.run(&Shutdown::never()).await, ReaderExit::Command);
        assert!(f.relay_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_end_of_input() {
        let mut f = fixture(&["A"], no_limits());

        assert_eq!(f.reader.run(&Shutdown::never()).await, ReaderExit::EndOfInput);
        assert_eq!(f.relay_rx.try_recv().unwrap(), "A");
    }

    #[tokio::test]
    async fn test_second_scan_dropped_while_slot_taken() {
        let mut f = fixture(&["A", " B ", "q"], no_limits());

        f.reader.run(&Shutdown::never()).await;

        assert_eq!(f.relay_rx.try_recv().unwrap(), "A");
        assert!(f.relay_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_scan_dropped_while_gate_held() {
        let mut f = fixture(&["A", "exit"], no_limits());
        let _guard = f.gate.try_acquire().unwrap();

        f.reader.run(&Shutdown::never()).await;

        assert!(f.relay_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_reset_confirmed() {
        let mut f = fixture(&["reset", "s", "exit"], no_limits());
        f.carts.with_carts_mut(|c| c.assign_item("X", 3));

        f.reader.run(&Shutdown::never()).await;

        assert_eq!(f.carts.with_carts(|c| c.occupancy()), 0);
        let snapshots = f.reports.snapshots();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0][0].barcode, "X");
        assert!(!f.gate.is_busy());
    }

    #[tokio::test]
    async fn test_reset_declined() {
        let mut f = fixture(&["reset", "no", "exit"], no_limits());
        f.carts.with_carts_mut(|c| c.assign_item("X", 3));

        f.reader.run(&Shutdown::never()).await;

        assert_eq!(f.carts.with_carts(|c| c.occupancy()), 1);
        assert!(f.reports.snapshots().is_empty());
        assert!(f.relay_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_reset_refused_while_picking() {
        let mut f = fixture(&["reset", "y", "exit"], no_limits());
        f.carts.with_carts_mut(|c| c.assign_item("X", 3));
        let _guard = f.gate.try_acquire().unwrap();

        f.reader.run(&Shutdown::never()).await;

        assert_eq!(f.carts.with_carts(|c| c.occupancy()), 1);
        assert!(f.reports.snapshots().is_empty());
    }

    #[tokio::test]
    async fn test_reload_limits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("limits.csv");
        std::fs::write(&path, "barcode,limit\nX,3\n").unwrap();
        let limits = BarcodeLimits::load(LimitsConfig::new(&path)).unwrap();

        let mut f = fixture(&["reload", "exit"], limits);
        std::fs::write(&path, "barcode,limit\nX,5\nY,2\n").unwrap();

        f.reader.run(&Shutdown::never()).await;

        let limits = f.reader.limits.clone();
        assert_eq!(limits.max_for("X"), Some(5));
        assert_eq!(limits.max_for("Y"), Some(2));
    }

    #[tokio::test]
    async fn test_shutdown_stops_reader() {
        let (_line_tx, line_rx) = mpsc::channel::<String>(1);
        let (relay_tx, _relay_rx) = mpsc::channel(1);
        let mut reader = InputReader::new(
            ChannelLines::new(line_rx),
            SharedCarts::new(
                CartContainer::new(vec![Cart::new(
                    "1",
                    vec![Basket::new("1", ModuleAddress::new(1).unwrap())],
                )])
                .unwrap(),
            ),
            ProcessingGate::new(),
            relay_tx,
            Arc::new(no_limits()),
            Arc::new(MemoryReportSink::new()),
        );
        let (trigger, shutdown) = ptl_link::shutdown::channel();
        trigger.trigger();

        assert_eq!(reader.run(&shutdown).await, ReaderExit::Shutdown);
    }
}
