//! # Station Wiring
//!
//! Builds the shared state and runs the reader and processor loops until
//! the operator exits, input ends or shutdown is signalled.
//!
//! ```text
//! Station::run
//!   ├── spawn run_processor(orchestrator, relay_rx)
//!   ├── InputReader::run(lines)            (this task)
//!   ├── trigger shutdown, join processor   (lights off, link closed)
//!   └── final report snapshot
//! ```

use std::sync::Arc;

use ptl_data::{BarcodeLimits, ReportSink};
use ptl_link::{CommandService, Connector, ShutdownTrigger};
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::config::StationConfig;
use crate::error::ConfigError;
use crate::intake::{run_processor, write_report, InputReader, LineSource, ReaderExit};
use crate::picking::PickingOrchestrator;
use crate::state::{ProcessingGate, SharedCarts};

/// Relay capacity. One pending scan at most.
const RELAY_SLOTS: usize = 1;

/// A configured station, ready to run.
pub struct Station {
    carts: SharedCarts,
    gate: ProcessingGate,
    limits: Arc<BarcodeLimits>,
    reports: Arc<dyn ReportSink>,
    orchestrator: PickingOrchestrator,
}

impl Station {
    pub fn new(
        config: &StationConfig,
        limits: Arc<BarcodeLimits>,
        reports: Arc<dyn ReportSink>,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, ConfigError> {
        let carts = SharedCarts::new(config.build_carts()?);
        let commands = CommandService::new(connector, &config.link_settings());
        let orchestrator = PickingOrchestrator::new(
            carts.clone(),
            limits.clone(),
            commands,
            reports.clone(),
            config.picking_settings(),
        );

        info!(
            baskets = carts.with_carts(|c| c.basket_count()),
            barcodes = limits.len(),
            "Station configured"
        );

        Ok(Station {
            carts,
            gate: ProcessingGate::new(),
            limits,
            reports,
            orchestrator,
        })
    }

    /// Shared cart state, for inspection.
    pub fn carts(&self) -> SharedCarts {
        self.carts.clone()
    }

    /// Runs until the reader stops, then stops the processor and writes
    /// the final report.
    pub async fn run<L: LineSource>(self, lines: L, trigger: Arc<ShutdownTrigger>) -> ReaderExit {
        let shutdown = trigger.subscribe();
        let (relay_tx, relay_rx) = mpsc::channel(RELAY_SLOTS);

        let processor = tokio::spawn(run_processor(
            self.orchestrator,
            relay_rx,
            self.gate.clone(),
            shutdown.clone(),
        ));

        let mut reader = InputReader::new(
            lines,
            self.carts.clone(),
            self.gate.clone(),
            relay_tx,
            self.limits.clone(),
            self.reports.clone(),
        );
        let exit = reader.run(&shutdown).await;
        info!(?exit, "Stopping station");

        trigger.trigger();
        if let Err(e) = processor.await {
            error!(error = %e, "Processor task failed");
        }

        write_report(&self.carts, self.reports.as_ref());
        exit
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
