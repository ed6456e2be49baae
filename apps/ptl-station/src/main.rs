//! # PTL Station
//!
//! ```text
//! ptl-station [CONFIG_PATH]
//!
//!   load config ──► wait for limit file ──► load limits ──► run station
//!                                                            │
//!   Ctrl+C / SIGTERM ──► shutdown trigger ───────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use ptl_data::{wait_for_file, BarcodeLimits, CsvReportSink, DataError, ReportSink};
use ptl_link::{shutdown, Connector, TcpConnector};
use ptl_station::config::DEFAULT_CONFIG_FILE;
use ptl_station::{stdin_lines, Station, StationConfig};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "Starting PTL station");

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let config = StationConfig::load(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    info!(
        controller = %format!("{}:{}", config.controller.host, config.controller.port),
        carts = config.carts.len(),
        "Configuration loaded"
    );

    let (trigger, signal) = shutdown::channel();
    let trigger = Arc::new(trigger);
    {
        let trigger = trigger.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            trigger.trigger();
        });
    }

    let limits_config = config.limits_config();
    match wait_for_file(&config.limits.file, config.limits_wait_interval(), signal.wait()).await {
        Ok(()) => {}
        Err(DataError::Cancelled(_)) => {
            info!("Stopped while waiting for the barcode limit file");
            return Ok(());
        }
        Err(e) => return Err(e).context("waiting for the barcode limit file"),
    }
    let limits = Arc::new(BarcodeLimits::load(limits_config).context("loading barcode limits")?);

    let reports: Arc<dyn ReportSink> = Arc::new(CsvReportSink::new(&config.report.directory));
    let connector: Arc<dyn Connector> = Arc::new(TcpConnector::new(
        config.controller.host.clone(),
        config.controller.port,
    ));

    let station = Station::new(&config, limits, reports, connector)?;
    let exit = station.run(stdin_lines(), trigger).await;

    info!(?exit, "PTL station stopped");
    Ok(())
}

/// Completes on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, stopping station...");
}
