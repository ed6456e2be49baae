//! # ptl-data: File-Backed Data for the PTL Station
//!
//! The station reads one file (the barcode limit list) and writes two kinds
//! of reports (cart snapshots and the pick log). All of it lives here.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        PTL Station Data Flow                            │
//! │                                                                         │
//! │  Picking orchestrator / console                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     ptl-data (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────────────────┐        ┌──────────────────────┐     │   │
//! │  │   │   BarcodeLimits      │        │   CsvReportSink      │     │   │
//! │  │   │   (limits.rs)        │        │   (report.rs)        │     │   │
//! │  │   │                      │        │                      │     │   │
//! │  │   │ barcode → max qty    │        │ snapshot on exit     │     │   │
//! │  │   │ RwLock, reloadable   │        │ pick log per day     │     │   │
//! │  │   └──────────┬───────────┘        └──────────┬───────────┘     │   │
//! │  └──────────────┼───────────────────────────────┼─────────────────┘   │
//! │                 ▼                               ▼                       │
//! │        data/limits.csv                 report/20261019-1730.csv        │
//! │                                        report/picks-20261019.csv       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`limits`] - Barcode limit index and the startup file wait
//! - [`report`] - Report sink trait, CSV and in-memory implementations
//! - [`error`] - Data error types

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod limits;
pub mod report;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DataError, DataResult};
pub use limits::{wait_for_file, BarcodeLimits, LimitLookup, LimitsConfig};
pub use report::{CsvReportSink, MemoryReportSink, ReportSink, SnapshotRow};
