//! # Reports
//!
//! Two outputs, both `;`-separated CSV:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Snapshot  {dir}/{yyyyMMdd-HHmm}[-n].csv  written on exit and reset    │
//! │  ──────────────────────────────────────────────────────────────────    │
//! │  Cart;Basket;Barcode;Quantity                                          │
//! │  1;1;8001234567890;3                   one row per occupied basket     │
//! │                                                                         │
//! │  Pick log  {dir}/picks-{yyyyMMdd}.csv     appended after every put     │
//! │  ──────────────────────────────────────────────────────────────────    │
//! │  Timestamp;Cart;Basket;Barcode;Quantity                                │
//! │  2026-10-19T15:30:00+00:00;1;1;8001234567890;1                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Local};
use ptl_core::{Cart, WorkedProduct};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{DataError, DataResult};

const DELIMITER: u8 = b';';

// =============================================================================
// Sink Seam
// =============================================================================

/// Destination for pick records and cart snapshots.
pub trait ReportSink: Send + Sync {
    /// Appends one completed put.
    fn record_pick(&self, product: &WorkedProduct) -> DataResult<()>;

    /// Writes the content of every occupied basket.
    ///
    /// Returns the written file, or `None` when every basket is empty.
    fn write_snapshot(&self, carts: &[Cart], taken_at: DateTime<Local>)
        -> DataResult<Option<PathBuf>>;
}

// =============================================================================
// Rows
// =============================================================================

/// One occupied basket in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotRow {
    #[serde(rename = "Cart")]
    pub cart_id: String,
    #[serde(rename = "Basket")]
    pub basket_id: String,
    #[serde(rename = "Barcode")]
    pub barcode: String,
    #[serde(rename = "Quantity")]
    pub quantity: u32,
}

impl SnapshotRow {
    /// Rows for every occupied basket, in configured order.
    pub fn collect(carts: &[Cart]) -> Vec<SnapshotRow> {
        carts
            .iter()
            .flat_map(|cart| {
                cart.occupied().filter_map(move |basket| {
                    basket.barcode().map(|barcode| SnapshotRow {
                        cart_id: cart.id().to_string(),
                        basket_id: basket.id().to_string(),
                        barcode: barcode.to_string(),
                        quantity: basket.current_quantity(),
                    })
                })
            })
            .collect()
    }
}

#[derive(Debug, Serialize)]
struct PickRow<'a> {
    #[serde(rename = "Timestamp")]
    timestamp: String,
    #[serde(rename = "Cart")]
    cart_id: &'a str,
    #[serde(rename = "Basket")]
    basket_id: &'a str,
    #[serde(rename = "Barcode")]
    barcode: &'a str,
    #[serde(rename = "Quantity")]
    quantity: u32,
}

// =============================================================================
// CSV Sink
// =============================================================================

/// Writes reports as CSV files under one directory.
#[derive(Debug)]
pub struct CsvReportSink {
    directory: PathBuf,
    /// Serializes appends to the pick log.
    pick_lock: Mutex<()>,
}

impl CsvReportSink {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        CsvReportSink {
            directory: directory.into(),
            pick_lock: Mutex::new(()),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path of the snapshot taken at `taken_at`.
    ///
    /// Later snapshots within the same minute get `-2`, `-3`, ... appended
    /// when written.
    pub fn snapshot_path(&self, taken_at: DateTime<Local>) -> PathBuf {
        self.numbered_snapshot_path(taken_at, 1)
    }

    fn numbered_snapshot_path(&self, taken_at: DateTime<Local>, number: u32) -> PathBuf {
        let stamp = taken_at.format("%Y%m%d-%H%M");
        match number {
            1 => self.directory.join(format!("{}.csv", stamp)),
            n => self.directory.join(format!("{}-{}.csv", stamp, n)),
        }
    }

    /// Creates the first free snapshot file for `taken_at`. Never overwrites.
    fn create_snapshot_file(&self, taken_at: DateTime<Local>) -> DataResult<(PathBuf, File)> {
        let mut number = 1;
        loop {
            let path = self.numbered_snapshot_path(taken_at, number);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => number += 1,
                Err(e) => return Err(DataError::io(&path, e)),
            }
        }
    }

    /// Path of the pick log for the local day of `at`.
    pub fn pick_log_path(&self, at: DateTime<Local>) -> PathBuf {
        self.directory
            .join(format!("picks-{}.csv", at.format("%Y%m%d")))
    }

    fn ensure_directory(&self) -> DataResult<()> {
        std::fs::create_dir_all(&self.directory).map_err(|e| DataError::io(&self.directory, e))
    }
}

impl ReportSink for CsvReportSink {
    fn record_pick(&self, product: &WorkedProduct) -> DataResult<()> {
        let _guard = self.pick_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.ensure_directory()?;

        let path = self.pick_log_path(product.timestamp.with_timezone(&Local));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| DataError::io(&path, e))?;
        let is_new = file
            .metadata()
            .map_err(|e| DataError::io(&path, e))?
            .len()
            == 0;

        let mut writer = csv::WriterBuilder::new()
            .delimiter(DELIMITER)
            .has_headers(is_new)
            .from_writer(file);

        writer
            .serialize(PickRow {
                timestamp: product.timestamp.to_rfc3339(),
                cart_id: &product.cart_id,
                basket_id: &product.basket_id,
                barcode: &product.barcode,
                quantity: product.quantity,
            })
            .map_err(|e| DataError::csv(&path, e))?;
        writer.flush().map_err(|e| DataError::io(&path, e))?;

        debug!(path = %path.display(), barcode = %product.barcode, "Pick recorded");
        Ok(())
    }

    fn write_snapshot(
        &self,
        carts: &[Cart],
        taken_at: DateTime<Local>,
    ) -> DataResult<Option<PathBuf>> {
        let rows = SnapshotRow::collect(carts);
        if rows.is_empty() {
            info!("All baskets empty, no report written");
            return Ok(None);
        }

        self.ensure_directory()?;
        let (path, file) = self.create_snapshot_file(taken_at)?;

        let mut writer = csv::WriterBuilder::new()
            .delimiter(DELIMITER)
            .from_writer(file);
        for row in &rows {
            writer.serialize(row).map_err(|e| DataError::csv(&path, e))?;
        }
        writer.flush().map_err(|e| DataError::io(&path, e))?;

        info!(path = %path.display(), baskets = rows.len(), "Report written");
        Ok(Some(path))
    }
}

// =============================================================================
// In-Memory Sink
// =============================================================================

/// Keeps reports in memory. Used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryReportSink {
    picks: Mutex<Vec<WorkedProduct>>,
    snapshots: Mutex<Vec<Vec<SnapshotRow>>>,
}

impl MemoryReportSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn picks(&self) -> Vec<WorkedProduct> {
        self.picks.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn snapshots(&self) -> Vec<Vec<SnapshotRow>> {
        self.snapshots.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl ReportSink for MemoryReportSink {
    fn record_pick(&self, product: &WorkedProduct) -> DataResult<()> {
        self.picks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(product.clone());
        Ok(())
    }

    fn write_snapshot(
        &self,
        carts: &[Cart],
        _taken_at: DateTime<Local>,
    ) -> DataResult<Option<PathBuf>> {
        let rows = SnapshotRow::collect(carts);
        if rows.is_empty() {
            return Ok(None);
        }
        self.snapshots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(rows);
        Ok(Some(PathBuf::from("memory")))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use ptl_core::{Basket, CartContainer, ModuleAddress};

    fn container() -> CartContainer {
        CartContainer::new(vec![Cart::new(
            "1",
            vec![
                Basket::new("1", ModuleAddress::new(1).unwrap()),
                Basket::new("2", ModuleAddress::new(2).unwrap()),
            ],
        )])
        .unwrap()
    }

    fn pick(barcode: &str, quantity: u32) -> WorkedProduct {
        WorkedProduct {
            timestamp: Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap(),
            cart_id: "1".to_string(),
            basket_id: "1".to_string(),
            barcode: barcode.to_string(),
            quantity,
        }
    }

    #[test]
    fn test_snapshot_rows_only_occupied_baskets() {
        let mut c = container();
        c.assign_item("X", 3);
        c.assign_item("X", 3);

        let rows = SnapshotRow::collect(c.carts());
        assert_eq!(
            rows,
            vec![SnapshotRow {
                cart_id: "1".to_string(),
                basket_id: "1".to_string(),
                barcode: "X".to_string(),
                quantity: 2,
            }]
        );
    }

    #[test]
    fn test_csv_snapshot_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CsvReportSink::new(dir.path().join("report"));
        let mut c = container();
        c.assign_item("X", 3);

        let taken_at = Local.with_ymd_and_hms(2026, 10, 19, 17, 30, 0).unwrap();
        let path = sink.write_snapshot(c.carts(), taken_at).unwrap().unwrap();

        assert!(path.ends_with("20261019-1730.csv"));
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "Cart;Basket;Barcode;Quantity\n1;1;X;1\n");
    }

    #[test]
    fn test_csv_snapshot_same_minute_keeps_both() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CsvReportSink::new(dir.path());
        let mut c = container();
        c.assign_item("X", 3);

        let first_at = Local.with_ymd_and_hms(2026, 10, 19, 10, 0, 5).unwrap();
        let first = sink.write_snapshot(c.carts(), first_at).unwrap().unwrap();

        c.assign_item("Y", 3);
        let second_at = Local.with_ymd_and_hms(2026, 10, 19, 10, 0, 50).unwrap();
        let second = sink.write_snapshot(c.carts(), second_at).unwrap().unwrap();

        assert!(first.ends_with("20261019-1000.csv"));
        assert!(second.ends_with("20261019-1000-2.csv"));
        assert_eq!(
            std::fs::read_to_string(&first).unwrap(),
            "Cart;Basket;Barcode;Quantity\n1;1;X;1\n"
        );
        assert_eq!(
            std::fs::read_to_string(&second).unwrap(),
            "Cart;Basket;Barcode;Quantity\n1;1;X;1\n1;2;Y;1\n"
        );
    }

    #[test]
    fn test_csv_snapshot_skipped_when_empty() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CsvReportSink::new(dir.path());

        let result = sink.write_snapshot(container().carts(), Local::now()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_pick_log_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CsvReportSink::new(dir.path());

        sink.record_pick(&pick("X", 1)).unwrap();
        sink.record_pick(&pick("X", 2)).unwrap();

        let path = sink.pick_log_path(pick("X", 1).timestamp.with_timezone(&Local));
        let content = std::fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = content.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "Timestamp;Cart;Basket;Barcode;Quantity");
        assert!(lines[1].ends_with(";1;1;X;1"));
        assert!(lines[2].ends_with(";1;1;X;2"));
    }

    #[test]
    fn test_memory_sink() {
        let sink = MemoryReportSink::new();
        sink.record_pick(&pick("X", 1)).unwrap();
        assert_eq!(sink.picks().len(), 1);

        let mut c = container();
        assert!(sink.write_snapshot(c.carts(), Local::now()).unwrap().is_none());
        c.assign_item("Y", 2);
        assert!(sink.write_snapshot(c.carts(), Local::now()).unwrap().is_some());
        assert_eq!(sink.snapshots()[0][0].barcode, "Y");
    }
}
