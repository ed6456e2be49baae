//! # Barcode Limits
//!
//! Maps each barcode to the maximum number of units one basket may hold.
//!
//! ## File Format
//! ```text
//! Barcode,MaxQuantity          ← optional header row (skipped)
//! 8001234567890,3
//! 8009876543210,12
//! ```
//!
//! Column positions are configurable. Rows with a missing column, a blank
//! barcode or a limit that is not a positive whole number are skipped with
//! a warning. When a barcode appears twice, the later row wins.
//!
//! ## Reload
//! ```text
//! reload() ──► parse file ──► ok?  ──yes──► swap map under write lock
//!                              │
//!                              no ──► keep previous map, return error
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Duration;

use ptl_core::validation::{normalize_barcode, parse_max_quantity};
use tracing::{debug, info, warn};

use crate::error::{DataError, DataResult};

// =============================================================================
// Lookup Seam
// =============================================================================

/// Read access to barcode limits, as the picking orchestrator sees it.
pub trait LimitLookup: Send + Sync {
    /// Maximum units per basket for `barcode`, if it is known.
    fn max_for(&self, barcode: &str) -> Option<u32>;

    fn has_limit(&self, barcode: &str) -> bool {
        self.max_for(barcode).is_some()
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Where the limit file lives and how to read it.
///
/// ## Example
/// ```rust
/// use ptl_data::LimitsConfig;
///
/// let config = LimitsConfig::new("data/limits.csv")
///     .columns(0, 2)
///     .has_header(false);
/// assert_eq!(config.limit_column, 2);
/// ```
#[derive(Debug, Clone)]
pub struct LimitsConfig {
    /// Path of the CSV file.
    pub path: PathBuf,

    /// Zero-based index of the barcode column.
    /// Default: 0
    pub barcode_column: usize,

    /// Zero-based index of the limit column.
    /// Default: 1
    pub limit_column: usize,

    /// Whether the first row is a header.
    /// Default: true
    pub has_header: bool,
}

impl LimitsConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        LimitsConfig {
            path: path.into(),
            barcode_column: 0,
            limit_column: 1,
            has_header: true,
        }
    }

    /// Sets the barcode and limit column indexes.
    pub fn columns(mut self, barcode_column: usize, limit_column: usize) -> Self {
        self.barcode_column = barcode_column;
        self.limit_column = limit_column;
        self
    }

    pub fn has_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }
}

// =============================================================================
// Barcode Limits
// =============================================================================

/// Reloadable barcode → max quantity index.
#[derive(Debug)]
pub struct BarcodeLimits {
    config: LimitsConfig,
    limits: RwLock<HashMap<String, u32>>,
}

impl BarcodeLimits {
    /// Loads the limit file.
    ///
    /// Fails when the file cannot be opened; bad rows only produce warnings.
    pub fn load(config: LimitsConfig) -> DataResult<Self> {
        let limits = read_limits_file(&config)?;
        info!(
            path = %config.path.display(),
            barcodes = limits.len(),
            "Barcode limits loaded"
        );
        Ok(BarcodeLimits {
            config,
            limits: RwLock::new(limits),
        })
    }

    /// Builds an index from known entries. The config path is used by
    /// later reloads.
    pub fn from_entries<I, S>(config: LimitsConfig, entries: I) -> Self
    where
        I: IntoIterator<Item = (S, u32)>,
        S: Into<String>,
    {
        let limits = entries.into_iter().map(|(b, max)| (b.into(), max)).collect();
        BarcodeLimits {
            config,
            limits: RwLock::new(limits),
        }
    }

    /// Re-reads the file and swaps the index. Returns the new entry count.
    ///
    /// On failure the previous index stays in place.
    pub fn reload(&self) -> DataResult<usize> {
        let fresh = read_limits_file(&self.config)?;
        let count = fresh.len();

        let mut guard = self.limits.write().unwrap_or_else(|e| e.into_inner());
        *guard = fresh;

        info!(path = %self.config.path.display(), barcodes = count, "Barcode limits reloaded");
        Ok(count)
    }

    pub fn len(&self) -> usize {
        self.limits.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }
}

impl LimitLookup for BarcodeLimits {
    fn max_for(&self, barcode: &str) -> Option<u32> {
        self.limits
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(barcode)
            .copied()
    }
}

// =============================================================================
// Parsing
// =============================================================================

fn read_limits_file(config: &LimitsConfig) -> DataResult<HashMap<String, u32>> {
    let file = std::fs::File::open(&config.path).map_err(|e| DataError::io(&config.path, e))?;
    parse_limits(file, config)
}

/// Parses limit rows from any reader.
pub fn parse_limits<R: Read>(reader: R, config: &LimitsConfig) -> DataResult<HashMap<String, u32>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(config.has_header)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut limits = HashMap::new();
    let mut skipped = 0usize;

    for result in csv_reader.records() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!(path = %config.path.display(), error = %e, "Skipping unreadable limit row");
                skipped += 1;
                continue;
            }
        };
        let line = record.position().map(|p| p.line()).unwrap_or_default();

        let (Some(raw_barcode), Some(raw_limit)) = (
            record.get(config.barcode_column),
            record.get(config.limit_column),
        ) else {
            warn!(line, "Skipping limit row with missing columns");
            skipped += 1;
            continue;
        };

        let barcode = match normalize_barcode(raw_barcode) {
            Ok(barcode) => barcode,
            Err(e) => {
                warn!(line, error = %e, "Skipping limit row");
                skipped += 1;
                continue;
            }
        };

        match parse_max_quantity(raw_limit) {
            Ok(max) => {
                if limits.insert(barcode.clone(), max).is_some() {
                    debug!(line, barcode = %barcode, "Later limit row overrides earlier one");
                }
            }
            Err(e) => {
                warn!(line, barcode = %barcode, error = %e, "Skipping limit row");
                skipped += 1;
            }
        }
    }

    if skipped > 0 {
        warn!(path = %config.path.display(), skipped, "Some limit rows were skipped");
    }

    Ok(limits)
}

// =============================================================================
// Startup Wait
// =============================================================================

/// Waits until `path` exists, checking every `interval`.
///
/// Returns [`DataError::Cancelled`] as soon as `shutdown` completes.
pub async fn wait_for_file<F>(path: &Path, interval: Duration, shutdown: F) -> DataResult<()>
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        if path.exists() {
            return Ok(());
        }

        warn!(
            path = %path.display(),
            retry_in_secs = interval.as_secs(),
            "Limit file not found, waiting"
        );

        tokio::select! {
            _ = &mut shutdown => return Err(DataError::Cancelled(path.to_path_buf())),
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_parse_skips_header_and_bad_rows() {
        let content = "Barcode,Max\nA,3\nB,abc\nC,-1\n,4\nD\nE, 7 \nA,5\n";
        let config = LimitsConfig::new("limits.csv");

        let limits = parse_limits(content.as_bytes(), &config).unwrap();

        assert_eq!(limits.len(), 2);
        assert_eq!(limits.get("A"), Some(&5));
        assert_eq!(limits.get("E"), Some(&7));
        assert!(!limits.contains_key("B"));
        assert!(!limits.contains_key("C"));
        assert!(!limits.contains_key("D"));
    }

    #[test]
    fn test_parse_custom_columns_without_header() {
        let content = "Widget,X1,4\nGadget,X2,9\n";
        let config = LimitsConfig::new("limits.csv").columns(1, 2).has_header(false);

        let limits = parse_limits(content.as_bytes(), &config).unwrap();

        assert_eq!(limits.get("X1"), Some(&4));
        assert_eq!(limits.get("X2"), Some(&9));
    }

    #[test]
    fn test_load_and_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "limits.csv", "Barcode,Max\nX,3\n");

        let limits = BarcodeLimits::load(LimitsConfig::new(&path)).unwrap();

        assert_eq!(limits.len(), 1);
        assert_eq!(limits.max_for("X"), Some(3));
        assert!(limits.has_limit("X"));
        assert!(!limits.has_limit("Y"));
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = BarcodeLimits::load(LimitsConfig::new(dir.path().join("missing.csv")));
        assert!(matches!(result, Err(DataError::Io { .. })));
    }

    #[test]
    fn test_reload_swaps_map() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "limits.csv", "Barcode,Max\nX,3\n");
        let limits = BarcodeLimits::load(LimitsConfig::new(&path)).unwrap();

        write_file(&dir, "limits.csv", "Barcode,Max\nY,2\nZ,1\n");
        assert_eq!(limits.reload().unwrap(), 2);

        assert_eq!(limits.max_for("X"), None);
        assert_eq!(limits.max_for("Y"), Some(2));
    }

    #[test]
    fn test_failed_reload_keeps_previous_map() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "limits.csv", "Barcode,Max\nX,3\n");
        let limits = BarcodeLimits::load(LimitsConfig::new(&path)).unwrap();

        std::fs::remove_file(&path).unwrap();
        assert!(limits.reload().is_err());
        assert_eq!(limits.max_for("X"), Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_file_returns_once_present() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("limits.csv");

        let writer_path = path.clone();
        let writer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(7)).await;
            std::fs::write(&writer_path, "Barcode,Max\n").unwrap();
        });

        wait_for_file(&path, Duration::from_secs(5), std::future::pending())
            .await
            .unwrap();
        writer.await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_file_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("never.csv");

        let shutdown = tokio::time::sleep(Duration::from_secs(12));
        let result = wait_for_file(&path, Duration::from_secs(5), shutdown).await;

        assert!(matches!(result, Err(DataError::Cancelled(_))));
    }
}
