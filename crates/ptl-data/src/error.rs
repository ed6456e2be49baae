//! # Data Error Types
//!
//! Error types for file operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  std::io::Error / csv::Error                                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DataError (this module) ← Adds the file path                          │
//! │       │                                                                 │
//! │       ├──► limits at startup: fatal, station does not start            │
//! │       ├──► limits reload: logged, previous limits kept                 │
//! │       └──► reports: logged, picking goes on                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use thiserror::Error;

/// File operation errors.
#[derive(Debug, Error)]
pub enum DataError {
    /// Reading or writing a file failed.
    ///
    /// ## When This Occurs
    /// - Limit file missing or unreadable
    /// - Report directory cannot be created
    /// - Disk full
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The CSV reader or writer failed as a whole.
    ///
    /// Single malformed limit rows are skipped, not reported here.
    #[error("CSV error on {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// Waiting for a file was interrupted by shutdown.
    #[error("Cancelled while waiting for {0}")]
    Cancelled(PathBuf),
}

impl DataError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DataError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        DataError::Csv {
            path: path.into(),
            source,
        }
    }
}

/// Result type for file operations.
pub type DataResult<T> = Result<T, DataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_names_the_file() {
        let err = DataError::io(
            "data/limits.csv",
            std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        );
        let msg = err.to_string();
        assert!(msg.contains("data/limits.csv"));
        assert!(msg.contains("no such file"));
    }
}
