use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use log::{error, info};

use crate::error_handling::types::StorageError;
use crate::storage::storage_trait::EventSink;

const LOG_FILE_NAME: &str = "decoy.log";

/// File-backed [`EventSink`].
///
/// Every record becomes one `[YYYY-mm-dd HH:MM:SS UTC] <line>` row appended to
/// `<log dir>/decoy.log`. The file handle sits behind a single mutex and each row is
/// flushed and synced before the lock is released, so rows are never lost or
/// interleaved.
pub struct EventLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl EventLog {
    pub fn new<P: AsRef<Path>>(log_dir: P) -> Result<Self, StorageError> {
        let log_dir = log_dir.as_ref();
        fs::create_dir_all(log_dir).map_err(|e| {
            error!("Failed to create log dir {}: {}", log_dir.display(), e);
            StorageError::ConnectionFailed
        })?;

        let path = log_dir.join(LOG_FILE_NAME);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                error!("Failed to open log file {}: {}", path.display(), e);
                StorageError::ConnectionFailed
            })?;
        info!("EventLog writing to {}", path.display());

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// One row per record: control characters inside `line` (newlines, ANSI
    /// escapes) are written in escaped form so client input cannot start a row.
    fn format_line(line: &str) -> String {
        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
        let line = line.trim_end_matches(['\r', '\n']);
        let mut row = format!("[{}] ", timestamp);
        for c in line.chars() {
            if c.is_control() {
                row.extend(c.escape_default());
            } else {
                row.push(c);
            }
        }
        row.push('\n');
        row
    }
}

impl EventSink for EventLog {
    fn record(&self, line: &str) -> Result<(), StorageError> {
        let row = Self::format_line(line);
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        file.write_all(row.as_bytes())
            .and_then(|_| file.flush())
            .and_then(|_| file.sync_data())
            .map_err(|e| {
                error!("Failed to append to {}: {}", self.path.display(), e);
                StorageError::WriteFailed
            })
    }
}
