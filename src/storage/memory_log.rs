use std::sync::Mutex;

use crate::error_handling::types::StorageError;
use crate::storage::storage_trait::EventSink;

/// In-memory sink used by unit tests to inspect what was recorded.
#[derive(Default)]
pub struct MemoryLog {
    lines: Mutex<Vec<String>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub fn count_containing(&self, needle: &str) -> usize {
        self.lines().iter().filter(|l| l.contains(needle)).count()
    }
}

impl EventSink for MemoryLog {
    fn record(&self, line: &str) -> Result<(), StorageError> {
        self.lines.lock().unwrap().push(line.to_string());
        Ok(())
    }
}
