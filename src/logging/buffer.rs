//! In-memory destination
//!
//! A thread-safe ring buffer of encoded records. Useful as a console stand-in
//! in tests and for hosts that want to display recent log output.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, RwLock};

use super::sink::Sink;

/// Default number of records retained
pub const DEFAULT_BUFFER_RECORDS: usize = 10_000;

/// Thread-safe ring buffer of encoded records
///
/// Clones share the same storage.
#[derive(Debug, Clone)]
pub struct BufferSink {
    records: Arc<RwLock<VecDeque<String>>>,
    max_records: usize,
}

impl BufferSink {
    /// Create a buffer holding at most `max_records` records
    pub fn new(max_records: usize) -> Self {
        Self {
            records: Arc::new(RwLock::new(VecDeque::with_capacity(max_records.min(1024)))),
            max_records,
        }
    }

    /// All retained records, oldest first
    pub fn records(&self) -> Vec<String> {
        self.records
            .read()
            .map(|r| r.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Retained output split into lines
    pub fn lines(&self) -> Vec<String> {
        self.records()
            .iter()
            .flat_map(|r| r.lines().map(str::to_string).collect::<Vec<_>>())
            .collect()
    }

    /// Retained output as one string
    pub fn contents(&self) -> String {
        self.records().concat()
    }

    /// Number of retained records
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every retained record
    pub fn clear(&self) {
        if let Ok(mut records) = self.records.write() {
            records.clear();
        }
    }
}

impl Default for BufferSink {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_RECORDS)
    }
}

impl Sink for BufferSink {
    fn write_record(&self, buf: &[u8]) -> io::Result<()> {
        let record = String::from_utf8_lossy(buf).into_owned();
        let mut records = self
            .records
            .write()
            .map_err(|_| io::Error::other("buffer lock poisoned"))?;
        if self.max_records > 0 && records.len() >= self.max_records {
            records.pop_front();
        }
        records.push_back(record);
        Ok(())
    }
}
