//! Destinations for encoded records

use std::io::{self, Write};

/// A writable destination for encoded records
///
/// `write_record` receives one complete encoded record. Implementations must
/// write it atomically with respect to other callers so lines never interleave.
pub trait Sink: Send + Sync {
    fn write_record(&self, buf: &[u8]) -> io::Result<()>;

    /// Flush anything buffered to durable storage
    fn sync(&self) -> io::Result<()> {
        Ok(())
    }
}

/// Standard output, locked for the duration of each record
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink;

impl Sink for ConsoleSink {
    fn write_record(&self, buf: &[u8]) -> io::Result<()> {
        let mut out = io::stdout().lock();
        out.write_all(buf)?;
        out.flush()
    }

    fn sync(&self) -> io::Result<()> {
        io::stdout().lock().flush()
    }
}

/// Standard error, used by the CLI when stdout is a pipe of records
#[derive(Debug, Clone, Copy, Default)]
pub struct StderrSink;

impl Sink for StderrSink {
    fn write_record(&self, buf: &[u8]) -> io::Result<()> {
        let mut out = io::stderr().lock();
        out.write_all(buf)?;
        out.flush()
    }
}
