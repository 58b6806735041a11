//! Error types for logger construction and installation
//!
//! Emitting a record never returns one of these: write failures are reported
//! through `tracing` and otherwise swallowed.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while building or installing a logging context
#[derive(Debug, Error)]
pub enum Error {
    /// File system failure with path context
    #[error("I/O error during {operation} on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        operation: &'static str,
        #[source]
        source: io::Error,
    },

    /// Configuration file could not be parsed
    #[error("failed to parse config '{}': {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A process-wide context was installed twice
    #[error("a global xlog context is already installed")]
    AlreadyInstalled,

    /// The process-wide facade was used before installation
    #[error("xlog: logger not installed; call xlog::global::install first")]
    NotInstalled,
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, operation: &'static str, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            operation,
            source,
        }
    }
}

/// Convenience alias for xlog results
pub type Result<T> = std::result::Result<T, Error>;
