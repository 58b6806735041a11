//! Severities and the shared level gate
//!
//! A `LevelGate` is an atomic threshold shared by every core of a pipeline, so
//! a runtime level change applies to the file and console destinations at once.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

/// Ordered log severity
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(from = "String", into = "String")]
pub enum Severity {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    /// Recoverable panic: escalates only in development mode
    DPanic,
    Panic,
    Fatal,
}

impl Severity {
    /// All severities, lowest first
    pub const ALL: [Severity; 7] = [
        Severity::Debug,
        Severity::Info,
        Severity::Warn,
        Severity::Error,
        Severity::DPanic,
        Severity::Panic,
        Severity::Fatal,
    ];

    /// Parse a severity name. Unknown names fall back to `Info`.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "debug" => Severity::Debug,
            "info" => Severity::Info,
            "warn" | "warning" => Severity::Warn,
            "error" => Severity::Error,
            "dpanic" => Severity::DPanic,
            "panic" => Severity::Panic,
            "fatal" => Severity::Fatal,
            _ => Severity::Info,
        }
    }

    /// Lowercase name, as used in configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Warn => "warn",
            Severity::Error => "error",
            Severity::DPanic => "dpanic",
            Severity::Panic => "panic",
            Severity::Fatal => "fatal",
        }
    }

    /// Uppercase name, as rendered in records
    pub fn capital(&self) -> &'static str {
        match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::DPanic => "DPANIC",
            Severity::Panic => "PANIC",
            Severity::Fatal => "FATAL",
        }
    }

    fn to_u8(self) -> u8 {
        self as u8
    }

    fn from_u8(raw: u8) -> Self {
        Severity::ALL
            .get(raw as usize)
            .copied()
            .unwrap_or(Severity::Info)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Severity {
    fn from(name: String) -> Self {
        Severity::parse(&name)
    }
}

impl From<&str> for Severity {
    fn from(name: &str) -> Self {
        Severity::parse(name)
    }
}

impl From<Severity> for String {
    fn from(severity: Severity) -> Self {
        severity.as_str().to_string()
    }
}

impl From<tracing::Level> for Severity {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE | tracing::Level::DEBUG => Severity::Debug,
            tracing::Level::INFO => Severity::Info,
            tracing::Level::WARN => Severity::Warn,
            tracing::Level::ERROR => Severity::Error,
        }
    }
}

/// Mutable minimum-severity filter
#[derive(Debug)]
pub struct LevelGate {
    threshold: AtomicU8,
}

impl LevelGate {
    /// Create a gate that admits `level` and above
    pub fn new(level: Severity) -> Self {
        Self {
            threshold: AtomicU8::new(level.to_u8()),
        }
    }

    /// Current threshold
    pub fn level(&self) -> Severity {
        Severity::from_u8(self.threshold.load(Ordering::Relaxed))
    }

    /// Replace the threshold
    pub fn set_level(&self, level: Severity) {
        self.threshold.store(level.to_u8(), Ordering::Relaxed);
    }

    /// Whether a record of `severity` passes the gate
    pub fn enabled(&self, severity: Severity) -> bool {
        severity.to_u8() >= self.threshold.load(Ordering::Relaxed)
    }
}

impl Default for LevelGate {
    fn default() -> Self {
        Self::new(Severity::Info)
    }
}
