//! xlog - dual-sink structured logging
//!
//! Every record goes through two pipelines built from one set of `Options`:
//! a JSON pipeline for machines and a text pipeline for people. Both write to
//! rotated files and the console, and share the same level semantics.
//!
//! ```ignore
//! let xlog = xlog::init(xlog::Options::default());
//! xlog.info("service started");
//! xlog.cwarnf(format_args!("cache at {}%", 93));
//! ```

pub mod bridge;
pub mod config;
pub mod error;
pub mod global;
pub mod level;
pub mod logger;
pub mod logging;
mod macros;
pub mod pipeline;
pub mod query;

pub use bridge::XlogLayer;
pub use config::{Format, Options};
pub use error::{Error, Result};
pub use level::{LevelGate, Severity};
pub use logger::{Core, Escalation, Logger, LoggerConfig};
pub use logging::{BufferSink, Caller, ConsoleSink, Field, StderrSink, Value};
pub use pipeline::{init, Xlog, XlogBuilder};
pub use query::{QueryLogAdapter, QueryLogLevel, QueryLogger, QueryLoggerConfig, RecordNotFound};
