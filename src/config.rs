//! Logging configuration
//!
//! `Options` is merged onto defaults: every field missing from a TOML document
//! (or left untouched in code) keeps its documented default. Resolution never
//! fails; unrecognised severities become `info` and unknown formats `text`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::level::Severity;

/// Default logger name, also used for the `logger` record key
pub const DEFAULT_LOGGER_NAME: &str = "xlog";

/// Environment variable overriding the minimum severity
pub const LEVEL_ENV_VAR: &str = "XLOG_LEVEL";

const MIB: u64 = 1024 * 1024;

/// Encoding used by the text pipeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Format {
    /// Human-readable tab separated lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
    /// Message and fields only
    Blank,
}

impl Format {
    /// Parse a format name. Unknown names fall back to `Text`.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "json" => Format::Json,
            "blank" => Format::Blank,
            _ => Format::Text,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Text => "text",
            Format::Json => "json",
            Format::Blank => "blank",
        }
    }
}

impl From<String> for Format {
    fn from(name: String) -> Self {
        Format::parse(&name)
    }
}

impl From<Format> for String {
    fn from(format: Format) -> Self {
        format.as_str().to_string()
    }
}

/// Logging options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Logger name written under the `logger` key
    pub name: String,

    /// Console only: no rotated files are opened
    pub no_file: bool,

    /// Encoding of the text pipeline
    pub format: Format,

    /// Attach a stack trace to records at error severity and above
    pub writable_stack: bool,

    /// Annotate records with file:line and function
    pub writable_caller: bool,

    /// Minimum severity for both pipelines
    pub level: Severity,

    /// Directory for rotated log files
    pub path: PathBuf,

    /// Base file name shared by every rotated family
    pub file_name: String,

    /// Records at this severity and above are also written to the error files.
    /// Setting it (or `error_path`) turns the error files on; the threshold
    /// then defaults to `error`.
    pub err_log_level: Option<Severity>,

    /// Directory for the error files, `path` when unset
    pub error_path: Option<PathBuf>,

    /// Rotated files older than this many days are deleted (0 keeps them).
    /// Only applies when `max_backups` is 0.
    pub max_age: u64,

    /// Maximum files kept per family, the active one included (0 keeps all)
    pub max_backups: u32,

    /// Size in bytes after which the active file is rolled over (0 disables)
    pub max_size: u64,

    /// Compress rotated files with zstd
    pub compress: bool,

    /// Development mode: dpanic records escalate like panic
    pub development: bool,

    /// Per-component minimum severities, applied by `Xlog::component`
    pub package_level: HashMap<String, Severity>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            name: DEFAULT_LOGGER_NAME.to_string(),
            no_file: false,
            format: Format::Text,
            writable_stack: false,
            writable_caller: true,
            level: Severity::Info,
            path: PathBuf::from("./logs"),
            file_name: "xlog".to_string(),
            err_log_level: None,
            error_path: None,
            max_age: 1,
            max_backups: 3,
            max_size: 10 * MIB,
            compress: false,
            development: false,
            package_level: HashMap::new(),
        }
    }
}

impl Options {
    /// Parse a (possibly partial) TOML document onto the defaults
    pub fn from_toml_str(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load options from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::io(path, "read config", e))?;
        Self::from_toml_str(&content).map_err(|source| Error::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `XLOG_LEVEL` when it is set
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(level) = std::env::var(LEVEL_ENV_VAR) {
            self.level = Severity::parse(&level);
        }
        self
    }

    /// Severity override for a component, if configured
    pub fn component_level(&self, component: &str) -> Option<Severity> {
        self.package_level.get(component).copied()
    }

    /// Directory and threshold of the error files, when they are enabled
    pub fn error_files(&self) -> Option<(PathBuf, Severity)> {
        if self.err_log_level.is_none() && self.error_path.is_none() {
            return None;
        }
        let dir = self.error_path.clone().unwrap_or_else(|| self.path.clone());
        Some((dir, self.err_log_level.unwrap_or(Severity::Error)))
    }

    /// Age limit for rotated files
    pub fn max_age_duration(&self) -> Option<Duration> {
        (self.max_age > 0).then(|| Duration::from_secs(self.max_age * 24 * 60 * 60))
    }
}
