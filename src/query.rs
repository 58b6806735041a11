//! Query logging adapter
//!
//! Implements the logging contract a data-access layer expects and forwards
//! it to the text logger, flagging statements slower than a threshold.

use std::error::Error as StdError;
use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::logger::Logger;
use crate::logging::{Field, Value};
use crate::pipeline::Xlog;

/// Default slow statement threshold
pub const DEFAULT_SLOW_THRESHOLD: Duration = Duration::from_millis(200);

/// Verbosity requested by the data-access layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryLogLevel {
    Silent,
    Error,
    #[default]
    Warn,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryLoggerConfig {
    /// Statements taking longer are logged as warnings (zero disables)
    #[serde(with = "duration_millis")]
    pub slow_threshold: Duration,
    /// Do not report "record not found" as an error
    pub ignore_record_not_found_error: bool,
    pub log_level: QueryLogLevel,
}

impl Default for QueryLoggerConfig {
    fn default() -> Self {
        Self {
            slow_threshold: DEFAULT_SLOW_THRESHOLD,
            ignore_record_not_found_error: false,
            log_level: QueryLogLevel::Warn,
        }
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

/// Returned by the data-access layer when a lookup matched no rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Error)]
#[error("record not found")]
pub struct RecordNotFound;

/// Whether `err` or anything in its source chain is `RecordNotFound`
pub fn is_record_not_found(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if e.is::<RecordNotFound>() {
            return true;
        }
        current = e.source();
    }
    false
}

/// Logging contract of a data-access layer
pub trait QueryLogger: Send + Sync {
    /// A logger with the same destinations and a different verbosity
    fn log_mode(&self, level: QueryLogLevel) -> Box<dyn QueryLogger>;

    fn info(&self, args: fmt::Arguments<'_>);

    fn warn(&self, args: fmt::Arguments<'_>);

    fn error(&self, args: fmt::Arguments<'_>);

    /// Report one executed statement
    ///
    /// `fc` yields the statement text and the number of affected rows; it is
    /// only called when a record will be produced.
    fn trace(
        &self,
        begin: Instant,
        fc: &dyn Fn() -> (String, i64),
        err: Option<&(dyn StdError + 'static)>,
    );
}

/// `QueryLogger` writing to the text logger
#[derive(Debug, Clone)]
pub struct QueryLogAdapter {
    logger: Logger,
    config: QueryLoggerConfig,
}

impl QueryLogAdapter {
    pub fn new(logger: Logger, config: QueryLoggerConfig) -> Self {
        Self { logger, config }
    }

    pub fn config(&self) -> &QueryLoggerConfig {
        &self.config
    }

    fn mode(&self) -> QueryLogLevel {
        self.config.log_level
    }

    fn is_slow(&self, elapsed: Duration) -> bool {
        !self.config.slow_threshold.is_zero() && elapsed > self.config.slow_threshold
    }

    fn reportable(&self, err: &(dyn StdError + 'static)) -> bool {
        !(self.config.ignore_record_not_found_error && is_record_not_found(err))
    }
}

impl QueryLogger for QueryLogAdapter {
    fn log_mode(&self, level: QueryLogLevel) -> Box<dyn QueryLogger> {
        let mut config = self.config.clone();
        config.log_level = level;
        Box::new(QueryLogAdapter::new(self.logger.clone(), config))
    }

    fn info(&self, args: fmt::Arguments<'_>) {
        if self.mode() >= QueryLogLevel::Info {
            self.logger.infof(args);
        }
    }

    fn warn(&self, args: fmt::Arguments<'_>) {
        if self.mode() >= QueryLogLevel::Warn {
            self.logger.warnf(args);
        }
    }

    fn error(&self, args: fmt::Arguments<'_>) {
        if self.mode() >= QueryLogLevel::Error {
            self.logger.errorf(args);
        }
    }

    fn trace(
        &self,
        begin: Instant,
        fc: &dyn Fn() -> (String, i64),
        err: Option<&(dyn StdError + 'static)>,
    ) {
        let mode = self.mode();
        if mode == QueryLogLevel::Silent {
            return;
        }
        let elapsed = begin.elapsed();

        match err {
            Some(err) if mode >= QueryLogLevel::Error && self.reportable(err) => {
                let (sql, rows) = fc();
                self.logger.errorw(
                    sql,
                    &[
                        Field::new("elapsed", elapsed),
                        Field::new("rows", rows),
                        Field::new("error", Value::error(err)),
                    ],
                );
            }
            _ if self.is_slow(elapsed) && mode >= QueryLogLevel::Warn => {
                let (sql, rows) = fc();
                self.logger.warnw(
                    sql,
                    &[
                        Field::new("elapsed", elapsed),
                        Field::new("rows", rows),
                        Field::new(
                            "warn",
                            format!("SLOW SQL >= {:?}", self.config.slow_threshold),
                        ),
                    ],
                );
            }
            _ if mode >= QueryLogLevel::Info => {
                let (sql, rows) = fc();
                self.logger
                    .debugw(sql, &[Field::new("elapsed", elapsed), Field::new("rows", rows)]);
            }
            _ => {}
        }
    }
}

impl Xlog {
    /// Query logger writing through the text pipeline
    pub fn query_logger(&self, config: QueryLoggerConfig) -> QueryLogAdapter {
        QueryLogAdapter::new(self.text().clone(), config)
    }
}
