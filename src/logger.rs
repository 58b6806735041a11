//! Leveled logger over a tee of cores
//!
//! A `Core` pairs an encoder with a destination. A `Logger` fans each record
//! out to every core whose gate admits it. Panic and fatal records do not
//! unwind or exit on their own: they hand back an `Escalation` that the caller
//! raises explicitly.

use std::backtrace::Backtrace;
use std::fmt;
use std::sync::Arc;

use crate::level::{LevelGate, Severity};
use crate::logging::{Caller, Clock, Encoder, Field, Record, Sink, SystemClock};

/// Exit status used when a fatal escalation is raised
pub const FATAL_EXIT_CODE: i32 = 1;

/// An encoder writing to one destination
#[derive(Clone)]
pub struct Core {
    encoder: Arc<dyn Encoder>,
    sink: Arc<dyn Sink>,
    /// Own threshold; `None` follows the logger's gate
    gate: Option<Arc<LevelGate>>,
}

impl Core {
    pub fn new(encoder: Arc<dyn Encoder>, sink: Arc<dyn Sink>) -> Self {
        Self {
            encoder,
            sink,
            gate: None,
        }
    }

    /// Gate this core independently of its logger
    pub fn with_gate(mut self, gate: Arc<LevelGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    fn enabled(&self, logger_gate: &LevelGate, severity: Severity) -> bool {
        match &self.gate {
            Some(own) => own.enabled(severity),
            None => logger_gate.enabled(severity),
        }
    }
}

/// Record annotations applied by a logger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggerConfig {
    pub name: String,
    /// Annotate records with their call site
    pub caller: bool,
    /// Capture a stack trace for error and above
    pub stack: bool,
    /// DPanic escalates like Panic
    pub development: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            name: crate::config::DEFAULT_LOGGER_NAME.to_string(),
            caller: true,
            stack: false,
            development: false,
        }
    }
}

/// Control-flow interruption requested by a panic or fatal record
///
/// The record has already been written and flushed when this is returned.
#[must_use = "an escalation does nothing until `raise` is called"]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Escalation {
    severity: Severity,
    message: String,
}

impl Escalation {
    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }

    /// Exit the process for fatal records, panic otherwise
    pub fn raise(self) -> ! {
        if self.is_fatal() {
            std::process::exit(FATAL_EXIT_CODE);
        }
        panic!("{}", self.message)
    }
}

struct Inner {
    config: LoggerConfig,
    gate: Arc<LevelGate>,
    cores: Vec<Core>,
    clock: Arc<dyn Clock>,
}

/// A leveled logger; clones share cores and gate
#[derive(Clone)]
pub struct Logger {
    inner: Arc<Inner>,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.inner.config.name)
            .field("level", &self.level())
            .field("cores", &self.inner.cores.len())
            .finish()
    }
}

impl Logger {
    pub fn new(config: LoggerConfig, gate: Arc<LevelGate>, cores: Vec<Core>) -> Self {
        Self::with_clock(config, gate, cores, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: LoggerConfig,
        gate: Arc<LevelGate>,
        cores: Vec<Core>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                gate,
                cores,
                clock,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    /// Threshold of the logger's shared gate
    pub fn level(&self) -> Severity {
        self.inner.gate.level()
    }

    /// Change the threshold for every core following this logger's gate
    pub fn set_level(&self, level: Severity) {
        self.inner.gate.set_level(level);
    }

    pub fn gate(&self) -> &Arc<LevelGate> {
        &self.inner.gate
    }

    /// Whether any core would write a record of `severity`
    pub fn enabled(&self, severity: Severity) -> bool {
        self.inner
            .cores
            .iter()
            .any(|core| core.enabled(&self.inner.gate, severity))
    }

    /// Child logger named `<name>.<component>`
    ///
    /// With `level` the child gets its own gate; otherwise it shares this
    /// logger's gate. Cores with their own gate keep it either way.
    pub fn named(&self, component: &str, level: Option<Severity>) -> Logger {
        let mut config = self.inner.config.clone();
        config.name = if config.name.is_empty() {
            component.to_string()
        } else {
            format!("{}.{}", config.name, component)
        };
        let gate = match level {
            Some(level) => Arc::new(LevelGate::new(level)),
            None => Arc::clone(&self.inner.gate),
        };
        Logger::with_clock(
            config,
            gate,
            self.inner.cores.clone(),
            Arc::clone(&self.inner.clock),
        )
    }

    /// Flush every destination
    pub fn sync(&self) {
        for core in &self.inner.cores {
            if let Err(e) = core.sink.sync() {
                tracing::warn!(logger = %self.name(), error = %e, "Failed to sync log destination");
            }
        }
    }

    fn escalates(&self, severity: Severity) -> bool {
        match severity {
            Severity::Panic | Severity::Fatal => true,
            Severity::DPanic => self.inner.config.development,
            _ => false,
        }
    }

    fn write(&self, severity: Severity, caller: Caller, message: &str, fields: &[Field]) {
        let inner = &self.inner;
        let stack = (inner.config.stack && severity >= Severity::Error)
            .then(|| Backtrace::force_capture().to_string());
        let record = Record {
            severity,
            time: inner.clock.now(),
            logger: &inner.config.name,
            message,
            fields,
            caller: inner.config.caller.then_some(caller),
            stack,
        };

        for core in &inner.cores {
            if !core.enabled(&inner.gate, severity) {
                continue;
            }
            let bytes = core.encoder.encode(&record);
            if let Err(e) = core.sink.write_record(&bytes) {
                tracing::warn!(logger = %inner.config.name, error = %e, "Failed to write log record");
            }
        }
    }

    /// Emit a record with an explicit call site
    ///
    /// Entry point for the logging macros. Returns an escalation for panic and
    /// fatal records, and for dpanic in development mode.
    pub fn log_at(
        &self,
        severity: Severity,
        caller: Caller,
        args: fmt::Arguments<'_>,
        fields: &[Field],
    ) -> Option<Escalation> {
        let escalates = self.escalates(severity);
        let enabled = self.enabled(severity);
        if !enabled && !escalates {
            return None;
        }

        let message = fmt::format(args);
        if enabled {
            self.write(severity, caller, &message, fields);
        }
        if escalates {
            self.sync();
            return Some(Escalation { severity, message });
        }
        None
    }

    /// Call site of the nearest untracked caller, with its function when
    /// records carry caller information
    #[track_caller]
    fn call_site(&self) -> Caller {
        if self.inner.config.caller {
            Caller::here_with_function()
        } else {
            Caller::here()
        }
    }

    /// Emit a record from the caller's location
    #[track_caller]
    pub fn log(
        &self,
        severity: Severity,
        args: fmt::Arguments<'_>,
        fields: &[Field],
    ) -> Option<Escalation> {
        if !self.enabled(severity) && !self.escalates(severity) {
            return None;
        }
        self.log_at(severity, self.call_site(), args, fields)
    }

    #[track_caller]
    fn escalate(&self, severity: Severity, args: fmt::Arguments<'_>) -> Escalation {
        let message = fmt::format(args);
        if self.enabled(severity) {
            self.write(severity, self.call_site(), &message, &[]);
        }
        self.sync();
        Escalation { severity, message }
    }

    #[track_caller]
    pub fn debug(&self, msg: impl fmt::Display) {
        let _ = self.log(Severity::Debug, format_args!("{}", msg), &[]);
    }

    #[track_caller]
    pub fn debugf(&self, args: fmt::Arguments<'_>) {
        let _ = self.log(Severity::Debug, args, &[]);
    }

    #[track_caller]
    pub fn debugw(&self, msg: impl fmt::Display, fields: &[Field]) {
        let _ = self.log(Severity::Debug, format_args!("{}", msg), fields);
    }

    #[track_caller]
    pub fn info(&self, msg: impl fmt::Display) {
        let _ = self.log(Severity::Info, format_args!("{}", msg), &[]);
    }

    #[track_caller]
    pub fn infof(&self, args: fmt::Arguments<'_>) {
        let _ = self.log(Severity::Info, args, &[]);
    }

    #[track_caller]
    pub fn infow(&self, msg: impl fmt::Display, fields: &[Field]) {
        let _ = self.log(Severity::Info, format_args!("{}", msg), fields);
    }

    #[track_caller]
    pub fn warn(&self, msg: impl fmt::Display) {
        let _ = self.log(Severity::Warn, format_args!("{}", msg), &[]);
    }

    #[track_caller]
    pub fn warnf(&self, args: fmt::Arguments<'_>) {
        let _ = self.log(Severity::Warn, args, &[]);
    }

    #[track_caller]
    pub fn warnw(&self, msg: impl fmt::Display, fields: &[Field]) {
        let _ = self.log(Severity::Warn, format_args!("{}", msg), fields);
    }

    #[track_caller]
    pub fn error(&self, msg: impl fmt::Display) {
        let _ = self.log(Severity::Error, format_args!("{}", msg), &[]);
    }

    #[track_caller]
    pub fn errorf(&self, args: fmt::Arguments<'_>) {
        let _ = self.log(Severity::Error, args, &[]);
    }

    #[track_caller]
    pub fn errorw(&self, msg: impl fmt::Display, fields: &[Field]) {
        let _ = self.log(Severity::Error, format_args!("{}", msg), fields);
    }

    /// Recoverable panic: escalates only in development mode
    #[track_caller]
    pub fn dpanic(&self, msg: impl fmt::Display) -> Option<Escalation> {
        self.log(Severity::DPanic, format_args!("{}", msg), &[])
    }

    #[track_caller]
    pub fn dpanicf(&self, args: fmt::Arguments<'_>) -> Option<Escalation> {
        self.log(Severity::DPanic, args, &[])
    }

    #[track_caller]
    pub fn panic(&self, msg: impl fmt::Display) -> Escalation {
        self.escalate(Severity::Panic, format_args!("{}", msg))
    }

    #[track_caller]
    pub fn panicf(&self, args: fmt::Arguments<'_>) -> Escalation {
        self.escalate(Severity::Panic, args)
    }

    #[track_caller]
    pub fn fatal(&self, msg: impl fmt::Display) -> Escalation {
        self.escalate(Severity::Fatal, format_args!("{}", msg))
    }

    #[track_caller]
    pub fn fatalf(&self, args: fmt::Arguments<'_>) -> Escalation {
        self.escalate(Severity::Fatal, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{BufferSink, ConsoleEncoder, EncoderKeys, JsonEncoder};

    fn logger_with(level: Severity, config: LoggerConfig) -> (Logger, BufferSink) {
        let buffer = BufferSink::default();
        let core = Core::new(Arc::new(JsonEncoder::default()), Arc::new(buffer.clone()));
        let logger = Logger::new(config, Arc::new(LevelGate::new(level)), vec![core]);
        (logger, buffer)
    }

    fn json_lines(buffer: &BufferSink) -> Vec<serde_json::Value> {
        buffer
            .lines()
            .iter()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_records_below_threshold_are_dropped() {
        let (logger, buffer) = logger_with(Severity::Warn, LoggerConfig::default());

        logger.debug("debug");
        logger.info("info");
        logger.warn("warn");
        logger.error("error");

        let lines = json_lines(&buffer);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["msg"], "warn");
        assert_eq!(lines[1]["msg"], "error");
    }

    #[test]
    fn test_tee_writes_every_core() {
        let file = BufferSink::default();
        let console = BufferSink::default();
        let cores = vec![
            Core::new(
                Arc::new(ConsoleEncoder::new(EncoderKeys::default(), false)),
                Arc::new(file.clone()),
            ),
            Core::new(
                Arc::new(ConsoleEncoder::new(EncoderKeys::default(), true)),
                Arc::new(console.clone()),
            ),
        ];
        let logger = Logger::new(
            LoggerConfig::default(),
            Arc::new(LevelGate::new(Severity::Info)),
            cores,
        );

        logger.infof(format_args!("user {} logged in", 42));

        assert_eq!(file.len(), 1);
        assert_eq!(console.len(), 1);
        assert!(!file.contents().contains('\x1b'));
        assert!(console.contents().contains('\x1b'));
        assert!(file.contents().contains("user 42 logged in"));
    }

    #[test]
    fn test_core_with_own_gate() {
        let main = BufferSink::default();
        let errors = BufferSink::default();
        let cores = vec![
            Core::new(Arc::new(JsonEncoder::default()), Arc::new(main.clone())),
            Core::new(Arc::new(JsonEncoder::default()), Arc::new(errors.clone()))
                .with_gate(Arc::new(LevelGate::new(Severity::Error))),
        ];
        let logger = Logger::new(
            LoggerConfig::default(),
            Arc::new(LevelGate::new(Severity::Debug)),
            cores,
        );

        logger.info("routine");
        logger.error("broken");

        assert_eq!(main.len(), 2);
        assert_eq!(errors.len(), 1);
        assert!(errors.contents().contains("broken"));
    }

    #[test]
    fn test_caller_annotation() {
        let (logger, buffer) = logger_with(Severity::Info, LoggerConfig::default());
        logger.info("here");

        let line = &json_lines(&buffer)[0];
        assert!(line["file"].as_str().unwrap().starts_with("src/logger.rs:"));
        assert_eq!(line["func"], "xlog::logger::tests::test_caller_annotation");
    }

    #[test]
    fn test_caller_annotation_disabled() {
        let config = LoggerConfig {
            caller: false,
            ..LoggerConfig::default()
        };
        let (logger, buffer) = logger_with(Severity::Info, config);
        logger.info("here");

        assert!(json_lines(&buffer)[0].get("file").is_none());
        assert!(json_lines(&buffer)[0].get("func").is_none());
    }

    #[test]
    fn test_stack_only_for_errors() {
        let config = LoggerConfig {
            stack: true,
            ..LoggerConfig::default()
        };
        let (logger, buffer) = logger_with(Severity::Info, config);
        logger.warn("no stack");
        logger.error("with stack");

        let lines = json_lines(&buffer);
        assert!(lines[0].get("stack").is_none());
        assert!(lines[1]["stack"].is_string());
    }

    #[test]
    fn test_structured_fields() {
        let (logger, buffer) = logger_with(Severity::Info, LoggerConfig::default());
        logger.infow("query", &[Field::new("rows", 3i64), Field::new("table", "users")]);

        let line = &json_lines(&buffer)[0];
        assert_eq!(line["rows"], 3);
        assert_eq!(line["table"], "users");
    }

    #[test]
    fn test_fatal_returns_escalation_after_write() {
        let (logger, buffer) = logger_with(Severity::Info, LoggerConfig::default());

        let escalation = logger.fatalf(format_args!("cannot bind port {}", 8080));

        assert!(escalation.is_fatal());
        assert_eq!(escalation.message(), "cannot bind port 8080");
        assert_eq!(json_lines(&buffer)[0]["level"], "FATAL");
    }

    #[test]
    fn test_panic_escalation_raises() {
        let (logger, buffer) = logger_with(Severity::Info, LoggerConfig::default());
        let escalation = logger.panic("invariant broken");
        assert_eq!(buffer.len(), 1);

        let result = std::panic::catch_unwind(move || escalation.raise());
        let payload = result.unwrap_err();
        assert_eq!(payload.downcast_ref::<String>().unwrap(), "invariant broken");
    }

    #[test]
    fn test_panic_escalates_even_when_gated_out() {
        let (logger, buffer) = logger_with(Severity::Fatal, LoggerConfig::default());
        let escalation = logger.panic("quiet");
        assert_eq!(escalation.severity(), Severity::Panic);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_dpanic_escalates_only_in_development() {
        let (logger, buffer) = logger_with(Severity::Info, LoggerConfig::default());
        assert!(logger.dpanic("prod").is_none());
        assert_eq!(buffer.len(), 1);

        let config = LoggerConfig {
            development: true,
            ..LoggerConfig::default()
        };
        let (logger, _) = logger_with(Severity::Info, config);
        assert!(logger.dpanic("dev").is_some());
    }

    #[test]
    fn test_named_child_with_override() {
        let (logger, buffer) = logger_with(Severity::Warn, LoggerConfig::default());
        let db = logger.named("db", Some(Severity::Debug));
        let http = logger.named("http", None);

        db.debug("db debug");
        http.info("http info");
        http.warn("http warn");

        let lines = json_lines(&buffer);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["logger"], "xlog.db");
        assert_eq!(lines[1]["logger"], "xlog.http");

        logger.set_level(Severity::Info);
        http.info("now visible");
        assert_eq!(buffer.len(), 3);
    }
}
