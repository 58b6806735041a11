//! Dual-sink pipeline construction and the logging facade
//!
//! `Xlog` owns two loggers built from the same options:
//! - the JSON logger writes `<base>.<stamp>.json.log` and the console as JSON
//! - the text logger writes `<base>.<stamp>.log` with plain levels and the
//!   console with coloured levels
//!
//! When error files are enabled, records at `err_log_level` and above also land
//! in `<base>.<stamp>.error.json.log` and `<base>.<stamp>.error.log` under
//! `error_path`. Each `Xlog` is independent: building twice opens two sets of
//! destinations and shares nothing.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Options;
use crate::error::Result;
use crate::level::{LevelGate, Severity};
use crate::logger::{Core, Escalation, Logger, LoggerConfig};
use crate::logging::{
    select_encoder, Caller, Clock, ConsoleSink, Encoder, EncoderKeys, Field, JsonEncoder,
    Retention, RotatingWriter, RotationPolicy, Sink, SystemClock,
};

/// File suffix of the JSON family
pub const JSON_SUFFIX: &str = ".json.log";
/// File suffix of the text family
pub const TEXT_SUFFIX: &str = ".log";
/// File suffix of the JSON error family
pub const JSON_ERROR_SUFFIX: &str = ".error.json.log";
/// File suffix of the text error family
pub const TEXT_ERROR_SUFFIX: &str = ".error.log";

/// Builds an `Xlog`, optionally replacing the console and clock
pub struct XlogBuilder {
    options: Options,
    console: Arc<dyn Sink>,
    clock: Arc<dyn Clock>,
}

impl XlogBuilder {
    pub fn new(options: Options) -> Self {
        Self {
            options,
            console: Arc::new(ConsoleSink),
            clock: Arc::new(SystemClock),
        }
    }

    /// Destination used in place of stdout
    pub fn console(mut self, sink: impl Sink + 'static) -> Self {
        self.console = Arc::new(sink);
        self
    }

    /// Time source for record timestamps and rotation
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Open every destination and assemble both loggers
    pub fn build(self) -> Result<Xlog> {
        let XlogBuilder {
            options,
            console,
            clock,
        } = self;

        let keys = EncoderKeys::default();
        let json_encoder: Arc<dyn Encoder> = Arc::new(JsonEncoder::new(keys.clone()));
        let text_file_encoder: Arc<dyn Encoder> =
            Arc::from(select_encoder(options.format, keys.clone(), false));
        let text_console_encoder: Arc<dyn Encoder> =
            Arc::from(select_encoder(options.format, keys, true));

        let json_gate = Arc::new(LevelGate::new(options.level));
        let text_gate = Arc::new(LevelGate::new(options.level));

        let mut writers = Vec::new();
        let mut json_cores = Vec::new();
        let mut text_cores = Vec::new();

        if !options.no_file {
            let json_file = open_writer(&options, options.path.clone(), JSON_SUFFIX, &clock)?;
            let text_file = open_writer(&options, options.path.clone(), TEXT_SUFFIX, &clock)?;
            json_cores.push(Core::new(Arc::clone(&json_encoder), json_file.clone()));
            text_cores.push(Core::new(Arc::clone(&text_file_encoder), text_file.clone()));
            writers.extend([json_file, text_file]);

            if let Some((error_dir, error_level)) = options.error_files() {
                let error_gate = Arc::new(LevelGate::new(error_level));
                let json_errors =
                    open_writer(&options, error_dir.clone(), JSON_ERROR_SUFFIX, &clock)?;
                let text_errors = open_writer(&options, error_dir, TEXT_ERROR_SUFFIX, &clock)?;

                json_cores.push(
                    Core::new(Arc::clone(&json_encoder), json_errors.clone())
                        .with_gate(Arc::clone(&error_gate)),
                );
                text_cores.push(
                    Core::new(Arc::clone(&text_file_encoder), text_errors.clone())
                        .with_gate(error_gate),
                );
                writers.extend([json_errors, text_errors]);
            }
        }

        json_cores.push(Core::new(json_encoder, Arc::clone(&console)));
        text_cores.push(Core::new(text_console_encoder, console));

        let config = LoggerConfig {
            name: options.name.clone(),
            caller: options.writable_caller,
            stack: options.writable_stack,
            development: options.development,
        };
        let json = Logger::with_clock(config.clone(), json_gate, json_cores, Arc::clone(&clock));
        let text = Logger::with_clock(config, text_gate, text_cores, clock);

        tracing::debug!(
            name = %options.name,
            level = %options.level,
            format = options.format.as_str(),
            no_file = options.no_file,
            path = %options.path.display(),
            "Logging pipelines initialised"
        );

        Ok(Xlog {
            options: Arc::new(options),
            json,
            text,
            writers: Arc::new(writers),
        })
    }
}

fn open_writer(
    options: &Options,
    dir: PathBuf,
    suffix: &str,
    clock: &Arc<dyn Clock>,
) -> Result<Arc<RotatingWriter>> {
    let mut policy = RotationPolicy::new(dir, &options.file_name, suffix);
    policy.max_size = options.max_size;
    policy.retention = Retention {
        max_age: options.max_age_duration(),
        max_backups: options.max_backups,
    };
    policy.compress = options.compress;

    Ok(Arc::new(RotatingWriter::with_clock(policy, Arc::clone(clock))?))
}

/// Build a logging context, aborting startup when a destination cannot be opened
pub fn init(options: Options) -> Xlog {
    match Xlog::new(options) {
        Ok(xlog) => xlog,
        Err(e) => panic!("xlog: failed to initialise logging: {e}"),
    }
}

/// A logging context: the JSON and text loggers built from one `Options`
#[derive(Clone)]
pub struct Xlog {
    options: Arc<Options>,
    json: Logger,
    text: Logger,
    writers: Arc<Vec<Arc<RotatingWriter>>>,
}

impl fmt::Debug for Xlog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Xlog")
            .field("json", &self.json)
            .field("text", &self.text)
            .field("files", &self.log_files())
            .finish()
    }
}

impl Xlog {
    /// Build a context writing to stdout and the configured directories
    pub fn new(options: Options) -> Result<Self> {
        XlogBuilder::new(options).build()
    }

    pub fn builder(options: Options) -> XlogBuilder {
        XlogBuilder::new(options)
    }

    /// The JSON logger
    pub fn json(&self) -> &Logger {
        &self.json
    }

    /// The text logger
    pub fn text(&self) -> &Logger {
        &self.text
    }

    /// Files currently written to: JSON, text, then the error files if enabled
    pub fn log_files(&self) -> Vec<PathBuf> {
        self.writers
            .iter()
            .filter_map(|w| w.current_path())
            .collect()
    }

    /// Change the minimum severity of both pipelines
    pub fn set_level(&self, level: Severity) {
        self.json.set_level(level);
        self.text.set_level(level);
    }

    pub fn level(&self) -> Severity {
        self.json.level()
    }

    /// Context for a named component
    ///
    /// Loggers are named `<name>.<component>`; a `package_level` entry for the
    /// component gives them their own threshold.
    pub fn component(&self, component: &str) -> Xlog {
        let level = self.options.component_level(component);
        Xlog {
            options: Arc::clone(&self.options),
            json: self.json.named(component, level),
            text: self.text.named(component, level),
            writers: Arc::clone(&self.writers),
        }
    }

    /// Flush every destination of both pipelines
    pub fn sync(&self) {
        self.json.sync();
        self.text.sync();
    }

    /// Macro entry point; forwards to the JSON logger
    pub fn log_at(
        &self,
        severity: Severity,
        caller: Caller,
        args: fmt::Arguments<'_>,
        fields: &[Field],
    ) -> Option<Escalation> {
        self.json.log_at(severity, caller, args, fields)
    }
}

macro_rules! facade {
    ($($json:ident, $jsonf:ident, $text:ident, $textf:ident => $ret:ty;)*) => {
        impl Xlog {
            $(
                #[track_caller]
                pub fn $json(&self, msg: impl fmt::Display) -> $ret {
                    self.json.$json(msg)
                }

                #[track_caller]
                pub fn $jsonf(&self, args: fmt::Arguments<'_>) -> $ret {
                    self.json.$jsonf(args)
                }

                #[track_caller]
                pub fn $text(&self, msg: impl fmt::Display) -> $ret {
                    self.text.$json(msg)
                }

                #[track_caller]
                pub fn $textf(&self, args: fmt::Arguments<'_>) -> $ret {
                    self.text.$jsonf(args)
                }
            )*
        }
    };
}

facade! {
    debug, debugf, cdebug, cdebugf => ();
    info, infof, cinfo, cinfof => ();
    warn, warnf, cwarn, cwarnf => ();
    error, errorf, cerror, cerrorf => ();
    dpanic, dpanicf, cdpanic, cdpanicf => Option<Escalation>;
    panic, panicf, cpanic, cpanicf => Escalation;
    fatal, fatalf, cfatal, cfatalf => Escalation;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Format;
    use crate::logging::{BufferSink, ManualClock};
    use chrono::{TimeZone, Utc};
    use std::fs;
    use tempfile::TempDir;

    fn options(dir: &std::path::Path) -> Options {
        Options {
            path: dir.to_path_buf(),
            ..Options::default()
        }
    }

    fn build(opts: Options) -> (Xlog, BufferSink) {
        let console = BufferSink::default();
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap());
        let xlog = Xlog::builder(opts)
            .console(console.clone())
            .clock(clock)
            .build()
            .unwrap();
        (xlog, console)
    }

    fn read(dir: &std::path::Path, name: &str) -> String {
        fs::read_to_string(dir.join(name)).unwrap_or_default()
    }

    #[test]
    fn test_builds_both_file_families() {
        let temp = TempDir::new().unwrap();
        let (xlog, _) = build(options(temp.path()));

        let files = xlog.log_files();
        assert_eq!(
            files,
            vec![
                temp.path().join("xlog.2024030100.json.log"),
                temp.path().join("xlog.2024030100.log"),
            ]
        );
        assert!(!temp.path().join("xlog.2024030100.error.json.log").exists());
        assert!(!temp.path().join("xlog.2024030100.error.log").exists());
    }

    #[test]
    fn test_error_level_enables_error_families() {
        let temp = TempDir::new().unwrap();
        let (xlog, _) = build(Options {
            err_log_level: Some(Severity::Warn),
            ..options(temp.path())
        });

        assert_eq!(xlog.log_files().len(), 4);
        xlog.warn("slow disk");
        assert!(read(temp.path(), "xlog.2024030100.error.json.log").contains("slow disk"));
    }

    #[test]
    fn test_error_records_not_duplicated_by_default() {
        let temp = TempDir::new().unwrap();
        let (xlog, console) = build(options(temp.path()));

        xlog.error("broken");

        assert_eq!(read(temp.path(), "xlog.2024030100.json.log").lines().count(), 1);
        assert_eq!(console.len(), 1);
        assert!(!temp.path().join("xlog.2024030100.error.json.log").exists());
    }

    #[test]
    fn test_json_facade_writes_file_and_console() {
        let temp = TempDir::new().unwrap();
        let (xlog, console) = build(options(temp.path()));

        xlog.infof(format_args!("started in {}ms", 12));
        xlog.sync();

        let file = read(temp.path(), "xlog.2024030100.json.log");
        let record: serde_json::Value = serde_json::from_str(file.trim_end()).unwrap();
        assert_eq!(record["msg"], "started in 12ms");
        assert_eq!(record["level"], "INFO");
        assert_eq!(record["logger"], "xlog");
        assert!(record["file"].as_str().unwrap().contains("pipeline.rs"));
        assert!(record["time"].is_string());

        assert_eq!(console.len(), 1);
        assert!(console.contents().starts_with('{'));
        assert!(read(temp.path(), "xlog.2024030100.log").is_empty());
    }

    #[test]
    fn test_facade_records_calling_function() {
        let (xlog, console) = build(Options {
            no_file: true,
            ..Options::default()
        });

        xlog.info("hello");
        xlog.cinfo("hello");

        let record: serde_json::Value = serde_json::from_str(&console.lines()[0]).unwrap();
        assert_eq!(
            record["func"],
            "xlog::pipeline::tests::test_facade_records_calling_function"
        );
        assert!(console.lines()[1]
            .contains("\txlog::pipeline::tests::test_facade_records_calling_function"));
    }

    #[test]
    fn test_text_facade_colors_console_only() {
        let temp = TempDir::new().unwrap();
        let (xlog, console) = build(options(temp.path()));

        xlog.cwarn("cache miss");

        let file = read(temp.path(), "xlog.2024030100.log");
        assert!(file.contains("\tWARN\t"));
        assert!(file.contains("cache miss"));
        assert!(!file.contains('\x1b'));
        assert!(console.contents().contains('\x1b'));
        assert!(read(temp.path(), "xlog.2024030100.json.log").is_empty());
    }

    #[test]
    fn test_gate_applies_to_file_and_console() {
        for threshold in [Severity::Debug, Severity::Info, Severity::Warn, Severity::Error] {
            let temp = TempDir::new().unwrap();
            let (xlog, console) = build(Options {
                level: threshold,
                ..options(temp.path())
            });

            xlog.debug("d");
            xlog.info("i");
            xlog.warn("w");
            xlog.error("e");

            let expected = [Severity::Debug, Severity::Info, Severity::Warn, Severity::Error]
                .iter()
                .filter(|s| **s >= threshold)
                .count();
            let file = read(temp.path(), "xlog.2024030100.json.log");
            assert_eq!(file.lines().count(), expected);
            assert_eq!(console.len(), expected);
        }
    }

    #[test]
    fn test_error_files_receive_errors_only() {
        let temp = TempDir::new().unwrap();
        let (xlog, _) = build(Options {
            error_path: Some(temp.path().to_path_buf()),
            ..options(temp.path())
        });

        xlog.info("fine");
        xlog.error("broken");
        xlog.cerror("also broken");

        let json_errors = read(temp.path(), "xlog.2024030100.error.json.log");
        assert_eq!(json_errors.lines().count(), 1);
        assert!(json_errors.contains("broken"));
        let text_errors = read(temp.path(), "xlog.2024030100.error.log");
        assert_eq!(text_errors.lines().count(), 1);
        assert!(text_errors.contains("also broken"));
    }

    #[test]
    fn test_separate_error_directory() {
        let temp = TempDir::new().unwrap();
        let errors = temp.path().join("errors");
        let (xlog, _) = build(Options {
            error_path: Some(errors.clone()),
            ..options(temp.path())
        });

        xlog.error("disk failure");

        assert!(read(&errors, "xlog.2024030100.error.json.log").contains("disk failure"));
        assert!(!temp.path().join("xlog.2024030100.error.json.log").exists());
    }

    #[test]
    fn test_no_file_writes_console_only() {
        let temp = TempDir::new().unwrap();
        let (xlog, console) = build(Options {
            no_file: true,
            ..options(temp.path())
        });

        xlog.info("console only");
        xlog.cinfo("console only");

        assert!(xlog.log_files().is_empty());
        assert_eq!(console.len(), 2);
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_blank_format_text_pipeline() {
        let temp = TempDir::new().unwrap();
        let (xlog, console) = build(Options {
            format: Format::Blank,
            ..options(temp.path())
        });

        xlog.cinfo("just the message");

        assert_eq!(read(temp.path(), "xlog.2024030100.log"), "just the message\n");
        assert_eq!(console.contents(), "just the message\n");
    }

    #[test]
    fn test_component_levels() {
        let temp = TempDir::new().unwrap();
        let mut opts = options(temp.path());
        opts.level = Severity::Warn;
        opts.package_level.insert("db".to_string(), Severity::Debug);
        let (xlog, console) = build(opts);

        let db = xlog.component("db");
        let http = xlog.component("http");
        db.debug("db detail");
        http.info("http detail");

        assert_eq!(console.len(), 1);
        let record: serde_json::Value = serde_json::from_str(console.lines()[0].as_str()).unwrap();
        assert_eq!(record["logger"], "xlog.db");
    }

    #[test]
    fn test_set_level_applies_to_both_pipelines() {
        let temp = TempDir::new().unwrap();
        let (xlog, console) = build(options(temp.path()));

        xlog.debug("hidden");
        xlog.set_level(Severity::Debug);
        xlog.debug("shown");
        xlog.cdebug("shown too");

        assert_eq!(xlog.level(), Severity::Debug);
        assert_eq!(console.len(), 2);
    }

    #[test]
    fn test_independent_contexts() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        let (a, _) = build(options(first.path()));
        let (b, _) = build(options(second.path()));

        a.info("to a");
        b.set_level(Severity::Error);
        a.info("still to a");

        assert_eq!(read(first.path(), "xlog.2024030100.json.log").lines().count(), 2);
        assert!(read(second.path(), "xlog.2024030100.json.log").is_empty());
    }

    #[test]
    fn test_fatal_flushes_before_returning() {
        let temp = TempDir::new().unwrap();
        let (xlog, _) = build(options(temp.path()));

        let escalation = xlog.fatal("out of memory");

        assert!(escalation.is_fatal());
        let file = read(temp.path(), "xlog.2024030100.json.log");
        assert!(file.contains("\"level\":\"FATAL\""));
        assert!(file.contains("out of memory"));
    }

    #[test]
    fn test_uncreatable_directory_fails_build() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("blocker");
        fs::write(&blocker, b"file").unwrap();

        let result = Xlog::builder(options(&blocker.join("logs")))
            .console(BufferSink::default())
            .build();
        assert!(result.is_err());
    }

    #[test]
    #[should_panic(expected = "failed to initialise logging")]
    fn test_init_aborts_on_failure() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("blocker");
        fs::write(&blocker, b"file").unwrap();

        let _ = init(options(&blocker.join("logs")));
    }

    #[test]
    fn test_concurrent_logging_produces_whole_lines() {
        let temp = TempDir::new().unwrap();
        let (xlog, console) = build(options(temp.path()));
        let threads = 8;
        let per_thread = 250;

        let handles: Vec<_> = (0..threads)
            .map(|t| {
                let xlog = xlog.clone();
                std::thread::spawn(move || {
                    for i in 0..per_thread {
                        xlog.infof(format_args!("thread {} message {}", t, i));
                        xlog.cinfof(format_args!("thread {} message {}", t, i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let json = read(temp.path(), "xlog.2024030100.json.log");
        assert_eq!(json.lines().count(), threads * per_thread);
        for line in json.lines() {
            let record: serde_json::Value = serde_json::from_str(line).unwrap();
            assert!(record["msg"].as_str().unwrap().starts_with("thread "));
        }

        let text = read(temp.path(), "xlog.2024030100.log");
        assert_eq!(text.lines().count(), threads * per_thread);
        assert!(text.lines().all(|l| l.contains("\tINFO\t") && l.contains("message ")));

        assert_eq!(console.len(), 2 * threads * per_thread);
    }
}
