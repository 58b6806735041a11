//! Record encoders
//!
//! Every encoder turns a `Record` into one complete, newline-terminated chunk
//! of bytes, so a destination can write it with a single call.

use std::fmt::Write as _;

use chrono::{DateTime, Local, Utc};
use crossterm::style::{Color, Stylize};

use super::record::{Field, Record};
use crate::config::Format;
use crate::level::Severity;

/// Timestamp layout used by every encoder
///
/// Milliseconds follow as `.` plus up to three digits, trailing zeros trimmed.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Key names written for the built-in record parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderKeys {
    pub message: String,
    pub level: String,
    pub time: String,
    pub name: String,
    pub caller: String,
    pub function: String,
    pub stacktrace: String,
}

impl Default for EncoderKeys {
    fn default() -> Self {
        Self {
            message: "msg".to_string(),
            level: "level".to_string(),
            time: "time".to_string(),
            name: "logger".to_string(),
            caller: "file".to_string(),
            function: "func".to_string(),
            stacktrace: "stack".to_string(),
        }
    }
}

/// Serializes records to bytes
pub trait Encoder: Send + Sync {
    fn encode(&self, record: &Record<'_>) -> Vec<u8>;
}

/// Pick the encoder for a format
///
/// `colored` only affects the text encoder's level rendering.
pub fn select_encoder(format: Format, keys: EncoderKeys, colored: bool) -> Box<dyn Encoder> {
    match format {
        Format::Json => Box::new(JsonEncoder::new(keys)),
        Format::Text => Box::new(ConsoleEncoder::new(keys, colored)),
        Format::Blank => Box::new(BlankEncoder),
    }
}

fn format_time(time: DateTime<Utc>) -> String {
    let local = time.with_timezone(&Local);
    let mut out = local.format(TIME_FORMAT).to_string();
    let millis = format!("{:03}", local.timestamp_subsec_millis());
    let millis = millis.trim_end_matches('0');
    if !millis.is_empty() {
        out.push('.');
        out.push_str(millis);
    }
    out
}

fn fields_json(fields: &[Field]) -> String {
    let map: serde_json::Map<String, serde_json::Value> = fields
        .iter()
        .map(|f| (f.key.clone(), f.value.to_json()))
        .collect();
    serde_json::Value::Object(map).to_string()
}

fn level_color(severity: Severity) -> Color {
    match severity {
        Severity::Debug => Color::Magenta,
        Severity::Info => Color::Blue,
        Severity::Warn => Color::Yellow,
        Severity::Error | Severity::DPanic | Severity::Panic | Severity::Fatal => Color::Red,
    }
}

/// Machine-parseable encoder, one JSON object per line
#[derive(Debug, Clone, Default)]
pub struct JsonEncoder {
    keys: EncoderKeys,
}

impl JsonEncoder {
    pub fn new(keys: EncoderKeys) -> Self {
        Self { keys }
    }
}

struct JsonObject {
    buf: String,
    empty: bool,
}

impl JsonObject {
    fn new() -> Self {
        Self {
            buf: String::from("{"),
            empty: true,
        }
    }

    fn entry(&mut self, key: &str, value: &serde_json::Value) {
        if !self.empty {
            self.buf.push(',');
        }
        self.empty = false;
        self.buf
            .push_str(&serde_json::Value::String(key.to_string()).to_string());
        self.buf.push(':');
        self.buf.push_str(&value.to_string());
    }

    fn str_entry(&mut self, key: &str, value: &str) {
        self.entry(key, &serde_json::Value::String(value.to_string()));
    }

    fn finish(mut self) -> Vec<u8> {
        self.buf.push_str("}\n");
        self.buf.into_bytes()
    }
}

impl Encoder for JsonEncoder {
    fn encode(&self, record: &Record<'_>) -> Vec<u8> {
        let keys = &self.keys;
        let mut obj = JsonObject::new();

        obj.str_entry(&keys.level, record.severity.capital());
        obj.str_entry(&keys.time, &format_time(record.time));
        if !record.logger.is_empty() {
            obj.str_entry(&keys.name, record.logger);
        }
        if let Some(caller) = &record.caller {
            obj.str_entry(&keys.caller, &caller.short());
            if let Some(function) = caller.function {
                obj.str_entry(&keys.function, function);
            }
        }
        obj.str_entry(&keys.message, record.message);
        for field in record.fields {
            obj.entry(&field.key, &field.value.to_json());
        }
        if let Some(stack) = &record.stack {
            obj.str_entry(&keys.stacktrace, stack);
        }

        obj.finish()
    }
}

/// Human-readable, tab separated encoder
#[derive(Debug, Clone, Default)]
pub struct ConsoleEncoder {
    keys: EncoderKeys,
    colored: bool,
}

impl ConsoleEncoder {
    pub fn new(keys: EncoderKeys, colored: bool) -> Self {
        Self { keys, colored }
    }

    fn level(&self, severity: Severity) -> String {
        if self.colored {
            severity.capital().with(level_color(severity)).to_string()
        } else {
            severity.capital().to_string()
        }
    }
}

impl Encoder for ConsoleEncoder {
    fn encode(&self, record: &Record<'_>) -> Vec<u8> {
        let mut line = String::new();

        if !self.keys.time.is_empty() {
            line.push_str(&format_time(record.time));
            line.push('\t');
        }
        if !self.keys.level.is_empty() {
            line.push_str(&self.level(record.severity));
            line.push('\t');
        }
        if !self.keys.name.is_empty() && !record.logger.is_empty() {
            line.push_str(record.logger);
            line.push('\t');
        }
        if let Some(caller) = &record.caller {
            if !self.keys.caller.is_empty() {
                line.push_str(&caller.short());
                line.push('\t');
            }
            if let (Some(function), false) = (caller.function, self.keys.function.is_empty()) {
                line.push_str(function);
                line.push('\t');
            }
        }
        line.push_str(record.message);
        if !record.fields.is_empty() {
            line.push('\t');
            line.push_str(&fields_json(record.fields));
        }
        line.push('\n');
        if let Some(stack) = &record.stack {
            let _ = writeln!(line, "{}", stack.trim_end());
        }

        line.into_bytes()
    }
}

/// Bare encoder: message and fields only
#[derive(Debug, Clone, Copy, Default)]
pub struct BlankEncoder;

impl Encoder for BlankEncoder {
    fn encode(&self, record: &Record<'_>) -> Vec<u8> {
        let mut line = record.message.to_string();
        if !record.fields.is_empty() {
            line.push(' ');
            line.push_str(&fields_json(record.fields));
        }
        line.push('\n');
        line.into_bytes()
    }
}
