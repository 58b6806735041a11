//! Log records and structured fields
//!
//! A `Record` only lives for the duration of one emit call: it is built,
//! handed to every enabled encoder, and dropped.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::level::Severity;

/// A structured field value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    I64(i64),
    U64(u64),
    F64(f64),
    Bool(bool),
    /// Rendered as fractional seconds
    Duration(Duration),
    /// Rendered with the error's `Display`
    Error(String),
}

impl Value {
    /// JSON representation used by every encoder
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Str(s) | Value::Error(s) => serde_json::Value::String(s.clone()),
            Value::I64(n) => serde_json::Value::Number((*n).into()),
            Value::U64(n) => serde_json::Value::Number((*n).into()),
            Value::F64(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or_else(|| serde_json::Value::String(n.to_string())),
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Duration(d) => serde_json::Number::from_f64(d.as_secs_f64())
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
        }
    }

    /// Wrap an error, keeping only its message
    pub fn error(err: &dyn std::error::Error) -> Self {
        Value::Error(err.to_string())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::F64(n)
    }
}

impl From<Duration> for Value {
    fn from(d: Duration) -> Self {
        Value::Duration(d)
    }
}

macro_rules! impl_from_signed {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(n: $t) -> Self {
                Value::I64(n as i64)
            }
        })*
    };
}

macro_rules! impl_from_unsigned {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(n: $t) -> Self {
                Value::U64(n as u64)
            }
        })*
    };
}

impl_from_signed!(i8, i16, i32, i64, isize);
impl_from_unsigned!(u8, u16, u32, u64, usize);

/// A key/value pair attached to a record
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub key: String,
    pub value: Value,
}

impl Field {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Call-site location of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub file: &'static str,
    pub line: u32,
    /// Enclosing function or module, when the call site supplied one
    pub function: Option<&'static str>,
}

impl Caller {
    pub const fn new(file: &'static str, line: u32, function: Option<&'static str>) -> Self {
        Self {
            file,
            line,
            function,
        }
    }

    /// Location of the nearest caller not marked `#[track_caller]`
    #[track_caller]
    pub fn here() -> Self {
        let location = std::panic::Location::caller();
        Self::new(location.file(), location.line(), None)
    }

    /// Like `here`, also naming the function the call sits in
    #[track_caller]
    pub fn here_with_function() -> Self {
        let location = std::panic::Location::caller();
        Self::new(
            location.file(),
            location.line(),
            super::callsite::enclosing_function(location),
        )
    }

    /// `dir/file.rs:line`, keeping only the last directory component
    pub fn short(&self) -> String {
        let path = self.file.replace('\\', "/");
        let trimmed = match path.rfind('/') {
            Some(last) => match path[..last].rfind('/') {
                Some(prev) => &path[prev + 1..],
                None => &path[..],
            },
            None => &path[..],
        };
        format!("{}:{}", trimmed, self.line)
    }
}

impl fmt::Display for Caller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short())
    }
}

/// A single log record
#[derive(Debug, Clone)]
pub struct Record<'a> {
    pub severity: Severity,
    pub time: DateTime<Utc>,
    pub logger: &'a str,
    pub message: &'a str,
    pub fields: &'a [Field],
    pub caller: Option<Caller>,
    pub stack: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_conversions() {
        assert_eq!(Value::from(3i32), Value::I64(3));
        assert_eq!(Value::from(3usize), Value::U64(3));
        assert_eq!(Value::from("x"), Value::Str("x".into()));
        assert_eq!(Value::from(true), Value::Bool(true));
    }

    #[test]
    fn test_duration_renders_as_seconds() {
        let value = Value::from(Duration::from_millis(1500));
        assert_eq!(value.to_json(), serde_json::json!(1.5));
    }

    #[test]
    fn test_non_finite_float_renders_as_string() {
        let value = Value::from(f64::NAN);
        assert_eq!(value.to_json(), serde_json::json!("NaN"));
    }

    #[test]
    fn test_caller_short_form() {
        let caller = Caller::new("/home/dev/app/src/db/pool.rs", 42, None);
        assert_eq!(caller.short(), "db/pool.rs:42");

        let caller = Caller::new("main.rs", 7, None);
        assert_eq!(caller.short(), "main.rs:7");
    }

    #[test]
    fn test_caller_here_points_at_this_file() {
        let caller = Caller::here();
        assert!(caller.file.ends_with("record.rs"));
        assert_eq!(caller.function, None);
    }

    #[test]
    fn test_caller_names_enclosing_function() {
        let caller = Caller::here_with_function();
        assert!(caller.file.ends_with("record.rs"));
        assert_eq!(
            caller.function,
            Some("xlog::logging::record::tests::test_caller_names_enclosing_function")
        );
    }
}
