//! `tracing` integration
//!
//! `XlogLayer` forwards events recorded with the `tracing` macros into a
//! `Logger`, so libraries instrumented with `tracing` share the rotated files.
//! Events emitted by this crate are skipped to keep rotation diagnostics from
//! feeding back into the files being rotated.

use std::fmt::{self, Write as _};

use tracing::field::{Field as TracingField, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

use crate::level::Severity;
use crate::logger::Logger;
use crate::logging::{Caller, Field, Value};
use crate::pipeline::Xlog;

const OWN_TARGET: &str = "xlog";

fn is_own_target(target: &str) -> bool {
    target == OWN_TARGET
        || target
            .strip_prefix(OWN_TARGET)
            .is_some_and(|rest| rest.starts_with("::"))
}

/// A `tracing_subscriber` layer writing events through a `Logger`
#[derive(Debug, Clone)]
pub struct XlogLayer {
    logger: Logger,
}

impl XlogLayer {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }
}

impl<S: Subscriber> Layer<S> for XlogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if is_own_target(metadata.target()) {
            return;
        }

        let severity = Severity::from(*metadata.level());
        if !self.logger.enabled(severity) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let caller = Caller::new(
            metadata.file().unwrap_or("<unknown>"),
            metadata.line().unwrap_or(0),
            metadata.module_path(),
        );
        let message = visitor.message.unwrap_or_default();
        let _ = self
            .logger
            .log_at(severity, caller, format_args!("{}", message), &visitor.fields);
    }
}

/// Collects the message and fields of one event
#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: Vec<Field>,
}

impl FieldVisitor {
    fn push(&mut self, field: &TracingField, value: Value) {
        self.fields.push(Field::new(field.name(), value));
    }
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &TracingField, value: &dyn fmt::Debug) {
        let mut buf = String::new();
        let _ = write!(&mut buf, "{:?}", value);

        if field.name() == "message" {
            self.message = Some(buf);
        } else {
            self.push(field, Value::Str(buf));
        }
    }

    fn record_str(&mut self, field: &TracingField, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.push(field, Value::from(value));
        }
    }

    fn record_i64(&mut self, field: &TracingField, value: i64) {
        self.push(field, Value::I64(value));
    }

    fn record_u64(&mut self, field: &TracingField, value: u64) {
        self.push(field, Value::U64(value));
    }

    fn record_bool(&mut self, field: &TracingField, value: bool) {
        self.push(field, Value::Bool(value));
    }

    fn record_f64(&mut self, field: &TracingField, value: f64) {
        self.push(field, Value::F64(value));
    }

    fn record_error(&mut self, field: &TracingField, value: &(dyn std::error::Error + 'static)) {
        self.push(field, Value::error(value));
    }
}

impl Xlog {
    /// Layer forwarding `tracing` events to the JSON pipeline
    pub fn tracing_layer(&self) -> XlogLayer {
        XlogLayer::new(self.json().clone())
    }
}
