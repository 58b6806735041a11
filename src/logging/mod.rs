//! Logging building blocks
//!
//! Records, encoders, destinations (console, in-memory, rotating files) and
//! the retention rules applied to rotated files.

mod buffer;
mod callsite;
mod clock;
mod encoder;
mod file_writer;
mod record;
mod retention;
mod sink;

pub use buffer::{BufferSink, DEFAULT_BUFFER_RECORDS};
#[doc(hidden)]
pub use callsite::trim_function;
pub use clock::{Clock, ManualClock, SystemClock};
pub use encoder::{
    select_encoder, BlankEncoder, ConsoleEncoder, Encoder, EncoderKeys, JsonEncoder, TIME_FORMAT,
};
pub use file_writer::{RotatingWriter, RotationPolicy, DEFAULT_ROTATION_TIME};
pub use record::{Caller, Field, Record, Value};
pub use retention::{compress_file, prune, FamilyMember, FamilyPattern, Retention};
pub use sink::{ConsoleSink, Sink, StderrSink};
