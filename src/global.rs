//! Process-wide logging context
//!
//! `install` publishes one `Xlog` for the whole process; the free functions
//! below forward to it. Using them before `install` panics with a clear
//! message instead of silently dropping records.

use std::fmt;
use std::sync::OnceLock;

use crate::error::{Error, Result};
use crate::logger::Escalation;
use crate::pipeline::Xlog;

static GLOBAL: OnceLock<Xlog> = OnceLock::new();

/// Publish `xlog` as the process-wide context
///
/// Only the first call succeeds.
pub fn install(xlog: Xlog) -> Result<()> {
    GLOBAL.set(xlog).map_err(|_| Error::AlreadyInstalled)
}

/// The installed context, if any
pub fn try_get() -> Option<&'static Xlog> {
    GLOBAL.get()
}

/// The installed context
///
/// Panics when nothing has been installed.
pub fn get() -> &'static Xlog {
    match GLOBAL.get() {
        Some(xlog) => xlog,
        None => panic!("{}", Error::NotInstalled),
    }
}

macro_rules! forward {
    ($($plain:ident, $formatted:ident => $ret:ty;)*) => {
        $(
            #[track_caller]
            pub fn $plain(msg: impl fmt::Display) -> $ret {
                get().$plain(msg)
            }

            #[track_caller]
            pub fn $formatted(args: fmt::Arguments<'_>) -> $ret {
                get().$formatted(args)
            }
        )*
    };
}

forward! {
    debug, debugf => ();
    info, infof => ();
    warn, warnf => ();
    error, errorf => ();
    dpanic, dpanicf => Option<Escalation>;
    panic, panicf => Escalation;
    fatal, fatalf => Escalation;
    cdebug, cdebugf => ();
    cinfo, cinfof => ();
    cwarn, cwarnf => ();
    cerror, cerrorf => ();
    cdpanic, cdpanicf => Option<Escalation>;
    cpanic, cpanicf => Escalation;
    cfatal, cfatalf => Escalation;
}

/// Flush the installed context, if any
pub fn sync() {
    if let Some(xlog) = try_get() {
        xlog.sync();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Options;
    use crate::logging::BufferSink;

    // The context is process-wide, so everything touching it lives in one test.
    #[test]
    fn test_install_once_and_forward() {
        let console = BufferSink::default();
        let options = Options {
            no_file: true,
            ..Options::default()
        };
        let xlog = Xlog::builder(options.clone())
            .console(console.clone())
            .build()
            .unwrap();

        install(xlog).unwrap();
        assert!(try_get().is_some());

        info("from the facade");
        cwarnf(format_args!("{} retries left", 2));
        sync();

        let lines = console.lines();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("from the facade"));
        assert!(lines[0].contains("global.rs"));
        assert!(lines[1].contains("2 retries left"));

        let second = Xlog::builder(options)
            .console(BufferSink::default())
            .build()
            .unwrap();
        assert!(matches!(install(second), Err(Error::AlreadyInstalled)));
        assert!(get().json().name() == "xlog");
    }
}
