//! Logging macros
//!
//! The leveled macros take a `Logger` or an `Xlog` followed by a format
//! string, and record the enclosing function by its full path.
//!
//! ```ignore
//! xlog::info!(xlog, "listening on {}", addr);
//! xlog::warn!(xlog.text(), "slow request: {:?}", elapsed);
//! ```

/// Path of the function the macro expands in
#[doc(hidden)]
#[macro_export]
macro_rules! __function_name {
    () => {{
        fn here() {}
        fn type_name_of<T>(_: T) -> &'static str {
            ::std::any::type_name::<T>()
        }
        $crate::logging::trim_function(type_name_of(here))
    }};
}

/// Emit a record at an explicit severity, returning any escalation
#[macro_export]
macro_rules! log {
    ($logger:expr, $severity:expr, $($arg:tt)+) => {
        $logger.log_at(
            $severity,
            $crate::Caller::new(file!(), line!(), Some($crate::__function_name!())),
            format_args!($($arg)+),
            &[],
        )
    };
}

/// Emit a debug record
#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => {{
        let _ = $crate::log!($logger, $crate::Severity::Debug, $($arg)+);
    }};
}

/// Emit an info record
#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => {{
        let _ = $crate::log!($logger, $crate::Severity::Info, $($arg)+);
    }};
}

/// Emit a warn record
#[macro_export]
macro_rules! warn {
    ($logger:expr, $($arg:tt)+) => {{
        let _ = $crate::log!($logger, $crate::Severity::Warn, $($arg)+);
    }};
}

/// Emit an error record
#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)+) => {{
        let _ = $crate::log!($logger, $crate::Severity::Error, $($arg)+);
    }};
}

/// Join the `Display` form of each argument with single spaces
#[macro_export]
macro_rules! sprint {
    () => {
        ::std::string::String::new()
    };
    ($first:expr $(, $rest:expr)* $(,)?) => {{
        use ::std::fmt::Write as _;
        let mut joined = ::std::string::String::new();
        let _ = write!(joined, "{}", $first);
        $(let _ = write!(joined, " {}", $rest);)*
        joined
    }};
}
