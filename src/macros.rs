//! Logging macros for ergonomic log message formatting.
//!
//! These macros format like `format!` and write one line to a pipeline
//! channel, gated by the pipeline's current scope. Each evaluates to `true`
//! when the line was written.
//!
//! # Examples
//!
//! ```
//! use rust_log_pipeline::prelude::*;
//! use rust_log_pipeline::sinks::MemorySink;
//! use rust_log_pipeline::{info, trace, warn};
//!
//! let memory = MemorySink::new();
//! let pipeline = Pipeline::builder().default_sink(memory.clone()).build().unwrap();
//!
//! info!(pipeline, "Server listening on port {}", 8080);
//! warn!(pipeline, "Retry attempt {} of {}", 3, 5);
//! // Trace is above the default Info level
//! trace!(pipeline, "not written");
//!
//! pipeline.close();
//! assert_eq!(
//!     memory.contents_lossy(),
//!     "Server listening on port 8080\nWARN: Retry attempt 3 of 5\n"
//! );
//! ```

/// Write a formatted line to the shared channel if `level` is enabled.
///
/// # Examples
///
/// ```
/// # use rust_log_pipeline::prelude::*;
/// # let pipeline = Pipeline::builder()
/// #     .default_sink(rust_log_pipeline::sinks::MemorySink::new())
/// #     .build()
/// #     .unwrap();
/// use rust_log_pipeline::log;
/// log!(pipeline, Severity::Info, "Simple message");
/// log!(pipeline, Severity::Error, "Error code: {}", 500);
/// ```
#[macro_export]
macro_rules! log {
    ($pipeline:expr, $level:expr, $($arg:tt)+) => {{
        let pipeline = &$pipeline;
        let level: $crate::Severity = $level;
        if pipeline.is_enabled(level) {
            let mut stream = pipeline.shared_stream();
            stream.write_text(level.label());
            let _ = ::std::fmt::Write::write_fmt(&mut stream, format_args!($($arg)+));
            stream.write_text("\n");
            stream.sync()
        } else {
            false
        }
    }};
}

/// Write a formatted line to the calling thread's channel if `level` is
/// enabled.
///
/// # Examples
///
/// ```
/// # use rust_log_pipeline::prelude::*;
/// # let pipeline = Pipeline::builder()
/// #     .default_sink(rust_log_pipeline::sinks::MemorySink::new())
/// #     .build()
/// #     .unwrap();
/// use rust_log_pipeline::tlog;
/// tlog!(pipeline, Severity::Warn, "worker {} stalled", 3);
/// ```
#[macro_export]
macro_rules! tlog {
    ($pipeline:expr, $level:expr, $($arg:tt)+) => {{
        let pipeline = &$pipeline;
        let level: $crate::Severity = $level;
        if pipeline.is_enabled(level) {
            let mut stream = pipeline.thread_stream();
            stream.write_text(level.label());
            let _ = ::std::fmt::Write::write_fmt(&mut stream, format_args!($($arg)+));
            stream.write_text("\n");
            stream.sync()
        } else {
            false
        }
    }};
}

/// Log an error-level message to the shared channel.
#[macro_export]
macro_rules! error {
    ($pipeline:expr, $($arg:tt)+) => {
        $crate::log!($pipeline, $crate::Severity::Error, $($arg)+)
    };
}

/// Log a warning-level message to the shared channel.
#[macro_export]
macro_rules! warn {
    ($pipeline:expr, $($arg:tt)+) => {
        $crate::log!($pipeline, $crate::Severity::Warn, $($arg)+)
    };
}

/// Log an info-level message to the shared channel.
#[macro_export]
macro_rules! info {
    ($pipeline:expr, $($arg:tt)+) => {
        $crate::log!($pipeline, $crate::Severity::Info, $($arg)+)
    };
}

/// Log a trace-level message to the shared channel.
///
/// # Examples
///
/// ```
/// # use rust_log_pipeline::prelude::*;
/// # let pipeline = Pipeline::builder()
/// #     .default_sink(rust_log_pipeline::sinks::MemorySink::new())
/// #     .build()
/// #     .unwrap();
/// use rust_log_pipeline::trace;
/// let verbose = Scope::root();
/// verbose.set_level(Severity::Trace);
/// pipeline.set_current_scope(Some(verbose));
/// assert!(trace!(pipeline, "Entering function: calculate()"));
/// ```
#[macro_export]
macro_rules! trace {
    ($pipeline:expr, $($arg:tt)+) => {
        $crate::log!($pipeline, $crate::Severity::Trace, $($arg)+)
    };
}

/// Log a dump-level message to the shared channel.
#[macro_export]
macro_rules! dump {
    ($pipeline:expr, $($arg:tt)+) => {
        $crate::log!($pipeline, $crate::Severity::Dump, $($arg)+)
    };
}

/// Source position of the call site: `{module} in [file-name](line)`.
///
/// # Examples
///
/// ```
/// use rust_log_pipeline::source_at;
/// let at = source_at!();
/// assert!(at.contains(" in ["));
/// assert!(at.ends_with(&format!("]({})", line!() - 2)));
/// ```
#[macro_export]
macro_rules! source_at {
    () => {
        $crate::macros::srcpos_short(line!(), module_path!(), file!())
    };
}

/// `{function} in [file](line)`
pub fn srcpos_full(line: u32, function: &str, file: &str) -> String {
    format!("{{{}}} in [{}]({})", function, file, line)
}

/// Like [`srcpos_full`] with the directories stripped from `file`.
pub fn srcpos_short(line: u32, function: &str, file: &str) -> String {
    let name = file.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(file);
    srcpos_full(line, function, name)
}
