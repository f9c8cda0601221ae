//! # Rust Log Pipeline
//!
//! An in-process logging pipeline with scoped severity filters, line-prefix
//! modifiers and queued output served by one background worker per sink.
//!
//! ## Features
//!
//! - **Scoped Severity**: a tree of filters whose levels are inherited when a
//!   scope is created
//! - **Line Prefixes**: timestamps, thread names and indentation in front of
//!   every line
//! - **Queued Output**: producers never wait for I/O; one worker per sink
//!   writes lines in the order they were handed over
//! - **File Rotation**: shared output moves to a freshly named file once a
//!   byte threshold is reached
//! - **Per-Thread Files**: optional dedicated output for every thread
//!
//! ## Example
//!
//! ```
//! use rust_log_pipeline::core::thread_context;
//! use rust_log_pipeline::prelude::*;
//! use rust_log_pipeline::info;
//! use rust_log_pipeline::sinks::MemorySink;
//!
//! let memory = MemorySink::new();
//! let pipeline = Pipeline::builder()
//!     .default_sink(memory.clone())
//!     .build()
//!     .unwrap();
//!
//! thread_context::set_thread_name("main: ");
//! info!(pipeline, "started");
//! thread_context::clear_thread_name();
//!
//! pipeline.close();
//! assert_eq!(memory.contents_lossy(), "main: started\n");
//! ```

pub mod core;
pub mod macros;
pub mod sinks;

pub use crate::core::global;

pub mod prelude {
    pub use crate::core::{
        IndentGuard, LogStream, Modifier, ModifierKind, Pipeline, PipelineBuilder,
        PipelineConfig, PipelineError, Result, Scope, Severity, ThreadLocalText,
    };
    pub use crate::sinks::{ConsoleSink, FileSink};
}

pub use crate::core::{
    Encoding, IndentGuard, LineTarget, LogStream, Modifier, ModifierFn, ModifierKind,
    ModifierPipeline, PendingMessage, Pipeline, PipelineBuilder, PipelineConfig, PipelineError,
    QueueWriter, Result, RotateCallback, RotationThreshold, Scope, Severity, SharedSink, Sink,
    TextCodec, ThreadLocalText, Utf16Codec, Utf8Codec, WriterMetrics, WriterOptions,
    DEFAULT_LINE_CAPACITY, DEFAULT_POLL_INTERVAL, DEFAULT_SEVERITY,
};
pub use macros::{srcpos_full, srcpos_short};
pub use sinks::{ConsoleSink, FileSink, MemorySink};
