//! Core pipeline types and traits

pub mod config;
pub mod encoding;
pub mod error;
pub mod global;
pub mod line_bridge;
pub mod metrics;
pub mod modifier;
pub mod pipeline;
pub mod queue_writer;
pub mod scope;
pub mod severity;
pub mod sink;
pub mod thread_context;

pub use config::PipelineConfig;
pub use encoding::{Encoding, TextCodec, Utf16Codec, Utf8Codec};
pub use error::{PipelineError, Result};
pub use line_bridge::{LineTarget, LogStream, DEFAULT_LINE_CAPACITY};
pub use metrics::WriterMetrics;
pub use modifier::{Modifier, ModifierFn, ModifierKind, ModifierPipeline};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use queue_writer::{
    PendingMessage, QueueWriter, RotateCallback, RotationThreshold, WriterOptions,
    DEFAULT_POLL_INTERVAL,
};
pub use scope::{Scope, DEFAULT_SEVERITY};
pub use severity::Severity;
pub use sink::{SharedSink, Sink};
pub use thread_context::{IndentGuard, ThreadLocalText};
