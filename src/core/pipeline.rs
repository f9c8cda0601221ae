//! Pipeline manager
//!
//! A [`Pipeline`] owns two output channels:
//!
//! - the **shared channel**, a queued writer to the console (or the sink
//!   given to the builder) that can be redirected to a file. A file output
//!   rotates to a freshly named file once the rotation threshold is reached.
//! - the **current-thread channel**, a per-thread file written directly by
//!   the calling thread. Without a configured prefix, or when the thread's
//!   file cannot be opened, it falls back to the shared channel.
//!
//! Both channels are written through [`LogStream`]s handed out by
//! [`Pipeline::shared_stream`] and [`Pipeline::thread_stream`].

use super::config::PipelineConfig;
use super::encoding::{Encoding, TextCodec};
use super::error::{report, PipelineError, Result};
use super::line_bridge::{LineTarget, LogStream};
use super::metrics::WriterMetrics;
use super::modifier::{Modifier, ModifierPipeline};
use super::queue_writer::{QueueWriter, RotationThreshold, WriterOptions};
use super::scope::{self, Scope};
use super::severity::Severity;
use super::sink::{self, SharedSink};
use super::thread_context;
use crate::sinks::{rotating_file, ConsoleSink, FileSink};
use parking_lot::{Mutex, RwLock};
use std::cell::RefCell;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

/// Writers of the shared channel.
#[derive(Default)]
struct SharedChannel {
    /// Writer for the default sink, started on first use
    default_writer: Option<Arc<QueueWriter>>,
    file_writer: Option<Arc<QueueWriter>>,
    /// File writer replaced by the last switch or rotation. Kept until the
    /// next one so lines queued just before the switch still reach its file.
    previous: Option<Arc<QueueWriter>>,
    base: Option<PathBuf>,
    path: Option<PathBuf>,
}

impl SharedChannel {
    fn active(&self) -> Option<&Arc<QueueWriter>> {
        self.file_writer.as_ref().or(self.default_writer.as_ref())
    }

    fn writers(&self) -> impl Iterator<Item = &Arc<QueueWriter>> {
        self.default_writer
            .iter()
            .chain(self.file_writer.iter())
            .chain(self.previous.iter())
    }
}

enum ThreadSlot {
    Open { path: PathBuf, sink: SharedSink },
    /// Opening failed; the thread writes to the shared channel until the
    /// prefix changes
    Unavailable,
}

/// Drops the thread's slot in `owner` when the thread exits, closing its
/// file and releasing the lock on it.
struct ThreadRelease {
    owner: Weak<PipelineInner>,
    id: ThreadId,
}

impl Drop for ThreadRelease {
    fn drop(&mut self) {
        if let Some(inner) = self.owner.upgrade() {
            let slot = inner.threads.lock().remove(&self.id);
            drop(slot);
        }
    }
}

thread_local! {
    static THREAD_RELEASES: RefCell<Vec<ThreadRelease>> = const { RefCell::new(Vec::new()) };
}

struct PipelineInner {
    me: Weak<PipelineInner>,
    codec: Arc<dyn TextCodec>,
    default_sink: SharedSink,
    line_capacity: usize,
    poll_interval: Duration,
    drain_before_exit: AtomicBool,
    threshold: RotationThreshold,
    modifiers: RwLock<ModifierPipeline>,
    current_scope: RwLock<Option<Scope>>,
    shared: RwLock<SharedChannel>,
    thread_prefix: RwLock<Option<PathBuf>>,
    threads: Mutex<HashMap<ThreadId, ThreadSlot>>,
    enabled: AtomicBool,
    rotating: AtomicBool,
    closed: AtomicBool,
}

impl PipelineInner {
    fn spawn_writer(&self, sink: SharedSink, rotates: bool) -> Result<QueueWriter> {
        let mut options = WriterOptions::new()
            .with_codec(Arc::clone(&self.codec))
            .with_drain_before_exit(self.drain_before_exit.load(Ordering::Acquire))
            .with_poll_interval(self.poll_interval)
            .with_threshold(self.threshold.clone());
        if rotates {
            let me = self.me.clone();
            options = options
                .with_thread_name("log-file-writer")
                .on_rotate(Arc::new(move || {
                    if let Some(inner) = me.upgrade() {
                        inner.rotate();
                    }
                }));
        }
        QueueWriter::spawn(sink, options)
    }

    /// Writer the shared channel currently feeds, starting the default one
    /// if nothing is running yet.
    fn active_writer(&self) -> Option<Arc<QueueWriter>> {
        if let Some(writer) = self.shared.read().active() {
            return Some(Arc::clone(writer));
        }

        let mut channel = self.shared.write();
        if self.closed.load(Ordering::Acquire) {
            return None;
        }
        if let Some(writer) = channel.active() {
            return Some(Arc::clone(writer));
        }
        match self.spawn_writer(Arc::clone(&self.default_sink), false) {
            Ok(writer) => {
                let writer = Arc::new(writer);
                channel.default_writer = Some(Arc::clone(&writer));
                Some(writer)
            }
            Err(e) => {
                report("ERROR", format_args!("Cannot start shared writer: {}", e));
                None
            }
        }
    }

    fn write_shared(&self, line: &str) -> usize {
        if self.closed.load(Ordering::Acquire) {
            return 0;
        }
        if !self.enabled.load(Ordering::Acquire) {
            // Suppressed output still counts as accepted
            return line.len();
        }
        let Some(writer) = self.active_writer() else {
            return 0;
        };
        let prefix = self.modifiers.read().prefix();
        writer.write(&prefix, line)
    }

    /// Open a new timestamped file for `base` together with its writer.
    fn open_shared_file(&self, base: &Path) -> Result<(Arc<QueueWriter>, PathBuf)> {
        let file = rotating_file::open_timestamped(base)?;
        let path = file.path().to_path_buf();
        let writer = self.spawn_writer(sink::shared(file), true)?;
        Ok((Arc::new(writer), path))
    }

    /// Make `writer` the shared file writer. Returns the writer that falls
    /// out of the `previous` slot; the caller drops it outside the lock.
    fn install_file_writer(
        channel: &mut SharedChannel,
        writer: Arc<QueueWriter>,
        base: &Path,
        path: PathBuf,
    ) -> Option<Arc<QueueWriter>> {
        channel.base = Some(base.to_path_buf());
        channel.path = Some(path);
        let superseded = channel.previous.take();
        channel.previous = channel.file_writer.replace(writer);
        superseded
    }

    fn set_shared_output(&self, base: Option<&Path>) -> Result<Option<PathBuf>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PipelineError::WriterClosed);
        }

        let Some(base) = base else {
            let released = {
                let mut channel = self.shared.write();
                channel.base = None;
                channel.path = None;
                (channel.file_writer.take(), channel.previous.take())
            };
            // Waits for both writers to drain
            drop(released);
            return Ok(None);
        };

        match self.open_shared_file(base) {
            Ok((writer, path)) => {
                let superseded = {
                    let mut channel = self.shared.write();
                    Self::install_file_writer(&mut channel, writer, base, path.clone())
                };
                drop(superseded);
                Ok(Some(path))
            }
            Err(e) => {
                report(
                    "ERROR",
                    format_args!("Cannot redirect shared output to '{}': {}", base.display(), e),
                );
                Err(e)
            }
        }
    }

    /// Switch the shared file output to a new file. Runs on the producer
    /// thread whose write crossed the threshold.
    fn rotate(&self) {
        if self.rotating.swap(true, Ordering::AcqRel) {
            return;
        }

        let base = self.shared.read().base.clone();
        if let Some(base) = base {
            match self.open_shared_file(&base) {
                Ok((writer, path)) => {
                    let superseded = {
                        let mut channel = self.shared.write();
                        // The output may have been redirected meanwhile
                        if channel.base.as_deref() == Some(base.as_path())
                            && !self.closed.load(Ordering::Acquire)
                        {
                            Self::install_file_writer(&mut channel, writer, &base, path)
                        } else {
                            Some(writer)
                        }
                    };
                    drop(superseded);
                }
                Err(e) => {
                    let err = PipelineError::rotation(base.display().to_string(), e.to_string());
                    report("ERROR", format_args!("{}; keeping the current file", err));
                }
            }
        }

        self.rotating.store(false, Ordering::Release);
    }

    fn thread_file_path(prefix: &Path) -> PathBuf {
        let mut name = OsString::from(prefix.as_os_str());
        name.push(thread_context::thread_tag());
        PathBuf::from(name)
    }

    /// Sink of the calling thread's own channel, opened on first use.
    fn thread_sink(&self) -> Option<SharedSink> {
        // Held across the lookup so a concurrent prefix change cannot leave
        // a sink opened with the old prefix behind
        let guard = self.thread_prefix.read();
        let prefix = guard.as_deref()?;

        let id = thread::current().id();
        let mut threads = self.threads.lock();
        let slot = match threads.entry(id) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                self.release_on_thread_exit(id);
                entry.insert(Self::open_thread_slot(prefix))
            }
        };
        match slot {
            ThreadSlot::Open { sink, .. } => Some(Arc::clone(sink)),
            ThreadSlot::Unavailable => None,
        }
    }

    fn open_thread_slot(prefix: &Path) -> ThreadSlot {
        let path = Self::thread_file_path(prefix);
        match FileSink::create(&path) {
            Ok(file) => ThreadSlot::Open {
                path,
                sink: sink::shared(file),
            },
            Err(e) => {
                report(
                    "ERROR",
                    format_args!(
                        "Cannot open thread output '{}', using shared output: {}",
                        path.display(),
                        e
                    ),
                );
                ThreadSlot::Unavailable
            }
        }
    }

    /// Arrange for the calling thread's slot to be dropped when it exits.
    /// Called with `threads` locked.
    fn release_on_thread_exit(&self, id: ThreadId) {
        // Fails only while the thread is already being torn down
        let _ = THREAD_RELEASES.try_with(|releases| {
            let mut releases = releases.borrow_mut();
            // Entries of dropped pipelines never touch a lock when dropped
            releases.retain(|release| release.owner.strong_count() > 0);
            if !releases.iter().any(|release| release.owner.ptr_eq(&self.me)) {
                releases.push(ThreadRelease {
                    owner: self.me.clone(),
                    id,
                });
            }
        });
    }

    /// Write `line` with its prefix straight to `sink` and flush.
    fn write_direct(&self, sink: &SharedSink, line: &str) -> usize {
        let mut text = self.modifiers.read().prefix();
        text.push_str(line);
        let bytes = self.codec.encode(&text);

        let mut sink = sink.lock();
        let result = sink
            .write_bytes(&bytes)
            .and_then(|written| sink.flush().map(|()| written));
        match result {
            Ok(written) if written == bytes.len() => line.len(),
            Ok(written) => {
                report(
                    "ERROR",
                    format_args!(
                        "Short write to '{}': {} of {} bytes",
                        sink.name(),
                        written,
                        bytes.len()
                    ),
                );
                0
            }
            Err(e) => {
                report("ERROR", format_args!("Write to '{}' failed: {}", sink.name(), e));
                0
            }
        }
    }

    fn write_thread(&self, line: &str) -> usize {
        if self.closed.load(Ordering::Acquire) {
            return 0;
        }
        match self.thread_sink() {
            Some(sink) => self.write_direct(&sink, line),
            None => self.write_shared(line),
        }
    }

    fn set_thread_output_prefix(&self, prefix: Option<&Path>) {
        let mut current = self.thread_prefix.write();
        *current = prefix.map(Path::to_path_buf);
        // Every thread reopens (or falls back) on its next write
        let released = std::mem::take(&mut *self.threads.lock());
        drop(current);
        drop(released);
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let channel = std::mem::take(&mut *self.shared.write());
        let threads = std::mem::take(&mut *self.threads.lock());
        // Dropping the last handle of each writer drains and joins it
        drop(channel);
        drop(threads);
    }
}

struct SharedTarget(Arc<PipelineInner>);

impl LineTarget for SharedTarget {
    fn write_line(&self, text: &str) -> usize {
        self.0.write_shared(text)
    }
}

struct ThreadTarget(Arc<PipelineInner>);

impl LineTarget for ThreadTarget {
    fn write_line(&self, text: &str) -> usize {
        self.0.write_thread(text)
    }
}

/// Scoped, queued logging pipeline.
///
/// # Example
///
/// ```
/// use rust_log_pipeline::prelude::*;
/// use rust_log_pipeline::sinks::MemorySink;
/// use std::fmt::Write;
///
/// let memory = MemorySink::new();
/// let pipeline = Pipeline::builder()
///     .default_sink(memory.clone())
///     .modifier(Modifier::fixed("[app] "))
///     .build()
///     .unwrap();
///
/// let mut out = pipeline.shared_stream();
/// write!(out, "ready after {} ms", 12).unwrap();
/// out.line("");
/// drop(out);
///
/// pipeline.close();
/// assert_eq!(memory.contents_lossy(), "[app] ready after 12 ms\n");
/// ```
pub struct Pipeline {
    inner: Arc<PipelineInner>,
}

impl Pipeline {
    /// Pipeline writing the shared channel to stderr with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::from_parts(&PipelineConfig::default(), sink::shared(ConsoleSink::new()))
    }

    /// # Errors
    ///
    /// Returns error if the configuration is invalid or a configured output
    /// cannot be opened
    pub fn with_config(config: PipelineConfig) -> Result<Self> {
        PipelineBuilder::from_config(config).build()
    }

    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    fn from_parts(config: &PipelineConfig, default_sink: SharedSink) -> Self {
        let modifiers: ModifierPipeline = config.modifiers.iter().cloned().map(Modifier::from).collect();
        let inner = Arc::new_cyclic(|me| PipelineInner {
            me: me.clone(),
            codec: config.encoding.codec(),
            default_sink,
            line_capacity: config.line_capacity,
            poll_interval: config.poll_interval(),
            drain_before_exit: AtomicBool::new(config.drain_before_exit),
            threshold: RotationThreshold::new(config.rotation_threshold),
            modifiers: RwLock::new(modifiers),
            current_scope: RwLock::new(None),
            shared: RwLock::new(SharedChannel::default()),
            thread_prefix: RwLock::new(None),
            threads: Mutex::new(HashMap::new()),
            enabled: AtomicBool::new(config.enabled),
            rotating: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        });
        Self { inner }
    }

    /// Replace the caller-supplied modifiers. Indentation and thread name
    /// are always applied after them.
    pub fn set_modifiers(&self, modifiers: Vec<Modifier>) {
        self.inner.modifiers.write().replace(modifiers);
    }

    /// Append one modifier to the current set.
    pub fn register_modifier(&self, modifier: impl Into<Modifier>) {
        self.inner.modifiers.write().register(modifier);
    }

    /// Prefix a line written now from the calling thread would get.
    pub fn prefix(&self) -> String {
        self.inner.modifiers.read().prefix()
    }

    /// Bytes per shared output file before rotating; `None` disables
    /// rotation. Applies to the file currently being written as well.
    pub fn set_rotation_threshold(&self, bytes: Option<u64>) {
        self.inner.threshold.set(bytes.filter(|&b| b > 0));
    }

    pub fn rotation_threshold(&self) -> Option<u64> {
        self.inner.threshold.get()
    }

    /// Redirect the shared channel to a new file `<base>-<timestamp>`, or
    /// back to the default sink with `None`.
    ///
    /// Returns the path of the opened file. On failure the current output
    /// stays active.
    ///
    /// # Errors
    ///
    /// Returns error if the file or its directory cannot be created
    pub fn set_shared_output(&self, base: Option<&Path>) -> Result<Option<PathBuf>> {
        self.inner.set_shared_output(base)
    }

    /// File the shared channel currently writes to.
    pub fn shared_output_path(&self) -> Option<PathBuf> {
        self.inner.shared.read().path.clone()
    }

    /// Give every thread its own output file `<prefix><thread-id>`, or send
    /// thread output to the shared channel with `None`.
    pub fn set_thread_output_prefix(&self, prefix: Option<&Path>) {
        self.inner.set_thread_output_prefix(prefix);
    }

    /// File the calling thread's channel writes to, if it has one open.
    pub fn thread_output_path(&self) -> Option<PathBuf> {
        let id = thread::current().id();
        match self.inner.threads.lock().get(&id) {
            Some(ThreadSlot::Open { path, .. }) => Some(path.clone()),
            _ => None,
        }
    }

    pub fn shared_stream(&self) -> LogStream {
        LogStream::with_capacity(
            Arc::new(SharedTarget(Arc::clone(&self.inner))),
            self.inner.line_capacity,
        )
    }

    pub fn thread_stream(&self) -> LogStream {
        LogStream::with_capacity(
            Arc::new(ThreadTarget(Arc::clone(&self.inner))),
            self.inner.line_capacity,
        )
    }

    /// Turn shared-channel output on or off. Lines written while off are
    /// dropped.
    pub fn set_enabled(&self, enabled: bool) {
        self.inner.enabled.store(enabled, Ordering::Release);
    }

    pub fn is_output_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::Acquire)
    }

    /// Whether queued lines are still written when a writer shuts down.
    /// Applies to running writers and to writers started later.
    pub fn set_drain_before_exit(&self, drain: bool) {
        self.inner.drain_before_exit.store(drain, Ordering::Release);
        for writer in self.inner.shared.read().writers() {
            writer.set_drain_before_exit(drain);
        }
    }

    pub fn set_current_scope(&self, scope: Option<Scope>) {
        *self.inner.current_scope.write() = scope;
    }

    pub fn current_scope(&self) -> Option<Scope> {
        self.inner.current_scope.read().clone()
    }

    /// Whether `wanted` passes the current scope.
    pub fn is_enabled(&self, wanted: Severity) -> bool {
        scope::is_enabled(self.inner.current_scope.read().as_ref(), wanted)
    }

    /// Write one line to the shared channel.
    pub fn shared_line(&self, text: &str) -> bool {
        self.shared_stream().line(text)
    }

    /// Write one line to the calling thread's channel.
    pub fn thread_line(&self, text: &str) -> bool {
        self.thread_stream().line(text)
    }

    /// Write `text` with the label of `level` to the shared channel if the
    /// current scope lets `level` through.
    pub fn log(&self, level: Severity, text: &str) -> bool {
        if !self.is_enabled(level) {
            return false;
        }
        let mut stream = self.shared_stream();
        stream.write_text(level.label());
        stream.line(text)
    }

    /// Like [`log`](Self::log) but on the calling thread's channel.
    pub fn thread_log(&self, level: Severity, text: &str) -> bool {
        if !self.is_enabled(level) {
            return false;
        }
        let mut stream = self.thread_stream();
        stream.write_text(level.label());
        stream.line(text)
    }

    /// Metrics of the writer the shared channel currently feeds.
    pub fn shared_metrics(&self) -> Option<WriterMetrics> {
        self.inner
            .shared
            .read()
            .active()
            .map(|writer| writer.metrics().clone())
    }

    /// Block until every shared writer has written or discarded all queued
    /// lines, or `timeout` elapses.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let start = Instant::now();
        let writers: Vec<_> = self.inner.shared.read().writers().cloned().collect();
        writers
            .iter()
            .all(|writer| writer.wait_drained(timeout.saturating_sub(start.elapsed())))
    }

    /// Stop all output. Queued lines are written first unless
    /// `drain_before_exit` is off. Streams still in use afterwards become
    /// broken.
    pub fn close(&self) {
        self.inner.close();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    pub fn encoding_name(&self) -> &str {
        self.inner.codec.name()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.inner.close();
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("shared_output", &self.shared_output_path())
            .field("rotation_threshold", &self.rotation_threshold())
            .field("enabled", &self.is_output_enabled())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Builder for constructing a Pipeline with a fluent API
///
/// # Example
/// ```
/// use rust_log_pipeline::prelude::*;
/// use rust_log_pipeline::sinks::MemorySink;
///
/// let pipeline = Pipeline::builder()
///     .default_sink(MemorySink::new())
///     .modifier(Modifier::time())
///     .rotation_threshold(64 * 1024)
///     .drain_before_exit(true)
///     .build()
///     .unwrap();
/// assert_eq!(pipeline.rotation_threshold(), Some(65536));
/// ```
pub struct PipelineBuilder {
    config: PipelineConfig,
    modifiers: Vec<Modifier>,
    default_sink: Option<SharedSink>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::from_config(PipelineConfig::default())
    }

    /// Start from an existing configuration.
    pub fn from_config(config: PipelineConfig) -> Self {
        Self {
            config,
            modifiers: Vec::new(),
            default_sink: None,
        }
    }

    /// Sink of the shared channel while no file output is set. Stderr by
    /// default.
    #[must_use = "builder methods return a new value"]
    pub fn default_sink<S: sink::Sink + 'static>(mut self, target: S) -> Self {
        self.default_sink = Some(sink::shared(target));
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn shared_output(mut self, base: impl Into<PathBuf>) -> Self {
        self.config.shared_output = Some(base.into());
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn rotation_threshold(mut self, bytes: u64) -> Self {
        self.config.rotation_threshold = Some(bytes);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn thread_output_prefix(mut self, prefix: impl Into<PathBuf>) -> Self {
        self.config.thread_output_prefix = Some(prefix.into());
        self
    }

    /// Add a modifier after the ones named in the configuration.
    #[must_use = "builder methods return a new value"]
    pub fn modifier(mut self, modifier: impl Into<Modifier>) -> Self {
        self.modifiers.push(modifier.into());
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn drain_before_exit(mut self, drain: bool) -> Self {
        self.config.drain_before_exit = drain;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn line_capacity(mut self, chars: usize) -> Self {
        self.config.line_capacity = chars;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval_ms = interval.as_millis().max(1) as u64;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.config.encoding = encoding;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    /// Build the Pipeline
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid or a configured output
    /// cannot be opened
    pub fn build(self) -> Result<Pipeline> {
        self.config.validate()?;

        let default_sink = self
            .default_sink
            .unwrap_or_else(|| sink::shared(ConsoleSink::new()));
        let pipeline = Pipeline::from_parts(&self.config, default_sink);
        if !self.modifiers.is_empty() {
            let mut modifiers = pipeline.inner.modifiers.write();
            for modifier in self.modifiers {
                modifiers.register(modifier);
            }
        }
        if let Some(ref base) = self.config.shared_output {
            pipeline.set_shared_output(Some(base))?;
        }
        if let Some(ref prefix) = self.config.thread_output_prefix {
            pipeline.set_thread_output_prefix(Some(prefix));
        }
        Ok(pipeline)
    }
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::thread_context::IndentGuard;
    use crate::sinks::MemorySink;
    use std::fmt::Write;
    use std::fs;
    use tempfile::tempdir;

    fn memory_pipeline() -> (Pipeline, MemorySink) {
        let memory = MemorySink::new();
        let pipeline = Pipeline::builder()
            .default_sink(memory.clone())
            .build()
            .unwrap();
        (pipeline, memory)
    }

    #[test]
    fn test_shared_lines_in_order() {
        let (pipeline, memory) = memory_pipeline();
        pipeline.shared_line("one");
        pipeline.shared_line("two");
        pipeline.shared_line("three");
        pipeline.close();
        assert_eq!(memory.contents_lossy(), "one\ntwo\nthree\n");
    }

    #[test]
    fn test_modifiers_indentation_and_scope_gating() {
        let (pipeline, memory) = memory_pipeline();
        pipeline.set_modifiers(vec![Modifier::fixed("> ")]);

        let root = Scope::root();
        root.set_level(Severity::Warn);
        pipeline.set_current_scope(Some(Scope::create(Some(&root))));

        assert!(!pipeline.log(Severity::Info, "hidden"));
        {
            let _guard = IndentGuard::new();
            assert!(pipeline.log(Severity::Error, "bad"));
        }
        pipeline.log(Severity::Warn, "careful");
        pipeline.close();

        assert_eq!(memory.contents_lossy(), "> \tERROR: bad\n> WARN: careful\n");
    }

    #[test]
    fn test_no_current_scope_defaults_to_info() {
        let pipeline = Pipeline::builder()
            .default_sink(MemorySink::new())
            .build()
            .unwrap();
        assert!(pipeline.current_scope().is_none());
        assert!(pipeline.is_enabled(Severity::Info));
        assert!(!pipeline.is_enabled(Severity::Trace));
    }

    #[test]
    fn test_disabled_output_is_dropped() {
        let (pipeline, memory) = memory_pipeline();
        pipeline.set_enabled(false);
        let mut stream = pipeline.shared_stream();
        assert!(stream.line("muted"));
        pipeline.set_enabled(true);
        assert!(stream.line("audible"));
        drop(stream);
        pipeline.close();
        assert_eq!(memory.contents_lossy(), "audible\n");
    }

    #[test]
    fn test_stream_breaks_after_close() {
        let (pipeline, memory) = memory_pipeline();
        let mut stream = pipeline.shared_stream();
        pipeline.close();
        assert!(!stream.line("too late"));
        assert!(stream.is_broken());
        assert!(memory.is_empty());
    }

    #[test]
    fn test_shared_output_file_and_back() {
        let dir = tempdir().unwrap();
        let (pipeline, memory) = memory_pipeline();
        let base = dir.path().join("app");

        let path = pipeline.set_shared_output(Some(&base)).unwrap().unwrap();
        assert_eq!(pipeline.shared_output_path(), Some(path.clone()));
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("app-"));

        pipeline.shared_line("to file");
        assert_eq!(pipeline.set_shared_output(None).unwrap(), None);
        pipeline.shared_line("to memory");
        pipeline.close();

        assert_eq!(fs::read_to_string(&path).unwrap(), "to file\n");
        assert_eq!(memory.contents_lossy(), "to memory\n");
    }

    #[test]
    fn test_failed_redirect_keeps_previous_output() {
        let dir = tempdir().unwrap();
        let (pipeline, memory) = memory_pipeline();
        // A regular file cannot be a parent directory
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"").unwrap();

        assert!(pipeline.set_shared_output(Some(&blocker.join("app"))).is_err());
        assert!(pipeline.shared_output_path().is_none());
        pipeline.shared_line("still here");
        pipeline.close();
        assert_eq!(memory.contents_lossy(), "still here\n");
    }

    #[test]
    fn test_thread_channel_falls_back_without_prefix() {
        let (pipeline, memory) = memory_pipeline();
        pipeline.thread_line("via shared");
        assert!(pipeline.thread_output_path().is_none());
        pipeline.close();
        assert_eq!(memory.contents_lossy(), "via shared\n");
    }

    #[test]
    fn test_thread_channel_writes_own_file() {
        let dir = tempdir().unwrap();
        let (pipeline, memory) = memory_pipeline();
        let prefix = dir.path().join("worker-");
        pipeline.set_thread_output_prefix(Some(&prefix));

        pipeline.thread_line("mine");
        let path = pipeline.thread_output_path().unwrap();
        assert_eq!(
            path.file_name().unwrap().to_string_lossy(),
            format!("worker-{}", thread_context::thread_tag())
        );
        // Written directly, visible without closing
        assert_eq!(fs::read_to_string(&path).unwrap(), "mine\n");

        pipeline.set_thread_output_prefix(None);
        pipeline.thread_line("shared again");
        pipeline.close();
        assert_eq!(memory.contents_lossy(), "shared again\n");
    }

    #[test]
    fn test_thread_channel_falls_back_when_open_fails() {
        let dir = tempdir().unwrap();
        let (pipeline, memory) = memory_pipeline();
        pipeline.set_thread_output_prefix(Some(&dir.path().join("missing").join("t-")));
        assert!(pipeline.thread_line("fallback"));
        assert!(pipeline.thread_output_path().is_none());
        pipeline.close();
        assert_eq!(memory.contents_lossy(), "fallback\n");
    }

    #[test]
    fn test_thread_files_released_when_threads_exit() {
        let dir = tempdir().unwrap();
        let (pipeline, _memory) = memory_pipeline();
        pipeline.set_thread_output_prefix(Some(&dir.path().join("t-")));
        let pipeline = Arc::new(pipeline);

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let pipeline = Arc::clone(&pipeline);
                thread::spawn(move || {
                    pipeline.thread_line("x");
                    pipeline.thread_output_path().unwrap()
                })
            })
            .collect();
        let paths: Vec<PathBuf> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(pipeline.inner.threads.lock().is_empty());
        for path in &paths {
            assert_eq!(fs::read_to_string(path).unwrap(), "x\n");
            // No longer locked by the exited thread
            assert!(FileSink::create(path).is_ok());
        }
    }

    #[test]
    fn test_thread_slot_survives_prefix_change_and_is_released_once() {
        let dir = tempdir().unwrap();
        let (pipeline, _memory) = memory_pipeline();
        let pipeline = Arc::new(pipeline);
        let worker = {
            let pipeline = Arc::clone(&pipeline);
            let first = dir.path().join("a-");
            let second = dir.path().join("b-");
            thread::spawn(move || {
                pipeline.set_thread_output_prefix(Some(&first));
                pipeline.thread_line("one");
                pipeline.set_thread_output_prefix(Some(&second));
                pipeline.thread_line("two");
                let open = pipeline.inner.threads.lock().len();
                let releases = THREAD_RELEASES.with(|r| r.borrow().len());
                (open, releases)
            })
        };
        assert_eq!(worker.join().unwrap(), (1, 1));
        assert!(pipeline.inner.threads.lock().is_empty());
    }

    #[test]
    fn test_rotation_switches_files() {
        let dir = tempdir().unwrap();
        let (pipeline, _memory) = memory_pipeline();
        let base = dir.path().join("rot");
        pipeline.set_rotation_threshold(Some(20));
        let first = pipeline.set_shared_output(Some(&base)).unwrap().unwrap();

        let mut stream = pipeline.shared_stream();
        for i in 0..10 {
            writeln!(stream, "line {:02}", i).unwrap();
            stream.sync();
        }
        drop(stream);
        assert_ne!(pipeline.shared_output_path(), Some(first));
        pipeline.close();

        let mut total = String::new();
        let mut files: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        files.sort();
        assert!(files.len() >= 4);
        for file in &files {
            total.push_str(&fs::read_to_string(file).unwrap());
        }
        assert_eq!(total.lines().count(), 10);
        assert_eq!(total.len(), 10 * "line 00\n".len());
    }

    #[test]
    fn test_builder_from_config() {
        let config = PipelineConfig {
            rotation_threshold: Some(1024),
            enabled: false,
            ..PipelineConfig::default()
        };
        let pipeline = PipelineBuilder::from_config(config)
            .default_sink(MemorySink::new())
            .build()
            .unwrap();
        assert_eq!(pipeline.rotation_threshold(), Some(1024));
        assert!(!pipeline.is_output_enabled());
        assert_eq!(pipeline.encoding_name(), "utf-8");
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let result = Pipeline::builder().rotation_threshold(0).build();
        assert!(matches!(
            result,
            Err(PipelineError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_wait_idle_and_metrics() {
        let (pipeline, memory) = memory_pipeline();
        for i in 0..50 {
            pipeline.shared_line(&format!("m{}", i));
        }
        assert!(pipeline.wait_idle(Duration::from_secs(5)));
        let metrics = pipeline.shared_metrics().unwrap();
        assert_eq!(metrics.messages_written(), 50);
        assert_eq!(memory.contents_lossy().lines().count(), 50);
    }
}
