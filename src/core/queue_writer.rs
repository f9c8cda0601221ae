//! Queued writer served by a single background worker
//!
//! Producers append `(prefix, body)` pairs to an unbounded FIFO under a short
//! lock and return immediately. One worker thread per writer swaps out the
//! whole queue and writes it to the sink outside the lock, so the worker is
//! the only thread doing I/O on that sink.
//!
//! The writer also counts encoded bytes since the last rotation. When the
//! count reaches the configured threshold it is reset and the rotation
//! callback runs on the producer thread before `write` returns.

use super::encoding::{TextCodec, Utf8Codec};
use super::error::{report, PipelineError, Result};
use super::metrics::WriterMetrics;
use super::sink::SharedSink;
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Upper bound on how long an idle worker sleeps before re-checking its queue.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Callback invoked when the byte threshold is crossed.
pub type RotateCallback = Arc<dyn Fn() + Send + Sync>;

/// Rotation threshold in bytes, shared between configuration and writers.
///
/// Clones observe the same value, so changing it affects live writers.
#[derive(Debug, Clone)]
pub struct RotationThreshold(Arc<AtomicU64>);

impl RotationThreshold {
    const DISABLED: u64 = u64::MAX;

    pub fn new(bytes: Option<u64>) -> Self {
        Self(Arc::new(AtomicU64::new(bytes.unwrap_or(Self::DISABLED))))
    }

    pub fn disabled() -> Self {
        Self::new(None)
    }

    pub fn set(&self, bytes: Option<u64>) {
        self.0
            .store(bytes.unwrap_or(Self::DISABLED), Ordering::Relaxed);
    }

    pub fn get(&self) -> Option<u64> {
        match self.0.load(Ordering::Relaxed) {
            Self::DISABLED => None,
            bytes => Some(bytes),
        }
    }
}

impl Default for RotationThreshold {
    fn default() -> Self {
        Self::disabled()
    }
}

/// Options for [`QueueWriter::spawn`]
#[derive(Clone)]
pub struct WriterOptions {
    pub codec: Arc<dyn TextCodec>,
    /// Keep writing queued messages after shutdown was requested
    pub drain_before_exit: bool,
    pub poll_interval: Duration,
    pub threshold: RotationThreshold,
    pub on_rotate: Option<RotateCallback>,
    /// Name of the worker thread
    pub thread_name: String,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            codec: Arc::new(Utf8Codec),
            drain_before_exit: true,
            poll_interval: DEFAULT_POLL_INTERVAL,
            threshold: RotationThreshold::disabled(),
            on_rotate: None,
            thread_name: "log-writer".to_string(),
        }
    }
}

impl WriterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_codec(mut self, codec: Arc<dyn TextCodec>) -> Self {
        self.codec = codec;
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_drain_before_exit(mut self, drain: bool) -> Self {
        self.drain_before_exit = drain;
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_threshold(mut self, threshold: RotationThreshold) -> Self {
        self.threshold = threshold;
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn on_rotate(mut self, callback: RotateCallback) -> Self {
        self.on_rotate = Some(callback);
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }
}

/// One queued line: prefix and body travel together so no other message can
/// land between them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMessage {
    pub prefix: String,
    pub body: String,
}

#[derive(Default)]
struct QueueState {
    pending: Vec<PendingMessage>,
    bytes_since_rotation: u64,
}

struct Shared {
    state: Mutex<QueueState>,
    wakeup: Condvar,
    /// Signalled under `state` each time the worker finishes a batch
    drained: Condvar,
    finish: AtomicBool,
    drain_before_exit: AtomicBool,
    metrics: WriterMetrics,
}

impl Shared {
    fn abandon_requested(&self) -> bool {
        self.finish.load(Ordering::Acquire) && !self.drain_before_exit.load(Ordering::Acquire)
    }
}

pub struct QueueWriter {
    shared: Arc<Shared>,
    codec: Arc<dyn TextCodec>,
    threshold: RotationThreshold,
    on_rotate: Option<RotateCallback>,
    sink_name: String,
    worker: Option<JoinHandle<()>>,
}

impl QueueWriter {
    /// Start a writer and its worker thread for `sink`.
    ///
    /// # Errors
    ///
    /// Returns error if the worker thread cannot be spawned
    pub fn spawn(sink: SharedSink, options: WriterOptions) -> Result<Self> {
        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState::default()),
            wakeup: Condvar::new(),
            drained: Condvar::new(),
            finish: AtomicBool::new(false),
            drain_before_exit: AtomicBool::new(options.drain_before_exit),
            metrics: WriterMetrics::new(),
        });
        let sink_name = sink.lock().name().to_string();

        let worker_shared = Arc::clone(&shared);
        let worker_codec = Arc::clone(&options.codec);
        let poll_interval = options.poll_interval;
        let worker = thread::Builder::new()
            .name(options.thread_name.clone())
            .spawn(move || Self::run(worker_shared, sink, worker_codec, poll_interval))
            .map_err(|e| {
                PipelineError::io_operation(
                    "spawning writer thread",
                    format!("worker for sink '{}'", options.thread_name),
                    e,
                )
            })?;

        Ok(Self {
            shared,
            codec: options.codec,
            threshold: options.threshold,
            on_rotate: options.on_rotate,
            sink_name,
            worker: Some(worker),
        })
    }

    /// Queue one message.
    ///
    /// Returns the number of body bytes accepted: `body.len()`, or 0 once the
    /// writer is closed.
    pub fn write(&self, prefix: &str, body: &str) -> usize {
        let bytes = (self.codec.encoded_len(prefix) + self.codec.encoded_len(body)) as u64;

        let rotate = {
            let mut state = self.shared.state.lock();
            if self.shared.finish.load(Ordering::Acquire) {
                return 0;
            }
            state.pending.push(PendingMessage {
                prefix: prefix.to_string(),
                body: body.to_string(),
            });
            self.shared.metrics.record_enqueued(bytes);

            state.bytes_since_rotation += bytes;
            match (&self.on_rotate, self.threshold.get()) {
                (Some(_), Some(limit)) if state.bytes_since_rotation >= limit => {
                    state.bytes_since_rotation = 0;
                    true
                }
                _ => false,
            }
        };
        self.shared.wakeup.notify_one();

        if rotate {
            if let Some(ref callback) = self.on_rotate {
                self.shared.metrics.record_rotation();
                callback();
            }
        }
        body.len()
    }

    fn run(shared: Arc<Shared>, sink: SharedSink, codec: Arc<dyn TextCodec>, poll: Duration) {
        loop {
            let batch = {
                let mut state = shared.state.lock();
                while state.pending.is_empty() && !shared.finish.load(Ordering::Acquire) {
                    shared.wakeup.wait_for(&mut state, poll);
                }
                if state.pending.is_empty() {
                    break;
                }
                if shared.abandon_requested() {
                    shared.metrics.record_discarded(state.pending.len() as u64);
                    state.pending.clear();
                    shared.drained.notify_all();
                    break;
                }
                std::mem::take(&mut state.pending)
            };

            let total = batch.len();
            for (written, message) in batch.into_iter().enumerate() {
                if shared.abandon_requested() {
                    shared.metrics.record_discarded((total - written) as u64);
                    break;
                }
                Self::write_message(&shared, &sink, codec.as_ref(), &message);
            }

            if let Err(e) = sink.lock().flush() {
                report("ERROR", format_args!("Flushing sink failed: {}", e));
            }
            let _state = shared.state.lock();
            shared.drained.notify_all();
        }

        if let Err(e) = sink.lock().flush() {
            report("ERROR", format_args!("Final flush of sink failed: {}", e));
        }
    }

    fn write_message(
        shared: &Shared,
        sink: &SharedSink,
        codec: &dyn TextCodec,
        message: &PendingMessage,
    ) {
        let mut bytes = codec.encode(&message.prefix);
        bytes.extend(codec.encode(&message.body));

        let result = sink.lock().write_bytes(&bytes);
        let written = match result {
            Ok(n) if n == bytes.len() => n,
            Ok(n) => {
                Self::alert_failure(shared, format_args!("short write: {} of {} bytes", n, bytes.len()));
                n
            }
            Err(e) => {
                Self::alert_failure(shared, format_args!("{}", e));
                0
            }
        };
        shared.metrics.record_written(written as u64);
    }

    /// Report the first failure and every thousandth after it.
    fn alert_failure(shared: &Shared, detail: fmt::Arguments<'_>) {
        let previous = shared.metrics.record_write_failure();
        if previous == 0 || (previous + 1) % 1000 == 0 {
            report(
                "ERROR",
                format_args!("Sink write failed ({} failures so far): {}", previous + 1, detail),
            );
        }
    }

    /// Choose whether queued messages are still written after shutdown was
    /// requested. Takes effect even if shutdown is already in progress.
    pub fn set_drain_before_exit(&self, drain: bool) {
        self.shared.drain_before_exit.store(drain, Ordering::Release);
        self.shared.wakeup.notify_all();
    }

    pub fn drain_before_exit(&self) -> bool {
        self.shared.drain_before_exit.load(Ordering::Acquire)
    }

    /// True once every accepted message has been written or discarded.
    pub fn is_drained(&self) -> bool {
        self.shared.metrics.pending_messages() == 0
    }

    /// Block until the queue is drained or `timeout` elapses.
    pub fn wait_drained(&self, timeout: Duration) -> bool {
        let start = Instant::now();
        let mut state = self.shared.state.lock();
        while !self.is_drained() {
            let left = timeout.saturating_sub(start.elapsed());
            if left.is_zero() || self.worker_exited() {
                return self.is_drained();
            }
            self.shared.drained.wait_for(&mut state, left);
        }
        true
    }

    fn worker_exited(&self) -> bool {
        self.worker.as_ref().map_or(true, JoinHandle::is_finished)
    }

    pub fn is_closed(&self) -> bool {
        self.shared.finish.load(Ordering::Acquire)
    }

    pub fn metrics(&self) -> &WriterMetrics {
        &self.shared.metrics
    }

    pub fn sink_name(&self) -> &str {
        &self.sink_name
    }

    fn request_finish(&self) {
        // Set under the queue lock so a waiting worker cannot miss it
        let _state = self.shared.state.lock();
        self.shared.finish.store(true, Ordering::Release);
        self.shared.wakeup.notify_all();
    }

    /// Stop accepting messages and block until the worker has exited.
    ///
    /// With `drain_before_exit` every queued message is written first.
    pub fn close(&mut self) {
        self.request_finish();
        if let Some(handle) = self.worker.take() {
            // A writer dropped from its own worker thread must not join itself
            if handle.thread().id() == thread::current().id() {
                return;
            }
            if let Err(e) = handle.join() {
                report("ERROR", format_args!("Writer thread panicked during shutdown: {:?}", e));
            }
        }
    }

    /// Like [`close`](Self::close) but gives up waiting after `timeout`.
    ///
    /// Returns `true` if the worker exited within the timeout.
    pub fn shutdown(&mut self, timeout: Duration) -> bool {
        self.request_finish();
        let Some(handle) = self.worker.take() else {
            return true;
        };
        if handle.thread().id() == thread::current().id() {
            return false;
        }

        let start = Instant::now();
        loop {
            if handle.is_finished() {
                if let Err(e) = handle.join() {
                    report("ERROR", format_args!("Writer thread panicked during shutdown: {:?}", e));
                    return false;
                }
                return true;
            }

            if start.elapsed() >= timeout {
                report(
                    "WARNING",
                    format_args!(
                        "Writer for '{}' did not finish within {:?}. Some messages may be lost.",
                        self.sink_name, timeout
                    ),
                );
                // Put the handle back so Drop still waits for the worker
                self.worker = Some(handle);
                return false;
            }

            thread::sleep(Duration::from_millis(1));
        }
    }
}

impl Drop for QueueWriter {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for QueueWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueWriter")
            .field("sink", &self.sink_name)
            .field("codec", &self.codec.name())
            .field("threshold", &self.threshold.get())
            .field("closed", &self.is_closed())
            .finish()
    }
}
