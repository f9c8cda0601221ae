//! Writer metrics for observability
//!
//! Counters describing what a queue writer accepted, wrote, lost and how
//! often it triggered a rotation.

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for one queue writer
///
/// # Example
///
/// ```
/// use rust_log_pipeline::WriterMetrics;
///
/// let metrics = WriterMetrics::new();
/// metrics.record_enqueued(12);
/// metrics.record_written(12);
///
/// assert_eq!(metrics.messages_enqueued(), 1);
/// assert_eq!(metrics.bytes_written(), 12);
/// assert_eq!(metrics.pending_messages(), 0);
/// ```
#[derive(Debug)]
pub struct WriterMetrics {
    /// Messages accepted by `write`
    messages_enqueued: AtomicU64,

    /// Encoded bytes accepted by `write`
    bytes_enqueued: AtomicU64,

    /// Messages fully handed to the sink
    messages_written: AtomicU64,

    /// Bytes the sink reported as written
    bytes_written: AtomicU64,

    /// Messages abandoned by an abrupt shutdown
    messages_discarded: AtomicU64,

    /// Sink writes that failed or came up short
    write_failures: AtomicU64,

    /// Rotation callbacks triggered by the byte threshold
    rotations: AtomicU64,
}

impl WriterMetrics {
    /// Create a new metrics instance with all counters at zero
    pub const fn new() -> Self {
        Self {
            messages_enqueued: AtomicU64::new(0),
            bytes_enqueued: AtomicU64::new(0),
            messages_written: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
            messages_discarded: AtomicU64::new(0),
            write_failures: AtomicU64::new(0),
            rotations: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn messages_enqueued(&self) -> u64 {
        self.messages_enqueued.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn bytes_enqueued(&self) -> u64 {
        self.bytes_enqueued.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn messages_written(&self) -> u64 {
        self.messages_written.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn messages_discarded(&self) -> u64 {
        self.messages_discarded.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn write_failures(&self) -> u64 {
        self.write_failures.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn rotations(&self) -> u64 {
        self.rotations.load(Ordering::Relaxed)
    }

    /// Messages accepted but neither written nor discarded yet
    pub fn pending_messages(&self) -> u64 {
        self.messages_enqueued()
            .saturating_sub(self.messages_written() + self.messages_discarded())
    }

    #[inline]
    pub fn record_enqueued(&self, bytes: u64) {
        self.messages_enqueued.fetch_add(1, Ordering::Relaxed);
        self.bytes_enqueued.fetch_add(bytes, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_written(&self, bytes: u64) {
        self.messages_written.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_discarded(&self, count: u64) {
        self.messages_discarded.fetch_add(count, Ordering::Relaxed);
    }

    /// Record a failed write; returns the previous failure count
    #[inline]
    pub fn record_write_failure(&self) -> u64 {
        self.write_failures.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_rotation(&self) {
        self.rotations.fetch_add(1, Ordering::Relaxed);
    }
}

impl Default for WriterMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for WriterMetrics {
    /// Create a snapshot of the current metrics values
    fn clone(&self) -> Self {
        Self {
            messages_enqueued: AtomicU64::new(self.messages_enqueued()),
            bytes_enqueued: AtomicU64::new(self.bytes_enqueued()),
            messages_written: AtomicU64::new(self.messages_written()),
            bytes_written: AtomicU64::new(self.bytes_written()),
            messages_discarded: AtomicU64::new(self.messages_discarded()),
            write_failures: AtomicU64::new(self.write_failures()),
            rotations: AtomicU64::new(self.rotations()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = WriterMetrics::new();
        assert_eq!(metrics.messages_enqueued(), 0);
        assert_eq!(metrics.bytes_written(), 0);
        assert_eq!(metrics.write_failures(), 0);
        assert_eq!(metrics.rotations(), 0);
    }

    #[test]
    fn test_pending_messages() {
        let metrics = WriterMetrics::new();
        for _ in 0..5 {
            metrics.record_enqueued(10);
        }
        metrics.record_written(10);
        metrics.record_discarded(2);
        assert_eq!(metrics.pending_messages(), 2);
        assert_eq!(metrics.bytes_enqueued(), 50);
    }

    #[test]
    fn test_record_write_failure_returns_previous() {
        let metrics = WriterMetrics::new();
        assert_eq!(metrics.record_write_failure(), 0);
        assert_eq!(metrics.record_write_failure(), 1);
        assert_eq!(metrics.write_failures(), 2);
    }

    #[test]
    fn test_metrics_clone() {
        let metrics = WriterMetrics::new();
        metrics.record_rotation();
        let snapshot = metrics.clone();
        metrics.record_rotation();
        assert_eq!(snapshot.rotations(), 1);
        assert_eq!(metrics.rotations(), 2);
    }
}
