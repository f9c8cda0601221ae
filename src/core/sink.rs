//! Sink trait for byte output destinations

use parking_lot::Mutex;
use std::io;
use std::sync::Arc;

pub trait Sink: Send {
    /// Write as much of `data` as possible and report how many bytes were taken.
    fn write_bytes(&mut self, data: &[u8]) -> io::Result<usize>;
    fn flush(&mut self) -> io::Result<()>;
    fn name(&self) -> &str;
}

/// Shared handle to an open sink.
///
/// Writers hold a clone for as long as they may still write, so a sink that
/// is swapped out stays open until its last writer has drained.
pub type SharedSink = Arc<Mutex<Box<dyn Sink>>>;

pub fn shared<S: Sink + 'static>(sink: S) -> SharedSink {
    Arc::new(Mutex::new(Box::new(sink)))
}
