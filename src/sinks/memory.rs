//! In-memory sink
//!
//! Collects written bytes in a shared buffer. Mostly useful for tests and for
//! capturing output of a pipeline inside the process.

use crate::core::Sink;
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    buffer: Arc<Mutex<Vec<u8>>>,
    capacity: Option<usize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink that accepts at most `capacity` bytes in total and reports short
    /// writes after that.
    pub fn with_capacity_limit(capacity: usize) -> Self {
        Self {
            buffer: Arc::default(),
            capacity: Some(capacity),
        }
    }

    /// Copy of everything written so far.
    pub fn contents(&self) -> Vec<u8> {
        self.buffer.lock().clone()
    }

    /// Contents decoded as UTF-8, with invalid sequences replaced.
    pub fn contents_lossy(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock()).into_owned()
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.lock().is_empty()
    }
}

impl Sink for MemorySink {
    fn write_bytes(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut buffer = self.buffer.lock();
        let take = match self.capacity {
            Some(cap) => data.len().min(cap.saturating_sub(buffer.len())),
            None => data.len(),
        };
        buffer.extend_from_slice(&data[..take]);
        Ok(take)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
