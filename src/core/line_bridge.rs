//! Character stream to line message bridge
//!
//! [`LogStream`] collects characters in a fixed-capacity buffer and hands the
//! buffer to a [`LineTarget`] as one unit, either when it fills up or when the
//! caller syncs. One unit becomes one queued message, so text written between
//! two syncs is never interleaved with another thread's output.
//!
//! ```
//! use rust_log_pipeline::{LineTarget, LogStream};
//! use parking_lot::Mutex;
//! use std::sync::Arc;
//!
//! #[derive(Default)]
//! struct Collect(Mutex<Vec<String>>);
//!
//! impl LineTarget for Collect {
//!     fn write_line(&self, text: &str) -> usize {
//!         self.0.lock().push(text.to_string());
//!         text.len()
//!     }
//! }
//!
//! let target = Arc::new(Collect::default());
//! let mut stream = LogStream::new(target.clone());
//! stream.line("hello");
//! assert_eq!(*target.0.lock(), vec!["hello\n".to_string()]);
//! ```

use std::fmt;
use std::io;
use std::sync::Arc;

/// Default buffer capacity in characters.
pub const DEFAULT_LINE_CAPACITY: usize = 4096;

/// Receiver of complete units of text.
pub trait LineTarget: Send + Sync {
    /// Write `text` as one unit and return how many of its bytes were taken.
    /// Anything less than `text.len()` is a short write.
    fn write_line(&self, text: &str) -> usize;
}

pub struct LogStream {
    target: Arc<dyn LineTarget>,
    buffer: String,
    chars: usize,
    capacity: usize,
    broken: bool,
    /// Trailing bytes of an incomplete UTF-8 sequence from `io::Write`
    partial: Vec<u8>,
}

impl LogStream {
    pub fn new(target: Arc<dyn LineTarget>) -> Self {
        Self::with_capacity(target, DEFAULT_LINE_CAPACITY)
    }

    /// Create a stream whose buffer holds `capacity` characters, the last
    /// slot being reserved for the character that triggers an overflow.
    /// A capacity of 0 selects [`DEFAULT_LINE_CAPACITY`].
    pub fn with_capacity(target: Arc<dyn LineTarget>, capacity: usize) -> Self {
        let capacity = if capacity == 0 {
            DEFAULT_LINE_CAPACITY
        } else {
            capacity
        };
        Self {
            target,
            buffer: String::new(),
            chars: 0,
            capacity,
            broken: false,
            partial: Vec::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Characters waiting for the next sync.
    pub fn pending_chars(&self) -> usize {
        self.chars
    }

    /// True after the target reported a short write. Output is dropped until
    /// [`reset`](Self::reset).
    pub fn is_broken(&self) -> bool {
        self.broken
    }

    /// Clear the broken state and any buffered text.
    pub fn reset(&mut self) {
        self.broken = false;
        self.buffer.clear();
        self.chars = 0;
        self.partial.clear();
    }

    /// Append text, handing full buffers to the target as they fill.
    pub fn write_text(&mut self, text: &str) {
        let mut rest = text;
        while !rest.is_empty() && !self.broken {
            let room = self.capacity - 1 - self.chars;
            match rest.char_indices().nth(room) {
                None => {
                    self.buffer.push_str(rest);
                    self.chars += rest.chars().count();
                    return;
                }
                Some((idx, overflow)) => {
                    // The reserved slot takes the overflowing character
                    self.buffer.push_str(&rest[..idx]);
                    self.buffer.push(overflow);
                    self.chars += room + 1;
                    self.hand_off();
                    rest = &rest[idx + overflow.len_utf8()..];
                }
            }
        }
    }

    /// Hand the buffered text to the target as one unit. No-op when empty.
    ///
    /// Returns `false` if the stream is broken.
    pub fn sync(&mut self) -> bool {
        if !self.broken && !self.buffer.is_empty() {
            self.hand_off();
        }
        !self.broken
    }

    /// Write `text` followed by a newline and sync.
    pub fn line(&mut self, text: &str) -> bool {
        self.write_text(text);
        self.write_text("\n");
        self.sync()
    }

    fn hand_off(&mut self) {
        let accepted = self.target.write_line(&self.buffer);
        if accepted != self.buffer.len() {
            self.broken = true;
        }
        self.buffer.clear();
        self.chars = 0;
    }

    /// Decode as much of `partial` as forms complete UTF-8.
    fn decode_partial(&mut self) {
        let mut start = 0;
        loop {
            match std::str::from_utf8(&self.partial[start..]) {
                Ok(valid) => {
                    let valid = valid.to_string();
                    self.write_text(&valid);
                    self.partial.clear();
                    return;
                }
                Err(e) => {
                    let good = start + e.valid_up_to();
                    let valid = String::from_utf8_lossy(&self.partial[start..good]).into_owned();
                    self.write_text(&valid);
                    match e.error_len() {
                        Some(bad) => {
                            self.write_text("\u{FFFD}");
                            start = good + bad;
                        }
                        None => {
                            // Incomplete sequence: keep it for the next write
                            self.partial.drain(..good);
                            return;
                        }
                    }
                }
            }
        }
    }
}

impl fmt::Write for LogStream {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        // Dropped silently when broken
        self.write_text(s);
        Ok(())
    }
}

impl io::Write for LogStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.partial.extend_from_slice(buf);
        self.decode_partial();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sync();
        Ok(())
    }
}

impl Drop for LogStream {
    fn drop(&mut self) {
        self.sync();
    }
}

impl fmt::Debug for LogStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogStream")
            .field("capacity", &self.capacity)
            .field("pending_chars", &self.chars)
            .field("broken", &self.broken)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        units: Mutex<Vec<String>>,
        /// Accept at most this many bytes per unit
        limit: Option<usize>,
    }

    impl Recorder {
        fn units(&self) -> Vec<String> {
            self.units.lock().clone()
        }
    }

    impl LineTarget for Recorder {
        fn write_line(&self, text: &str) -> usize {
            self.units.lock().push(text.to_string());
            self.limit.map_or(text.len(), |l| l.min(text.len()))
        }
    }

    #[test]
    fn test_sync_hands_off_one_unit() {
        let target = Arc::new(Recorder::default());
        let mut stream = LogStream::new(target.clone());
        stream.write_text("Msg ");
        stream.write_text("about ");
        stream.write_text("something\n");
        assert!(target.units().is_empty());
        assert!(stream.sync());
        assert_eq!(target.units(), vec!["Msg about something\n"]);
    }

    #[test]
    fn test_empty_sync_is_noop() {
        let target = Arc::new(Recorder::default());
        let mut stream = LogStream::new(target.clone());
        assert!(stream.sync());
        assert!(target.units().is_empty());
    }

    #[test]
    fn test_overflow_includes_triggering_char() {
        let target = Arc::new(Recorder::default());
        let mut stream = LogStream::with_capacity(target.clone(), 4);
        stream.write_text("abc");
        assert!(target.units().is_empty());
        assert_eq!(stream.pending_chars(), 3);

        stream.write_text("defghij");
        assert_eq!(target.units(), vec!["abcd", "efgh"]);
        assert_eq!(stream.pending_chars(), 2);
        stream.sync();
        assert_eq!(target.units(), vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn test_overflow_counts_chars_not_bytes() {
        let target = Arc::new(Recorder::default());
        let mut stream = LogStream::with_capacity(target.clone(), 3);
        stream.write_text("жжжж");
        assert_eq!(target.units(), vec!["жжж"]);
        assert_eq!(stream.pending_chars(), 1);
    }

    #[test]
    fn test_short_write_breaks_stream_until_reset() {
        let target = Arc::new(Recorder {
            units: Mutex::default(),
            limit: Some(2),
        });
        let mut stream = LogStream::new(target.clone());
        assert!(!stream.line("first"));
        assert!(stream.is_broken());

        stream.line("dropped");
        assert_eq!(target.units(), vec!["first\n"]);

        stream.reset();
        assert!(!stream.is_broken());
        stream.write_text("ok");
        stream.sync();
        assert_eq!(target.units(), vec!["first\n", "ok"]);
    }

    #[test]
    fn test_drop_syncs_pending_text() {
        let target = Arc::new(Recorder::default());
        {
            let mut stream = LogStream::new(target.clone());
            stream.write_text("tail");
        }
        assert_eq!(target.units(), vec!["tail"]);
    }

    #[test]
    fn test_io_write_joins_split_utf8() {
        use std::io::Write;
        let target = Arc::new(Recorder::default());
        let mut stream = LogStream::new(target.clone());
        let bytes = "ш!".as_bytes();
        stream.write_all(&bytes[..1]).unwrap();
        stream.write_all(&bytes[1..]).unwrap();
        stream.write_all(&[0xFF, b'\n']).unwrap();
        stream.flush().unwrap();
        assert_eq!(target.units(), vec!["ш!\u{FFFD}\n"]);
    }

    #[test]
    fn test_fmt_write() {
        use std::fmt::Write;
        let target = Arc::new(Recorder::default());
        let mut stream = LogStream::new(target.clone());
        writeln!(stream, "value = {}", 42).unwrap();
        stream.sync();
        assert_eq!(target.units(), vec!["value = 42\n"]);
    }
}
