//! Console sink writing to the process's diagnostic stream

use crate::core::Sink;
use std::io::{self, Write};

#[derive(Debug, Default)]
pub struct ConsoleSink;

impl ConsoleSink {
    pub fn new() -> Self {
        Self
    }
}

impl Sink for ConsoleSink {
    fn write_bytes(&mut self, data: &[u8]) -> io::Result<usize> {
        io::stderr().lock().write_all(data)?;
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }

    fn name(&self) -> &str {
        "console"
    }
}
