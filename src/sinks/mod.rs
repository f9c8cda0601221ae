//! Sink implementations

pub mod console;
pub mod file;
pub mod memory;
pub mod rotating_file;

pub use console::ConsoleSink;
pub use file::FileSink;
pub use memory::MemorySink;

// Re-export trait for convenience
pub use crate::core::Sink;
