//! File sink implementation

use crate::core::{PipelineError, Result, Sink};
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Sink writing to a file that is truncated when opened.
///
/// With the `file` feature the file is also locked exclusively, so two
/// writers in different pipelines or processes never share it.
pub struct FileSink {
    path: PathBuf,
    name: String,
    writer: Option<BufWriter<File>>,
}

impl FileSink {
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| {
                PipelineError::sink_open(path.display().to_string(), format!("Failed to open: {}", e))
            })?;

        #[cfg(feature = "file")]
        {
            use fs2::FileExt;
            file.try_lock_exclusive()
                .map_err(|_| PipelineError::file_lock(path.display().to_string()))?;
        }

        // Truncate only once the file is ours
        file.set_len(0).map_err(|e| {
            PipelineError::io_operation("truncating log file", path.display().to_string(), e)
        })?;

        Ok(Self {
            name: path.display().to_string(),
            path,
            writer: Some(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Sink for FileSink {
    fn write_bytes(&mut self, data: &[u8]) -> io::Result<usize> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "file sink closed"))?;
        writer.write_all(data)?;
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Some(ref mut writer) = self.writer {
            writer.flush()?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for FileSink {
    fn drop(&mut self) {
        // Flush and release the handle (and its lock) right away
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.flush();
        }
    }
}
