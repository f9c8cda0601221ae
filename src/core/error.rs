//! Error types for the logging pipeline

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// IO error with context
    #[error("IO error while {operation}: {message}")]
    IoOperation {
        operation: String,
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// JSON configuration error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// A sink could not be opened
    #[error("Cannot open sink '{path}': {message}")]
    SinkOpen { path: String, message: String },

    /// File rotation error
    #[error("File rotation failed for '{path}': {message}")]
    Rotation { path: String, message: String },

    /// File lock error
    #[error("Failed to acquire file lock on '{path}'")]
    FileLock { path: String },

    /// Invalid configuration with details
    #[error("Invalid configuration for {component}: {message}")]
    InvalidConfiguration { component: String, message: String },

    /// Writer already closed
    #[error("Queue writer already closed")]
    WriterClosed,
}

impl PipelineError {
    /// Create an IO operation error with context
    pub fn io_operation(
        operation: impl Into<String>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        PipelineError::IoOperation {
            operation: operation.into(),
            message: message.into(),
            source,
        }
    }

    pub fn sink_open(path: impl Into<String>, message: impl Into<String>) -> Self {
        PipelineError::SinkOpen {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn rotation(path: impl Into<String>, message: impl Into<String>) -> Self {
        PipelineError::Rotation {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn file_lock(path: impl Into<String>) -> Self {
        PipelineError::FileLock { path: path.into() }
    }

    /// Create an invalid configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        PipelineError::InvalidConfiguration {
            component: component.into(),
            message: message.into(),
        }
    }
}

/// Report an internal failure on stderr as `[LOGGER <tag>] <message>`.
///
/// Unlike `eprintln!` this never panics when stderr is unusable.
pub(crate) fn report(tag: &str, message: std::fmt::Arguments<'_>) {
    use std::io::Write;
    let _ = writeln!(std::io::stderr(), "[LOGGER {}] {}", tag, message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = PipelineError::config("PipelineConfig", "line capacity too small");
        assert!(matches!(err, PipelineError::InvalidConfiguration { .. }));

        let err = PipelineError::sink_open("/var/log/app.log", "Permission denied");
        assert!(matches!(err, PipelineError::SinkOpen { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = PipelineError::rotation("/var/log/app.log", "Disk full");
        assert_eq!(
            err.to_string(),
            "File rotation failed for '/var/log/app.log': Disk full"
        );

        let err = PipelineError::file_lock("/tmp/t.log");
        assert_eq!(err.to_string(), "Failed to acquire file lock on '/tmp/t.log'");

        assert_eq!(
            PipelineError::WriterClosed.to_string(),
            "Queue writer already closed"
        );
    }

    #[test]
    fn test_io_operation_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = PipelineError::io_operation("opening log file", "cannot create file", io_err);

        assert!(matches!(err, PipelineError::IoOperation { .. }));
        assert!(err.to_string().contains("opening log file"));
        assert!(err.to_string().contains("cannot create file"));
    }

    #[test]
    fn test_io_failures_keep_operation_context() {
        use std::error::Error;

        // A directory that cannot be created is reported with the failed operation
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();
        let err = crate::sinks::rotating_file::open_timestamped(&blocker.join("sub").join("app"))
            .err()
            .expect("directory creation must fail");
        assert!(matches!(err, PipelineError::IoOperation { .. }));
        assert!(err.to_string().contains("create log directory"));
        assert!(err.source().is_some());
    }
}
