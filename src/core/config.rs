//! Pipeline configuration
//!
//! `PipelineConfig` is plain data and can be deserialized, so a pipeline can
//! be described in a JSON document:
//!
//! ```
//! use rust_log_pipeline::{Encoding, ModifierKind, PipelineConfig};
//!
//! let config = PipelineConfig::from_json(
//!     r#"{
//!         "rotation_threshold": 1048576,
//!         "modifiers": ["date_time", { "fixed": "[svc] " }],
//!         "encoding": "utf16-le"
//!     }"#,
//! )
//! .unwrap();
//!
//! assert_eq!(config.rotation_threshold, Some(1_048_576));
//! assert_eq!(config.modifiers[0], ModifierKind::DateTime);
//! assert_eq!(config.encoding, Encoding::Utf16Le);
//! assert!(config.drain_before_exit);
//! ```

use super::encoding::Encoding;
use super::error::{PipelineError, Result};
use super::line_bridge::DEFAULT_LINE_CAPACITY;
use super::modifier::ModifierKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_POLL_INTERVAL_MS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Base name of the shared output file; console when unset
    pub shared_output: Option<PathBuf>,

    /// Bytes written to one shared output file before a new one is opened
    pub rotation_threshold: Option<u64>,

    /// Prefix of per-thread output files; the thread id is appended
    pub thread_output_prefix: Option<PathBuf>,

    /// Modifiers run in front of the indentation and thread name
    pub modifiers: Vec<ModifierKind>,

    /// Write every queued line before a writer shuts down
    pub drain_before_exit: bool,

    /// Stream buffer capacity in characters, 0 for the default
    pub line_capacity: usize,

    /// Longest time an idle writer sleeps between queue checks
    pub poll_interval_ms: u64,

    pub encoding: Encoding,

    /// Start with shared-channel output enabled
    pub enabled: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            shared_output: None,
            rotation_threshold: None,
            thread_output_prefix: None,
            modifiers: Vec::new(),
            drain_before_exit: true,
            line_capacity: DEFAULT_LINE_CAPACITY,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            encoding: Encoding::default(),
            enabled: true,
        }
    }
}

impl PipelineConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns error if the JSON is malformed or the values are invalid
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns error for a zero rotation threshold, a zero poll interval, or
    /// an empty output path
    pub fn validate(&self) -> Result<()> {
        if self.rotation_threshold == Some(0) {
            return Err(PipelineError::config(
                "rotation_threshold",
                "must be positive; leave unset to disable rotation",
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(PipelineError::config("poll_interval_ms", "must be positive"));
        }
        if self
            .shared_output
            .as_ref()
            .is_some_and(|p| p.as_os_str().is_empty())
        {
            return Err(PipelineError::config("shared_output", "path is empty"));
        }
        if self
            .thread_output_prefix
            .as_ref()
            .is_some_and(|p| p.as_os_str().is_empty())
        {
            return Err(PipelineError::config("thread_output_prefix", "path is empty"));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
