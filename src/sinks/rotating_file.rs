//! Timestamped file naming for rotated outputs
//!
//! Every (re)opened shared output gets a fresh file named
//! `<base>-<YYMMDD>-<HHMMSS>.<micros>`. When that name is already taken a
//! `0` is appended until it is free.

use super::file::FileSink;
use crate::core::{PipelineError, Result};
use chrono::{DateTime, Local};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the file opened for `base` at instant `at`.
///
/// # Examples
///
/// ```
/// use rust_log_pipeline::sinks::rotating_file::timestamped_path;
/// use chrono::{Local, TimeZone};
/// use std::path::{Path, PathBuf};
///
/// let at = Local.with_ymd_and_hms(2025, 1, 8, 10, 30, 45).unwrap();
/// assert_eq!(
///     timestamped_path(Path::new("logs/app"), &at),
///     PathBuf::from("logs/app-250108-103045.000000")
/// );
/// ```
#[must_use]
pub fn timestamped_path(base: &Path, at: &DateTime<Local>) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    name.push(at.format("-%y%m%d-%H%M%S%.6f").to_string());
    PathBuf::from(name)
}

/// Append `0` to `candidate` until no file of that name exists.
#[must_use]
pub fn unique_path(candidate: PathBuf) -> PathBuf {
    let mut name = candidate.into_os_string();
    while Path::new(&name).exists() {
        name.push("0");
    }
    PathBuf::from(name)
}

/// Open a new, uniquely named file for `base`.
///
/// # Errors
///
/// Returns error if the parent directory or the file cannot be created
pub fn open_timestamped(base: &Path) -> Result<FileSink> {
    if let Some(parent) = base.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            PipelineError::io_operation(
                "create log directory",
                format!("Failed to create directory '{}'", parent.display()),
                e,
            )
        })?;
    }

    let path = unique_path(timestamped_path(base, &Local::now()));
    FileSink::create(path)
}
