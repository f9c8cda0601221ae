//! Severity definitions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Message severity, ordered from most to least severe.
///
/// A lower ordinal is more severe, so a severity is enabled when
/// `wanted <= effective_level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[derive(Default)]
pub enum Severity {
    Error = 0,
    Warn = 1,
    #[default]
    Info = 2,
    Trace = 3,
    Dump = 4,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Severity::Error,
        Severity::Warn,
        Severity::Info,
        Severity::Trace,
        Severity::Dump,
    ];

    pub fn to_str(&self) -> &'static str {
        match self {
            Severity::Error => "ERROR",
            Severity::Warn => "WARN",
            Severity::Info => "INFO",
            Severity::Trace => "TRACE",
            Severity::Dump => "DUMP",
        }
    }

    /// Text written in front of a severity-gated line. Info lines carry no label.
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Error => "ERROR: ",
            Severity::Warn => "WARN: ",
            Severity::Info => "",
            Severity::Trace => "TRACE: ",
            Severity::Dump => "DUMP: ",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ERROR" => Ok(Severity::Error),
            "WARN" | "WARNING" => Ok(Severity::Warn),
            "INFO" => Ok(Severity::Info),
            "TRACE" => Ok(Severity::Trace),
            "DUMP" => Ok(Severity::Dump),
            _ => Err(format!("Invalid severity: '{}'", s)),
        }
    }
}
