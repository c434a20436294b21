//! Trace levels
//!
//! Five ordered severities and the rule deciding whether a message is emitted.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Severity of a log call, ordered `Debug < Info < Warning < Error < Fatal`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceLevel {
    Debug = 1,
    Info = 2,
    Warning = 3,
    Error = 4,
    Fatal = 5,
}

impl TraceLevel {
    /// All levels in ascending order
    pub const ALL: [TraceLevel; 5] = [
        TraceLevel::Debug,
        TraceLevel::Info,
        TraceLevel::Warning,
        TraceLevel::Error,
        TraceLevel::Fatal,
    ];

    /// Numeric rank of this level
    pub fn rank(self) -> u8 {
        self as u8
    }

    /// Tag written between brackets in a log line
    pub fn tag(self) -> &'static str {
        match self {
            TraceLevel::Debug => "Debug",
            TraceLevel::Info => "Info",
            TraceLevel::Warning => "Warning",
            TraceLevel::Error => "Error",
            TraceLevel::Fatal => "Fatal",
        }
    }

    /// Whether a logger configured at `self` emits a message at `message_level`
    pub fn allows(self, message_level: TraceLevel) -> bool {
        should_emit(self, message_level)
    }

    /// Look up a level by its numeric rank
    pub fn from_rank(rank: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|level| level.rank() == rank)
    }
}

impl Default for TraceLevel {
    fn default() -> Self {
        TraceLevel::Debug
    }
}

impl fmt::Display for TraceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Error returned when a string does not name a trace level
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown trace level '{0}' (expected debug, info, warning, error, fatal or 1-5)")]
pub struct ParseLevelError(String);

impl FromStr for TraceLevel {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(rank) = trimmed.parse::<u8>() {
            return Self::from_rank(rank).ok_or_else(|| ParseLevelError(s.to_string()));
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "debug" => Ok(TraceLevel::Debug),
            "info" => Ok(TraceLevel::Info),
            "warning" | "warn" => Ok(TraceLevel::Warning),
            "error" => Ok(TraceLevel::Error),
            "fatal" => Ok(TraceLevel::Fatal),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

/// True iff `message_level` is at or above `logger_level`
pub fn should_emit(logger_level: TraceLevel, message_level: TraceLevel) -> bool {
    message_level.rank() >= logger_level.rank()
}
