//! Shared types for vigil
//!
//! This crate contains data structures used across multiple vigil crates:
//! classified log events, the transient status/error facts derived from
//! them, presence indicators, and the injectable clock.

use std::sync::Arc;

use chrono::{Local, NaiveDateTime};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Outward-facing timestamp format (second precision, no milliseconds).
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ============================================================================
// Presence Types
// ============================================================================

/// Coarse presence mode shown alongside the status message
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Indicator {
    /// Normal availability (empty "show" value on the wire)
    #[default]
    Available,
    Away,
    ExtendedAway,
    DoNotDisturb,
}

impl Indicator {
    /// Parse an indicator from its wire form
    pub fn from_str(s: &str) -> Self {
        match s {
            "away" => Self::Away,
            "xa" => Self::ExtendedAway,
            "dnd" => Self::DoNotDisturb,
            _ => Self::Available,
        }
    }

    /// Wire form of this indicator
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "",
            Self::Away => "away",
            Self::ExtendedAway => "xa",
            Self::DoNotDisturb => "dnd",
        }
    }
}

// ============================================================================
// Log Types
// ============================================================================

/// Severity of a classified log entry
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Error,
    /// Any other header level; the entry is still a valid boundary but
    /// updates no fact
    #[default]
    Unknown,
}

impl LogLevel {
    /// Parse the level field of an entry header. Matching is exact: the
    /// dialects emit uppercase level names.
    pub fn from_str(s: &str) -> Self {
        match s {
            "INFO" => Self::Info,
            "ERROR" => Self::Error,
            _ => Self::Unknown,
        }
    }
}

/// One classified, timestamped log record
#[derive(Clone, Debug, PartialEq)]
pub struct LogEvent {
    /// Entry timestamp, to the second
    pub timestamp: NaiveDateTime,

    /// Severity extracted from the entry header
    pub level: LogLevel,

    /// Message payload (text after the header fields)
    pub message: String,
}

// ============================================================================
// Fact Types
// ============================================================================

/// The most recent INFO-level fact extracted from a source. Never expires.
#[derive(Clone, Debug, PartialEq)]
pub struct StatusFact {
    pub message: String,
    pub timestamp: NaiveDateTime,
}

impl StatusFact {
    pub fn new(message: impl Into<String>, timestamp: NaiveDateTime) -> Self {
        Self {
            message: message.into(),
            timestamp,
        }
    }

    /// Timestamp rendered in the outward display format
    pub fn time(&self) -> String {
        self.timestamp.format(TIME_FORMAT).to_string()
    }
}

/// The most recent ERROR-level fact extracted from a source, with expiry
#[derive(Clone, Debug, PartialEq)]
pub struct ErrorFact {
    pub message: String,
    pub timestamp: NaiveDateTime,
    /// Seconds after which this fact stops being reported
    pub expiry_secs: i64,
}

impl ErrorFact {
    pub fn new(message: impl Into<String>, timestamp: NaiveDateTime, expiry_secs: i64) -> Self {
        Self {
            message: message.into(),
            timestamp,
            expiry_secs,
        }
    }

    /// Timestamp rendered in the outward display format
    pub fn time(&self) -> String {
        self.timestamp.format(TIME_FORMAT).to_string()
    }

    /// True once `now` is more than `expiry_secs` past the fact's timestamp
    pub fn expired(&self, now: NaiveDateTime) -> bool {
        (now - self.timestamp).num_seconds() > self.expiry_secs
    }
}

// ============================================================================
// Clock
// ============================================================================

/// Injectable time source. All expiry math is recomputed against this on
/// each access; nothing in the core runs on timers.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Wall-clock time in the local timezone
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Settable clock for deterministic tests
#[derive(Clone)]
pub struct ManualClock(Arc<Mutex<NaiveDateTime>>);

impl ManualClock {
    pub fn starting_at(now: NaiveDateTime) -> Self {
        Self(Arc::new(Mutex::new(now)))
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.0.lock() = now;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.0.lock()
    }
}
