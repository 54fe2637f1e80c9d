use chrono::NaiveDateTime;

use vigil_types::{LogEvent, LogLevel};

/// Timestamp format of the structured dialect's entry headers
const STRUCTURED_TIME: &str = "%Y-%m-%d %H:%M:%S";

/// Timestamp format inside web access-log request lines
const ACCESS_TIME: &str = "%d/%b/%Y:%H:%M:%S";

/// Timestamp format inside web error-log lines
const ERROR_TIME: &str = "%a %b %d %H:%M:%S %Y";

/// Turns one raw text line into a structured event.
///
/// Implementations cover one log dialect each and are injected per watched
/// source. A line that fails classification is a continuation of the entry
/// above it, never an error.
pub trait LineClassifier: Send {
    /// Classify a physical line. `None` means the line is not an entry
    /// header.
    fn classify(&self, line: &str) -> Option<LogEvent>;
}

/// Parser for the canonical `timestamp,millis - source - LEVEL - message`
/// dialect.
#[derive(Clone, Copy, Debug, Default)]
pub struct StructuredClassifier;

impl LineClassifier for StructuredClassifier {
    fn classify(&self, line: &str) -> Option<LogEvent> {
        // Exactly four " - "-separated fields; a message containing the
        // separator makes the line a continuation, as in the dialect.
        let parts: Vec<&str> = line.split(" - ").collect();
        let &[header, _source, level, message] = parts.as_slice() else {
            return None;
        };
        let stamp = header.split(',').next()?;
        let timestamp = NaiveDateTime::parse_from_str(stamp, STRUCTURED_TIME).ok()?;
        Some(LogEvent {
            timestamp,
            level: LogLevel::from_str(level),
            message: message.to_string(),
        })
    }
}

/// Which web-server log shape a [`WebLogClassifier`] expects
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WebLogKind {
    /// `[DD/Mon/YYYY:HH:MM:SS ...] "..."` request lines, classified INFO
    Access,
    /// `[Dow Mon DD HH:MM:SS YYYY] ... ] ... ]` lines, classified ERROR
    Error,
}

/// Parser for web-server access and error logs
#[derive(Clone, Copy, Debug)]
pub struct WebLogClassifier {
    kind: WebLogKind,
}

impl WebLogClassifier {
    pub fn new(kind: WebLogKind) -> Self {
        Self { kind }
    }
}

impl LineClassifier for WebLogClassifier {
    fn classify(&self, line: &str) -> Option<LogEvent> {
        match self.kind {
            WebLogKind::Access => {
                let field = line.split_whitespace().nth(3)?;
                let stamp = field.trim_start_matches('[');
                let timestamp = NaiveDateTime::parse_from_str(stamp, ACCESS_TIME).ok()?;
                let message = line.split(']').nth(1)?.to_string();
                Some(LogEvent {
                    timestamp,
                    level: LogLevel::Info,
                    message,
                })
            }
            WebLogKind::Error => {
                let head = line.split(']').next()?;
                let stamp = head.trim_start_matches('[');
                let timestamp = NaiveDateTime::parse_from_str(stamp, ERROR_TIME).ok()?;
                let message = line.split(']').nth(3)?.to_string();
                Some(LogEvent {
                    timestamp,
                    level: LogLevel::Error,
                    message,
                })
            }
        }
    }
}
