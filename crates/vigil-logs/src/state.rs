use chrono::NaiveDateTime;

use vigil_types::{ErrorFact, LogEvent, LogLevel, StatusFact};

/// Transient per-source facts derived from classified log lines.
///
/// `status` holds the most recent INFO entry and never expires; `error`
/// holds the most recent ERROR entry and stops being reported once its
/// expiry window has passed. Expiry is a pure function of the fact and
/// the caller's clock; [`SourceState::sweep`] drops the stale fact once
/// per scheduling cycle.
#[derive(Debug, Default)]
pub struct SourceState {
    status: Option<StatusFact>,
    error: Option<ErrorFact>,
}

impl SourceState {
    /// Fold one classified event into the current facts. Levels other
    /// than INFO and ERROR leave the facts untouched.
    pub fn apply(&mut self, event: LogEvent, error_timeout: i64) {
        match event.level {
            LogLevel::Error => {
                self.error = Some(ErrorFact::new(event.message, event.timestamp, error_timeout));
            }
            LogLevel::Info => {
                self.status = Some(StatusFact::new(event.message, event.timestamp));
            }
            LogLevel::Unknown => {}
        }
    }

    pub fn status(&self) -> Option<&StatusFact> {
        self.status.as_ref()
    }

    /// The current error fact, unless it has expired by `now`
    pub fn error(&self, now: NaiveDateTime) -> Option<&ErrorFact> {
        self.error.as_ref().filter(|e| !e.expired(now))
    }

    /// Drop an expired error fact; run once per scheduling cycle
    pub fn sweep(&mut self, now: NaiveDateTime) {
        if self.error.as_ref().is_some_and(|e| e.expired(now)) {
            self.error = None;
        }
    }
}
