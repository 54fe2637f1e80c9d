use chrono::NaiveDateTime;

/// Default seconds between forced presence re-broadcasts
pub const DEFAULT_HEARTBEAT: i64 = 60;

/// Decides once per cycle whether the arbited status is worth
/// broadcasting.
///
/// Only the message text is compared: an indicator-only change rides
/// along silently until the next heartbeat or message change. That is the
/// compatibility contract of this layer, not an accident — subscribers
/// watching the indicator alone may see it late.
pub struct NotificationGate {
    heartbeat_secs: i64,
    last_message: Option<String>,
    last_sent: Option<NaiveDateTime>,
}

impl NotificationGate {
    pub fn new(heartbeat_secs: i64) -> Self {
        Self {
            heartbeat_secs,
            last_message: None,
            last_sent: None,
        }
    }

    /// True when `message` differs from the last broadcast text, or the
    /// heartbeat interval has elapsed since it went out
    pub fn should_send(&self, message: &str, now: NaiveDateTime) -> bool {
        match (&self.last_message, self.last_sent) {
            (Some(last), Some(at))
                if last == message && (now - at).num_seconds() < self.heartbeat_secs =>
            {
                false
            }
            _ => true,
        }
    }

    /// Record a completed broadcast
    pub fn record(&mut self, message: &str, now: NaiveDateTime) {
        self.last_message = Some(message.to_string());
        self.last_sent = Some(now);
    }
}

impl Default for NotificationGate {
    fn default() -> Self {
        Self::new(DEFAULT_HEARTBEAT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_types::TIME_FORMAT;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, TIME_FORMAT).unwrap()
    }

    #[test]
    fn test_unchanged_message_is_suppressed() {
        let mut gate = NotificationGate::new(50);
        let now = ts("2011-09-21 01:00:03");

        assert!(gate.should_send("2011-09-21 01:00:03 Ok", now));
        gate.record("2011-09-21 01:00:03 Ok", now);

        assert!(!gate.should_send("2011-09-21 01:00:03 Ok", ts("2011-09-21 01:00:04")));
    }

    #[test]
    fn test_message_change_broadcasts() {
        let mut gate = NotificationGate::new(50);
        gate.record("2011-09-21 01:00:03 Ok", ts("2011-09-21 01:00:03"));

        assert!(gate.should_send("2011-09-21 01:00:04 New status", ts("2011-09-21 01:00:04")));
    }

    #[test]
    fn test_heartbeat_forces_a_broadcast() {
        let mut gate = NotificationGate::new(50);
        gate.record("2011-09-21 01:00:35 Ok", ts("2011-09-21 01:00:35"));

        assert!(!gate.should_send("2011-09-21 01:00:35 Ok", ts("2011-09-21 01:01:15")));
        assert!(gate.should_send("2011-09-21 01:00:35 Ok", ts("2011-09-21 01:01:26")));
    }
}
