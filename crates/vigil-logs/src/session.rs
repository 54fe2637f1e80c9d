use chrono::NaiveDateTime;

/// Liveness predicate attached to a session; the session expires once it
/// returns false
pub type Condition = Box<dyn Fn() -> bool + Send>;

/// One subscriber's registered interest in a stream, with its own expiry
/// rule
struct Session {
    subscriber: String,
    started_at: NaiveDateTime,
    timeout: Option<i64>,
    condition: Option<Condition>,
}

impl Session {
    fn expired(&self, now: NaiveDateTime) -> bool {
        if self
            .timeout
            .is_some_and(|t| (now - self.started_at).num_seconds() > t)
        {
            return true;
        }
        self.condition.as_ref().is_some_and(|alive| !alive())
    }
}

/// Tracks the subscriber sessions of one logical stream.
///
/// The same subscriber may hold several sessions with different expiry
/// rules; it stays a receiver of the stream while any of them is live.
#[derive(Default)]
pub struct SubscriptionManager {
    sessions: Vec<Session>,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new independent session. Sessions are never deduplicated
    /// by subscriber; a session without timeout or condition lives until
    /// an explicit [`SubscriptionManager::remove`].
    pub fn add(
        &mut self,
        subscriber: impl Into<String>,
        now: NaiveDateTime,
        timeout: Option<i64>,
        condition: Option<Condition>,
    ) {
        self.sessions.push(Session {
            subscriber: subscriber.into(),
            started_at: now,
            timeout,
            condition,
        });
    }

    /// Distinct subscriber ids with at least one session, in first-seen
    /// order
    pub fn receivers(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for session in &self.sessions {
            if !ids.iter().any(|id| *id == session.subscriber) {
                ids.push(session.subscriber.clone());
            }
        }
        ids
    }

    /// Drop every expired session and report the subscribers left with no
    /// session at all. A subscriber keeping one live session among several
    /// is not reported.
    pub fn expire(&mut self, now: NaiveDateTime) -> Vec<String> {
        let mut dropped: Vec<String> = Vec::new();
        self.sessions.retain(|session| {
            if session.expired(now) {
                dropped.push(session.subscriber.clone());
                false
            } else {
                true
            }
        });

        let mut evicted: Vec<String> = Vec::new();
        for id in dropped {
            if !evicted.contains(&id) && !self.sessions.iter().any(|s| s.subscriber == id) {
                evicted.push(id);
            }
        }
        evicted
    }

    /// Unconditionally delete every session for `subscriber`; used for an
    /// explicit stop request
    pub fn remove(&mut self, subscriber: &str) {
        self.sessions.retain(|s| s.subscriber != subscriber);
    }
}
