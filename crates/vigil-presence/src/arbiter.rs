use chrono::NaiveDateTime;

use vigil_types::{ErrorFact, Indicator, TIME_FORMAT};

/// The base-status provider: an opaque source of the default presence
/// shown when no watched source is reporting an error
pub trait StatusProvider {
    fn current(&mut self) -> (Indicator, String);
}

impl<F> StatusProvider for F
where
    F: FnMut() -> (Indicator, String),
{
    fn current(&mut self) -> (Indicator, String) {
        self()
    }
}

/// The single outward-facing presence computed each cycle
#[derive(Clone, Debug, PartialEq)]
pub struct ArbitedStatus {
    pub message: String,
    pub indicator: Indicator,
    /// Timestamp of the fact that produced this status
    pub timestamp: NaiveDateTime,
}

/// Retained base-status fact: the message and when it last changed
struct Retained {
    message: String,
    indicator: Indicator,
    timestamp: NaiveDateTime,
}

/// Merges the base status with every source's error fact into one
/// outward message/indicator pair.
///
/// The retained timestamp tracks message changes only: an indicator-only
/// change on the base status updates the shown indicator but keeps the
/// displayed time. Any unexpired error outranks the base status
/// regardless of recency, forcing do-not-disturb.
pub struct StatusArbiter {
    retained: Retained,
    /// Indicator shown outward at the end of the previous cycle, error
    /// override included
    outward: Indicator,
    clear_mark: Option<NaiveDateTime>,
}

impl StatusArbiter {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            retained: Retained {
                message: String::new(),
                indicator: Indicator::Available,
                timestamp: now,
            },
            outward: Indicator::Available,
            clear_mark: None,
        }
    }

    /// Ignore error facts recorded strictly before this instant until a
    /// newer error arrives. The displayed status is untouched; the next
    /// arbitration pass applies the mark.
    pub fn clear(&mut self, now: NaiveDateTime) {
        self.clear_mark = Some(now);
    }

    /// Recompute the outward status for this cycle
    pub fn arbitrate<'a, I>(
        &mut self,
        base: (Indicator, String),
        errors: I,
        now: NaiveDateTime,
    ) -> ArbitedStatus
    where
        I: IntoIterator<Item = (&'a str, &'a ErrorFact)>,
    {
        let (indicator, message) = base;
        if message != self.retained.message {
            self.retained = Retained {
                message,
                indicator,
                timestamp: now,
            };
        }
        if indicator != self.outward {
            self.retained.indicator = indicator;
        }

        let mut result = ArbitedStatus {
            message: format!(
                "{} {}",
                self.retained.timestamp.format(TIME_FORMAT),
                self.retained.message
            ),
            indicator: self.retained.indicator,
            timestamp: self.retained.timestamp,
        };

        let mut newest: Option<NaiveDateTime> = None;
        for (name, fact) in errors {
            if self.clear_mark.is_some_and(|mark| fact.timestamp < mark) {
                continue;
            }
            if newest.is_none_or(|seen| fact.timestamp > seen) {
                newest = Some(fact.timestamp);
                result = ArbitedStatus {
                    message: format!("{} {}: {}", fact.time(), name, fact.message),
                    indicator: Indicator::DoNotDisturb,
                    timestamp: fact.timestamp,
                };
            }
        }

        self.outward = result.indicator;
        result
    }
}
