//! Presence arbitration for vigil
//!
//! This crate merges the base status with every watched source's error
//! facts into a single outward presence, and gates redundant broadcasts.

mod arbiter;
mod gate;

pub use arbiter::{ArbitedStatus, StatusArbiter, StatusProvider};
pub use gate::{DEFAULT_HEARTBEAT, NotificationGate};

// Re-export types used in our public API
pub use vigil_types::{ErrorFact, Indicator};
