//! Log tailing and extraction for vigil
//!
//! This crate provides incremental byte-level tailing of rotating log
//! files, pluggable line classification, the per-source status/error
//! facts, and the subscriber sessions attached to each live stream.

mod classify;
mod error;
mod session;
mod source;
mod state;
mod watched;

pub use classify::{LineClassifier, StructuredClassifier, WebLogClassifier, WebLogKind};
pub use error::SourceError;
pub use session::{Condition, SubscriptionManager};
pub use source::{LogSource, Rewind};
pub use state::SourceState;
pub use watched::{DEFAULT_ERROR_TIMEOUT, WatchedLog};

// Re-export types used in our public API
pub use vigil_types::{ErrorFact, LogEvent, LogLevel, StatusFact};
