//! Vigil — a presence bot that tails server logs and announces status.
//!
//! A long-running process watches append-only, rotating log files,
//! extracts status and error facts from newly written entries, and
//! arbitrates a single outward presence pushed to subscribers over a
//! pluggable chat transport.

pub mod bot;
pub mod config;
pub mod logging;
pub mod transport;

pub use bot::Bot;
pub use config::{Config, LogConfig, LogFormat};
pub use transport::{ConsoleTransport, Inbound, Request, Transport};

// Re-export the pieces embedders wire together
pub use vigil_logs::{LineClassifier, Rewind, WatchedLog};
pub use vigil_presence::StatusProvider;
pub use vigil_types::{Clock, Indicator, ManualClock, SystemClock};
