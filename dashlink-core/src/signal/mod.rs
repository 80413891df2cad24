//! Telemetry signal storage
//!
//! Holds the latest decoded value of every channel for lock-free reads by
//! rendering and alerting code.

pub mod id;
pub mod store;

pub use id::SignalId;
pub use store::{SignalFlags, SignalRead, SignalStore, SignalWriter, MAX_READ_RETRIES};
