//! Configuration loading and persistence
//!
//! Link tuning comes from the embedded `link.toml` with an optional
//! override in flash. The bus-speed lock lives in flash as a postcard
//! record.

pub mod loader;

pub use loader::{BoardPersistence, EMBEDDED_CONFIG};
