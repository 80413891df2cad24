//! Embassy async tasks
//!
//! Each task runs independently and communicates through the shared
//! telemetry aggregates and the statics in `channels`.

pub mod control;
pub mod edges;
pub mod ingest;
pub mod persist;

pub use control::control_task;
pub use edges::edge_task;
pub use ingest::ingest_task;
pub use persist::persist_task;

use dashlink_core::time::Millis;
use embassy_time::Instant;

/// Milliseconds since boot, wrapping
pub fn now_ms() -> Millis {
    Instant::now().as_millis() as Millis
}
