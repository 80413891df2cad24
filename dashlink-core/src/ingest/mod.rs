//! Frame ingestion

pub mod frame_log;
pub mod worker;

pub use frame_log::{FrameLog, LoggedFrame, FRAME_LOG_LEN};
pub use worker::{IngestOutcome, IngestionWorker};
