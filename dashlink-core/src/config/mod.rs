//! Link configuration
//!
//! Tunable thresholds with compiled-in defaults, the TOML overlay parser,
//! the persisted bus-speed lock and the flash persistence around them.

pub mod link;
pub mod lock;
pub mod persist;
pub mod toml;

pub use link::{BackoffConfig, ConfigError, HealthConfig, IngestConfig, LinkConfig, ScanConfig, StoreConfig};
pub use lock::{LockRecord, LockRecordError, LOCK_RECORD_VERSION, MAX_LOCK_RECORD_SIZE};
pub use persist::{LinkPersistence, PersistError, MAX_OVERRIDE_SIZE};
pub use toml::{parse_link_config, ParseError};
