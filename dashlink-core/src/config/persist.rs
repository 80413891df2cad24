//! Link persistence
//!
//! Loads the link configuration (an embedded `link.toml` plus an optional
//! override in flash) and keeps the bus-speed lock record in flash.

use core::str;

use dashlink_hal::{FlashError, FlashStorage, StorageKey};

use super::link::{ConfigError, LinkConfig};
use super::lock::{LockRecord, LockRecordError, MAX_LOCK_RECORD_SIZE};
use super::toml::{parse_link_config, ParseError};

/// Largest TOML override read from flash
pub const MAX_OVERRIDE_SIZE: usize = 512;

/// Persistence errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PersistError {
    Flash(FlashError),
    /// Lock record encode/decode failed
    Lock(LockRecordError),
    TomlParse(ParseError),
    /// Override bytes are not UTF-8
    InvalidUtf8,
    /// Parsed but rejected by validation
    Invalid(ConfigError),
}

impl From<FlashError> for PersistError {
    fn from(e: FlashError) -> Self {
        PersistError::Flash(e)
    }
}

impl From<LockRecordError> for PersistError {
    fn from(e: LockRecordError) -> Self {
        PersistError::Lock(e)
    }
}

/// Owns the flash partition for link data
pub struct LinkPersistence<S> {
    storage: S,
}

impl<S: FlashStorage> LinkPersistence<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Load the link configuration
    ///
    /// `embedded` is parsed over the built-in defaults, then the flash
    /// override on top. A broken override is logged and ignored; a broken
    /// embedded file falls back to the built-in defaults.
    pub async fn load_config(&mut self, embedded: &str) -> LinkConfig {
        let base = match parse_validated(embedded, LinkConfig::DEFAULT) {
            Ok(config) => config,
            Err(e) => {
                warn!("embedded link.toml rejected: {:?}, using defaults", e);
                LinkConfig::DEFAULT
            }
        };

        match self.load_override(base).await {
            Ok(config) => {
                info!("applied link.toml override from flash");
                config
            }
            Err(PersistError::Flash(FlashError::NotFound)) => base,
            Err(e) => {
                warn!("ignoring flash link override: {:?}", e);
                base
            }
        }
    }

    async fn load_override(&mut self, base: LinkConfig) -> Result<LinkConfig, PersistError> {
        let mut buffer = [0u8; MAX_OVERRIDE_SIZE];
        let len = self.storage.read(StorageKey::LinkConfigToml, &mut buffer).await?;
        let text = str::from_utf8(&buffer[..len]).map_err(|_| PersistError::InvalidUtf8)?;
        parse_validated(text, base)
    }

    /// Load the bus-speed lock, unlocked if absent or unreadable
    ///
    /// A record that cannot be decoded is removed so the next boot does not
    /// trip over it again.
    pub async fn load_lock(&mut self) -> LockRecord {
        let mut buffer = [0u8; MAX_LOCK_RECORD_SIZE];
        let result = match self.storage.read(StorageKey::LinkLock, &mut buffer).await {
            Ok(len) => LockRecord::decode(&buffer[..len]).map_err(PersistError::from),
            Err(e) => Err(PersistError::from(e)),
        };

        match result {
            Ok(lock) => {
                info!("lock record: locked={} bitrate={}", lock.locked, lock.bitrate);
                lock
            }
            Err(PersistError::Flash(FlashError::NotFound)) => {
                info!("no lock record, will scan");
                LockRecord::UNLOCKED
            }
            Err(e) => {
                warn!("discarding lock record: {:?}", e);
                if let Err(e) = self.storage.remove(StorageKey::LinkLock).await {
                    error!("failed to remove lock record: {:?}", e);
                }
                LockRecord::UNLOCKED
            }
        }
    }

    /// Persist the bus-speed lock
    pub async fn save_lock(&mut self, lock: LockRecord) -> Result<(), PersistError> {
        let mut buffer = [0u8; MAX_LOCK_RECORD_SIZE];
        let bytes = lock.encode(&mut buffer)?;
        self.storage.write(StorageKey::LinkLock, bytes).await?;
        Ok(())
    }

    /// Underlying storage
    pub fn storage(&mut self) -> &mut S {
        &mut self.storage
    }
}

fn parse_validated(text: &str, base: LinkConfig) -> Result<LinkConfig, PersistError> {
    let config = parse_link_config(text, base).map_err(PersistError::TomlParse)?;
    config.validate().map_err(PersistError::Invalid)?;
    Ok(config)
}
