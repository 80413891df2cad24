//! Persisted bus-speed lock
//!
//! The lock is the only state the acquisition core persists. It is stored
//! as postcard binary under its own flash key, loaded once at startup and
//! rewritten whenever the bootstrap controller acquires or clears it.

use serde::{Deserialize, Serialize};

/// Current encoding version
pub const LOCK_RECORD_VERSION: u8 = 1;

/// Upper bound on the encoded size
pub const MAX_LOCK_RECORD_SIZE: usize = 16;

/// A confirmed (or cleared) bus-speed decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LockRecord {
    pub version: u8,
    /// Locked bus speed in bit/s
    pub bitrate: u32,
    /// Whether `bitrate` may be used without scanning
    pub locked: bool,
    /// Expected identifiers seen during validation, bit per table position
    pub id_mask: u16,
    /// Validation frames decoded against the profile table
    pub checksum_match: bool,
}

impl LockRecord {
    /// No lock
    pub const UNLOCKED: LockRecord = LockRecord {
        version: LOCK_RECORD_VERSION,
        bitrate: 0,
        locked: false,
        id_mask: 0,
        checksum_match: false,
    };

    /// A fresh lock on `bitrate`
    pub const fn locked(bitrate: u32, id_mask: u16, checksum_match: bool) -> Self {
        LockRecord {
            version: LOCK_RECORD_VERSION,
            bitrate,
            locked: true,
            id_mask,
            checksum_match,
        }
    }

    /// The same record with the lock dropped
    ///
    /// The last bitrate is kept for diagnostics only.
    pub const fn cleared(self) -> Self {
        LockRecord {
            locked: false,
            ..self
        }
    }

    /// Whether the record allows a direct connect
    pub fn usable(&self) -> bool {
        self.locked && self.bitrate > 0
    }

    /// Encode into `buf`, returning the written bytes
    pub fn encode<'a>(&self, buf: &'a mut [u8]) -> Result<&'a mut [u8], LockRecordError> {
        postcard::to_slice(self, buf).map_err(|_| LockRecordError::Encode)
    }

    /// Decode a stored record
    pub fn decode(bytes: &[u8]) -> Result<Self, LockRecordError> {
        let record: LockRecord = postcard::from_bytes(bytes).map_err(|_| LockRecordError::Decode)?;
        if record.version != LOCK_RECORD_VERSION {
            return Err(LockRecordError::VersionMismatch);
        }
        Ok(record)
    }
}

impl Default for LockRecord {
    fn default() -> Self {
        Self::UNLOCKED
    }
}

/// Lock record encoding errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LockRecordError {
    /// Buffer too small
    Encode,
    /// Stored bytes are not a lock record
    Decode,
    /// Stored record uses another encoding version
    VersionMismatch,
}
