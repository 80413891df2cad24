//! Events reported by the bootstrap controller

use dashlink_hal::CanError;

use crate::config::LockRecord;
use crate::scan::ScanResult;

/// Something the caller may need to act on
///
/// Events that carry a [`LockRecord`] mean the persisted lock changed and
/// should be written back to flash.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BootstrapEvent {
    /// Controller open at `bitrate`, ingestion enabled
    Connected { bitrate: u32 },
    /// Opening at the locked bitrate failed; retrying later
    ConnectFailed { bitrate: u32, error: CanError, retry_in_ms: u32 },
    /// A scan confirmed a bitrate (persist)
    LockAcquired(LockRecord),
    /// A scan ended without a lock
    ScanFailed(ScanResult),
    /// Bus-off dropped the lock (persist); recovery scheduled
    LockCleared { lock: LockRecord, retry_in_ms: u32 },
    /// Unlocked and silent for too long; a fresh scan started
    RescanForced,
}

impl BootstrapEvent {
    /// Lock record to persist, if this event changed it
    pub fn lock_to_persist(&self) -> Option<LockRecord> {
        match self {
            BootstrapEvent::LockAcquired(lock) | BootstrapEvent::LockCleared { lock, .. } => Some(*lock),
            _ => None,
        }
    }
}
