//! Inter-task communication channels
//!
//! Defines the statics shared between Embassy tasks. Telemetry itself is
//! shared by reference (see `main`); these carry requests only.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_sync::signal::Signal;

use dashlink_core::config::LockRecord;
use dashlink_hal_stm32f0::BxCanController;

/// CAN controller, shared by bootstrap and ingestion
///
/// Held for one bounded step at a time.
pub type SharedCan = Mutex<CriticalSectionRawMutex, BxCanController<'static>>;

/// Lock record to write to flash (latest wins)
pub static LOCK_SAVE: Signal<CriticalSectionRawMutex, LockRecord> = Signal::new();
