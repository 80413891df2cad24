//! Lock persistence task
//!
//! Owns the flash partition after boot and writes lock records requested by
//! the control loop.

use defmt::*;

use crate::channels::LOCK_SAVE;
use crate::config::BoardPersistence;

#[embassy_executor::task]
pub async fn persist_task(mut persistence: BoardPersistence) {
    info!("Persist task started");

    loop {
        let lock = LOCK_SAVE.wait().await;
        match persistence.save_lock(lock).await {
            Ok(()) => info!("Lock record saved (locked={})", lock.locked),
            Err(e) => error!("Failed to save lock record: {:?}", e),
        }
    }
}
