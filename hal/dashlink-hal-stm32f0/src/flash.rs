//! Flash storage driver for STM32F0
//!
//! Uses sequential-storage for wear-leveled key-value storage in the last
//! pages of flash. The blocking embassy flash driver is wrapped in
//! `BlockingAsync` to get the async `NorFlash` that sequential-storage
//! expects.
//!
//! Implements the `FlashStorage` trait from `dashlink-hal`. Removing a
//! record writes an empty item under its key.

use embassy_embedded_hal::adapter::BlockingAsync;
use embassy_stm32::flash::{Blocking, Flash};
use sequential_storage::cache::NoCache;
use sequential_storage::map;

// Re-export shared types from dashlink-hal
pub use dashlink_hal::flash::{FlashError, StorageKey};

/// Flash layout for STM32F072CB: 128KB, 2KB pages
#[cfg(feature = "stm32f072cb")]
pub const FLASH_SIZE: usize = 128 * 1024;
#[cfg(feature = "stm32f072cb")]
pub const FLASH_PAGE_SIZE: usize = 2 * 1024;

/// Flash layout for STM32F042K6: 32KB, 1KB pages
#[cfg(not(feature = "stm32f072cb"))]
pub const FLASH_SIZE: usize = 32 * 1024;
#[cfg(not(feature = "stm32f072cb"))]
pub const FLASH_PAGE_SIZE: usize = 1024;

/// Four pages for the link partition
pub const CONFIG_PARTITION_SIZE: usize = 4 * FLASH_PAGE_SIZE;
pub const CONFIG_PARTITION_START: usize = FLASH_SIZE - CONFIG_PARTITION_SIZE;

/// Flash range for the link partition (offsets from the start of flash)
pub const CONFIG_RANGE: core::ops::Range<u32> = (CONFIG_PARTITION_START as u32)..(FLASH_SIZE as u32);

/// Largest stored item (the TOML overlay)
pub const MAX_ITEM_SIZE: usize = 512;

/// STM32F0 flash storage implementation
pub struct Stm32FlashStorage<'d> {
    flash: BlockingAsync<Flash<'d, Blocking>>,
}

impl<'d> Stm32FlashStorage<'d> {
    pub fn new(flash: Flash<'d, Blocking>) -> Self {
        Self {
            flash: BlockingAsync::new(flash),
        }
    }
}

impl Stm32FlashStorage<'_> {
    async fn store(&mut self, key: StorageKey, data: &[u8]) -> Result<(), FlashError> {
        if data.len() > MAX_ITEM_SIZE {
            return Err(FlashError::TooLarge);
        }
        let mut data_buffer = [0u8; MAX_ITEM_SIZE];

        map::store_item(
            &mut self.flash,
            CONFIG_RANGE,
            &mut NoCache::new(),
            &mut data_buffer,
            &key,
            &data,
        )
        .await
        .map_err(storage_error)
    }
}

impl dashlink_hal::FlashStorage for Stm32FlashStorage<'_> {
    async fn read(&mut self, key: StorageKey, buffer: &mut [u8]) -> Result<usize, FlashError> {
        let mut data_buffer = [0u8; MAX_ITEM_SIZE];

        let data = map::fetch_item::<StorageKey, &[u8], _>(
            &mut self.flash,
            CONFIG_RANGE,
            &mut NoCache::new(),
            &mut data_buffer,
            &key,
        )
        .await
        .map_err(storage_error)?
        .ok_or(FlashError::NotFound)?;

        // An empty item is a removed record
        if data.is_empty() {
            return Err(FlashError::NotFound);
        }
        let out = buffer.get_mut(..data.len()).ok_or(FlashError::TooLarge)?;
        out.copy_from_slice(data);
        Ok(data.len())
    }

    async fn write(&mut self, key: StorageKey, data: &[u8]) -> Result<(), FlashError> {
        self.store(key, data).await
    }

    async fn remove(&mut self, key: StorageKey) -> Result<(), FlashError> {
        // The F0 cannot overwrite programmed half-words, so removal appends
        // an empty item instead of erasing in place
        self.store(key, &[]).await
    }
}

fn storage_error<E>(error: sequential_storage::Error<E>) -> FlashError {
    match error {
        sequential_storage::Error::FullStorage => FlashError::Full,
        sequential_storage::Error::Corrupted { .. } => FlashError::Corrupted,
        _ => FlashError::Flash,
    }
}
