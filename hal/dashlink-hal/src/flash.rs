//! Persistent records
//!
//! The gauge keeps two small records in flash: the bus-speed lock written
//! after a successful scan, and an optional TOML overlay for link tuning.
//! Chip HALs back [`FlashStorage`] with whatever wear-leveled store their
//! flash supports.

/// Record slots in the link partition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum StorageKey {
    /// Postcard-encoded bus-speed lock
    LinkLock = 0x4C,
    /// UTF-8 `link.toml` overlay
    LinkConfigToml = 0x54,
}

impl TryFrom<u8> for StorageKey {
    type Error = u8;

    fn try_from(tag: u8) -> Result<Self, u8> {
        [StorageKey::LinkLock, StorageKey::LinkConfigToml]
            .into_iter()
            .find(|key| *key as u8 == tag)
            .ok_or(tag)
    }
}

/// Storage failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashError {
    /// The flash driver rejected a read, write or erase
    Flash,
    /// No record under the key
    NotFound,
    /// Record larger than the caller's buffer or the item limit
    TooLarge,
    /// Stored data failed the integrity check
    Corrupted,
    /// Partition full even after garbage collection
    Full,
}

/// Keyed record store
///
/// A removed record reads back as [`FlashError::NotFound`].
pub trait FlashStorage {
    /// Copy the record under `key` into `buffer`, returning its length
    fn read(&mut self, key: StorageKey, buffer: &mut [u8]) -> impl core::future::Future<Output = Result<usize, FlashError>>;

    /// Replace the record under `key`
    fn write(&mut self, key: StorageKey, data: &[u8]) -> impl core::future::Future<Output = Result<(), FlashError>>;

    /// Drop the record under `key`; removing an absent record succeeds
    fn remove(&mut self, key: StorageKey) -> impl core::future::Future<Output = Result<(), FlashError>>;
}

#[cfg(feature = "sequential-storage")]
impl sequential_storage::map::Key for StorageKey {
    fn serialize_into(&self, buffer: &mut [u8]) -> Result<usize, sequential_storage::map::SerializationError> {
        let slot = buffer
            .first_mut()
            .ok_or(sequential_storage::map::SerializationError::BufferTooSmall)?;
        *slot = *self as u8;
        Ok(1)
    }

    fn deserialize_from(buffer: &[u8]) -> Result<(Self, usize), sequential_storage::map::SerializationError> {
        let tag = buffer
            .first()
            .ok_or(sequential_storage::map::SerializationError::BufferTooSmall)?;
        StorageKey::try_from(*tag)
            .map(|key| (key, 1))
            .map_err(|_| sequential_storage::map::SerializationError::InvalidFormat)
    }
}
