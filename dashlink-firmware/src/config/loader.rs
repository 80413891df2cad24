//! Link persistence on the board's flash
//!
//! The loading policy lives in `dashlink_core::config::persist`; this module
//! pins it to the STM32 flash partition and embeds the build-time
//! `link.toml`.

use dashlink_core::config::LinkPersistence;
use dashlink_hal_stm32f0::Stm32FlashStorage;

/// Embedded default configuration (compiled into firmware)
/// Edit link.toml and rebuild to customize
pub const EMBEDDED_CONFIG: &str = include_str!("../../link.toml");

/// Persistence bound to the on-chip flash
pub type BoardPersistence = LinkPersistence<Stm32FlashStorage<'static>>;
