//! STM32F0-specific HAL for the Dashlink firmware
//!
//! Implements the `dashlink-hal` traits on STM32F0 parts with a bxCAN
//! peripheral:
//!
//! - STM32F072CB (gauge board)
//! - STM32F042K6 (bench board)
//!
//! # Features
//!
//! - `stm32f072cb` / `stm32f042k6` - Select the chip
//! - `defmt` - Enable debug formatting support

#![no_std]

pub mod can;
pub mod flash;

pub use can::BxCanController;
pub use flash::Stm32FlashStorage;

// Re-export shared types from dashlink-hal
pub use dashlink_hal::flash::StorageKey;
pub use dashlink_hal::{CanController, FlashStorage};
