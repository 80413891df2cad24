//! Dashlink Hardware Abstraction Layer
//!
//! This crate defines hardware abstraction traits that can be implemented
//! by chip-specific HALs. The acquisition core only talks to the bus and
//! to flash through these traits, so it can be exercised on the host with
//! scripted controllers.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Application (dashlink-firmware)        │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  dashlink-core (acquisition logic)      │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  dashlink-hal (this crate - traits)     │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//!             ┌───────────────┐
//!             │ dashlink-hal- │
//!             │   stm32f0     │
//!             └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`can::CanController`] - CAN bus controller
//! - [`flash::FlashStorage`] - Persistent storage

#![no_std]
#![deny(unsafe_code)]

pub mod can;
pub mod flash;

// Re-export key traits at crate root for convenience
pub use can::{Alerts, BusMode, CanController, CanError, CanFrame, CanId, ControllerState, ControllerStatus};
pub use flash::{FlashError, FlashStorage, StorageKey};
