//! Board-agnostic core of the dash CAN link
//!
//! Everything between the CAN controller and the gauges that does not
//! depend on a specific chip:
//!
//! - Signal store (latest value per channel, lock-free reads)
//! - ECU decode profiles
//! - Bus-speed scanner
//! - Steady-state ingestion
//! - Link and data health classification
//! - Connection bootstrap and bus-off recovery
//! - Link configuration and the persisted bus-speed lock

#![no_std]
#![deny(unsafe_code)]

#[macro_use]
mod fmt;

pub mod bootstrap;
pub mod config;
pub mod health;
pub mod ingest;
pub mod profile;
pub mod scan;
pub mod signal;
pub mod sim;
pub mod telemetry;
pub mod time;

#[cfg(test)]
mod testing;
