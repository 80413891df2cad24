//! Connection bootstrap and bus-off recovery

pub mod backoff;
pub mod controller;
pub mod events;
pub mod state;

pub use backoff::Backoff;
pub use controller::BootstrapController;
pub use events::BootstrapEvent;
pub use state::{BootstrapState, WaitReason};
