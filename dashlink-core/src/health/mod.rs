//! Link and health classification
//!
//! Two machines share one sampling cadence. The coarse link-state looks at
//! whole windows of counters; the fine health-state is re-evaluated every
//! tick and drives what the gauge tells the driver.

pub mod classifier;

pub use classifier::{HealthClassifier, TickReport};

use crate::time::Millis;

/// Coarse link classification, evaluated once per window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkState {
    /// Nothing received in the window
    #[default]
    NoFrames,
    /// Frames received but none decoded
    NoProfileMatch,
    Ok,
}

/// Fine health classification, evaluated every tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HealthState {
    Ok,
    /// Never received a frame, or silent for too long
    #[default]
    NoFrames,
    /// Frames are late but not yet missing
    Stale,
    /// The bus is alive but frames do not decode
    DecodeBad,
    /// Too many decoded values outside their plausible range
    Implausible,
}

impl HealthState {
    /// Whether values may be shown without a warning
    pub fn is_ok(self) -> bool {
        self == HealthState::Ok
    }
}

/// A state change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Transition<S> {
    pub from: S,
    pub to: S,
    pub at: Millis,
}

pub type LinkTransition = Transition<LinkState>;
pub type HealthTransition = Transition<HealthState>;

/// Counter values at the start of a window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WindowBaseline {
    pub started_ms: Millis,
    pub total_rx: u32,
    pub matched: u32,
    pub recognized: u32,
    pub out_of_range: u32,
    pub edges: u32,
}

/// Published classification record
///
/// Written only by the health classifier; everyone else reads snapshots
/// through [`Telemetry::diagnostic`](crate::telemetry::Telemetry::diagnostic).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkDiagnostic {
    pub link: LinkState,
    pub health: HealthState,
    pub link_changed_ms: Millis,
    pub health_changed_ms: Millis,
    /// Bumped on every transition of either machine; dependents redraw
    /// when it changes
    pub revision: u32,
    pub link_window: WindowBaseline,
    pub oor_window: WindowBaseline,
}

impl LinkDiagnostic {
    pub const fn new() -> Self {
        Self {
            link: LinkState::NoFrames,
            health: HealthState::NoFrames,
            link_changed_ms: 0,
            health_changed_ms: 0,
            revision: 0,
            link_window: WindowBaseline {
                started_ms: 0,
                total_rx: 0,
                matched: 0,
                recognized: 0,
                out_of_range: 0,
                edges: 0,
            },
            oor_window: WindowBaseline {
                started_ms: 0,
                total_rx: 0,
                matched: 0,
                recognized: 0,
                out_of_range: 0,
                edges: 0,
            },
        }
    }
}

impl Default for LinkDiagnostic {
    fn default() -> Self {
        Self::new()
    }
}
