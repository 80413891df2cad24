//! Decode profiles
//!
//! A profile knows which frames an ECU family broadcasts, how to turn them
//! into physical values, and how the bus speed should be discovered. The
//! active profile is chosen at runtime through [`ProfileKind`]; the decode
//! tables behind each profile are immutable statics.

pub mod bits;
pub mod haltech;
pub mod null;
pub mod table;

use dashlink_hal::{CanFrame, CanId};
use heapless::Vec;

use crate::signal::SignalId;

pub use bits::{extract_bits, BitOrder, Signedness};
pub use haltech::{TableProfile, HALTECH};
pub use null::NullProfile;
pub use table::{FieldSpec, MessageSpec, ProfileTable};

/// Most fields one message can carry
pub const MAX_FIELDS_PER_MESSAGE: usize = 8;

/// Most distinct identifiers a profile can expect (width of the presence mask)
pub const MAX_EXPECTED_IDS: usize = 16;

/// One decoded channel value
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DecodedSignal {
    pub signal: SignalId,
    pub value: f32,
}

/// Output buffer for [`DecodeProfile::decode`]
pub type DecodedSignals = Vec<DecodedSignal, MAX_FIELDS_PER_MESSAGE>;

/// How the scanner should discover the bus speed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScanMode {
    /// Sample passively, then promote the winner to normal mode
    ListenThenPromote,
    /// The ECU only transmits when acknowledged; sample in normal mode
    NormalOnly,
}

/// Coverage a candidate must show to be confirmed or validated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ValidationThresholds {
    /// Total frames seen in the window
    pub min_total_frames: u32,
    /// Identifiers that each reached `min_hits_per_id`
    pub min_distinct_ids: u8,
    /// Hits an identifier needs to count as covered
    pub min_hits_per_id: u16,
}

/// Stateless wire-to-physical mapping for one ECU family
pub trait DecodeProfile {
    /// Human-readable name
    fn name(&self) -> &'static str;

    /// Check if an identifier belongs to this family
    fn accept_id(&self, id: CanId) -> bool;

    /// Check if a frame belongs to this family
    ///
    /// Remote frames never carry telemetry.
    fn accept_frame(&self, frame: &CanFrame) -> bool {
        !frame.is_remote() && self.accept_id(frame.id())
    }

    /// Decode every field of a known message into `out`
    ///
    /// `out` is cleared first. Returns the number of decoded values; zero
    /// means the frame is not a known message or is too short.
    fn decode(&self, frame: &CanFrame, out: &mut DecodedSignals) -> usize;

    /// Index of an expected identifier, used for per-identifier hit counts
    /// and the presence mask
    fn channel_index(&self, id: CanId) -> Option<usize>;

    /// Number of identifiers the family is expected to broadcast
    fn expected_id_count(&self) -> usize;

    /// Bus speeds to try, most likely first
    fn candidate_bitrates(&self) -> &'static [u32];

    /// Coverage thresholds for confirmation and validation
    fn validation(&self) -> ValidationThresholds;

    /// How to discover the bus speed
    fn scan_mode(&self) -> ScanMode;

    /// Whether scanning makes sense at all
    fn can_scan(&self) -> bool {
        !self.candidate_bitrates().is_empty() && self.expected_id_count() > 0
    }
}

/// Runtime profile selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProfileKind {
    /// No ECU selected
    #[default]
    None,
    /// Haltech broadcast dash stream
    Haltech,
}

impl ProfileKind {
    /// The profile implementation for this selection
    pub fn profile(self) -> &'static dyn DecodeProfile {
        match self {
            ProfileKind::None => &NullProfile,
            ProfileKind::Haltech => &HALTECH,
        }
    }

    /// Parse a profile name as written in configuration
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "none" => Some(ProfileKind::None),
            "haltech" => Some(ProfileKind::Haltech),
            _ => None,
        }
    }
}
