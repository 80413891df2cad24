//! Inert placeholder profile
//!
//! Selected when no ECU family is configured. It accepts nothing, decodes
//! nothing and offers no bus speeds, so the bootstrap controller never
//! scans with it.

use dashlink_hal::{CanFrame, CanId};

use super::{DecodeProfile, DecodedSignals, ScanMode, ValidationThresholds};

/// Profile used when none is selected
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProfile;

impl DecodeProfile for NullProfile {
    fn name(&self) -> &'static str {
        "none"
    }

    fn accept_id(&self, _id: CanId) -> bool {
        false
    }

    fn decode(&self, _frame: &CanFrame, out: &mut DecodedSignals) -> usize {
        out.clear();
        0
    }

    fn channel_index(&self, _id: CanId) -> Option<usize> {
        None
    }

    fn expected_id_count(&self) -> usize {
        0
    }

    fn candidate_bitrates(&self) -> &'static [u32] {
        &[]
    }

    fn validation(&self) -> ValidationThresholds {
        ValidationThresholds {
            min_total_frames: u32::MAX,
            min_distinct_ids: u8::MAX,
            min_hits_per_id: u16::MAX,
        }
    }

    fn scan_mode(&self) -> ScanMode {
        ScanMode::ListenThenPromote
    }
}
