//! Per-candidate sampling score

use dashlink_hal::CanFrame;

use crate::profile::{DecodeProfile, DecodedSignals, ValidationThresholds, MAX_EXPECTED_IDS};

const HIT_WEIGHT: i64 = 100;
const DISTINCT_WEIGHT: i64 = 200;
const ERROR_WEIGHT: i64 = 5000;
const OVERRUN_WEIGHT: i64 = 2000;
const MISSED_WEIGHT: i64 = 10;

/// Credit for raw frame volume saturates here
///
/// A fully loaded 1 Mbit/s bus carries about 2 250 frames in a 250 ms
/// window, so this only bites on nonsense counts. It keeps a single bus
/// error worth more than any amount of unaccepted traffic and id coverage.
pub const MAX_VOLUME_CREDIT: u32 = 2500;

/// Diagnostic summary of one candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ScanEntry {
    pub bitrate: u32,
    pub score: i32,
    pub total_frames: u32,
    pub hits: u32,
    pub distinct_ids: u8,
    pub bus_errors: u32,
}

/// Tally of one sampling window at one bus speed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaudScore {
    pub bitrate: u32,
    /// Every frame received
    pub total_frames: u32,
    /// Frames the profile accepted
    pub hits: u32,
    /// Hits per expected identifier, by table position
    pub id_hits: [u16; MAX_EXPECTED_IDS],
    /// Frames that decoded into values
    pub recognized: u32,
    pub bus_errors: u32,
    /// Frames dropped by a full receive queue
    pub missed: u32,
    pub overruns: u32,
}

impl BaudScore {
    pub const fn new(bitrate: u32) -> Self {
        Self {
            bitrate,
            total_frames: 0,
            hits: 0,
            id_hits: [0; MAX_EXPECTED_IDS],
            recognized: 0,
            bus_errors: 0,
            missed: 0,
            overruns: 0,
        }
    }

    /// Count one received frame
    pub fn record_frame(&mut self, profile: &dyn DecodeProfile, frame: &CanFrame, scratch: &mut DecodedSignals) {
        self.total_frames = self.total_frames.saturating_add(1);
        if !profile.accept_frame(frame) {
            return;
        }
        self.hits = self.hits.saturating_add(1);
        if let Some(slot) = profile
            .channel_index(frame.id())
            .and_then(|index| self.id_hits.get_mut(index))
        {
            *slot = slot.saturating_add(1);
        }
        if profile.decode(frame, scratch) > 0 {
            self.recognized = self.recognized.saturating_add(1);
        }
    }

    /// Expected identifiers seen at least once
    pub fn distinct_ids(&self) -> u8 {
        self.covered_ids(1)
    }

    /// Expected identifiers seen at least `min_hits` times
    pub fn covered_ids(&self, min_hits: u16) -> u8 {
        self.id_hits.iter().filter(|&&hits| hits > 0 && hits >= min_hits).count() as u8
    }

    /// Bit per expected identifier that was seen
    pub fn id_mask(&self) -> u16 {
        self.id_hits
            .iter()
            .enumerate()
            .filter(|&(_, &hits)| hits > 0)
            .fold(0, |mask, (index, _)| mask | (1 << index))
    }

    /// Anything at all was received
    pub fn has_activity(&self) -> bool {
        self.total_frames > 0
    }

    /// Ranking score
    ///
    /// One bus error costs more than the whole volume credit plus full id
    /// coverage, so a candidate with errors loses to any clean one that
    /// accepted at least as many frames. Accepted hits are not capped: a
    /// busy faulty candidate can still outrank a thin clean one.
    pub fn score(&self) -> i32 {
        let volume = self.total_frames.min(MAX_VOLUME_CREDIT);
        let score = i64::from(self.hits) * HIT_WEIGHT + i64::from(self.distinct_ids()) * DISTINCT_WEIGHT
            + i64::from(volume)
            - i64::from(self.bus_errors) * ERROR_WEIGHT
            - i64::from(self.overruns) * OVERRUN_WEIGHT
            - i64::from(self.missed) * MISSED_WEIGHT;
        score.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
    }

    /// Coverage check for confirmation and validation windows
    pub fn meets(&self, thresholds: &ValidationThresholds) -> bool {
        self.bus_errors == 0
            && self.total_frames >= thresholds.min_total_frames
            && self.covered_ids(thresholds.min_hits_per_id) >= thresholds.min_distinct_ids
    }

    pub fn entry(&self) -> ScanEntry {
        ScanEntry {
            bitrate: self.bitrate,
            score: self.score(),
            total_frames: self.total_frames,
            hits: self.hits,
            distinct_ids: self.distinct_ids(),
            bus_errors: self.bus_errors,
        }
    }
}
