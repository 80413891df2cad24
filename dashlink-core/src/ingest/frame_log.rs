//! Recent raw frames for the diagnostics screen

use dashlink_hal::CanFrame;
use heapless::{HistoryBuffer, Vec};

use crate::time::Millis;

/// Frames kept in the log
pub const FRAME_LOG_LEN: usize = 8;

/// One received frame with its arrival time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LoggedFrame {
    pub at: Millis,
    pub frame: CanFrame,
}

/// Ring of the most recent frames; the oldest entry is overwritten
pub struct FrameLog {
    frames: HistoryBuffer<LoggedFrame, FRAME_LOG_LEN>,
}

impl Default for FrameLog {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameLog {
    pub const fn new() -> Self {
        Self {
            frames: HistoryBuffer::new(),
        }
    }

    pub fn record(&mut self, at: Millis, frame: CanFrame) {
        self.frames.write(LoggedFrame { at, frame });
    }

    /// Most recent frame
    pub fn latest(&self) -> Option<LoggedFrame> {
        self.frames.recent().copied()
    }

    /// Copy of the log, oldest first
    pub fn snapshot(&self) -> Vec<LoggedFrame, FRAME_LOG_LEN> {
        self.frames.oldest_ordered().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.len() == 0
    }

    pub fn clear(&mut self) {
        self.frames = HistoryBuffer::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dashlink_hal::CanId;

    fn frame(id: u16) -> CanFrame {
        CanFrame::new(CanId::standard(id), &[id as u8]).unwrap()
    }

    #[test]
    fn test_empty() {
        let log = FrameLog::new();
        assert!(log.is_empty());
        assert!(log.latest().is_none());
        assert!(log.snapshot().is_empty());
    }

    #[test]
    fn test_overwrites_oldest() {
        let mut log = FrameLog::new();
        for i in 0..(FRAME_LOG_LEN as u16 + 3) {
            log.record(i as u32 * 10, frame(0x100 + i));
        }
        assert_eq!(log.len(), FRAME_LOG_LEN);

        let snapshot = log.snapshot();
        assert_eq!(snapshot[0].frame.id(), CanId::standard(0x103));
        assert_eq!(snapshot[FRAME_LOG_LEN - 1].at, 100);
        assert_eq!(log.latest().map(|f| f.frame.id()), Some(CanId::standard(0x10A)));
    }

    #[test]
    fn test_clear() {
        let mut log = FrameLog::new();
        log.record(0, frame(0x360));
        log.clear();
        assert!(log.is_empty());
    }
}
