//! Shared telemetry aggregate
//!
//! One `Telemetry` is created at startup and handed by reference to every
//! component. Field groups have a single writer each:
//!
//! | Group        | Writer                               | Readers          |
//! |--------------|--------------------------------------|------------------|
//! | `signals`    | ingestion worker (or the simulator)  | everyone         |
//! | counters     | ingestion worker                     | health, display  |
//! | frame log    | ingestion worker                     | display          |
//! | diagnostic   | health classifier                    | everyone         |
//! | flags        | bootstrap controller, ingestion worker | both           |
//! | edge counter | RX edge interrupt                    | health           |
//!
//! The signal store is lock-free. Everything else sits behind a
//! critical-section mutex and is read as one snapshot copy, so a reader
//! never sees half of an update.

use core::cell::{Cell, RefCell};

use dashlink_hal::{CanFrame, ControllerStatus};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use heapless::Vec;
use portable_atomic::{AtomicU32, Ordering};

use crate::health::LinkDiagnostic;
use crate::ingest::frame_log::{FrameLog, LoggedFrame, FRAME_LOG_LEN};
use crate::signal::{SignalStore, SignalWriter};
use crate::time::Millis;

/// Running link counters
///
/// Monotonic (wrapping) totals; consumers work with deltas between
/// snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkCounters {
    /// Every received frame
    pub total_rx: u32,
    /// Frames the active profile accepted
    pub matched: u32,
    /// Frames that decoded into at least one value
    pub recognized: u32,
    /// Decoded values outside their plausible range
    pub out_of_range: u32,
    pub bus_off: u32,
    pub error_passive: u32,
    /// Receive queue full or overrun alerts
    pub rx_queue_full: u32,
    /// Arrival of the latest frame (valid when `seen_any`)
    pub last_rx_ms: Millis,
    /// Arrival of the latest matched frame (valid when `seen_match`)
    pub last_match_ms: Millis,
    pub seen_any: bool,
    pub seen_match: bool,
    /// Latest controller status snapshot
    pub controller: ControllerStatus,
}

/// Readiness flags shared by the bootstrap controller and the worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkFlags {
    /// Controller is open at a connected bitrate; the worker may drain it
    pub ingest_ready: bool,
    /// The worker tore the controller down after bus-off; recovery pending
    pub bus_off_pending: bool,
    /// Bitrate of the current connection
    pub connected_bitrate: Option<u32>,
    /// Samples come from the simulator
    pub simulated: bool,
}

/// The shared aggregate
pub struct Telemetry {
    pub signals: SignalStore,
    counters: Mutex<CriticalSectionRawMutex, Cell<LinkCounters>>,
    diagnostic: Mutex<CriticalSectionRawMutex, Cell<LinkDiagnostic>>,
    flags: Mutex<CriticalSectionRawMutex, Cell<LinkFlags>>,
    frames: Mutex<CriticalSectionRawMutex, RefCell<FrameLog>>,
    edges: AtomicU32,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl Telemetry {
    pub fn new() -> Self {
        Self {
            signals: SignalStore::new(),
            counters: Mutex::new(Cell::new(LinkCounters::default())),
            diagnostic: Mutex::new(Cell::new(LinkDiagnostic::new())),
            flags: Mutex::new(Cell::new(LinkFlags::default())),
            frames: Mutex::new(RefCell::new(FrameLog::new())),
            edges: AtomicU32::new(0),
        }
    }

    // Counters

    /// Consistent copy of the counters
    pub fn counters(&self) -> LinkCounters {
        self.counters.lock(Cell::get)
    }

    /// Apply `f` to the counters in one critical section
    pub fn update_counters(&self, f: impl FnOnce(&mut LinkCounters)) {
        self.counters.lock(|cell| {
            let mut counters = cell.get();
            f(&mut counters);
            cell.set(counters);
        });
    }

    // Diagnostic

    /// Consistent copy of the link diagnostic
    pub fn diagnostic(&self) -> LinkDiagnostic {
        self.diagnostic.lock(Cell::get)
    }

    /// Publish a new diagnostic record (health classifier only)
    pub fn publish_diagnostic(&self, diagnostic: LinkDiagnostic) {
        self.diagnostic.lock(|cell| cell.set(diagnostic));
    }

    // Flags

    pub fn flags(&self) -> LinkFlags {
        self.flags.lock(Cell::get)
    }

    pub fn update_flags(&self, f: impl FnOnce(&mut LinkFlags)) {
        self.flags.lock(|cell| {
            let mut flags = cell.get();
            f(&mut flags);
            cell.set(flags);
        });
    }

    /// Mark the controller connected and open for ingestion
    pub fn set_connected(&self, bitrate: u32) {
        self.update_flags(|f| {
            f.ingest_ready = true;
            f.connected_bitrate = Some(bitrate);
        });
    }

    /// Mark the controller closed
    pub fn clear_connected(&self) {
        self.update_flags(|f| {
            f.ingest_ready = false;
            f.connected_bitrate = None;
        });
    }

    /// Worker side of bus-off: stop ingestion and request recovery
    pub fn raise_bus_off(&self) {
        self.update_flags(|f| {
            f.ingest_ready = false;
            f.connected_bitrate = None;
            f.bus_off_pending = true;
        });
    }

    /// Bootstrap side of bus-off: consume the recovery request
    pub fn take_bus_off(&self) -> bool {
        self.flags.lock(|cell| {
            let mut flags = cell.get();
            let pending = flags.bus_off_pending;
            flags.bus_off_pending = false;
            cell.set(flags);
            pending
        })
    }

    /// Switch between live and simulated samples
    ///
    /// Every channel is reset so values from one source are never shown as
    /// coming from the other. Does nothing if the source is unchanged.
    pub fn switch_source(&self, writer: &mut SignalWriter<'_>, simulated: bool) {
        if self.flags().simulated == simulated {
            return;
        }
        writer.reset_all();
        self.update_flags(|f| f.simulated = simulated);
        info!("signal source: {}", if simulated { "simulated" } else { "live" });
    }

    // Frame log

    pub fn log_frame(&self, at: Millis, frame: CanFrame) {
        self.frames.lock(|log| log.borrow_mut().record(at, frame));
    }

    /// Recent frames, oldest first
    pub fn recent_frames(&self) -> Vec<LoggedFrame, FRAME_LOG_LEN> {
        self.frames.lock(|log| log.borrow().snapshot())
    }

    // Edge counter

    /// Count RX line edges (interrupt context)
    pub fn note_edges(&self, count: u32) {
        self.edges.fetch_add(count, Ordering::Relaxed);
    }

    /// Total edges counted so far (wrapping)
    pub fn edges(&self) -> u32 {
        self.edges.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::{SignalFlags, SignalId};
    use dashlink_hal::CanId;

    #[test]
    fn test_counters_update_atomically() {
        let telemetry = Telemetry::new();
        telemetry.update_counters(|c| {
            c.total_rx += 3;
            c.matched += 2;
            c.last_rx_ms = 40;
            c.seen_any = true;
        });
        let counters = telemetry.counters();
        assert_eq!(counters.total_rx, 3);
        assert_eq!(counters.matched, 2);
        assert!(counters.seen_any);
        assert!(!counters.seen_match);
    }

    #[test]
    fn test_bus_off_handshake() {
        let telemetry = Telemetry::new();
        telemetry.set_connected(500_000);
        assert!(telemetry.flags().ingest_ready);

        telemetry.raise_bus_off();
        let flags = telemetry.flags();
        assert!(!flags.ingest_ready);
        assert_eq!(flags.connected_bitrate, None);

        assert!(telemetry.take_bus_off());
        assert!(!telemetry.take_bus_off());
    }

    #[test]
    fn test_switch_source_resets_samples() {
        let telemetry = Telemetry::new();
        let mut writer = telemetry.signals.claim_writer().unwrap();
        writer.record(SignalId::EngineSpeed, 3000.0, 100, SignalFlags::NONE);
        assert!(telemetry.signals.read(SignalId::EngineSpeed, 100).valid);

        telemetry.switch_source(&mut writer, true);
        assert!(telemetry.flags().simulated);
        let read = telemetry.signals.read(SignalId::EngineSpeed, 100);
        assert!(!read.valid);
        assert!(read.flags.contains(SignalFlags::NEVER_WRITTEN));
    }

    #[test]
    fn test_switch_source_same_source_keeps_samples() {
        let telemetry = Telemetry::new();
        let mut writer = telemetry.signals.claim_writer().unwrap();
        writer.record(SignalId::Lambda, 1.0, 10, SignalFlags::NONE);
        telemetry.switch_source(&mut writer, false);
        assert!(telemetry.signals.read(SignalId::Lambda, 10).valid);
    }

    #[test]
    fn test_frame_log_and_edges() {
        let telemetry = Telemetry::new();
        let frame = CanFrame::new(CanId::standard(0x360), &[1, 2]).unwrap();
        telemetry.log_frame(5, frame);
        assert_eq!(telemetry.recent_frames()[0].frame, frame);

        telemetry.note_edges(10);
        telemetry.note_edges(5);
        assert_eq!(telemetry.edges(), 15);
    }
}
