//! Resumable bus-speed scanner
//!
//! The scanner never blocks. Each [`BaudScanner::step`] drains at most
//! `frames_per_step` frames from the controller and returns; sampling
//! windows end purely on elapsed wall-clock time. All progress lives in the
//! scanner itself, so the caller can interleave steps with other work.
//!
//! Stages:
//!
//! 1. **Sample**: one window per candidate bitrate. Passive (listen-only)
//!    for [`ScanMode::ListenThenPromote`], normal for
//!    [`ScanMode::NormalOnly`]. The top two are the finalists for
//!    confirmation and fallback; a third is ranked only for the
//!    diagnostic entries.
//! 2. **Confirm** (listen-then-promote only): passive windows on the best
//!    candidate, then the runner-up if the best fails.
//! 3. **Guard**: a short normal-mode window; any bus error, error-passive
//!    or bus-off fails it.
//! 4. **Validate**: a normal-mode window with the confirmation coverage.

use dashlink_hal::{Alerts, BusMode, CanController, ControllerState, ControllerStatus};
use heapless::Vec;

use super::score::{BaudScore, ScanEntry};
use crate::config::{LockRecord, ScanConfig};
use crate::profile::{DecodeProfile, DecodedSignals, ScanMode, ValidationThresholds};
use crate::time::{elapsed, Millis};

/// Diagnostic entries carried by a result
pub const MAX_SCAN_ENTRIES: usize = 3;

/// Outcome of a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScanStatus {
    /// A bitrate was locked
    Ok,
    /// No candidate received anything
    NoActivity,
    /// Best and second-best were too close to call
    NoClearWinner,
    /// Neither finalist passed passive confirmation
    ConfirmFailed,
    /// The bus faulted or went quiet once the controller participated
    NormalVerifyFailed,
}

/// Scan result with operator-facing diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ScanResult {
    pub status: ScanStatus,
    /// Locked bitrate when `status` is `Ok`
    pub bitrate: Option<u32>,
    /// Identifiers seen during validation
    pub id_mask: u16,
    /// Validation frames decoded against the profile table
    pub checksum_match: bool,
    /// Best sampled candidates, highest score first
    pub entries: Vec<ScanEntry, MAX_SCAN_ENTRIES>,
}

impl ScanResult {
    pub fn is_ok(&self) -> bool {
        self.status == ScanStatus::Ok
    }

    /// Lock to persist for a successful scan
    pub fn lock_record(&self) -> Option<LockRecord> {
        match (self.status, self.bitrate) {
            (ScanStatus::Ok, Some(bitrate)) => Some(LockRecord::locked(bitrate, self.id_mask, self.checksum_match)),
            _ => None,
        }
    }
}

/// Result of one scanner step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanStep {
    Running,
    Done(ScanResult),
}

/// Coarse progress, for a setup screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScanProgress {
    Sampling { index: u8, of: u8 },
    Confirming { bitrate: u32, pass: u8 },
    Guarding { bitrate: u32 },
    Validating { bitrate: u32 },
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rank {
    Best,
    Second,
}

impl Rank {
    fn index(self) -> usize {
        match self {
            Rank::Best => 0,
            Rank::Second => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Sample { index: usize },
    Confirm { rank: Rank, pass: u8 },
    Guard { rank: Rank },
    Validate { rank: Rank },
    Finished,
}

/// One open sampling window
struct Window {
    started_ms: Millis,
    duration_ms: u32,
    baseline: ControllerStatus,
    alerts: Alerts,
    score: BaudScore,
    /// The controller refused the bitrate or mode
    failed_open: bool,
}

/// Closed window
struct WindowResult {
    score: BaudScore,
    /// Error-passive or bus-off during the window
    faulted: bool,
    failed_open: bool,
}

impl WindowResult {
    fn clean(&self) -> bool {
        !self.failed_open && !self.faulted && self.score.bus_errors == 0
    }
}

/// Bus-speed scanner for one profile
pub struct BaudScanner {
    config: ScanConfig,
    mode: ScanMode,
    thresholds: ValidationThresholds,
    candidates: &'static [u32],
    stage: Stage,
    window: Option<Window>,
    /// Controller configuration currently open
    active: Option<(u32, BusMode)>,
    /// Best sampled candidates, highest score first
    ranking: Vec<BaudScore, MAX_SCAN_ENTRIES>,
    scratch: DecodedSignals,
    outcome: Option<ScanResult>,
}

impl BaudScanner {
    pub fn new(profile: &dyn DecodeProfile, config: ScanConfig) -> Self {
        Self {
            config,
            mode: profile.scan_mode(),
            thresholds: profile.validation(),
            candidates: profile.candidate_bitrates(),
            stage: Stage::Sample { index: 0 },
            window: None,
            active: None,
            ranking: Vec::new(),
            scratch: DecodedSignals::new(),
            outcome: None,
        }
    }

    pub fn mode(&self) -> ScanMode {
        self.mode
    }

    pub fn progress(&self) -> ScanProgress {
        match self.stage {
            Stage::Sample { index } => ScanProgress::Sampling {
                index: index as u8,
                of: self.candidates.len() as u8,
            },
            Stage::Confirm { rank, pass } => ScanProgress::Confirming {
                bitrate: self.bitrate_of(rank),
                pass,
            },
            Stage::Guard { rank } => ScanProgress::Guarding {
                bitrate: self.bitrate_of(rank),
            },
            Stage::Validate { rank } => ScanProgress::Validating {
                bitrate: self.bitrate_of(rank),
            },
            Stage::Finished => ScanProgress::Finished,
        }
    }

    /// Advance the scan by one bounded slice of work
    ///
    /// Once finished, every further call returns the same result.
    pub fn step<C>(&mut self, now: Millis, ctl: &mut C, profile: &dyn DecodeProfile) -> ScanStep
    where
        C: CanController + ?Sized,
    {
        if let Some(result) = &self.outcome {
            return ScanStep::Done(result.clone());
        }
        if self.candidates.is_empty() {
            return self.finish(ctl, ScanStatus::NoActivity, None);
        }

        if self.window.is_none() {
            let window = self.open_window(now, ctl);
            self.window = Some(window);
        }
        let Some(window) = self.window.as_mut() else {
            return ScanStep::Running;
        };

        if !window.failed_open {
            for _ in 0..self.config.frames_per_step {
                let Some(frame) = ctl.receive(0) else {
                    break;
                };
                window.score.record_frame(profile, &frame, &mut self.scratch);
            }
            window.alerts.insert(ctl.read_alerts());

            if elapsed(now, window.started_ms) < window.duration_ms {
                return ScanStep::Running;
            }
        }

        let Some(window) = self.window.take() else {
            return ScanStep::Running;
        };
        let result = close_window(window, ctl.status());
        self.advance(result, ctl)
    }

    fn bitrate_of(&self, rank: Rank) -> u32 {
        self.ranking.get(rank.index()).map_or(0, |score| score.bitrate)
    }

    /// Bitrate and controller setup for the current stage
    fn window_plan(&self) -> (u32, BusMode, u32) {
        let c = &self.config;
        match self.stage {
            Stage::Sample { index } => {
                let bitrate = self.candidates.get(index).copied().unwrap_or(0);
                match self.mode {
                    ScanMode::ListenThenPromote => (bitrate, BusMode::Passive, c.listen_window_ms),
                    ScanMode::NormalOnly => (bitrate, BusMode::Normal, c.normal_window_ms),
                }
            }
            Stage::Confirm { rank, .. } => (self.bitrate_of(rank), BusMode::Passive, c.confirm_window_ms),
            Stage::Guard { rank } => (self.bitrate_of(rank), BusMode::Normal, c.guard_window_ms),
            Stage::Validate { rank } => (self.bitrate_of(rank), BusMode::Normal, c.validate_window_ms),
            Stage::Finished => (0, BusMode::Passive, 0),
        }
    }

    fn open_window<C>(&mut self, now: Millis, ctl: &mut C) -> Window
    where
        C: CanController + ?Sized,
    {
        let (bitrate, mode, duration_ms) = self.window_plan();

        let mut failed_open = false;
        if self.active != Some((bitrate, mode)) {
            self.active = None;
            match ctl.reopen(bitrate, mode) {
                Ok(()) => self.active = Some((bitrate, mode)),
                Err(e) => {
                    warn!("scan: cannot open {} bit/s: {}", bitrate, e);
                    failed_open = true;
                }
            }
        }
        // Alerts from before the window belong to the previous one
        let _ = ctl.read_alerts();
        debug!("scan: window {} bit/s {} for {} ms", bitrate, mode, duration_ms);

        Window {
            started_ms: now,
            duration_ms,
            baseline: ctl.status(),
            alerts: Alerts::NONE,
            score: BaudScore::new(bitrate),
            failed_open,
        }
    }

    fn advance<C>(&mut self, result: WindowResult, ctl: &mut C) -> ScanStep
    where
        C: CanController + ?Sized,
    {
        match self.stage {
            Stage::Sample { index } => {
                if result.failed_open {
                    warn!("scan: skipping {} bit/s", result.score.bitrate);
                } else {
                    self.rank(result.score);
                }
                if index + 1 < self.candidates.len() {
                    self.stage = Stage::Sample { index: index + 1 };
                    return ScanStep::Running;
                }
                self.select(ctl)
            }
            Stage::Confirm { rank, pass } => {
                if !result.failed_open && result.score.meets(&self.thresholds) {
                    self.stage = if pass + 1 < self.config.confirm_passes {
                        Stage::Confirm { rank, pass: pass + 1 }
                    } else {
                        Stage::Guard { rank }
                    };
                    return ScanStep::Running;
                }
                info!("scan: confirmation failed at {} bit/s", result.score.bitrate);
                if rank == Rank::Best && self.runner_up_viable() {
                    self.stage = Stage::Confirm {
                        rank: Rank::Second,
                        pass: 0,
                    };
                    return ScanStep::Running;
                }
                self.finish(ctl, ScanStatus::ConfirmFailed, None)
            }
            Stage::Guard { rank } => {
                if result.clean() {
                    self.stage = Stage::Validate { rank };
                    return ScanStep::Running;
                }
                info!("scan: guard window faulted at {} bit/s", result.score.bitrate);
                self.normal_fallback(rank, ctl)
            }
            Stage::Validate { rank } => {
                if result.clean() && result.score.meets(&self.thresholds) {
                    return self.finish(ctl, ScanStatus::Ok, Some(&result.score));
                }
                info!("scan: validation failed at {} bit/s", result.score.bitrate);
                self.normal_fallback(rank, ctl)
            }
            Stage::Finished => ScanStep::Running,
        }
    }

    /// Insert into the ranking, keeping it sorted and bounded
    fn rank(&mut self, score: BaudScore) {
        let value = score.score();
        let position = self
            .ranking
            .iter()
            .position(|ranked| value > ranked.score())
            .unwrap_or(self.ranking.len());
        if position >= MAX_SCAN_ENTRIES {
            return;
        }
        if self.ranking.is_full() {
            self.ranking.pop();
        }
        let _ = self.ranking.insert(position, score);
    }

    fn runner_up_viable(&self) -> bool {
        self.ranking.get(1).is_some_and(BaudScore::has_activity)
    }

    fn select<C>(&mut self, ctl: &mut C) -> ScanStep
    where
        C: CanController + ?Sized,
    {
        let Some(best) = self.ranking.first() else {
            return self.finish(ctl, ScanStatus::NoActivity, None);
        };
        if !best.has_activity() {
            return self.finish(ctl, ScanStatus::NoActivity, None);
        }
        if let Some(second) = self.ranking.get(1) {
            let margin = i64::from(best.score()) - i64::from(second.score());
            if margin < i64::from(self.config.clear_margin) {
                return self.finish(ctl, ScanStatus::NoClearWinner, None);
            }
        }

        self.stage = match self.mode {
            ScanMode::ListenThenPromote if self.config.confirm_passes > 0 => Stage::Confirm {
                rank: Rank::Best,
                pass: 0,
            },
            _ => Stage::Guard { rank: Rank::Best },
        };
        ScanStep::Running
    }

    /// Normal-only scans get one retry on the runner-up
    fn normal_fallback<C>(&mut self, rank: Rank, ctl: &mut C) -> ScanStep
    where
        C: CanController + ?Sized,
    {
        if self.mode == ScanMode::NormalOnly && rank == Rank::Best && self.runner_up_viable() {
            self.stage = Stage::Guard { rank: Rank::Second };
            return ScanStep::Running;
        }
        self.finish(ctl, ScanStatus::NormalVerifyFailed, None)
    }

    fn finish<C>(&mut self, ctl: &mut C, status: ScanStatus, validated: Option<&BaudScore>) -> ScanStep
    where
        C: CanController + ?Sized,
    {
        // Never leave the controller participating at an unconfirmed speed
        let _ = ctl.stop();
        let _ = ctl.uninstall();
        self.active = None;
        self.stage = Stage::Finished;

        let result = ScanResult {
            status,
            bitrate: validated.map(|score| score.bitrate),
            id_mask: validated.map_or(0, BaudScore::id_mask),
            checksum_match: validated.is_some_and(|score| score.recognized > 0),
            entries: self.ranking.iter().map(BaudScore::entry).collect(),
        };
        match result.bitrate {
            Some(bitrate) => info!("scan: locked {} bit/s, ids {=u16:#x}", bitrate, result.id_mask),
            None => info!("scan: finished without lock: {}", status),
        }
        self.outcome = Some(result.clone());
        ScanStep::Done(result)
    }
}

fn close_window(window: Window, status: ControllerStatus) -> WindowResult {
    let Window {
        baseline,
        alerts,
        mut score,
        failed_open,
        ..
    } = window;

    score.bus_errors = status.bus_error_count.wrapping_sub(baseline.bus_error_count);
    if score.bus_errors == 0 && alerts.contains(Alerts::BUS_ERROR) {
        score.bus_errors = 1;
    }
    score.missed = status.rx_missed_count.wrapping_sub(baseline.rx_missed_count);
    if score.missed == 0 && alerts.contains(Alerts::RX_QUEUE_FULL) {
        score.missed = 1;
    }
    score.overruns = status.rx_overrun_count.wrapping_sub(baseline.rx_overrun_count);
    if score.overruns == 0 && alerts.contains(Alerts::RX_OVERRUN) {
        score.overruns = 1;
    }

    let error_passive = alerts.contains(Alerts::ERROR_PASSIVE) || status.state == ControllerState::ErrorPassive;
    let bus_off = alerts.contains(Alerts::BUS_OFF) || status.state == ControllerState::BusOff;
    // A fault state counts as an error of its own
    score.bus_errors = score
        .bus_errors
        .saturating_add(u32::from(error_passive) + u32::from(bus_off));

    WindowResult {
        score,
        faulted: error_passive || bus_off,
        failed_open,
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::profile::haltech::HALTECH_TABLE;
    use crate::profile::{TableProfile, HALTECH};
    use crate::testing::{MockBus, Traffic};

    const STEP_MS: u32 = 10;

    static NORMAL_ONLY: TableProfile = TableProfile {
        table: &HALTECH_TABLE,
        bitrates: &[1_000_000, 500_000, 250_000, 125_000],
        validation: ValidationThresholds {
            min_total_frames: 20,
            min_distinct_ids: 3,
            min_hits_per_id: 3,
        },
        scan_mode: ScanMode::NormalOnly,
    };

    fn run(bus: &mut MockBus, profile: &dyn DecodeProfile) -> ScanResult {
        let mut scanner = BaudScanner::new(profile, ScanConfig::DEFAULT);
        let mut now = 0;
        loop {
            bus.pump();
            if let ScanStep::Done(result) = scanner.step(now, bus, profile) {
                return result;
            }
            now += STEP_MS;
            assert!(now < 60_000, "scan did not finish");
        }
    }

    #[test]
    fn test_locks_true_bitrate() {
        let mut bus = MockBus::ecu_at(500_000);
        let result = run(&mut bus, &HALTECH);

        assert_eq!(result.status, ScanStatus::Ok);
        assert_eq!(result.bitrate, Some(500_000));
        assert_eq!(result.id_mask, 0b111_1111);
        assert!(result.checksum_match);
        assert_eq!(result.entries[0].bitrate, 500_000);
        assert_eq!(result.entries.len(), MAX_SCAN_ENTRIES);
        assert_eq!(
            result.lock_record(),
            Some(LockRecord::locked(500_000, 0b111_1111, true))
        );

        // Sampled passively, promoted to normal only once confirmed
        let normal: std::vec::Vec<_> = bus.opens.iter().filter(|(_, mode)| *mode == BusMode::Normal).collect();
        assert_eq!(normal, [&(500_000, BusMode::Normal)]);
        // Left closed
        assert_eq!(bus.current(), None);
    }

    #[test]
    fn test_silent_bus_is_no_activity() {
        let mut bus = MockBus::silent();
        let result = run(&mut bus, &HALTECH);
        assert_eq!(result.status, ScanStatus::NoActivity);
        assert_eq!(result.bitrate, None);
        assert!(result.lock_record().is_none());
        assert!(bus.opens.iter().all(|(_, mode)| *mode == BusMode::Passive));
    }

    #[test]
    fn test_close_scores_are_no_clear_winner() {
        let mut bus = MockBus::new(|rate, _| {
            if rate == 500_000 || rate == 250_000 {
                Traffic {
                    frames: 4,
                    ..Traffic::default()
                }
            } else {
                Traffic::default()
            }
        });
        let result = run(&mut bus, &HALTECH);
        assert_eq!(result.status, ScanStatus::NoClearWinner);
        let gap = result.entries[0].score - result.entries[1].score;
        assert!(gap < ScanConfig::DEFAULT.clear_margin as i32);
    }

    #[test]
    fn test_errors_during_confirmation_fail() {
        // Clean while sampled, erroring by the time it is confirmed
        let calls = Rc::new(Cell::new(0u32));
        let counter = calls.clone();
        let mut bus = MockBus::new(move |rate, _| {
            if rate != 250_000 {
                return Traffic::default();
            }
            let n = counter.get();
            counter.set(n + 1);
            Traffic {
                frames: 4,
                errors: u32::from(n >= 30),
                ..Traffic::default()
            }
        });
        let result = run(&mut bus, &HALTECH);
        assert_eq!(result.status, ScanStatus::ConfirmFailed);
        assert_eq!(result.entries[0].bitrate, 250_000);
    }

    #[test]
    fn test_confirm_falls_back_to_runner_up() {
        // 1 Mbit/s wins sampling, then starts erroring before confirmation
        let calls = Rc::new(Cell::new(0u32));
        let counter = calls.clone();
        let mut bus = MockBus::new(move |rate, _| match rate {
            1_000_000 => {
                let n = counter.get();
                counter.set(n + 1);
                Traffic {
                    frames: 8,
                    errors: u32::from(n >= 30),
                    ..Traffic::default()
                }
            }
            500_000 => Traffic {
                frames: 4,
                ..Traffic::default()
            },
            _ => Traffic::default(),
        });
        let result = run(&mut bus, &HALTECH);

        assert_eq!(result.status, ScanStatus::Ok);
        assert_eq!(result.bitrate, Some(500_000));
        assert_eq!(result.entries[0].bitrate, 1_000_000);
        assert_eq!(result.entries[1].bitrate, 500_000);
        // Only the runner-up was ever promoted
        assert!(bus
            .opens
            .iter()
            .filter(|(_, mode)| *mode == BusMode::Normal)
            .all(|(rate, _)| *rate == 500_000));
    }

    #[test]
    fn test_overruns_lower_the_score() {
        // ECU at 500 kbit/s; the first sampled pump drops `lost` frames
        fn bus(lost: u32) -> MockBus {
            let first = Rc::new(Cell::new(true));
            MockBus::new(move |rate: u32, _| {
                if rate != 500_000 {
                    return Traffic::default();
                }
                Traffic {
                    frames: 4,
                    lost: if first.replace(false) { lost } else { 0 },
                    ..Traffic::default()
                }
            })
        }
        let clean = run(&mut bus(0), &HALTECH);
        let dropped = run(&mut bus(2), &HALTECH);

        assert_eq!(clean.entries[0].bitrate, 500_000);
        assert_eq!(dropped.entries[0].bitrate, 500_000);
        assert!(dropped.entries[0].score < clean.entries[0].score);
    }

    #[test]
    fn test_guard_fault_is_normal_verify_failed() {
        // Fine while listening, faults once the controller acknowledges
        let mut bus = MockBus::new(|rate, mode| match (rate, mode) {
            (1_000_000, BusMode::Passive) => Traffic {
                frames: 4,
                ..Traffic::default()
            },
            (1_000_000, BusMode::Normal) => Traffic {
                frames: 4,
                errors: 1,
                error_passive: true,
                ..Traffic::default()
            },
            _ => Traffic::default(),
        });
        let result = run(&mut bus, &HALTECH);
        assert_eq!(result.status, ScanStatus::NormalVerifyFailed);
        assert_eq!(bus.current(), None);
    }

    #[test]
    fn test_normal_only_never_listens() {
        let mut bus = MockBus::new(|rate, mode| match (rate, mode) {
            // The ECU stays quiet until acknowledged
            (250_000, BusMode::Normal) => Traffic {
                frames: 4,
                ..Traffic::default()
            },
            _ => Traffic::default(),
        });
        let result = run(&mut bus, &NORMAL_ONLY);
        assert_eq!(result.status, ScanStatus::Ok);
        assert_eq!(result.bitrate, Some(250_000));
        assert!(bus.opens.iter().all(|(_, mode)| *mode == BusMode::Normal));
    }

    #[test]
    fn test_normal_only_falls_back_to_runner_up() {
        let calls = Rc::new(Cell::new(0u32));
        let counter = calls.clone();
        let mut bus = MockBus::new(move |rate, _| match rate {
            1_000_000 => {
                let n = counter.get();
                counter.set(n + 1);
                // Strong while sampling, faulting by the guard window
                if n < 40 {
                    Traffic {
                        frames: 8,
                        ..Traffic::default()
                    }
                } else {
                    Traffic {
                        errors: 1,
                        ..Traffic::default()
                    }
                }
            }
            500_000 => Traffic {
                frames: 4,
                ..Traffic::default()
            },
            _ => Traffic::default(),
        });
        let result = run(&mut bus, &NORMAL_ONLY);
        assert_eq!(result.status, ScanStatus::Ok);
        assert_eq!(result.bitrate, Some(500_000));
        assert_eq!(result.entries[0].bitrate, 1_000_000);
        assert!(calls.get() >= 40);
    }

    #[test]
    fn test_unsupported_bitrate_skipped() {
        let mut bus = MockBus::ecu_at(125_000);
        bus.unsupported.push(1_000_000);
        let result = run(&mut bus, &HALTECH);
        assert_eq!(result.bitrate, Some(125_000));
        assert!(result.entries.iter().all(|e| e.bitrate != 1_000_000));
    }

    #[test]
    fn test_step_drains_bounded_slice() {
        let mut bus = MockBus::new(|_, _| Traffic {
            frames: 100,
            ..Traffic::default()
        });
        let mut scanner = BaudScanner::new(&HALTECH, ScanConfig::DEFAULT);
        assert_eq!(scanner.step(0, &mut bus, &HALTECH), ScanStep::Running);
        bus.pump();
        assert_eq!(scanner.step(STEP_MS, &mut bus, &HALTECH), ScanStep::Running);
        let left = 100 - ScanConfig::DEFAULT.frames_per_step;
        assert_eq!(bus.status().rx_pending, left);
        assert_eq!(scanner.progress(), ScanProgress::Sampling { index: 0, of: 4 });
    }

    #[test]
    fn test_done_is_sticky() {
        let mut bus = MockBus::silent();
        let result = run(&mut bus, &HALTECH);
        let mut scanner = BaudScanner::new(&HALTECH, ScanConfig::DEFAULT);
        let mut now = 0;
        let first = loop {
            if let ScanStep::Done(r) = scanner.step(now, &mut bus, &HALTECH) {
                break r;
            }
            now += STEP_MS;
        };
        assert_eq!(first, result);
        assert_eq!(scanner.step(now + 1000, &mut bus, &HALTECH), ScanStep::Done(result));
        assert_eq!(scanner.progress(), ScanProgress::Finished);
    }

    #[test]
    fn test_close_window_counts_fault_states() {
        let window = Window {
            started_ms: 0,
            duration_ms: 100,
            baseline: ControllerStatus {
                bus_error_count: 10,
                ..ControllerStatus::default()
            },
            alerts: Alerts::BUS_OFF,
            score: BaudScore::new(500_000),
            failed_open: false,
        };
        let status = ControllerStatus {
            bus_error_count: 12,
            ..ControllerStatus::default()
        };
        let result = close_window(window, status);
        assert!(result.faulted);
        assert_eq!(result.score.bus_errors, 3);
        assert!(!result.clean());
    }
}
