//! Connection bootstrap
//!
//! Decides between connecting at a persisted bitrate and scanning for one,
//! and recovers from bus-off. Like the scanner it never blocks: the control
//! loop calls [`BootstrapController::tick`] periodically and acts on the
//! returned [`BootstrapEvent`].

use dashlink_hal::{BusMode, CanController};

use super::backoff::Backoff;
use super::events::BootstrapEvent;
use super::state::{BootstrapState, WaitReason};
use crate::config::{BackoffConfig, LinkConfig, LockRecord, ScanConfig};
use crate::profile::DecodeProfile;
use crate::scan::{BaudScanner, ScanProgress, ScanStep};
use crate::telemetry::Telemetry;
use crate::time::{age, elapsed, reached, Millis};

/// Owns the controller lifecycle outside steady-state ingestion
pub struct BootstrapController {
    config: BackoffConfig,
    scan_config: ScanConfig,
    state: BootstrapState,
    lock: LockRecord,
    scanner: Option<BaudScanner>,
    /// Bus-off and connect retries
    retry: Backoff,
    /// Consecutive failed scans
    scan_retry: Backoff,
    /// When the lock was last lost (or first observed missing)
    unlocked_since: Option<Millis>,
    last_forced_scan: Option<Millis>,
}

impl BootstrapController {
    /// Start from the persisted lock record
    pub fn new(lock: LockRecord, config: &LinkConfig) -> Self {
        let backoff = config.backoff;
        Self {
            config: backoff,
            scan_config: config.scan,
            state: BootstrapState::Idle,
            lock,
            scanner: None,
            retry: Backoff::new(backoff.base_ms, backoff.max_ms),
            scan_retry: Backoff::new(backoff.scan_retry_ms, backoff.scan_retry_max_ms),
            unlocked_since: None,
            last_forced_scan: None,
        }
    }

    pub fn state(&self) -> BootstrapState {
        self.state
    }

    /// Current lock record
    pub fn lock(&self) -> LockRecord {
        self.lock
    }

    /// Progress of the running scan, if any
    pub fn scan_progress(&self) -> Option<ScanProgress> {
        self.scanner.as_ref().map(BaudScanner::progress)
    }

    /// Consecutive bus-off or connect retries since the link was last stable
    pub fn retry_attempts(&self) -> u8 {
        self.retry.attempts()
    }

    /// Drop the lock and start over, e.g. after a profile change
    ///
    /// Returns the cleared record for persistence.
    pub fn forget_lock<C>(&mut self, ctl: &mut C, telemetry: &Telemetry) -> LockRecord
    where
        C: CanController + ?Sized,
    {
        let _ = ctl.stop();
        let _ = ctl.uninstall();
        telemetry.clear_connected();

        self.lock = self.lock.cleared();
        self.scanner = None;
        self.state = BootstrapState::Idle;
        self.retry.reset();
        self.scan_retry.reset();
        self.unlocked_since = None;
        self.last_forced_scan = None;
        info!("lock forgotten");
        self.lock
    }

    /// Advance the lifecycle by one bounded slice of work
    pub fn tick<C>(
        &mut self,
        now: Millis,
        ctl: &mut C,
        profile: &dyn DecodeProfile,
        telemetry: &Telemetry,
    ) -> Option<BootstrapEvent>
    where
        C: CanController + ?Sized,
    {
        if telemetry.take_bus_off() {
            return Some(self.on_bus_off(now));
        }

        if !self.lock.locked {
            self.unlocked_since.get_or_insert(now);
        }
        if self.stuck(now, profile, telemetry) {
            warn!("no frames while unlocked, forcing a scan");
            self.last_forced_scan = Some(now);
            self.start_scan(profile);
            return Some(BootstrapEvent::RescanForced);
        }

        match self.state {
            BootstrapState::Idle => {
                if self.lock.usable() {
                    self.state = BootstrapState::Connecting {
                        bitrate: self.lock.bitrate,
                    };
                } else if profile.can_scan() {
                    self.start_scan(profile);
                }
                None
            }
            BootstrapState::Connecting { bitrate } => Some(self.connect(now, bitrate, ctl, telemetry)),
            BootstrapState::Scanning => self.step_scan(now, ctl, profile),
            BootstrapState::Connected { bitrate, since } => {
                if !telemetry.diagnostic().health.is_ok() {
                    self.state = BootstrapState::Connected { bitrate, since: now };
                } else if self.retry.attempts() > 0 && elapsed(now, since) >= self.config.stable_ms {
                    debug!("link stable, backoff reset");
                    self.retry.reset();
                }
                None
            }
            BootstrapState::Waiting { until, .. } => {
                if reached(now, until) {
                    self.state = BootstrapState::Idle;
                }
                None
            }
        }
    }

    fn on_bus_off(&mut self, now: Millis) -> BootstrapEvent {
        let delay = self.retry.next_delay().max(self.config.cooldown_ms);
        self.lock = self.lock.cleared();
        self.scanner = None;
        self.unlocked_since = Some(now);
        self.state = BootstrapState::Waiting {
            until: now.wrapping_add(delay),
            reason: WaitReason::BusOff,
        };
        warn!("bus-off, lock cleared, retry in {} ms", delay);
        BootstrapEvent::LockCleared {
            lock: self.lock,
            retry_in_ms: delay,
        }
    }

    /// Unlocked, silent and not forced recently
    fn stuck(&self, now: Millis, profile: &dyn DecodeProfile, telemetry: &Telemetry) -> bool {
        if self.lock.locked || !profile.can_scan() || !self.state.allows_forced_scan() {
            return false;
        }
        let Some(unlocked_since) = self.unlocked_since else {
            return false;
        };
        if elapsed(now, unlocked_since) < self.config.stuck_ms {
            return false;
        }
        let counters = telemetry.counters();
        if counters.seen_any && age(now, counters.last_rx_ms) < self.config.stuck_ms {
            return false;
        }
        match self.last_forced_scan {
            Some(at) => elapsed(now, at) >= self.config.stuck_interval_ms,
            None => true,
        }
    }

    fn start_scan(&mut self, profile: &dyn DecodeProfile) {
        info!("scanning for {} bus speed", profile.name());
        self.scanner = Some(BaudScanner::new(profile, self.scan_config));
        self.state = BootstrapState::Scanning;
    }

    fn step_scan<C>(&mut self, now: Millis, ctl: &mut C, profile: &dyn DecodeProfile) -> Option<BootstrapEvent>
    where
        C: CanController + ?Sized,
    {
        let Some(scanner) = self.scanner.as_mut() else {
            self.state = BootstrapState::Idle;
            return None;
        };
        let ScanStep::Done(result) = scanner.step(now, ctl, profile) else {
            return None;
        };
        self.scanner = None;

        match result.lock_record() {
            Some(lock) => {
                info!("locked at {} bit/s", lock.bitrate);
                self.lock = lock;
                self.scan_retry.reset();
                self.unlocked_since = None;
                self.state = BootstrapState::Connecting { bitrate: lock.bitrate };
                Some(BootstrapEvent::LockAcquired(lock))
            }
            None => {
                let delay = self.scan_retry.next_delay();
                warn!("scan failed: {}, retry in {} ms", result.status, delay);
                self.state = BootstrapState::Waiting {
                    until: now.wrapping_add(delay),
                    reason: WaitReason::ScanFailed,
                };
                Some(BootstrapEvent::ScanFailed(result))
            }
        }
    }

    fn connect<C>(&mut self, now: Millis, bitrate: u32, ctl: &mut C, telemetry: &Telemetry) -> BootstrapEvent
    where
        C: CanController + ?Sized,
    {
        match ctl.reopen(bitrate, BusMode::Normal) {
            Ok(()) => {
                telemetry.set_connected(bitrate);
                self.state = BootstrapState::Connected { bitrate, since: now };
                info!("connected at {} bit/s", bitrate);
                BootstrapEvent::Connected { bitrate }
            }
            Err(error) => {
                let delay = self.retry.next_delay();
                self.state = BootstrapState::Waiting {
                    until: now.wrapping_add(delay),
                    reason: WaitReason::ConnectFailed,
                };
                error!("open at {} bit/s failed: {}", bitrate, error);
                BootstrapEvent::ConnectFailed {
                    bitrate,
                    error,
                    retry_in_ms: delay,
                }
            }
        }
    }
}
