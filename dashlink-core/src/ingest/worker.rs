//! Steady-state frame ingestion

use dashlink_hal::{Alerts, CanController};

use crate::config::IngestConfig;
use crate::profile::{DecodeProfile, DecodedSignals};
use crate::signal::{SignalFlags, SignalWriter};
use crate::telemetry::Telemetry;
use crate::time::{elapsed, Millis};

/// What one [`IngestionWorker::poll`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IngestOutcome {
    /// Not connected; nothing drained
    Idle,
    /// Frames drained (possibly zero)
    Drained(u16),
    /// The controller went bus-off and was torn down
    BusOff,
}

/// Counter increments gathered during one poll
#[derive(Debug, Default)]
struct Tally {
    total: u32,
    matched: u32,
    recognized: u32,
    out_of_range: u32,
    last_rx: Option<Millis>,
    last_match: Option<Millis>,
}

/// Drains the connected controller into the signal store
///
/// Owns the store's writer handle while live data flows. The simulator
/// borrows the same handle through [`IngestionWorker::writer`] so there is
/// never a second writer.
pub struct IngestionWorker<'a> {
    telemetry: &'a Telemetry,
    writer: SignalWriter<'a>,
    profile: &'a dyn DecodeProfile,
    config: IngestConfig,
    last_status_ms: Option<Millis>,
    scratch: DecodedSignals,
}

impl<'a> IngestionWorker<'a> {
    pub fn new(
        telemetry: &'a Telemetry,
        writer: SignalWriter<'a>,
        profile: &'a dyn DecodeProfile,
        config: IngestConfig,
    ) -> Self {
        Self {
            telemetry,
            writer,
            profile,
            config,
            last_status_ms: None,
            scratch: DecodedSignals::new(),
        }
    }

    /// Change the active profile
    pub fn set_profile(&mut self, profile: &'a dyn DecodeProfile) {
        self.profile = profile;
    }

    /// Signal store writer, for the simulator
    pub fn writer(&mut self) -> &mut SignalWriter<'a> {
        &mut self.writer
    }

    /// Switch between live and simulated samples
    pub fn switch_source(&mut self, simulated: bool) {
        self.telemetry.switch_source(&mut self.writer, simulated);
    }

    /// Drain up to one batch of frames
    pub fn poll<C>(&mut self, now: Millis, ctl: &mut C) -> IngestOutcome
    where
        C: CanController + ?Sized,
    {
        let flags = self.telemetry.flags();
        if !flags.ingest_ready || flags.simulated {
            return IngestOutcome::Idle;
        }

        let mut tally = Tally::default();
        let mut drained: u16 = 0;
        while drained < self.config.batch_frames {
            let Some(frame) = ctl.receive(0) else {
                break;
            };
            drained += 1;

            self.telemetry.log_frame(now, frame);
            tally.total += 1;
            tally.last_rx = Some(now);

            if !self.profile.accept_frame(&frame) {
                continue;
            }
            tally.matched += 1;
            tally.last_match = Some(now);

            if self.profile.decode(&frame, &mut self.scratch) == 0 {
                continue;
            }
            tally.recognized += 1;

            for decoded in &self.scratch {
                if decoded.signal.is_plausible(decoded.value) {
                    self.writer
                        .record(decoded.signal, decoded.value, now, SignalFlags::NONE);
                } else {
                    tally.out_of_range += 1;
                    self.writer
                        .mark_invalid(decoded.signal, now, self.config.invalid_hold_ms);
                    trace!("implausible {}: {}", decoded.signal, decoded.value);
                }
            }
        }

        let alerts = ctl.read_alerts();
        let status = match self.last_status_ms {
            Some(at) if elapsed(now, at) < self.config.status_interval_ms => None,
            _ => {
                self.last_status_ms = Some(now);
                Some(ctl.status())
            }
        };

        self.telemetry.update_counters(|c| {
            c.total_rx = c.total_rx.wrapping_add(tally.total);
            c.matched = c.matched.wrapping_add(tally.matched);
            c.recognized = c.recognized.wrapping_add(tally.recognized);
            c.out_of_range = c.out_of_range.wrapping_add(tally.out_of_range);
            if let Some(at) = tally.last_rx {
                c.last_rx_ms = at;
                c.seen_any = true;
            }
            if let Some(at) = tally.last_match {
                c.last_match_ms = at;
                c.seen_match = true;
            }
            if alerts.contains(Alerts::ERROR_PASSIVE) {
                c.error_passive = c.error_passive.wrapping_add(1);
            }
            if alerts.contains(Alerts::RX_QUEUE_FULL) || alerts.contains(Alerts::RX_OVERRUN) {
                c.rx_queue_full = c.rx_queue_full.wrapping_add(1);
            }
            if alerts.contains(Alerts::BUS_OFF) {
                c.bus_off = c.bus_off.wrapping_add(1);
            }
            if let Some(status) = status {
                c.controller = status;
            }
        });

        if alerts.contains(Alerts::BUS_OFF) {
            warn!("bus-off, shutting controller down");
            ctl.shutdown();
            self.telemetry.raise_bus_off();
            self.last_status_ms = None;
            return IngestOutcome::BusOff;
        }
        if alerts.contains(Alerts::ERROR_PASSIVE) {
            debug!("controller error-passive");
        }

        IngestOutcome::Drained(drained)
    }
}
