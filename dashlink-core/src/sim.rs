//! Synthetic telemetry
//!
//! Drives the signal store when no live link is available, for bench
//! testing the dash without an ECU. Every value sweeps a triangle wave
//! inside a realistic band of its channel and is flagged
//! [`SignalFlags::SIMULATED`].

use crate::signal::{SignalFlags, SignalId, SignalWriter};
use crate::time::{elapsed, Millis};

/// Default spacing between simulated updates
pub const SIM_INTERVAL_MS: u32 = 50;

/// Sweep band and period of one channel
#[derive(Debug, Clone, Copy)]
struct Sweep {
    low: f32,
    high: f32,
    period_ms: u32,
}

const fn sweep(low: f32, high: f32, period_ms: u32) -> Sweep {
    Sweep { low, high, period_ms }
}

const SWEEPS: [Sweep; SignalId::COUNT] = [
    sweep(900.0, 7_200.0, 8_000),  // EngineSpeed
    sweep(30.0, 180.0, 8_000),     // ManifoldPressure
    sweep(0.0, 100.0, 4_000),      // ThrottlePosition
    sweep(70.0, 105.0, 120_000),   // CoolantTemp
    sweep(20.0, 55.0, 90_000),     // IntakeAirTemp
    sweep(150.0, 650.0, 8_000),    // OilPressure
    sweep(80.0, 125.0, 150_000),   // OilTemp
    sweep(280.0, 320.0, 6_000),    // FuelPressure
    sweep(13.2, 14.6, 30_000),     // BatteryVoltage
    sweep(0.78, 1.10, 5_000),      // Lambda
    sweep(5.0, 38.0, 8_000),       // IgnitionTiming
    sweep(0.0, 180.0, 60_000),     // VehicleSpeed
];

/// Synthetic data source
#[derive(Debug, Clone)]
pub struct Simulator {
    interval_ms: u32,
    last_ms: Option<Millis>,
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new(SIM_INTERVAL_MS)
    }
}

impl Simulator {
    pub const fn new(interval_ms: u32) -> Self {
        Self {
            interval_ms,
            last_ms: None,
        }
    }

    /// Value of `id` at `now`
    pub fn value(id: SignalId, now: Millis) -> f32 {
        let sweep = SWEEPS[id.index()];
        // Stagger channels so they don't peak together
        let offset = (id.index() as u32).wrapping_mul(1_337);
        let phase = now.wrapping_add(offset) % sweep.period_ms;
        let half = sweep.period_ms / 2;
        let rising = if phase < half { phase } else { sweep.period_ms - phase };
        let position = rising as f32 / half as f32;
        sweep.low + (sweep.high - sweep.low) * position
    }

    /// Write every channel if the update interval has passed
    ///
    /// Returns whether anything was written.
    pub fn step(&mut self, now: Millis, writer: &mut SignalWriter<'_>) -> bool {
        if let Some(last) = self.last_ms {
            if elapsed(now, last) < self.interval_ms {
                return false;
            }
        }
        self.last_ms = Some(now);
        for id in SignalId::ALL {
            writer.record(id, Self::value(id, now), now, SignalFlags::SIMULATED);
        }
        true
    }
}
