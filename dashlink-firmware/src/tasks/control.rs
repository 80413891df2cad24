//! Control loop
//!
//! Drives connection bootstrap (direct connect, scan, bus-off recovery)
//! and the health classifier on a fixed cadence. Lock changes are handed to
//! the persistence task.

use defmt::*;
use embassy_time::{Duration, Ticker};

use dashlink_core::bootstrap::{BootstrapController, BootstrapEvent};
use dashlink_core::config::{LinkConfig, LockRecord};
use dashlink_core::health::HealthClassifier;
use dashlink_core::telemetry::Telemetry;

use super::now_ms;
use crate::channels::{SharedCan, LOCK_SAVE};

/// Control loop period
///
/// Scan windows are at least 150 ms, so this keeps their timing within a
/// few percent.
pub const CONTROL_INTERVAL_MS: u64 = 10;

#[embassy_executor::task]
pub async fn control_task(
    can: &'static SharedCan,
    telemetry: &'static Telemetry,
    config: LinkConfig,
    lock: LockRecord,
) {
    info!("Control task started");

    let profile = config.profile.profile();
    let mut bootstrap = BootstrapController::new(lock, &config);
    let mut health = HealthClassifier::new(config.health);
    let mut ticker = Ticker::every(Duration::from_millis(CONTROL_INTERVAL_MS));

    loop {
        ticker.next().await;
        let now = now_ms();

        if !config.simulate {
            let event = {
                let mut ctl = can.lock().await;
                bootstrap.tick(now, &mut *ctl, profile, telemetry)
            };
            if let Some(event) = event {
                handle_event(&event);
            }
        }

        health.tick(now, telemetry);
    }
}

fn handle_event(event: &BootstrapEvent) {
    if let Some(lock) = event.lock_to_persist() {
        LOCK_SAVE.signal(lock);
    }

    match event {
        BootstrapEvent::ScanFailed(result) => {
            for entry in &result.entries {
                debug!(
                    "  {} bit/s: score={} frames={} ids={} errors={}",
                    entry.bitrate, entry.score, entry.total_frames, entry.distinct_ids, entry.bus_errors
                );
            }
        }
        BootstrapEvent::ConnectFailed { retry_in_ms, .. } => {
            debug!("Reconnect in {} ms", retry_in_ms);
        }
        _ => {}
    }
}
