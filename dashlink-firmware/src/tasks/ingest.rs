//! Ingestion task
//!
//! Drains the CAN controller into the signal store while the link is up,
//! or feeds the store from the simulator when `simulate` is set.

use defmt::*;
use embassy_time::{Duration, Ticker};

use dashlink_core::config::LinkConfig;
use dashlink_core::ingest::IngestionWorker;
use dashlink_core::sim::Simulator;
use dashlink_core::telemetry::Telemetry;

use super::now_ms;
use crate::channels::SharedCan;

/// Poll period; one batch per poll must outpace the bus at 1 Mbit/s
pub const INGEST_INTERVAL_MS: u64 = 5;

#[embassy_executor::task]
pub async fn ingest_task(can: &'static SharedCan, telemetry: &'static Telemetry, config: LinkConfig) {
    info!("Ingest task started");

    let Some(writer) = telemetry.signals.claim_writer() else {
        error!("Signal store writer already claimed");
        return;
    };
    let mut worker = IngestionWorker::new(telemetry, writer, config.profile.profile(), config.ingest);
    let mut simulator = Simulator::default();
    worker.switch_source(config.simulate);

    let mut ticker = Ticker::every(Duration::from_millis(INGEST_INTERVAL_MS));
    loop {
        ticker.next().await;
        let now = now_ms();

        if config.simulate {
            simulator.step(now, worker.writer());
            continue;
        }

        let mut ctl = can.lock().await;
        worker.poll(now, &mut *ctl);
    }
}
