//! RX line edge counter
//!
//! A sense pin wired to the transceiver's RXD output lets the health
//! classifier tell a live bus at the wrong speed apart from a dead one.
//! At high bus load the task misses edges, so the count is a lower bound.

use defmt::*;
use embassy_stm32::exti::ExtiInput;

use dashlink_core::telemetry::Telemetry;

#[embassy_executor::task]
pub async fn edge_task(mut sense: ExtiInput<'static>, telemetry: &'static Telemetry) {
    info!("Edge counter started");

    loop {
        sense.wait_for_falling_edge().await;
        telemetry.note_edges(1);
    }
}
