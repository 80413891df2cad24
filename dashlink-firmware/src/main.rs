//! Dashlink - ECU Dash Gauge Firmware
//!
//! Main firmware binary for STM32F072-based gauges. Listens to the
//! broadcast dash stream of an engine-control unit, finds its bus speed,
//! decodes the stream into engineering values and tracks whether the link
//! can be trusted.

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use embassy_stm32::bind_interrupts;
use embassy_stm32::can::{self, Can};
use embassy_stm32::exti::{self, ExtiInput};
use embassy_stm32::flash::Flash;
use embassy_stm32::gpio::Pull;
use embassy_stm32::peripherals::CAN;
use embassy_stm32::time::Hertz;
use embassy_sync::mutex::Mutex;
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use dashlink_core::config::LinkPersistence;
use dashlink_core::telemetry::Telemetry;
use dashlink_hal_stm32f0::{BxCanController, Stm32FlashStorage};

use crate::channels::SharedCan;
use crate::config::EMBEDDED_CONFIG;

mod channels;
mod config;
mod tasks;

/// APB clock feeding bxCAN (HSI48, no prescaling)
const PCLK_HZ: u32 = 48_000_000;

bind_interrupts!(struct Irqs {
    CEC_CAN => can::Rx0InterruptHandler<CAN>, can::Rx1InterruptHandler<CAN>,
        can::SceInterruptHandler<CAN>, can::TxInterruptHandler<CAN>;
    EXTI0_1 => exti::InterruptHandler<embassy_stm32::interrupt::typelevel::EXTI0_1>;
});

// Static cells for state shared between tasks (must live forever)
static TELEMETRY: StaticCell<Telemetry> = StaticCell::new();
static CAN_BUS: StaticCell<SharedCan> = StaticCell::new();

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Dashlink firmware starting...");

    let p = embassy_stm32::init(clock_config());
    info!("Peripherals initialized");

    // Load configuration from flash (or use embedded defaults)
    let mut persistence = LinkPersistence::new(Stm32FlashStorage::new(Flash::new_blocking(p.FLASH)));
    let config = persistence.load_config(EMBEDDED_CONFIG).await;
    let lock = persistence.load_lock().await;
    info!(
        "Profile: {}, simulate={}",
        config.profile.profile().name(),
        config.simulate
    );

    let telemetry: &'static Telemetry = TELEMETRY.init(Telemetry::new());
    config.store.apply(&telemetry.signals);

    // bxCAN on PB8 (RX) / PB9 (TX)
    let can = Can::new(p.CAN, p.PB8, p.PB9, Irqs);
    let can: &'static SharedCan = CAN_BUS.init(Mutex::new(BxCanController::new(can, Hertz(PCLK_HZ))));
    info!("CAN initialized");

    // PB0 senses the transceiver RXD line
    let sense = ExtiInput::new(p.PB0, p.EXTI0, Pull::None, Irqs);

    spawner.spawn(tasks::persist_task(persistence)).unwrap();
    spawner.spawn(tasks::edge_task(sense, telemetry)).unwrap();
    spawner.spawn(tasks::ingest_task(can, telemetry, config)).unwrap();
    spawner.spawn(tasks::control_task(can, telemetry, config, lock)).unwrap();

    info!("All tasks spawned");
}

/// 48 MHz from the internal HSI48 oscillator
fn clock_config() -> embassy_stm32::Config {
    use embassy_stm32::rcc::*;

    let mut config = embassy_stm32::Config::default();
    config.rcc.hsi48 = Some(Hsi48Config { sync_from_usb: false });
    config.rcc.sys = Sysclk::HSI48;
    config.rcc.ahb_pre = AHBPrescaler::DIV1;
    config.rcc.apb1_pre = APBPrescaler::DIV1;
    config
}
