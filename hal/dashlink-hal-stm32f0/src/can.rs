//! bxCAN controller for STM32F0
//!
//! Wraps embassy-stm32's interrupt-driven bxCAN driver behind the
//! [`CanController`] trait. Passive mode maps to the peripheral's silent
//! mode: the node receives everything but never drives the bus, so it does
//! not acknowledge frames or send error flags.
//!
//! The driver is installed once at boot (pins, clocks, interrupts). "Install"
//! and "uninstall" in the trait sense map to leaving and entering sleep, and
//! "stop" to entering initialization mode, where CANTX is held recessive.
//!
//! The embassy driver does not report receive FIFO overruns, so the FOVR0
//! latch is polled from the register block on every receive and alert read.

use dashlink_hal::{
    Alerts, BusMode, CanController, CanError, CanFrame, CanId, ControllerState, ControllerStatus,
};
use embassy_futures::block_on;
use embassy_stm32::can::filter::Mask32;
use embassy_stm32::can::util::calc_can_timings;
use embassy_stm32::can::{BusError, Can, Fifo, Frame, TryReadError};
use embassy_stm32::pac;
use embassy_stm32::time::Hertz;
use embassy_time::{with_timeout, Duration};
use embedded_can::{Frame as _, Id};

/// CAN controller over the on-chip bxCAN peripheral
pub struct BxCanController<'d> {
    can: Can<'d>,
    kernel_clock: Hertz,
    installed: bool,
    open: Option<(u32, BusMode)>,
    alerts: Alerts,
    status: ControllerStatus,
}

impl<'d> BxCanController<'d> {
    /// Wrap a constructed driver
    ///
    /// `kernel_clock` is the APB clock feeding the peripheral, used to
    /// derive bit timing.
    pub fn new(can: Can<'d>, kernel_clock: Hertz) -> Self {
        Self {
            can,
            kernel_clock,
            installed: false,
            open: None,
            alerts: Alerts::NONE,
            status: ControllerStatus::default(),
        }
    }

    /// Bitrate and mode the controller is open at
    pub fn current(&self) -> Option<(u32, BusMode)> {
        self.open
    }

    /// Discard anything buffered from a previous configuration
    fn drain(&mut self) {
        while self.can.try_read().is_ok() {}
    }

    /// Clear a stale overrun latch without counting it
    fn clear_overrun(&mut self) {
        // FOVR is write-1-to-clear; zeros leave FULL and RFOM untouched
        pac::CAN.rfr(0).write(|w| w.set_fovr(true));
    }

    /// Account for a FIFO 0 overrun latched by the peripheral
    ///
    /// bxCAN only records that at least one frame was lost, so each latch
    /// counts as one missed frame.
    fn poll_overrun(&mut self) {
        if self.open.is_none() || !pac::CAN.rfr(0).read().fovr() {
            return;
        }
        self.clear_overrun();
        let alerts = self.status.record_overrun(1);
        self.alerts.insert(alerts);
    }

    fn note_bus_error(&mut self, error: BusError) {
        match error {
            BusError::BusOff => {
                self.status.state = ControllerState::BusOff;
                self.alerts.insert(Alerts::BUS_OFF);
            }
            BusError::BusPassive => {
                self.status.state = ControllerState::ErrorPassive;
                self.alerts.insert(Alerts::ERROR_PASSIVE);
            }
            BusError::BusWarning => {}
            _ => {
                self.status.bus_error_count = self.status.bus_error_count.wrapping_add(1);
                self.alerts.insert(Alerts::BUS_ERROR);
            }
        }
    }
}

impl CanController for BxCanController<'_> {
    fn open(&mut self, bitrate: u32, mode: BusMode) -> Result<(), CanError> {
        if self.open.is_some() {
            return Err(CanError::InvalidState);
        }
        let timing = calc_can_timings(self.kernel_clock, bitrate).ok_or(CanError::UnsupportedBitrate)?;

        self.can
            .modify_filters()
            .enable_bank(0, Fifo::Fifo0, Mask32::accept_all());
        self.can
            .modify_config()
            .set_bit_timing(timing)
            .set_loopback(false)
            .set_silent(mode == BusMode::Passive);
        block_on(self.can.enable());
        self.drain();
        self.clear_overrun();

        self.installed = true;
        self.open = Some((bitrate, mode));
        self.alerts = Alerts::NONE;
        self.status = ControllerStatus {
            state: ControllerState::Running,
            ..ControllerStatus::default()
        };
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CanError> {
        if !self.installed {
            return Err(CanError::NotInstalled);
        }
        // Dropping the config builder leaves the peripheral in init mode
        drop(self.can.modify_config());
        self.status.state = ControllerState::Stopped;
        Ok(())
    }

    fn uninstall(&mut self) -> Result<(), CanError> {
        if !self.installed {
            return Err(CanError::NotInstalled);
        }
        block_on(self.can.sleep());
        self.drain();
        self.installed = false;
        self.open = None;
        self.status.state = ControllerState::Uninstalled;
        Ok(())
    }

    fn receive(&mut self, timeout_ms: u32) -> Option<CanFrame> {
        self.open?;
        self.poll_overrun();
        let envelope = if timeout_ms == 0 {
            match self.can.try_read() {
                Ok(envelope) => envelope,
                Err(TryReadError::Empty) => return None,
                Err(TryReadError::BusError(error)) => {
                    self.note_bus_error(error);
                    return None;
                }
            }
        } else {
            let read = with_timeout(Duration::from_millis(u64::from(timeout_ms)), self.can.read());
            match block_on(read) {
                Ok(Ok(envelope)) => envelope,
                Ok(Err(error)) => {
                    self.note_bus_error(error);
                    return None;
                }
                Err(_) => return None,
            }
        };
        convert_frame(&envelope.frame)
    }

    fn read_alerts(&mut self) -> Alerts {
        self.poll_overrun();
        core::mem::take(&mut self.alerts)
    }

    fn status(&self) -> ControllerStatus {
        let properties = self.can.properties();
        ControllerStatus {
            tx_error_counter: properties.tx_error_count(),
            rx_error_counter: properties.rx_error_count(),
            ..self.status
        }
    }

    fn release_tx(&mut self) {
        // CANTX is recessive in init and sleep mode
        if self.installed {
            drop(self.can.modify_config());
        }
    }
}

/// Convert a received bxCAN frame
fn convert_frame(frame: &Frame) -> Option<CanFrame> {
    let id = match frame.id() {
        Id::Standard(id) => CanId::standard(id.as_raw()),
        Id::Extended(id) => CanId::extended(id.as_raw()),
    };
    if frame.is_remote_frame() {
        Some(CanFrame::remote(id, frame.dlc() as u8))
    } else {
        CanFrame::new(id, frame.data())
    }
}
