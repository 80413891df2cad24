//! Host-side bus model for tests
//!
//! `MockBus` implements [`CanController`] over a scripted bus. A traffic
//! function decides, for the bitrate and mode the controller is open at,
//! what one `pump` call puts on the bus. `MemFlash` is an in-memory
//! [`FlashStorage`].

extern crate std;

use std::boxed::Box;
use std::collections::VecDeque;
use std::vec::Vec;

use dashlink_hal::{
    Alerts, BusMode, CanController, CanError, CanFrame, CanId, ControllerState, ControllerStatus, FlashError,
    FlashStorage, StorageKey,
};

/// What the bus delivers per pump at one bitrate and mode
#[derive(Debug, Clone, Copy, Default)]
pub struct Traffic {
    /// Valid dash frames received
    pub frames: usize,
    /// Frames outside the profile's range
    pub foreign: usize,
    /// Bus errors raised
    pub errors: u32,
    /// Frames dropped by a receive overrun
    pub lost: u32,
    /// Raise error-passive
    pub error_passive: bool,
    /// Raise bus-off
    pub bus_off: bool,
}

type TrafficFn = Box<dyn Fn(u32, BusMode) -> Traffic>;

/// Scripted controller
pub struct MockBus {
    traffic: TrafficFn,
    open: Option<(u32, BusMode)>,
    queue: VecDeque<CanFrame>,
    alerts: Alerts,
    status: ControllerStatus,
    cursor: usize,
    /// Every successful open
    pub opens: Vec<(u32, BusMode)>,
    pub stops: usize,
    pub uninstalls: usize,
    pub tx_released: bool,
    /// Bitrates `open` refuses
    pub unsupported: Vec<u32>,
}

impl MockBus {
    pub fn new(traffic: impl Fn(u32, BusMode) -> Traffic + 'static) -> Self {
        Self {
            traffic: Box::new(traffic),
            open: None,
            queue: VecDeque::new(),
            alerts: Alerts::NONE,
            status: ControllerStatus::default(),
            cursor: 0,
            opens: Vec::new(),
            stops: 0,
            uninstalls: 0,
            tx_released: false,
            unsupported: Vec::new(),
        }
    }

    /// An ECU broadcasting at `bitrate`, readable in either mode
    pub fn ecu_at(bitrate: u32) -> Self {
        Self::new(move |rate, _| {
            if rate == bitrate {
                Traffic {
                    frames: 4,
                    ..Traffic::default()
                }
            } else {
                Traffic {
                    errors: 1,
                    ..Traffic::default()
                }
            }
        })
    }

    /// Silent bus
    pub fn silent() -> Self {
        Self::new(|_, _| Traffic::default())
    }

    pub fn current(&self) -> Option<(u32, BusMode)> {
        self.open
    }

    /// Put one pump's worth of traffic on the bus
    pub fn pump(&mut self) {
        let Some((bitrate, mode)) = self.open else {
            return;
        };
        let traffic = (self.traffic)(bitrate, mode);
        for _ in 0..traffic.frames {
            let frame = dash_frame(self.cursor);
            self.cursor += 1;
            self.queue.push_back(frame);
        }
        for _ in 0..traffic.foreign {
            self.queue
                .push_back(CanFrame::new(CanId::standard(0x123), &[0; 8]).unwrap());
        }
        let overrun = self.status.record_overrun(traffic.lost);
        self.alerts.insert(overrun);
        if traffic.errors > 0 {
            self.status.bus_error_count += traffic.errors;
            self.alerts.insert(Alerts::BUS_ERROR);
        }
        if traffic.error_passive {
            self.status.state = ControllerState::ErrorPassive;
            self.alerts.insert(Alerts::ERROR_PASSIVE);
        }
        if traffic.bus_off {
            self.status.state = ControllerState::BusOff;
            self.alerts.insert(Alerts::BUS_OFF);
        }
    }

    /// Queue a specific frame
    pub fn inject(&mut self, frame: CanFrame) {
        self.queue.push_back(frame);
    }

    /// Raise alerts directly
    pub fn raise(&mut self, alerts: Alerts) {
        self.alerts.insert(alerts);
    }
}

impl CanController for MockBus {
    fn open(&mut self, bitrate: u32, mode: BusMode) -> Result<(), CanError> {
        if self.open.is_some() {
            return Err(CanError::InvalidState);
        }
        if self.unsupported.contains(&bitrate) {
            return Err(CanError::UnsupportedBitrate);
        }
        self.open = Some((bitrate, mode));
        self.opens.push((bitrate, mode));
        self.queue.clear();
        self.alerts = Alerts::NONE;
        self.status = ControllerStatus {
            state: ControllerState::Running,
            ..ControllerStatus::default()
        };
        self.tx_released = false;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CanError> {
        self.stops += 1;
        if self.open.is_some() {
            self.status.state = ControllerState::Stopped;
        }
        Ok(())
    }

    fn uninstall(&mut self) -> Result<(), CanError> {
        self.uninstalls += 1;
        self.open = None;
        self.queue.clear();
        self.status.state = ControllerState::Uninstalled;
        Ok(())
    }

    fn receive(&mut self, _timeout_ms: u32) -> Option<CanFrame> {
        self.open?;
        self.queue.pop_front()
    }

    fn read_alerts(&mut self) -> Alerts {
        core::mem::take(&mut self.alerts)
    }

    fn status(&self) -> ControllerStatus {
        ControllerStatus {
            rx_pending: self.queue.len() as u16,
            ..self.status
        }
    }

    fn release_tx(&mut self) {
        self.tx_released = true;
    }
}

/// Plausible Haltech dash frames, cycling through the whole table
pub fn dash_frame(n: usize) -> CanFrame {
    let (id, data): (u16, [u8; 8]) = match n % 7 {
        // 3000 rpm, 100 kPa, 25 %
        0 => (0x360, [0x0B, 0xB8, 0x03, 0xE8, 0x00, 0xFA, 0, 0]),
        // 400 kPa absolute fuel and oil
        1 => (0x361, [0x0F, 0xA0, 0x0F, 0xA0, 0, 0, 0, 0]),
        // 15° ignition
        2 => (0x362, [0, 0, 0, 0, 0x00, 0x96, 0, 0]),
        // Lambda 1.000
        3 => (0x368, [0x03, 0xE8, 0, 0, 0, 0, 0, 0]),
        // 50 km/h
        4 => (0x370, [0x01, 0xF4, 0, 0, 0, 0, 0, 0]),
        // 13.8 V
        5 => (0x372, [0x00, 0x8A, 0, 0, 0, 0, 0, 0]),
        // 90 °C coolant, oil, 20 °C intake
        _ => (0x3E0, [0x0E, 0x30, 0x0B, 0x72, 0, 0, 0x0E, 0x30]),
    };
    CanFrame::new(CanId::standard(id), &data).unwrap()
}

/// Engine frame with an impossible engine speed (20 000 rpm)
pub fn implausible_frame() -> CanFrame {
    CanFrame::new(CanId::standard(0x360), &[0x4E, 0x20, 0x03, 0xE8, 0x00, 0xFA, 0, 0]).unwrap()
}

/// In-memory record store
#[derive(Default)]
pub struct MemFlash {
    records: Vec<(StorageKey, Vec<u8>)>,
    /// Calls to `remove`
    pub removals: usize,
}

impl MemFlash {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store raw bytes, bypassing any encoding
    pub fn put(&mut self, key: StorageKey, data: &[u8]) {
        self.records.retain(|(k, _)| *k != key);
        self.records.push((key, data.to_vec()));
    }

    pub fn contains(&self, key: StorageKey) -> bool {
        self.records.iter().any(|(k, _)| *k == key)
    }
}

impl FlashStorage for MemFlash {
    async fn read(&mut self, key: StorageKey, buffer: &mut [u8]) -> Result<usize, FlashError> {
        let (_, data) = self
            .records
            .iter()
            .find(|(k, _)| *k == key)
            .ok_or(FlashError::NotFound)?;
        let out = buffer.get_mut(..data.len()).ok_or(FlashError::TooLarge)?;
        out.copy_from_slice(data);
        Ok(data.len())
    }

    async fn write(&mut self, key: StorageKey, data: &[u8]) -> Result<(), FlashError> {
        self.put(key, data);
        Ok(())
    }

    async fn remove(&mut self, key: StorageKey) -> Result<(), FlashError> {
        self.removals += 1;
        self.records.retain(|(k, _)| *k != key);
        Ok(())
    }
}
