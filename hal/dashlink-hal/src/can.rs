//! CAN bus controller abstractions
//!
//! Provides the frame type and the controller trait that chip-specific HALs
//! implement. The trait is deliberately non-blocking: `receive` takes a
//! timeout and callers in the acquisition core always pass zero, so a tick
//! never waits on the bus.

/// Maximum classic CAN payload length
pub const MAX_DATA_LEN: usize = 8;

/// CAN identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CanId {
    /// 11-bit identifier
    Standard(u16),
    /// 29-bit identifier
    Extended(u32),
}

impl CanId {
    /// Largest standard identifier
    pub const STANDARD_MAX: u16 = 0x7FF;
    /// Largest extended identifier
    pub const EXTENDED_MAX: u32 = 0x1FFF_FFFF;

    /// Create a standard identifier, masking to 11 bits
    pub const fn standard(raw: u16) -> Self {
        CanId::Standard(raw & Self::STANDARD_MAX)
    }

    /// Create an extended identifier, masking to 29 bits
    pub const fn extended(raw: u32) -> Self {
        CanId::Extended(raw & Self::EXTENDED_MAX)
    }

    /// Raw numeric identifier
    pub const fn raw(&self) -> u32 {
        match *self {
            CanId::Standard(id) => id as u32,
            CanId::Extended(id) => id,
        }
    }

    /// Check if this is a 29-bit identifier
    pub const fn is_extended(&self) -> bool {
        matches!(self, CanId::Extended(_))
    }
}

/// A classic CAN frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CanFrame {
    id: CanId,
    remote: bool,
    len: u8,
    data: [u8; MAX_DATA_LEN],
}

impl CanFrame {
    /// Create a data frame
    ///
    /// Returns `None` if the payload exceeds 8 bytes.
    pub fn new(id: CanId, data: &[u8]) -> Option<Self> {
        if data.len() > MAX_DATA_LEN {
            return None;
        }
        let mut buf = [0u8; MAX_DATA_LEN];
        buf[..data.len()].copy_from_slice(data);
        Some(Self {
            id,
            remote: false,
            len: data.len() as u8,
            data: buf,
        })
    }

    /// Create a remote (RTR) frame with the given requested length
    pub fn remote(id: CanId, len: u8) -> Self {
        Self {
            id,
            remote: true,
            len: len.min(MAX_DATA_LEN as u8),
            data: [0; MAX_DATA_LEN],
        }
    }

    /// Frame identifier
    pub fn id(&self) -> CanId {
        self.id
    }

    /// Payload bytes (empty for remote frames)
    pub fn data(&self) -> &[u8] {
        if self.remote {
            &[]
        } else {
            &self.data[..self.len as usize]
        }
    }

    /// Data length code
    pub fn dlc(&self) -> u8 {
        self.len
    }

    /// Check if this is a remote frame
    pub fn is_remote(&self) -> bool {
        self.remote
    }
}

/// Controller operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusMode {
    /// Listen-only: never transmits, never acknowledges
    Passive,
    /// Normal: acknowledges frames and participates in error signalling
    Normal,
}

/// Alert flags raised by the controller since the last `read_alerts` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Alerts(u8);

impl Alerts {
    /// No alerts
    pub const NONE: Alerts = Alerts(0);
    /// A bus error (bit, stuff, form, CRC or ACK) was detected
    pub const BUS_ERROR: Alerts = Alerts(1 << 0);
    /// Error counters crossed the error-passive limit
    pub const ERROR_PASSIVE: Alerts = Alerts(1 << 1);
    /// Controller entered bus-off
    pub const BUS_OFF: Alerts = Alerts(1 << 2);
    /// Software receive queue is full, frames are being dropped
    pub const RX_QUEUE_FULL: Alerts = Alerts(1 << 3);
    /// Hardware receive FIFO overran
    pub const RX_OVERRUN: Alerts = Alerts(1 << 4);

    /// Raw bit representation
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Build from raw bits
    pub const fn from_bits(bits: u8) -> Self {
        Alerts(bits & 0x1F)
    }

    /// Check if no alerts are set
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Check if all flags in `other` are set
    pub const fn contains(self, other: Alerts) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    /// Set the flags in `other`
    pub fn insert(&mut self, other: Alerts) {
        self.0 |= other.0;
    }
}

impl core::ops::BitOr for Alerts {
    type Output = Alerts;

    fn bitor(self, rhs: Alerts) -> Alerts {
        Alerts(self.0 | rhs.0)
    }
}

/// Controller operating state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControllerState {
    /// Driver not installed
    #[default]
    Uninstalled,
    /// Installed but not participating on the bus
    Stopped,
    /// Running, error-active
    Running,
    /// Running, error-passive
    ErrorPassive,
    /// Disconnected from the bus after too many errors
    BusOff,
}

/// Controller status snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControllerStatus {
    /// Operating state
    pub state: ControllerState,
    /// Transmit error counter
    pub tx_error_counter: u8,
    /// Receive error counter
    pub rx_error_counter: u8,
    /// Frames waiting in the receive queue
    pub rx_pending: u16,
    /// Frames lost because the receive queue was full (since open)
    pub rx_missed_count: u32,
    /// Hardware FIFO overruns (since open)
    pub rx_overrun_count: u32,
    /// Bus errors observed (since open)
    pub bus_error_count: u32,
}

impl ControllerStatus {
    /// Account for a receive overrun that dropped `lost` frames
    ///
    /// Returns the alerts the driver raises for it; nothing when no frame
    /// was lost.
    pub fn record_overrun(&mut self, lost: u32) -> Alerts {
        if lost == 0 {
            return Alerts::NONE;
        }
        self.rx_overrun_count = self.rx_overrun_count.wrapping_add(1);
        self.rx_missed_count = self.rx_missed_count.wrapping_add(lost);
        Alerts::RX_OVERRUN | Alerts::RX_QUEUE_FULL
    }
}

/// Errors from controller operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CanError {
    /// Operation requires an installed driver
    NotInstalled,
    /// Operation not allowed in the current state
    InvalidState,
    /// Bit timing cannot be derived for this bitrate
    UnsupportedBitrate,
    /// Low-level driver failure
    Driver,
}

/// CAN controller driver
///
/// Lifecycle: `open` installs and starts the controller at the given speed
/// and mode. `stop` halts bus participation, `uninstall` releases the
/// driver. A mode or speed change always goes through stop + uninstall +
/// open (see [`CanController::reopen`]).
pub trait CanController {
    /// Install and start the controller
    fn open(&mut self, bitrate: u32, mode: BusMode) -> Result<(), CanError>;

    /// Stop bus participation
    fn stop(&mut self) -> Result<(), CanError>;

    /// Release the driver
    fn uninstall(&mut self) -> Result<(), CanError>;

    /// Take the next received frame
    ///
    /// Waits at most `timeout_ms`; zero means poll.
    fn receive(&mut self, timeout_ms: u32) -> Option<CanFrame>;

    /// Read and clear pending alerts
    fn read_alerts(&mut self) -> Alerts;

    /// Current status snapshot
    fn status(&self) -> ControllerStatus;

    /// Drive the transmit line to the recessive level
    ///
    /// Called after the driver is uninstalled so a faulted node cannot hold
    /// the bus dominant.
    fn release_tx(&mut self);

    /// Stop, uninstall and open again with a new speed or mode
    fn reopen(&mut self, bitrate: u32, mode: BusMode) -> Result<(), CanError> {
        // Stop/uninstall fail harmlessly when nothing is installed
        let _ = self.stop();
        let _ = self.uninstall();
        self.open(bitrate, mode)
    }

    /// Stop and uninstall, leaving the transmit line recessive
    fn shutdown(&mut self) {
        let _ = self.stop();
        let _ = self.uninstall();
        self.release_tx();
    }
}
