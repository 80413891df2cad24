//! Bootstrap states

use crate::time::Millis;

/// Why the controller is waiting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WaitReason {
    /// Recovering from bus-off
    BusOff,
    /// Opening the controller at the locked bitrate failed
    ConnectFailed,
    /// The last scan found no usable bitrate
    ScanFailed,
}

/// Connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BootstrapState {
    /// Deciding between direct connect and scan
    Idle,
    /// Opening the controller at a locked bitrate
    Connecting { bitrate: u32 },
    /// Scan in progress
    Scanning,
    /// Controller open in normal mode, ingestion running
    Connected { bitrate: u32, since: Millis },
    /// Nothing to do until `until`
    Waiting { until: Millis, reason: WaitReason },
}

impl BootstrapState {
    pub fn is_connected(&self) -> bool {
        matches!(self, BootstrapState::Connected { .. })
    }

    pub fn is_scanning(&self) -> bool {
        matches!(self, BootstrapState::Scanning)
    }

    /// A forced rescan may interrupt this state
    ///
    /// Bus-off recovery always sits out its cool-down.
    pub fn allows_forced_scan(&self) -> bool {
        matches!(
            self,
            BootstrapState::Idle
                | BootstrapState::Waiting {
                    reason: WaitReason::ScanFailed,
                    ..
                }
        )
    }
}
