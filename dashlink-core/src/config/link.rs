//! Link tuning parameters
//!
//! Every threshold the acquisition core uses lives here with a compiled-in
//! default. The firmware overlays `link.toml` on top of [`LinkConfig::DEFAULT`].

use serde::{Deserialize, Serialize};

use crate::profile::ProfileKind;
use crate::signal::{SignalId, SignalStore};

/// Bus-speed scanner timing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ScanConfig {
    /// Passive sampling window per candidate
    pub listen_window_ms: u32,
    /// Normal-mode sampling window per candidate (normal-only mode)
    pub normal_window_ms: u32,
    /// Passive confirmation window
    pub confirm_window_ms: u32,
    /// Confirmation windows the best candidate must pass
    pub confirm_passes: u8,
    /// Normal-mode guard window after confirmation
    pub guard_window_ms: u32,
    /// Normal-mode validation window after the guard
    pub validate_window_ms: u32,
    /// Minimum score gap between best and second-best
    pub clear_margin: u32,
    /// Frames drained per scanner step
    pub frames_per_step: u16,
}

impl ScanConfig {
    pub const DEFAULT: ScanConfig = ScanConfig {
        listen_window_ms: 250,
        normal_window_ms: 300,
        confirm_window_ms: 400,
        confirm_passes: 2,
        guard_window_ms: 150,
        validate_window_ms: 400,
        clear_margin: 300,
        frames_per_step: 32,
    };
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Ingestion worker budgets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IngestConfig {
    /// Frames drained per poll
    pub batch_frames: u16,
    /// Invalidity hold after an implausible decode
    pub invalid_hold_ms: u32,
    /// Controller status snapshot interval
    pub status_interval_ms: u32,
}

impl IngestConfig {
    pub const DEFAULT: IngestConfig = IngestConfig {
        batch_frames: 64,
        invalid_hold_ms: 500,
        status_interval_ms: 1000,
    };
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Health classifier thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct HealthConfig {
    /// Link-state window
    pub link_window_ms: u32,
    /// Frames a link window needs before it can report no profile match
    pub no_match_floor: u32,
    /// Silence before NoFrames
    pub no_frames_ms: u32,
    /// Silence before Stale
    pub lag_ms: u32,
    /// Time without a matched frame before DecodeBad
    pub no_match_ms: u32,
    /// Out-of-range counting window
    pub oor_window_ms: u32,
    /// Out-of-range samples per window that mean Implausible
    pub implausible_count: u32,
    /// Matched frames per window before the ratio test applies
    pub ratio_min_samples: u32,
    /// Out-of-range percentage of matched frames that means DecodeBad
    pub ratio_percent: u8,
    /// Edges per link window that prove the bus is alive
    pub edge_activity_min: u32,
    /// Minimum time spent in NoFrames once entered
    pub no_frames_dwell_ms: u32,
    /// A frame this recent ends the NoFrames dwell early
    pub recent_frame_ms: u32,
}

impl HealthConfig {
    pub const DEFAULT: HealthConfig = HealthConfig {
        link_window_ms: 1000,
        no_match_floor: 5,
        no_frames_ms: 2000,
        lag_ms: 500,
        no_match_ms: 1500,
        oor_window_ms: 2000,
        implausible_count: 20,
        ratio_min_samples: 50,
        ratio_percent: 10,
        edge_activity_min: 500,
        no_frames_dwell_ms: 3000,
        recent_frame_ms: 200,
    };
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Bootstrap retry schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BackoffConfig {
    /// First bus-off retry delay
    pub base_ms: u32,
    /// Longest bus-off retry delay
    pub max_ms: u32,
    /// Minimum wait after any bus-off
    pub cooldown_ms: u32,
    /// Delay after the first failed scan; doubles per consecutive failure
    pub scan_retry_ms: u32,
    /// Longest delay between scans
    pub scan_retry_max_ms: u32,
    /// Connected time after which the bus-off backoff resets
    pub stable_ms: u32,
    /// Silence while unlocked before a fresh scan is forced
    pub stuck_ms: u32,
    /// Minimum spacing of forced scans
    pub stuck_interval_ms: u32,
}

impl BackoffConfig {
    pub const DEFAULT: BackoffConfig = BackoffConfig {
        base_ms: 1000,
        max_ms: 30_000,
        cooldown_ms: 5000,
        scan_retry_ms: 5000,
        scan_retry_max_ms: 300_000,
        stable_ms: 30_000,
        stuck_ms: 60_000,
        stuck_interval_ms: 120_000,
    };
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Staleness applied to every channel at startup
///
/// `None` keeps each channel's built-in default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StoreConfig {
    pub stale_ms: Option<u32>,
    pub expire_ms: Option<u32>,
}

impl StoreConfig {
    /// Push the thresholds into `store`, keeping per-channel defaults where unset
    pub fn apply(&self, store: &SignalStore) {
        for id in SignalId::ALL {
            let (stale, expire) = id.default_thresholds();
            store.set_staleness(
                id,
                self.stale_ms.unwrap_or(stale),
                self.expire_ms.unwrap_or(expire),
            );
        }
    }
}

/// Complete link configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkConfig {
    /// Active ECU family
    pub profile: ProfileKind,
    /// Drive the store from the simulator instead of the bus
    pub simulate: bool,
    pub scan: ScanConfig,
    pub ingest: IngestConfig,
    pub health: HealthConfig,
    pub backoff: BackoffConfig,
    pub store: StoreConfig,
}

impl LinkConfig {
    pub const DEFAULT: LinkConfig = LinkConfig {
        profile: ProfileKind::Haltech,
        simulate: false,
        scan: ScanConfig::DEFAULT,
        ingest: IngestConfig::DEFAULT,
        health: HealthConfig::DEFAULT,
        backoff: BackoffConfig::DEFAULT,
        store: StoreConfig {
            stale_ms: None,
            expire_ms: None,
        },
    };

    /// Check the configuration for values the core cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scan.frames_per_step == 0 || self.ingest.batch_frames == 0 {
            return Err(ConfigError::ZeroBudget);
        }
        if self.scan.listen_window_ms == 0
            || self.scan.normal_window_ms == 0
            || self.scan.confirm_window_ms == 0
            || self.scan.guard_window_ms == 0
            || self.scan.validate_window_ms == 0
            || self.health.link_window_ms == 0
            || self.health.oor_window_ms == 0
        {
            return Err(ConfigError::ZeroWindow);
        }
        if self.health.lag_ms >= self.health.no_frames_ms {
            return Err(ConfigError::LagNotBelowNoFrames);
        }
        if self.backoff.base_ms == 0 || self.backoff.base_ms > self.backoff.max_ms {
            return Err(ConfigError::InvalidBackoff);
        }
        if self.backoff.scan_retry_ms > self.backoff.scan_retry_max_ms {
            return Err(ConfigError::InvalidBackoff);
        }
        if let (Some(stale), Some(expire)) = (self.store.stale_ms, self.store.expire_ms) {
            if expire < stale {
                return Err(ConfigError::ExpiryBeforeStale);
            }
        }
        Ok(())
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Configuration rejected by [`LinkConfig::validate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// A step or batch budget is zero
    ZeroBudget,
    /// A sampling window is zero
    ZeroWindow,
    /// The lag threshold must be shorter than the no-frames threshold
    LagNotBelowNoFrames,
    /// Backoff base is zero or above its cap
    InvalidBackoff,
    /// Channel expiry shorter than staleness
    ExpiryBeforeStale,
}
