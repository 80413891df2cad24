//! Telemetry channel identifiers

/// Physical telemetry channels
///
/// The set is fixed for the lifetime of the process. Each channel has a
/// stable index into the signal store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum SignalId {
    /// Engine speed (rpm)
    EngineSpeed = 0,
    /// Manifold absolute pressure (kPa)
    ManifoldPressure = 1,
    /// Throttle position (%)
    ThrottlePosition = 2,
    /// Coolant temperature (°C)
    CoolantTemp = 3,
    /// Intake air temperature (°C)
    IntakeAirTemp = 4,
    /// Oil pressure (kPa, gauge)
    OilPressure = 5,
    /// Oil temperature (°C)
    OilTemp = 6,
    /// Fuel pressure (kPa, gauge)
    FuelPressure = 7,
    /// Battery voltage (V)
    BatteryVoltage = 8,
    /// Wideband lambda
    Lambda = 9,
    /// Ignition timing (° BTDC)
    IgnitionTiming = 10,
    /// Vehicle speed (km/h)
    VehicleSpeed = 11,
}

impl SignalId {
    /// Number of channels
    pub const COUNT: usize = 12;

    /// All channels in index order
    pub const ALL: [SignalId; Self::COUNT] = [
        SignalId::EngineSpeed,
        SignalId::ManifoldPressure,
        SignalId::ThrottlePosition,
        SignalId::CoolantTemp,
        SignalId::IntakeAirTemp,
        SignalId::OilPressure,
        SignalId::OilTemp,
        SignalId::FuelPressure,
        SignalId::BatteryVoltage,
        SignalId::Lambda,
        SignalId::IgnitionTiming,
        SignalId::VehicleSpeed,
    ];

    /// Store index
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Look up a channel by store index
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Range of physically plausible values
    ///
    /// A decoded value outside this range is treated as corruption, not as
    /// a reading.
    pub const fn plausible_range(self) -> (f32, f32) {
        match self {
            SignalId::EngineSpeed => (0.0, 12_000.0),
            SignalId::ManifoldPressure => (0.0, 400.0),
            SignalId::ThrottlePosition => (-5.0, 105.0),
            SignalId::CoolantTemp => (-40.0, 150.0),
            SignalId::IntakeAirTemp => (-40.0, 150.0),
            SignalId::OilPressure => (-50.0, 1_200.0),
            SignalId::OilTemp => (-40.0, 180.0),
            SignalId::FuelPressure => (-50.0, 1_000.0),
            SignalId::BatteryVoltage => (0.0, 20.0),
            SignalId::Lambda => (0.5, 2.0),
            SignalId::IgnitionTiming => (-30.0, 70.0),
            SignalId::VehicleSpeed => (0.0, 400.0),
        }
    }

    /// Check a physical value against [`SignalId::plausible_range`]
    pub fn is_plausible(self, value: f32) -> bool {
        let (min, max) = self.plausible_range();
        // NaN fails both comparisons
        value >= min && value <= max
    }

    /// Default staleness and expiry thresholds in milliseconds
    ///
    /// Fast channels are broadcast at 50 Hz, temperatures at 5 Hz.
    pub const fn default_thresholds(self) -> (u32, u32) {
        match self {
            SignalId::CoolantTemp
            | SignalId::IntakeAirTemp
            | SignalId::OilTemp
            | SignalId::BatteryVoltage => (1_000, 3_000),
            _ => (250, 1_000),
        }
    }

    /// Short label for diagnostics
    pub const fn label(self) -> &'static str {
        match self {
            SignalId::EngineSpeed => "RPM",
            SignalId::ManifoldPressure => "MAP",
            SignalId::ThrottlePosition => "TPS",
            SignalId::CoolantTemp => "CLT",
            SignalId::IntakeAirTemp => "IAT",
            SignalId::OilPressure => "OILP",
            SignalId::OilTemp => "OILT",
            SignalId::FuelPressure => "FUELP",
            SignalId::BatteryVoltage => "BATT",
            SignalId::Lambda => "LAM",
            SignalId::IgnitionTiming => "IGN",
            SignalId::VehicleSpeed => "VSS",
        }
    }
}
