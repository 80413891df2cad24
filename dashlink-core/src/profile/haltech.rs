//! Table-driven profile and the Haltech broadcast table
//!
//! Haltech ECUs broadcast a fixed dash stream on 0x360..0x3EF at 1 Mbit/s.
//! All fields are big-endian; temperatures are sent in 0.1 K and pressures
//! as absolute 0.1 kPa.

use dashlink_hal::{CanFrame, CanId};

use super::table::{FieldSpec, MessageSpec, ProfileTable};
use super::{DecodeProfile, DecodedSignal, DecodedSignals, ScanMode, ValidationThresholds};
use crate::signal::SignalId;

/// Standard atmosphere in kPa, for absolute → gauge pressure
const ATMOSPHERE_KPA: f32 = 101.3;

/// Kelvin → Celsius offset
const KELVIN_OFFSET: f32 = -273.15;

static MSG_360: [FieldSpec; 3] = [
    FieldSpec::msb_unsigned(SignalId::EngineSpeed, 0, 16, 1.0, 0.0),
    FieldSpec::msb_unsigned(SignalId::ManifoldPressure, 16, 16, 0.1, 0.0),
    FieldSpec::msb_signed(SignalId::ThrottlePosition, 32, 16, 0.1, 0.0),
];

static MSG_361: [FieldSpec; 2] = [
    FieldSpec::msb_unsigned(SignalId::FuelPressure, 0, 16, 0.1, -ATMOSPHERE_KPA),
    FieldSpec::msb_unsigned(SignalId::OilPressure, 16, 16, 0.1, -ATMOSPHERE_KPA),
];

static MSG_362: [FieldSpec; 1] = [FieldSpec::msb_signed(SignalId::IgnitionTiming, 32, 16, 0.1, 0.0)];

static MSG_368: [FieldSpec; 1] = [FieldSpec::msb_unsigned(SignalId::Lambda, 0, 16, 0.001, 0.0)];

static MSG_370: [FieldSpec; 1] = [FieldSpec::msb_unsigned(SignalId::VehicleSpeed, 0, 16, 0.1, 0.0)];

static MSG_372: [FieldSpec; 1] = [FieldSpec::msb_unsigned(SignalId::BatteryVoltage, 0, 16, 0.1, 0.0)];

static MSG_3E0: [FieldSpec; 3] = [
    FieldSpec::msb_unsigned(SignalId::CoolantTemp, 0, 16, 0.1, KELVIN_OFFSET),
    FieldSpec::msb_unsigned(SignalId::IntakeAirTemp, 16, 16, 0.1, KELVIN_OFFSET),
    FieldSpec::msb_unsigned(SignalId::OilTemp, 48, 16, 0.1, KELVIN_OFFSET),
];

/// Haltech dash broadcast table
pub static HALTECH_TABLE: ProfileTable = ProfileTable {
    name: "haltech",
    id_min: 0x360,
    id_max: 0x3EF,
    messages: &[
        MessageSpec { id: 0x360, rate_hz: 50, fields: &MSG_360 },
        MessageSpec { id: 0x361, rate_hz: 50, fields: &MSG_361 },
        MessageSpec { id: 0x362, rate_hz: 50, fields: &MSG_362 },
        MessageSpec { id: 0x368, rate_hz: 20, fields: &MSG_368 },
        MessageSpec { id: 0x370, rate_hz: 20, fields: &MSG_370 },
        MessageSpec { id: 0x372, rate_hz: 5, fields: &MSG_372 },
        MessageSpec { id: 0x3E0, rate_hz: 5, fields: &MSG_3E0 },
    ],
};

/// Profile backed by a static [`ProfileTable`]
#[derive(Debug, Clone, Copy)]
pub struct TableProfile {
    pub table: &'static ProfileTable,
    pub bitrates: &'static [u32],
    pub validation: ValidationThresholds,
    pub scan_mode: ScanMode,
}

/// Haltech profile
pub static HALTECH: TableProfile = TableProfile {
    table: &HALTECH_TABLE,
    bitrates: &[1_000_000, 500_000, 250_000, 125_000],
    validation: ValidationThresholds {
        min_total_frames: 20,
        min_distinct_ids: 3,
        min_hits_per_id: 3,
    },
    scan_mode: ScanMode::ListenThenPromote,
};

impl TableProfile {
    fn standard_id(id: CanId) -> Option<u16> {
        match id {
            CanId::Standard(raw) => Some(raw),
            CanId::Extended(_) => None,
        }
    }
}

impl DecodeProfile for TableProfile {
    fn name(&self) -> &'static str {
        self.table.name
    }

    fn accept_id(&self, id: CanId) -> bool {
        Self::standard_id(id).is_some_and(|raw| self.table.in_range(raw))
    }

    fn decode(&self, frame: &CanFrame, out: &mut DecodedSignals) -> usize {
        out.clear();
        if frame.is_remote() {
            return 0;
        }
        let Some(msg) = Self::standard_id(frame.id()).and_then(|raw| self.table.message(raw)) else {
            return 0;
        };
        let payload = frame.data();
        if payload.len() < msg.required_len() {
            return 0;
        }

        for field in msg.fields {
            // Length was checked above, so every field extracts
            if let Some(value) = field.decode(payload) {
                let _ = out.push(DecodedSignal {
                    signal: field.signal,
                    value,
                });
            }
        }
        out.len()
    }

    fn channel_index(&self, id: CanId) -> Option<usize> {
        Self::standard_id(id).and_then(|raw| self.table.position(raw))
    }

    fn expected_id_count(&self) -> usize {
        self.table.messages.len()
    }

    fn candidate_bitrates(&self) -> &'static [u32] {
        self.bitrates
    }

    fn validation(&self) -> ValidationThresholds {
        self.validation
    }

    fn scan_mode(&self) -> ScanMode {
        self.scan_mode
    }
}
