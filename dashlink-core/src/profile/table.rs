//! Compiled-in decode tables
//!
//! A table maps broadcast message identifiers to the bit fields they carry.
//! Tables are `static` and never modified at runtime.

use super::bits::{extract_bits, interpret, BitOrder, Signedness};
use crate::signal::SignalId;

/// One bit field inside a message
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    /// Target channel
    pub signal: SignalId,
    /// First bit, numbered per `order`
    pub start_bit: u16,
    /// Width in bits (1..=32)
    pub length: u8,
    pub signedness: Signedness,
    pub scale: f32,
    pub offset: f32,
    pub order: BitOrder,
}

impl FieldSpec {
    /// Big-endian unsigned field
    pub const fn msb_unsigned(signal: SignalId, start_bit: u16, length: u8, scale: f32, offset: f32) -> Self {
        Self {
            signal,
            start_bit,
            length,
            signedness: Signedness::Unsigned,
            scale,
            offset,
            order: BitOrder::MsbFirst,
        }
    }

    /// Big-endian signed field
    pub const fn msb_signed(signal: SignalId, start_bit: u16, length: u8, scale: f32, offset: f32) -> Self {
        Self {
            signal,
            start_bit,
            length,
            signedness: Signedness::Signed,
            scale,
            offset,
            order: BitOrder::MsbFirst,
        }
    }

    /// Payload bytes needed to hold this field
    pub const fn required_len(&self) -> usize {
        // Both conventions number bits contiguously from the start of byte 0
        (self.start_bit as usize + self.length as usize + 7) / 8
    }

    /// Decode the physical value from a payload
    pub fn decode(&self, payload: &[u8]) -> Option<f32> {
        let raw = extract_bits(payload, self.start_bit, self.length, self.order)?;
        Some(interpret(raw, self.length, self.signedness) * self.scale + self.offset)
    }
}

/// All fields carried by one message identifier
#[derive(Debug, Clone, Copy)]
pub struct MessageSpec {
    /// Standard (11-bit) identifier
    pub id: u16,
    /// Nominal broadcast rate
    pub rate_hz: u16,
    pub fields: &'static [FieldSpec],
}

impl MessageSpec {
    /// Payload bytes needed to decode every field
    pub fn required_len(&self) -> usize {
        self.fields
            .iter()
            .map(FieldSpec::required_len)
            .max()
            .unwrap_or(0)
    }
}

/// Decode table for one ECU family
#[derive(Debug, Clone, Copy)]
pub struct ProfileTable {
    pub name: &'static str,
    /// Lowest identifier the family broadcasts
    pub id_min: u16,
    /// Highest identifier the family broadcasts
    pub id_max: u16,
    pub messages: &'static [MessageSpec],
}

impl ProfileTable {
    /// Position of a message in the table
    pub fn position(&self, id: u16) -> Option<usize> {
        self.messages.iter().position(|m| m.id == id)
    }

    /// Look up a message by identifier
    pub fn message(&self, id: u16) -> Option<&'static MessageSpec> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Check if an identifier lies in the family's broadcast range
    pub fn in_range(&self, id: u16) -> bool {
        (self.id_min..=self.id_max).contains(&id)
    }
}
