//! Bit-field extraction from CAN payloads

/// Bit numbering convention of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BitOrder {
    /// Bit 0 is the most-significant bit of byte 0. The start bit names the
    /// field's most-significant bit and the field continues into higher bit
    /// numbers, crossing byte boundaries (big-endian / "Motorola forward").
    MsbFirst,
    /// Bit 0 is the least-significant bit of byte 0. The start bit names the
    /// field's least-significant bit (little-endian / "Intel").
    LsbFirst,
}

/// Interpretation of the raw field bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Signedness {
    Unsigned,
    /// Two's complement over the field width
    Signed,
}

/// Widest supported field
pub const MAX_FIELD_BITS: u8 = 32;

/// Extract a raw field from `payload`
///
/// Returns `None` if the field is empty, wider than [`MAX_FIELD_BITS`], or
/// does not fit inside the payload.
pub fn extract_bits(payload: &[u8], start_bit: u16, length: u8, order: BitOrder) -> Option<u32> {
    if length == 0 || length > MAX_FIELD_BITS {
        return None;
    }
    let start = start_bit as usize;
    let len = length as usize;
    if start + len > payload.len() * 8 {
        return None;
    }

    let mut raw: u32 = 0;
    match order {
        BitOrder::MsbFirst => {
            for i in 0..len {
                let pos = start + i;
                let bit = (payload[pos / 8] >> (7 - pos % 8)) & 1;
                raw = (raw << 1) | bit as u32;
            }
        }
        BitOrder::LsbFirst => {
            for i in 0..len {
                let pos = start + i;
                let bit = (payload[pos / 8] >> (pos % 8)) & 1;
                raw |= (bit as u32) << i;
            }
        }
    }
    Some(raw)
}

/// Sign-extend a `length`-bit two's complement value
pub fn sign_extend(raw: u32, length: u8) -> i32 {
    if length == 0 || length >= 32 {
        return raw as i32;
    }
    let shift = 32 - length as u32;
    ((raw << shift) as i32) >> shift
}

/// Convert raw field bits to a number according to `signedness`
pub fn interpret(raw: u32, length: u8, signedness: Signedness) -> f32 {
    match signedness {
        Signedness::Unsigned => raw as f32,
        Signedness::Signed => sign_extend(raw, length) as f32,
    }
}
