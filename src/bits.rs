//! Big-endian integer helpers and bit-field packing.
//!
//! [`BitCursor`] is a 64-bit accumulator used to unpack and assemble the
//! fixed-width headers this crate deals with (AudioSpecificConfig, ADTS and
//! MPEG audio frame headers). Reads remove bits from the most significant
//! end; writes append bits at the least significant end. The cursor only
//! tracks bit order, so callers load it from (and store it to) byte buffers
//! at the right alignment themselves.
//!
//! # Example
//!
//! ```
//! use unflv::BitCursor;
//!
//! let mut writer = BitCursor::new();
//! writer.write_bits(4, 0xA);
//! writer.write_bits(4, 0x5);
//! assert_eq!(writer.value(), 0xA5);
//!
//! let mut reader = BitCursor::left_aligned(0xA5, 8);
//! assert_eq!(reader.read_bits(4), 0xA);
//! assert_eq!(reader.read_bits(4), 0x5);
//! ```

use byteorder::{BigEndian, ByteOrder};

/// A 64-bit accumulator for reading and writing bit fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BitCursor {
    bits: u64,
}

impl BitCursor {
    /// Create an empty cursor.
    pub fn new() -> Self {
        Self { bits: 0 }
    }

    /// Wrap a raw accumulator value.
    pub fn from_value(bits: u64) -> Self {
        Self { bits }
    }

    /// Place the low `width` bits of `value` at the top of the accumulator,
    /// ready to be consumed with [`read_bits`](BitCursor::read_bits).
    pub fn left_aligned(value: u64, width: u32) -> Self {
        debug_assert!(width <= 64);
        let shift = 64 - width.min(64);
        Self {
            bits: value.checked_shl(shift).unwrap_or(0),
        }
    }

    /// Remove the top `width` bits and return them.
    ///
    /// Widths above 32 are accepted but only the low 32 bits of the field
    /// are returned.
    pub fn read_bits(&mut self, width: u32) -> u32 {
        debug_assert!(width <= 64);
        if width == 0 {
            return 0;
        }
        let width = width.min(64);
        let field = self.bits >> (64 - width);
        self.bits = self.bits.checked_shl(width).unwrap_or(0);
        field as u32
    }

    /// Shift the accumulator left by `width` and append `value`, masked to
    /// `width` bits.
    pub fn write_bits(&mut self, width: u32, value: u64) {
        debug_assert!(width <= 64);
        if width == 0 {
            return;
        }
        let width = width.min(64);
        let mask = u64::MAX >> (64 - width);
        self.bits = self.bits.checked_shl(width).unwrap_or(0) | (value & mask);
    }

    /// The raw accumulator value.
    pub fn value(self) -> u64 {
        self.bits
    }

    /// The accumulator as eight big-endian bytes.
    pub fn to_be_bytes(self) -> [u8; 8] {
        be_bytes_u64(self.bits)
    }
}

/// Encode a `u16` most significant byte first.
pub fn be_bytes_u16(value: u16) -> [u8; 2] {
    let mut bytes = [0u8; 2];
    BigEndian::write_u16(&mut bytes, value);
    bytes
}

/// Encode a `u32` most significant byte first.
pub fn be_bytes_u32(value: u32) -> [u8; 4] {
    let mut bytes = [0u8; 4];
    BigEndian::write_u32(&mut bytes, value);
    bytes
}

/// Encode a `u64` most significant byte first.
pub fn be_bytes_u64(value: u64) -> [u8; 8] {
    let mut bytes = [0u8; 8];
    BigEndian::write_u64(&mut bytes, value);
    bytes
}

/// Decode a big-endian `u16` at `offset`, or `None` if the slice is too short.
pub fn u16_at(bytes: &[u8], offset: usize) -> Option<u16> {
    bytes
        .get(offset..offset.checked_add(2)?)
        .map(BigEndian::read_u16)
}

/// Decode a big-endian `u32` at `offset`, or `None` if the slice is too short.
pub fn u32_at(bytes: &[u8], offset: usize) -> Option<u32> {
    bytes
        .get(offset..offset.checked_add(4)?)
        .map(BigEndian::read_u32)
}

/// Decode a big-endian `u64` at `offset`, or `None` if the slice is too short.
pub fn u64_at(bytes: &[u8], offset: usize) -> Option<u64> {
    bytes
        .get(offset..offset.checked_add(8)?)
        .map(BigEndian::read_u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_consumes_from_the_top() {
        let mut cursor = BitCursor::from_value(0xFFF0_0000_0000_0000);
        assert_eq!(cursor.read_bits(12), 0xFFF);
        assert_eq!(cursor.read_bits(4), 0);
        assert_eq!(cursor.value(), 0);
    }

    #[test]
    fn write_appends_at_the_bottom_and_masks() {
        let mut cursor = BitCursor::new();
        cursor.write_bits(3, 0b101);
        cursor.write_bits(2, 0xFF);
        assert_eq!(cursor.value(), 0b10111);
    }

    #[test]
    fn full_width_operations_do_not_overflow() {
        let mut cursor = BitCursor::new();
        cursor.write_bits(64, u64::MAX);
        assert_eq!(cursor.value(), u64::MAX);
        cursor.write_bits(64, 7);
        assert_eq!(cursor.value(), 7);

        let mut reader = BitCursor::from_value(0x8000_0000_0000_0001);
        assert_eq!(reader.read_bits(64), 1);
        assert_eq!(reader.value(), 0);
    }

    #[test]
    fn zero_width_is_a_no_op() {
        let mut cursor = BitCursor::from_value(42);
        assert_eq!(cursor.read_bits(0), 0);
        cursor.write_bits(0, 1);
        assert_eq!(cursor.value(), 42);
    }

    #[test]
    fn left_aligned_round_trips_through_reads() {
        let mut cursor = BitCursor::left_aligned(0x1210, 16);
        assert_eq!(cursor.read_bits(5), 2);
        assert_eq!(cursor.read_bits(4), 4);
        assert_eq!(cursor.read_bits(4), 2);
    }

    #[test]
    fn big_endian_conversions() {
        assert_eq!(be_bytes_u16(0x0102), [1, 2]);
        assert_eq!(be_bytes_u32(0x5869_6E67), *b"Xing");
        assert_eq!(be_bytes_u64(1)[7], 1);

        let bytes = [0u8, 0x46, 0x4C, 0x56, 0x01];
        assert_eq!(u32_at(&bytes, 1), Some(0x464C_5601));
        assert_eq!(u16_at(&bytes, 3), Some(0x5601));
        assert_eq!(u32_at(&bytes, 2), None);
        assert_eq!(u64_at(&[0, 0, 0, 0, 0, 0, 1, 0], 0), Some(256));
        assert_eq!(u64_at(&bytes, 0), None);
        assert_eq!(u32_at(&bytes, usize::MAX), None);
    }
}
