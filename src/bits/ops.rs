//! Conversion and single-bit helpers.

use super::Word;

/// Wrap any integer into the unsigned 16-bit range.
///
/// Negative inputs wrap two's-complement style: `to_u16(-1) == 0xFFFF`.
#[inline]
pub fn to_u16(x: i64) -> Word {
    (x & 0xFFFF) as Word
}

/// Mask to 16 bits, then reinterpret as a signed two's-complement value.
#[inline]
pub fn to_i16(x: i64) -> i16 {
    to_u16(x) as i16
}

/// Read bit `pos` (0-15) of `v`. Positions above 15 are taken modulo 16.
#[inline]
pub fn get_bit(v: Word, pos: u32) -> bool {
    (v >> (pos & 15)) & 1 == 1
}

/// Return `v` with bit `pos` set.
#[inline]
pub fn set_bit(v: Word, pos: u32) -> Word {
    v | (1 << (pos & 15))
}

/// Return `v` with bit `pos` cleared.
#[inline]
pub fn clear_bit(v: Word, pos: u32) -> Word {
    v & !(1 << (pos & 15))
}

/// Bit 15, the sign of a word read as two's complement.
#[inline]
pub fn sign_bit(v: Word) -> bool {
    get_bit(v, 15)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_to_u16_wraps() {
        assert_eq!(to_u16(0), 0);
        assert_eq!(to_u16(0x1_0000), 0);
        assert_eq!(to_u16(0x1_2345), 0x2345);
        assert_eq!(to_u16(-1), 0xFFFF);
        assert_eq!(to_u16(-0x8000), 0x8000);
    }

    #[test]
    fn test_to_i16_reinterprets() {
        assert_eq!(to_i16(0x7FFF), 32767);
        assert_eq!(to_i16(0x8000), -32768);
        assert_eq!(to_i16(0xFFFF), -1);
        assert_eq!(to_i16(0x1_0001), 1);
    }

    #[test]
    fn test_single_bits() {
        assert!(get_bit(0x8000, 15));
        assert!(!get_bit(0x8000, 14));
        assert_eq!(set_bit(0, 4), 0x0010);
        assert_eq!(clear_bit(0xFFFF, 0), 0xFFFE);
        assert!(sign_bit(0x8001));
        assert!(!sign_bit(0x7FFF));
    }

    proptest! {
        #[test]
        fn prop_signed_roundtrip_preserves_pattern(x in any::<i64>()) {
            prop_assert_eq!(to_u16(to_i16(x) as i64), to_u16(x));
        }

        #[test]
        fn prop_set_then_clear(v in any::<u16>(), pos in 0u32..16) {
            prop_assert!(get_bit(set_bit(v, pos), pos));
            prop_assert!(!get_bit(clear_bit(v, pos), pos));
        }
    }
}
