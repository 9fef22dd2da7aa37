//! Arithmetic, logic and shift primitives with their flag results.
//!
//! Every instruction that updates all four flags goes through
//! [`add`] or [`sub`], so carry and overflow are computed in one place.

use crate::bits::{get_bit, sign_bit, Word};
use crate::cpu::registers::{FlagUpdate, Flags};

/// A 16-bit result together with the flags it produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AluResult {
    pub value: Word,
    pub flags: FlagUpdate,
}

/// Flags for an arithmetic result.
///
/// `wide` is the unmasked result: for addition a carry is a sum past
/// 0xFFFF, for subtraction a borrow (`a < b`).
fn arith_flags(wide: u32, a: Word, b: Word, subtract: bool) -> Flags {
    let result = wide as Word;
    let (carry, overflow) = if subtract {
        (a < b, sign_bit(a) != sign_bit(b) && sign_bit(result) != sign_bit(a))
    } else {
        (wide > 0xFFFF, sign_bit(a) == sign_bit(b) && sign_bit(result) != sign_bit(a))
    };
    Flags {
        c: carry,
        ov: overflow,
        z: result == 0,
        s: sign_bit(result),
    }
}

/// `a + b + carry_in`.
pub fn add(a: Word, b: Word, carry_in: bool) -> AluResult {
    let wide = a as u32 + b as u32 + carry_in as u32;
    AluResult {
        value: wide as Word,
        flags: FlagUpdate::all(arith_flags(wide, a, b, false)),
    }
}

/// `a - b`.
pub fn sub(a: Word, b: Word) -> AluResult {
    let value = a.wrapping_sub(b);
    AluResult {
        value,
        flags: FlagUpdate::all(arith_flags(value as u32, a, b, true)),
    }
}

/// Z and S for a value, leaving C and OV alone.
pub fn logic(value: Word) -> AluResult {
    AluResult {
        value,
        flags: FlagUpdate::zs(value == 0, sign_bit(value)),
    }
}

/// One of the eight shift/rotate operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shift {
    /// Exchange bytes.
    Swap,
    /// Logical left, 0 in.
    Sll,
    /// Rotate left through carry.
    Rlc,
    /// Left through carry: carry in at bit 0, bit 15 out.
    Sllc,
    /// Logical right, 0 in.
    Slr,
    /// Arithmetic right.
    Sar,
    /// Rotate right through carry.
    Rrc,
    /// Right through carry: carry in at bit 15, bit 0 out.
    Sarc,
}

/// Shift `value` by `count` positions (1 or 2).
///
/// Z and S follow the result and OV is cleared. Carry receives the last
/// bit shifted out, except for SWAP which clears it and leaves OV as it
/// was. A two-position SWAP copies the low byte into both halves.
pub fn shift(kind: Shift, value: Word, count: u8, carry: bool) -> AluResult {
    if kind == Shift::Swap {
        let value = if count >= 2 {
            (value & 0x00FF) << 8 | (value & 0x00FF)
        } else {
            value.rotate_left(8)
        };
        return AluResult {
            value,
            flags: FlagUpdate::zs(value == 0, sign_bit(value)).with_c(false),
        };
    }

    let (mut value, mut carry) = (value, carry);
    for _ in 0..count.max(1) {
        (value, carry) = shift_once(kind, value, carry);
    }
    AluResult {
        value,
        flags: FlagUpdate::zs(value == 0, sign_bit(value))
            .with_c(carry)
            .with_ov(false),
    }
}

fn shift_once(kind: Shift, v: Word, carry: bool) -> (Word, bool) {
    match kind {
        Shift::Swap => (v.rotate_left(8), false),
        Shift::Sll => (v << 1, get_bit(v, 15)),
        Shift::Rlc | Shift::Sllc => (v << 1 | carry as Word, get_bit(v, 15)),
        Shift::Slr => (v >> 1, get_bit(v, 0)),
        Shift::Sar => ((v as i16 >> 1) as Word, get_bit(v, 0)),
        Shift::Rrc | Shift::Sarc => (v >> 1 | (carry as Word) << 15, get_bit(v, 0)),
    }
}
