//! Word-level bit primitives shared by every other module.
//!
//! The CP-1600 is a 16-bit machine whose instructions are 10-bit "decles"
//! stored in the low bits of a 16-bit word. Everything here is pure:
//! inputs are coerced into range, never rejected.

mod ops;

pub use ops::{clear_bit, get_bit, set_bit, sign_bit, to_i16, to_u16};

/// A 16-bit machine word. Registers and memory cells hold Words.
pub type Word = u16;

/// Mask selecting the 10 decle bits of an instruction word.
pub const DECLE_MASK: Word = 0x03FF;

/// Mask selecting a full 16-bit word out of a wider integer.
pub const WORD_MASK: u32 = 0xFFFF;

/// Extract the decle (low 10 bits) from a stored word.
#[inline]
pub const fn decle(word: Word) -> Word {
    word & DECLE_MASK
}
