//! CP-1600 register file conventions and status flags.
//!
//! The CP-1600 has eight 16-bit general registers R0-R7:
//! - R0-R3: general purpose (R0-R3 are the only shift targets)
//! - R4, R5: auto-incrementing when used as indirect pointers
//! - R6: stack pointer
//! - R7: program counter
//!
//! plus four status flags: Sign, Zero, Overflow and Carry.

use crate::bits::{get_bit, Word};
use serde::{Deserialize, Serialize};

/// Number of general registers.
pub const REGISTER_COUNT: usize = 8;

/// Stack pointer register index.
pub const SP: usize = 6;

/// Program counter register index.
pub const PC: usize = 7;

/// The four status flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Flags {
    /// Carry out of bit 15 (on subtraction: a borrow occurred)
    pub c: bool,
    /// Signed overflow
    pub ov: bool,
    /// Result was zero
    pub z: bool,
    /// Bit 15 of the result
    pub s: bool,
}

impl Flags {
    /// Apply a partial update, leaving absent fields untouched.
    pub fn apply(&mut self, update: FlagUpdate) {
        if let Some(c) = update.c {
            self.c = c;
        }
        if let Some(ov) = update.ov {
            self.ov = ov;
        }
        if let Some(z) = update.z {
            self.z = z;
        }
        if let Some(s) = update.s {
            self.s = s;
        }
    }

    /// Pack into the GSWD layout: S, Z, OV, C in bits 7-4, mirrored in
    /// bits 15-12.
    pub fn to_status_word(self) -> Word {
        let nibble = (self.s as Word) << 3
            | (self.z as Word) << 2
            | (self.ov as Word) << 1
            | self.c as Word;
        nibble << 12 | nibble << 4
    }

    /// Unpack bits 7-4 of a word (the RSWD layout).
    pub fn from_status_word(word: Word) -> Self {
        Self {
            s: get_bit(word, 7),
            z: get_bit(word, 6),
            ov: get_bit(word, 5),
            c: get_bit(word, 4),
        }
    }
}

impl std::fmt::Display for Flags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mark = |set: bool, name: char| if set { name } else { '-' };
        write!(
            f,
            "{}{}{}{}",
            mark(self.s, 'S'),
            mark(self.z, 'Z'),
            mark(self.ov, 'O'),
            mark(self.c, 'C')
        )
    }
}

/// A partial flag assignment. `None` leaves the flag as it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlagUpdate {
    pub c: Option<bool>,
    pub ov: Option<bool>,
    pub z: Option<bool>,
    pub s: Option<bool>,
}

impl FlagUpdate {
    /// Update every flag.
    pub fn all(flags: Flags) -> Self {
        Self {
            c: Some(flags.c),
            ov: Some(flags.ov),
            z: Some(flags.z),
            s: Some(flags.s),
        }
    }

    /// Update only Z and S.
    pub fn zs(z: bool, s: bool) -> Self {
        Self {
            z: Some(z),
            s: Some(s),
            ..Self::default()
        }
    }

    /// Add a carry assignment.
    pub fn with_c(mut self, c: bool) -> Self {
        self.c = Some(c);
        self
    }

    /// Add an overflow assignment.
    pub fn with_ov(mut self, ov: bool) -> Self {
        self.ov = Some(ov);
        self
    }
}

/// Conventional assembler name of a register.
pub fn register_name(index: usize) -> &'static str {
    match index {
        0 => "R0",
        1 => "R1",
        2 => "R2",
        3 => "R3",
        4 => "R4",
        5 => "R5",
        6 => "R6",
        7 => "R7",
        _ => "R?",
    }
}
