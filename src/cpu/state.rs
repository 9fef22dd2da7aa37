//! Processor state: register file, flags, cycle counter and mode bits.

use crate::bits::Word;
use crate::cpu::registers::{FlagUpdate, Flags, PC, REGISTER_COUNT};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A complete, independent copy of the processor state.
///
/// `CpuState` is a plain value: taking a snapshot and restoring it are both
/// just copies, so neither side can observe later mutations of the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CpuState {
    /// R0-R7. R6 is the stack pointer, R7 the program counter.
    pub registers: [Word; REGISTER_COUNT],
    pub flags: Flags,
    /// Elapsed machine cycles.
    pub cycles: u64,
    pub halted: bool,
    /// The previous instruction was SDBD.
    pub sdbd: bool,
    pub interrupts_enabled: bool,
}

/// The CP-1600 processor core.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Cpu {
    state: CpuState,
}

impl Cpu {
    /// Create a CPU with every register, flag and counter zeroed.
    pub fn new() -> Self {
        Self {
            state: CpuState::default(),
        }
    }

    /// Zero registers, flags and cycles; clear halted, sdbd and interrupts.
    pub fn reset(&mut self) {
        self.state = CpuState::default();
    }

    /// Read register `index` (0-7).
    pub fn register(&self, index: usize) -> Result<Word, CpuError> {
        self.state
            .registers
            .get(index)
            .copied()
            .ok_or(CpuError::InvalidRegister(index))
    }

    /// Write register `index` (0-7).
    pub fn set_register(&mut self, index: usize, value: Word) -> Result<(), CpuError> {
        let slot = self
            .state
            .registers
            .get_mut(index)
            .ok_or(CpuError::InvalidRegister(index))?;
        *slot = value;
        Ok(())
    }

    /// All eight registers.
    pub fn registers(&self) -> [Word; REGISTER_COUNT] {
        self.state.registers
    }

    #[inline]
    pub fn pc(&self) -> Word {
        self.state.registers[PC]
    }

    #[inline]
    pub fn set_pc(&mut self, value: Word) {
        self.state.registers[PC] = value;
    }

    /// Advance the program counter by `by`, wrapping at 16 bits.
    #[inline]
    pub fn increment_pc(&mut self, by: Word) {
        self.state.registers[PC] = self.state.registers[PC].wrapping_add(by);
    }

    pub fn flags(&self) -> Flags {
        self.state.flags
    }

    /// Apply a partial flag update.
    pub fn set_flags(&mut self, update: FlagUpdate) {
        self.state.flags.apply(update);
    }

    /// Adjust the cycle counter. Negative adjustments saturate at zero.
    pub fn add_cycles(&mut self, n: i64) {
        self.state.cycles = self.state.cycles.saturating_add_signed(n);
    }

    pub fn cycles(&self) -> u64 {
        self.state.cycles
    }

    pub fn halt(&mut self) {
        self.state.halted = true;
    }

    pub fn is_halted(&self) -> bool {
        self.state.halted
    }

    pub fn sdbd(&self) -> bool {
        self.state.sdbd
    }

    pub fn set_sdbd(&mut self, active: bool) {
        self.state.sdbd = active;
    }

    pub fn interrupts_enabled(&self) -> bool {
        self.state.interrupts_enabled
    }

    pub fn set_interrupts_enabled(&mut self, enabled: bool) {
        self.state.interrupts_enabled = enabled;
    }

    /// Snapshot of the full state.
    pub fn state(&self) -> CpuState {
        self.state
    }

    /// Replace the full state with `state`.
    pub fn set_state(&mut self, state: CpuState) {
        self.state = state;
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let regs: Vec<String> = self
            .state
            .registers
            .iter()
            .map(|r| format!("{:04X}", r))
            .collect();

        f.debug_struct("Cpu")
            .field("registers", &regs.join(" "))
            .field("flags", &self.state.flags.to_string())
            .field("cycles", &self.state.cycles)
            .field("halted", &self.state.halted)
            .field("sdbd", &self.state.sdbd)
            .field("interrupts", &self.state.interrupts_enabled)
            .finish()
    }
}

/// Errors raised by register access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CpuError {
    #[error("invalid register index {0} (must be 0-7)")]
    InvalidRegister(usize),
}
