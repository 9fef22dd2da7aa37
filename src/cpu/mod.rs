//! CPU emulation for the CP-1600.
//!
//! This module implements the processor core:
//! - 8 sixteen-bit registers (R6 stack pointer, R7 program counter)
//! - 4 status flags (S, Z, OV, C) plus halt, SDBD and interrupt-enable bits
//! - A 64K-word address space of 16-bit words
//! - A decoder for the 10-bit instruction set and an executor with
//!   per-instruction cycle accounting

pub mod memory;
pub mod registers;
pub mod state;
pub mod alu;
pub mod timing;
pub mod decode;
pub mod execute;

pub use memory::{Memory, MemoryConfig, MemoryError, MEMORY_SIZE};
pub use registers::{FlagUpdate, Flags, PC, SP};
pub use state::{Cpu, CpuError, CpuState};
pub use decode::{AddressingMode, DecodeError, Decoder, DecoderOptions, Instruction, Opcode, Operand};
pub use execute::{ExecuteError, Executor, TraceEvent, TraceSink};
