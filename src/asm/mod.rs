//! Program-level tooling for CP-1600 code.
//!
//! This module provides:
//! - The raw little-endian ROM format (load / save)
//! - A disassembler with listing output
//! - Register and flag display formats

pub mod disasm;
pub mod format;
pub mod rom;

pub use disasm::{disassemble, format_instruction, DisassembledLine};
pub use format::{RegisterFormat, StateReport};
pub use rom::{load_rom, save_rom, Rom, RomError, DEFAULT_LOAD_ADDRESS};
