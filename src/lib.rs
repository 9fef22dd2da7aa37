//! # CP-1600 Emulator
//!
//! An instruction-level emulator of the General Instrument CP-1600, the
//! 16-bit microprocessor of the Mattel Intellivision.
//!
//! The core is pure: a [`Decoder`] turns words in [`Memory`] into
//! [`Instruction`]s and an [`Executor`] applies them to a [`Cpu`], charging
//! cycles as it goes. [`Machine`] adds the run loop and ROM loading, and
//! [`SessionManager`] hosts many machines side by side.

pub mod bits;
pub mod cpu;
pub mod asm;
pub mod machine;
pub mod session;

#[cfg(feature = "tui")]
pub mod tui;

#[cfg(feature = "wasm")]
pub mod wasm;

// Re-export commonly used types
pub use bits::Word;
pub use cpu::{
    Cpu, CpuError, CpuState, DecodeError, Decoder, DecoderOptions, ExecuteError, Executor, Flags,
    Instruction, Memory, MemoryConfig, MemoryError, Opcode, Operand, TraceEvent, TraceSink,
};
pub use asm::{disassemble, load_rom, save_rom, RegisterFormat, Rom, RomError};
pub use machine::{Machine, MachineConfig, MachineError, RunReport, StopReason};
pub use session::{SessionError, SessionManager, SessionSummary};

#[cfg(feature = "tui")]
pub use tui::run_debugger;
