//! A complete emulation session: memory, CPU and decoder driven by a
//! fetch-decode-execute loop.
//!
//! The core (`Decoder` + `Executor`) performs no I/O. This layer adds the
//! run loop, ROM loading, reset-to-entry and `log` output.

use crate::asm::disasm::{self, DisassembledLine, MAX_DISASSEMBLE_COUNT};
use crate::asm::format::{self, FlagReport, RegisterFormat};
use crate::asm::rom::{self, Rom, RomError, DEFAULT_LOAD_ADDRESS};
use crate::bits::Word;
use crate::cpu::{
    Cpu, CpuState, DecodeError, Decoder, DecoderOptions, ExecuteError, Executor, Instruction,
    Memory, MemoryConfig, MemoryError, TraceEvent, TraceSink,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Largest range [`Machine::examine_memory`] returns at once.
pub const MAX_EXAMINE_WORDS: usize = 256;

/// Largest count accepted by [`Machine::step_n`].
pub const MAX_STEP_COUNT: u64 = 10_000;

/// Instruction budget used when a caller does not pick one.
pub const DEFAULT_RUN_BUDGET: u64 = 100_000;

/// Everything needed to build a [`Machine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    pub memory: MemoryConfig,
    pub decoder: DecoderOptions,
    /// Where ROMs are loaded and execution starts.
    pub load_address: Word,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            memory: MemoryConfig::default(),
            decoder: DecoderOptions::default(),
            load_address: DEFAULT_LOAD_ADDRESS,
        }
    }
}

impl MachineConfig {
    /// Read a JSON config file. Missing fields take their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, MachineError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| MachineError::Config(e.to_string()))?;
        serde_json::from_str(&text).map_err(|e| MachineError::Config(e.to_string()))
    }
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Halted,
    BudgetExhausted,
}

/// Outcome of [`Machine::run`] or [`Machine::step_n`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Instructions executed by this call.
    pub executed: u64,
    /// Cycles elapsed during this call.
    pub cycles: u64,
    pub reason: StopReason,
    /// PC after the last instruction.
    pub stopped_at: Word,
    pub state: CpuState,
}

/// Forwards trace events to the `log` facade at trace level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTraceSink;

impl TraceSink for LogTraceSink {
    fn on_event(&mut self, event: &TraceEvent<'_>) {
        log::trace!(
            "${:04X}: {:<24} -> ${:04X} (+{} cycles)",
            event.pc_before,
            disasm::format_instruction(event.instruction),
            event.pc_after,
            event.cycles
        );
    }
}

/// One CP-1600 with its memory.
#[derive(Clone)]
pub struct Machine {
    config: MachineConfig,
    cpu: Cpu,
    memory: Memory,
    decoder: Decoder,
    entry_point: Word,
    rom_name: Option<String>,
    instructions_executed: u64,
}

impl Machine {
    /// Create a machine with cleared memory, PC at the load address.
    pub fn new(config: MachineConfig) -> Result<Self, MachineError> {
        let memory = Memory::with_config(config.memory)?;
        let mut cpu = Cpu::new();
        cpu.set_pc(config.load_address);

        Ok(Self {
            config,
            cpu,
            memory,
            decoder: Decoder::with_options(config.decoder),
            entry_point: config.load_address,
            rom_name: None,
            instructions_executed: 0,
        })
    }

    /// Load `words` at the configured load address and reset the CPU to
    /// start there. Memory outside the image is left as it was.
    pub fn load_rom_words(&mut self, words: &[Word], name: Option<String>) -> Result<(), MachineError> {
        let address = self.config.load_address;
        self.memory.load(address, words)?;
        self.entry_point = address;
        self.rom_name = name;
        self.reset();
        log::debug!(
            "loaded {} words ({}) at ${:04X}",
            words.len(),
            self.rom_name.as_deref().unwrap_or("<anonymous>"),
            address
        );
        Ok(())
    }

    pub fn load_rom(&mut self, rom: &Rom) -> Result<(), MachineError> {
        self.load_rom_words(&rom.words, Some(rom.name.clone()))
    }

    /// Read a ROM file and load it.
    pub fn load_rom_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), MachineError> {
        let rom = rom::load_rom(path)?;
        self.load_rom(&rom)
    }

    /// Reset the CPU and return to the entry point. Memory is kept.
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.cpu.set_pc(self.entry_point);
        self.instructions_executed = 0;
        log::debug!("reset to ${:04X}", self.entry_point);
    }

    /// Decode the instruction at PC without executing it.
    pub fn peek(&self) -> Result<Instruction, DecodeError> {
        self.decoder.decode(&self.memory, self.cpu.pc(), self.cpu.sdbd())
    }

    /// Execute one instruction.
    pub fn step(&mut self) -> Result<Instruction, MachineError> {
        if log::log_enabled!(log::Level::Trace) {
            self.step_traced(&mut LogTraceSink)
        } else {
            self.step_inner(None)
        }
    }

    /// Execute one instruction, reporting it to `sink`.
    pub fn step_traced(&mut self, sink: &mut dyn TraceSink) -> Result<Instruction, MachineError> {
        self.step_inner(Some(sink))
    }

    fn step_inner(&mut self, sink: Option<&mut dyn TraceSink>) -> Result<Instruction, MachineError> {
        if self.cpu.is_halted() {
            return Err(MachineError::Halted { pc: self.cpu.pc() });
        }

        let instr = self.peek()?;
        let mut executor = Executor::new(&mut self.cpu, &mut self.memory);
        if let Some(sink) = sink {
            executor = executor.with_trace(sink);
        }
        executor.execute(&instr)?;
        self.instructions_executed += 1;

        if self.cpu.is_halted() {
            log::debug!(
                "halted at ${:04X} after {} instructions, {} cycles",
                instr.address,
                self.instructions_executed,
                self.cpu.cycles()
            );
        }
        Ok(instr)
    }

    /// Execute up to `count` (1 to 10000) instructions, stopping early on
    /// HLT.
    pub fn step_n(&mut self, count: u64) -> Result<RunReport, MachineError> {
        if count == 0 || count > MAX_STEP_COUNT {
            return Err(MachineError::InvalidCount {
                count: count as usize,
                max: MAX_STEP_COUNT as usize,
            });
        }
        self.run_loop(count, None)
    }

    /// Run until HLT or until `max_instructions` have executed.
    pub fn run(&mut self, max_instructions: u64) -> Result<RunReport, MachineError> {
        self.run_loop(max_instructions, None)
    }

    /// [`Machine::run`] with every instruction reported to `sink`.
    pub fn run_traced(
        &mut self,
        max_instructions: u64,
        sink: &mut dyn TraceSink,
    ) -> Result<RunReport, MachineError> {
        self.run_loop(max_instructions, Some(sink))
    }

    fn run_loop(
        &mut self,
        budget: u64,
        mut sink: Option<&mut dyn TraceSink>,
    ) -> Result<RunReport, MachineError> {
        let start_cycles = self.cpu.cycles();
        let mut executed = 0;

        while executed < budget && !self.cpu.is_halted() {
            match sink.as_deref_mut() {
                Some(sink) => self.step_traced(sink)?,
                None => self.step()?,
            };
            executed += 1;
        }

        let reason = if self.cpu.is_halted() {
            StopReason::Halted
        } else {
            StopReason::BudgetExhausted
        };
        Ok(RunReport {
            executed,
            cycles: self.cpu.cycles() - start_cycles,
            reason,
            stopped_at: self.cpu.pc(),
            state: self.cpu.state(),
        })
    }

    /// Copy of `len` words starting at `address` (1 to 256 words).
    pub fn examine_memory(&self, address: Word, len: usize) -> Result<Vec<Word>, MachineError> {
        if len == 0 || len > MAX_EXAMINE_WORDS {
            return Err(MachineError::InvalidCount {
                count: len,
                max: MAX_EXAMINE_WORDS,
            });
        }
        Ok(self.memory.read_range(address, len)?)
    }

    /// Disassemble `count` (1 to 100) instructions starting at `address`.
    pub fn disassemble(&self, address: Word, count: usize) -> Result<Vec<DisassembledLine>, MachineError> {
        if count == 0 || count > MAX_DISASSEMBLE_COUNT {
            return Err(MachineError::InvalidCount {
                count,
                max: MAX_DISASSEMBLE_COUNT,
            });
        }
        Ok(disasm::disassemble(&self.memory, &self.decoder, address, count))
    }

    /// Register values rendered in `format`.
    pub fn registers(&self, format: RegisterFormat) -> Vec<(String, String)> {
        format::register_report(&self.cpu.state(), format)
    }

    /// Flags with descriptions.
    pub fn flags(&self) -> Vec<FlagReport> {
        format::flag_report(self.cpu.flags())
    }

    pub fn state(&self) -> CpuState {
        self.cpu.state()
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    pub fn config(&self) -> MachineConfig {
        self.config
    }

    pub fn entry_point(&self) -> Word {
        self.entry_point
    }

    pub fn rom_name(&self) -> Option<&str> {
        self.rom_name.as_deref()
    }

    pub fn instructions_executed(&self) -> u64 {
        self.instructions_executed
    }

    pub fn is_halted(&self) -> bool {
        self.cpu.is_halted()
    }
}

impl std::fmt::Debug for Machine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Machine")
            .field("rom", &self.rom_name)
            .field("entry_point", &format_args!("${:04X}", self.entry_point))
            .field("instructions", &self.instructions_executed)
            .field("cpu", &self.cpu)
            .finish()
    }
}

/// Errors surfaced by the run loop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MachineError {
    #[error("CPU is halted at ${pc:04X}")]
    Halted { pc: Word },

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("execute error: {0}")]
    Execute(#[from] ExecuteError),

    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("ROM error: {0}")]
    Rom(#[from] RomError),

    #[error("count {count} out of range (must be 1-{max})")]
    InvalidCount { count: usize, max: usize },

    #[error("config error: {0}")]
    Config(String),
}
