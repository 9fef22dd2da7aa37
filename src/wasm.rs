//! WebAssembly bindings for the CP-1600 emulator.
//!
//! This module provides JavaScript-friendly wrappers around [`Machine`].

use wasm_bindgen::prelude::*;
use crate::asm::disasm::{self, format_instruction};
use crate::asm::format::{RegisterFormat, StateReport};
use crate::asm::rom::words_from_bytes;
use crate::machine::{Machine, MachineConfig};

/// Initialize panic hook for better error messages in console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

fn js_error(e: impl std::fmt::Display) -> JsError {
    JsError::new(&e.to_string())
}

/// WebAssembly-friendly machine wrapper.
#[wasm_bindgen]
pub struct WasmMachine {
    machine: Machine,
}

#[wasm_bindgen]
impl WasmMachine {
    /// Create a machine with the default configuration.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<WasmMachine, JsError> {
        Self::with_config(MachineConfig::default())
    }

    /// Create a machine from a JSON configuration.
    #[wasm_bindgen]
    pub fn from_config_json(json: &str) -> Result<WasmMachine, JsError> {
        let config: MachineConfig = serde_json::from_str(json).map_err(js_error)?;
        Self::with_config(config)
    }

    fn with_config(config: MachineConfig) -> Result<WasmMachine, JsError> {
        let machine = Machine::new(config).map_err(js_error)?;
        Ok(Self { machine })
    }

    /// Load a raw little-endian ROM image. Returns the word count.
    #[wasm_bindgen]
    pub fn load_rom(&mut self, bytes: &[u8], name: Option<String>) -> Result<usize, JsError> {
        let words = words_from_bytes(bytes).map_err(js_error)?;
        self.machine.load_rom_words(&words, name).map_err(js_error)?;
        Ok(words.len())
    }

    /// Step one instruction. Returns the disassembled instruction.
    #[wasm_bindgen]
    pub fn step(&mut self) -> Result<String, JsError> {
        let instr = self.machine.step().map_err(js_error)?;
        Ok(format_instruction(&instr))
    }

    /// Run until halt or `max_instructions`. Returns the run report as JSON.
    #[wasm_bindgen]
    pub fn run(&mut self, max_instructions: u32) -> Result<String, JsError> {
        let report = self.machine.run(max_instructions as u64).map_err(js_error)?;
        serde_json::to_string(&report).map_err(js_error)
    }

    /// Reset the CPU to the entry point, keeping memory.
    #[wasm_bindgen]
    pub fn reset(&mut self) {
        self.machine.reset();
    }

    #[wasm_bindgen]
    pub fn is_halted(&self) -> bool {
        self.machine.is_halted()
    }

    #[wasm_bindgen]
    pub fn cycles(&self) -> u64 {
        self.machine.cpu().cycles()
    }

    #[wasm_bindgen]
    pub fn pc(&self) -> u16 {
        self.machine.cpu().pc()
    }

    /// Register `index` (0-7).
    #[wasm_bindgen]
    pub fn register(&self, index: usize) -> Result<u16, JsError> {
        self.machine.cpu().register(index).map_err(js_error)
    }

    /// Flags as `SZOC`, cleared flags shown as `-`.
    #[wasm_bindgen]
    pub fn flags(&self) -> String {
        self.machine.cpu().flags().to_string()
    }

    /// Full CPU state as JSON. `format` is hex, dec or both.
    #[wasm_bindgen]
    pub fn state_json(&self, format: &str) -> Result<String, JsError> {
        let format: RegisterFormat = format.parse().map_err(|e: String| JsError::new(&e))?;
        let report = StateReport::new(&self.machine.state(), format);
        serde_json::to_string(&report).map_err(js_error)
    }

    /// `len` words (1-256) starting at `address`.
    #[wasm_bindgen]
    pub fn memory(&self, address: u16, len: usize) -> Result<js_sys::Uint16Array, JsError> {
        let words = self.machine.examine_memory(address, len).map_err(js_error)?;
        Ok(js_sys::Uint16Array::from(&words[..]))
    }

    /// Disassembly listing of `count` instructions (1-100).
    #[wasm_bindgen]
    pub fn disassemble(&self, address: u16, count: usize) -> Result<String, JsError> {
        let lines = self.machine.disassemble(address, count).map_err(js_error)?;
        Ok(disasm::listing(&lines))
    }
}
