//! Human-readable renderings of processor state.

use crate::bits::Word;
use crate::cpu::registers::register_name;
use crate::cpu::{CpuState, Flags};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How register values are shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegisterFormat {
    #[default]
    Hex,
    #[serde(rename = "dec")]
    Decimal,
    Both,
}

impl FromStr for RegisterFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hex" => Ok(RegisterFormat::Hex),
            "dec" | "decimal" => Ok(RegisterFormat::Decimal),
            "both" => Ok(RegisterFormat::Both),
            other => Err(format!("unknown register format '{}' (expected hex, dec or both)", other)),
        }
    }
}

/// Render one word.
pub fn format_word(value: Word, format: RegisterFormat) -> String {
    match format {
        RegisterFormat::Hex => format!("0x{:04X}", value),
        RegisterFormat::Decimal => value.to_string(),
        RegisterFormat::Both => format!("0x{:04X} ({})", value, value),
    }
}

/// `(name, value)` for R0-R7.
pub fn register_report(state: &CpuState, format: RegisterFormat) -> Vec<(String, String)> {
    state
        .registers
        .iter()
        .enumerate()
        .map(|(i, &v)| (register_name(i).to_string(), format_word(v, format)))
        .collect()
}

/// A flag with a sentence describing its current value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlagReport {
    pub name: &'static str,
    pub set: bool,
    pub description: &'static str,
}

/// All four flags, S Z C OV order.
pub fn flag_report(flags: Flags) -> Vec<FlagReport> {
    let describe = |name, set, yes, no| FlagReport {
        name,
        set,
        description: if set { yes } else { no },
    };
    vec![
        describe("sign", flags.s, "Result is negative", "Result is positive"),
        describe("zero", flags.z, "Result is zero", "Result is non-zero"),
        describe("carry", flags.c, "Carry/borrow occurred", "No carry/borrow"),
        describe("overflow", flags.ov, "Signed overflow occurred", "No signed overflow"),
    ]
}

/// One-line flag summary, e.g. `S=0 Z=1 C=0 OV=0`.
pub fn flag_summary(flags: Flags) -> String {
    format!(
        "S={} Z={} C={} OV={}",
        flags.s as u8, flags.z as u8, flags.c as u8, flags.ov as u8
    )
}

/// Everything a front end shows about the CPU, ready for `serde_json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateReport {
    pub registers: Vec<(String, String)>,
    pub flags: Vec<FlagReport>,
    pub summary: String,
    pub cycles: u64,
    pub halted: bool,
    pub sdbd: bool,
    pub interrupts_enabled: bool,
}

impl StateReport {
    pub fn new(state: &CpuState, format: RegisterFormat) -> Self {
        Self {
            registers: register_report(state, format),
            flags: flag_report(state.flags),
            summary: flag_summary(state.flags),
            cycles: state.cycles,
            halted: state.halted,
            sdbd: state.sdbd,
            interrupts_enabled: state.interrupts_enabled,
        }
    }
}

impl std::fmt::Display for StateReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for chunk in self.registers.chunks(4) {
            let row: Vec<String> = chunk.iter().map(|(n, v)| format!("{}={}", n, v)).collect();
            writeln!(f, "{}", row.join("  "))?;
        }
        writeln!(f, "Flags: {}", self.summary)?;
        write!(
            f,
            "Cycles: {}  Halted: {}  SDBD: {}  Interrupts: {}",
            self.cycles,
            self.halted,
            self.sdbd,
            if self.interrupts_enabled { "enabled" } else { "disabled" }
        )
    }
}
