//! Disassembler for CP-1600 programs.
//!
//! Converts decoded instructions back to readable assembly. Canonical
//! encodings with a conventional alias (MOVR Rx,R7 is JR, XORR Rx,Rx is
//! CLRR, ...) are rendered under the alias.

use crate::bits::Word;
use crate::cpu::decode::{AddressingMode, DecodeError, Decoder, Instruction, Opcode, Operand};
use crate::cpu::registers::PC;
use crate::cpu::{timing, Memory};
use serde::Serialize;

/// Largest listing [`disassemble`] is asked for through the machine API.
pub const MAX_DISASSEMBLE_COUNT: usize = 100;

/// One row of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisassembledLine {
    pub address: Word,
    /// The raw words the instruction occupies.
    pub words: Vec<Word>,
    pub text: String,
    /// Cost when executed (taken cost for branches). Zero for unknown words.
    pub cycles: u32,
    /// `None` for words that do not decode.
    pub instruction: Option<Instruction>,
}

impl DisassembledLine {
    fn decoded(memory: &Memory, instr: Instruction) -> Self {
        let words = memory
            .read_range(instr.address, instr.length as usize)
            .unwrap_or_else(|_| vec![instr.raw]);
        Self {
            address: instr.address,
            words,
            text: format_instruction(&instr),
            cycles: timing::instruction_cycles(&instr, true),
            instruction: Some(instr),
        }
    }

    fn unknown(address: Word, raw: Word) -> Self {
        Self {
            address,
            words: vec![raw],
            text: format!("??? ; 0x{:03X}", raw),
            cycles: 0,
            instruction: None,
        }
    }
}

impl std::fmt::Display for DisassembledLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let words: Vec<String> = self.words.iter().map(|w| format!("{:04X}", w)).collect();
        write!(f, "${:04X}: {:<15}  {}", self.address, words.join(" "), self.text)
    }
}

/// Disassemble `count` instructions starting at `start`.
///
/// Undecodable words become `???` rows one word long. The listing stops
/// early only if memory itself cannot be read.
pub fn disassemble(memory: &Memory, decoder: &Decoder, start: Word, count: usize) -> Vec<DisassembledLine> {
    let mut lines = Vec::with_capacity(count);
    let mut address = start;
    let mut sdbd = false;

    for _ in 0..count {
        let line = match decoder.decode(memory, address, sdbd) {
            Ok(instr) => DisassembledLine::decoded(memory, instr),
            Err(DecodeError::UnknownOpcode { raw, .. }) => DisassembledLine::unknown(address, raw),
            Err(DecodeError::Memory(_)) => break,
        };

        sdbd = matches!(&line.instruction, Some(i) if i.opcode == Opcode::Sdbd);
        address = address.wrapping_add(line.words.len().max(1) as Word);
        lines.push(line);
    }

    lines
}

/// A listing as text, one instruction per line.
pub fn listing(lines: &[DisassembledLine]) -> String {
    let mut output = String::new();
    output.push_str("; CP-1600 Disassembly\n");
    output.push_str("; ------------------\n\n");

    for line in lines {
        output.push_str(&line.to_string());
        output.push('\n');
    }

    output
}

/// Format a decoded instruction as assembly text.
pub fn format_instruction(instr: &Instruction) -> String {
    if let Some(alias) = format_alias(instr) {
        return alias;
    }

    match (instr.opcode, instr.mode) {
        (Opcode::Mvo, AddressingMode::Immediate) => match instr.operands.first() {
            Some(src) => format!("MVOI {}", format_operand(src, instr.mode)),
            None => "MVOI".to_string(),
        },
        (opcode, AddressingMode::Indirect) if !matches!(opcode, Opcode::MviAt | Opcode::MvoAt) => {
            with_operands(&format!("{}@", opcode.mnemonic()), instr)
        }
        (opcode, _) => with_operands(opcode.mnemonic(), instr),
    }
}

/// Conventional spellings of register and stack idioms.
fn format_alias(instr: &Instruction) -> Option<String> {
    let regs: Vec<u8> = instr
        .operands
        .iter()
        .filter_map(|op| match op {
            Operand::Register(r) => Some(*r),
            _ => None,
        })
        .collect();

    let alias = match (instr.opcode, regs.as_slice()) {
        (Opcode::Movr, &[src, dst]) if dst as usize == PC => format!("JR R{}", src),
        (Opcode::Movr, &[src, dst]) if src == dst => format!("TSTR R{}", src),
        (Opcode::Xorr, &[src, dst]) if src == dst => format!("CLRR R{}", src),
        _ => return None,
    };
    Some(alias)
}

fn with_operands(mnemonic: &str, instr: &Instruction) -> String {
    if instr.operands.is_empty() {
        return mnemonic.to_string();
    }
    let rendered: Vec<String> = instr
        .operands
        .iter()
        .map(|op| format_operand(op, instr.mode))
        .collect();
    format!("{} {}", mnemonic, rendered.join(", "))
}

fn format_operand(operand: &Operand, mode: AddressingMode) -> String {
    match operand {
        Operand::Register(r) => format!("R{}", r),
        // Shift count.
        Operand::Immediate(n) if mode == AddressingMode::Register => format!("{}", n),
        Operand::Immediate(n) => format!("#${:04X}", n),
        Operand::Address(a) => format!("${:04X}", a),
    }
}
