//! Instruction decoder for the CP-1600.
//!
//! Instructions are 10-bit decles stored in the low bits of a 16-bit word,
//! optionally followed by one or two operand words. Opcode groups overlap
//! in the decle space, so recognition is an ordered list of mask/value
//! rules: the first rule whose pattern matches claims the decle.

use crate::bits::{decle, Word};
use crate::cpu::memory::{Memory, MemoryError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Every operation the executor understands.
///
/// Some members (GSWD, NOP, CLRR, TSTR, JR, PSHR, PULR) are never produced
/// by the decoder. CLRR, TSTR and JR come out as their canonical MOVR/XORR
/// encodings. All of them can still be built by hand and executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Opcode {
    // ==================== Implied ====================
    Hlt,
    Sdbd,
    Eis,
    Dis,
    Tci,
    Clrc,
    Setc,
    Nop,

    // ==================== Register, one operand ====================
    Incr,
    Decr,
    Comr,
    Negr,
    Adcr,
    Gswd,
    Rswd,
    Clrr,
    Tstr,

    // ==================== Shift / rotate ====================
    Swap,
    Sll,
    Rlc,
    Sllc,
    Slr,
    Sar,
    Rrc,
    Sarc,

    // ==================== Register, two operands ====================
    Movr,
    Addr,
    Subr,
    Cmpr,
    Andr,
    Xorr,

    // ==================== Branches ====================
    B,
    Bc,
    Bov,
    Bpl,
    Beq,
    Blt,
    Ble,
    Busc,
    Nopp,
    Bnc,
    Bnov,
    Bmi,
    Bneq,
    Bge,
    Bgt,
    Besc,

    // ==================== Jumps ====================
    J,
    Je,
    Jd,
    Jsr,
    Jsre,
    Jsrd,
    Jr,

    // ==================== Stack ====================
    Pshr,
    Pulr,

    // ==================== Memory ====================
    Mvi,
    Mvo,
    #[serde(rename = "MVI@")]
    MviAt,
    #[serde(rename = "MVO@")]
    MvoAt,
    Add,
    Sub,
    Cmp,
    And,
    Xor,
}

/// Branch opcodes indexed by the 4-bit condition field.
const BRANCHES: [Opcode; 16] = [
    Opcode::B,
    Opcode::Bc,
    Opcode::Bov,
    Opcode::Bpl,
    Opcode::Beq,
    Opcode::Blt,
    Opcode::Ble,
    Opcode::Busc,
    Opcode::Nopp,
    Opcode::Bnc,
    Opcode::Bnov,
    Opcode::Bmi,
    Opcode::Bneq,
    Opcode::Bge,
    Opcode::Bgt,
    Opcode::Besc,
];

impl Opcode {
    /// Assembler mnemonic.
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Hlt => "HLT",
            Opcode::Sdbd => "SDBD",
            Opcode::Eis => "EIS",
            Opcode::Dis => "DIS",
            Opcode::Tci => "TCI",
            Opcode::Clrc => "CLRC",
            Opcode::Setc => "SETC",
            Opcode::Nop => "NOP",
            Opcode::Incr => "INCR",
            Opcode::Decr => "DECR",
            Opcode::Comr => "COMR",
            Opcode::Negr => "NEGR",
            Opcode::Adcr => "ADCR",
            Opcode::Gswd => "GSWD",
            Opcode::Rswd => "RSWD",
            Opcode::Clrr => "CLRR",
            Opcode::Tstr => "TSTR",
            Opcode::Swap => "SWAP",
            Opcode::Sll => "SLL",
            Opcode::Rlc => "RLC",
            Opcode::Sllc => "SLLC",
            Opcode::Slr => "SLR",
            Opcode::Sar => "SAR",
            Opcode::Rrc => "RRC",
            Opcode::Sarc => "SARC",
            Opcode::Movr => "MOVR",
            Opcode::Addr => "ADDR",
            Opcode::Subr => "SUBR",
            Opcode::Cmpr => "CMPR",
            Opcode::Andr => "ANDR",
            Opcode::Xorr => "XORR",
            Opcode::B => "B",
            Opcode::Bc => "BC",
            Opcode::Bov => "BOV",
            Opcode::Bpl => "BPL",
            Opcode::Beq => "BEQ",
            Opcode::Blt => "BLT",
            Opcode::Ble => "BLE",
            Opcode::Busc => "BUSC",
            Opcode::Nopp => "NOPP",
            Opcode::Bnc => "BNC",
            Opcode::Bnov => "BNOV",
            Opcode::Bmi => "BMI",
            Opcode::Bneq => "BNEQ",
            Opcode::Bge => "BGE",
            Opcode::Bgt => "BGT",
            Opcode::Besc => "BESC",
            Opcode::J => "J",
            Opcode::Je => "JE",
            Opcode::Jd => "JD",
            Opcode::Jsr => "JSR",
            Opcode::Jsre => "JSRE",
            Opcode::Jsrd => "JSRD",
            Opcode::Jr => "JR",
            Opcode::Pshr => "PSHR",
            Opcode::Pulr => "PULR",
            Opcode::Mvi => "MVI",
            Opcode::Mvo => "MVO",
            Opcode::MviAt => "MVI@",
            Opcode::MvoAt => "MVO@",
            Opcode::Add => "ADD",
            Opcode::Sub => "SUB",
            Opcode::Cmp => "CMP",
            Opcode::And => "AND",
            Opcode::Xor => "XOR",
        }
    }

    /// The branch opcode for a 4-bit condition code.
    pub fn branch(condition: Word) -> Opcode {
        BRANCHES[(condition & 0xF) as usize]
    }

    /// B, NOPP and the fourteen conditional branches.
    pub fn is_branch(self) -> bool {
        BRANCHES.contains(&self)
    }

    /// The three-word jump family.
    pub fn is_jump(self) -> bool {
        matches!(
            self,
            Opcode::J | Opcode::Je | Opcode::Jd | Opcode::Jsr | Opcode::Jsre | Opcode::Jsrd
        )
    }

    /// Opcodes whose immediate operand SDBD widens to 16 bits.
    pub fn accepts_sdbd(self) -> bool {
        matches!(
            self,
            Opcode::Mvi | Opcode::Add | Opcode::Sub | Opcode::Cmp | Opcode::And | Opcode::Xor
        )
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// How an instruction locates its operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AddressingMode {
    /// No operands.
    Implied,
    /// Register to register.
    Register,
    /// Value in the word following the opcode.
    Immediate,
    /// Absolute address in the word following the opcode.
    Direct,
    /// Address held in a pointer register.
    Indirect,
    /// Through the stack pointer.
    Stack,
    /// Immediate widened to 16 bits by a preceding SDBD.
    SdbdModified,
}

/// A decoded operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Operand {
    Register(u8),
    Immediate(Word),
    Address(Word),
}

/// A fully decoded instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    /// Where the instruction starts.
    pub address: Word,
    pub opcode: Opcode,
    pub mode: AddressingMode,
    /// Source before destination, as in assembly syntax.
    pub operands: Vec<Operand>,
    /// The 10-bit decle.
    pub raw: Word,
    /// Decoded under an active SDBD prefix.
    pub sdbd: bool,
    /// Words consumed, 1-3.
    pub length: Word,
}

impl Instruction {
    /// Build an instruction, deriving its length from opcode and mode.
    pub fn new(address: Word, opcode: Opcode, mode: AddressingMode, operands: Vec<Operand>) -> Self {
        Self {
            address,
            opcode,
            mode,
            operands,
            raw: 0,
            sdbd: false,
            length: instruction_length(opcode, mode),
        }
    }

    /// Address of the word after this instruction.
    pub fn next_address(&self) -> Word {
        self.address.wrapping_add(self.length)
    }
}

/// Words consumed by an instruction once its opcode and mode are known.
pub fn instruction_length(opcode: Opcode, mode: AddressingMode) -> Word {
    if mode == AddressingMode::SdbdModified || opcode.is_jump() {
        3
    } else if opcode.is_branch()
        || mode == AddressingMode::Immediate
        || mode == AddressingMode::Direct
    {
        2
    } else {
        1
    }
}

/// Decoder construction options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderOptions {
    /// Reject unrecognised decles. When false they decode as NOP.
    pub strict: bool,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self { strict: true }
    }
}

/// The words an instruction is decoded from.
struct Fetch<'a> {
    memory: &'a Memory,
    address: Word,
    raw: Word,
    sdbd: bool,
}

impl Fetch<'_> {
    /// Full 16-bit word `offset` words past the opcode.
    fn word(&self, offset: Word) -> Result<Word, MemoryError> {
        self.memory.read(self.address.wrapping_add(offset))
    }

    fn bits(&self, shift: u32, mask: Word) -> Word {
        (self.raw >> shift) & mask
    }

    /// Register field as an operand.
    fn reg(&self, shift: u32) -> Operand {
        Operand::Register(self.bits(shift, 0x7) as u8)
    }
}

/// What a rule produces: opcode, mode, operands.
type Decoded = (Opcode, AddressingMode, Vec<Operand>);

/// `Ok(None)` means the pattern matched but the decle is not a valid
/// instruction of that group.
type RuleFn = fn(&Fetch) -> Result<Option<Decoded>, MemoryError>;

struct Rule {
    mask: Word,
    value: Word,
    decode: RuleFn,
}

/// Recognition rules, most specific first. Order is significant.
const RULES: &[Rule] = &[
    Rule { mask: 0x3FF, value: 0x004, decode: decode_jump },
    Rule { mask: 0x3FC, value: 0x000, decode: decode_implied_a },
    Rule { mask: 0x3FC, value: 0x004, decode: decode_implied_b },
    Rule { mask: 0x3C0, value: 0x000, decode: decode_register_single },
    Rule { mask: 0x3C0, value: 0x040, decode: decode_shift },
    Rule { mask: 0x200, value: 0x000, decode: decode_register_pair },
    Rule { mask: 0x3D0, value: 0x200, decode: decode_branch },
    Rule { mask: 0x238, value: 0x238, decode: decode_immediate },
    Rule { mask: 0x238, value: 0x200, decode: decode_direct },
    Rule { mask: 0x200, value: 0x200, decode: decode_indirect },
];

// ==================== Rule bodies ====================

/// Three-word jump: `0x004`, then `rr..aaaaaa.ii`, then `aaaaaaaaaa`.
///
/// `rr` picks the return register (R4-R6, or 3 for a plain jump), `ii`
/// the interrupt action (none, enable, disable). The target's high six
/// bits come from the first operand word, the low ten from the second.
fn decode_jump(f: &Fetch) -> Result<Option<Decoded>, MemoryError> {
    let w1 = f.word(1)?;
    let w2 = f.word(2)?;
    let rr = (w1 >> 8) & 0x3;
    let ii = w1 & 0x3;
    let target = ((w1 & 0xFC) << 8) | decle(w2);

    let decoded = match (rr, ii) {
        (_, 3) => None,
        (3, ii) => {
            let opcode = [Opcode::J, Opcode::Je, Opcode::Jd][ii as usize];
            Some((opcode, AddressingMode::Direct, vec![Operand::Address(target)]))
        }
        (rr, ii) => {
            let opcode = [Opcode::Jsr, Opcode::Jsre, Opcode::Jsrd][ii as usize];
            let link = Operand::Register(4 + rr as u8);
            Some((opcode, AddressingMode::Direct, vec![link, Operand::Address(target)]))
        }
    };
    Ok(decoded)
}

fn decode_implied_a(f: &Fetch) -> Result<Option<Decoded>, MemoryError> {
    let opcode = [Opcode::Hlt, Opcode::Sdbd, Opcode::Eis, Opcode::Dis][f.bits(0, 0x3) as usize];
    Ok(Some((opcode, AddressingMode::Implied, Vec::new())))
}

fn decode_implied_b(f: &Fetch) -> Result<Option<Decoded>, MemoryError> {
    let opcode = match f.bits(0, 0x3) {
        1 => Opcode::Tci,
        2 => Opcode::Clrc,
        3 => Opcode::Setc,
        _ => return Ok(None),
    };
    Ok(Some((opcode, AddressingMode::Implied, Vec::new())))
}

fn decode_register_single(f: &Fetch) -> Result<Option<Decoded>, MemoryError> {
    let opcode = match f.bits(3, 0x7) {
        1 => Opcode::Incr,
        2 => Opcode::Decr,
        3 => Opcode::Comr,
        4 => Opcode::Negr,
        5 => Opcode::Adcr,
        7 => Opcode::Rswd,
        _ => return Ok(None),
    };
    Ok(Some((opcode, AddressingMode::Register, vec![f.reg(0)])))
}

/// Shifts name R0-R3 in bits 0-1; bit 2 asks for a two-position shift.
fn decode_shift(f: &Fetch) -> Result<Option<Decoded>, MemoryError> {
    let opcode = [
        Opcode::Swap,
        Opcode::Sll,
        Opcode::Rlc,
        Opcode::Sllc,
        Opcode::Slr,
        Opcode::Sar,
        Opcode::Rrc,
        Opcode::Sarc,
    ][f.bits(3, 0x7) as usize];

    let mut operands = vec![Operand::Register(f.bits(0, 0x3) as u8)];
    if f.bits(2, 0x1) == 1 {
        operands.push(Operand::Immediate(2));
    }
    Ok(Some((opcode, AddressingMode::Register, operands)))
}

fn decode_register_pair(f: &Fetch) -> Result<Option<Decoded>, MemoryError> {
    let opcode = match f.bits(6, 0x7) {
        2 => Opcode::Movr,
        3 => Opcode::Addr,
        4 => Opcode::Subr,
        5 => Opcode::Cmpr,
        6 => Opcode::Andr,
        7 => Opcode::Xorr,
        _ => return Ok(None),
    };
    Ok(Some((opcode, AddressingMode::Register, vec![f.reg(3), f.reg(0)])))
}

/// Relative branch. Bit 5 selects a backward displacement.
fn decode_branch(f: &Fetch) -> Result<Option<Decoded>, MemoryError> {
    let opcode = Opcode::branch(f.bits(0, 0xF));
    let displacement = decle(f.word(1)?);
    let target = if f.bits(5, 0x1) == 1 {
        f.address.wrapping_add(displacement).wrapping_sub(0x3FFD)
    } else {
        f.address.wrapping_add(2).wrapping_add(displacement)
    };
    Ok(Some((opcode, AddressingMode::Direct, vec![Operand::Address(target)])))
}

/// Opcode field shared by the immediate, direct and indirect groups.
fn memory_opcode(f: &Fetch) -> Option<Opcode> {
    match f.bits(6, 0x7) {
        1 => Some(Opcode::Mvo),
        2 => Some(Opcode::Mvi),
        3 => Some(Opcode::Add),
        4 => Some(Opcode::Sub),
        5 => Some(Opcode::Cmp),
        6 => Some(Opcode::And),
        7 => Some(Opcode::Xor),
        _ => None,
    }
}

/// Under SDBD the operand is split over two words, low byte first.
fn sdbd_immediate(f: &Fetch, opcode: Opcode) -> Result<Option<Decoded>, MemoryError> {
    let low = f.word(1)? & 0xFF;
    let high = f.word(2)? & 0xFF;
    let value = (high << 8) | low;
    Ok(Some((
        opcode,
        AddressingMode::SdbdModified,
        vec![Operand::Immediate(value), f.reg(0)],
    )))
}

fn decode_immediate(f: &Fetch) -> Result<Option<Decoded>, MemoryError> {
    let Some(opcode) = memory_opcode(f) else {
        return Ok(None);
    };
    if f.sdbd && opcode.accepts_sdbd() {
        return sdbd_immediate(f, opcode);
    }

    let operands = if opcode == Opcode::Mvo {
        // MVOI: the store lands in the operand word itself.
        vec![f.reg(0), Operand::Address(f.address.wrapping_add(1))]
    } else {
        vec![Operand::Immediate(f.word(1)?), f.reg(0)]
    };
    Ok(Some((opcode, AddressingMode::Immediate, operands)))
}

fn decode_direct(f: &Fetch) -> Result<Option<Decoded>, MemoryError> {
    let Some(opcode) = memory_opcode(f) else {
        return Ok(None);
    };
    if f.sdbd && opcode.accepts_sdbd() {
        return sdbd_immediate(f, opcode);
    }

    let address = Operand::Address(f.word(1)?);
    let operands = if opcode == Opcode::Mvo {
        vec![f.reg(0), address]
    } else {
        vec![address, f.reg(0)]
    };
    Ok(Some((opcode, AddressingMode::Direct, operands)))
}

/// Pointer register in bits 3-5 (R1-R6; R0 and R7 select direct and
/// immediate and never reach this rule).
fn decode_indirect(f: &Fetch) -> Result<Option<Decoded>, MemoryError> {
    let (opcode, operands) = match memory_opcode(f) {
        Some(Opcode::Mvo) => (Opcode::MvoAt, vec![f.reg(0), f.reg(3)]),
        Some(Opcode::Mvi) => (Opcode::MviAt, vec![f.reg(3), f.reg(0)]),
        Some(opcode) => (opcode, vec![f.reg(3), f.reg(0)]),
        None => return Ok(None),
    };
    Ok(Some((opcode, AddressingMode::Indirect, operands)))
}

// ==================== Decoder ====================

/// Turns words in memory into [`Instruction`]s.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decoder {
    options: DecoderOptions,
}

impl Decoder {
    /// A strict decoder.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: DecoderOptions) -> Self {
        Self { options }
    }

    /// A decoder that turns unknown decles into NOPs.
    pub fn lenient() -> Self {
        Self::with_options(DecoderOptions { strict: false })
    }

    pub fn options(&self) -> DecoderOptions {
        self.options
    }

    /// Decode the instruction at `address`.
    ///
    /// `sdbd_active` is the CPU's SDBD flag: whether the previous
    /// instruction was an SDBD prefix.
    pub fn decode(
        &self,
        memory: &Memory,
        address: Word,
        sdbd_active: bool,
    ) -> Result<Instruction, DecodeError> {
        let raw = decle(memory.read(address)?);
        let fetch = Fetch {
            memory,
            address,
            raw,
            sdbd: sdbd_active,
        };

        let decoded = match RULES.iter().find(|rule| raw & rule.mask == rule.value) {
            Some(rule) => (rule.decode)(&fetch)?,
            None => None,
        };

        let (opcode, mode, operands) = match decoded {
            Some(decoded) => decoded,
            None if self.options.strict => {
                return Err(DecodeError::UnknownOpcode { raw, address });
            }
            None => (Opcode::Nop, AddressingMode::Implied, Vec::new()),
        };

        let mut instruction = Instruction::new(address, opcode, mode, operands);
        instruction.raw = raw;
        instruction.sdbd = sdbd_active && opcode != Opcode::Sdbd;
        Ok(instruction)
    }
}

/// Errors that can occur during instruction decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unknown opcode 0b{raw:010b} (0x{raw:03X}) at ${address:04X}")]
    UnknownOpcode { raw: Word, address: Word },

    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn memory_with(address: Word, words: &[Word]) -> Memory {
        let mut mem = Memory::new();
        mem.load(address, words).unwrap();
        mem
    }

    fn decode_at(words: &[Word]) -> Instruction {
        let mem = memory_with(0x5000, words);
        Decoder::new().decode(&mem, 0x5000, false).unwrap()
    }

    #[test]
    fn test_decode_implied() {
        assert_eq!(decode_at(&[0x000]).opcode, Opcode::Hlt);
        assert_eq!(decode_at(&[0x001]).opcode, Opcode::Sdbd);
        assert_eq!(decode_at(&[0x002]).opcode, Opcode::Eis);
        assert_eq!(decode_at(&[0x003]).opcode, Opcode::Dis);
        assert_eq!(decode_at(&[0x005]).opcode, Opcode::Tci);
        assert_eq!(decode_at(&[0x006]).opcode, Opcode::Clrc);
        assert_eq!(decode_at(&[0x007]).opcode, Opcode::Setc);

        let hlt = decode_at(&[0x000]);
        assert_eq!(hlt.mode, AddressingMode::Implied);
        assert!(hlt.operands.is_empty());
        assert_eq!(hlt.length, 1);
    }

    #[test]
    fn test_upper_bits_ignored() {
        let instr = decode_at(&[0xFC00]);
        assert_eq!(instr.opcode, Opcode::Hlt);
        assert_eq!(instr.raw, 0);
    }

    #[test]
    fn test_decode_register_single() {
        let incr = decode_at(&[0x00B]);
        assert_eq!(incr.opcode, Opcode::Incr);
        assert_eq!(incr.operands, vec![Operand::Register(3)]);

        assert_eq!(decode_at(&[0x010]).opcode, Opcode::Decr);
        assert_eq!(decode_at(&[0x018]).opcode, Opcode::Comr);
        assert_eq!(decode_at(&[0x020]).opcode, Opcode::Negr);
        assert_eq!(decode_at(&[0x028]).opcode, Opcode::Adcr);
        assert_eq!(decode_at(&[0x038]).opcode, Opcode::Rswd);
    }

    #[test]
    fn test_register_group_six_is_unknown() {
        let mem = memory_with(0x5000, &[0x030]);
        let err = Decoder::new().decode(&mem, 0x5000, false).unwrap_err();
        assert_eq!(err, DecodeError::UnknownOpcode { raw: 0x030, address: 0x5000 });
        assert!(err.to_string().contains("0b0000110000"));
    }

    #[test]
    fn test_lenient_decodes_unknown_as_nop() {
        let mem = memory_with(0x5000, &[0x030]);
        let instr = Decoder::lenient().decode(&mem, 0x5000, false).unwrap();
        assert_eq!(instr.opcode, Opcode::Nop);
        assert_eq!(instr.mode, AddressingMode::Implied);
        assert_eq!(instr.length, 1);
        assert_eq!(instr.raw, 0x030);
    }

    #[test]
    fn test_decode_shifts() {
        let sll = decode_at(&[0x049]);
        assert_eq!(sll.opcode, Opcode::Sll);
        assert_eq!(sll.operands, vec![Operand::Register(1)]);

        let double = decode_at(&[0x04D]);
        assert_eq!(double.opcode, Opcode::Sll);
        assert_eq!(double.operands, vec![Operand::Register(1), Operand::Immediate(2)]);

        assert_eq!(decode_at(&[0x040]).opcode, Opcode::Swap);
        assert_eq!(decode_at(&[0x07B]).opcode, Opcode::Sarc);
    }

    #[test]
    fn test_decode_register_pair() {
        let addr = decode_at(&[0x0C8]);
        assert_eq!(addr.opcode, Opcode::Addr);
        assert_eq!(addr.mode, AddressingMode::Register);
        assert_eq!(addr.operands, vec![Operand::Register(1), Operand::Register(0)]);

        let movr = decode_at(&[0x082]);
        assert_eq!(movr.opcode, Opcode::Movr);
        assert_eq!(movr.operands, vec![Operand::Register(0), Operand::Register(2)]);

        assert_eq!(decode_at(&[0x1FF]).opcode, Opcode::Xorr);
    }

    #[test]
    fn test_decode_branch_forward() {
        let b = decode_at(&[0x200, 0x00A]);
        assert_eq!(b.opcode, Opcode::B);
        assert_eq!(b.operands, vec![Operand::Address(0x500C)]);
        assert_eq!(b.length, 2);
    }

    #[test]
    fn test_decode_branch_backward() {
        let bneq = decode_at(&[0x22C, 0x004]);
        assert_eq!(bneq.opcode, Opcode::Bneq);
        assert_eq!(bneq.operands, vec![Operand::Address(0x1007)]);
    }

    #[test]
    fn test_branch_condition_table() {
        for (code, expected) in BRANCHES.iter().enumerate() {
            let instr = decode_at(&[0x200 | code as Word, 0]);
            assert_eq!(instr.opcode, *expected);
        }
    }

    #[test]
    fn test_decode_immediate() {
        let mvi = decode_at(&[0x2B8, 42]);
        assert_eq!(mvi.opcode, Opcode::Mvi);
        assert_eq!(mvi.mode, AddressingMode::Immediate);
        assert_eq!(mvi.operands, vec![Operand::Immediate(42), Operand::Register(0)]);
        assert_eq!(mvi.length, 2);

        let mvoi = decode_at(&[0x27A, 0]);
        assert_eq!(mvoi.opcode, Opcode::Mvo);
        assert_eq!(mvoi.operands, vec![Operand::Register(2), Operand::Address(0x5001)]);
    }

    #[test]
    fn test_decode_direct() {
        let add = decode_at(&[0x2C1, 0x0200]);
        assert_eq!(add.opcode, Opcode::Add);
        assert_eq!(add.mode, AddressingMode::Direct);
        assert_eq!(add.operands, vec![Operand::Address(0x0200), Operand::Register(1)]);

        let mvo = decode_at(&[0x243, 0x0300]);
        assert_eq!(mvo.opcode, Opcode::Mvo);
        assert_eq!(mvo.operands, vec![Operand::Register(3), Operand::Address(0x0300)]);
    }

    #[test]
    fn test_decode_indirect() {
        let mvi = decode_at(&[0x2A1]);
        assert_eq!(mvi.opcode, Opcode::MviAt);
        assert_eq!(mvi.mode, AddressingMode::Indirect);
        assert_eq!(mvi.operands, vec![Operand::Register(4), Operand::Register(1)]);
        assert_eq!(mvi.length, 1);

        let mvo = decode_at(&[0x261]);
        assert_eq!(mvo.opcode, Opcode::MvoAt);
        assert_eq!(mvo.operands, vec![Operand::Register(1), Operand::Register(4)]);

        let add = decode_at(&[0x2EA]);
        assert_eq!(add.opcode, Opcode::Add);
        assert_eq!(add.operands, vec![Operand::Register(5), Operand::Register(2)]);
    }

    #[test]
    fn test_decode_jump_family() {
        let j = decode_at(&[0x004, 0x350, 0x100]);
        assert_eq!(j.opcode, Opcode::J);
        assert_eq!(j.operands, vec![Operand::Address(0x5100)]);
        assert_eq!(j.length, 3);

        let jsr = decode_at(&[0x004, 0x160, 0x000]);
        assert_eq!(jsr.opcode, Opcode::Jsr);
        assert_eq!(jsr.operands, vec![Operand::Register(5), Operand::Address(0x6000)]);

        assert_eq!(decode_at(&[0x004, 0x301, 0]).opcode, Opcode::Je);
        assert_eq!(decode_at(&[0x004, 0x302, 0]).opcode, Opcode::Jd);
        assert_eq!(decode_at(&[0x004, 0x001, 0]).opcode, Opcode::Jsre);
        assert_eq!(decode_at(&[0x004, 0x202, 0]).opcode, Opcode::Jsrd);
    }

    #[test]
    fn test_sdbd_widens_immediate() {
        let mem = memory_with(0x5000, &[0x2B8, 0x34, 0x12]);
        let decoder = Decoder::new();

        let wide = decoder.decode(&mem, 0x5000, true).unwrap();
        assert_eq!(wide.mode, AddressingMode::SdbdModified);
        assert_eq!(wide.length, 3);
        assert_eq!(wide.operands[0], Operand::Immediate(0x1234));
        assert!(wide.sdbd);

        let narrow = decoder.decode(&mem, 0x5000, false).unwrap();
        assert_eq!(narrow.mode, AddressingMode::Immediate);
        assert_eq!(narrow.length, 2);
    }

    #[test]
    fn test_sdbd_prefix_never_flags_itself() {
        let mem = memory_with(0x5000, &[0x001]);
        let instr = Decoder::new().decode(&mem, 0x5000, true).unwrap();
        assert_eq!(instr.opcode, Opcode::Sdbd);
        assert!(!instr.sdbd);
        assert_eq!(instr.length, 1);
    }

    #[test]
    fn test_sdbd_ignored_for_register_ops() {
        let mem = memory_with(0x5000, &[0x0C8]);
        let instr = Decoder::new().decode(&mem, 0x5000, true).unwrap();
        assert_eq!(instr.mode, AddressingMode::Register);
        assert_eq!(instr.length, 1);
    }

    proptest! {
        #[test]
        fn prop_decode_is_deterministic(
            words in proptest::collection::vec(any::<u16>(), 3),
            sdbd in any::<bool>(),
        ) {
            let mem = memory_with(0x4000, &words);
            let decoder = Decoder::lenient();
            let first = decoder.decode(&mem, 0x4000, sdbd).unwrap();
            let second = decoder.decode(&mem, 0x4000, sdbd).unwrap();
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_length_in_range(
            words in proptest::collection::vec(any::<u16>(), 3),
            sdbd in any::<bool>(),
        ) {
            let mem = memory_with(0x4000, &words);
            let instr = Decoder::lenient().decode(&mem, 0x4000, sdbd).unwrap();
            prop_assert!((1..=3).contains(&instr.length));
        }
    }
}
