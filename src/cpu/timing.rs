//! Per-instruction cycle costs.

use crate::cpu::decode::{AddressingMode, Instruction, Opcode, Operand};
use crate::cpu::registers::SP;

/// Instruction forms with a fixed cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CycleCostKind {
    /// HLT, SDBD, TCI, CLRC, SETC.
    Control,
    /// EIS, DIS, NOP.
    Mode,
    /// The never-taken branch.
    Nopp,
    /// Register-only operations and single shifts.
    Register,
    /// Two-position shifts.
    DoubleShift,
    BranchTaken,
    BranchNotTaken,
    /// BUSC / BESC when taken.
    SignCarryBranchTaken,
    /// BUSC / BESC when not taken.
    SignCarryBranchNotTaken,
    /// J, JE, JD, JR.
    Jump,
    /// JSR, JSRE, JSRD.
    Call,
    /// PSHR, PULR.
    Stack,
    /// MVI/ADD/SUB/CMP/AND/XOR with an immediate operand.
    Immediate,
    /// MVO into its own operand word.
    StoreImmediate,
    /// Read from an absolute address.
    Direct,
    /// MVO to an absolute address.
    StoreDirect,
    /// Read through a pointer register.
    Indirect,
    /// Write through a pointer register.
    StoreIndirect,
}

/// Single source of truth for fixed costs.
pub const CYCLE_COST_TABLE: &[(CycleCostKind, u32)] = &[
    (CycleCostKind::Control, 4),
    (CycleCostKind::Mode, 6),
    (CycleCostKind::Nopp, 7),
    (CycleCostKind::Register, 6),
    (CycleCostKind::DoubleShift, 8),
    (CycleCostKind::BranchTaken, 7),
    (CycleCostKind::BranchNotTaken, 6),
    (CycleCostKind::SignCarryBranchTaken, 9),
    (CycleCostKind::SignCarryBranchNotTaken, 7),
    (CycleCostKind::Jump, 7),
    (CycleCostKind::Call, 12),
    (CycleCostKind::Stack, 11),
    (CycleCostKind::Immediate, 8),
    (CycleCostKind::StoreImmediate, 9),
    (CycleCostKind::Direct, 10),
    (CycleCostKind::StoreDirect, 11),
    (CycleCostKind::Indirect, 8),
    (CycleCostKind::StoreIndirect, 9),
];

/// Extra cost of an SDBD-widened immediate.
pub const SDBD_PENALTY: u32 = 2;

/// Extra cost of indirect access through R6.
pub const STACK_POINTER_PENALTY: u32 = 3;

/// Look up a fixed cost.
#[must_use]
pub fn cycle_cost(kind: CycleCostKind) -> u32 {
    CYCLE_COST_TABLE
        .iter()
        .find_map(|(entry, cycles)| (*entry == kind).then_some(*cycles))
        .unwrap_or(0)
}

/// Cost class of an instruction, plus any adjustment.
fn classify(instr: &Instruction, branch_taken: bool) -> (CycleCostKind, u32) {
    use CycleCostKind as K;

    match instr.opcode {
        Opcode::Hlt | Opcode::Sdbd | Opcode::Tci | Opcode::Clrc | Opcode::Setc => (K::Control, 0),
        Opcode::Eis | Opcode::Dis | Opcode::Nop => (K::Mode, 0),
        Opcode::Nopp => (K::Nopp, 0),

        Opcode::Incr
        | Opcode::Decr
        | Opcode::Comr
        | Opcode::Negr
        | Opcode::Adcr
        | Opcode::Gswd
        | Opcode::Rswd
        | Opcode::Clrr
        | Opcode::Tstr
        | Opcode::Movr
        | Opcode::Addr
        | Opcode::Subr
        | Opcode::Cmpr
        | Opcode::Andr
        | Opcode::Xorr => (K::Register, 0),

        Opcode::Swap
        | Opcode::Sll
        | Opcode::Rlc
        | Opcode::Sllc
        | Opcode::Slr
        | Opcode::Sar
        | Opcode::Rrc
        | Opcode::Sarc => {
            if matches!(instr.operands.get(1), Some(Operand::Immediate(n)) if *n >= 2) {
                (K::DoubleShift, 0)
            } else {
                (K::Register, 0)
            }
        }

        Opcode::Busc | Opcode::Besc if branch_taken => (K::SignCarryBranchTaken, 0),
        Opcode::Busc | Opcode::Besc => (K::SignCarryBranchNotTaken, 0),
        Opcode::B => (K::BranchTaken, 0),
        op if op.is_branch() && branch_taken => (K::BranchTaken, 0),
        op if op.is_branch() => (K::BranchNotTaken, 0),

        Opcode::J | Opcode::Je | Opcode::Jd | Opcode::Jr => (K::Jump, 0),
        Opcode::Jsr | Opcode::Jsre | Opcode::Jsrd => (K::Call, 0),
        Opcode::Pshr | Opcode::Pulr => (K::Stack, 0),

        Opcode::Mvo => match instr.mode {
            AddressingMode::Immediate => (K::StoreImmediate, 0),
            AddressingMode::Indirect => (K::StoreIndirect, pointer_penalty(instr, 1)),
            _ => (K::StoreDirect, 0),
        },
        Opcode::MvoAt => (K::StoreIndirect, pointer_penalty(instr, 1)),
        Opcode::MviAt => (K::Indirect, pointer_penalty(instr, 0)),

        // MVI, ADD, SUB, CMP, AND, XOR
        _ => match instr.mode {
            AddressingMode::Direct => (K::Direct, 0),
            AddressingMode::Indirect => (K::Indirect, pointer_penalty(instr, 0)),
            AddressingMode::SdbdModified if instr.raw & 0x238 == 0x200 => (K::Direct, SDBD_PENALTY),
            AddressingMode::SdbdModified => (K::Immediate, SDBD_PENALTY),
            _ => (K::Immediate, 0),
        },
    }
}

fn pointer_penalty(instr: &Instruction, index: usize) -> u32 {
    match instr.operands.get(index) {
        Some(Operand::Register(r)) if *r as usize == SP => STACK_POINTER_PENALTY,
        _ => 0,
    }
}

/// Cycles charged for executing `instr`. `branch_taken` only matters for
/// conditional branches.
pub fn instruction_cycles(instr: &Instruction, branch_taken: bool) -> u32 {
    let (kind, extra) = classify(instr, branch_taken);
    cycle_cost(kind) + extra
}
