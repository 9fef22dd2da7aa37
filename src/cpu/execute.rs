//! CPU execution engine for the CP-1600.
//!
//! Applies one decoded [`Instruction`] to a [`Cpu`] and [`Memory`]: the
//! opcode's data effect, its flag policy, its cycle cost and the program
//! counter update.

use crate::bits::{sign_bit, Word};
use crate::cpu::alu::{self, AluResult, Shift};
use crate::cpu::decode::{AddressingMode, Instruction, Opcode, Operand};
use crate::cpu::memory::{Memory, MemoryError};
use crate::cpu::registers::{FlagUpdate, Flags, SP};
use crate::cpu::state::{Cpu, CpuError, CpuState};
use crate::cpu::timing;
use thiserror::Error;

/// One executed instruction, as seen by a [`TraceSink`].
#[derive(Debug, Clone, Copy)]
pub struct TraceEvent<'a> {
    pub instruction: &'a Instruction,
    pub pc_before: Word,
    pub pc_after: Word,
    /// Cycles charged for this instruction.
    pub cycles: u32,
    /// `Some` for branches: whether the branch was taken.
    pub branch_taken: Option<bool>,
    /// State after execution.
    pub state: CpuState,
}

/// Receives an event for every executed instruction.
pub trait TraceSink {
    /// Records an event in execution order.
    fn on_event(&mut self, event: &TraceEvent<'_>);
}

impl<F: FnMut(&TraceEvent<'_>)> TraceSink for F {
    fn on_event(&mut self, event: &TraceEvent<'_>) {
        self(event)
    }
}

/// How control leaves an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    /// Sequential; advance past the instruction unless PC was written.
    Next,
    /// The handler set PC to the branch or jump target.
    Taken,
    /// A branch fell through; the handler set PC to the next instruction.
    NotTaken,
}

/// Executes instructions against borrowed processor state.
pub struct Executor<'a> {
    cpu: &'a mut Cpu,
    memory: &'a mut Memory,
    sink: Option<&'a mut dyn TraceSink>,
}

impl<'a> Executor<'a> {
    pub fn new(cpu: &'a mut Cpu, memory: &'a mut Memory) -> Self {
        Self { cpu, memory, sink: None }
    }

    /// Attach a sink that sees every executed instruction.
    pub fn with_trace(mut self, sink: &'a mut dyn TraceSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Execute one instruction, returning the cycles it cost.
    ///
    /// Errors leave PC, the cycle counter and the SDBD flag untouched.
    pub fn execute(&mut self, instr: &Instruction) -> Result<u32, ExecuteError> {
        let pc_before = self.cpu.pc();
        let flow = self.dispatch(instr)?;

        if flow == Flow::Next && self.cpu.pc() == pc_before {
            self.cpu.increment_pc(instr.length);
        }
        if instr.opcode != Opcode::Sdbd {
            self.cpu.set_sdbd(false);
        }

        let branch_taken = match flow {
            Flow::Taken => true,
            Flow::NotTaken | Flow::Next => false,
        };
        let cycles = timing::instruction_cycles(instr, branch_taken);
        self.cpu.add_cycles(cycles as i64);

        if let Some(sink) = self.sink.as_deref_mut() {
            let event = TraceEvent {
                instruction: instr,
                pc_before,
                pc_after: self.cpu.pc(),
                cycles,
                branch_taken: instr.opcode.is_branch().then_some(branch_taken),
                state: self.cpu.state(),
            };
            sink.on_event(&event);
        }

        Ok(cycles)
    }

    fn dispatch(&mut self, instr: &Instruction) -> Result<Flow, ExecuteError> {
        match instr.opcode {
            // ==================== Implied ====================
            Opcode::Hlt => self.cpu.halt(),
            Opcode::Sdbd => self.cpu.set_sdbd(true),
            Opcode::Eis => self.cpu.set_interrupts_enabled(true),
            Opcode::Dis => self.cpu.set_interrupts_enabled(false),
            // No interrupt controller: nothing to acknowledge.
            Opcode::Tci | Opcode::Nop => {}
            Opcode::Clrc => self.cpu.set_flags(FlagUpdate::default().with_c(false)),
            Opcode::Setc => self.cpu.set_flags(FlagUpdate::default().with_c(true)),

            // ==================== Register, one operand ====================
            Opcode::Incr => self.update_register(instr, |v, _| alu::add(v, 1, false))?,
            Opcode::Decr => self.update_register(instr, |v, _| alu::sub(v, 1))?,
            Opcode::Comr => self.update_register(instr, |v, _| alu::logic(!v))?,
            Opcode::Negr => self.update_register(instr, |v, _| alu::sub(0, v))?,
            Opcode::Adcr => self.update_register(instr, |v, flags| alu::add(v, 0, flags.c))?,
            Opcode::Clrr => self.update_register(instr, |_, _| alu::logic(0))?,
            Opcode::Gswd => {
                let r = self.reg_operand(instr, 0)?;
                let status = self.cpu.flags().to_status_word();
                self.cpu.set_register(r, status)?;
            }
            Opcode::Rswd => {
                let r = self.reg_operand(instr, 0)?;
                let word = self.cpu.register(r)?;
                self.cpu.set_flags(FlagUpdate::all(Flags::from_status_word(word)));
            }
            Opcode::Tstr => {
                let r = self.reg_operand(instr, 0)?;
                let value = self.cpu.register(r)?;
                self.cpu.set_flags(
                    FlagUpdate::zs(value == 0, sign_bit(value))
                        .with_c(false)
                        .with_ov(false),
                );
            }

            // ==================== Shift / rotate ====================
            Opcode::Swap => self.shift(instr, Shift::Swap)?,
            Opcode::Sll => self.shift(instr, Shift::Sll)?,
            Opcode::Rlc => self.shift(instr, Shift::Rlc)?,
            Opcode::Sllc => self.shift(instr, Shift::Sllc)?,
            Opcode::Slr => self.shift(instr, Shift::Slr)?,
            Opcode::Sar => self.shift(instr, Shift::Sar)?,
            Opcode::Rrc => self.shift(instr, Shift::Rrc)?,
            Opcode::Sarc => self.shift(instr, Shift::Sarc)?,

            // ==================== Register, two operands ====================
            Opcode::Movr => self.register_pair(instr, |src, _| alu::logic(src))?,
            Opcode::Addr => self.register_pair(instr, |src, dst| alu::add(dst, src, false))?,
            Opcode::Subr => self.register_pair(instr, |src, dst| alu::sub(dst, src))?,
            Opcode::Andr => self.register_pair(instr, |src, dst| alu::logic(dst & src))?,
            Opcode::Xorr => self.register_pair(instr, |src, dst| alu::logic(dst ^ src))?,
            Opcode::Cmpr => {
                let src = self.cpu.register(self.reg_operand(instr, 0)?)?;
                let dst = self.cpu.register(self.reg_operand(instr, 1)?)?;
                self.cpu.set_flags(alu::sub(dst, src).flags);
            }

            // ==================== Control flow ====================
            op if op.is_branch() => return self.branch(instr),
            Opcode::J | Opcode::Je | Opcode::Jd => {
                let target = self.address_operand(instr, 0)?;
                self.apply_interrupt_mode(instr.opcode);
                self.cpu.set_pc(target);
                return Ok(Flow::Taken);
            }
            Opcode::Jsr | Opcode::Jsre | Opcode::Jsrd => {
                let link = self.reg_operand(instr, 0)?;
                let target = self.address_operand(instr, 1)?;
                // The link is the word after the opcode, not after the target.
                self.cpu.set_register(link, instr.address.wrapping_add(1))?;
                self.apply_interrupt_mode(instr.opcode);
                self.cpu.set_pc(target);
                return Ok(Flow::Taken);
            }
            Opcode::Jr => {
                let target = self.cpu.register(self.reg_operand(instr, 0)?)?;
                self.cpu.set_pc(target);
                return Ok(Flow::Taken);
            }

            // ==================== Stack ====================
            Opcode::Pshr => {
                let value = self.cpu.register(self.reg_operand(instr, 0)?)?;
                self.push(value)?;
            }
            Opcode::Pulr => {
                let r = self.reg_operand(instr, 0)?;
                let value = self.pull()?;
                self.cpu.set_register(r, value)?;
            }

            // ==================== Memory ====================
            Opcode::Mvi => {
                let value = self.read_source(instr)?;
                self.write_result(instr, alu::logic(value))?;
            }
            Opcode::Mvo => self.store(instr)?,
            Opcode::MviAt => {
                let ptr = self.reg_operand(instr, 0)?;
                let value = self.read_indirect(ptr, true)?;
                self.write_result(instr, alu::logic(value))?;
            }
            Opcode::MvoAt => {
                let value = self.cpu.register(self.reg_operand(instr, 0)?)?;
                let ptr = self.reg_operand(instr, 1)?;
                self.write_indirect(ptr, value, true)?;
            }
            Opcode::Add => self.memory_arith(instr, |src, dst| alu::add(dst, src, false))?,
            Opcode::Sub => self.memory_arith(instr, |src, dst| alu::sub(dst, src))?,
            Opcode::And => self.memory_arith(instr, |src, dst| alu::logic(dst & src))?,
            Opcode::Xor => self.memory_arith(instr, |src, dst| alu::logic(dst ^ src))?,
            Opcode::Cmp => {
                let src = self.read_source(instr)?;
                let dst = self.cpu.register(self.reg_operand(instr, 1)?)?;
                self.cpu.set_flags(alu::sub(dst, src).flags);
            }

            // is_branch() above claims every remaining branch opcode
            _ => return Err(ExecuteError::unimplemented(instr)),
        }
        Ok(Flow::Next)
    }

    // ==================== Operand access ====================

    fn operand(&self, instr: &Instruction, index: usize) -> Result<Operand, ExecuteError> {
        instr
            .operands
            .get(index)
            .copied()
            .ok_or(ExecuteError::MissingOperand {
                opcode: instr.opcode,
                index,
            })
    }

    fn reg_operand(&self, instr: &Instruction, index: usize) -> Result<usize, ExecuteError> {
        match self.operand(instr, index)? {
            Operand::Register(r) => Ok(r as usize),
            _ => Err(ExecuteError::OperandKind {
                opcode: instr.opcode,
                index,
                expected: "register",
            }),
        }
    }

    fn address_operand(&self, instr: &Instruction, index: usize) -> Result<Word, ExecuteError> {
        match self.operand(instr, index)? {
            Operand::Address(a) => Ok(a),
            _ => Err(ExecuteError::OperandKind {
                opcode: instr.opcode,
                index,
                expected: "address",
            }),
        }
    }

    /// Source value of MVI / ADD / SUB / CMP / AND / XOR, by mode.
    fn read_source(&mut self, instr: &Instruction) -> Result<Word, ExecuteError> {
        match (instr.mode, self.operand(instr, 0)?) {
            (AddressingMode::Immediate | AddressingMode::SdbdModified, Operand::Immediate(v)) => {
                Ok(v)
            }
            (AddressingMode::Direct, Operand::Address(a)) => Ok(self.memory.read(a)?),
            (AddressingMode::Indirect, Operand::Register(ptr)) => {
                self.read_indirect(ptr as usize, false)
            }
            _ => Err(ExecuteError::unimplemented(instr)),
        }
    }

    // ==================== Indirect and stack access ====================

    /// Read through pointer register `ptr`.
    ///
    /// With `always_increment` (MVI@) every pointer, R6 included, is
    /// post-incremented. Otherwise R6 pulls (read, then decrement) and R4
    /// and R5 post-increment.
    fn read_indirect(&mut self, ptr: usize, always_increment: bool) -> Result<Word, ExecuteError> {
        if ptr == SP && !always_increment {
            return self.pull();
        }
        let address = self.cpu.register(ptr)?;
        let value = self.memory.read(address)?;
        if always_increment || matches!(ptr, 4 | 5) {
            self.cpu.set_register(ptr, address.wrapping_add(1))?;
        }
        Ok(value)
    }

    /// Write through pointer register `ptr`; R6 pushes unless
    /// `always_increment` (MVO@) is set.
    fn write_indirect(
        &mut self,
        ptr: usize,
        value: Word,
        always_increment: bool,
    ) -> Result<(), ExecuteError> {
        if ptr == SP && !always_increment {
            return self.push(value);
        }
        let address = self.cpu.register(ptr)?;
        self.memory.write(address, value)?;
        if always_increment || matches!(ptr, 4 | 5) {
            self.cpu.set_register(ptr, address.wrapping_add(1))?;
        }
        Ok(())
    }

    /// Pre-increment R6, then write.
    fn push(&mut self, value: Word) -> Result<(), ExecuteError> {
        let sp = self.cpu.register(SP)?.wrapping_add(1);
        self.cpu.set_register(SP, sp)?;
        self.memory.write(sp, value)?;
        Ok(())
    }

    /// Read at R6, then decrement.
    fn pull(&mut self) -> Result<Word, ExecuteError> {
        let sp = self.cpu.register(SP)?;
        let value = self.memory.read(sp)?;
        self.cpu.set_register(SP, sp.wrapping_sub(1))?;
        Ok(value)
    }

    // ==================== Handler helpers ====================

    /// Store an ALU result in the destination (operand 1) and apply flags.
    fn write_result(&mut self, instr: &Instruction, result: AluResult) -> Result<(), ExecuteError> {
        let dst = self.reg_operand(instr, 1)?;
        self.cpu.set_register(dst, result.value)?;
        self.cpu.set_flags(result.flags);
        Ok(())
    }

    fn update_register(
        &mut self,
        instr: &Instruction,
        op: impl FnOnce(Word, Flags) -> AluResult,
    ) -> Result<(), ExecuteError> {
        let r = self.reg_operand(instr, 0)?;
        let result = op(self.cpu.register(r)?, self.cpu.flags());
        self.cpu.set_register(r, result.value)?;
        self.cpu.set_flags(result.flags);
        Ok(())
    }

    fn register_pair(
        &mut self,
        instr: &Instruction,
        op: impl FnOnce(Word, Word) -> AluResult,
    ) -> Result<(), ExecuteError> {
        let src = self.cpu.register(self.reg_operand(instr, 0)?)?;
        let dst = self.cpu.register(self.reg_operand(instr, 1)?)?;
        self.write_result(instr, op(src, dst))
    }

    fn memory_arith(
        &mut self,
        instr: &Instruction,
        op: impl FnOnce(Word, Word) -> AluResult,
    ) -> Result<(), ExecuteError> {
        let src = self.read_source(instr)?;
        let dst = self.cpu.register(self.reg_operand(instr, 1)?)?;
        self.write_result(instr, op(src, dst))
    }

    fn shift(&mut self, instr: &Instruction, kind: Shift) -> Result<(), ExecuteError> {
        let count = match instr.operands.get(1) {
            Some(Operand::Immediate(n)) => (*n).min(2) as u8,
            _ => 1,
        };
        let carry = self.cpu.flags().c;
        self.update_register(instr, |v, _| alu::shift(kind, v, count, carry))
    }

    /// MVO: register to its operand word, an absolute address, or through
    /// a pointer.
    fn store(&mut self, instr: &Instruction) -> Result<(), ExecuteError> {
        let value = self.cpu.register(self.reg_operand(instr, 0)?)?;
        match (instr.mode, self.operand(instr, 1)?) {
            (AddressingMode::Immediate | AddressingMode::Direct, Operand::Address(a)) => {
                self.memory.write(a, value)?;
            }
            (AddressingMode::Indirect, Operand::Register(ptr)) => {
                self.write_indirect(ptr as usize, value, false)?;
            }
            _ => return Err(ExecuteError::unimplemented(instr)),
        }
        Ok(())
    }

    fn branch(&mut self, instr: &Instruction) -> Result<Flow, ExecuteError> {
        let target = self.address_operand(instr, 0)?;
        if branch_condition(instr.opcode, self.cpu.flags()) {
            self.cpu.set_pc(target);
            Ok(Flow::Taken)
        } else {
            self.cpu.set_pc(instr.next_address());
            Ok(Flow::NotTaken)
        }
    }

    fn apply_interrupt_mode(&mut self, opcode: Opcode) {
        match opcode {
            Opcode::Je | Opcode::Jsre => self.cpu.set_interrupts_enabled(true),
            Opcode::Jd | Opcode::Jsrd => self.cpu.set_interrupts_enabled(false),
            _ => {}
        }
    }
}

/// Whether a branch opcode's condition holds under `flags`.
pub fn branch_condition(opcode: Opcode, flags: Flags) -> bool {
    let Flags { c, ov, z, s } = flags;
    match opcode {
        Opcode::B => true,
        Opcode::Bc => c,
        Opcode::Bov => ov,
        Opcode::Bpl => !s,
        Opcode::Beq => z,
        Opcode::Blt => s ^ ov,
        Opcode::Ble => z || (s ^ ov),
        Opcode::Busc => s ^ c,
        Opcode::Bnc => !c,
        Opcode::Bnov => !ov,
        Opcode::Bmi => s,
        Opcode::Bneq => !z,
        Opcode::Bge => !(s ^ ov),
        Opcode::Bgt => !(z || (s ^ ov)),
        Opcode::Besc => !(s ^ c),
        _ => false,
    }
}

/// Errors that can occur while executing an instruction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecuteError {
    #[error("unimplemented instruction: {opcode} in {mode:?} mode")]
    Unimplemented { opcode: Opcode, mode: AddressingMode },

    #[error("{opcode}: missing operand {index}")]
    MissingOperand { opcode: Opcode, index: usize },

    #[error("{opcode}: operand {index} must be a {expected}")]
    OperandKind {
        opcode: Opcode,
        index: usize,
        expected: &'static str,
    },

    #[error("cpu error: {0}")]
    Cpu(#[from] CpuError),

    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),
}

impl ExecuteError {
    fn unimplemented(instr: &Instruction) -> Self {
        ExecuteError::Unimplemented {
            opcode: instr.opcode,
            mode: instr.mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::decode::Decoder;

    struct Rig {
        cpu: Cpu,
        mem: Memory,
    }

    impl Rig {
        fn new() -> Self {
            let mut cpu = Cpu::new();
            cpu.set_pc(0x5000);
            Self { cpu, mem: Memory::new() }
        }

        fn exec(&mut self, instr: &Instruction) -> Result<u32, ExecuteError> {
            Executor::new(&mut self.cpu, &mut self.mem).execute(instr)
        }

        fn reg(&self, r: usize) -> Word {
            self.cpu.register(r).unwrap()
        }
    }

    fn at(opcode: Opcode, mode: AddressingMode, operands: Vec<Operand>) -> Instruction {
        Instruction::new(0x5000, opcode, mode, operands)
    }

    fn regs(src: u8, dst: u8) -> Vec<Operand> {
        vec![Operand::Register(src), Operand::Register(dst)]
    }

    #[test]
    fn test_addr_wraps_to_zero() {
        let mut rig = Rig::new();
        rig.cpu.set_register(0, 0xFFFF).unwrap();
        rig.cpu.set_register(1, 0x0001).unwrap();

        let cycles = rig.exec(&at(Opcode::Addr, AddressingMode::Register, regs(1, 0))).unwrap();

        assert_eq!(rig.reg(0), 0x0000);
        assert_eq!(rig.cpu.flags(), Flags { c: true, ov: false, z: true, s: false });
        assert_eq!(cycles, 6);
        assert_eq!(rig.cpu.pc(), 0x5001);
    }

    #[test]
    fn test_addr_signed_overflow() {
        let mut rig = Rig::new();
        rig.cpu.set_register(0, 0x7FFF).unwrap();
        rig.cpu.set_register(1, 0x0001).unwrap();

        rig.exec(&at(Opcode::Addr, AddressingMode::Register, regs(1, 0))).unwrap();

        assert_eq!(rig.reg(0), 0x8000);
        assert_eq!(rig.cpu.flags(), Flags { c: false, ov: true, z: false, s: true });
    }

    #[test]
    fn test_movr_updates_zs_only() {
        let mut rig = Rig::new();
        rig.cpu.set_flags(FlagUpdate::all(Flags { c: true, ov: true, z: true, s: false }));
        rig.cpu.set_register(3, 0x8000).unwrap();

        rig.exec(&at(Opcode::Movr, AddressingMode::Register, regs(3, 2))).unwrap();

        assert_eq!(rig.reg(2), 0x8000);
        assert_eq!(rig.cpu.flags(), Flags { c: true, ov: true, z: false, s: true });
    }

    #[test]
    fn test_movr_to_pc_redirects() {
        let mut rig = Rig::new();
        rig.cpu.set_register(5, 0x6000).unwrap();
        rig.exec(&at(Opcode::Movr, AddressingMode::Register, regs(5, 7))).unwrap();
        assert_eq!(rig.cpu.pc(), 0x6000);
    }

    #[test]
    fn test_subr_and_cmpr() {
        let mut rig = Rig::new();
        rig.cpu.set_register(0, 5).unwrap();
        rig.cpu.set_register(1, 3).unwrap();

        rig.exec(&at(Opcode::Cmpr, AddressingMode::Register, regs(0, 1))).unwrap();
        assert_eq!(rig.reg(1), 3);
        assert!(rig.cpu.flags().c);
        assert!(rig.cpu.flags().s);

        rig.exec(&at(Opcode::Subr, AddressingMode::Register, regs(0, 1))).unwrap();
        assert_eq!(rig.reg(1), 0xFFFE);
    }

    #[test]
    fn test_register_unary() {
        let mut rig = Rig::new();
        rig.cpu.set_register(0, 0xFFFF).unwrap();
        rig.exec(&at(Opcode::Incr, AddressingMode::Register, vec![Operand::Register(0)])).unwrap();
        assert_eq!(rig.reg(0), 0);
        assert!(rig.cpu.flags().z);
        assert!(rig.cpu.flags().c);

        rig.cpu.set_register(1, 1).unwrap();
        rig.exec(&at(Opcode::Negr, AddressingMode::Register, vec![Operand::Register(1)])).unwrap();
        assert_eq!(rig.reg(1), 0xFFFF);

        rig.exec(&at(Opcode::Comr, AddressingMode::Register, vec![Operand::Register(1)])).unwrap();
        assert_eq!(rig.reg(1), 0);
        assert!(rig.cpu.flags().z);

        rig.cpu.set_flags(FlagUpdate::default().with_c(true));
        rig.exec(&at(Opcode::Adcr, AddressingMode::Register, vec![Operand::Register(1)])).unwrap();
        assert_eq!(rig.reg(1), 1);
    }

    #[test]
    fn test_clrr_and_tstr() {
        let mut rig = Rig::new();
        rig.cpu.set_flags(FlagUpdate::all(Flags { c: true, ov: true, z: false, s: true }));
        rig.cpu.set_register(2, 0x1234).unwrap();

        rig.exec(&at(Opcode::Clrr, AddressingMode::Register, vec![Operand::Register(2)])).unwrap();
        assert_eq!(rig.reg(2), 0);
        assert!(rig.cpu.flags().z);
        assert!(!rig.cpu.flags().s);
        assert!(rig.cpu.flags().c);

        rig.cpu.set_register(3, 0x8000).unwrap();
        rig.exec(&at(Opcode::Tstr, AddressingMode::Register, vec![Operand::Register(3)])).unwrap();
        assert_eq!(rig.reg(3), 0x8000);
        assert_eq!(rig.cpu.flags(), Flags { c: false, ov: false, z: false, s: true });
    }

    #[test]
    fn test_gswd_rswd() {
        let mut rig = Rig::new();
        rig.cpu.set_flags(FlagUpdate::all(Flags { c: true, ov: false, z: true, s: false }));
        rig.exec(&at(Opcode::Gswd, AddressingMode::Register, vec![Operand::Register(0)])).unwrap();
        assert_eq!(rig.reg(0), 0x5050);

        rig.cpu.set_register(1, 0x00A0).unwrap();
        rig.exec(&at(Opcode::Rswd, AddressingMode::Register, vec![Operand::Register(1)])).unwrap();
        assert_eq!(rig.cpu.flags(), Flags { c: false, ov: true, z: false, s: true });
    }

    #[test]
    fn test_shift_clears_overflow() {
        let mut rig = Rig::new();
        rig.cpu.set_flags(FlagUpdate::default().with_ov(true));
        rig.cpu.set_register(1, 0x8001).unwrap();

        rig.exec(&at(Opcode::Sll, AddressingMode::Register, vec![Operand::Register(1)])).unwrap();

        assert_eq!(rig.reg(1), 0x0002);
        assert!(rig.cpu.flags().c);
        assert!(!rig.cpu.flags().ov);
    }

    #[test]
    fn test_double_shift_costs_more() {
        let mut rig = Rig::new();
        rig.cpu.set_register(0, 0x0001).unwrap();
        let instr = at(
            Opcode::Sll,
            AddressingMode::Register,
            vec![Operand::Register(0), Operand::Immediate(2)],
        );
        assert_eq!(rig.exec(&instr).unwrap(), 8);
        assert_eq!(rig.reg(0), 0x0004);
    }

    #[test]
    fn test_swap_keeps_overflow() {
        let mut rig = Rig::new();
        rig.cpu.set_flags(FlagUpdate::default().with_ov(true).with_c(true));
        rig.cpu.set_register(0, 0x1234).unwrap();
        rig.exec(&at(Opcode::Swap, AddressingMode::Register, vec![Operand::Register(0)])).unwrap();
        assert_eq!(rig.reg(0), 0x3412);
        assert!(rig.cpu.flags().ov);
        assert!(!rig.cpu.flags().c);
    }

    #[test]
    fn test_branch_taken_and_not_taken() {
        let beq = at(Opcode::Beq, AddressingMode::Direct, vec![Operand::Address(0x5100)]);

        let mut rig = Rig::new();
        rig.cpu.set_flags(FlagUpdate::zs(true, false));
        assert_eq!(rig.exec(&beq).unwrap(), 7);
        assert_eq!(rig.cpu.pc(), 0x5100);

        let mut rig = Rig::new();
        assert_eq!(rig.exec(&beq).unwrap(), 6);
        assert_eq!(rig.cpu.pc(), 0x5002);
    }

    #[test]
    fn test_busc_costs() {
        let busc = at(Opcode::Busc, AddressingMode::Direct, vec![Operand::Address(0x5100)]);

        let mut rig = Rig::new();
        rig.cpu.set_flags(FlagUpdate::default().with_c(true));
        assert_eq!(rig.exec(&busc).unwrap(), 9);
        assert_eq!(rig.cpu.pc(), 0x5100);

        let mut rig = Rig::new();
        assert_eq!(rig.exec(&busc).unwrap(), 7);
        assert_eq!(rig.cpu.pc(), 0x5002);
    }

    #[test]
    fn test_branch_to_self_does_not_advance() {
        let mut rig = Rig::new();
        let b = at(Opcode::B, AddressingMode::Direct, vec![Operand::Address(0x5000)]);
        rig.exec(&b).unwrap();
        assert_eq!(rig.cpu.pc(), 0x5000);
    }

    #[test]
    fn test_signed_branch_conditions() {
        let lt = Flags { c: false, ov: false, z: false, s: true };
        assert!(branch_condition(Opcode::Blt, lt));
        assert!(branch_condition(Opcode::Ble, lt));
        assert!(!branch_condition(Opcode::Bge, lt));
        assert!(!branch_condition(Opcode::Bgt, lt));

        let overflowed = Flags { c: false, ov: true, z: false, s: true };
        assert!(branch_condition(Opcode::Bge, overflowed));
        assert!(branch_condition(Opcode::Bgt, overflowed));
        assert!(!branch_condition(Opcode::Nopp, overflowed));
    }

    #[test]
    fn test_jsr_links_and_sets_interrupts() {
        let mut rig = Rig::new();
        let jsre = Instruction::new(
            0x5000,
            Opcode::Jsre,
            AddressingMode::Direct,
            vec![Operand::Register(5), Operand::Address(0x7000)],
        );

        assert_eq!(rig.exec(&jsre).unwrap(), 12);
        assert_eq!(rig.reg(5), 0x5001);
        assert_eq!(rig.cpu.pc(), 0x7000);
        assert!(rig.cpu.interrupts_enabled());
    }

    #[test]
    fn test_jr_returns() {
        let mut rig = Rig::new();
        rig.cpu.set_register(5, 0x5001).unwrap();
        rig.exec(&at(Opcode::Jr, AddressingMode::Register, vec![Operand::Register(5)])).unwrap();
        assert_eq!(rig.cpu.pc(), 0x5001);
    }

    #[test]
    fn test_push_and_pull() {
        let mut rig = Rig::new();
        rig.cpu.set_register(SP, 0x02F0).unwrap();
        rig.cpu.set_register(1, 0xABCD).unwrap();

        let cycles = rig
            .exec(&at(Opcode::Pshr, AddressingMode::Stack, vec![Operand::Register(1)]))
            .unwrap();
        assert_eq!(cycles, 11);
        assert_eq!(rig.reg(SP), 0x02F1);
        assert_eq!(rig.mem.read(0x02F1).unwrap(), 0xABCD);

        rig.exec(&at(Opcode::Pulr, AddressingMode::Stack, vec![Operand::Register(2)])).unwrap();
        assert_eq!(rig.reg(2), 0xABCD);
        assert_eq!(rig.reg(SP), 0x02F0);
    }

    #[test]
    fn test_mvi_at_wraps_pointer() {
        let mut rig = Rig::new();
        rig.mem.write(0xFFFF, 0x5678).unwrap();
        rig.cpu.set_register(4, 0xFFFF).unwrap();

        let cycles = rig.exec(&at(Opcode::MviAt, AddressingMode::Indirect, regs(4, 1))).unwrap();

        assert_eq!(rig.reg(1), 0x5678);
        assert_eq!(rig.reg(4), 0x0000);
        assert_eq!(cycles, 8);
    }

    #[test]
    fn test_mvo_at_stores_and_increments() {
        let mut rig = Rig::new();
        rig.cpu.set_flags(FlagUpdate::default().with_c(true).with_ov(true));
        rig.cpu.set_register(4, 0x0200).unwrap();
        rig.cpu.set_register(1, 0x1234).unwrap();

        let cycles = rig.exec(&at(Opcode::MvoAt, AddressingMode::Indirect, regs(1, 4))).unwrap();

        assert_eq!(rig.mem.read(0x0200).unwrap(), 0x1234);
        assert_eq!(rig.reg(4), 0x0201);
        assert_eq!(cycles, 9);
        assert!(rig.cpu.flags().c);
        assert!(rig.cpu.flags().ov);
    }

    #[test]
    fn test_indirect_add_pointer_rules() {
        let mut rig = Rig::new();
        rig.mem.load(0x0300, &[10, 20]).unwrap();
        rig.cpu.set_register(1, 0x0300).unwrap();
        rig.cpu.set_register(5, 0x0300).unwrap();

        rig.exec(&at(Opcode::Add, AddressingMode::Indirect, regs(1, 0))).unwrap();
        assert_eq!(rig.reg(0), 10);
        assert_eq!(rig.reg(1), 0x0300);

        rig.exec(&at(Opcode::Add, AddressingMode::Indirect, regs(5, 0))).unwrap();
        assert_eq!(rig.reg(0), 20);
        assert_eq!(rig.reg(5), 0x0301);
    }

    #[test]
    fn test_jsr_link_is_word_after_opcode() {
        let mut rig = Rig::new();
        let jsr = Instruction::new(
            0x5000,
            Opcode::Jsr,
            AddressingMode::Direct,
            vec![Operand::Register(5), Operand::Address(0x7000)],
        );
        rig.exec(&jsr).unwrap();
        assert_eq!(rig.reg(5), 0x5001);
        assert_eq!(rig.cpu.pc(), 0x7000);
        assert!(!rig.cpu.interrupts_enabled());

        rig.cpu.set_pc(0xFFFF);
        let wrapping = Instruction::new(
            0xFFFF,
            Opcode::Jsr,
            AddressingMode::Direct,
            vec![Operand::Register(4), Operand::Address(0x7000)],
        );
        rig.exec(&wrapping).unwrap();
        assert_eq!(rig.reg(4), 0x0000);
    }

    #[test]
    fn test_indirect_add_through_stack_pointer_pulls() {
        let mut rig = Rig::new();
        rig.cpu.set_register(SP, 0x02F1).unwrap();
        rig.mem.write(0x02F1, 7).unwrap();

        let cycles = rig.exec(&at(Opcode::Add, AddressingMode::Indirect, regs(6, 0))).unwrap();
        assert_eq!(rig.reg(0), 7);
        assert_eq!(rig.reg(SP), 0x02F0);
        assert_eq!(cycles, 11);
    }

    #[test]
    fn test_mvi_at_through_stack_pointer_increments() {
        let mut rig = Rig::new();
        rig.cpu.set_register(SP, 0xFFFF).unwrap();
        rig.mem.write(0xFFFF, 0x5678).unwrap();

        let cycles = rig.exec(&at(Opcode::MviAt, AddressingMode::Indirect, regs(6, 1))).unwrap();
        assert_eq!(rig.reg(1), 0x5678);
        assert_eq!(rig.reg(SP), 0x0000);
        assert_eq!(cycles, 11);
    }

    #[test]
    fn test_mvo_at_through_stack_pointer_increments() {
        let mut rig = Rig::new();
        rig.cpu.set_register(SP, 0xFFFF).unwrap();
        rig.cpu.set_register(2, 0x00AA).unwrap();

        rig.exec(&at(Opcode::MvoAt, AddressingMode::Indirect, regs(2, 6))).unwrap();
        assert_eq!(rig.mem.read(0xFFFF).unwrap(), 0x00AA);
        assert_eq!(rig.reg(SP), 0x0000);
        assert_eq!(rig.mem.read(0x0000).unwrap(), 0);
    }

    #[test]
    fn test_mvo_direct_and_immediate() {
        let mut rig = Rig::new();
        rig.cpu.set_register(3, 0x00FF).unwrap();
        let direct = at(
            Opcode::Mvo,
            AddressingMode::Direct,
            vec![Operand::Register(3), Operand::Address(0x0200)],
        );
        assert_eq!(rig.exec(&direct).unwrap(), 11);
        assert_eq!(rig.mem.read(0x0200).unwrap(), 0x00FF);

        let mut rig = Rig::new();
        rig.cpu.set_register(2, 0x4242).unwrap();
        let mvoi = at(
            Opcode::Mvo,
            AddressingMode::Immediate,
            vec![Operand::Register(2), Operand::Address(0x5001)],
        );
        assert_eq!(rig.exec(&mvoi).unwrap(), 9);
        assert_eq!(rig.mem.read(0x5001).unwrap(), 0x4242);
        assert_eq!(rig.cpu.pc(), 0x5002);
    }

    #[test]
    fn test_cmp_direct_leaves_register() {
        let mut rig = Rig::new();
        rig.mem.write(0x0100, 5).unwrap();
        rig.cpu.set_register(2, 5).unwrap();
        let cmp = at(
            Opcode::Cmp,
            AddressingMode::Direct,
            vec![Operand::Address(0x0100), Operand::Register(2)],
        );
        assert_eq!(rig.exec(&cmp).unwrap(), 10);
        assert_eq!(rig.reg(2), 5);
        assert!(rig.cpu.flags().z);
    }

    #[test]
    fn test_sdbd_is_one_shot() {
        let mut rig = Rig::new();
        rig.mem.load(0x5000, &[0x001, 0x2B8, 0x34, 0x12, 0x0C8]).unwrap();
        let decoder = Decoder::new();

        for _ in 0..3 {
            let pc = rig.cpu.pc();
            let sdbd = rig.cpu.sdbd();
            let instr = decoder.decode(&rig.mem, pc, sdbd).unwrap();
            rig.exec(&instr).unwrap();
            if instr.opcode == Opcode::Sdbd {
                assert!(rig.cpu.sdbd());
            } else {
                assert!(!rig.cpu.sdbd());
            }
        }

        assert_eq!(rig.reg(0), 0x1234);
        assert_eq!(rig.cpu.pc(), 0x5005);
        assert_eq!(rig.cpu.cycles(), 4 + 10 + 6);
    }

    #[test]
    fn test_wrong_operand_shape() {
        let mut rig = Rig::new();
        let bad = at(Opcode::Incr, AddressingMode::Register, vec![Operand::Immediate(1)]);
        assert!(matches!(rig.exec(&bad), Err(ExecuteError::OperandKind { .. })));

        let missing = at(Opcode::Movr, AddressingMode::Register, vec![Operand::Register(0)]);
        assert!(matches!(rig.exec(&missing), Err(ExecuteError::MissingOperand { index: 1, .. })));
        assert_eq!(rig.cpu.pc(), 0x5000);
    }

    #[test]
    fn test_mvi_in_register_mode_is_unimplemented() {
        let mut rig = Rig::new();
        let bad = at(Opcode::Mvi, AddressingMode::Register, regs(0, 1));
        assert_eq!(
            rig.exec(&bad),
            Err(ExecuteError::Unimplemented { opcode: Opcode::Mvi, mode: AddressingMode::Register })
        );
    }

    #[test]
    fn test_invalid_register_operand() {
        let mut rig = Rig::new();
        let bad = at(Opcode::Incr, AddressingMode::Register, vec![Operand::Register(9)]);
        assert_eq!(rig.exec(&bad), Err(ExecuteError::Cpu(CpuError::InvalidRegister(9))));
    }

    #[test]
    fn test_trace_sink_sees_every_instruction() {
        let mut cpu = Cpu::new();
        cpu.set_pc(0x5000);
        let mut mem = Memory::new();
        let mut seen = Vec::new();
        let mut sink = |event: &TraceEvent<'_>| seen.push((event.pc_before, event.pc_after, event.cycles));

        let hlt = at(Opcode::Hlt, AddressingMode::Implied, Vec::new());
        Executor::new(&mut cpu, &mut mem).with_trace(&mut sink).execute(&hlt).unwrap();

        assert_eq!(seen, vec![(0x5000, 0x5001, 4)]);
        assert!(cpu.is_halted());
    }
}
