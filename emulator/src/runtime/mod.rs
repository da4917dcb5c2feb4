use std::io::Write;

use thiserror::Error;
use tracing::{debug, info, trace};

use crate::constants::{self as C, Address, Word};

mod alu;
mod instructions;
mod memory;
mod registers;

pub use self::alu::{AluOp, UnsupportedOperation};
pub use self::instructions::{Encoding, Instruction, Opcode};
pub use self::memory::{Dump, Memory, MemoryError};
pub use self::registers::{Flags, RegisterError, Registers};

#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("operation {0} unknown")]
    UnknownOpcode(Word),

    #[error("invalid memory access: {0}")]
    Memory(#[from] MemoryError),

    #[error("invalid register access: {0}")]
    Register(#[from] RegisterError),

    #[error("could not write output: {0}")]
    Output(#[from] std::io::Error),

    #[error("computer is halted")]
    AlreadyHalted,
}

type Result<T> = std::result::Result<T, ProcessorError>;

/// The whole state of the machine.
///
/// Instructions and the ALU go through [`Computer::read`], [`Computer::write`],
/// [`Computer::register_get`] and [`Computer::register_set`] to reach memory and registers.
#[derive(Clone, Default)]
pub struct Computer {
    pub memory: Memory,
    pub registers: Registers,

    /// Address of the next opcode to fetch
    pub pc: Address,

    pub flags: Flags,
    pub halted: bool,

    /// Number of instructions executed so far
    pub cycles: usize,
}

impl std::fmt::Debug for Computer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Computer {{ pc: {:#04x}, registers: {}, flags: {:?}, halted: {}, memory: [...] }}",
            self.pc, self.registers, self.flags, self.halted
        )
    }
}

impl Computer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a computer with a program image loaded at the start of memory
    ///
    /// # Errors
    ///
    /// Fails if the program does not fit in memory.
    pub fn with_program(program: &[Word]) -> Result<Self> {
        let mut computer = Self::new();
        computer.memory.load(C::PROGRAM_START, program)?;
        computer.pc = C::PROGRAM_START;
        info!(size = program.len(), "Program loaded");
        Ok(computer)
    }

    /// Read a word in memory
    ///
    /// # Errors
    ///
    /// Fails if the address is out of range.
    pub fn read(&self, address: Address) -> Result<Word> {
        Ok(self.memory.get(address)?)
    }

    /// Write a word in memory
    ///
    /// # Errors
    ///
    /// Fails if the address is out of range.
    pub fn write(&mut self, address: Address, value: Word) -> Result<()> {
        Ok(self.memory.set(address, value)?)
    }

    /// Get the value of a register
    ///
    /// # Errors
    ///
    /// Fails if the index is out of range.
    pub fn register_get(&self, index: Word) -> Result<Word> {
        Ok(self.registers.get(index)?)
    }

    /// Set the value of a register
    ///
    /// # Errors
    ///
    /// Fails if the index is out of range.
    pub fn register_set(&mut self, index: Word, value: Word) -> Result<()> {
        Ok(self.registers.set(index, value)?)
    }

    /// Decrement the stack pointer, then write the value where it points.
    ///
    /// The stack pointer wraps around the 8-bit register width.
    #[tracing::instrument(skip(self))]
    fn push(&mut self, value: Word) -> Result<()> {
        let sp = self.register_get(C::SP)?.wrapping_sub(1);
        self.register_set(C::SP, sp)?;
        self.write(Address::from(self.register_get(C::SP)?), value)
    }

    /// Read the value at the top of the stack, then increment the stack pointer
    #[tracing::instrument(skip(self))]
    fn pop(&mut self) -> Result<Word> {
        // First read the value
        let sp = self.register_get(C::SP)?;
        let val = self.read(Address::from(sp))?;
        // Then move the SP
        self.register_set(C::SP, sp.wrapping_add(1))?;
        Ok(val)
    }

    /// Read the operand bytes following the opcode at `address`.
    ///
    /// Only the operands the encoding announces are read, the others are zero. An instruction
    /// running past the end of memory is a fault.
    fn fetch_operands(&self, address: Address, encoding: Encoding) -> Result<[Word; 2]> {
        let mut operands = [0; 2];
        for (offset, operand) in (1..).zip(operands.iter_mut()) {
            if offset > Address::from(encoding.operand_count()) {
                break;
            }

            let operand_address = address
                .checked_add(offset)
                .ok_or(MemoryError::OutOfRange(address))?;
            *operand = self.read(operand_address)?;
        }
        Ok(operands)
    }

    /// Execute one instruction: fetch, decode, dispatch, then move the program counter
    ///
    /// # Errors
    ///
    /// Fails on an unknown opcode or an invalid memory or register access. The program counter
    /// is left on the faulty instruction.
    #[tracing::instrument(skip(self, output), fields(pc = self.pc), level = "debug")]
    pub fn step(&mut self, output: &mut dyn Write) -> Result<()> {
        if self.halted {
            return Err(ProcessorError::AlreadyHalted);
        }

        let instruction = Instruction::decode(self, self.pc)?;
        debug!("Executing instruction \"{}\"", instruction);

        let [operand_a, operand_b] = instruction.operands;
        instruction
            .opcode
            .execute(self, operand_a, operand_b, output)?;

        let encoding = instruction.opcode.encoding();
        if !encoding.sets_pc() {
            self.pc += encoding.size();
        }
        self.cycles += 1;

        debug!("Register state {}", self.registers);
        Ok(())
    }

    /// Run until the computer halts
    ///
    /// # Errors
    ///
    /// Stops on the first error raised by [`Computer::step`].
    #[tracing::instrument(skip(self, output))]
    pub fn run(&mut self, output: &mut dyn Write) -> Result<()> {
        while !self.halted {
            if let Err(e) = self.step(output) {
                // Show the memory around the faulty instruction
                let start = self.pc.saturating_sub(16);
                let dump = self.memory.dump(start..start.saturating_add(48));
                trace!(pc = self.pc, "Memory at fault:\n{}", dump);
                return Err(e);
            }
        }

        info!(cycles = self.cycles, registers = %self.registers, "Computer halted");
        trace!("Memory at halt:\n{}", self.memory);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const HLT: Word = 0b0000_0001;
    const LDI: Word = 0b1000_0010;
    const PRN: Word = 0b0100_0111;
    const MUL: Word = 0b1010_0010;
    const PSH: Word = 0b0100_0101;
    const POP: Word = 0b0100_0110;

    fn run(program: &[Word]) -> (Computer, String) {
        let mut computer = Computer::with_program(program).unwrap();
        let mut output = Vec::new();
        computer.run(&mut output).unwrap();
        (computer, String::from_utf8(output).unwrap())
    }

    #[test]
    fn startup_state_test() {
        let computer = Computer::new();
        assert_eq!(computer.pc, 0);
        assert_eq!(computer.registers.sp(), C::STACK_START);
        assert_eq!(computer.flags, Flags::empty());
        assert!(!computer.halted);
        assert!(computer.memory.as_slice().iter().all(|&w| w == 0));
    }

    #[test]
    fn mult_program_test() {
        #[rustfmt::skip]
        let program = [
            LDI, 0, 8,
            LDI, 1, 9,
            MUL, 0, 1,
            PRN, 0,
            HLT,
        ];
        let (computer, output) = run(&program);
        assert_eq!(output, "72\n");
        assert_eq!(computer.cycles, 5);
        assert_eq!(computer.pc, 12);
    }

    #[test]
    fn stack_program_test() {
        #[rustfmt::skip]
        let program = [
            LDI, 0, 7,
            PSH, 0,
            LDI, 0, 0,
            POP, 1,
            PRN, 1,
            HLT,
        ];
        let (computer, output) = run(&program);
        assert_eq!(output, "7\n");
        assert_eq!(computer.register_get(0).unwrap(), 0);
        assert_eq!(computer.registers.sp(), C::STACK_START);
    }

    #[test]
    fn ldi_prn_every_register_test() {
        for reg in 0..8 {
            for value in [0, 1, 42, 127, 128, 255] {
                let (_, output) = run(&[LDI, reg, value, PRN, reg, HLT]);
                assert_eq!(output, format!("{value}\n"));
            }
        }
    }

    #[test]
    fn halt_only_test() {
        let (computer, output) = run(&[HLT]);
        assert_eq!(output, "");
        assert_eq!(computer.cycles, 1);
        assert_eq!(computer.pc, 1);
        assert_eq!(computer.registers, Registers::default());
        assert_eq!(
            computer.registers.as_slice(),
            &[0, 0, 0, 0, 0, 0, 0, 0xF4]
        );
    }

    #[test]
    fn lifo_test() {
        let values = [11, 22, 33, 44, 55];
        let mut program = Vec::new();
        for (reg, value) in (0..).zip(values) {
            program.extend([LDI, reg, value, PSH, reg]);
        }
        // Pop into distinct registers, then print them in order
        for reg in 0..5 {
            program.extend([POP, reg]);
        }
        for reg in 0..5 {
            program.extend([PRN, reg]);
        }
        program.push(HLT);

        let (computer, output) = run(&program);
        assert_eq!(output, "55\n44\n33\n22\n11\n");
        assert_eq!(computer.registers.sp(), C::STACK_START);
    }

    #[test]
    fn stack_pointer_test() {
        let mut computer = Computer::with_program(&[PSH, 0, PSH, 0, PSH, 0, HLT]).unwrap();
        let mut output = std::io::sink();
        for n in 1..=3 {
            computer.step(&mut output).unwrap();
            assert_eq!(computer.registers.sp(), C::STACK_START - n);
        }
        // Top of stack after a push is at the stack pointer
        computer.register_set(2, 99).unwrap();
        computer.push(computer.register_get(2).unwrap()).unwrap();
        assert_eq!(computer.read(Address::from(C::STACK_START - 4)).unwrap(), 99);
        assert_eq!(computer.pop().unwrap(), 99);
        assert_eq!(computer.registers.sp(), C::STACK_START - 3);
    }

    #[test]
    fn stack_pointer_wraps_test() {
        let mut computer = Computer::new();
        computer.registers.set_sp(0);
        computer.push(5).unwrap();
        assert_eq!(computer.registers.sp(), 0xFF);
        assert_eq!(computer.read(0xFF).unwrap(), 5);
        assert_eq!(computer.pop().unwrap(), 5);
        assert_eq!(computer.registers.sp(), 0);
    }

    #[test]
    fn unknown_opcode_test() {
        let mut computer = Computer::with_program(&[LDI, 0, 1, 0b0000_0000, PRN, 0, HLT]).unwrap();
        let mut output = Vec::new();
        let err = computer.run(&mut output).unwrap_err();
        assert!(matches!(err, ProcessorError::UnknownOpcode(0)));
        assert_eq!(err.to_string(), "operation 0 unknown");

        // Nothing after the bad opcode ran
        assert!(output.is_empty());
        assert_eq!(computer.pc, 3);
        assert_eq!(computer.cycles, 1);
        assert!(!computer.halted);
    }

    #[test]
    fn invalid_register_test() {
        let mut computer = Computer::with_program(&[LDI, 8, 1, HLT]).unwrap();
        let err = computer.run(&mut std::io::sink()).unwrap_err();
        assert!(matches!(
            err,
            ProcessorError::Register(RegisterError::OutOfRange(8))
        ));
        assert_eq!(computer.pc, 0);
    }

    #[test]
    fn run_off_memory_end_test() {
        // Memory is all zeroes past a program without HLT, so this stops on an unknown opcode
        let mut computer = Computer::with_program(&[LDI, 0, 1]).unwrap();
        let err = computer.run(&mut std::io::sink()).unwrap_err();
        assert!(matches!(err, ProcessorError::UnknownOpcode(0)));

        // An instruction truncated by the end of memory is a fault
        let mut computer = Computer::new();
        computer.write(0xFE, LDI).unwrap();
        computer.pc = 0xFE;
        let err = computer.step(&mut std::io::sink()).unwrap_err();
        assert!(matches!(
            err,
            ProcessorError::Memory(MemoryError::OutOfRange(0x100))
        ));

        // So is a program counter past the end
        computer.pc = C::MEMORY_SIZE;
        let err = computer.step(&mut std::io::sink()).unwrap_err();
        assert!(matches!(
            err,
            ProcessorError::Memory(MemoryError::OutOfRange(0x100))
        ));
    }

    #[test]
    fn halt_on_last_cell_test() {
        let mut computer = Computer::new();
        computer.write(0xFF, HLT).unwrap();
        computer.pc = 0xFF;
        computer.run(&mut std::io::sink()).unwrap();
        assert!(computer.halted);
        assert_eq!(computer.pc, C::MEMORY_SIZE);
    }

    #[test]
    fn step_after_halt_test() {
        let (mut computer, _) = run(&[HLT]);
        assert!(matches!(
            computer.step(&mut std::io::sink()),
            Err(ProcessorError::AlreadyHalted)
        ));
    }

    #[test]
    fn program_too_large_test() {
        let program = vec![HLT; 257];
        assert!(matches!(
            Computer::with_program(&program),
            Err(ProcessorError::Memory(MemoryError::ProgramTooLarge {
                len: 257,
                ..
            }))
        ));
    }

    #[test]
    fn sample_programs_test() {
        let samples = [
            (include_str!("../../../programs/print8.ls8"), "8\n"),
            (include_str!("../../../programs/mult.ls8"), "72\n"),
            (include_str!("../../../programs/stack.ls8"), "2\n4\n1\n"),
        ];

        for (source, expected) in samples {
            let program = crate::parse_program(source).unwrap();
            let (_, output) = run(&program);
            assert_eq!(output, expected);
        }
    }

    #[test]
    fn unused_registers_untouched_test() {
        let (computer, _) = run(&[LDI, 0, 3, LDI, 1, 4, MUL, 0, 1, HLT]);
        assert_eq!(computer.register_get(0).unwrap(), 12);
        assert_eq!(computer.register_get(C::IM).unwrap(), 0);
        assert_eq!(computer.register_get(C::IS).unwrap(), 0);
    }
}
