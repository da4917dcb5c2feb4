use std::io::Write;

use parse_display::Display;
use tracing::debug;

use super::{alu::AluOp, Computer, ProcessorError};
use crate::constants::{Address, Word};

/// Metadata packed in the bits of an opcode byte, `AABCDDDD`.
///
/// `AA` is the number of operands following the opcode and `C` tells whether the instruction sets
/// the program counter by itself. This holds for any byte, known opcode or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Encoding(pub Word);

impl Encoding {
    #[must_use]
    pub const fn operand_count(self) -> Word {
        (self.0 >> 6) & 0b11
    }

    /// Total length of the instruction in memory, opcode included
    #[must_use]
    pub fn size(self) -> Address {
        Address::from(self.operand_count()) + 1
    }

    #[must_use]
    pub const fn sets_pc(self) -> bool {
        (self.0 >> 4) & 0b1 == 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[display(style = "UPPERCASE")]
#[repr(u8)]
pub enum Opcode {
    /// Halt the computer
    Hlt = 0b0000_0001,

    /// Load an immediate value in a register
    Ldi = 0b1000_0010,

    /// Print the decimal value of a register
    Prn = 0b0100_0111,

    /// Multiply two registers
    Mul = 0b1010_0010,

    /// Push a register on the stack
    Psh = 0b0100_0101,

    /// Pop the top of the stack into a register
    Pop = 0b0100_0110,
}

impl TryFrom<Word> for Opcode {
    type Error = ProcessorError;

    fn try_from(value: Word) -> Result<Self, Self::Error> {
        use Opcode::{Hlt, Ldi, Mul, Pop, Prn, Psh};
        let opcode = match value {
            0b0000_0001 => Hlt,
            0b1000_0010 => Ldi,
            0b0100_0111 => Prn,
            0b1010_0010 => Mul,
            0b0100_0101 => Psh,
            0b0100_0110 => Pop,
            other => return Err(ProcessorError::UnknownOpcode(other)),
        };
        Ok(opcode)
    }
}

impl From<Opcode> for Word {
    fn from(opcode: Opcode) -> Self {
        opcode as Word
    }
}

impl Opcode {
    #[must_use]
    pub const fn encoding(self) -> Encoding {
        Encoding(self as Word)
    }

    /// Execute the instruction.
    ///
    /// Operands the instruction does not use are ignored. `PRN` writes to `output`.
    ///
    /// # Errors
    ///
    /// Fails on an out of range register index or stack address, or if `output` fails.
    #[tracing::instrument(skip(self, computer, output), fields(opcode = %self), level = "debug")]
    pub fn execute(
        self,
        computer: &mut Computer,
        operand_a: Word,
        operand_b: Word,
        output: &mut dyn Write,
    ) -> Result<(), ProcessorError> {
        match self {
            Opcode::Hlt => {
                computer.halted = true;
            }

            Opcode::Ldi => {
                computer.register_set(operand_a, operand_b)?;
            }

            Opcode::Prn => {
                let val = computer.register_get(operand_a)?;
                writeln!(output, "{val}")?;
            }

            Opcode::Mul => {
                computer.alu(AluOp::Mul, operand_a, operand_b)?;
            }

            Opcode::Psh => {
                let val = computer.register_get(operand_a)?;
                debug!("push({})", val);
                computer.push(val)?;
            }

            Opcode::Pop => {
                let val = computer.pop()?;
                debug!("pop => {}", val);
                computer.register_set(operand_a, val)?;
            }
        }

        Ok(())
    }
}

/// A decoded instruction with the operands it actually uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub operands: [Word; 2],
}

impl Instruction {
    /// Decode the instruction starting at `address`
    ///
    /// # Errors
    ///
    /// Fails on an unknown opcode, or if the instruction runs past the end of memory.
    pub fn decode(computer: &Computer, address: Address) -> Result<Self, ProcessorError> {
        let byte = computer.read(address)?;
        let opcode = Opcode::try_from(byte)?;
        let operands = computer.fetch_operands(address, opcode.encoding())?;
        Ok(Self { opcode, operands })
    }

    #[must_use]
    pub fn size(&self) -> Address {
        self.opcode.encoding().size()
    }
}

/// Disassembly, like `LDI r0, 8`
impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [a, b] = self.operands;
        match self.opcode {
            Opcode::Hlt => write!(f, "{}", self.opcode),
            Opcode::Ldi => write!(f, "{} r{a}, {b}", self.opcode),
            Opcode::Mul => write!(f, "{} r{a}, r{b}", self.opcode),
            Opcode::Prn | Opcode::Psh | Opcode::Pop => write!(f, "{} r{a}", self.opcode),
        }
    }
}
