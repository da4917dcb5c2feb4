//! Arithmetic-logic unit
//!
//! Operations combine two registers and write the result back into the first one. Results wrap
//! around the 8-bit register width.

use parse_display::Display;
use thiserror::Error;
use tracing::debug;

use super::{Computer, ProcessorError};
use crate::constants::Word;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[display(style = "UPPERCASE")]
pub enum AluOp {
    /// `a <- a + b`
    Add,

    /// `a <- a * b`
    Mul,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unsupported ALU operation {0:?}")]
pub struct UnsupportedOperation(pub String);

impl std::str::FromStr for AluOp {
    type Err = UnsupportedOperation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADD" => Ok(AluOp::Add),
            "MUL" => Ok(AluOp::Mul),
            other => Err(UnsupportedOperation(other.to_owned())),
        }
    }
}

impl AluOp {
    #[must_use]
    pub fn compute(self, a: Word, b: Word) -> Word {
        match self {
            AluOp::Add => a.wrapping_add(b),
            AluOp::Mul => a.wrapping_mul(b),
        }
    }
}

impl Computer {
    /// Apply an ALU operation on two registers, storing the result in `reg_a`
    ///
    /// # Errors
    ///
    /// Fails if one of the register indices is out of range.
    #[tracing::instrument(skip(self), level = "debug")]
    pub fn alu(&mut self, op: AluOp, reg_a: Word, reg_b: Word) -> Result<(), ProcessorError> {
        let a = self.register_get(reg_a)?;
        let b = self.register_get(reg_b)?;
        let res = op.compute(a, b);
        debug!("{} {}, {} = {}", op, a, b, res);
        self.register_set(reg_a, res)
    }
}
