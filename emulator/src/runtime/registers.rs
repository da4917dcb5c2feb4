use bitflags::bitflags;
use thiserror::Error;

use crate::constants::{Word, REGISTER_COUNT, SP, STACK_START};

bitflags! {
    /// Comparison results, laid out as `00000LGE`.
    ///
    /// Nothing reads or writes them yet, they are kept for compare and branch instructions.
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct Flags: Word {
        const EQUAL   = 0b0000_0001;
        const GREATER = 0b0000_0010;
        const LESS    = 0b0000_0100;
    }
}

impl Default for Flags {
    fn default() -> Self {
        // No comparison happened yet
        Flags::empty()
    }
}

impl std::fmt::Debug for Flags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#010b}", self.bits())
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RegisterError {
    #[error("register index {0} is out of range")]
    OutOfRange(Word),
}

/// The general purpose register file.
///
/// `r7` doubles as the stack pointer, `r5` and `r6` are reserved for interrupts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registers {
    inner: [Word; REGISTER_COUNT],
}

impl Default for Registers {
    fn default() -> Self {
        let mut inner = [0; REGISTER_COUNT];
        inner[usize::from(SP)] = STACK_START;
        Self { inner }
    }
}

impl Registers {
    /// Get the value of a register
    ///
    /// # Errors
    ///
    /// Fails if the index is not one of the 8 registers.
    pub fn get(&self, index: Word) -> Result<Word, RegisterError> {
        self.inner
            .get(usize::from(index))
            .copied()
            .ok_or(RegisterError::OutOfRange(index))
    }

    /// Set a register value
    ///
    /// # Errors
    ///
    /// Fails if the index is not one of the 8 registers.
    pub fn set(&mut self, index: Word, value: Word) -> Result<(), RegisterError> {
        let reg = self
            .inner
            .get_mut(usize::from(index))
            .ok_or(RegisterError::OutOfRange(index))?;
        *reg = value;
        Ok(())
    }

    #[must_use]
    pub fn sp(&self) -> Word {
        self.inner[usize::from(SP)]
    }

    pub fn set_sp(&mut self, value: Word) {
        self.inner[usize::from(SP)] = value;
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Word] {
        &self.inner
    }
}

impl std::fmt::Display for Registers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (index, value) in self.inner.iter().enumerate() {
            if index > 0 {
                f.write_str(" | ")?;
            }

            if index == usize::from(SP) {
                write!(f, "sp = {value:#04x}")?;
            } else {
                write!(f, "r{index} = {value}")?;
            }
        }
        Ok(())
    }
}
