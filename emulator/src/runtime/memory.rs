use std::ops::Range;

use thiserror::Error;

use crate::constants::{Address, Word, MEMORY_SIZE};

/// Represents errors related to memory manipulations
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MemoryError {
    /// The given address is past the end of the memory
    #[error("address {0:#04x} is out of range")]
    OutOfRange(Address),

    /// A program image does not fit in memory
    #[error("program of {len} bytes does not fit in memory at address {start:#04x}")]
    ProgramTooLarge { start: Address, len: usize },
}

/// Holds the memory cells of the computer.
///
/// It has 256 byte-wide cells, all zero on startup.
#[derive(Clone, PartialEq, Eq)]
pub struct Memory {
    inner: [Word; MEMORY_SIZE as usize],
}

impl Default for Memory {
    fn default() -> Self {
        Self {
            inner: [0; MEMORY_SIZE as usize],
        }
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Memory([...])")
    }
}

impl Memory {
    /// Get the word at an address
    ///
    /// # Errors
    ///
    /// It fails if the address is out of bounds.
    pub fn get(&self, address: Address) -> Result<Word, MemoryError> {
        self.inner
            .get(usize::from(address))
            .copied()
            .ok_or(MemoryError::OutOfRange(address))
    }

    /// Set the word at an address
    ///
    /// # Errors
    ///
    /// It fails if the address is out of bounds.
    pub fn set(&mut self, address: Address, value: Word) -> Result<(), MemoryError> {
        let cell = self
            .inner
            .get_mut(usize::from(address))
            .ok_or(MemoryError::OutOfRange(address))?;
        *cell = value;
        Ok(())
    }

    /// Copy a byte image in memory, starting at `start`
    ///
    /// # Errors
    ///
    /// It fails without touching the memory if the image goes past the end.
    pub fn load(&mut self, start: Address, bytes: &[Word]) -> Result<(), MemoryError> {
        let begin = usize::from(start);
        let end = begin
            .checked_add(bytes.len())
            .filter(|&end| end <= self.inner.len())
            .ok_or(MemoryError::ProgramTooLarge {
                start,
                len: bytes.len(),
            })?;

        self.inner[begin..end].copy_from_slice(bytes);
        Ok(())
    }

    /// Raw view over the whole memory
    #[must_use]
    pub fn as_slice(&self) -> &[Word] {
        &self.inner
    }

    /// Hexdump of a range of cells, 16 per line, each line labelled with its first address.
    ///
    /// The range is clamped to the end of memory.
    #[must_use]
    pub fn dump(&self, range: Range<Address>) -> Dump<'_> {
        let end = range.end.min(MEMORY_SIZE);
        let start = range.start.min(end);
        Dump {
            start,
            cells: &self.inner[usize::from(start)..usize::from(end)],
        }
    }
}

/// A hexdump of part of the memory, see [`Memory::dump`]
pub struct Dump<'a> {
    start: Address,
    cells: &'a [Word],
}

impl std::fmt::Display for Dump<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (address, chunk) in (self.start..).step_by(16).zip(self.cells.chunks(16)) {
            write!(f, "{address:02x}:")?;
            for word in chunk {
                write!(f, " {word:02x}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Hexdump of the whole memory
impl std::fmt::Display for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.dump(0..MEMORY_SIZE).fmt(f)
    }
}
