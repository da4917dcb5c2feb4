/// A memory address. Wider than a byte so that the program counter can point one past the end.
pub type Address = u16;

/// The content of a memory cell or a register
pub type Word = u8;

/// Total size of the computer memory
pub const MEMORY_SIZE: Address = 256;

/// Number of general purpose registers
pub const REGISTER_COUNT: usize = 8;

/// Initial value of the stack pointer
pub const STACK_START: Word = 0xF4;

/// Where programs get loaded and where the program counter starts
pub const PROGRAM_START: Address = 0;

/// Interrupt mask register, reserved
pub const IM: Word = 5;

/// Interrupt status register, reserved
pub const IS: Word = 6;

/// Stack pointer register
pub const SP: Word = 7;
