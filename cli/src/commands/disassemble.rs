use std::fmt::Write;
use std::process::exit;

use camino::Utf8PathBuf;
use clap::{Parser, ValueHint};
use ls8_emulator::constants::{Address, Word};
use ls8_emulator::runtime::{Encoding, Instruction, ProcessorError};
use ls8_emulator::{load_program, Computer};
use tracing::debug;

#[derive(Parser, Debug)]
pub struct DisassembleOpt {
    /// Program file, one base 2 byte per line
    #[clap(value_parser, value_hint = ValueHint::FilePath)]
    program: Utf8PathBuf,
}

/// Decode a program image, one instruction per line.
///
/// Unknown opcodes are shown as `??` and skipped using the operand count of their encoding.
fn listing(program: &[Word]) -> anyhow::Result<String> {
    let computer = Computer::with_program(program)?;
    let end = Address::try_from(program.len())?;
    let mut out = String::new();
    let mut address = 0;

    while address < end {
        let (size, text) = match Instruction::decode(&computer, address) {
            Ok(instruction) => (instruction.size(), instruction.to_string()),
            Err(ProcessorError::UnknownOpcode(byte)) => (Encoding(byte).size(), "??".to_owned()),
            Err(e) => return Err(e.into()),
        };

        let bytes = (address..(address + size).min(end))
            .map(|a| computer.read(a).map(|w| format!("{w:02x}")))
            .collect::<Result<Vec<_>, _>>()?
            .join(" ");
        writeln!(out, "{address:02x}: {bytes:<8}  {text}")?;
        address += size;
    }

    Ok(out)
}

impl DisassembleOpt {
    pub fn exec(self) -> anyhow::Result<()> {
        let program = match load_program(&self.program) {
            Ok(p) => p,
            Err(e) => {
                let report = miette::Report::new(e);
                eprintln!("{report:?}");
                exit(1);
            }
        };

        debug!(size = program.len(), "Disassembling program");
        print!("{}", listing(&program)?);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn listing_test() {
        let source = indoc::indoc! {"
            10000010 # LDI R0,8
            00000000
            00001000
            10000010 # LDI R1,9
            00000001
            00001001
            10100010 # MUL R0,R1
            00000000
            00000001
            01000111 # PRN R0
            00000000
            00000001 # HLT
        "};
        let program = ls8_emulator::parse_program(source).unwrap();

        assert_eq!(
            listing(&program).unwrap(),
            indoc::indoc! {"
                00: 82 00 08  LDI r0, 8
                03: 82 01 09  LDI r1, 9
                06: a2 00 01  MUL r0, r1
                09: 47 00     PRN r0
                0b: 01        HLT
            "}
        );
    }

    #[test]
    fn unknown_opcode_test() {
        let program = [0b0100_0101, 2, 0, 0b0100_0000, 7, 1];
        assert_eq!(
            listing(&program).unwrap(),
            indoc::indoc! {"
                00: 45 02     PSH r2
                02: 00        ??
                03: 40 07     ??
                05: 01        HLT
            "}
        );
    }
}
