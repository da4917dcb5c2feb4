use std::process::exit;

use camino::Utf8PathBuf;
use clap::{Parser, ValueHint};
use ls8_emulator::{load_program, Computer};
use tracing::{debug, info};

#[derive(Parser, Debug)]
pub struct RunOpt {
    /// Program file, one base 2 byte per line
    #[clap(value_parser, value_hint = ValueHint::FilePath)]
    program: Utf8PathBuf,
}

impl RunOpt {
    pub fn exec(self) -> anyhow::Result<()> {
        let program = match load_program(&self.program) {
            Ok(p) => p,
            Err(e) => {
                let report = miette::Report::new(e);
                eprintln!("{report:?}");
                exit(1);
            }
        };

        debug!(size = program.len(), "Building computer");
        let mut computer = Computer::with_program(&program)?;

        info!("Running program");
        let stdout = std::io::stdout();
        computer.run(&mut stdout.lock())?;

        info!(cycles = computer.cycles, registers = %computer.registers, "End of program");

        Ok(())
    }
}
