use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;
use miette::{miette, Result};

use sicsim::breakpoint::Breakpoints;
use sicsim::estab::ExternalSymbolTable;
use sicsim::loader::{self, ObjectFile};
use sicsim::memspace::{MemSpace, ADDRESS_MAX};
use sicsim::runtime::Runtime;
use sicsim::symtab::SymbolTable;
use sicsim::{asm, OpcodeTable, Shell};

/// sicsim is an educational SIC/XE toolchain: a two-pass assembler, a
/// linking loader and an instruction-level simulator behind one shell.
#[derive(Parser)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Opcode table file to use instead of the built-in one
    #[arg(long)]
    opcodes: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Assemble a `.asm` source into `.obj` and `.lst` files
    Assemble {
        /// `.asm` file to assemble
        name: PathBuf,
    },
    /// Link, load and run up to three object files
    Run {
        /// `.obj` files in load order
        #[arg(num_args = 1..=3)]
        files: Vec<PathBuf>,

        /// Load address in hex
        #[arg(long, default_value = "0")]
        progaddr: String,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    let opcodes = OpcodeTable::load(args.opcodes.as_deref())?;

    match args.command {
        None => Shell::new(opcodes).repl(),
        Some(Command::Assemble { name }) => {
            println!(
                "{:>12} target {}",
                "Assembling".green().bold(),
                name.display()
            );
            let mut symtab = SymbolTable::new();
            let assembly = asm::assemble_file(&name, &opcodes, &mut symtab)?;
            println!(
                "{:>12} {:04X} bytes of object code",
                "Finished".green().bold(),
                assembly.length
            );
            Ok(())
        }
        Some(Command::Run { files, progaddr }) => {
            let progaddr = u32::from_str_radix(&progaddr, 16)
                .ok()
                .filter(|&a| a <= ADDRESS_MAX)
                .ok_or_else(|| miette!("'{progaddr}' is not a valid load address"))?;
            let files = files
                .iter()
                .map(|path| ObjectFile::read(path))
                .collect::<Result<Vec<_>>>()?;

            let mut mem = MemSpace::new();
            let mut estab = ExternalSymbolTable::new();
            let summary = loader::load(&files, progaddr, &mut mem, &mut estab)?;

            let mut runtime = Runtime::new();
            runtime.prepare(summary.start, summary.end);
            println!(
                "{:>12} at {:05X}",
                "Running".green().bold(),
                summary.start
            );
            runtime.run(&mut mem, &opcodes, &Breakpoints::new())?;
            print!("{}", runtime.show_registers());
            println!("{:>12}", "Finished".green().bold());
            Ok(())
        }
    }
}
