//! The `sicsim> ` shell. Owns every process-wide subsystem — memory, the
//! symbol tables, the opcode dictionary, breakpoints, the run engine and
//! the command log — and threads them into one handler at a time.

use std::io::{self, IsTerminal, Write as _};
use std::path::Path;

use colored::Colorize;
use miette::{miette, IntoDiagnostic, Result};

use crate::asm;
use crate::breakpoint::Breakpoints;
use crate::error;
use crate::estab::ExternalSymbolTable;
use crate::loader::{self, ObjectFile};
use crate::logger::CommandLog;
use crate::memspace::{MemSpace, ADDRESS_MAX};
use crate::opcode::OpcodeTable;
use crate::runtime::{Halt, Runtime};
use crate::symtab::{AsmError, SymbolTable};

const PROMPT: &str = "sicsim> ";

const HELP: &str = "\
h[elp]
d[ir]
q[uit]
hi[story]
du[mp] [start [, end]]
e[dit] address, value
f[ill] start, end, value
reset
opcode mnemonic
opcodelist
assemble filename
type filename
symbol
progaddr address
loader object-file [object-file [object-file]]
bp [clear | address]
run";

pub struct Shell {
    opcodes: OpcodeTable,
    mem: MemSpace,
    symtab: SymbolTable,
    estab: ExternalSymbolTable,
    breakpoints: Breakpoints,
    runtime: Runtime,
    log: CommandLog,
    progaddr: u32,
    last_asm_error: Option<AsmError>,
    quit: bool,
}

impl Shell {
    pub fn new(opcodes: OpcodeTable) -> Self {
        Shell {
            opcodes,
            mem: MemSpace::new(),
            symtab: SymbolTable::new(),
            estab: ExternalSymbolTable::new(),
            breakpoints: Breakpoints::new(),
            runtime: Runtime::new(),
            log: CommandLog::new(),
            progaddr: 0,
            last_asm_error: None,
            quit: false,
        }
    }

    pub fn repl(&mut self) -> Result<()> {
        let interactive = io::stdin().is_terminal();
        while !self.quit {
            print!("{PROMPT}");
            io::stdout().flush().into_diagnostic()?;
            let Some(line) = read_line(interactive) else {
                println!();
                break;
            };
            self.execute(&line);
        }
        Ok(())
    }

    /// Dispatch one command line. A command is logged once its handler ran;
    /// argument-validation failures and unknown commands are not logged.
    pub fn execute(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        let (cmd, args) = tokenize(line);

        let result = match cmd {
            "h" | "help" => self.cmd_help(),
            "d" | "dir" => self.cmd_dir(),
            "q" | "quit" => self.cmd_quit(),
            "hi" | "history" => self.cmd_history(),
            "du" | "dump" => self.cmd_dump(&args),
            "e" | "edit" => self.cmd_edit(&args),
            "f" | "fill" => self.cmd_fill(&args),
            "reset" => self.cmd_reset(),
            "opcode" => self.cmd_opcode(&args),
            "opcodelist" => self.cmd_opcodelist(),
            "assemble" => self.cmd_assemble(&args),
            "type" => self.cmd_type(&args),
            "symbol" => self.cmd_symbol(),
            "progaddr" => self.cmd_progaddr(&args),
            "loader" => self.cmd_loader(&args),
            "bp" => self.cmd_breakpoint(&args),
            "run" => self.cmd_run(),
            _ => {
                println!("{cmd}: command not found");
                Ok(false)
            }
        };

        match result {
            Ok(true) => self.log.record(line),
            Ok(false) => {}
            Err(report) => eprintln!("{report:?}"),
        }
    }

    /// Latest assembly error, kept until the next `assemble`.
    pub fn last_asm_error(&self) -> Option<&AsmError> {
        self.last_asm_error.as_ref()
    }

    fn cmd_help(&self) -> Result<bool> {
        println!("{HELP}");
        Ok(true)
    }

    fn cmd_dir(&self) -> Result<bool> {
        let mut names: Vec<String> = std::fs::read_dir(".")
            .into_diagnostic()?
            .filter_map(|entry| entry.ok())
            .map(|entry| {
                let mut name = entry.file_name().to_string_lossy().into_owned();
                if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                    name.push('/');
                }
                name
            })
            .collect();
        names.sort();
        for name in names {
            println!("{name}");
        }
        Ok(true)
    }

    fn cmd_quit(&mut self) -> Result<bool> {
        self.quit = true;
        Ok(false)
    }

    fn cmd_history(&self) -> Result<bool> {
        print!("{}", self.log.show());
        Ok(true)
    }

    fn cmd_dump(&mut self, args: &[&str]) -> Result<bool> {
        if args.len() > 2 {
            return Err(miette!("dump takes at most two arguments"));
        }
        let start = args.first().map(|t| parse_address(t)).transpose()?;
        let end = args.get(1).map(|t| parse_address(t)).transpose()?;
        let out = self.mem.dump(start, end)?;
        print!("{out}");
        Ok(true)
    }

    fn cmd_edit(&mut self, args: &[&str]) -> Result<bool> {
        let [address, value] = args else {
            return Err(miette!("edit requires an address and a value"));
        };
        let address = parse_address(address)?;
        let value = parse_hex(value)?;
        if value > 0xFF {
            return Err(error::mem_bad_byte(value));
        }
        self.mem.set(address, value as u8)?;
        Ok(true)
    }

    fn cmd_fill(&mut self, args: &[&str]) -> Result<bool> {
        let [start, end, value] = args else {
            return Err(miette!("fill requires a start, an end and a value"));
        };
        let start = parse_address(start)?;
        let end = parse_address(end)?;
        self.mem.fill(start, end, parse_hex(value)?)?;
        Ok(true)
    }

    fn cmd_reset(&mut self) -> Result<bool> {
        self.mem.reset();
        Ok(true)
    }

    fn cmd_opcode(&self, args: &[&str]) -> Result<bool> {
        let [mnemonic] = args else {
            return Err(miette!("opcode requires one mnemonic"));
        };
        match self.opcodes.opcode_of(mnemonic) {
            Some(opcode) => {
                println!("opcode is {opcode:02X}");
                Ok(true)
            }
            None => Err(miette!("mnemonic '{mnemonic}' does not exist")),
        }
    }

    fn cmd_opcodelist(&self) -> Result<bool> {
        for entry in self.opcodes.iter() {
            println!(
                "{:02X} {:<6} {}",
                entry.opcode,
                entry.mnemonic,
                entry.format.as_str()
            );
        }
        Ok(true)
    }

    fn cmd_assemble(&mut self, args: &[&str]) -> Result<bool> {
        let [file] = args else {
            return Err(miette!("assemble requires one .asm file"));
        };
        let path = Path::new(file);
        if path.extension().and_then(|e| e.to_str()) != Some("asm") {
            return Err(error::asm_not_asm_file(path));
        }
        let src = std::fs::read_to_string(path).map_err(|_| error::asm_missing_file(path))?;

        self.last_asm_error = None;
        match asm::assemble(&src, &self.opcodes, &mut self.symtab) {
            Ok(assembly) => {
                let lst = path.with_extension("lst");
                let obj = path.with_extension("obj");
                std::fs::write(&lst, &assembly.listing).into_diagnostic()?;
                std::fs::write(&obj, &assembly.object).into_diagnostic()?;
                println!(
                    "{:>12} {} -> {}, {}",
                    "Assembled".green().bold(),
                    file,
                    obj.display(),
                    lst.display()
                );
            }
            Err(err) => {
                let report = error::assemble_report(&err, file, &src);
                self.last_asm_error = Some(err);
                eprintln!("{report:?}");
            }
        }
        // The command ran either way, which is what the log records.
        Ok(true)
    }

    fn cmd_type(&self, args: &[&str]) -> Result<bool> {
        let [file] = args else {
            return Err(miette!("type requires one file"));
        };
        let text = std::fs::read_to_string(file)
            .map_err(|_| error::asm_missing_file(Path::new(file)))?;
        print!("{text}");
        if !text.ends_with('\n') {
            println!();
        }
        Ok(true)
    }

    fn cmd_symbol(&self) -> Result<bool> {
        print!("{}", self.symtab.show());
        Ok(true)
    }

    fn cmd_progaddr(&mut self, args: &[&str]) -> Result<bool> {
        let [address] = args else {
            return Err(miette!("progaddr requires one hex address"));
        };
        self.progaddr = parse_address(address)?;
        Ok(true)
    }

    fn cmd_loader(&mut self, args: &[&str]) -> Result<bool> {
        if args.is_empty() || args.len() > 3 {
            return Err(error::loader_file_count(args.len()));
        }
        let files = args
            .iter()
            .map(|name| ObjectFile::read(Path::new(name)))
            .collect::<Result<Vec<_>>>()?;

        match loader::load(&files, self.progaddr, &mut self.mem, &mut self.estab) {
            Ok(summary) => {
                self.runtime.prepare(summary.start, summary.end);
                print!("{}", self.estab.show());
                Ok(true)
            }
            Err(report) => {
                // Memory may be partially written; runs stay disabled until
                // a load succeeds.
                self.runtime.invalidate();
                Err(report)
            }
        }
    }

    fn cmd_breakpoint(&mut self, args: &[&str]) -> Result<bool> {
        match args {
            [] => {
                if self.breakpoints.is_empty() {
                    println!("no breakpoints set");
                } else {
                    println!("breakpoint");
                    println!("----------");
                    for address in self.breakpoints.iter() {
                        println!("{address:X}");
                    }
                }
            }
            ["clear"] => {
                self.breakpoints.clear();
                println!("breakpoints cleared");
            }
            [address] => {
                let address = u32::from_str_radix(address, 16)
                    .ok()
                    .filter(|&a| a <= ADDRESS_MAX)
                    .ok_or_else(|| error::bp_invalid_address(address))?;
                self.breakpoints.insert(address);
                println!("breakpoint {address:X} set");
            }
            _ => return Err(miette!("bp takes at most one argument")),
        }
        Ok(true)
    }

    fn cmd_run(&mut self) -> Result<bool> {
        let halt = self
            .runtime
            .run(&mut self.mem, &self.opcodes, &self.breakpoints)?;
        print!("{}", self.runtime.show_registers());
        match halt {
            Halt::Finished => println!("{}", "Program finished".cyan()),
            Halt::Breakpoint(pc) => println!("Breakpoint at {pc:X}"),
        }
        Ok(true)
    }
}

fn read_line(interactive: bool) -> Option<String> {
    if interactive {
        console::Term::stdout().read_line().ok()
    } else {
        let mut buf = String::new();
        match io::stdin().read_line(&mut buf) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(buf),
        }
    }
}

/// The command word is whitespace-delimited; arguments split on whitespace
/// and commas alike.
fn tokenize(line: &str) -> (&str, Vec<&str>) {
    let mut words = line.split_whitespace();
    let cmd = words.next().unwrap_or("");
    let args = words
        .flat_map(|w| w.split(','))
        .filter(|t| !t.is_empty())
        .collect();
    (cmd, args)
}

fn parse_hex(token: &str) -> Result<u32> {
    u32::from_str_radix(token, 16)
        .map_err(|_| miette!("'{token}' is not a hex value"))
}

fn parse_address(token: &str) -> Result<u32> {
    let value = parse_hex(token)?;
    if value > ADDRESS_MAX {
        return Err(error::mem_out_of_range(value as u64));
    }
    Ok(value)
}
