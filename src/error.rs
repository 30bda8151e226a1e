use std::path::Path;

use miette::{miette, LabeledSpan, NamedSource, Report, Severity};

use crate::symtab::{AsmError, AsmErrorKind};

// Opcode table errors

pub fn opcode_table_missing(path: &Path) -> Report {
    miette!(
        severity = Severity::Error,
        code = "opcode::missing",
        help = "the table has one `<hex> <MNEMONIC> <formats>` entry per line",
        "cannot read opcode table '{}'",
        path.display(),
    )
}

pub fn opcode_table_malformed(line: usize, text: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "opcode::malformed",
        help = "entries look like `4C RSUB 3/4`; opcodes keep their low two bits zero",
        "opcode table line {line} is malformed: '{text}'",
    )
}

// Assembler errors

pub fn assemble_report(err: &AsmError, file_name: &str, src: &str) -> Report {
    let (code, help) = match err.kind {
        AsmErrorKind::DuplicateSymbol => (
            "asm::duplicate_symbol",
            "each symbol may be defined once per assembly; register names are reserved",
        ),
        AsmErrorKind::InvalidOpcode => (
            "asm::invalid_opcode",
            "mnemonics are upper case; `+` is only valid on format 3/4 instructions",
        ),
        AsmErrorKind::InvalidOperand => (
            "asm::invalid_operand",
            "check the operand form and that the target is reachable from here",
        ),
        AsmErrorKind::RequiredOneOperand => {
            ("asm::operand_count", "this mnemonic takes exactly one operand")
        }
        AsmErrorKind::RequiredTwoOperands => {
            ("asm::operand_count", "this mnemonic takes exactly two operands")
        }
        AsmErrorKind::MissingEnd => (
            "asm::missing_end",
            "every program must close with an END directive",
        ),
    };

    let labels = if err.span.is_empty() {
        vec![]
    } else {
        vec![LabeledSpan::at(err.span, "here")]
    };

    miette!(
        severity = Severity::Error,
        code = code,
        help = help,
        labels = labels,
        "{err}",
    )
    .with_source_code(NamedSource::new(file_name, src.to_string()))
}

pub fn asm_not_asm_file(path: &Path) -> Report {
    miette!(
        severity = Severity::Error,
        code = "asm::extension",
        help = "the assembler only accepts `.asm` source files",
        "'{}' is not an .asm file",
        path.display(),
    )
}

pub fn asm_missing_file(path: &Path) -> Report {
    miette!(
        severity = Severity::Error,
        code = "asm::missing_file",
        "there is no such file '{}'",
        path.display(),
    )
}

// Loader errors

pub fn loader_file_count(count: usize) -> Report {
    let detail = if count == 0 {
        "at least one object file is required"
    } else {
        "at most three object files can be loaded"
    };
    miette!(
        severity = Severity::Error,
        code = "loader::file_count",
        "{detail}",
    )
}

pub fn loader_missing_file(path: &Path) -> Report {
    miette!(
        severity = Severity::Error,
        code = "loader::missing_file",
        "there is no such file '{}'",
        path.display(),
    )
}

pub fn loader_missing_header(file: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "loader::missing_header",
        help = "every object program starts with an `H` record",
        "object file '{file}' has no header record",
    )
}

pub fn loader_malformed_record(file: &str, record: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "loader::malformed_record",
        help = "records use the fixed H/D/R/T/M/E field layout",
        "malformed record in '{file}': '{record}'",
    )
}

pub fn loader_unresolved_symbol(file: &str, symbol: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "loader::unresolved",
        help = "the symbol must be exported by a section loaded in the same invocation",
        "unresolved external symbol '{symbol}' referenced from '{file}'",
    )
}

pub fn loader_unresolved_reference(file: &str, reference: usize) -> Report {
    miette!(
        severity = Severity::Error,
        code = "loader::unresolved",
        help = "modification records may only name references declared by an R record",
        "modification record in '{file}' uses undefined reference {reference:02}",
    )
}

pub fn loader_write_failed(file: &str, address: u32) -> Report {
    miette!(
        severity = Severity::Error,
        code = "loader::out_of_range",
        "loading record from '{file}' at '{address:05X}' failed",
    )
}

pub fn loader_unknown_section(section: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "loader::unknown_section",
        "control section '{section}' does not exist",
    )
}

// Memory errors

pub fn mem_out_of_range(address: u64) -> Report {
    miette!(
        severity = Severity::Error,
        code = "mem::out_of_range",
        help = "valid addresses are 00000 to FFFFF",
        "address '{address:X}' is out of range",
    )
}

pub fn mem_bad_modify_length(half_bytes: u32) -> Report {
    miette!(
        severity = Severity::Error,
        code = "mem::modify_length",
        help = "only 5 and 6 half-byte fields are supported",
        "unsupported modification length {half_bytes}",
    )
}

pub fn mem_bad_byte(value: u32) -> Report {
    miette!(
        severity = Severity::Error,
        code = "mem::bad_byte",
        help = "byte values range from 00 to FF",
        "value '{value:X}' does not fit in a byte",
    )
}

// Run engine errors

pub fn run_no_program() -> Report {
    miette!(
        severity = Severity::Error,
        code = "run::no_program",
        help = "use `progaddr` and `loader` before `run`",
        "no program has been loaded",
    )
}

pub fn run_unknown_opcode(opcode: u8, pc: u32) -> Report {
    miette!(
        severity = Severity::Error,
        code = "run::unknown_opcode",
        "unknown opcode {opcode:02X} at address {pc:05X}",
    )
}

pub fn run_invalid_addressing(pc: u32) -> Report {
    miette!(
        severity = Severity::Error,
        code = "run::addressing",
        "invalid addressing-mode combination at address {pc:05X}",
    )
}

pub fn run_invalid_register(number: u8, pc: u32) -> Report {
    miette!(
        severity = Severity::Error,
        code = "run::register",
        "invalid register number {number} at address {pc:05X}",
    )
}

pub fn run_divide_by_zero(pc: u32) -> Report {
    miette!(
        severity = Severity::Error,
        code = "run::divide_by_zero",
        "division by zero at address {pc:05X}",
    )
}

// Breakpoint errors

pub fn bp_invalid_address(token: &str) -> Report {
    miette!(
        severity = Severity::Error,
        code = "bp::address",
        help = "breakpoints take a hex address between 0 and FFFFF, or `clear`",
        "'{token}' is not a valid breakpoint address",
    )
}
