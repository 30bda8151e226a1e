use std::fmt;
use std::str::FromStr;

use fxhash::FxHashMap;

use crate::span::Span;

/// Register set of the machine. The numeric identifiers are fixed by the
/// architecture; note the gap at 7.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum Register {
    A = 0,
    X = 1,
    L = 2,
    B = 3,
    S = 4,
    T = 5,
    F = 6,
    Pc = 8,
    Sw = 9,
}

impl Register {
    pub const ALL: [Register; 9] = [
        Register::A,
        Register::X,
        Register::L,
        Register::B,
        Register::S,
        Register::T,
        Register::F,
        Register::Pc,
        Register::Sw,
    ];

    pub fn number(self) -> u32 {
        self as u32
    }

    pub fn name(self) -> &'static str {
        match self {
            Register::A => "A",
            Register::X => "X",
            Register::L => "L",
            Register::B => "B",
            Register::S => "S",
            Register::T => "T",
            Register::F => "F",
            Register::Pc => "PC",
            Register::Sw => "SW",
        }
    }
}

impl FromStr for Register {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A" => Ok(Register::A),
            "X" => Ok(Register::X),
            "L" => Ok(Register::L),
            "B" => Ok(Register::B),
            "S" => Ok(Register::S),
            "T" => Ok(Register::T),
            "F" => Ok(Register::F),
            "PC" => Ok(Register::Pc),
            "SW" => Ok(Register::Sw),
            _ => Err(()),
        }
    }
}

/// Errors that can occur during assembly.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AsmErrorKind {
    DuplicateSymbol,
    InvalidOpcode,
    InvalidOperand,
    RequiredOneOperand,
    RequiredTwoOperands,
    MissingEnd,
}

/// The latest assembly error, kept by the shell until the next `assemble`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct AsmError {
    pub kind: AsmErrorKind,
    pub line: u32,
    pub token: String,
    pub span: Span,
}

impl AsmError {
    pub fn new(kind: AsmErrorKind, line: u32, token: impl Into<String>, span: Span) -> Self {
        AsmError {
            kind,
            line,
            token: token.into(),
            span,
        }
    }
}

impl fmt::Display for AsmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            AsmErrorKind::DuplicateSymbol => {
                write!(f, "(line {}) symbol '{}' duplicate", self.line, self.token)
            }
            AsmErrorKind::InvalidOpcode => {
                write!(f, "(line {}) opcode '{}' is invalid", self.line, self.token)
            }
            AsmErrorKind::InvalidOperand => {
                write!(f, "(line {}) operand '{}' is invalid", self.line, self.token)
            }
            AsmErrorKind::RequiredOneOperand => write!(
                f,
                "(line {}) mnemonic '{}' requires one operand",
                self.line, self.token
            ),
            AsmErrorKind::RequiredTwoOperands => write!(
                f,
                "(line {}) mnemonic '{}' requires two operands",
                self.line, self.token
            ),
            AsmErrorKind::MissingEnd => {
                write!(f, "(line {}) source ended without END", self.line)
            }
        }
    }
}

impl std::error::Error for AsmError {}

/// Per-assembly symbol table. The *working* table belongs to the assembly in
/// progress; the *saved* table is the one from the last successful assembly
/// and is what the `symbol` command displays. Register names are reserved
/// pseudo-symbols resolving to their register numbers.
#[derive(Debug)]
pub struct SymbolTable {
    working: FxHashMap<String, u32>,
    saved: FxHashMap<String, u32>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            working: FxHashMap::default(),
            saved: FxHashMap::default(),
        }
    }

    /// Start a fresh working table for a new assembly.
    pub fn new_table(&mut self) {
        self.working.clear();
    }

    pub fn is_register(name: &str) -> bool {
        Register::from_str(name).is_ok()
    }

    /// Insert fails on a register name or a duplicate within this assembly.
    pub fn insert(&mut self, name: &str, locctr: u32) -> Result<(), ()> {
        if Self::is_register(name) || self.working.contains_key(name) {
            return Err(());
        }
        self.working.insert(name.to_string(), locctr);
        Ok(())
    }

    /// Registers shadow user symbols.
    pub fn lookup(&self, name: &str) -> Option<u32> {
        if let Ok(reg) = Register::from_str(name) {
            return Some(reg.number());
        }
        self.working.get(name).copied()
    }

    /// Publish the working table as the saved one. Called only after a fully
    /// successful assembly.
    pub fn save(&mut self) {
        self.saved = std::mem::take(&mut self.working);
    }

    pub fn saved_is_empty(&self) -> bool {
        self.saved.is_empty()
    }

    /// Saved symbols bucketed by leading character, ascending within each
    /// bucket, for a reproducible display order.
    pub fn saved_sorted(&self) -> Vec<(&str, u32)> {
        let mut symbols: Vec<(&str, u32)> = self
            .saved
            .iter()
            .map(|(name, &locctr)| (name.as_str(), locctr))
            .collect();
        symbols.sort_by_key(|&(name, _)| (name.as_bytes().first().copied(), name));
        symbols
    }

    pub fn show(&self) -> String {
        let mut out = String::new();
        for (name, locctr) in self.saved_sorted() {
            out.push_str(&format!("{name}\t{locctr:04X}\n"));
        }
        out
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}
