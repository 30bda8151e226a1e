use std::fmt::Write as _;

use fxhash::FxHashMap;
use miette::Result;

use crate::error;

/// An independently relocatable unit of one load. Sections are laid out
/// contiguously in the order their files were given to the loader.
pub struct ControlSection {
    pub name: String,
    pub address: u32,
    pub length: u32,
    symbols: FxHashMap<String, u32>,
    /// Declaration order of the exported symbols, for display.
    order: Vec<String>,
}

impl ControlSection {
    pub fn symbol_address(&self, name: &str) -> Option<u32> {
        self.symbols.get(name).copied()
    }

    pub fn symbols(&self) -> impl Iterator<Item = (&str, u32)> {
        self.order
            .iter()
            .map(|name| (name.as_str(), self.symbols[name]))
    }
}

/// External-symbol table built by loader pass 1 and consumed by pass 2.
/// Re-initialized at each loader invocation.
pub struct ExternalSymbolTable {
    sections: Vec<ControlSection>,
}

impl ExternalSymbolTable {
    pub fn new() -> Self {
        ExternalSymbolTable { sections: Vec::new() }
    }

    pub fn initialize(&mut self) {
        self.sections.clear();
    }

    pub fn insert_section(&mut self, name: &str, address: u32, length: u32) {
        self.sections.push(ControlSection {
            name: name.to_string(),
            address,
            length,
            symbols: FxHashMap::default(),
            order: Vec::new(),
        });
    }

    /// The named section must already exist.
    pub fn insert_symbol(&mut self, section: &str, symbol: &str, address: u32) -> Result<()> {
        let section = self
            .sections
            .iter_mut()
            .find(|s| s.name == section)
            .ok_or_else(|| error::loader_unknown_section(section))?;
        if !section.symbols.contains_key(symbol) {
            section.order.push(symbol.to_string());
        }
        section.symbols.insert(symbol.to_string(), address);
        Ok(())
    }

    /// Section names take precedence over exported symbols; both are
    /// searched in declaration order.
    pub fn address_of(&self, name: &str) -> Option<u32> {
        if let Some(section) = self.sections.iter().find(|s| s.name == name) {
            return Some(section.address);
        }
        self.sections
            .iter()
            .find_map(|s| s.symbol_address(name))
    }

    pub fn sections(&self) -> &[ControlSection] {
        &self.sections
    }

    pub fn total_length(&self) -> u32 {
        self.sections.iter().map(|s| s.length).sum()
    }

    pub fn show(&self) -> String {
        let mut out = String::new();
        out.push_str("control section  symbol   address  length\n");
        out.push_str("-----------------------------------------\n");
        for section in &self.sections {
            let _ = writeln!(
                out,
                "{:<17}{:<9}{:<9X}{:04X}",
                section.name, "", section.address, section.length
            );
            for (symbol, address) in section.symbols() {
                let _ = writeln!(out, "{:<17}{:<9}{:X}", "", symbol, address);
            }
        }
        out.push_str("-----------------------------------------\n");
        let _ = writeln!(out, "{:<26}total length {:04X}", "", self.total_length());
        out
    }
}

impl Default for ExternalSymbolTable {
    fn default() -> Self {
        Self::new()
    }
}
