use std::path::Path;

use fxhash::FxHashMap;
use miette::Result;

use crate::error;

/// Table shipped with the simulator; `--opcodes` substitutes a file in the
/// same format.
pub const DEFAULT_TABLE: &str = include_str!("../opcode.txt");

/// Instruction format declared for a mnemonic. Formats 3 and 4 share an
/// opcode; the `+` prefix on a mnemonic selects format 4.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum InstrFormat {
    One,
    Two,
    ThreeFour,
}

impl InstrFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstrFormat::One => "1",
            InstrFormat::Two => "2",
            InstrFormat::ThreeFour => "3/4",
        }
    }
}

#[derive(Clone, Debug)]
pub struct OpcodeEntry {
    pub mnemonic: String,
    pub opcode: u8,
    pub format: InstrFormat,
}

impl OpcodeEntry {
    /// Number of operands the assembler expects, `(min, max)`. The optional
    /// `,X` index of format 3/4 counts as a second operand here; pass 2
    /// validates that it is exactly `X`.
    pub fn arity(&self) -> (usize, usize) {
        match self.format {
            InstrFormat::One => (0, 0),
            InstrFormat::Two => match self.mnemonic.as_str() {
                "CLEAR" | "TIXR" | "SVC" => (1, 1),
                _ => (2, 2),
            },
            InstrFormat::ThreeFour => match self.mnemonic.as_str() {
                "RSUB" => (0, 0),
                _ => (1, 2),
            },
        }
    }
}

/// Read-only dictionary mapping mnemonics to opcode bytes and formats, with
/// a reverse table keyed by opcode byte for the run engine.
pub struct OpcodeTable {
    entries: Vec<OpcodeEntry>,
    by_mnemonic: FxHashMap<String, usize>,
    by_opcode: FxHashMap<u8, usize>,
}

impl OpcodeTable {
    /// Load the dictionary from `path`, or the embedded default table.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .map_err(|_| error::opcode_table_missing(path))?;
                Self::parse(&text)
            }
            None => Self::parse(DEFAULT_TABLE),
        }
    }

    /// Parse `<hex-opcode> <MNEMONIC> <formats>` lines, formats being digits
    /// joined by `/`.
    pub fn parse(text: &str) -> Result<Self> {
        let mut table = OpcodeTable {
            entries: Vec::new(),
            by_mnemonic: FxHashMap::default(),
            by_opcode: FxHashMap::default(),
        };

        for (idx, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut fields = line.split_whitespace();
            let (Some(opcode), Some(mnemonic), Some(formats)) =
                (fields.next(), fields.next(), fields.next())
            else {
                return Err(error::opcode_table_malformed(idx + 1, line));
            };
            let opcode = u8::from_str_radix(opcode, 16)
                .map_err(|_| error::opcode_table_malformed(idx + 1, line))?;
            if opcode & 0x03 != 0 {
                // The low two bits carry the n/i addressing flags.
                return Err(error::opcode_table_malformed(idx + 1, line));
            }
            let format = match formats {
                "1" => InstrFormat::One,
                "2" => InstrFormat::Two,
                "3/4" => InstrFormat::ThreeFour,
                _ => return Err(error::opcode_table_malformed(idx + 1, line)),
            };
            table.push(OpcodeEntry {
                mnemonic: mnemonic.to_string(),
                opcode,
                format,
            });
        }

        Ok(table)
    }

    fn push(&mut self, entry: OpcodeEntry) {
        let idx = self.entries.len();
        self.by_mnemonic.insert(entry.mnemonic.clone(), idx);
        self.by_opcode.insert(entry.opcode, idx);
        self.entries.push(entry);
    }

    /// Case-sensitive lookup; mnemonics are upper case only.
    pub fn get(&self, mnemonic: &str) -> Option<&OpcodeEntry> {
        self.by_mnemonic.get(mnemonic).map(|&idx| &self.entries[idx])
    }

    pub fn format_of(&self, mnemonic: &str) -> Option<InstrFormat> {
        self.get(mnemonic).map(|e| e.format)
    }

    pub fn opcode_of(&self, mnemonic: &str) -> Option<u8> {
        self.get(mnemonic).map(|e| e.opcode)
    }

    /// Reverse lookup for the run engine. Masks the addressing bits itself.
    pub fn decode(&self, byte: u8) -> Option<&OpcodeEntry> {
        self.by_opcode.get(&(byte & 0xFC)).map(|&idx| &self.entries[idx])
    }

    /// True for a bare or `+`-prefixed mnemonic known to the table. Used by
    /// the assembler to tell labels from mnemonics.
    pub fn is_mnemonic(&self, token: &str) -> bool {
        let bare = token.strip_prefix('+').unwrap_or(token);
        self.by_mnemonic.contains_key(bare)
    }

    /// Entries in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &OpcodeEntry> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn table() -> OpcodeTable {
        OpcodeTable::parse(DEFAULT_TABLE).unwrap()
    }

    #[test]
    fn lookup_formats() {
        let t = table();
        assert_eq!(t.format_of("LDA"), Some(InstrFormat::ThreeFour));
        assert_eq!(t.format_of("COMPR"), Some(InstrFormat::Two));
        assert_eq!(t.format_of("FIX"), Some(InstrFormat::One));
        assert_eq!(t.format_of("NOTANOP"), None);
    }

    #[test]
    fn lookup_opcodes() {
        let t = table();
        assert_eq!(t.opcode_of("LDA"), Some(0x00));
        assert_eq!(t.opcode_of("RSUB"), Some(0x4C));
        assert_eq!(t.opcode_of("JSUB"), Some(0x48));
    }

    #[test]
    fn decode_masks_addressing_bits() {
        let t = table();
        // LDA with n=i=1
        assert_eq!(t.decode(0x03).map(|e| e.mnemonic.as_str()), Some("LDA"));
        assert_eq!(t.decode(0x4F).map(|e| e.mnemonic.as_str()), Some("RSUB"));
    }

    #[test]
    fn extended_prefix_is_a_mnemonic() {
        let t = table();
        assert!(t.is_mnemonic("+LDA"));
        assert!(t.is_mnemonic("TIXR"));
        assert!(!t.is_mnemonic("+NOPE"));
    }

    #[test]
    fn arity_by_mnemonic() {
        let t = table();
        assert_eq!(t.get("CLEAR").unwrap().arity(), (1, 1));
        assert_eq!(t.get("RMO").unwrap().arity(), (2, 2));
        assert_eq!(t.get("RSUB").unwrap().arity(), (0, 0));
        assert_eq!(t.get("LDA").unwrap().arity(), (1, 2));
    }

    #[test]
    fn rejects_odd_opcode_byte() {
        assert!(OpcodeTable::parse("4D RSUB 3/4").is_err());
        assert!(OpcodeTable::parse("4C RSUB 5").is_err());
        assert!(OpcodeTable::parse("garbage").is_err());
    }
}
