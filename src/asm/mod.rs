//! Two-pass assembler: pass 1 assigns the location counter and builds the
//! working symbol table, pass 2 resolves addressing and emits the listing
//! and the object program. The symbol table is published only when both
//! passes succeed.

mod line;
mod object;
mod pass1;
mod pass2;

use std::path::Path;

use miette::{IntoDiagnostic, Result};

use crate::error;
use crate::opcode::OpcodeTable;
use crate::symtab::{AsmError, SymbolTable};

/// Result of a successful assembly. Files are written by the caller, so a
/// failing pass never leaves partial output behind.
#[derive(Debug)]
pub struct Assembly {
    pub name: String,
    pub start: u32,
    pub length: u32,
    pub listing: String,
    pub object: String,
}

pub fn assemble(
    src: &str,
    opcodes: &OpcodeTable,
    symtab: &mut SymbolTable,
) -> Result<Assembly, AsmError> {
    symtab.new_table();
    let p1 = pass1::run(src, opcodes, symtab).map_err(|e| {
        symtab.new_table();
        e
    })?;
    let (listing, object) = pass2::run(&p1, symtab).map_err(|e| {
        symtab.new_table();
        e
    })?;
    symtab.save();
    Ok(Assembly {
        name: p1.name,
        start: p1.start,
        length: p1.length,
        listing,
        object,
    })
}

/// Assemble `path` and write the `.lst` and `.obj` files next to it.
pub fn assemble_file(
    path: &Path,
    opcodes: &OpcodeTable,
    symtab: &mut SymbolTable,
) -> Result<Assembly> {
    if path.extension().and_then(|e| e.to_str()) != Some("asm") {
        return Err(error::asm_not_asm_file(path));
    }
    let src = std::fs::read_to_string(path).map_err(|_| error::asm_missing_file(path))?;

    let assembly = assemble(&src, opcodes, symtab)
        .map_err(|e| error::assemble_report(&e, &path.display().to_string(), &src))?;

    std::fs::write(path.with_extension("lst"), &assembly.listing).into_diagnostic()?;
    std::fs::write(path.with_extension("obj"), &assembly.object).into_diagnostic()?;
    Ok(assembly)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::opcode::DEFAULT_TABLE;
    use crate::symtab::AsmErrorKind;

    fn try_assemble(src: &str) -> Result<Assembly, AsmError> {
        let opcodes = OpcodeTable::parse(DEFAULT_TABLE).unwrap();
        let mut symtab = SymbolTable::new();
        assemble(src, &opcodes, &mut symtab)
    }

    fn object_lines(src: &str) -> Vec<String> {
        try_assemble(src)
            .unwrap()
            .object
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn minimal_program() {
        let lines = object_lines("COPY START 1000\n LDA #5\n RSUB\n END COPY\n");
        assert_eq!(
            lines,
            vec![
                "HCOPY  001000000006",
                "T001000060100054F0000",
                "E001000",
            ]
        );
    }

    #[test]
    fn pc_relative_forward_and_back() {
        let asm = try_assemble(
            "PROG  START 0\n\
             FIRST LDA   TAIL\n\
             TAIL  J     FIRST\n\
                   END   FIRST\n",
        )
        .unwrap();
        let lines: Vec<&str> = asm.object.lines().collect();
        // LDA: disp = 3 - 3 = 0; J: disp = 0 - 6 = -6 (FFA)
        assert_eq!(lines[1], "T000000060320003F2FFA");
    }

    #[test]
    fn pc_relative_boundary_fails_without_base() {
        let err = try_assemble(
            "PROG  START 0\n\
             FIRST LDA   FAR\n\
                   RESB  2048\n\
             FAR   WORD  1\n\
                   END   FIRST\n",
        )
        .unwrap_err();
        assert_eq!(err.kind, AsmErrorKind::InvalidOperand);
        assert_eq!(err.token, "FAR");
    }

    #[test]
    fn base_relative_covers_the_gap() {
        // FAR sits 2048 bytes past the LDA; PC-relative cannot reach it but
        // a base equal to the target gives displacement zero.
        let asm = try_assemble(
            "PROG  START 0\n\
                   BASE  FAR\n\
             FIRST LDA   FAR\n\
                   RESB  2048\n\
             FAR   WORD  1\n\
                   END   FIRST\n",
        )
        .unwrap();
        let lines: Vec<&str> = asm.object.lines().collect();
        assert_eq!(lines[1], "T00000003034000");
    }

    #[test]
    fn extended_emits_modification_record() {
        let asm = try_assemble(
            "PROG  START 0\n\
             FIRST +JSUB SUB\n\
                   RSUB\n\
             SUB   RSUB\n\
                   END   FIRST\n",
        )
        .unwrap();
        let lines: Vec<&str> = asm.object.lines().collect();
        assert_eq!(lines[0], "HPROG  00000000000A");
        assert_eq!(lines[1], "T0000000A4B1000074F00004F0000");
        assert_eq!(lines[2], "M00000105");
        assert_eq!(lines[3], "E000000");
    }

    #[test]
    fn indirect_and_indexed_operands() {
        let asm = try_assemble(
            "PROG  START 0\n\
             FIRST LDA   @PTR\n\
                   STCH  BUF,X\n\
             PTR   WORD  0\n\
             BUF   RESB  1\n\
                   END   FIRST\n",
        )
        .unwrap();
        let lines: Vec<&str> = asm.object.lines().collect();
        // LDA @PTR: byte0 = 00|10 = 02, disp = 6-3 = 003
        // STCH BUF,X: byte0 = 54|11 = 57, x=1 p=1, disp = 9-6 = 003
        assert_eq!(lines[1], "T0000000902200357A003000000");
    }

    #[test]
    fn immediate_symbol_uses_pc_relative() {
        let asm = try_assemble(
            "PROG  START 0\n\
             FIRST LDB   #LEN\n\
             LEN   WORD  4096\n\
                   END   FIRST\n",
        )
        .unwrap();
        let lines: Vec<&str> = asm.object.lines().collect();
        // LDB #LEN: n=0,i=1, disp = 3-3 = 0 with p=1
        assert_eq!(lines[1], "T00000006692000001000");
    }

    #[test]
    fn resw_breaks_text_records() {
        let asm = try_assemble(
            "PROG  START 0\n\
             A1    LDA   #1\n\
             GAP   RESW  10\n\
             A2    LDA   #2\n\
                   END   A1\n",
        )
        .unwrap();
        let lines: Vec<&str> = asm.object.lines().collect();
        assert_eq!(lines[1], "T00000003010001");
        assert_eq!(lines[2], "T00002103010002");
    }

    #[test]
    fn byte_literals() {
        let asm = try_assemble(
            "PROG  START 0\n\
             EOF   BYTE  C'EOF'\n\
             HEX   BYTE  X'F1'\n\
                   RSUB\n\
                   END   EOF\n",
        )
        .unwrap();
        let lines: Vec<&str> = asm.object.lines().collect();
        assert_eq!(lines[1], "T00000007454F46F14F0000");
    }

    #[test]
    fn format_two_registers() {
        let asm = try_assemble(
            "PROG  START 0\n\
                   CLEAR X\n\
                   COMPR A,S\n\
                   SHIFTL T,4\n\
                   RSUB\n\
                   END\n",
        )
        .unwrap();
        let lines: Vec<&str> = asm.object.lines().collect();
        assert_eq!(lines[1], "T00000009B410A004A4544F0000");
    }

    #[test]
    fn listing_has_locctr_and_object_columns() {
        let asm = try_assemble(
            "COPY  START 1000\n\
             . comment line\n\
             FIRST LDA   #5\n\
                   BASE  FIRST\n\
                   RSUB\n\
                   END   COPY\n",
        )
        .unwrap();
        let lines: Vec<&str> = asm.listing.lines().collect();
        assert_eq!(lines[0], "  5 1000 COPY   START  1000");
        assert_eq!(lines[1], " 10 . comment line");
        assert!(lines[2].starts_with(" 15 1000 FIRST  LDA    #5"));
        assert!(lines[2].ends_with("010005"));
        // BASE shows no locctr
        assert!(lines[3].starts_with(" 20      "));
        assert!(lines[4].ends_with("4F0000"));
        assert!(lines[5].starts_with(" 30      "));
    }

    #[test]
    fn end_operand_must_resolve() {
        let err = try_assemble("PROG START 0\n RSUB\n END NOWHERE\n").unwrap_err();
        assert_eq!(err.kind, AsmErrorKind::InvalidOperand);
        assert_eq!(err.token, "NOWHERE");
    }

    #[test]
    fn failure_keeps_saved_table() {
        let opcodes = OpcodeTable::parse(DEFAULT_TABLE).unwrap();
        let mut symtab = SymbolTable::new();
        assemble("GOOD START 0\n RSUB\n END\n", &opcodes, &mut symtab).unwrap();
        assert!(assemble("BAD START 0\n NOPE\n END\n", &opcodes, &mut symtab).is_err());
        assert_eq!(symtab.show(), "GOOD\t0000\n");
    }

    #[test]
    fn word_is_masked_to_24_bits() {
        let asm = try_assemble("P START 0\nW WORD -1\n RSUB\n END\n").unwrap();
        let lines: Vec<&str> = asm.object.lines().collect();
        assert_eq!(lines[1], "T00000006FFFFFF4F0000");
    }
}
