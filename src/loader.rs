//! Two-pass linking loader. Pass 1 lays control sections out contiguously
//! from the program address and collects exported symbols; pass 2 loads
//! text records into memory and applies modification records through the
//! per-section reference vector.

use std::ops::Range;
use std::path::Path;

use miette::Result;

use crate::error;
use crate::estab::ExternalSymbolTable;
use crate::memspace::{MemSpace, ModSign};

/// Reference vectors index at most two decimal digits.
const REFERENCE_SLOTS: usize = 100;

/// One object program, read into memory up front so both passes can walk it.
pub struct ObjectFile {
    pub name: String,
    pub text: String,
}

impl ObjectFile {
    pub fn read(path: &Path) -> Result<Self> {
        let text =
            std::fs::read_to_string(path).map_err(|_| error::loader_missing_file(path))?;
        Ok(ObjectFile {
            name: path.display().to_string(),
            text,
        })
    }
}

/// The program extent handed to the run engine after a successful load.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct LoadSummary {
    pub start: u32,
    pub end: u32,
}

pub fn load(
    files: &[ObjectFile],
    progaddr: u32,
    mem: &mut MemSpace,
    estab: &mut ExternalSymbolTable,
) -> Result<LoadSummary> {
    if files.is_empty() || files.len() > 3 {
        return Err(error::loader_file_count(files.len()));
    }
    estab.initialize();
    let end = pass1(files, progaddr, estab)?;
    pass2(files, progaddr, mem, estab)?;
    Ok(LoadSummary {
        start: progaddr,
        end,
    })
}

fn pass1(files: &[ObjectFile], progaddr: u32, estab: &mut ExternalSymbolTable) -> Result<u32> {
    let mut address = progaddr;
    for file in files {
        let mut lines = file.text.lines().map(str::trim_end);
        let header = lines
            .find(|l| l.starts_with('H'))
            .ok_or_else(|| error::loader_missing_header(&file.name))?;
        let (name, length) = parse_header(&file.name, header)?;
        estab.insert_section(&name, address, length);

        for line in lines {
            match line.bytes().next() {
                Some(b'D') => {
                    let mut offset = 1;
                    while offset < line.len() {
                        let symbol = field(&file.name, line, offset..offset + 6)?.trim_end();
                        let relative = hex(&file.name, line, offset + 6..offset + 12)?;
                        estab.insert_symbol(&name, symbol, address + relative)?;
                        offset += 12;
                    }
                }
                Some(b'E') => break,
                _ => {}
            }
        }
        address += length;
    }
    Ok(address)
}

fn pass2(
    files: &[ObjectFile],
    progaddr: u32,
    mem: &mut MemSpace,
    estab: &ExternalSymbolTable,
) -> Result<()> {
    let mut address = progaddr;
    for file in files {
        let mut lines = file.text.lines().map(str::trim_end);
        let header = lines
            .find(|l| l.starts_with('H'))
            .ok_or_else(|| error::loader_missing_header(&file.name))?;
        let (name, length) = parse_header(&file.name, header)?;

        // Slot 1 of the reference vector is the section itself.
        let mut references: Vec<Option<u32>> = vec![None; REFERENCE_SLOTS];
        references[1] = Some(
            estab
                .address_of(&name)
                .ok_or_else(|| error::loader_unknown_section(&name))?,
        );

        for line in lines {
            match line.bytes().next() {
                Some(b'R') => refer_record(&file.name, line, estab, &mut references)?,
                Some(b'T') => {
                    let at = hex(&file.name, line, 1..7)?;
                    let count = hex(&file.name, line, 7..9)? as usize;
                    let data = field(&file.name, line, 9..9 + count * 2)?;
                    let bytes = decode_bytes(&file.name, line, data)?;
                    mem.write(address + at, &bytes)
                        .map_err(|_| error::loader_write_failed(&file.name, address + at))?;
                }
                Some(b'M') => {
                    let at = hex(&file.name, line, 1..7)?;
                    let half_bytes = hex(&file.name, line, 7..9)?;
                    let (sign, value) = modification_operand(&file.name, line, &references)?;
                    mem.modify(address + at, half_bytes, sign, value)
                        .map_err(|_| error::loader_write_failed(&file.name, address + at))?;
                }
                Some(b'E') => break,
                // 'D' records and comment lines.
                _ => {}
            }
        }
        address += length;
    }
    Ok(())
}

/// Refer records are fixed 8-character units terminated by the end of the
/// line; the trailing symbol may arrive short of its 6-character field.
fn refer_record(
    file: &str,
    line: &str,
    estab: &ExternalSymbolTable,
    references: &mut [Option<u32>],
) -> Result<()> {
    let mut offset = 1;
    while offset < line.len() {
        let index = field(file, line, offset..offset + 2)?
            .parse::<usize>()
            .map_err(|_| error::loader_malformed_record(file, line))?;
        if index >= references.len() {
            return Err(error::loader_malformed_record(file, line));
        }
        let name_end = (offset + 8).min(line.len());
        let symbol = line[offset + 2..name_end].trim_end();
        if symbol.is_empty() {
            return Err(error::loader_malformed_record(file, line));
        }
        references[index] = Some(
            estab
                .address_of(symbol)
                .ok_or_else(|| error::loader_unresolved_symbol(file, symbol))?,
        );
        offset += 8;
    }
    Ok(())
}

/// Full modification records carry a sign and a reference number. The
/// assembler's own format-4 records omit both, meaning "relocate by this
/// section's load address" — reference 1 with a plus sign.
fn modification_operand(
    file: &str,
    line: &str,
    references: &[Option<u32>],
) -> Result<(ModSign, u32)> {
    let (sign, reference) = if line.len() == 9 {
        (ModSign::Add, 1)
    } else {
        let sign = field(file, line, 9..10)?
            .chars()
            .next()
            .and_then(|c| ModSign::try_from(c).ok())
            .ok_or_else(|| error::loader_malformed_record(file, line))?;
        let reference = field(file, line, 10..12)?
            .parse::<usize>()
            .map_err(|_| error::loader_malformed_record(file, line))?;
        (sign, reference)
    };
    let value = references
        .get(reference)
        .copied()
        .flatten()
        .ok_or_else(|| error::loader_unresolved_reference(file, reference))?;
    Ok((sign, value))
}

fn parse_header(file: &str, line: &str) -> Result<(String, u32)> {
    let name = field(file, line, 1..7)?.trim_end().to_string();
    let length = hex(file, line, 13..19)?;
    Ok((name, length))
}

fn field<'a>(file: &str, line: &'a str, range: Range<usize>) -> Result<&'a str> {
    line.get(range)
        .ok_or_else(|| error::loader_malformed_record(file, line))
}

fn hex(file: &str, line: &str, range: Range<usize>) -> Result<u32> {
    u32::from_str_radix(field(file, line, range)?, 16)
        .map_err(|_| error::loader_malformed_record(file, line))
}

fn decode_bytes(file: &str, line: &str, data: &str) -> Result<Vec<u8>> {
    (0..data.len() / 2)
        .map(|k| {
            u8::from_str_radix(&data[k * 2..k * 2 + 2], 16)
                .map_err(|_| error::loader_malformed_record(file, line))
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    fn obj(name: &str, text: &str) -> ObjectFile {
        ObjectFile {
            name: name.to_string(),
            text: text.to_string(),
        }
    }

    fn proga() -> ObjectFile {
        obj(
            "proga.obj",
            "HPROGA 000000000007\n\
             R02PROGB\n\
             T000000070100054B100000\n\
             M00000405+02\n\
             E000000\n",
        )
    }

    fn progb() -> ObjectFile {
        obj(
            "progb.obj",
            "HPROGB 000000000003\n\
             T000000034F0000\n\
             E000000\n",
        )
    }

    #[test]
    fn sections_are_contiguous() {
        let mut mem = MemSpace::new();
        let mut estab = ExternalSymbolTable::new();
        let summary = load(&[proga(), progb()], 0x4000, &mut mem, &mut estab).unwrap();
        assert_eq!(summary, LoadSummary { start: 0x4000, end: 0x400A });
        assert_eq!(estab.address_of("PROGA"), Some(0x4000));
        assert_eq!(estab.address_of("PROGB"), Some(0x4007));
        assert_eq!(estab.total_length(), 0x0A);
    }

    #[test]
    fn modification_resolves_external_call() {
        let mut mem = MemSpace::new();
        let mut estab = ExternalSymbolTable::new();
        load(&[proga(), progb()], 0x4000, &mut mem, &mut estab).unwrap();
        // The 20-bit address field of the +JSUB now holds PROGB's address.
        assert_eq!(mem.read(0x4004, 3).unwrap(), &[0x10, 0x40, 0x07]);
        assert_eq!(mem.word(0x4004).unwrap() & 0xF_FFFF, 0x04007);
    }

    #[test]
    fn text_bytes_land_at_offset() {
        let mut mem = MemSpace::new();
        let mut estab = ExternalSymbolTable::new();
        load(&[progb()], 0x0100, &mut mem, &mut estab).unwrap();
        assert_eq!(mem.read(0x100, 3).unwrap(), &[0x4F, 0x00, 0x00]);
    }

    #[test]
    fn define_records_export_symbols() {
        let file = obj(
            "lib.obj",
            "HLIB   000000000010\n\
             DLISTA 000040LISTB 00000C\n\
             E000000\n",
        );
        let mut mem = MemSpace::new();
        let mut estab = ExternalSymbolTable::new();
        load(&[file], 0x2000, &mut mem, &mut estab).unwrap();
        assert_eq!(estab.address_of("LISTA"), Some(0x2040));
        assert_eq!(estab.address_of("LISTB"), Some(0x200C));
    }

    #[test]
    fn assembler_modification_relocates_by_section() {
        // M record without sign/reference, as the assembler emits for its
        // own format-4 instructions.
        let file = obj(
            "self.obj",
            "HSELF  000000000004\n\
             T000000044B100003\n\
             M00000105\n\
             E000000\n",
        );
        let mut mem = MemSpace::new();
        let mut estab = ExternalSymbolTable::new();
        load(&[file], 0x5000, &mut mem, &mut estab).unwrap();
        assert_eq!(mem.word(0x5001).unwrap() & 0xF_FFFF, 0x5003);
    }

    #[test]
    fn file_count_limits() {
        let mut mem = MemSpace::new();
        let mut estab = ExternalSymbolTable::new();
        assert!(load(&[], 0, &mut mem, &mut estab).is_err());
        let four = vec![progb(), progb(), progb(), progb()];
        assert!(load(&four, 0, &mut mem, &mut estab).is_err());
    }

    #[test]
    fn unresolved_refer_symbol_is_fatal() {
        let file = obj(
            "bad.obj",
            "HBAD   000000000003\n\
             R02GHOST\n\
             T000000034F0000\n\
             E000000\n",
        );
        let mut mem = MemSpace::new();
        let mut estab = ExternalSymbolTable::new();
        assert!(load(&[file], 0, &mut mem, &mut estab).is_err());
    }

    #[test]
    fn undefined_reference_in_modification_is_fatal() {
        let file = obj(
            "bad.obj",
            "HBAD   000000000004\n\
             T000000044B100000\n\
             M00000105+03\n\
             E000000\n",
        );
        let mut mem = MemSpace::new();
        let mut estab = ExternalSymbolTable::new();
        assert!(load(&[file], 0, &mut mem, &mut estab).is_err());
    }

    #[test]
    fn malformed_text_record_is_fatal() {
        let file = obj(
            "bad.obj",
            "HBAD   000000000003\n\
             T000000034F00\n\
             E000000\n",
        );
        let mut mem = MemSpace::new();
        let mut estab = ExternalSymbolTable::new();
        assert!(load(&[file], 0, &mut mem, &mut estab).is_err());
    }

    #[test]
    fn write_past_memory_end_is_fatal() {
        let file = obj(
            "bad.obj",
            "HBAD   000000000003\n\
             T000000034F0000\n\
             E000000\n",
        );
        let mut mem = MemSpace::new();
        let mut estab = ExternalSymbolTable::new();
        assert!(load(&[file], 0xFFFFE, &mut mem, &mut estab).is_err());
    }

    #[test]
    fn junk_before_header_is_skipped() {
        let file = obj(
            "noted.obj",
            ". produced by sicsim\n\
             HNOTE  000000000003\n\
             T000000034F0000\n\
             E000000\n",
        );
        let mut mem = MemSpace::new();
        let mut estab = ExternalSymbolTable::new();
        load(&[file], 0x100, &mut mem, &mut estab).unwrap();
        assert_eq!(mem.get(0x100).unwrap(), 0x4F);
    }
}
