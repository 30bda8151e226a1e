use crate::opcode::InstrFormat;
use crate::symtab::{AsmError, AsmErrorKind, SymbolTable};

use super::line::{Directive, Tok, DECIMAL_RE};
use super::object::{ListingWriter, ObjectWriter};
use super::pass1::{Pass1, StmtOp, TraceKind, TraceStmt};

/// Displacement range for PC-relative addressing (12-bit two's complement).
const PC_REL_MIN: i64 = -2048;
const PC_REL_MAX: i64 = 2047;
/// Displacement range for base-relative addressing (12-bit unsigned).
const BASE_REL_MAX: i64 = 4095;

/// Encoded object code for one instruction, plus the address of a format-4
/// field that needs a modification record.
struct Encoded {
    hex: String,
    modification: Option<u32>,
}

pub fn run(p1: &Pass1, symtab: &SymbolTable) -> Result<(String, String), AsmError> {
    let mut writer = ObjectWriter::new();
    let mut listing = ListingWriter::new();
    let mut base: Option<u32> = None;
    let mut end_address = p1.start;

    writer.header(&p1.name, p1.start, p1.length);

    for line in &p1.lines {
        let ts = match &line.kind {
            TraceKind::Blank | TraceKind::Comment => {
                listing.raw(line.number, line.text);
                continue;
            }
            TraceKind::Stmt(ts) => ts,
        };
        let number = line.number;

        match ts.op {
            StmtOp::Dir(Directive::Start) => {
                listing.stmt(number, Some(ts.locctr), &ts.stmt, "");
            }
            StmtOp::Dir(Directive::End) => {
                if let Some(&operand) = ts.stmt.operands.first() {
                    end_address = symtab
                        .lookup(operand.text)
                        .ok_or_else(|| invalid_operand(number, operand))?;
                }
                listing.stmt(number, None, &ts.stmt, "");
            }
            StmtOp::Dir(Directive::Byte) => {
                let hex = byte_object(ts.stmt.operands[0], number)?;
                writer.append(ts.locctr, &hex);
                listing.stmt(number, Some(ts.locctr), &ts.stmt, &hex);
            }
            StmtOp::Dir(Directive::Word) => {
                let operand = ts.stmt.operands[0];
                let value = operand
                    .text
                    .parse::<i64>()
                    .ok()
                    .ok_or_else(|| invalid_operand(number, operand))?;
                let hex = format!("{:06X}", value as u32 & 0xFF_FFFF);
                writer.append(ts.locctr, &hex);
                listing.stmt(number, Some(ts.locctr), &ts.stmt, &hex);
            }
            StmtOp::Dir(Directive::Resb) | StmtOp::Dir(Directive::Resw) => {
                writer.flush();
                listing.stmt(number, Some(ts.locctr), &ts.stmt, "");
            }
            StmtOp::Dir(Directive::Base) => {
                let operand = ts.stmt.operands[0];
                base = Some(
                    symtab
                        .lookup(operand.text)
                        .ok_or_else(|| invalid_operand(number, operand))?,
                );
                listing.stmt(number, None, &ts.stmt, "");
            }
            StmtOp::Dir(Directive::Nobase) => {
                base = None;
                listing.stmt(number, None, &ts.stmt, "");
            }
            StmtOp::Instr { opcode, format } => {
                let encoded = match format {
                    InstrFormat::One => Encoded {
                        hex: format!("{opcode:02X}"),
                        modification: None,
                    },
                    InstrFormat::Two => encode_fmt2(ts, number, opcode, symtab)?,
                    InstrFormat::ThreeFour => encode_fmt34(ts, number, opcode, base, symtab)?,
                };
                if let Some(address) = encoded.modification {
                    writer.add_modification(address);
                }
                writer.append(ts.locctr, &encoded.hex);
                listing.stmt(number, Some(ts.locctr), &ts.stmt, &encoded.hex);
            }
        }
    }

    Ok((listing.finish(), writer.finish(end_address)))
}

fn encode_fmt2(
    ts: &TraceStmt,
    number: u32,
    opcode: u8,
    symtab: &SymbolTable,
) -> Result<Encoded, AsmError> {
    let r1 = register_number(ts.stmt.operands[0], number, symtab)?;
    let r2 = match ts.stmt.operands.get(1) {
        Some(&operand) => register_number(operand, number, symtab)?,
        None => 0,
    };
    Ok(Encoded {
        hex: format!("{opcode:02X}{r1:X}{r2:X}"),
        modification: None,
    })
}

/// Register operands resolve through the symbol table, where register names
/// are pseudo-symbols; SHIFTL/SVC counts parse as plain decimal.
fn register_number(operand: Tok, number: u32, symtab: &SymbolTable) -> Result<u32, AsmError> {
    symtab
        .lookup(operand.text)
        .or_else(|| operand.text.parse::<u32>().ok())
        .filter(|&r| r <= 0xF)
        .ok_or_else(|| invalid_operand(number, operand))
}

fn encode_fmt34(
    ts: &TraceStmt,
    number: u32,
    opcode: u8,
    base: Option<u32>,
    symtab: &SymbolTable,
) -> Result<Encoded, AsmError> {
    let extended = ts.stmt.extended;

    // RSUB carries no operand: simple addressing, zero displacement.
    if ts.stmt.operands.is_empty() {
        let byte0 = opcode | 0b11;
        let hex = if extended {
            format!("{byte0:02X}1{:05X}", 0)
        } else {
            format!("{byte0:02X}{:04X}", 0)
        };
        return Ok(Encoded {
            hex,
            modification: None,
        });
    }

    let operand = ts.stmt.operands[0];
    let x = match ts.stmt.operands.get(1) {
        None => 0u32,
        Some(index) if index.text == "X" => 1,
        Some(&other) => return Err(invalid_operand(number, other)),
    };

    let (n, i, value_text) = match operand.text.as_bytes().first() {
        Some(b'#') => (0u32, 1u32, &operand.text[1..]),
        Some(b'@') => (1, 0, &operand.text[1..]),
        _ => (1, 1, operand.text),
    };
    if value_text.is_empty() {
        return Err(invalid_operand(number, operand));
    }

    let byte0 = opcode as u32 | n << 1 | i;

    // A numeric immediate is absolute: no relocation, no displacement base.
    if n == 0 && i == 1 && DECIMAL_RE.is_match(value_text) {
        let value = value_text
            .parse::<u32>()
            .ok()
            .ok_or_else(|| invalid_operand(number, operand))?;
        if extended {
            if value > 0xF_FFFF {
                return Err(invalid_operand(number, operand));
            }
            let byte1 = x << 7 | 1 << 4 | value >> 16;
            return Ok(Encoded {
                hex: format!("{byte0:02X}{byte1:02X}{:04X}", value & 0xFFFF),
                modification: None,
            });
        }
        if value > 0xFFF {
            return Err(invalid_operand(number, operand));
        }
        let byte1 = x << 7 | value >> 8;
        return Ok(Encoded {
            hex: format!("{byte0:02X}{byte1:02X}{:02X}", value & 0xFF),
            modification: None,
        });
    }

    let target = symtab
        .lookup(value_text)
        .ok_or_else(|| invalid_operand(number, operand))?;

    if extended {
        let byte1 = x << 7 | 1 << 4 | target >> 16;
        return Ok(Encoded {
            hex: format!("{byte0:02X}{byte1:02X}{:04X}", target & 0xFFFF),
            modification: Some(ts.locctr + 1),
        });
    }

    // PC-relative first, base-relative as the fallback.
    let pc = ts.locctr + ts.length;
    let disp = target as i64 - pc as i64;
    let (b, p, disp) = if (PC_REL_MIN..=PC_REL_MAX).contains(&disp) {
        (0u32, 1u32, disp as u32 & 0xFFF)
    } else if let Some(base) = base {
        let disp = target as i64 - base as i64;
        if !(0..=BASE_REL_MAX).contains(&disp) {
            return Err(invalid_operand(number, operand));
        }
        (1, 0, disp as u32)
    } else {
        return Err(invalid_operand(number, operand));
    };

    let byte1 = x << 7 | b << 6 | p << 5 | disp >> 8;
    Ok(Encoded {
        hex: format!("{byte0:02X}{byte1:02X}{:02X}", disp & 0xFF),
        modification: None,
    })
}

fn byte_object(operand: Tok, number: u32) -> Result<String, AsmError> {
    let text = operand.text;
    if let Some(inner) = text.strip_prefix("C'").and_then(|t| t.strip_suffix('\'')) {
        return Ok(inner.bytes().map(|b| format!("{b:02X}")).collect());
    }
    if let Some(inner) = text.strip_prefix("X'").and_then(|t| t.strip_suffix('\'')) {
        let mut hex = inner.to_string();
        if hex.len() % 2 != 0 {
            hex.insert(0, '0');
        }
        return Ok(hex);
    }
    Err(invalid_operand(number, operand))
}

fn invalid_operand(number: u32, operand: Tok) -> AsmError {
    AsmError::new(
        AsmErrorKind::InvalidOperand,
        number,
        operand.text,
        operand.span,
    )
}
