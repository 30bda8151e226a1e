use crate::memspace::ADDRESS_MAX;
use crate::opcode::{InstrFormat, OpcodeTable};
use crate::span::Span;
use crate::symtab::{AsmError, AsmErrorKind, SymbolTable};

use super::line::{self, Directive, LineBody, SourceLine, Stmt, Tok, HEX_RE, SYMBOL_RE};

/// What pass 2 needs to know about a statement beyond its tokens.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum StmtOp {
    Dir(Directive),
    Instr { opcode: u8, format: InstrFormat },
}

#[derive(Debug)]
pub struct TraceStmt<'a> {
    pub stmt: Stmt<'a>,
    pub locctr: u32,
    pub length: u32,
    pub op: StmtOp,
}

#[derive(Debug)]
pub enum TraceKind<'a> {
    Blank,
    Comment,
    Stmt(TraceStmt<'a>),
}

/// The intermediate trace consumed by pass 2, one entry per physical line
/// up to and including END.
#[derive(Debug)]
pub struct TraceLine<'a> {
    pub number: u32,
    pub text: &'a str,
    pub kind: TraceKind<'a>,
}

#[derive(Debug)]
pub struct Pass1<'a> {
    pub lines: Vec<TraceLine<'a>>,
    /// Program name from the START label, space-padded to six characters.
    pub name: String,
    pub start: u32,
    pub length: u32,
}

pub fn run<'a>(
    src: &'a str,
    opcodes: &OpcodeTable,
    symtab: &mut SymbolTable,
) -> Result<Pass1<'a>, AsmError> {
    let source_lines = line::split_lines(src, opcodes);
    let last_number = source_lines.last().map(|l| l.number).unwrap_or(5);

    let mut out = Pass1 {
        lines: Vec::with_capacity(source_lines.len()),
        name: String::new(),
        start: 0,
        length: 0,
    };
    let mut locctr = 0u32;
    let mut started = false;
    let mut ended = false;

    for source_line in source_lines {
        let SourceLine { number, text, body } = source_line;
        match body {
            LineBody::Blank => out.lines.push(TraceLine {
                number,
                text,
                kind: TraceKind::Blank,
            }),
            LineBody::Comment => out.lines.push(TraceLine {
                number,
                text,
                kind: TraceKind::Comment,
            }),
            LineBody::Stmt(stmt) => {
                if !started {
                    started = true;
                    if Directive::from_str(stmt.mnemonic.text) == Some(Directive::Start) {
                        locctr = start_directive(&stmt, number, symtab)?;
                        out.start = locctr;
                        out.name = stmt
                            .label
                            .map(|l| format!("{:<6.6}", l.text))
                            .unwrap_or_else(|| " ".repeat(6));
                        out.lines.push(TraceLine {
                            number,
                            text,
                            kind: TraceKind::Stmt(TraceStmt {
                                stmt,
                                locctr,
                                length: 0,
                                op: StmtOp::Dir(Directive::Start),
                            }),
                        });
                        continue;
                    }
                    // No START: the program begins at address zero, unnamed.
                    out.name = " ".repeat(6);
                }

                let trace = statement(stmt, number, locctr, opcodes, symtab)?;
                let is_end = trace.op == StmtOp::Dir(Directive::End);
                locctr = locctr
                    .checked_add(trace.length)
                    .filter(|&l| l <= ADDRESS_MAX + 1)
                    .ok_or_else(|| {
                        AsmError::new(
                            AsmErrorKind::InvalidOperand,
                            number,
                            trace.stmt.raw_mnemonic(),
                            trace.stmt.mnemonic.span,
                        )
                    })?;
                out.lines.push(TraceLine {
                    number,
                    text,
                    kind: TraceKind::Stmt(trace),
                });
                if is_end {
                    ended = true;
                    break;
                }
            }
        }
    }

    if !ended {
        return Err(AsmError::new(
            AsmErrorKind::MissingEnd,
            last_number,
            "",
            Span::dummy(),
        ));
    }

    out.length = locctr - out.start;
    Ok(out)
}

fn start_directive(
    stmt: &Stmt,
    number: u32,
    symtab: &mut SymbolTable,
) -> Result<u32, AsmError> {
    let operand = expect_one_operand(stmt, number)?;
    let start = u32::from_str_radix(operand.text, 16)
        .ok()
        .filter(|&s| s <= ADDRESS_MAX)
        .ok_or_else(|| invalid_operand(number, operand))?;
    if let Some(label) = stmt.label {
        insert_label(label, start, number, symtab)?;
    }
    Ok(start)
}

/// Resolve one statement's mnemonic, check its operand count, insert its
/// label, and compute its length.
fn statement<'a>(
    stmt: Stmt<'a>,
    number: u32,
    locctr: u32,
    opcodes: &OpcodeTable,
    symtab: &mut SymbolTable,
) -> Result<TraceStmt<'a>, AsmError> {
    if let Some(label) = stmt.label {
        insert_label(label, locctr, number, symtab)?;
    }

    let (length, op) = if let Some(dir) = Directive::from_str(stmt.mnemonic.text) {
        if stmt.extended {
            return Err(invalid_opcode(number, &stmt));
        }
        let length = match dir {
            // START is only valid as the first statement.
            Directive::Start => return Err(invalid_opcode(number, &stmt)),
            Directive::End => {
                if stmt.operands.len() > 1 {
                    return Err(invalid_operand(number, stmt.operands[1]));
                }
                0
            }
            Directive::Byte => byte_length(expect_one_operand(&stmt, number)?, number)?,
            Directive::Word => {
                let operand = expect_one_operand(&stmt, number)?;
                operand
                    .text
                    .parse::<i64>()
                    .ok()
                    .ok_or_else(|| invalid_operand(number, operand))?;
                3
            }
            Directive::Resb => reserve_count(expect_one_operand(&stmt, number)?, number)?,
            Directive::Resw => {
                let count = reserve_count(expect_one_operand(&stmt, number)?, number)?;
                count
                    .checked_mul(3)
                    .ok_or_else(|| invalid_operand(number, stmt.operands[0]))?
            }
            Directive::Base => {
                expect_one_operand(&stmt, number)?;
                0
            }
            Directive::Nobase => {
                if let Some(&extra) = stmt.operands.first() {
                    return Err(invalid_operand(number, extra));
                }
                0
            }
        };
        (length, StmtOp::Dir(dir))
    } else if let Some(entry) = opcodes.get(stmt.mnemonic.text) {
        let (min, max) = entry.arity();
        if stmt.operands.len() < min {
            let kind = if min == 1 {
                AsmErrorKind::RequiredOneOperand
            } else {
                AsmErrorKind::RequiredTwoOperands
            };
            return Err(AsmError::new(
                kind,
                number,
                stmt.raw_mnemonic(),
                stmt.mnemonic.span,
            ));
        }
        if stmt.operands.len() > max {
            return Err(invalid_operand(number, stmt.operands[max]));
        }
        let length = match entry.format {
            InstrFormat::One | InstrFormat::Two if stmt.extended => {
                return Err(invalid_opcode(number, &stmt))
            }
            InstrFormat::One => 1,
            InstrFormat::Two => 2,
            InstrFormat::ThreeFour if stmt.extended => 4,
            InstrFormat::ThreeFour => 3,
        };
        (
            length,
            StmtOp::Instr {
                opcode: entry.opcode,
                format: entry.format,
            },
        )
    } else {
        return Err(invalid_opcode(number, &stmt));
    };

    Ok(TraceStmt {
        stmt,
        locctr,
        length,
        op,
    })
}

fn insert_label(
    label: Tok,
    locctr: u32,
    number: u32,
    symtab: &mut SymbolTable,
) -> Result<(), AsmError> {
    if !SYMBOL_RE.is_match(label.text) {
        return Err(invalid_operand(number, label));
    }
    symtab.insert(label.text, locctr).map_err(|_| {
        AsmError::new(
            AsmErrorKind::DuplicateSymbol,
            number,
            label.text,
            label.span,
        )
    })
}

fn expect_one_operand<'a>(stmt: &Stmt<'a>, number: u32) -> Result<Tok<'a>, AsmError> {
    match stmt.operands.as_slice() {
        [operand] => Ok(*operand),
        [] => Err(AsmError::new(
            AsmErrorKind::RequiredOneOperand,
            number,
            stmt.raw_mnemonic(),
            stmt.mnemonic.span,
        )),
        [_, extra, ..] => Err(invalid_operand(number, *extra)),
    }
}

/// `BYTE C'…'` is one byte per character; `BYTE X'…'` packs two hex digits
/// per byte, rounding up.
fn byte_length(operand: Tok, number: u32) -> Result<u32, AsmError> {
    let text = operand.text;
    if let Some(inner) = text.strip_prefix("C'").and_then(|t| t.strip_suffix('\'')) {
        if inner.is_empty() {
            return Err(invalid_operand(number, operand));
        }
        return Ok(inner.len() as u32);
    }
    if let Some(inner) = text.strip_prefix("X'").and_then(|t| t.strip_suffix('\'')) {
        if !HEX_RE.is_match(inner) {
            return Err(invalid_operand(number, operand));
        }
        return Ok((inner.len() as u32 + 1) / 2);
    }
    Err(invalid_operand(number, operand))
}

fn reserve_count(operand: Tok, number: u32) -> Result<u32, AsmError> {
    operand
        .text
        .parse::<u32>()
        .ok()
        .ok_or_else(|| invalid_operand(number, operand))
}

fn invalid_operand(number: u32, operand: Tok) -> AsmError {
    AsmError::new(
        AsmErrorKind::InvalidOperand,
        number,
        operand.text,
        operand.span,
    )
}

fn invalid_opcode(number: u32, stmt: &Stmt) -> AsmError {
    AsmError::new(
        AsmErrorKind::InvalidOpcode,
        number,
        stmt.raw_mnemonic(),
        stmt.mnemonic.span,
    )
}
