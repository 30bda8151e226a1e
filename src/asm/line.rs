use lazy_static::lazy_static;
use regex::Regex;

use crate::opcode::OpcodeTable;
use crate::span::Span;

lazy_static! {
    /// Symbol names are upper-case letters and digits, starting with a letter.
    pub static ref SYMBOL_RE: Regex = Regex::new(r"^[A-Z][A-Z0-9]*$").unwrap();
    pub static ref DECIMAL_RE: Regex = Regex::new(r"^[0-9]+$").unwrap();
    pub static ref HEX_RE: Regex = Regex::new(r"^[0-9A-F]+$").unwrap();
}

/// Assembler directives; everything else resolves through the opcode table.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Directive {
    Start,
    End,
    Byte,
    Word,
    Resb,
    Resw,
    Base,
    Nobase,
}

impl Directive {
    pub fn from_str(token: &str) -> Option<Self> {
        match token {
            "START" => Some(Directive::Start),
            "END" => Some(Directive::End),
            "BYTE" => Some(Directive::Byte),
            "WORD" => Some(Directive::Word),
            "RESB" => Some(Directive::Resb),
            "RESW" => Some(Directive::Resw),
            "BASE" => Some(Directive::Base),
            "NOBASE" => Some(Directive::Nobase),
            _ => None,
        }
    }
}

/// A token with its location in the whole source.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Tok<'a> {
    pub text: &'a str,
    pub span: Span,
}

/// One statement: `[label] mnemonic [operand1[, operand2]]`. The `+` prefix
/// is stripped from the mnemonic text and kept as the `extended` flag.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Stmt<'a> {
    pub label: Option<Tok<'a>>,
    pub mnemonic: Tok<'a>,
    pub extended: bool,
    pub operands: Vec<Tok<'a>>,
}

impl Stmt<'_> {
    /// Mnemonic as written, `+` included.
    pub fn raw_mnemonic(&self) -> String {
        if self.extended {
            format!("+{}", self.mnemonic.text)
        } else {
            self.mnemonic.text.to_string()
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum LineBody<'a> {
    Blank,
    Comment,
    Stmt(Stmt<'a>),
}

/// A physical source line. Numbers advance by 5 per line, comments included.
pub struct SourceLine<'a> {
    pub number: u32,
    pub text: &'a str,
    pub body: LineBody<'a>,
}

pub fn split_lines<'a>(src: &'a str, opcodes: &OpcodeTable) -> Vec<SourceLine<'a>> {
    let mut lines = Vec::new();
    let mut offset = 0;
    let mut number = 0;
    for raw in src.split('\n') {
        number += 5;
        let text = raw.strip_suffix('\r').unwrap_or(raw);
        lines.push(SourceLine {
            number,
            text,
            body: parse_line(text, offset, opcodes),
        });
        offset += raw.len() + 1;
    }
    // A trailing newline yields one empty pseudo-line; drop it.
    if src.ends_with('\n') {
        lines.pop();
    }
    lines
}

fn parse_line<'a>(text: &'a str, offset: usize, opcodes: &OpcodeTable) -> LineBody<'a> {
    let mut pos = 0;
    let Some(first) = take_token(text, &mut pos, offset) else {
        return LineBody::Blank;
    };
    if first.text.starts_with('.') {
        return LineBody::Comment;
    }

    let (label, mnemonic) = if is_stmt_mnemonic(first.text, opcodes) {
        (None, first)
    } else if let Some(second) = take_token(text, &mut pos, offset) {
        (Some(first), second)
    } else {
        // A lone unknown token reads best as a bad mnemonic.
        (None, first)
    };

    let extended = mnemonic.text.starts_with('+');
    let mnemonic = if extended {
        Tok {
            text: &mnemonic.text[1..],
            span: mnemonic.span,
        }
    } else {
        mnemonic
    };

    let operands = take_operands(text, pos, offset);

    LineBody::Stmt(Stmt {
        label,
        mnemonic,
        extended,
        operands,
    })
}

fn is_stmt_mnemonic(token: &str, opcodes: &OpcodeTable) -> bool {
    Directive::from_str(token).is_some() || opcodes.is_mnemonic(token)
}

/// Take one whitespace-delimited token starting at `*pos`.
fn take_token<'a>(text: &'a str, pos: &mut usize, offset: usize) -> Option<Tok<'a>> {
    let bytes = text.as_bytes();
    while *pos < bytes.len() && bytes[*pos].is_ascii_whitespace() {
        *pos += 1;
    }
    if *pos >= bytes.len() {
        return None;
    }
    let start = *pos;
    while *pos < bytes.len() && !bytes[*pos].is_ascii_whitespace() {
        *pos += 1;
    }
    Some(Tok {
        text: &text[start..*pos],
        span: Span::new(offset + start, *pos - start),
    })
}

/// Split the operand field on commas and whitespace, keeping `C'…'` and
/// `X'…'` literals whole so quoted text may contain either separator.
fn take_operands<'a>(text: &'a str, mut pos: usize, offset: usize) -> Vec<Tok<'a>> {
    let bytes = text.as_bytes();
    let mut operands = Vec::new();
    loop {
        while pos < bytes.len() && (bytes[pos].is_ascii_whitespace() || bytes[pos] == b',') {
            pos += 1;
        }
        if pos >= bytes.len() {
            break;
        }
        let start = pos;
        if text[pos..].starts_with("C'") || text[pos..].starts_with("X'") {
            pos += 2;
            match text[pos..].find('\'') {
                Some(close) => pos += close + 1,
                None => pos = bytes.len(),
            }
        } else {
            while pos < bytes.len() && !bytes[pos].is_ascii_whitespace() && bytes[pos] != b',' {
                pos += 1;
            }
        }
        operands.push(Tok {
            text: &text[start..pos],
            span: Span::new(offset + start, pos - start),
        });
    }
    operands
}
