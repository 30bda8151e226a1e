use std::fmt::Write as _;

use super::line::Stmt;

/// Maximum bytes carried by one text record.
pub const TEXT_RECORD_MAX: usize = 0x1E;
/// Column the listing pads to before the object code.
const LISTING_OBJECT_COLUMN: usize = 40;

/// Accumulates object-program records. Text bytes are buffered and flushed
/// as `T` records; modification records collect separately and are written
/// between the last text record and the end record.
pub struct ObjectWriter {
    header: String,
    texts: Vec<String>,
    mods: Vec<String>,
    buf: String,
    buf_start: u32,
}

impl ObjectWriter {
    pub fn new() -> Self {
        ObjectWriter {
            header: String::new(),
            texts: Vec::new(),
            mods: Vec::new(),
            buf: String::new(),
            buf_start: 0,
        }
    }

    pub fn header(&mut self, name: &str, start: u32, length: u32) {
        self.header = format!("H{name:<6.6}{start:06X}{length:06X}");
    }

    /// Append object code at `locctr`, flushing whenever the pending record
    /// would exceed the text-record limit. Oversized payloads (long BYTE
    /// literals) split across records.
    pub fn append(&mut self, locctr: u32, hex: &str) {
        debug_assert!(hex.len() % 2 == 0, "object code is whole bytes");
        let mut pos = 0;
        let mut at = locctr;
        while pos < hex.len() {
            let remaining = hex.len() - pos;
            if !self.buf.is_empty() && self.buf.len() + remaining > TEXT_RECORD_MAX * 2 {
                self.flush();
            }
            if self.buf.is_empty() {
                self.buf_start = at;
            }
            let take = remaining.min(TEXT_RECORD_MAX * 2 - self.buf.len());
            self.buf.push_str(&hex[pos..pos + take]);
            pos += take;
            at += take as u32 / 2;
        }
    }

    /// RESB/RESW leave a hole: close the pending record.
    pub fn flush(&mut self) {
        if self.buf.is_empty() {
            return;
        }
        self.texts.push(format!(
            "T{:06X}{:02X}{}",
            self.buf_start,
            self.buf.len() / 2,
            self.buf
        ));
        self.buf.clear();
    }

    /// Format-4 address fields are 5 half-bytes long.
    pub fn add_modification(&mut self, address: u32) {
        self.mods.push(format!("M{address:06X}05"));
    }

    pub fn finish(mut self, end: u32) -> String {
        self.flush();
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.header);
        for record in &self.texts {
            let _ = writeln!(out, "{record}");
        }
        for record in &self.mods {
            let _ = writeln!(out, "{record}");
        }
        let _ = writeln!(out, "E{end:06X}");
        out
    }
}

/// Builds the `.lst` text alongside pass 2.
pub struct ListingWriter {
    out: String,
}

impl ListingWriter {
    pub fn new() -> Self {
        ListingWriter { out: String::new() }
    }

    /// Comment and blank lines are reproduced as written.
    pub fn raw(&mut self, number: u32, text: &str) {
        let line = format!("{number:3} {text}");
        let _ = writeln!(self.out, "{}", line.trim_end());
    }

    /// Statement line: locctr is blank for BASE/NOBASE/END, object code sits
    /// at a fixed column.
    pub fn stmt(&mut self, number: u32, locctr: Option<u32>, stmt: &Stmt, object: &str) {
        let locctr = match locctr {
            Some(locctr) => format!("{locctr:04X}"),
            None => " ".repeat(4),
        };
        let label = stmt.label.map(|l| l.text).unwrap_or("");
        let operands = stmt
            .operands
            .iter()
            .map(|o| o.text)
            .collect::<Vec<_>>()
            .join(", ");
        let mut line = format!(
            "{number:3} {locctr} {label:<6} {:<6} {operands}",
            stmt.raw_mnemonic()
        );
        if !object.is_empty() {
            while line.len() < LISTING_OBJECT_COLUMN {
                line.push(' ');
            }
            line.push_str(object);
        }
        let _ = writeln!(self.out, "{}", line.trim_end());
    }

    pub fn finish(self) -> String {
        self.out
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn text_records_flush_at_limit() {
        let mut w = ObjectWriter::new();
        w.header("COPY", 0x1000, 0x40);
        // 10 three-byte instructions fill a record exactly
        for k in 0..10u32 {
            w.append(0x1000 + k * 3, "010003");
        }
        w.append(0x101E, "4C0000");
        let out = w.finish(0x1000);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "HCOPY  001000000040");
        assert!(lines[1].starts_with("T0010001E"));
        assert_eq!(lines[1].len(), 9 + 60);
        assert_eq!(lines[2], "T00101E034C0000");
        assert_eq!(lines[3], "E001000");
    }

    #[test]
    fn reserve_splits_records() {
        let mut w = ObjectWriter::new();
        w.header("COPY", 0, 0x100);
        w.append(0, "010003");
        w.flush();
        w.append(0x64, "4C0000");
        let out = w.finish(0);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[1], "T00000003010003");
        assert_eq!(lines[2], "T000064034C0000");
    }

    #[test]
    fn modifications_come_before_end() {
        let mut w = ObjectWriter::new();
        w.header("X", 0, 8);
        w.append(0, "4B100000");
        w.add_modification(1);
        let out = w.finish(0);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[2], "M00000105");
        assert_eq!(lines[3], "E000000");
    }

    #[test]
    fn long_byte_literal_splits() {
        let mut w = ObjectWriter::new();
        w.header("X", 0, 0x40);
        let hex = "AB".repeat(35);
        w.append(0, &hex);
        let out = w.finish(0);
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[1].starts_with("T0000001E"));
        assert!(lines[2].starts_with("T00001E05"));
    }
}
