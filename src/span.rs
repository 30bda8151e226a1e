use std::ops::Range;

use miette::SourceSpan;

/// Location within source text.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Span {
    offs: usize,
    len: usize,
}

impl Span {
    pub fn new(offs: usize, len: usize) -> Self {
        Span { offs, len }
    }

    /// Non-source span
    pub fn dummy() -> Self {
        Span { offs: 0, len: 0 }
    }

    pub fn offs(&self) -> usize {
        self.offs
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn end(&self) -> usize {
        self.offs + self.len
    }

    /// Returns a range that can be used to index the source
    pub fn as_range(&self) -> Range<usize> {
        self.offs..self.end()
    }
}

// Used for miette conversion
impl From<Span> for SourceSpan {
    fn from(value: Span) -> Self {
        SourceSpan::new(value.offs().into(), value.len())
    }
}

impl From<Range<usize>> for Span {
    fn from(value: Range<usize>) -> Self {
        Span {
            offs: value.start,
            len: value.end - value.start,
        }
    }
}
