use super::datum::Datum;

/// Location of a value inside a `RowArena`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub len: usize,
}

impl Span {
    fn range(&self) -> std::ops::Range<usize> {
        self.start..self.start + self.len
    }
}

/// Bump arena for the variable-length parts of one output row
///
/// Text, binary and array values decoded for a row are appended here and
/// referenced from the row's datums by `Span`. The arena is reset (length
/// set to zero, capacity kept) at the start of every output row and when
/// the reader switches row groups, so its footprint is bounded by the
/// largest row seen in the current row group rather than the whole scan.
#[derive(Debug, Default)]
pub struct RowArena {
    text: String,
    bytes: Vec<u8>,
    elements: Vec<Datum>,
}

impl RowArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything allocated so far, keeping capacity
    pub fn reset(&mut self) {
        self.text.clear();
        self.bytes.clear();
        self.elements.clear();
    }

    pub fn alloc_text(&mut self, value: &str) -> Span {
        let start = self.text.len();
        self.text.push_str(value);
        Span {
            start,
            len: value.len(),
        }
    }

    pub fn alloc_bytes(&mut self, value: &[u8]) -> Span {
        let start = self.bytes.len();
        self.bytes.extend_from_slice(value);
        Span {
            start,
            len: value.len(),
        }
    }

    /// Start of the next array; pair with `finish_array`
    pub fn begin_array(&self) -> usize {
        self.elements.len()
    }

    pub fn push_element(&mut self, element: Datum) {
        self.elements.push(element);
    }

    /// Span covering every element pushed since `begin_array` returned `start`
    pub fn finish_array(&self, start: usize) -> Span {
        Span {
            start,
            len: self.elements.len() - start,
        }
    }

    /// Returns "" for a span that is no longer valid (arena was reset)
    pub fn text(&self, span: Span) -> &str {
        self.text.get(span.range()).unwrap_or_default()
    }

    pub fn bytes(&self, span: Span) -> &[u8] {
        self.bytes.get(span.range()).unwrap_or_default()
    }

    pub fn elements(&self, span: Span) -> &[Datum] {
        self.elements.get(span.range()).unwrap_or_default()
    }

    /// Bytes currently held, across all value kinds
    pub fn used_bytes(&self) -> usize {
        self.text.len() + self.bytes.len() + self.elements.len() * std::mem::size_of::<Datum>()
    }

    /// Bytes reserved, which survive `reset`
    pub fn capacity_bytes(&self) -> usize {
        self.text.capacity()
            + self.bytes.capacity()
            + self.elements.capacity() * std::mem::size_of::<Datum>()
    }
}
