/// Stands in for `\n` in stored lines (SYMBOL FOR NEWLINE).
pub const DEFAULT_SENTINEL: char = '\u{2424}';

/// Maps clipboard text to a single storable line and back.
///
/// The mapping is only reversible for text that does not already contain the sentinel.
/// Such text is stored as-is and will come back with extra newlines.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Encoder {
    sentinel: char,
}

impl Default for Encoder {
    fn default() -> Self {
        Encoder {
            sentinel: DEFAULT_SENTINEL,
        }
    }
}

impl Encoder {
    /// Returns None if the sentinel is a newline, since that could never produce a single line.
    pub fn new(sentinel: char) -> Option<Self> {
        if sentinel == '\n' {
            return None;
        }
        Some(Encoder { sentinel })
    }

    pub fn sentinel(&self) -> char {
        self.sentinel
    }

    pub fn encode(&self, text: &str) -> String {
        text.chars()
            .map(|c| if c == '\n' { self.sentinel } else { c })
            .collect()
    }

    pub fn decode(&self, line: &str) -> String {
        line.chars()
            .map(|c| if c == self.sentinel { '\n' } else { c })
            .collect()
    }

    /// Whether encoding this text would be lossy.
    pub fn contains_sentinel(&self, text: &str) -> bool {
        text.contains(self.sentinel)
    }
}
