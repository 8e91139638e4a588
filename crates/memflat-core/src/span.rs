pub type FileId = u64;

/// Source range an IR construct was created from.
///
/// Rewrites copy the span of the op they replace so diagnostics raised late in
/// the pipeline still point at user code.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct Span {
    pub file: FileId,
    pub lo: u32,
    pub hi: u32,
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_unknown() {
            write!(f, "<unknown>")
        } else {
            write!(f, "{}:{}-{}", self.file, self.lo, self.hi)
        }
    }
}

impl Span {
    pub fn new(file: FileId, lo: u32, hi: u32) -> Span {
        Span { file, lo, hi }
    }

    pub fn unknown() -> Span {
        Span::default()
    }

    pub fn is_unknown(&self) -> bool {
        self.file == 0 && self.lo == 0 && self.hi == 0
    }

    /// Smallest span covering both `self` and `other` in the same file.
    pub fn to(self, other: Span) -> Span {
        if self.is_unknown() {
            return other;
        }
        if other.is_unknown() || other.file != self.file {
            return self;
        }
        Span::new(self.file, self.lo.min(other.lo), self.hi.max(other.hi))
    }
}
