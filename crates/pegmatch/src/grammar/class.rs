use smallvec::SmallVec;

/// A set of characters described by inclusive ranges, minus exclusions.
///
/// Used by the character-class terminal; a single range with `lo == hi`
/// describes one character.
#[derive(Debug, Clone, Default)]
pub struct CharClass {
    ranges: SmallVec<[(char, char); 4]>,
    exclusions: SmallVec<[char; 4]>,
}

impl CharClass {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an inclusive range `lo..=hi`.
    #[must_use]
    pub fn range(mut self, lo: char, hi: char) -> Self {
        self.ranges.push((lo, hi));
        self
    }

    /// Add every character of `chars` as a one-character range.
    #[must_use]
    pub fn chars(mut self, chars: impl IntoIterator<Item = char>) -> Self {
        for c in chars {
            self.ranges.push((c, c));
        }
        self
    }

    /// Exclude `c` even if a range covers it.
    #[must_use]
    pub fn exclude(mut self, c: char) -> Self {
        self.exclusions.push(c);
        self
    }

    /// `[0-9]`
    #[must_use]
    pub fn digits() -> Self {
        Self::new().range('0', '9')
    }

    /// Space, tab, carriage return, and newline.
    #[must_use]
    pub fn whitespace() -> Self {
        Self::new().chars([' ', '\t', '\r', '\n'])
    }

    /// `[A-Za-z]`
    #[must_use]
    pub fn letters() -> Self {
        Self::new().range('A', 'Z').range('a', 'z')
    }

    #[must_use]
    pub fn contains(&self, c: char) -> bool {
        if self.exclusions.contains(&c) {
            return false;
        }
        self.ranges.iter().any(|&(lo, hi)| c >= lo && c <= hi)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}
