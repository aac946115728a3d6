//! # Match Model
//!
//! A parse produces a chain of [`ParserMatch`] values, one per successful
//! step, linked left-to-right through `previous`. The final match returned by
//! the root parser is the head of the chain; walking `previous` from it
//! reaches the zero-width start match at offset 0.
//!
//! Matches are immutable once created. A failed branch drops its matches with
//! their `Rc`s, so the surviving chain is exactly the successful parse path.
//! Combinators that span several children (sequences, repetitions, lists)
//! contribute a spanning match linked after their last child, which is how
//! the flat chain can later be folded back into a tree.

use std::fmt;
use std::rc::Rc;

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

use crate::grammar::ParserId;
use crate::scanner::Scanner;

/// A half-open byte range `[start, end)` within the scanned input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    #[must_use]
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub const fn len(self) -> u32 {
        self.end - self.start
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.start == self.end
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        other.start >= self.start && other.end <= self.end
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// One step of a parse: a parser either matched `length >= 0` bytes at
/// `offset`, or failed there (`length == -1`).
///
/// Successful matches are chained through `previous`; the chain is in
/// creation order, so the cursor positions (`right`) never decrease along it.
#[derive(Debug, Clone)]
pub struct ParserMatch {
    parser: Option<ParserId>,
    offset: u32,
    length: i32,
    skipped: bool,
    previous: Option<Rc<ParserMatch>>,
}

impl ParserMatch {
    pub(crate) fn new(
        parser: Option<ParserId>,
        offset: u32,
        length: i32,
        skipped: bool,
        previous: Option<Rc<ParserMatch>>,
    ) -> Self {
        Self {
            parser,
            offset,
            length,
            skipped,
            previous,
        }
    }

    /// The parser that produced this match, if any. The start-of-parse
    /// sentinel has no parser.
    #[must_use]
    pub const fn parser(&self) -> Option<ParserId> {
        self.parser
    }

    #[must_use]
    pub const fn offset(&self) -> u32 {
        self.offset
    }

    /// Raw length: `-1` encodes a failed match, `>= 0` a success
    /// (zero-length successes are permitted).
    #[must_use]
    pub const fn length(&self) -> i32 {
        self.length
    }

    #[must_use]
    pub const fn is_match(&self) -> bool {
        self.length >= 0
    }

    /// Matched length in bytes, treating failure as zero.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub const fn len(&self) -> u32 {
        if self.length > 0 {
            self.length as u32
        } else {
            0
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The position immediately after this match.
    #[must_use]
    pub const fn right(&self) -> u32 {
        self.offset + self.len()
    }

    #[must_use]
    pub const fn span(&self) -> Span {
        Span::new(self.offset, self.right())
    }

    /// True for matches produced by the auto-advance parser when skipped
    /// input is not being kept.
    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        self.skipped
    }

    #[must_use]
    pub const fn previous(&self) -> Option<&Rc<ParserMatch>> {
        self.previous.as_ref()
    }

    /// The matched text, read from the scanner's transformed view.
    #[must_use]
    pub fn text<'s>(&self, scanner: &'s Scanner) -> &'s str {
        scanner.substring(self.offset, self.len())
    }

    /// Linearize the chain ending at this match, start-of-parse first.
    #[must_use]
    pub fn chain(self: &Rc<Self>) -> Vec<Rc<ParserMatch>> {
        let mut out = Vec::new();
        let mut cursor = Some(self.clone());
        while let Some(m) = cursor {
            cursor = m.previous.clone();
            out.push(m);
        }
        out.reverse();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(offset: u32, length: i32, previous: Option<Rc<ParserMatch>>) -> Rc<ParserMatch> {
        Rc::new(ParserMatch::new(None, offset, length, false, previous))
    }

    #[test]
    fn test_span_basics() {
        let span = Span::new(2, 5);
        assert_eq!(span.len(), 3);
        assert!(!span.is_empty());
        assert!(span.contains(Span::new(3, 5)));
        assert!(!span.contains(Span::new(1, 4)));
        assert_eq!(format!("{span}"), "2..5");
    }

    #[test]
    fn test_failed_match_has_zero_extent() {
        let m = raw(4, -1, None);
        assert!(!m.is_match());
        assert_eq!(m.len(), 0);
        assert_eq!(m.right(), 4);
    }

    #[test]
    fn test_right_is_offset_plus_length() {
        let m = raw(3, 4, None);
        assert!(m.is_match());
        assert_eq!(m.right(), 7);
        assert_eq!(m.span(), Span::new(3, 7));
    }

    #[test]
    fn test_chain_is_in_parse_order() {
        let a = raw(0, 2, None);
        let b = raw(2, 3, Some(a.clone()));
        let c = raw(5, 0, Some(b.clone()));
        let chain = c.chain();
        assert_eq!(chain.len(), 3);
        assert_eq!(chain[0].offset(), 0);
        assert_eq!(chain[1].offset(), 2);
        assert_eq!(chain[2].offset(), 5);
        let mut last_right = 0;
        for m in &chain {
            assert!(m.right() >= last_right);
            last_right = m.right();
        }
    }
}
