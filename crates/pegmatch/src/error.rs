//! # Error Types
//!
//! Error types for grammar construction and scanner misuse.
//!
//! Parse *failure* is not an error: a parser that does not match reports a
//! failed [`crate::ParserMatch`] (or `None`) and the scanner records the
//! furthest failure for diagnostics. The types here cover the two
//! non-recoverable cases:
//!
//! - [`GrammarError`]: the grammar itself is malformed and cannot be built.
//! - [`ScannerError`]: a scanner was reused after completing its one parse.

use thiserror::Error;

use crate::grammar::ParserId;

/// Errors raised eagerly while constructing a [`crate::Grammar`].
#[derive(Debug, Error)]
pub enum GrammarError {
    /// A forward reference was created but never assigned a target.
    #[error("forward reference {0:?} was never assigned a target")]
    UnassignedForward(ParserId),

    /// A forward reference was assigned directly to itself.
    #[error("forward reference {0:?} refers to itself")]
    SelfReferentialForward(ParserId),

    /// `assign` was called on a parser that is not a forward reference.
    #[error("parser {0:?} is not a forward reference")]
    NotForward(ParserId),

    /// `assign` was called twice on the same forward reference.
    #[error("forward reference {0:?} is already assigned")]
    ForwardAlreadyAssigned(ParserId),

    /// A repetition or remaining-length terminal was given `max < min`.
    #[error("invalid bounds: min {min} exceeds max {max}")]
    InvalidBounds { min: u32, max: u32 },

    /// The grammar can re-enter a parser at the same position without
    /// consuming input.
    #[error("left recursion detected through {0:?}")]
    LeftRecursion(Vec<ParserId>),

    /// A regular-expression fragment failed to compile.
    #[error("invalid regular expression: {0}")]
    Regex(#[from] Box<regex::Error>),
}

/// Errors raised when a [`crate::Scanner`] is misused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ScannerError {
    /// The scanner already completed a parse; build a fresh one.
    #[error("scanner has already completed a parse")]
    Completed,
}
