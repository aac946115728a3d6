//! # Grammar Module
//!
//! Grammar construction and the parser arena.
//!
//! A [`Grammar`] owns every parser of a grammar in a single arena; parsers
//! refer to each other (and matches refer back to parsers) through the
//! non-owning [`ParserId`] index, so recursive grammars never form ownership
//! cycles. The set of parser shapes is the closed [`ParserKind`] enum: the
//! matching engine handles it exhaustively.
//!
//! Grammars are built with [`GrammarBuilder`], which validates the graph
//! (unassigned forwards, left recursion, bounds) before producing an
//! immutable, thread-shareable [`Grammar`].

pub mod builder;
pub mod class;
pub(crate) mod validate;

pub use builder::GrammarBuilder;
pub use class::CharClass;
pub use validate::ValidationOptions;

use compact_str::CompactString;
use lasso::{RodeoReader, Spur};
use regex::Regex;
use smallvec::SmallVec;

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

use crate::error::ScannerError;
use crate::parser::{run_parse, ParseResult};
use crate::scanner::{ParseOptions, Scanner};

/// Handle to a parser stored in a [`Grammar`] (or its builder).
///
/// Ids are only meaningful for the grammar that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParserId(pub(crate) u32);

impl ParserId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// How a tagged match participates in scope-tree construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum ScopeKind {
    /// Opens a nested scope; matches until a `Close` at the same depth.
    Open,
    /// Closes the innermost open scope.
    Close,
    /// Opens and immediately closes a scope bounded by the match's own
    /// right edge.
    Enclosed,
    /// Marks an operator-style node the post-processor re-roots siblings
    /// around.
    Pivot,
}

/// The closed set of parser shapes.
#[derive(Debug, Clone)]
pub(crate) enum ParserKind {
    LiteralChar(char),
    LiteralStr {
        text: CompactString,
        case_sensitive: bool,
    },
    CharClass(CharClass),
    AnyChar,
    EndOfInput,
    Empty,
    Regex {
        pattern: CompactString,
        compiled: Regex,
    },
    Remaining {
        min: u32,
        max: Option<u32>,
    },
    Seq(SmallVec<[ParserId; 4]>),
    Choice(SmallVec<[ParserId; 2]>),
    Exclusive(ParserId, ParserId),
    Intersect(ParserId, ParserId),
    Difference(ParserId, ParserId),
    Repeat {
        inner: ParserId,
        min: u32,
        max: Option<u32>,
    },
    DelimitedList {
        item: ParserId,
        separator: ParserId,
    },
    TerminatedList {
        item: ParserId,
        terminator: ParserId,
    },
    Forward(Option<ParserId>),
}

impl ParserKind {
    /// Composites may absorb child matches when a chain is folded back into
    /// a tree; terminals never do.
    pub(crate) fn is_composite(&self) -> bool {
        matches!(
            self,
            Self::Seq(_)
                | Self::Choice(_)
                | Self::Exclusive(..)
                | Self::Intersect(..)
                | Self::Difference(..)
                | Self::Repeat { .. }
                | Self::DelimitedList { .. }
                | Self::TerminatedList { .. }
                | Self::Forward(_)
        )
    }
}

/// One arena slot: a parser shape plus its optional tag/scope metadata.
#[derive(Debug, Clone)]
pub(crate) struct ParserNode {
    pub(crate) kind: ParserKind,
    pub(crate) tag: Option<Spur>,
    pub(crate) scope: Option<ScopeKind>,
}

impl ParserNode {
    pub(crate) fn new(kind: ParserKind) -> Self {
        Self {
            kind,
            tag: None,
            scope: None,
        }
    }

    pub(crate) fn has_metadata(&self) -> bool {
        self.tag.is_some() || self.scope.is_some()
    }
}

/// An immutable parser graph, ready to parse.
///
/// A grammar is immutable once built and can be shared across threads for
/// independent parses; each parse gets its own [`Scanner`].
#[derive(Debug)]
pub struct Grammar {
    nodes: Vec<ParserNode>,
    root: ParserId,
    tags: RodeoReader,
    nullable: Vec<bool>,
}

impl Grammar {
    pub(crate) fn from_parts(
        nodes: Vec<ParserNode>,
        root: ParserId,
        tags: RodeoReader,
        nullable: Vec<bool>,
    ) -> Self {
        Self {
            nodes,
            root,
            tags,
            nullable,
        }
    }

    /// # Panics
    ///
    /// Panics if `id` came from a different grammar and is out of range.
    pub(crate) fn node(&self, id: ParserId) -> &ParserNode {
        &self.nodes[id.index()]
    }

    #[must_use]
    pub const fn root(&self) -> ParserId {
        self.root
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The tag attached to `id`, if any.
    #[must_use]
    pub fn tag_of(&self, id: ParserId) -> Option<&str> {
        self.node(id).tag.map(|spur| self.tags.resolve(&spur))
    }

    /// The scope kind attached to `id`, if any.
    #[must_use]
    pub fn scope_of(&self, id: ParserId) -> Option<ScopeKind> {
        self.node(id).scope
    }

    /// The direct children of `id` in the parser graph.
    #[must_use]
    pub fn children(&self, id: ParserId) -> Vec<ParserId> {
        children_of(&self.node(id).kind)
    }

    /// Whether `id` can succeed without consuming input.
    #[must_use]
    pub fn is_nullable(&self, id: ParserId) -> bool {
        self.nullable[id.index()]
    }

    /// A short human-readable description of `id`, recursing at most
    /// `depth` levels into composite children.
    #[must_use]
    pub fn describe(&self, id: ParserId, depth: u32) -> String {
        let node = self.node(id);
        if depth == 0 {
            return node
                .tag
                .map_or_else(|| "\u{2026}".to_string(), |t| self.tags.resolve(&t).to_string());
        }
        let sub = |child: ParserId| self.describe(child, depth - 1);
        match &node.kind {
            ParserKind::LiteralChar(c) => format!("'{c}'"),
            ParserKind::LiteralStr { text, .. } => format!("\"{text}\""),
            ParserKind::CharClass(_) => "[class]".to_string(),
            ParserKind::AnyChar => "<any>".to_string(),
            ParserKind::EndOfInput => "<end>".to_string(),
            ParserKind::Empty => "<empty>".to_string(),
            ParserKind::Regex { pattern, .. } => format!("/{pattern}/"),
            ParserKind::Remaining { min, max } => match max {
                Some(max) => format!("<remaining {min}..={max}>"),
                None => format!("<remaining {min}..>"),
            },
            ParserKind::Seq(children) => {
                children.iter().copied().map(sub).collect::<Vec<_>>().join(" ")
            }
            ParserKind::Choice(children) => {
                children.iter().copied().map(sub).collect::<Vec<_>>().join(" | ")
            }
            ParserKind::Exclusive(a, b) => format!("{} ^ {}", sub(*a), sub(*b)),
            ParserKind::Intersect(a, b) => format!("{} & {}", sub(*a), sub(*b)),
            ParserKind::Difference(a, b) => format!("{} - {}", sub(*a), sub(*b)),
            ParserKind::Repeat { inner, min, max } => match max {
                Some(max) => format!("({}){{{min},{max}}}", sub(*inner)),
                None => format!("({}){{{min},}}", sub(*inner)),
            },
            ParserKind::DelimitedList { item, separator } => {
                format!("{} % {}", sub(*item), sub(*separator))
            }
            ParserKind::TerminatedList { item, terminator } => {
                format!("{} < {}", sub(*item), sub(*terminator))
            }
            ParserKind::Forward(target) => {
                target.map_or_else(|| "<forward>".to_string(), sub)
            }
        }
    }

    /// The name used for `id` in failure messages: its tag when present,
    /// otherwise a short description.
    #[must_use]
    pub fn display_name(&self, id: ParserId) -> String {
        self.tag_of(id)
            .map_or_else(|| self.describe(id, 2), ToString::to_string)
    }

    /// Parse `input` from the start with a fresh scanner.
    #[must_use]
    pub fn parse_str<'g>(&'g self, input: &str, options: ParseOptions) -> ParseResult<'g> {
        let scanner = Scanner::with_options(input, &options);
        // A fresh scanner can never have completed already.
        match self.parse_with_scanner(scanner) {
            Ok(result) => result,
            Err(ScannerError::Completed) => unreachable!("fresh scanner cannot be completed"),
        }
    }

    /// Parse with a caller-supplied scanner. Each scanner performs exactly
    /// one parse.
    ///
    /// # Errors
    ///
    /// Returns [`ScannerError::Completed`] if `scanner` has already parsed.
    pub fn parse_with_scanner<'g>(
        &'g self,
        scanner: Scanner,
    ) -> Result<ParseResult<'g>, ScannerError> {
        if scanner.is_completed() {
            return Err(ScannerError::Completed);
        }
        Ok(run_parse(self, scanner))
    }
}

pub(crate) fn children_of(kind: &ParserKind) -> Vec<ParserId> {
    match kind {
        ParserKind::Seq(children) => children.to_vec(),
        ParserKind::Choice(children) => children.to_vec(),
        ParserKind::Exclusive(a, b)
        | ParserKind::Intersect(a, b)
        | ParserKind::Difference(a, b) => vec![*a, *b],
        ParserKind::Repeat { inner, .. } => vec![*inner],
        ParserKind::DelimitedList { item, separator } => vec![*item, *separator],
        ParserKind::TerminatedList { item, terminator } => vec![*item, *terminator],
        ParserKind::Forward(target) => target.map(|t| vec![t]).unwrap_or_default(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_grammar_is_shareable() {
        assert_send_sync::<Grammar>();
    }

    #[test]
    fn test_children_introspection() {
        let mut b = GrammarBuilder::new();
        let a = b.literal_char('a');
        let z = b.literal_char('z');
        let pair = b.seq([a, z]);
        let grammar = b.build(pair).unwrap();
        assert_eq!(grammar.children(pair), vec![a, z]);
        assert!(grammar.children(a).is_empty());
    }

    #[test]
    fn test_nullable_flags() {
        let mut b = GrammarBuilder::new();
        let a = b.literal_char('a');
        let star = b.zero_or_more(a);
        let plus = b.one_or_more(a);
        let grammar = b.build(star).unwrap();
        assert!(grammar.is_nullable(star));
        assert!(!grammar.is_nullable(plus));
        assert!(!grammar.is_nullable(a));
    }

    #[test]
    fn test_describe_terminals() {
        let mut b = GrammarBuilder::new();
        let a = b.literal_char('a');
        let s = b.literal_string("let");
        let choice = b.choice([a, s]);
        let grammar = b.build(choice).unwrap();
        assert_eq!(grammar.describe(a, 1), "'a'");
        assert_eq!(grammar.describe(s, 1), "\"let\"");
        assert_eq!(grammar.describe(choice, 2), "'a' | \"let\"");
    }

    #[test]
    fn test_display_name_prefers_tag() {
        let mut b = GrammarBuilder::new();
        let a = b.literal_char('a');
        let a = b.tag(a, "letter");
        let grammar = b.build(a).unwrap();
        assert_eq!(grammar.display_name(a), "letter");
    }
}
