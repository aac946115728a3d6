use compact_str::CompactString;
use lasso::Rodeo;
use regex::Regex;
use smallvec::SmallVec;

use crate::error::GrammarError;
use crate::grammar::validate::{compute_nullability, validate};
use crate::grammar::{CharClass, Grammar, ParserId, ParserKind, ParserNode, ScopeKind};
use crate::grammar::ValidationOptions;

/// Builder for constructing grammars.
///
/// Every constructor appends a parser to the arena and returns its
/// [`ParserId`]; combinators take previously returned ids. Errors that can
/// be caught while composing (bad bounds, bad regexes, forward misuse) are
/// reported eagerly; graph-level errors surface from [`Self::build`].
#[derive(Default)]
pub struct GrammarBuilder {
    nodes: Vec<ParserNode>,
    tags: Rodeo,
}

impl GrammarBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, kind: ParserKind) -> ParserId {
        let id = ParserId(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX));
        self.nodes.push(ParserNode::new(kind));
        id
    }

    // Terminals

    /// Match exactly the character `c`.
    pub fn literal_char(&mut self, c: char) -> ParserId {
        self.push(ParserKind::LiteralChar(c))
    }

    /// Match exactly the string `text`, case-sensitively.
    pub fn literal_string(&mut self, text: &str) -> ParserId {
        self.push(ParserKind::LiteralStr {
            text: CompactString::new(text),
            case_sensitive: true,
        })
    }

    /// Match `text` ignoring ASCII case.
    pub fn literal_string_ci(&mut self, text: &str) -> ParserId {
        self.push(ParserKind::LiteralStr {
            text: CompactString::new(text),
            case_sensitive: false,
        })
    }

    /// Match any single character (fails only at end of input).
    pub fn any_char(&mut self) -> ParserId {
        self.push(ParserKind::AnyChar)
    }

    /// Zero-width match at end of input.
    pub fn end_of_input(&mut self) -> ParserId {
        self.push(ParserKind::EndOfInput)
    }

    /// Zero-width match anywhere.
    pub fn empty(&mut self) -> ParserId {
        self.push(ParserKind::Empty)
    }

    /// Match one character in the inclusive range `lo..=hi`.
    pub fn char_range(&mut self, lo: char, hi: char) -> ParserId {
        self.push(ParserKind::CharClass(CharClass::new().range(lo, hi)))
    }

    /// Match one character from `chars`, excluding any in `exclusions`.
    pub fn char_in_set(
        &mut self,
        chars: impl IntoIterator<Item = char>,
        exclusions: impl IntoIterator<Item = char>,
    ) -> ParserId {
        let mut class = CharClass::new().chars(chars);
        for c in exclusions {
            class = class.exclude(c);
        }
        self.push(ParserKind::CharClass(class))
    }

    /// Match one character of `class`.
    pub fn char_class(&mut self, class: CharClass) -> ParserId {
        self.push(ParserKind::CharClass(class))
    }

    /// Match a regular expression anchored at the cursor.
    ///
    /// The pattern is compiled once, here; a `^` inside it refers to the
    /// cursor, never to the start of the whole input. Inline flags such as
    /// `(?i)` are available for case-insensitive fragments.
    ///
    /// # Errors
    ///
    /// Returns [`GrammarError::Regex`] if the pattern does not compile.
    pub fn regex(&mut self, pattern: &str) -> Result<ParserId, GrammarError> {
        let compiled = Regex::new(&format!("\\A(?:{pattern})")).map_err(Box::new)?;
        Ok(self.push(ParserKind::Regex {
            pattern: CompactString::new(pattern),
            compiled,
        }))
    }

    /// Match (and consume) the rest of the input if its length lies within
    /// `min..=max`; `None` leaves the range open above.
    ///
    /// # Errors
    ///
    /// Returns [`GrammarError::InvalidBounds`] if `max < min`.
    pub fn remaining(&mut self, min: u32, max: Option<u32>) -> Result<ParserId, GrammarError> {
        check_bounds(min, max)?;
        Ok(self.push(ParserKind::Remaining { min, max }))
    }

    // Combinators

    /// Match every child in order. A single-child sequence collapses to
    /// that child; an empty one matches zero width.
    pub fn seq(&mut self, children: impl IntoIterator<Item = ParserId>) -> ParserId {
        let children: SmallVec<[ParserId; 4]> = children.into_iter().collect();
        match children.len() {
            0 => self.empty(),
            1 => children[0],
            _ => self.push(ParserKind::Seq(children)),
        }
    }

    /// Ordered choice: try children left to right, first success wins.
    pub fn choice(&mut self, children: impl IntoIterator<Item = ParserId>) -> ParserId {
        let children: SmallVec<[ParserId; 2]> = children.into_iter().collect();
        match children.len() {
            0 => self.empty(),
            1 => children[0],
            _ => self.push(ParserKind::Choice(children)),
        }
    }

    /// Succeed iff exactly one of `a`, `b` matches at the cursor.
    pub fn exclusive(&mut self, a: ParserId, b: ParserId) -> ParserId {
        self.push(ParserKind::Exclusive(a, b))
    }

    /// Both `a` and `b` must match at the cursor; the result spans the
    /// union of their ranges.
    pub fn intersect(&mut self, a: ParserId, b: ParserId) -> ParserId {
        self.push(ParserKind::Intersect(a, b))
    }

    /// Succeed with `a`'s match iff `b` does not match at the same cursor.
    pub fn difference(&mut self, a: ParserId, b: ParserId) -> ParserId {
        self.push(ParserKind::Difference(a, b))
    }

    /// Match `inner` between `min` and `max` times (greedy).
    ///
    /// # Errors
    ///
    /// Returns [`GrammarError::InvalidBounds`] if `max < min`.
    pub fn repeat(
        &mut self,
        inner: ParserId,
        min: u32,
        max: Option<u32>,
    ) -> Result<ParserId, GrammarError> {
        check_bounds(min, max)?;
        Ok(self.push(ParserKind::Repeat { inner, min, max }))
    }

    /// Match `inner` zero or one time.
    pub fn opt(&mut self, inner: ParserId) -> ParserId {
        self.push(ParserKind::Repeat {
            inner,
            min: 0,
            max: Some(1),
        })
    }

    /// Match `inner` any number of times, including none.
    pub fn zero_or_more(&mut self, inner: ParserId) -> ParserId {
        self.push(ParserKind::Repeat {
            inner,
            min: 0,
            max: None,
        })
    }

    /// Match `inner` one or more times.
    pub fn one_or_more(&mut self, inner: ParserId) -> ParserId {
        self.push(ParserKind::Repeat {
            inner,
            min: 1,
            max: None,
        })
    }

    /// Match `item (separator item)*`. A trailing separator is never
    /// consumed: the list rewinds to just after its last item.
    pub fn delimited(&mut self, item: ParserId, separator: ParserId) -> ParserId {
        self.push(ParserKind::DelimitedList { item, separator })
    }

    /// Match `(item terminator)+`. A final item without its terminator is
    /// left unconsumed.
    pub fn terminated(&mut self, item: ParserId, terminator: ParserId) -> ParserId {
        self.push(ParserKind::TerminatedList { item, terminator })
    }

    /// Create an unassigned forward reference for recursive grammars.
    pub fn forward(&mut self) -> ParserId {
        self.push(ParserKind::Forward(None))
    }

    /// Point a forward reference at its target.
    ///
    /// # Errors
    ///
    /// Returns an error if `forward` is not a forward reference, is already
    /// assigned, or is assigned directly to itself.
    pub fn assign(&mut self, forward: ParserId, target: ParserId) -> Result<(), GrammarError> {
        if forward == target {
            return Err(GrammarError::SelfReferentialForward(forward));
        }
        match &mut self.nodes[forward.index()].kind {
            ParserKind::Forward(slot) => {
                if slot.is_some() {
                    return Err(GrammarError::ForwardAlreadyAssigned(forward));
                }
                *slot = Some(target);
                Ok(())
            }
            _ => Err(GrammarError::NotForward(forward)),
        }
    }

    // Metadata

    /// Attach a tag to `id` and return it, for chaining.
    ///
    /// Tagged matches appear in the token stream and name the parser in
    /// failure messages.
    pub fn tag(&mut self, id: ParserId, name: &str) -> ParserId {
        let spur = self.tags.get_or_intern(name);
        self.nodes[id.index()].tag = Some(spur);
        id
    }

    /// Attach a scope kind to `id` and return it, for chaining.
    pub fn scope(&mut self, id: ParserId, kind: ScopeKind) -> ParserId {
        self.nodes[id.index()].scope = Some(kind);
        id
    }

    // Building

    /// Validate the graph and produce an immutable [`Grammar`] rooted at
    /// `root`.
    ///
    /// # Errors
    ///
    /// Returns [`GrammarError::UnassignedForward`] or
    /// [`GrammarError::LeftRecursion`] when the graph is unsound.
    pub fn build(self, root: ParserId) -> Result<Grammar, GrammarError> {
        self.build_with_options(root, ValidationOptions::default())
    }

    /// Like [`Self::build`], with explicit [`ValidationOptions`].
    ///
    /// # Errors
    ///
    /// See [`Self::build`]; left-recursion detection is skipped when
    /// `options.allow_left_recursion` is set.
    pub fn build_with_options(
        self,
        root: ParserId,
        options: ValidationOptions,
    ) -> Result<Grammar, GrammarError> {
        let nullable = compute_nullability(&self.nodes);
        validate(&self.nodes, &nullable, options)?;
        Ok(Grammar::from_parts(
            self.nodes,
            root,
            self.tags.into_reader(),
            nullable,
        ))
    }
}

fn check_bounds(min: u32, max: Option<u32>) -> Result<(), GrammarError> {
    match max {
        Some(max) if max < min => Err(GrammarError::InvalidBounds { min, max }),
        _ => Ok(()),
    }
}
