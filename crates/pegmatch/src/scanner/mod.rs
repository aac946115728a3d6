//! # Scanner
//!
//! The scanner owns the input for one parse: the original text plus a
//! case-transformed view of the same byte length. It hands out matches on
//! behalf of parsers, records furthest-failure diagnostics, runs the
//! auto-advance parser between composite children, and keeps the per-parse
//! recursion contexts that make forward references safe.
//!
//! A scanner performs exactly one parse; [`Scanner::complete`] marks it
//! used and any later attempt to parse with it fails with
//! [`crate::ScannerError::Completed`].

use std::rc::Rc;

use ahash::RandomState;
use compact_str::CompactString;
use hashbrown::{HashMap, HashSet};
use memchr::memmem;

use crate::grammar::{Grammar, ParserId};
use crate::matching::ParserMatch;

/// How the transformed view is derived from the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaseTransform {
    /// Transformed view equals the input.
    #[default]
    None,
    /// ASCII-lowercased view; byte length is preserved.
    Lower,
}

/// Options for a single parse.
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Parser run between composite children to skip insignificant input,
    /// typically whitespace. Must come from the same grammar.
    pub auto_advance: Option<ParserId>,
    pub case_transform: CaseTransform,
    /// Keep auto-advanced (skipped) matches visible to the token and tree
    /// walks instead of flagging them.
    pub include_skipped: bool,
}

/// A recorded failed attempt: `parser` could not match at `position`,
/// where it would have needed `length` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailurePoint {
    pub parser: ParserId,
    pub position: u32,
    pub length: u32,
}

/// Owns the input of one parse and all of its bookkeeping.
pub struct Scanner {
    input: String,
    transformed: String,
    auto_advance: Option<ParserId>,
    include_skipped: bool,
    in_auto_advance: bool,
    completed: bool,
    matches_created: usize,
    /// Deepest position reached by any successful match.
    furthest_offset: u32,
    /// Deepest position at which an attempt failed.
    furthest_test: u32,
    failure_points: Vec<FailurePoint>,
    /// Tag of the deepest tagged success, with its right edge.
    furthest_tag: Option<(CompactString, u32)>,
    /// Active forward-reference entries, keyed by holder.
    contexts: HashMap<ParserId, HashSet<(u32, Option<ParserId>), RandomState>, RandomState>,
}

impl Scanner {
    #[must_use]
    pub fn new(input: &str) -> Self {
        Self::with_options(input, &ParseOptions::default())
    }

    #[must_use]
    pub fn with_options(input: &str, options: &ParseOptions) -> Self {
        let transformed = match options.case_transform {
            CaseTransform::None => input.to_string(),
            CaseTransform::Lower => input.to_ascii_lowercase(),
        };
        Self {
            input: input.to_string(),
            transformed,
            auto_advance: options.auto_advance,
            include_skipped: options.include_skipped,
            in_auto_advance: false,
            completed: false,
            matches_created: 0,
            furthest_offset: 0,
            furthest_test: 0,
            failure_points: Vec::new(),
            furthest_tag: None,
            contexts: HashMap::with_hasher(RandomState::new()),
        }
    }

    // Positional queries

    /// Input length in bytes.
    #[must_use]
    pub fn len(&self) -> u32 {
        u32::try_from(self.input.len()).unwrap_or(u32::MAX)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.input.is_empty()
    }

    #[must_use]
    pub fn end_of_input(&self, offset: u32) -> bool {
        offset >= self.len()
    }

    /// The character at `offset` in the transformed view, or `None` past
    /// the end.
    #[must_use]
    pub fn peek(&self, offset: u32) -> Option<char> {
        self.transformed
            .get(offset as usize..)
            .and_then(|rest| rest.chars().next())
    }

    /// A view of the transformed input, truncated at the end of input.
    #[must_use]
    pub fn substring(&self, offset: u32, length: u32) -> &str {
        slice_of(&self.transformed, offset, length)
    }

    /// Like [`Self::substring`] over the original input. A negative
    /// `length` selects the `|length|` bytes *ending* at `offset`.
    #[must_use]
    pub fn untransformed_substring(&self, offset: u32, length: i32) -> &str {
        if length < 0 {
            let span = length.unsigned_abs().min(offset);
            slice_of(&self.input, offset - span, span)
        } else {
            #[allow(clippy::cast_sign_loss)]
            slice_of(&self.input, offset, length as u32)
        }
    }

    /// First occurrence of `needle` at or after `offset` in the
    /// transformed view.
    #[must_use]
    pub fn index_of(&self, offset: u32, needle: &str, case_insensitive: bool) -> Option<u32> {
        let haystack = self.transformed.as_bytes().get(offset as usize..)?;
        let found = if case_insensitive {
            let haystack = haystack.to_ascii_lowercase();
            let needle = needle.to_ascii_lowercase();
            memmem::find(&haystack, needle.as_bytes())
        } else {
            memmem::find(haystack, needle.as_bytes())
        };
        found.map(|at| offset + u32::try_from(at).unwrap_or(u32::MAX))
    }

    pub(crate) fn rest(&self, offset: u32) -> &str {
        self.transformed.get(offset as usize..).unwrap_or("")
    }

    // Match factories

    /// The zero-width match every chain starts from.
    pub(crate) fn start_match(&self) -> Rc<ParserMatch> {
        Rc::new(ParserMatch::new(None, 0, 0, false, None))
    }

    /// Record a success of `length` bytes at `offset`.
    pub(crate) fn create_match(
        &mut self,
        parser: ParserId,
        offset: u32,
        length: u32,
        previous: &Rc<ParserMatch>,
    ) -> Rc<ParserMatch> {
        debug_assert!(!self.completed, "scanner already completed");
        self.matches_created += 1;
        let right = offset + length;
        if right > self.furthest_offset {
            self.furthest_offset = right;
        }
        let skipped = self.in_auto_advance && !self.include_skipped;
        Rc::new(ParserMatch::new(
            Some(parser),
            offset,
            i32::try_from(length).unwrap_or(i32::MAX),
            skipped,
            Some(previous.clone()),
        ))
    }

    /// Record a zero-width success at `offset`.
    pub(crate) fn empty_match(
        &mut self,
        parser: ParserId,
        offset: u32,
        previous: &Rc<ParserMatch>,
    ) -> Rc<ParserMatch> {
        self.create_match(parser, offset, 0, previous)
    }

    /// Record a failed attempt and return no match. `expected` is the
    /// length the parser would have needed, used to size the reported
    /// region.
    pub(crate) fn no_match(
        &mut self,
        parser: ParserId,
        position: u32,
        expected: u32,
    ) -> Option<Rc<ParserMatch>> {
        if !self.in_auto_advance {
            self.add_failure(parser, position, expected);
        }
        None
    }

    /// A failed match as a value, for callers that need the position of
    /// the failure rather than `None`.
    #[must_use]
    pub fn failed_match(&self, parser: ParserId, position: u32) -> ParserMatch {
        ParserMatch::new(Some(parser), position, -1, false, None)
    }

    // Diagnostics

    /// Record a failed attempt. Only the deepest failures are kept: a
    /// deeper failure clears shallower ones.
    pub fn add_failure(&mut self, parser: ParserId, position: u32, length: u32) {
        if position > self.furthest_test || self.failure_points.is_empty() {
            if position >= self.furthest_test {
                if position > self.furthest_test {
                    self.failure_points.clear();
                }
                self.furthest_test = position;
                self.failure_points.push(FailurePoint {
                    parser,
                    position,
                    length,
                });
            }
        } else if position == self.furthest_test {
            let point = FailurePoint {
                parser,
                position,
                length,
            };
            if !self.failure_points.contains(&point) {
                self.failure_points.push(point);
            }
        }
    }

    pub fn clear_failures(&mut self) {
        self.failure_points.clear();
    }

    #[must_use]
    pub fn failure_points(&self) -> &[FailurePoint] {
        &self.failure_points
    }

    /// Deepest position reached by a successful match.
    #[must_use]
    pub const fn furthest_offset(&self) -> u32 {
        self.furthest_offset
    }

    /// Deepest position at which an attempt failed.
    #[must_use]
    pub const fn furthest_test(&self) -> u32 {
        self.furthest_test
    }

    pub(crate) fn note_tagged_success(&mut self, tag: &str, right: u32) {
        let deeper = match &self.furthest_tag {
            Some((_, best)) => right >= *best,
            None => true,
        };
        if deeper {
            self.furthest_tag = Some((CompactString::new(tag), right));
        }
    }

    /// Render the recorded failures as `Expected … After …` messages,
    /// marking the offending region with `◢ ◣`.
    ///
    /// With `show_details`, one extra line per failure point names the
    /// failing parser and its position.
    #[must_use]
    pub fn list_failures(
        &self,
        min_offset: u32,
        show_details: bool,
        grammar: &Grammar,
    ) -> Vec<String> {
        let points: Vec<&FailurePoint> = self
            .failure_points
            .iter()
            .filter(|p| p.position >= min_offset)
            .collect();
        if points.is_empty() {
            return Vec::new();
        }

        let position = self.furthest_test;
        let mut expected: Vec<String> = Vec::new();
        for point in &points {
            let name = grammar.display_name(point.parser);
            if !expected.contains(&name) {
                expected.push(name);
            }
        }
        let expected = expected
            .iter()
            .map(|name| format!("'{name}'"))
            .collect::<Vec<_>>()
            .join(", ");

        let after = self.furthest_tag.as_ref().and_then(|(tag, right)| {
            (*right <= position).then_some(tag.as_str())
        });

        let bad_len = points
            .iter()
            .map(|p| p.length.max(1))
            .max()
            .unwrap_or(1)
            .min(self.len().saturating_sub(position));
        let before_start = floor_boundary(&self.input, position.saturating_sub(20));
        let bad_end = ceil_boundary(&self.input, position + bad_len);
        let rest_end = ceil_boundary(&self.input, bad_end + 20);
        let before = &self.input[before_start as usize..position as usize];
        let bad = &self.input[position as usize..bad_end as usize];
        let rest = &self.input[bad_end as usize..rest_end as usize];

        let summary = match after {
            Some(after) => {
                format!("Expected {expected} After '{after}' {before}\u{25e2}{bad}\u{25e3}{rest}")
            }
            None => format!("Expected {expected} {before}\u{25e2}{bad}\u{25e3}{rest}"),
        };

        let mut lines = vec![summary];
        if show_details {
            for point in &points {
                lines.push(format!(
                    "  at {}: {}",
                    point.position,
                    grammar.describe(point.parser, 3)
                ));
            }
        }
        lines
    }

    // Recursion contexts

    /// Register entry of a forward reference at `position` coming from
    /// `source`. Returns false when that exact entry is already active,
    /// which signals unguarded recursion.
    pub(crate) fn enter_recursion(
        &mut self,
        holder: ParserId,
        position: u32,
        source: Option<ParserId>,
    ) -> bool {
        self.contexts
            .entry(holder)
            .or_insert_with(|| HashSet::with_hasher(RandomState::new()))
            .insert((position, source))
    }

    pub(crate) fn exit_recursion(
        &mut self,
        holder: ParserId,
        position: u32,
        source: Option<ParserId>,
    ) {
        if let Some(entries) = self.contexts.get_mut(&holder) {
            entries.remove(&(position, source));
        }
    }

    // Auto-advance plumbing

    pub(crate) const fn auto_advance_parser(&self) -> Option<ParserId> {
        self.auto_advance
    }

    pub(crate) fn set_in_auto_advance(&mut self, value: bool) -> bool {
        std::mem::replace(&mut self.in_auto_advance, value)
    }

    // Completion barrier

    /// Mark the scanner as used; it will not start another parse.
    pub fn complete(&mut self) {
        self.completed = true;
    }

    #[must_use]
    pub const fn is_completed(&self) -> bool {
        self.completed
    }

    pub(crate) const fn matches_created(&self) -> usize {
        self.matches_created
    }
}

fn slice_of(text: &str, offset: u32, length: u32) -> &str {
    let start = (offset as usize).min(text.len());
    let end = ((offset as usize).saturating_add(length as usize)).min(text.len());
    text.get(start..end).unwrap_or("")
}

fn floor_boundary(text: &str, mut at: u32) -> u32 {
    at = at.min(u32::try_from(text.len()).unwrap_or(u32::MAX));
    while at > 0 && !text.is_char_boundary(at as usize) {
        at -= 1;
    }
    at
}

fn ceil_boundary(text: &str, mut at: u32) -> u32 {
    let len = u32::try_from(text.len()).unwrap_or(u32::MAX);
    at = at.min(len);
    while at < len && !text.is_char_boundary(at as usize) {
        at += 1;
    }
    at
}
