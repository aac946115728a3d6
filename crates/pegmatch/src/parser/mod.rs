//! # Matching Engine
//!
//! One recursive function drives a parse: [`try_match`] dispatches over the
//! closed [`ParserKind`] set, threading a `previous` match cursor forward on
//! success and handing the caller's cursor back untouched on failure. That
//! is the whole backtracking story: a failed branch simply drops the matches
//! it created.
//!
//! Auto-advance is injected here, at the seam between composite children,
//! never inside terminals. The auto-advance parser itself runs with
//! advancing disabled so it cannot recurse.

use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::grammar::{Grammar, ParserId, ParserKind};
use crate::matching::ParserMatch;
use crate::scanner::Scanner;
use crate::transform::scope::{build_scope_tree, ScopeTree};
use crate::transform::tree::{build_tree, TreeNode};
use crate::transform::{collect_tokens, Token};

/// Counters for one parse.
#[derive(Debug, Clone, Default)]
pub struct ParseMetrics {
    pub matches_created: usize,
    /// Deepest input position reached by any successful match.
    pub furthest_offset: u32,
    pub parse_time: Duration,
}

/// The outcome of applying a grammar to one input.
///
/// Holds the scanner (and with it the input and diagnostics) together with
/// the root match: a successful match chain, or a `length == -1` failure at
/// the root.
pub struct ParseResult<'g> {
    grammar: &'g Grammar,
    scanner: Scanner,
    root: Rc<ParserMatch>,
    metrics: ParseMetrics,
}

impl<'g> ParseResult<'g> {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.root.is_match()
    }

    /// The root match: head of the match chain on success, a failed match
    /// on failure.
    #[must_use]
    pub const fn root_match(&self) -> &Rc<ParserMatch> {
        &self.root
    }

    #[must_use]
    pub const fn scanner(&self) -> &Scanner {
        &self.scanner
    }

    #[must_use]
    pub const fn grammar(&self) -> &'g Grammar {
        self.grammar
    }

    #[must_use]
    pub const fn metrics(&self) -> &ParseMetrics {
        &self.metrics
    }

    /// The matched text of `m`, from the transformed view.
    #[must_use]
    pub fn text_of(&self, m: &ParserMatch) -> &str {
        m.text(&self.scanner)
    }

    /// Tagged, non-empty matches in parse order.
    #[must_use]
    pub fn tokens(&self) -> Vec<Token> {
        if !self.is_success() {
            return Vec::new();
        }
        collect_tokens(self.grammar, &self.scanner, &self.root)
    }

    /// The tag/scope hierarchy of the match chain, pivot-rewritten.
    #[must_use]
    pub fn scope_tree(&self) -> ScopeTree {
        build_scope_tree(self.grammar, &self.root)
    }

    /// The parser-structural tree of the match chain. With `prune`, nodes
    /// whose parser carries neither tag nor scope collapse into their
    /// children.
    #[must_use]
    pub fn tree(&self, prune: bool) -> Option<TreeNode> {
        if !self.is_success() {
            return None;
        }
        build_tree(self.grammar, &self.scanner, &self.root, prune)
    }

    /// Failure messages for attempts at or after `min_offset`.
    #[must_use]
    pub fn failures(&self, min_offset: u32, show_details: bool) -> Vec<String> {
        self.scanner.list_failures(min_offset, show_details, self.grammar)
    }
}

/// Run the grammar's root parser over the scanner, consuming it.
pub(crate) fn run_parse(grammar: &Grammar, mut scanner: Scanner) -> ParseResult<'_> {
    let started = Instant::now();
    let seed = scanner.start_match();
    let matched = try_match(grammar, &mut scanner, grammar.root(), &seed, true);
    scanner.complete();
    let metrics = ParseMetrics {
        matches_created: scanner.matches_created(),
        furthest_offset: scanner.furthest_offset(),
        parse_time: started.elapsed(),
    };
    let root = matched.unwrap_or_else(|| Rc::new(scanner.failed_match(grammar.root(), 0)));
    ParseResult {
        grammar,
        scanner,
        root,
        metrics,
    }
}

/// Advance past insignificant input at `previous.right()`, if an
/// auto-advance parser is configured and it matches non-zero width.
fn auto_advance(
    grammar: &Grammar,
    scanner: &mut Scanner,
    previous: &Rc<ParserMatch>,
) -> Rc<ParserMatch> {
    let Some(advance) = scanner.auto_advance_parser() else {
        return previous.clone();
    };
    let was_inside = scanner.set_in_auto_advance(true);
    let result = try_match(grammar, scanner, advance, previous, false);
    scanner.set_in_auto_advance(was_inside);
    match result {
        Some(m) if !m.is_empty() => m,
        _ => previous.clone(),
    }
}

fn seam(
    grammar: &Grammar,
    scanner: &mut Scanner,
    previous: &Rc<ParserMatch>,
    allow_advance: bool,
) -> Rc<ParserMatch> {
    if allow_advance {
        auto_advance(grammar, scanner, previous)
    } else {
        previous.clone()
    }
}

/// Re-issue a forwarded child match under `id` when `id` carries metadata,
/// so its tag/scope participate in token and scope projection.
fn adopt(
    grammar: &Grammar,
    scanner: &mut Scanner,
    id: ParserId,
    m: Rc<ParserMatch>,
) -> Rc<ParserMatch> {
    if grammar.node(id).has_metadata() {
        scanner.create_match(id, m.offset(), m.len(), &m)
    } else {
        m
    }
}

/// Try `id` against the input after `previous`, returning its match or
/// `None`. The caller's cursor is untouched on failure.
pub(crate) fn try_match(
    grammar: &Grammar,
    scanner: &mut Scanner,
    id: ParserId,
    previous: &Rc<ParserMatch>,
    allow_advance: bool,
) -> Option<Rc<ParserMatch>> {
    let result = try_match_inner(grammar, scanner, id, previous, allow_advance);
    if let Some(m) = &result {
        if let Some(tag) = grammar.tag_of(id) {
            scanner.note_tagged_success(tag, m.right());
        }
    }
    result
}

#[allow(clippy::too_many_lines)]
fn try_match_inner(
    grammar: &Grammar,
    scanner: &mut Scanner,
    id: ParserId,
    previous: &Rc<ParserMatch>,
    allow_advance: bool,
) -> Option<Rc<ParserMatch>> {
    let at = previous.right();
    match &grammar.node(id).kind {
        ParserKind::LiteralChar(expected) => {
            let width = u32::try_from(expected.len_utf8()).unwrap_or(1);
            match scanner.peek(at) {
                Some(c) if c == *expected => Some(scanner.create_match(id, at, width, previous)),
                _ => scanner.no_match(id, at, width),
            }
        }

        ParserKind::LiteralStr {
            text,
            case_sensitive,
        } => {
            let width = u32::try_from(text.len()).unwrap_or(u32::MAX);
            let window = scanner.substring(at, width);
            let hit = if *case_sensitive {
                window == text.as_str()
            } else {
                window.len() == text.len() && window.eq_ignore_ascii_case(text.as_str())
            };
            if hit {
                Some(scanner.create_match(id, at, width, previous))
            } else {
                scanner.no_match(id, at, width)
            }
        }

        ParserKind::CharClass(class) => match scanner.peek(at) {
            Some(c) if class.contains(c) => {
                let width = u32::try_from(c.len_utf8()).unwrap_or(1);
                Some(scanner.create_match(id, at, width, previous))
            }
            _ => scanner.no_match(id, at, 1),
        },

        ParserKind::AnyChar => match scanner.peek(at) {
            Some(c) => {
                let width = u32::try_from(c.len_utf8()).unwrap_or(1);
                Some(scanner.create_match(id, at, width, previous))
            }
            None => scanner.no_match(id, at, 1),
        },

        ParserKind::EndOfInput => {
            if scanner.end_of_input(at) {
                Some(scanner.empty_match(id, at, previous))
            } else {
                scanner.no_match(id, at, 0)
            }
        }

        ParserKind::Empty => Some(scanner.empty_match(id, at, previous)),

        ParserKind::Regex { compiled, .. } => {
            // Compiled as \A(?:pattern): anchored to the cursor slice.
            match compiled.find(scanner.rest(at)) {
                Some(found) => {
                    let width = u32::try_from(found.end()).unwrap_or(u32::MAX);
                    Some(scanner.create_match(id, at, width, previous))
                }
                None => scanner.no_match(id, at, 1),
            }
        }

        ParserKind::Remaining { min, max } => {
            let remaining = scanner.len().saturating_sub(at);
            let fits = remaining >= *min && max.map_or(true, |max| remaining <= max);
            if fits {
                Some(scanner.create_match(id, at, remaining, previous))
            } else {
                scanner.no_match(id, at, *min)
            }
        }

        ParserKind::Seq(children) => {
            let mut cursor = previous.clone();
            let mut span_start: Option<u32> = None;
            for child in children.clone() {
                let stepped = seam(grammar, scanner, &cursor, allow_advance);
                let m = try_match(grammar, scanner, child, &stepped, allow_advance)?;
                if span_start.is_none() {
                    span_start = Some(m.offset());
                }
                cursor = m;
            }
            let start = span_start.unwrap_or(at);
            Some(scanner.create_match(id, start, cursor.right() - start, &cursor))
        }

        ParserKind::Choice(children) => {
            let stepped = seam(grammar, scanner, previous, allow_advance);
            for child in children.clone() {
                if let Some(m) = try_match(grammar, scanner, child, &stepped, allow_advance) {
                    return Some(adopt(grammar, scanner, id, m));
                }
            }
            None
        }

        ParserKind::Exclusive(a, b) => {
            let (a, b) = (*a, *b);
            let stepped = seam(grammar, scanner, previous, allow_advance);
            let left = try_match(grammar, scanner, a, &stepped, allow_advance);
            let right = try_match(grammar, scanner, b, &stepped, allow_advance);
            match (left, right) {
                (Some(m), None) | (None, Some(m)) => Some(adopt(grammar, scanner, id, m)),
                (Some(_), Some(_)) => scanner.no_match(id, stepped.right(), 0),
                (None, None) => None,
            }
        }

        ParserKind::Intersect(a, b) => {
            let (a, b) = (*a, *b);
            let stepped = seam(grammar, scanner, previous, allow_advance);
            let left = try_match(grammar, scanner, a, &stepped, allow_advance)?;
            let right = try_match(grammar, scanner, b, &stepped, allow_advance)?;
            let start = left.offset().min(right.offset());
            let end = left.right().max(right.right());
            Some(scanner.create_match(id, start, end - start, &right))
        }

        ParserKind::Difference(a, b) => {
            let (a, b) = (*a, *b);
            let stepped = seam(grammar, scanner, previous, allow_advance);
            let kept = try_match(grammar, scanner, a, &stepped, allow_advance)?;
            match try_match(grammar, scanner, b, &stepped, allow_advance) {
                Some(_) => scanner.no_match(id, stepped.right(), 0),
                None => Some(adopt(grammar, scanner, id, kept)),
            }
        }

        ParserKind::Repeat { inner, min, max } => {
            let (inner, min, max) = (*inner, *min, *max);
            let mut cursor = previous.clone();
            let mut span_start: Option<u32> = None;
            let mut count = 0u32;
            while max.map_or(true, |max| count < max) {
                let stepped = seam(grammar, scanner, &cursor, allow_advance);
                let Some(m) = try_match(grammar, scanner, inner, &stepped, allow_advance) else {
                    break;
                };
                // No-progress guard: a zero-width match that leaves the
                // cursor where the previous iteration left it would repeat
                // forever.
                let stalled = m.is_empty() && m.right() == cursor.right();
                if span_start.is_none() {
                    span_start = Some(m.offset());
                }
                cursor = m;
                count += 1;
                if stalled {
                    break;
                }
            }
            if count < min {
                return scanner.no_match(id, at, 0);
            }
            let start = span_start.unwrap_or(at);
            Some(scanner.create_match(id, start, cursor.right() - start, &cursor))
        }

        ParserKind::DelimitedList { item, separator } => {
            let (item, separator) = (*item, *separator);
            let stepped = seam(grammar, scanner, previous, allow_advance);
            let first = try_match(grammar, scanner, item, &stepped, allow_advance)?;
            let start = first.offset();
            let mut cursor = first;
            loop {
                let sep_at = seam(grammar, scanner, &cursor, allow_advance);
                let Some(sep) = try_match(grammar, scanner, separator, &sep_at, allow_advance)
                else {
                    break;
                };
                let item_at = seam(grammar, scanner, &sep, allow_advance);
                let Some(m) = try_match(grammar, scanner, item, &item_at, allow_advance) else {
                    // Trailing separator: rewind to just after the last item.
                    break;
                };
                if m.right() == cursor.right() {
                    break;
                }
                cursor = m;
            }
            Some(scanner.create_match(id, start, cursor.right() - start, &cursor))
        }

        ParserKind::TerminatedList { item, terminator } => {
            let (item, terminator) = (*item, *terminator);
            let mut cursor = previous.clone();
            let mut span_start: Option<u32> = None;
            let mut pairs = 0u32;
            loop {
                let item_at = seam(grammar, scanner, &cursor, allow_advance);
                let Some(m) = try_match(grammar, scanner, item, &item_at, allow_advance) else {
                    break;
                };
                let term_at = seam(grammar, scanner, &m, allow_advance);
                let Some(term) = try_match(grammar, scanner, terminator, &term_at, allow_advance)
                else {
                    // Dangling item: rewind to the end of the last full pair.
                    break;
                };
                if term.right() == cursor.right() {
                    break;
                }
                if span_start.is_none() {
                    span_start = Some(m.offset());
                }
                cursor = term;
                pairs += 1;
            }
            if pairs == 0 {
                return scanner.no_match(id, at, 0);
            }
            let start = span_start.unwrap_or(at);
            Some(scanner.create_match(id, start, cursor.right() - start, &cursor))
        }

        ParserKind::Forward(target) => {
            let target = target.expect("validated at build: forward is assigned");
            let source = previous.parser();
            if !scanner.enter_recursion(id, at, source) {
                // Re-entered at the same position from the same source:
                // unguarded recursion, fail this path.
                return scanner.no_match(id, at, 0);
            }
            let result = try_match(grammar, scanner, target, previous, allow_advance);
            scanner.exit_recursion(id, at, source);
            match result {
                Some(m) if Rc::ptr_eq(&m, previous) => scanner.no_match(id, at, 0),
                Some(m) => Some(adopt(grammar, scanner, id, m)),
                None => None,
            }
        }
    }
}
