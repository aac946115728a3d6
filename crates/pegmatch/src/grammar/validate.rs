//! Build-time validation of the parser graph.
//!
//! Two analyses run over the arena before a grammar is produced: a
//! nullability fixpoint (which parsers can succeed without consuming input)
//! and a leftmost-reachability cycle check. A cycle through leftmost edges
//! means the grammar can re-enter a parser at the same position without
//! consuming anything, which a backtracking matcher cannot resolve.

use ahash::RandomState;
use hashbrown::HashSet;

use crate::error::GrammarError;
use crate::grammar::{ParserId, ParserKind, ParserNode};

/// Options that control grammar validation behavior.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationOptions {
    /// Skip left-recursion detection when true. Left-recursive grammars
    /// then rely on the parse-time re-entry guard, which fails the
    /// recursive path instead of recursing forever.
    pub allow_left_recursion: bool,
}

/// Compute, for every arena slot, whether the parser can match zero bytes.
///
/// Iterates to a fixpoint so forward references and mutual recursion settle.
pub(crate) fn compute_nullability(nodes: &[ParserNode]) -> Vec<bool> {
    let mut nullable = vec![false; nodes.len()];
    let mut changed = true;
    while changed {
        changed = false;
        for (index, node) in nodes.iter().enumerate() {
            if nullable[index] {
                continue;
            }
            let value = match &node.kind {
                ParserKind::Empty | ParserKind::EndOfInput => true,
                ParserKind::LiteralStr { text, .. } => text.is_empty(),
                ParserKind::Remaining { min, .. } => *min == 0,
                ParserKind::LiteralChar(_)
                | ParserKind::CharClass(_)
                | ParserKind::AnyChar
                | ParserKind::Regex { .. } => false,
                ParserKind::Seq(children) => {
                    children.iter().all(|c| nullable[c.index()])
                }
                ParserKind::Choice(children) => {
                    children.iter().any(|c| nullable[c.index()])
                }
                ParserKind::Exclusive(a, b) => {
                    nullable[a.index()] || nullable[b.index()]
                }
                ParserKind::Intersect(a, b) => {
                    nullable[a.index()] && nullable[b.index()]
                }
                ParserKind::Difference(a, _) => nullable[a.index()],
                ParserKind::Repeat { inner, min, .. } => {
                    *min == 0 || nullable[inner.index()]
                }
                ParserKind::DelimitedList { item, .. } => nullable[item.index()],
                ParserKind::TerminatedList { item, terminator } => {
                    nullable[item.index()] && nullable[terminator.index()]
                }
                ParserKind::Forward(target) => {
                    target.is_some_and(|t| nullable[t.index()])
                }
            };
            if value {
                nullable[index] = true;
                changed = true;
            }
        }
    }
    nullable
}

/// The children a parser can enter at its own start position without having
/// consumed input first.
fn leftmost_edges(kind: &ParserKind, nullable: &[bool]) -> Vec<ParserId> {
    match kind {
        ParserKind::Seq(children) => {
            let mut edges = Vec::new();
            for child in children {
                edges.push(*child);
                if !nullable[child.index()] {
                    break;
                }
            }
            edges
        }
        ParserKind::Choice(children) => children.to_vec(),
        ParserKind::Exclusive(a, b)
        | ParserKind::Intersect(a, b)
        | ParserKind::Difference(a, b) => vec![*a, *b],
        ParserKind::Repeat { inner, .. } => vec![*inner],
        ParserKind::DelimitedList { item, separator } => {
            if nullable[item.index()] {
                vec![*item, *separator]
            } else {
                vec![*item]
            }
        }
        ParserKind::TerminatedList { item, terminator } => {
            if nullable[item.index()] {
                vec![*item, *terminator]
            } else {
                vec![*item]
            }
        }
        ParserKind::Forward(target) => target.map(|t| vec![t]).unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Find a cycle in the leftmost-reachability graph, if any.
pub(crate) fn detect_left_recursion(
    nodes: &[ParserNode],
    nullable: &[bool],
) -> Option<Vec<ParserId>> {
    let mut finished: HashSet<ParserId, RandomState> =
        HashSet::with_hasher(RandomState::new());

    for start in 0..nodes.len() {
        let start = ParserId(u32::try_from(start).unwrap_or(u32::MAX));
        if finished.contains(&start) {
            continue;
        }
        let mut path: Vec<ParserId> = Vec::new();
        if let Some(cycle) = visit(start, nodes, nullable, &mut path, &mut finished) {
            return Some(cycle);
        }
    }
    None
}

fn visit(
    id: ParserId,
    nodes: &[ParserNode],
    nullable: &[bool],
    path: &mut Vec<ParserId>,
    finished: &mut HashSet<ParserId, RandomState>,
) -> Option<Vec<ParserId>> {
    if finished.contains(&id) {
        return None;
    }
    if let Some(position) = path.iter().position(|&p| p == id) {
        return Some(path[position..].to_vec());
    }
    path.push(id);
    for edge in leftmost_edges(&nodes[id.index()].kind, nullable) {
        if let Some(cycle) = visit(edge, nodes, nullable, path, finished) {
            return Some(cycle);
        }
    }
    path.pop();
    finished.insert(id);
    None
}

/// Validate the finished arena.
pub(crate) fn validate(
    nodes: &[ParserNode],
    nullable: &[bool],
    options: ValidationOptions,
) -> Result<(), GrammarError> {
    for (index, node) in nodes.iter().enumerate() {
        if let ParserKind::Forward(None) = &node.kind {
            return Err(GrammarError::UnassignedForward(ParserId(
                u32::try_from(index).unwrap_or(u32::MAX),
            )));
        }
    }

    if !options.allow_left_recursion {
        if let Some(cycle) = detect_left_recursion(nodes, nullable) {
            return Err(GrammarError::LeftRecursion(cycle));
        }
    }

    Ok(())
}
