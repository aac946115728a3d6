//! Parser-structural trees.
//!
//! The match chain is a post-order walk of the successful parse: every
//! composite match is created after its children and spans them. Folding it
//! back into a tree is therefore a single pass with a pending stack — each
//! incoming composite match absorbs the trailing pending nodes its span
//! contains.

use std::rc::Rc;

use compact_str::CompactString;

use crate::grammar::Grammar;
use crate::matching::{ParserMatch, Span};
use crate::scanner::Scanner;

/// A node of the parser-shaped tree. Owns its children.
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub parser: Option<crate::grammar::ParserId>,
    pub tag: Option<CompactString>,
    pub span: Span,
    /// Matched text from the transformed view.
    pub text: CompactString,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// Depth-first pre-order walk over this node and its descendants.
    pub fn walk(&self, visit: &mut impl FnMut(&TreeNode)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }

    /// Number of nodes in this subtree.
    #[must_use]
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(TreeNode::size).sum::<usize>()
    }
}

/// Fold the chain ending at `root` into a tree. With `prune`, nodes whose
/// parser carries neither tag nor scope are collapsed into their children
/// (and dropped when they have none).
pub(crate) fn build_tree(
    grammar: &Grammar,
    scanner: &Scanner,
    root: &Rc<ParserMatch>,
    prune: bool,
) -> Option<TreeNode> {
    let mut pending: Vec<TreeNode> = Vec::new();

    for m in root.chain() {
        if !m.is_match() || m.is_skipped() {
            continue;
        }
        let Some(parser) = m.parser() else {
            continue;
        };
        let span = m.span();
        let mut children = Vec::new();
        if grammar.node(parser).kind.is_composite() {
            while let Some(last) = pending.last() {
                if span.contains(last.span) {
                    children.push(pending.pop().expect("checked non-empty"));
                } else {
                    break;
                }
            }
            children.reverse();
        }
        pending.push(TreeNode {
            parser: Some(parser),
            tag: grammar.tag_of(parser).map(CompactString::new),
            span,
            text: CompactString::new(scanner.substring(span.start, span.len())),
            children,
        });
    }

    let mut node = match pending.len() {
        0 => return None,
        1 => pending.pop().expect("checked length"),
        _ => {
            let span = Span::new(
                pending.first().map_or(0, |n| n.span.start),
                pending.last().map_or(0, |n| n.span.end),
            );
            TreeNode {
                parser: None,
                tag: None,
                span,
                text: CompactString::new(scanner.substring(span.start, span.len())),
                children: pending,
            }
        }
    };

    if prune {
        let mut pruned = prune_node(grammar, node);
        node = match pruned.len() {
            1 => pruned.pop().expect("one node"),
            _ => {
                // The root survives pruning so the tree keeps a single top.
                let span = Span::new(
                    pruned.first().map_or(0, |n| n.span.start),
                    pruned.last().map_or(0, |n| n.span.end),
                );
                TreeNode {
                    parser: None,
                    tag: None,
                    span,
                    text: CompactString::new(scanner.substring(span.start, span.len())),
                    children: pruned,
                }
            }
        };
    }

    Some(node)
}

/// Collapse `node` into its kept descendants unless it is tagged or scoped.
fn prune_node(grammar: &Grammar, node: TreeNode) -> Vec<TreeNode> {
    let TreeNode {
        parser,
        tag,
        span,
        text,
        children,
    } = node;
    let keep = tag.is_some() || parser.is_some_and(|p| grammar.scope_of(p).is_some());
    let children: Vec<TreeNode> = children
        .into_iter()
        .flat_map(|child| prune_node(grammar, child))
        .collect();
    if keep {
        vec![TreeNode {
            parser,
            tag,
            span,
            text,
            children,
        }]
    } else {
        children
    }
}
