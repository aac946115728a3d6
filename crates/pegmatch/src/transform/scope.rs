//! Scope hierarchies.
//!
//! A small state machine walks the match chain, filtered to matches that
//! carry tag or scope metadata, and folds it into a tree of scopes: `Open`
//! descends, `Close` ascends, `Enclosed` opens a self-closed scope bounded
//! by its own right edge, and everything else lands as a data child of the
//! current scope. A post-pass then rewrites `Pivot` children into scope
//! nodes of their own, re-rooting their siblings around them so operator
//! chains come out left-folded.
//!
//! Nodes live in an arena owned by [`ScopeTree`]; parent, child, and peer
//! relations are [`ScopeNodeId`] indices.

use std::rc::Rc;

use smallvec::SmallVec;

use crate::grammar::{Grammar, ScopeKind};
use crate::matching::ParserMatch;

/// Handle to a node in a [`ScopeTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeNodeId(u32);

impl ScopeNodeId {
    const ROOT: Self = Self(0);

    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeNodeKind {
    Root,
    /// A plain tagged match.
    Data,
    /// A scope opened by `Open`/`Enclosed` metadata, or created by the
    /// pivot rewrite.
    ScopeChange,
}

/// One node of the scope hierarchy.
#[derive(Debug, Clone)]
pub struct ScopeNode {
    kind: ScopeNodeKind,
    data: Option<Rc<ParserMatch>>,
    opening: Option<Rc<ParserMatch>>,
    closing: Option<Rc<ParserMatch>>,
    parent: Option<ScopeNodeId>,
    children: Vec<ScopeNodeId>,
}

impl ScopeNode {
    fn new(kind: ScopeNodeKind, parent: Option<ScopeNodeId>) -> Self {
        Self {
            kind,
            data: None,
            opening: None,
            closing: None,
            parent,
            children: Vec::new(),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ScopeNodeKind {
        self.kind
    }

    /// The match this node was made from: the tagged match of a data node,
    /// or the pivot match of a rewritten scope.
    #[must_use]
    pub const fn data_match(&self) -> Option<&Rc<ParserMatch>> {
        self.data.as_ref()
    }

    #[must_use]
    pub const fn opening_match(&self) -> Option<&Rc<ParserMatch>> {
        self.opening.as_ref()
    }

    #[must_use]
    pub const fn closing_match(&self) -> Option<&Rc<ParserMatch>> {
        self.closing.as_ref()
    }

    #[must_use]
    pub const fn parent(&self) -> Option<ScopeNodeId> {
        self.parent
    }

    #[must_use]
    pub fn children(&self) -> &[ScopeNodeId] {
        &self.children
    }

    /// A scope that was opened but never closed.
    #[must_use]
    pub fn is_unbalanced(&self) -> bool {
        self.opening.is_some() && self.closing.is_none()
    }
}

/// The scope hierarchy of one parse.
pub struct ScopeTree {
    nodes: Vec<ScopeNode>,
}

impl ScopeTree {
    fn new() -> Self {
        Self {
            nodes: vec![ScopeNode::new(ScopeNodeKind::Root, None)],
        }
    }

    #[must_use]
    pub const fn root(&self) -> ScopeNodeId {
        ScopeNodeId::ROOT
    }

    #[must_use]
    pub fn node(&self, id: ScopeNodeId) -> &ScopeNode {
        &self.nodes[id.index()]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The peer immediately before `id` in its parent's child list.
    #[must_use]
    pub fn prev_peer(&self, id: ScopeNodeId) -> Option<ScopeNodeId> {
        let parent = self.node(id).parent?;
        let peers = self.node(parent).children();
        let at = peers.iter().position(|&p| p == id)?;
        at.checked_sub(1).map(|i| peers[i])
    }

    /// The peer immediately after `id` in its parent's child list.
    #[must_use]
    pub fn next_peer(&self, id: ScopeNodeId) -> Option<ScopeNodeId> {
        let parent = self.node(id).parent?;
        let peers = self.node(parent).children();
        let at = peers.iter().position(|&p| p == id)?;
        peers.get(at + 1).copied()
    }

    /// Scopes that were opened but never closed, in depth-first order.
    #[must_use]
    pub fn unbalanced(&self) -> Vec<ScopeNodeId> {
        let mut out = Vec::new();
        self.walk(self.root(), &mut |id, node| {
            if node.is_unbalanced() {
                out.push(id);
            }
        });
        out
    }

    /// Data nodes in depth-first order; their matches reproduce the tagged
    /// token stream of the chain.
    #[must_use]
    pub fn data_nodes(&self) -> Vec<ScopeNodeId> {
        let mut out = Vec::new();
        self.walk(self.root(), &mut |id, node| {
            if node.kind == ScopeNodeKind::Data {
                out.push(id);
            }
        });
        out
    }

    /// Depth-first pre-order walk from `from`.
    pub fn walk(&self, from: ScopeNodeId, visit: &mut impl FnMut(ScopeNodeId, &ScopeNode)) {
        visit(from, self.node(from));
        for child in self.node(from).children.clone() {
            self.walk(child, visit);
        }
    }

    fn push(&mut self, kind: ScopeNodeKind, parent: ScopeNodeId) -> ScopeNodeId {
        let id = ScopeNodeId(u32::try_from(self.nodes.len()).unwrap_or(u32::MAX));
        self.nodes.push(ScopeNode::new(kind, Some(parent)));
        self.nodes[parent.index()].children.push(id);
        id
    }

    fn node_mut(&mut self, id: ScopeNodeId) -> &mut ScopeNode {
        &mut self.nodes[id.index()]
    }
}

/// Build the scope hierarchy for the chain ending at `root`, including the
/// pivot rewrite.
pub(crate) fn build_scope_tree(grammar: &Grammar, root: &Rc<ParserMatch>) -> ScopeTree {
    let mut tree = ScopeTree::new();
    let mut cursor = tree.root();
    // Right edges of enclosed scopes still accepting events, innermost last.
    let mut scope_ends: SmallVec<[(u32, ScopeNodeId); 4]> = SmallVec::new();

    if !root.is_match() {
        return tree;
    }

    for m in root.chain() {
        if !m.is_match() || m.is_empty() || m.is_skipped() {
            continue;
        }
        let Some(parser) = m.parser() else {
            continue;
        };
        let tag = grammar.tag_of(parser);
        let scope = grammar.scope_of(parser);
        if tag.is_none() && scope.is_none() {
            continue;
        }

        // Leave enclosed scopes this event no longer fits in.
        while let Some(&(end, node)) = scope_ends.last() {
            if m.right() > end {
                scope_ends.pop();
                if cursor == node {
                    cursor = tree.node(node).parent().unwrap_or(ScopeNodeId::ROOT);
                }
            } else {
                break;
            }
        }

        match scope {
            None | Some(ScopeKind::Pivot) => {
                let id = tree.push(ScopeNodeKind::Data, cursor);
                tree.node_mut(id).data = Some(m.clone());
            }
            Some(ScopeKind::Open) => {
                let id = tree.push(ScopeNodeKind::ScopeChange, cursor);
                tree.node_mut(id).opening = Some(m.clone());
                cursor = id;
            }
            Some(ScopeKind::Close) => {
                // A close with no open to match is dropped.
                if let Some(parent) = tree.node(cursor).parent() {
                    if tree.node(cursor).closing.is_none() {
                        tree.node_mut(cursor).closing = Some(m.clone());
                    }
                    cursor = parent;
                }
            }
            Some(ScopeKind::Enclosed) => {
                let id = tree.push(ScopeNodeKind::ScopeChange, cursor);
                tree.node_mut(id).opening = Some(m.clone());
                tree.node_mut(id).closing = Some(m.clone());
                cursor = id;
                scope_ends.push((m.right(), id));
            }
        }
    }

    rewrite_pivots(grammar, &mut tree, ScopeNodeId::ROOT);
    tree
}

/// Depth-first pivot rewrite: within each parent, a pivot child becomes a
/// scope node owning everything accumulated since the previous pivot, and
/// then everything up to the next one. Repeated pivots therefore fold left.
fn rewrite_pivots(grammar: &Grammar, tree: &mut ScopeTree, at: ScopeNodeId) {
    for child in tree.node(at).children.clone() {
        rewrite_pivots(grammar, tree, child);
    }

    let children = std::mem::take(&mut tree.node_mut(at).children);
    let has_pivot = children.iter().any(|&c| is_pivot(grammar, tree, c));
    if !has_pivot {
        tree.node_mut(at).children = children;
        return;
    }

    let mut result: Vec<ScopeNodeId> = Vec::new();
    let mut current: Option<ScopeNodeId> = None;
    for child in children {
        if is_pivot(grammar, tree, child) {
            tree.node_mut(child).kind = ScopeNodeKind::ScopeChange;
            let mut absorbed = std::mem::take(&mut result);
            if let Some(open) = current.take() {
                absorbed.push(open);
            }
            for &taken in &absorbed {
                tree.node_mut(taken).parent = Some(child);
            }
            tree.node_mut(child).children = absorbed;
            current = Some(child);
        } else if let Some(open) = current {
            tree.node_mut(child).parent = Some(open);
            tree.node_mut(open).children.push(child);
        } else {
            result.push(child);
        }
    }
    if let Some(open) = current {
        result.push(open);
    }
    for &kept in &result {
        tree.node_mut(kept).parent = Some(at);
    }
    tree.node_mut(at).children = result;
}

fn is_pivot(grammar: &Grammar, tree: &ScopeTree, id: ScopeNodeId) -> bool {
    let node = tree.node(id);
    if node.kind != ScopeNodeKind::Data {
        return false;
    }
    node.data
        .as_ref()
        .and_then(|m| m.parser())
        .and_then(|p| grammar.scope_of(p))
        == Some(ScopeKind::Pivot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{GrammarBuilder, ScopeKind};
    use crate::scanner::ParseOptions;

    /// `(` opens, `)` closes, letters are tagged content.
    fn paren_grammar() -> crate::grammar::Grammar {
        let mut b = GrammarBuilder::new();
        let open = b.literal_char('(');
        let open = b.scope(open, ScopeKind::Open);
        let close = b.literal_char(')');
        let close = b.scope(close, ScopeKind::Close);
        let letter = b.char_range('a', 'z');
        let letter = b.tag(letter, "letter");
        let any = b.choice([open, close, letter]);
        let all = b.zero_or_more(any);
        b.build(all).unwrap()
    }

    #[test]
    fn test_nested_scopes() {
        let grammar = paren_grammar();
        let result = grammar.parse_str("(a(b)c)", ParseOptions::default());
        assert!(result.is_success());
        let tree = result.scope_tree();

        let root = tree.root();
        assert_eq!(tree.node(root).children().len(), 1);
        let outer = tree.node(root).children()[0];
        let outer_node = tree.node(outer);
        assert_eq!(outer_node.kind(), ScopeNodeKind::ScopeChange);
        assert!(outer_node.opening_match().is_some());
        assert!(outer_node.closing_match().is_some());
        assert!(!outer_node.is_unbalanced());

        // a, (b), c
        assert_eq!(outer_node.children().len(), 3);
        let inner = outer_node.children()[1];
        assert_eq!(tree.node(inner).kind(), ScopeNodeKind::ScopeChange);
        assert_eq!(tree.node(inner).children().len(), 1);
        assert_eq!(tree.node(inner).parent(), Some(outer));
    }

    #[test]
    fn test_unbalanced_open_is_reported() {
        let grammar = paren_grammar();
        let result = grammar.parse_str("((a(b)c)", ParseOptions::default());
        assert!(result.is_success());
        let tree = result.scope_tree();
        let unbalanced = tree.unbalanced();
        assert_eq!(unbalanced.len(), 1);
        let node = tree.node(unbalanced[0]);
        assert!(node.opening_match().is_some());
        assert!(node.closing_match().is_none());
    }

    #[test]
    fn test_extra_close_is_dropped() {
        let grammar = paren_grammar();
        let result = grammar.parse_str("a)b", ParseOptions::default());
        assert!(result.is_success());
        let tree = result.scope_tree();
        // Both letters end up under the root; the stray close is ignored.
        assert_eq!(tree.data_nodes().len(), 2);
        assert!(tree.unbalanced().is_empty());
    }

    #[test]
    fn test_data_nodes_match_token_stream() {
        let grammar = paren_grammar();
        let result = grammar.parse_str("(a(b)c)d", ParseOptions::default());
        let tree = result.scope_tree();
        let scope_texts: Vec<String> = tree
            .data_nodes()
            .iter()
            .map(|&id| {
                let m = tree.node(id).data_match().unwrap();
                result.text_of(m).to_string()
            })
            .collect();
        let token_texts: Vec<String> = result
            .tokens()
            .iter()
            .map(|t| t.text.to_string())
            .collect();
        assert_eq!(scope_texts, token_texts);
        assert_eq!(scope_texts, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_peer_links() {
        let grammar = paren_grammar();
        let result = grammar.parse_str("abc", ParseOptions::default());
        let tree = result.scope_tree();
        let data = tree.data_nodes();
        assert_eq!(data.len(), 3);
        assert_eq!(tree.prev_peer(data[0]), None);
        assert_eq!(tree.next_peer(data[0]), Some(data[1]));
        assert_eq!(tree.prev_peer(data[2]), Some(data[1]));
        assert_eq!(tree.next_peer(data[2]), None);
    }

    #[test]
    fn test_pivot_rewrite_left_folds() {
        let mut b = GrammarBuilder::new();
        let digit = b.char_range('0', '9');
        let digit = b.tag(digit, "value");
        let plus = b.literal_char('+');
        let plus = b.tag(plus, "op");
        let plus = b.scope(plus, ScopeKind::Pivot);
        let any = b.choice([digit, plus]);
        let all = b.zero_or_more(any);
        let grammar = b.build(all).unwrap();

        let result = grammar.parse_str("1+2+3", ParseOptions::default());
        let tree = result.scope_tree();
        let root = tree.root();
        assert_eq!(tree.node(root).children().len(), 1);

        // Outermost pivot is the second '+': children are the first pivot
        // and the trailing digit.
        let top = tree.node(root).children()[0];
        let top_node = tree.node(top);
        assert_eq!(top_node.kind(), ScopeNodeKind::ScopeChange);
        assert_eq!(top_node.children().len(), 2);
        let first = tree.node(top_node.children()[0]);
        assert_eq!(first.kind(), ScopeNodeKind::ScopeChange);
        assert_eq!(first.children().len(), 2);
        let last = tree.node(top_node.children()[1]);
        assert_eq!(last.kind(), ScopeNodeKind::Data);
    }

    #[test]
    fn test_enclosed_scope_is_self_closed() {
        let mut b = GrammarBuilder::new();
        let quoted = b.regex("\"[^\"]*\"").unwrap();
        let quoted = b.tag(quoted, "string");
        let quoted = b.scope(quoted, ScopeKind::Enclosed);
        let letter = b.char_range('a', 'z');
        let letter = b.tag(letter, "letter");
        let any = b.choice([quoted, letter]);
        let all = b.zero_or_more(any);
        let grammar = b.build(all).unwrap();

        let result = grammar.parse_str("a\"bc\"d", ParseOptions::default());
        assert!(result.is_success());
        let tree = result.scope_tree();
        let root_children = tree.node(tree.root()).children().to_vec();
        assert_eq!(root_children.len(), 3);
        let enclosed = tree.node(root_children[1]);
        assert_eq!(enclosed.kind(), ScopeNodeKind::ScopeChange);
        assert!(enclosed.opening_match().is_some());
        assert!(enclosed.closing_match().is_some());
        assert!(!enclosed.is_unbalanced());
        // The following letter falls outside the enclosed scope.
        let after = tree.node(root_children[2]);
        assert_eq!(after.kind(), ScopeNodeKind::Data);
    }
}
