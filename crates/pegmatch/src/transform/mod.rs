//! # Result Transforms
//!
//! Three projections of a finished match chain:
//!
//! - a flat [`Token`] stream of the tagged, non-empty matches;
//! - a parser-structural [`tree::TreeNode`], optionally pruned to tagged and
//!   scoped nodes;
//! - a [`scope::ScopeTree`] hierarchy driven by the tag/scope metadata,
//!   including the pivot rewrite for operator-style layouts.

pub mod scope;
pub mod tree;

use std::rc::Rc;

use compact_str::CompactString;

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

use crate::grammar::Grammar;
use crate::matching::ParserMatch;
use crate::scanner::Scanner;

/// A tagged match projected out of the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Token {
    pub tag: CompactString,
    /// Matched text from the transformed view.
    pub text: CompactString,
    pub offset: u32,
    pub length: u32,
}

/// Walk the chain in parse order and collect every tagged, non-empty,
/// non-skipped match.
pub(crate) fn collect_tokens(
    grammar: &Grammar,
    scanner: &Scanner,
    root: &Rc<ParserMatch>,
) -> Vec<Token> {
    root.chain()
        .into_iter()
        .filter(|m| m.is_match() && !m.is_empty() && !m.is_skipped())
        .filter_map(|m| {
            let parser = m.parser()?;
            let tag = grammar.tag_of(parser)?;
            Some(Token {
                tag: CompactString::new(tag),
                text: CompactString::new(m.text(scanner)),
                offset: m.offset(),
                length: m.len(),
            })
        })
        .collect()
}
