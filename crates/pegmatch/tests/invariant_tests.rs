//! Universal invariants that hold for every successful parse.

use pegmatch::{CharClass, Grammar, GrammarBuilder, ParseOptions, ScopeKind};

fn word_list() -> (Grammar, ParseOptions) {
    let mut b = GrammarBuilder::new();
    let ws_char = b.char_class(CharClass::whitespace());
    let ws = b.one_or_more(ws_char);
    let word = b.regex("[a-z]+").unwrap();
    let word = b.tag(word, "word");
    let comma = b.literal_char(',');
    let list = b.delimited(word, comma);
    let eoi = b.end_of_input();
    let root = b.seq([list, eoi]);
    let grammar = b.build(root).unwrap();
    let options = ParseOptions {
        auto_advance: Some(ws),
        ..ParseOptions::default()
    };
    (grammar, options)
}

#[test]
fn test_match_positions_stay_inside_input() {
    let (grammar, options) = word_list();
    let input = "one, two ,three";
    let result = grammar.parse_str(input, options);
    assert!(result.is_success());
    for m in result.root_match().chain() {
        assert!(m.offset() <= m.right());
        assert!(m.right() as usize <= input.len());
    }
}

#[test]
fn test_chain_starts_at_zero_and_never_retreats() {
    let (grammar, options) = word_list();
    let result = grammar.parse_str("one, two", options);
    let chain = result.root_match().chain();
    assert_eq!(chain[0].offset(), 0);
    assert!(chain[0].previous().is_none());
    let mut cursor = 0;
    for m in &chain {
        assert!(
            m.right() >= cursor,
            "cursor went backwards: {} after {}",
            m.right(),
            cursor
        );
        cursor = m.right();
    }
}

#[test]
fn test_reparsing_is_idempotent() {
    let (grammar, options) = word_list();
    let first = grammar.parse_str("alpha,beta , gamma", options.clone());
    let second = grammar.parse_str("alpha,beta , gamma", options);
    assert_eq!(first.is_success(), second.is_success());
    assert_eq!(first.tokens(), second.tokens());
    assert_eq!(first.root_match().span(), second.root_match().span());
    assert_eq!(
        first.root_match().chain().len(),
        second.root_match().chain().len()
    );
}

#[test]
fn test_scope_dfs_reproduces_token_stream() {
    // Without pivots, the in-order data nodes of the scope tree are exactly
    // the tagged token stream.
    let mut b = GrammarBuilder::new();
    let open = b.literal_char('{');
    let open = b.scope(open, ScopeKind::Open);
    let close = b.literal_char('}');
    let close = b.scope(close, ScopeKind::Close);
    let item = b.char_range('a', 'z');
    let item = b.tag(item, "item");
    let any = b.choice([open, close, item]);
    let all = b.zero_or_more(any);
    let grammar = b.build(all).unwrap();

    let result = grammar.parse_str("a{b{c}d}e", ParseOptions::default());
    assert!(result.is_success());
    let tree = result.scope_tree();
    let from_scopes: Vec<(u32, u32)> = tree
        .data_nodes()
        .iter()
        .map(|&id| {
            let m = tree.node(id).data_match().unwrap();
            (m.offset(), m.len())
        })
        .collect();
    let from_tokens: Vec<(u32, u32)> = result
        .tokens()
        .iter()
        .map(|t| (t.offset, t.length))
        .collect();
    assert_eq!(from_scopes, from_tokens);
}

#[test]
fn test_grammar_is_reusable_across_parses() {
    let (grammar, options) = word_list();
    assert!(grammar.parse_str("one", options.clone()).is_success());
    assert!(!grammar.parse_str("1", options.clone()).is_success());
    assert!(grammar.parse_str("two,three", options).is_success());
}

#[test]
fn test_failed_root_reports_failure_value() {
    let (grammar, options) = word_list();
    let result = grammar.parse_str("123", options);
    assert!(!result.is_success());
    let root = result.root_match();
    assert_eq!(root.length(), -1);
    assert_eq!(root.len(), 0);
}
