#![no_main]
use libfuzzer_sys::fuzz_target;
use pegmatch::{CharClass, Grammar, GrammarBuilder, ParseOptions, ScopeKind};

/// A grammar touching every combinator family: lists, scopes, pivots,
/// repetition, and recursion, with whitespace auto-advance.
fn fuzz_grammar() -> (Grammar, ParseOptions) {
    let mut b = GrammarBuilder::new();
    let ws_char = b.char_class(CharClass::whitespace());
    let ws = b.one_or_more(ws_char);
    let expr = b.forward();

    let number = b.regex("[0-9]+").unwrap();
    let number = b.tag(number, "number");
    let word = b.regex("[a-z]+").unwrap();
    let word = b.tag(word, "word");
    let open = b.literal_char('(');
    let open = b.scope(open, ScopeKind::Open);
    let close = b.literal_char(')');
    let close = b.scope(close, ScopeKind::Close);
    let plus = b.literal_char('+');
    let plus = b.tag(plus, "op");
    let plus = b.scope(plus, ScopeKind::Pivot);

    let group = b.seq([open, expr, close]);
    let atom = b.choice([number, word, group]);
    let step = b.seq([plus, atom]);
    let tail = b.zero_or_more(step);
    let body = b.seq([atom, tail]);
    b.assign(expr, body).unwrap();

    let comma = b.literal_char(',');
    let list = b.delimited(expr, comma);
    let grammar = b.build(list).unwrap();
    let options = ParseOptions {
        auto_advance: Some(ws),
        ..ParseOptions::default()
    };
    (grammar, options)
}

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    let (grammar, options) = fuzz_grammar();
    let result = grammar.parse_str(input, options);
    if result.is_success() {
        let root = result.root_match();
        assert!(root.right() as usize <= input.len());
        let chain = root.chain();
        assert_eq!(chain[0].offset(), 0);
        let mut cursor = 0;
        for m in &chain {
            assert!(m.right() >= cursor);
            cursor = m.right();
        }
        let tree = result.scope_tree();
        assert!(tree.len() >= 1);
        let _ = result.tokens();
        let _ = result.tree(true);
    } else {
        let _ = result.failures(0, true);
    }
});
