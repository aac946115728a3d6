//! End-to-end arithmetic: parse, scope tree, pivot rewrite, evaluate.

use pegmatch::{
    CharClass, Grammar, GrammarBuilder, ParseOptions, ParseResult, ScopeKind, ScopeNodeId,
    ScopeNodeKind, ScopeTree,
};

/// `expr = term ((+|-) term)*; term = power ((*|/) power)*;
/// power = factor (^ factor)?; factor = number | '(' expr ')'`
///
/// Operators are tagged `Operation` and pivot-scoped; numbers are tagged
/// `Value`; parentheses open and close scopes.
fn arithmetic() -> (Grammar, ParseOptions) {
    let mut b = GrammarBuilder::new();
    let ws_char = b.char_class(CharClass::whitespace());
    let ws = b.one_or_more(ws_char);

    let expr = b.forward();

    let number = b.regex(r"-?[0-9]+(?:\.[0-9]+)?").unwrap();
    let number = b.tag(number, "Value");

    let lparen = b.literal_char('(');
    let lparen = b.scope(lparen, ScopeKind::Open);
    let rparen = b.literal_char(')');
    let rparen = b.scope(rparen, ScopeKind::Close);
    let group = b.seq([lparen, expr, rparen]);
    let factor = b.choice([number, group]);

    let op = |b: &mut GrammarBuilder, c: char| {
        let id = b.literal_char(c);
        let id = b.tag(id, "Operation");
        b.scope(id, ScopeKind::Pivot)
    };

    let caret = op(&mut b, '^');
    let pow_tail = b.seq([caret, factor]);
    let pow_tail = b.opt(pow_tail);
    let power = b.seq([factor, pow_tail]);

    let star = op(&mut b, '*');
    let slash = op(&mut b, '/');
    let mul_op = b.choice([star, slash]);
    let term_step = b.seq([mul_op, power]);
    let term_tail = b.zero_or_more(term_step);
    let term = b.seq([power, term_tail]);

    let plus = op(&mut b, '+');
    let minus = op(&mut b, '-');
    let add_op = b.choice([plus, minus]);
    let expr_step = b.seq([add_op, term]);
    let expr_tail = b.zero_or_more(expr_step);
    let expr_body = b.seq([term, expr_tail]);
    b.assign(expr, expr_body).unwrap();

    let eoi = b.end_of_input();
    let root = b.seq([expr, eoi]);

    let grammar = b.build(root).unwrap();
    let options = ParseOptions {
        auto_advance: Some(ws),
        ..ParseOptions::default()
    };
    (grammar, options)
}

fn eval_node(tree: &ScopeTree, result: &ParseResult<'_>, id: ScopeNodeId) -> f64 {
    let node = tree.node(id);
    match node.kind() {
        ScopeNodeKind::Root => {
            assert_eq!(node.children().len(), 1, "root should hold one expression");
            eval_node(tree, result, node.children()[0])
        }
        ScopeNodeKind::Data => result
            .text_of(node.data_match().expect("data node has a match"))
            .parse()
            .expect("value parses as f64"),
        ScopeNodeKind::ScopeChange => match node.data_match() {
            Some(op) => {
                assert_eq!(node.children().len(), 2, "pivot folds two operands");
                let lhs = eval_node(tree, result, node.children()[0]);
                let rhs = eval_node(tree, result, node.children()[1]);
                match result.text_of(op) {
                    "+" => lhs + rhs,
                    "-" => lhs - rhs,
                    "*" => lhs * rhs,
                    "/" => lhs / rhs,
                    "^" => lhs.powf(rhs),
                    other => panic!("unexpected operator {other:?}"),
                }
            }
            None => {
                assert_eq!(node.children().len(), 1, "group wraps one expression");
                eval_node(tree, result, node.children()[0])
            }
        },
    }
}

fn eval(input: &str) -> f64 {
    let (grammar, options) = arithmetic();
    let result = grammar.parse_str(input, options);
    assert!(
        result.is_success(),
        "parse of {input:?} failed: {:?}",
        result.failures(0, true)
    );
    let tree = result.scope_tree();
    eval_node(&tree, &result, tree.root())
}

#[test]
fn test_parenthesized_precedence() {
    assert!((eval("(6.5 + 3) * (2 - 5.5)") - -33.25).abs() < 1e-9);
}

#[test]
fn test_exponent() {
    assert!((eval("2^(1+3)") - 16.0).abs() < 1e-9);
}

#[test]
fn test_negative_literal() {
    assert!((eval("-2.71828182") - -2.718_281_82).abs() < 1e-9);
}

#[test]
fn test_chained_same_precedence_is_left_associative() {
    assert!((eval("10 - 4 - 3") - 3.0).abs() < 1e-9);
    assert!((eval("100 / 5 / 2") - 10.0).abs() < 1e-9);
}

#[test]
fn test_token_stream_order() {
    let (grammar, options) = arithmetic();
    let result = grammar.parse_str("(6.5 + 3) * 2", options);
    let tokens = result.tokens();
    let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
    assert_eq!(texts, vec!["6.5", "+", "3", "*", "2"]);
    let tags: Vec<&str> = tokens.iter().map(|t| t.tag.as_str()).collect();
    assert_eq!(
        tags,
        vec!["Value", "Operation", "Value", "Operation", "Value"]
    );
}

#[test]
fn test_whole_input_is_spanned() {
    let (grammar, options) = arithmetic();
    let input = "(6.5 + 3) * (2 - 5.5)";
    let result = grammar.parse_str(input, options);
    let root = result.root_match();
    assert_eq!(root.offset(), 0);
    assert_eq!(root.right() as usize, input.len());
}

#[test]
fn test_malformed_input_fails_with_diagnostics() {
    let (grammar, options) = arithmetic();
    let result = grammar.parse_str("(1 + ", options);
    assert!(!result.is_success());
    assert!(!result.failures(0, false).is_empty());
}
