//! Grammar behavior through the public entry points: the literal parse
//! scenarios, the operator-pair table check, options and diagnostics.

use tlafront_core::ast::{
    Builtin, Bullet, Expoint, ExprKind, Marker, Proof, StepKind, UnitKind,
};
use tlafront_core::ops::{Assoc, Fixity, OpDescriptor, OpTable};
use tlafront_core::span::Span;
use tlafront_core::{
    expr_to_string, module_to_string, parse_expr_str, parse_expression, parse_module,
    parse_module_str, ErrorKind, Expr, ParseOptions,
};

fn e(kind: ExprKind) -> Expr {
    Expr::new(kind, Span::unknown())
}

fn ident(name: &str) -> Expr {
    e(ExprKind::Ident(name.to_owned()))
}

fn head_of(d: &OpDescriptor) -> Expr {
    match d.builtin {
        Some(b) => e(ExprKind::Internal(b)),
        None => ident(d.name),
    }
}

fn apply(head: Expr, args: Vec<Expr>) -> Expr {
    e(ExprKind::Apply(Box::new(head), args))
}

fn parse(src: &str) -> Expr {
    parse_expr_str(src).unwrap_or_else(|d| panic!("{:?} failed: {}", src, d))
}

// ──────────────────────────────────────────────
// Scenarios
// ──────────────────────────────────────────────

#[test]
fn multiplication_nests_inside_addition() {
    let got = parse("1 + 2 * 3");
    let ExprKind::Apply(plus, args) = &got.node else {
        panic!("{:?}", got.node)
    };
    assert_eq!(plus.node, ExprKind::Internal(Builtin::Plus));
    assert!(matches!(&args[0].node, ExprKind::Num(_)));
    let ExprKind::Apply(times, _) = &args[1].node else {
        panic!("{:?}", args[1].node)
    };
    assert_eq!(times.node, ExprKind::Internal(Builtin::Mult));
}

#[test]
fn inline_conjunction_and_disjunction_lean_left() {
    let got = parse("TRUE /\\ FALSE \\/ TRUE");
    let t = || e(ExprKind::Bool(true));
    let conj = apply(e(ExprKind::Internal(Builtin::Conj)), vec![t(), e(ExprKind::Bool(false))]);
    let want = apply(e(ExprKind::Internal(Builtin::Disj)), vec![conj, t()]);
    assert_eq!(got, want);
}

#[test]
fn two_line_bullet_list_is_one_node() {
    let got = parse("/\\ x = 1\n/\\ y = 2");
    let ExprKind::List(Bullet::And, items) = &got.node else {
        panic!("{:?}", got.node)
    };
    assert_eq!(items.len(), 2);
    assert_eq!(items[0], parse("x = 1"));
    assert_eq!(items[1], parse("y = 2"));
}

#[test]
fn except_keeps_both_trailers() {
    let got = parse("[f EXCEPT ![1] = 2, !.g = 3]");
    let ExprKind::Except(_, specs) = &got.node else {
        panic!("{:?}", got.node)
    };
    assert_eq!(specs.len(), 2);
    assert!(matches!(&specs[0].path[..], [Expoint::Index(ix)] if ix.len() == 1));
    assert!(matches!(&specs[1].path[..], [Expoint::Dot(g)] if g.node == "g"));
}

#[test]
fn adjacent_atoms_report_missing_operator() {
    let err = parse_expr_str("1 2").unwrap_err();
    assert_eq!(err.kind, ErrorKind::AmbiguousOperatorSequence);
    assert!(err.mentions("missing operator"), "{:?}", err);
    assert_eq!((err.span.start.col, err.span.end.col), (2, 3));
}

#[test]
fn proof_steps_share_level_one() {
    let src = "---- MODULE P ----\n\
               THEOREM TRUE\n\
               <1>1. TRUE\n\
               <1>2. TRUE\n\
               <1> QED\n\
               ====\n";
    let m = parse_module_str(src).unwrap();
    let UnitKind::Theorem { proof, .. } = &m.units[0].node else {
        panic!("{:?}", m.units[0].node)
    };
    let Proof::Steps(steps, qed) = proof else {
        panic!("{:?}", proof)
    };
    assert_eq!(steps.len(), 2);
    assert!(steps
        .iter()
        .all(|s| s.node.number.level == 1 && matches!(s.node.kind, StepKind::Assert(..))));
    assert_eq!(qed.node.number.level, 1);
    assert_eq!(qed.node.number.marker, Marker::Num(1));
}

// ──────────────────────────────────────────────
// Operator pairs
// ──────────────────────────────────────────────

fn infix_descriptors() -> Vec<&'static OpDescriptor> {
    OpTable::global()
        .descriptors()
        .iter()
        .filter(|d| matches!(d.fixity, Fixity::Infix(_)))
        .collect()
}

fn assoc(d: &OpDescriptor) -> Assoc {
    match d.fixity {
        Fixity::Infix(a) => a,
        _ => Assoc::Non,
    }
}

/// `Some(true)` when `x a y b z` groups as `(x a y) b z`, `Some(false)` for
/// `x a (y b z)`, `None` for a precedence conflict.
fn groups_left(a: &OpDescriptor, b: &OpDescriptor) -> Option<bool> {
    if b.prec.below(&a.prec) {
        return Some(true);
    }
    if a.prec.below(&b.prec) {
        return Some(false);
    }
    match (assoc(a), assoc(b)) {
        (Assoc::Left, Assoc::Left) if a.prec == b.prec => Some(true),
        (Assoc::Right, Assoc::Right) if a.prec == b.prec => Some(false),
        _ => None,
    }
}

fn check_pair(a: &OpDescriptor, b: &OpDescriptor) {
    let src = format!("x {} y {} z", a.name, b.name);
    let got = parse_expr_str(&src);
    let cartesian = |d: &OpDescriptor| d.builtin == Some(Builtin::Cartesian);
    match groups_left(a, b) {
        Some(left) => {
            let got = got.unwrap_or_else(|d| panic!("{:?} failed: {}", src, d));
            let want = if cartesian(a) && cartesian(b) {
                apply(head_of(a), vec![ident("x"), ident("y"), ident("z")])
            } else if left {
                apply(
                    head_of(b),
                    vec![apply(head_of(a), vec![ident("x"), ident("y")]), ident("z")],
                )
            } else {
                apply(
                    head_of(a),
                    vec![ident("x"), apply(head_of(b), vec![ident("y"), ident("z")])],
                )
            };
            assert_eq!(got, want, "{:?}", src);
        }
        None => {
            let err = got.expect_err(&src);
            assert_eq!(err.kind, ErrorKind::AmbiguousOperatorSequence, "{:?}: {}", src, err);
        }
    }
}

#[test]
fn every_infix_pair_groups_by_precedence() {
    let ops = infix_descriptors();
    assert!(ops.len() > 60);
    for a in &ops {
        for b in &ops {
            check_pair(a, b);
        }
    }
}

#[test]
fn aliases_parse_to_the_canonical_head() {
    let table = OpTable::global();
    for d in infix_descriptors() {
        for spelling in table.spellings_of(d.name) {
            let got = parse(&format!("x {} y", spelling));
            assert_eq!(got, apply(head_of(d), vec![ident("x"), ident("y")]), "{}", spelling);
        }
    }
}

// ──────────────────────────────────────────────
// Options and diagnostics
// ──────────────────────────────────────────────

#[test]
fn source_name_flows_into_spans_and_json() {
    let opts = ParseOptions::named("Spec.tla");
    let err = parse_expression("a = b = c", &opts).unwrap_err();
    let json = err.to_json_value();
    assert_eq!(json["kind"], "ambiguous_operator_sequence");
    assert_eq!(json["source"], "Spec.tla");
    assert_eq!(json["line"], 1);
    assert!(json["messages"].as_array().is_some_and(|m| !m.is_empty()));
}

#[test]
fn depth_limit_rejects_before_parsing() {
    let opts = ParseOptions::default().with_max_depth(2);
    assert!(parse_expression("f[(x)]", &opts).is_ok());
    let err = parse_expression("f[((x))]", &opts).unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnexpectedToken);
    assert!(err.mentions("nesting too deep"));
}

#[test]
fn options_load_from_json() {
    let opts = ParseOptions::from_json(r#"{ "source_name": "M.tla", "skip_preamble": false }"#)
        .unwrap();
    assert!(parse_module("note\n---- MODULE M ----\n====\n", &opts).is_err());
    let m = parse_module("---- MODULE M ----\n====\n", &opts).unwrap();
    assert_eq!(m.span.source.as_deref(), Some("M.tla"));
}

#[test]
fn lexical_errors_become_diagnostics() {
    let err = parse_expr_str("x = \"open").unwrap_err();
    assert_eq!(err.kind, ErrorKind::Lexical);
    let err = parse_expr_str("x = 1 ?@ 2").unwrap_err();
    assert_eq!(err.kind, ErrorKind::Lexical);
}

#[test]
fn printed_module_parses_back() {
    let src = "---- MODULE Queue ----\n\
               EXTENDS Naturals, Sequences\n\
               CONSTANT N\n\
               VARIABLES q, sent\n\
               Init == q = <<>> /\\ sent = 0\n\
               Send(m) == /\\ Len(q) < N\n\
               \x20          /\\ q' = Append(q, m)\n\
               \x20          /\\ sent' = sent + 1\n\
               Recv == q /= <<>> /\\ q' = Tail(q) /\\ UNCHANGED sent\n\
               Next == (\\E m \\in 1..N : Send(m)) \\/ Recv\n\
               Spec == Init /\\ [][Next]_<<q, sent>> /\\ WF_<<q, sent>>(Recv)\n\
               THEOREM Spec => []TypeOK\n\
               ====\n";
    let first = parse_module_str(src).unwrap();
    let printed = module_to_string(&first);
    let second = parse_module_str(&printed).unwrap_or_else(|d| panic!("{}\n{}", printed, d));
    assert_eq!(first, second);
    assert_eq!(module_to_string(&second), printed);
}

#[test]
fn printed_expression_is_stable() {
    let once = expr_to_string(&parse("\\A x, y \\in S : x # y => f[x] \\cup {y} \\subseteq T"));
    let twice = expr_to_string(&parse(&once));
    assert_eq!(once, twice);
}
