//! Operator-precedence resolution over a stream of items.
//!
//! The caller supplies an item reader that, told whether the cursor sits
//! where a fresh operand may start, returns zero or more candidate items for
//! the next token(s). The resolver keeps an explicit stack of atoms and
//! pending operators and reduces it as operators arrive. A token with more
//! than one candidate reading forks the stack; the first fork that finishes
//! wins.

use super::{Reply, State, Visibility};
use crate::error::ErrorKind;
use crate::ops::{Assoc, Prec};
use crate::span::Span;

#[derive(Debug, Clone)]
pub enum Item<O, A> {
    Atom(A),
    Prefix(O, Prec),
    Postfix(O, Prec),
    Infix(O, Prec, Assoc),
}

/// Builds reduced atoms. `span` covers the operator and its operands.
pub trait Builder<O, A> {
    fn apply_prefix(&self, op: O, arg: A, span: Span) -> A;
    fn apply_postfix(&self, op: O, arg: A, span: Span) -> A;
    fn apply_infix(&self, op: O, lhs: A, rhs: A, span: Span) -> A;
}

#[derive(Debug, Clone)]
struct Entry<O, A> {
    item: Item<O, A>,
    span: Span,
}

impl<O, A> Entry<O, A> {
    /// Prefix and infix operators wait for an operand to their right.
    fn wants_operand(&self) -> bool {
        matches!(self.item, Item::Prefix(..) | Item::Infix(..))
    }
}

enum Action {
    Reduce,
    Shift,
    Conflict,
}

/// What to do with the operator `stacked` (below the top atom) when an
/// infix or postfix operator arrives.
fn decide<O, A>(stacked: &Item<O, A>, incoming: &Item<O, A>) -> Action {
    let (sp, ip) = match (prec_of(stacked), prec_of(incoming)) {
        (Some(s), Some(i)) => (s, i),
        _ => return Action::Conflict,
    };
    if ip.below(&sp) {
        return Action::Reduce;
    }
    if sp.below(&ip) {
        return Action::Shift;
    }
    match (stacked, incoming) {
        (Item::Infix(_, _, Assoc::Left), Item::Infix(_, _, Assoc::Left)) if sp == ip => {
            Action::Reduce
        }
        (Item::Infix(_, _, Assoc::Right), Item::Infix(_, _, Assoc::Right)) if sp == ip => {
            Action::Shift
        }
        // a postfix operator applies to the operand it follows
        (Item::Prefix(..), Item::Postfix(..)) => Action::Shift,
        _ => Action::Conflict,
    }
}

/// Outcome of `incoming` arriving after the operand of the pending
/// `stacked` operator: `Some(true)` reduces `stacked` first, `Some(false)`
/// stacks `incoming` on top of it, `None` is a precedence conflict.
pub fn reduces_first<O, A>(stacked: &Item<O, A>, incoming: &Item<O, A>) -> Option<bool> {
    match decide(stacked, incoming) {
        Action::Reduce => Some(true),
        Action::Shift => Some(false),
        Action::Conflict => None,
    }
}

fn prec_of<O, A>(item: &Item<O, A>) -> Option<Prec> {
    match item {
        Item::Prefix(_, p) | Item::Postfix(_, p) | Item::Infix(_, p, _) => Some(*p),
        Item::Atom(_) => None,
    }
}

/// Resolve one expression.
///
/// Failures from `items` that are backtrackable end the expression at the
/// token where they happened; committed ones propagate.
pub fn resolve<'t, U, O, A, B, I>(st: &mut State<'t, U>, builder: &B, items: &I) -> Reply<A>
where
    U: Clone + Visibility,
    O: Clone,
    A: Clone,
    B: Builder<O, A>,
    I: Fn(&mut State<'t, U>, bool) -> Reply<Vec<Item<O, A>>>,
{
    run(st, builder, items, Vec::new())
}

fn run<'t, U, O, A, B, I>(
    st: &mut State<'t, U>,
    builder: &B,
    items: &I,
    mut stack: Vec<Entry<O, A>>,
) -> Reply<A>
where
    U: Clone + Visibility,
    O: Clone,
    A: Clone,
    B: Builder<O, A>,
    I: Fn(&mut State<'t, U>, bool) -> Reply<Vec<Item<O, A>>>,
{
    loop {
        let fresh = stack.last().map_or(true, Entry::wants_operand);
        let mark = st.mark();
        let start = st.pos();
        let mut candidates = match items(st, fresh) {
            Ok(c) => c,
            Err(f) if f.is_committed() => return Err(f),
            Err(f) => {
                st.note(&f);
                st.reset(mark.clone());
                Vec::new()
            }
        };
        if candidates.is_empty() {
            return finish(st, builder, stack);
        }
        let span = st.span_since(start);

        if candidates.len() == 1 {
            let item = candidates.remove(0);
            match push(st, builder, &mut stack, item, span) {
                Ok(()) => continue,
                Err(f) if f.is_committed() => return Err(f),
                Err(f) => {
                    st.note(&f);
                    st.reset(mark);
                    return finish(st, builder, stack);
                }
            }
        }

        tracing::trace!(forks = candidates.len(), pos = start, "resolver fork");
        let after = st.mark();
        for item in candidates {
            st.reset(after.clone());
            let mut forked = stack.clone();
            let outcome = push(st, builder, &mut forked, item, span.clone())
                .and_then(|()| run(st, builder, items, forked));
            match outcome {
                Ok(a) => return Ok(a),
                Err(f) if f.is_committed() => return Err(f),
                Err(f) => st.note(&f),
            }
        }
        st.reset(mark);
        return finish(st, builder, stack);
    }
}

fn push<'t, U, O, A, B>(
    st: &mut State<'t, U>,
    builder: &B,
    stack: &mut Vec<Entry<O, A>>,
    item: Item<O, A>,
    span: Span,
) -> Reply<()>
where
    U: Clone + Visibility,
    B: Builder<O, A>,
{
    let fresh = stack.last().map_or(true, Entry::wants_operand);
    match item {
        Item::Atom(_) | Item::Prefix(..) => {
            if !fresh {
                return Err(missing_operator(st, &span));
            }
            stack.push(Entry { item, span });
            Ok(())
        }
        Item::Infix(..) | Item::Postfix(..) => {
            if fresh {
                return Err(st
                    .error(ErrorKind::AmbiguousOperatorSequence, "missing operand")
                    .at(&span));
            }
            while stack.len() >= 2 {
                match decide(&stack[stack.len() - 2].item, &item) {
                    Action::Reduce => reduce_top(st, builder, stack)?,
                    Action::Shift => break,
                    Action::Conflict => {
                        return Err(st
                            .error(ErrorKind::AmbiguousOperatorSequence, "precedence conflict")
                            .at(&span))
                    }
                }
            }
            if let Item::Postfix(op, _) = item {
                let Some(Entry {
                    item: Item::Atom(arg),
                    span: arg_span,
                }) = stack.pop()
                else {
                    return Err(st.defect("postfix operator without an operand"));
                };
                let whole = arg_span.merge(&span);
                let reduced = builder.apply_postfix(op, arg, whole.clone());
                stack.push(Entry {
                    item: Item::Atom(reduced),
                    span: whole,
                });
            } else {
                stack.push(Entry { item, span });
            }
            Ok(())
        }
    }
}

/// Reduce `[.., op, atom]` (prefix) or `[.., atom, op, atom]` (infix).
fn reduce_top<'t, U, O, A, B>(
    st: &State<'t, U>,
    builder: &B,
    stack: &mut Vec<Entry<O, A>>,
) -> Reply<()>
where
    U: Clone + Visibility,
    B: Builder<O, A>,
{
    let (Some(Entry {
        item: Item::Atom(rhs),
        span: rhs_span,
    }), Some(op)) = (stack.pop(), stack.pop())
    else {
        return Err(st.defect("reduction without an operand"));
    };
    let reduced = match op.item {
        Item::Prefix(o, _) => {
            let whole = op.span.merge(&rhs_span);
            Entry {
                item: Item::Atom(builder.apply_prefix(o, rhs, whole.clone())),
                span: whole,
            }
        }
        Item::Infix(o, _, _) => {
            let Some(Entry {
                item: Item::Atom(lhs),
                span: lhs_span,
            }) = stack.pop()
            else {
                return Err(st.defect("infix operator without a left operand"));
            };
            let whole = lhs_span.merge(&rhs_span);
            Entry {
                item: Item::Atom(builder.apply_infix(o, lhs, rhs, whole.clone())),
                span: whole,
            }
        }
        _ => return Err(st.defect("reduction under a non-operator")),
    };
    stack.push(reduced);
    Ok(())
}

fn finish<'t, U, O, A, B>(
    st: &mut State<'t, U>,
    builder: &B,
    mut stack: Vec<Entry<O, A>>,
) -> Reply<A>
where
    U: Clone + Visibility,
    B: Builder<O, A>,
{
    match stack.last() {
        None => return Err(st.unexpected("expression")),
        Some(top) if top.wants_operand() => {
            return Err(st.error(
                ErrorKind::AmbiguousOperatorSequence,
                "insufficient arguments",
            ))
        }
        Some(_) => {}
    }
    while stack.len() > 1 {
        reduce_top(st, builder, &mut stack)?;
    }
    match stack.pop() {
        Some(Entry {
            item: Item::Atom(a),
            ..
        }) => Ok(a),
        _ => Err(st.defect("resolver stack did not reduce to an atom")),
    }
}

fn missing_operator<'t, U: Clone + Visibility>(st: &State<'t, U>, span: &Span) -> super::Failure {
    st.error(ErrorKind::AmbiguousOperatorSequence, "missing operator")
        .at(span)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::{lex, Token, TokenKind};
    use crate::ops::OpTable;

    /// Builds fully parenthesized strings.
    struct Sexp;

    impl Builder<String, String> for Sexp {
        fn apply_prefix(&self, op: String, arg: String, _: Span) -> String {
            format!("({}{})", op, arg)
        }
        fn apply_postfix(&self, op: String, arg: String, _: Span) -> String {
            format!("({}{})", arg, op)
        }
        fn apply_infix(&self, op: String, lhs: String, rhs: String, _: Span) -> String {
            format!("({} {} {})", lhs, op, rhs)
        }
    }

    type S<'t> = State<'t, ()>;

    /// Numbers and identifiers are atoms; operators come from the global
    /// table, except `%` which is given an extra postfix reading and `^`
    /// which is made right associative.
    fn item<'t>(st: &mut S<'t>, fresh: bool) -> Reply<Vec<Item<String, String>>> {
        let Some(tok) = st.peek() else {
            return Ok(vec![]);
        };
        let table = OpTable::global();
        let text = tok.text.clone();
        match &tok.kind {
            TokenKind::Number | TokenKind::Ident => {
                if !fresh {
                    return Err(st.error(ErrorKind::AmbiguousOperatorSequence, "missing operator"));
                }
                st.advance()?;
                Ok(vec![Item::Atom(text)])
            }
            TokenKind::Op if fresh => match table.any_prefix(&text) {
                Some(d) => {
                    st.advance()?;
                    Ok(vec![Item::Prefix(text, d.prec)])
                }
                None => Ok(vec![]),
            },
            TokenKind::Op => {
                let mut out = Vec::new();
                if text == "^" {
                    out.push(Item::Infix(text.clone(), Prec::new(14, 14), Assoc::Right));
                } else if let Some(d) = table.any_infix(&text) {
                    let assoc = match d.fixity {
                        crate::ops::Fixity::Infix(a) => a,
                        _ => Assoc::Non,
                    };
                    out.push(Item::Infix(text.clone(), d.prec, assoc));
                }
                if let Some(d) = table.any_postfix(&text) {
                    out.push(Item::Postfix(text.clone(), d.prec));
                }
                if text == "%" {
                    out.push(Item::Postfix(text.clone(), Prec::new(15, 15)));
                }
                if !out.is_empty() {
                    st.advance()?;
                }
                Ok(out)
            }
            _ => Ok(vec![]),
        }
    }

    fn parse(src: &str) -> Result<(String, usize), crate::combinator::Failure> {
        let toks: Vec<Token> = lex(src, "t").expect("lexes");
        let mut st = State::new(&toks, ());
        let r = resolve(&mut st, &Sexp, &item)?;
        Ok((r, st.pos()))
    }

    fn full(src: &str) -> String {
        let toks: Vec<Token> = lex(src, "t").expect("lexes");
        let (r, pos) = parse(src).unwrap();
        assert_eq!(pos, toks.len(), "unconsumed input in {:?}", src);
        r
    }

    #[test]
    fn precedence_and_associativity() {
        assert_eq!(full("1 + 2 * 3"), "(1 + (2 * 3))");
        assert_eq!(full("1 * 2 + 3"), "((1 * 2) + 3)");
        assert_eq!(full("1 - 2 - 3"), "((1 - 2) - 3)");
        assert_eq!(full("a /\\ b \\/ c"), "((a /\\ b) \\/ c)");
        assert_eq!(full("2 ^ 3 ^ 4"), "(2 ^ (3 ^ 4))");
    }

    #[test]
    fn prefix_and_postfix() {
        assert_eq!(full("- a + b"), "((-a) + b)");
        assert_eq!(full("~ a = b"), "(~(a = b))");
        assert_eq!(full("- x '"), "(-(x'))");
        assert_eq!(full("a + b '"), "(a + (b'))");
    }

    #[test]
    fn conflicting_operators_stop_the_expression() {
        // `=` is non-associative: the second one is left unconsumed
        let (r, pos) = parse("a = b = c").unwrap();
        assert_eq!(r, "(a = b)");
        assert_eq!(pos, 3);
    }

    #[test]
    fn adjacent_atoms_stop_the_expression() {
        let (r, pos) = parse("1 2").unwrap();
        assert_eq!(r, "1");
        assert_eq!(pos, 1);
    }

    #[test]
    fn dangling_operator_is_insufficient_arguments() {
        let err = parse("1 +").unwrap_err();
        assert_eq!(err.kind, ErrorKind::AmbiguousOperatorSequence);
        assert!(err.messages.iter().any(|m| m == "insufficient arguments"));
    }

    #[test]
    fn forks_pick_the_reading_that_completes() {
        // `%` is infix or postfix here
        assert_eq!(full("a % b"), "(a % b)");
        assert_eq!(full("a %"), "(a%)");
        assert_eq!(full("a % + b"), "((a%) + b)");
    }

    #[test]
    fn empty_input_expects_an_expression() {
        let err = parse("").unwrap_err();
        assert_eq!(err.expected, ["expression"]);
    }
}
