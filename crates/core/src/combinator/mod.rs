//! Backtracking parser-combinator runtime.
//!
//! A parser is anything callable as `Fn(&mut State<'t, U>) -> Reply<T>`.
//! Failures carry a [`Severity`]: a `Backtrackable` failure lets the nearest
//! choice point restore the state and try its next alternative, while a
//! `Committed` failure passes through every choice point until an explicit
//! [`State::attempt`] boundary.
//!
//! The primitives are methods on [`State`] taking closures; the free
//! functions of the same names build reusable parser values out of them.

pub mod resolve;

use crate::error::{Diagnostic, ErrorKind};
use crate::lexer::{Token, TokenKind};
use crate::span::{Span, Spanned};

// ──────────────────────────────────────────────
// Failures
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Restore state and let a sibling alternative run.
    Backtrackable,
    /// Abandon every remaining alternative of the enclosing choice.
    Committed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub severity: Severity,
    pub kind: ErrorKind,
    /// Token index the failure refers to.
    pub pos: usize,
    pub span: Span,
    pub unexpected: Option<String>,
    pub expected: Vec<String>,
    pub messages: Vec<String>,
    /// Defect markers from `internal`; shown only in verbose diagnostics.
    pub notes: Vec<String>,
}

pub type Reply<T> = Result<T, Failure>;

impl Failure {
    pub fn is_committed(&self) -> bool {
        self.severity == Severity::Committed
    }

    pub fn committed(mut self) -> Self {
        self.severity = Severity::Committed;
        self
    }

    pub fn backtrackable(mut self) -> Self {
        self.severity = Severity::Backtrackable;
        self
    }

    pub fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.messages.push(msg.into());
        self
    }

    /// Point the failure at a specific span, keeping its position.
    pub fn at(mut self, span: &Span) -> Self {
        self.span = span.clone();
        self
    }

    /// Fold another failure at the same position into this one.
    fn absorb(&mut self, other: &Failure) {
        self.kind = self.kind.max(other.kind);
        if self.unexpected.is_none() {
            self.unexpected = other.unexpected.clone();
        }
        for e in &other.expected {
            if !self.expected.contains(e) {
                self.expected.push(e.clone());
            }
        }
        for m in &other.messages {
            if !self.messages.contains(m) {
                self.messages.push(m.clone());
            }
        }
        for n in &other.notes {
            if !self.notes.contains(n) {
                self.notes.push(n.clone());
            }
        }
    }

    pub fn into_diagnostic(self, verbose: bool) -> Diagnostic {
        let mut expected = self.expected;
        expected.sort();
        expected.dedup();
        let mut diag = Diagnostic::new(self.kind, self.span);
        diag.unexpected = self.unexpected;
        diag.expected = expected;
        diag.messages = self.messages;
        if verbose {
            diag.notes = self.notes;
        }
        diag
    }
}

// ──────────────────────────────────────────────
// State
// ──────────────────────────────────────────────

/// Decides whether the user state lets the parser see a token. Tokens that
/// are not admitted look like end of input.
pub trait Visibility {
    fn admits(&self, _tok: &Token) -> bool {
        true
    }
}

impl Visibility for () {}

pub struct State<'t, U> {
    tokens: &'t [Token],
    pos: usize,
    /// Span of the last consumed token.
    last: Span,
    pub user: U,
    furthest: Option<Failure>,
    eof: Span,
}

/// A saved cursor. Restoring copies back three small fields; the token
/// buffer is never cloned.
#[derive(Debug, Clone)]
pub struct Mark<U> {
    pos: usize,
    last: Span,
    user: U,
}

impl<U> Mark<U> {
    pub fn pos(&self) -> usize {
        self.pos
    }
}

impl<'t, U: Clone + Visibility> State<'t, U> {
    pub fn new(tokens: &'t [Token], user: U) -> Self {
        let eof = tokens
            .last()
            .map(|t| t.span.end_point())
            .unwrap_or_else(Span::unknown);
        State {
            tokens,
            pos: 0,
            last: Span::unknown(),
            user,
            furthest: None,
            eof,
        }
    }

    pub fn mark(&self) -> Mark<U> {
        Mark {
            pos: self.pos,
            last: self.last.clone(),
            user: self.user.clone(),
        }
    }

    pub fn reset(&mut self, mark: Mark<U>) {
        self.pos = mark.pos;
        self.last = mark.last;
        self.user = mark.user;
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn tokens(&self) -> &'t [Token] {
        self.tokens
    }

    // ── Token access ─────────────────────────────────────────────────────

    /// The next token, if the user state admits it.
    pub fn peek(&self) -> Option<&'t Token> {
        self.peek_nth(0)
    }

    /// The token `n` places ahead, if it and every token before it is
    /// admitted.
    pub fn peek_nth(&self, n: usize) -> Option<&'t Token> {
        let toks = self.tokens.get(self.pos..=self.pos + n)?;
        if toks.iter().all(|t| self.user.admits(t)) {
            toks.last()
        } else {
            None
        }
    }

    /// The next token ignoring visibility; used for diagnostics.
    pub fn peek_raw(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    pub fn at_end(&self) -> bool {
        self.peek().is_none()
    }

    pub fn advance(&mut self) -> Reply<&'t Token> {
        match self.peek() {
            Some(tok) => {
                self.pos += 1;
                self.last = tok.span.clone();
                Ok(tok)
            }
            None => Err(self.unexpected("a token")),
        }
    }

    /// Span of the next token, or the end of input.
    pub fn here(&self) -> Span {
        self.peek_raw()
            .map(|t| t.span.clone())
            .unwrap_or_else(|| self.eof.clone())
    }

    pub fn last_span(&self) -> &Span {
        &self.last
    }

    /// Span from token `start` to the last consumed token.
    pub fn span_since(&self, start: usize) -> Span {
        match self.tokens.get(start) {
            Some(first) if start < self.pos => first.span.merge(&self.last),
            _ => self.here().end_point(),
        }
    }

    pub fn is_punct(&self, p: &str) -> bool {
        self.peek().is_some_and(|t| t.is_punct(p))
    }

    pub fn is_kw(&self, k: &str) -> bool {
        self.peek().is_some_and(|t| t.is_keyword(k))
    }

    pub fn is_op(&self, o: &str) -> bool {
        self.peek().is_some_and(|t| t.is_op(o))
    }

    pub fn eat_punct(&mut self, p: &str) -> bool {
        if self.is_punct(p) {
            self.pos += 1;
            self.last = self.tokens[self.pos - 1].span.clone();
            true
        } else {
            false
        }
    }

    pub fn eat_kw(&mut self, k: &str) -> bool {
        if self.is_kw(k) {
            self.pos += 1;
            self.last = self.tokens[self.pos - 1].span.clone();
            true
        } else {
            false
        }
    }

    pub fn expect_punct(&mut self, p: &str) -> Reply<Span> {
        if self.eat_punct(p) {
            Ok(self.last.clone())
        } else {
            Err(self.unexpected(format!("{:?}", p)))
        }
    }

    pub fn expect_kw(&mut self, k: &str) -> Reply<Span> {
        if self.eat_kw(k) {
            Ok(self.last.clone())
        } else {
            Err(self.unexpected(k))
        }
    }

    pub fn expect_op(&mut self, o: &str) -> Reply<Span> {
        if self.is_op(o) {
            self.advance()?;
            Ok(self.last.clone())
        } else {
            Err(self.unexpected(format!("{:?}", o)))
        }
    }

    pub fn ident(&mut self) -> Reply<Spanned<String>> {
        match self.peek() {
            Some(tok) if tok.kind == TokenKind::Ident => {
                self.advance()?;
                Ok(Spanned::new(tok.text.clone(), tok.span.clone()))
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    // ── Failure construction ─────────────────────────────────────────────

    fn failure(&self, kind: ErrorKind) -> Failure {
        Failure {
            severity: Severity::Backtrackable,
            kind,
            pos: self.pos,
            span: self.here(),
            unexpected: self.peek_raw().map(Token::describe),
            expected: Vec::new(),
            messages: Vec::new(),
            notes: Vec::new(),
        }
    }

    /// Backtrackable "unexpected token" failure at the cursor.
    pub fn unexpected(&self, expected: impl Into<String>) -> Failure {
        let mut f = self.failure(ErrorKind::UnexpectedToken);
        f.expected.push(expected.into());
        f
    }

    /// Backtrackable failure with a user-facing message.
    pub fn error(&self, kind: ErrorKind, msg: impl Into<String>) -> Failure {
        self.failure(kind).with_message(msg)
    }

    /// Backtrackable failure marking a grammar defect.
    pub fn defect(&self, note: impl Into<String>) -> Failure {
        let mut f = self.failure(ErrorKind::Internal);
        f.notes.push(note.into());
        f
    }

    /// Remember a failure that was recovered from, for the final diagnostic.
    pub fn note(&mut self, f: &Failure) {
        match &mut self.furthest {
            Some(cur) if f.pos < cur.pos => {}
            Some(cur) if f.pos == cur.pos => cur.absorb(f),
            _ => self.furthest = Some(f.clone()),
        }
    }

    /// Combine the failure that ended a parse with what was learned from
    /// abandoned alternatives.
    pub fn conclude(&mut self, f: Failure) -> Failure {
        match self.furthest.take() {
            Some(far) if far.pos == f.pos => {
                let mut f = f;
                f.absorb(&far);
                f
            }
            Some(far) if far.pos > f.pos && !f.is_committed() => far,
            _ => f,
        }
    }

    // ── Combinators ──────────────────────────────────────────────────────

    /// Run `p`; a committed failure inside it becomes a backtrackable one
    /// and the state is restored.
    pub fn attempt<T>(&mut self, p: impl FnOnce(&mut Self) -> Reply<T>) -> Reply<T> {
        let mark = self.mark();
        match p(self) {
            Ok(v) => Ok(v),
            Err(f) => {
                self.reset(mark);
                Err(f.backtrackable())
            }
        }
    }

    /// Run `p`; a backtrackable failure inside it becomes committed.
    pub fn commit<T>(&mut self, p: impl FnOnce(&mut Self) -> Reply<T>) -> Reply<T> {
        p(self).map_err(Failure::committed)
    }

    /// Run `p` and restore the state whatever the outcome.
    pub fn lookahead<T>(&mut self, p: impl FnOnce(&mut Self) -> Reply<T>) -> Reply<T> {
        let mark = self.mark();
        let r = p(self);
        self.reset(mark);
        r
    }

    /// Try `p`; on a backtrackable failure restore the state and run `q`.
    pub fn or<T>(
        &mut self,
        p: impl FnOnce(&mut Self) -> Reply<T>,
        q: impl FnOnce(&mut Self) -> Reply<T>,
    ) -> Reply<T> {
        let mark = self.mark();
        match p(self) {
            Ok(v) => Ok(v),
            Err(f) if f.is_committed() => Err(f),
            Err(f) => {
                self.note(&f);
                self.reset(mark);
                q(self)
            }
        }
    }

    /// `Some` on success, `None` after a backtrackable failure.
    pub fn optional<T>(&mut self, p: impl FnOnce(&mut Self) -> Reply<T>) -> Reply<Option<T>> {
        self.or(|st| p(st).map(Some), |_| Ok(None))
    }

    /// Zero or more repetitions of `p`, stopping at its first backtrackable
    /// failure.
    pub fn many<T>(&mut self, mut p: impl FnMut(&mut Self) -> Reply<T>) -> Reply<Vec<T>> {
        let mut out = Vec::new();
        loop {
            let mark = self.mark();
            match p(self) {
                Ok(v) => {
                    // a parser that succeeds without consuming would loop forever
                    if self.pos == mark.pos {
                        out.push(v);
                        return Ok(out);
                    }
                    out.push(v);
                }
                Err(f) if f.is_committed() => return Err(f),
                Err(f) => {
                    self.note(&f);
                    self.reset(mark);
                    return Ok(out);
                }
            }
        }
    }

    pub fn many1<T>(&mut self, mut p: impl FnMut(&mut Self) -> Reply<T>) -> Reply<Vec<T>> {
        let first = p(self)?;
        let mut rest = self.many(p)?;
        rest.insert(0, first);
        Ok(rest)
    }

    /// `p (sep p)*`
    pub fn sep_by1<T>(
        &mut self,
        sep: &str,
        mut p: impl FnMut(&mut Self) -> Reply<T>,
    ) -> Reply<Vec<T>> {
        let mut out = vec![p(self)?];
        while self.eat_punct(sep) {
            out.push(p(self)?);
        }
        Ok(out)
    }

    /// Run `p` and pair its result with the span of the tokens it consumed.
    pub fn located<T>(&mut self, p: impl FnOnce(&mut Self) -> Reply<T>) -> Reply<Spanned<T>> {
        let start = self.pos;
        let v = p(self)?;
        Ok(Spanned::new(v, self.span_since(start)))
    }

    pub fn get(&self) -> &U {
        &self.user
    }

    pub fn put(&mut self, user: U) {
        self.user = user;
    }

    /// Run `p` with `user` installed, then reinstate the previous user state.
    pub fn using<T>(&mut self, user: U, p: impl FnOnce(&mut Self) -> Reply<T>) -> Reply<T> {
        let saved = std::mem::replace(&mut self.user, user);
        let r = p(self);
        self.user = saved;
        r
    }

    /// Pick productions by the next token before trying any of them.
    ///
    /// Only entries whose lead set matches the next token are tried, in
    /// order, with backtracking between them. If none is selected, or all
    /// selected ones fail backtrackably, `default` runs; without a default
    /// the failure lists every lead.
    pub fn dispatch<T>(
        &mut self,
        table: &[(&[Lead], Production<'t, U, T>)],
        default: Option<Production<'t, U, T>>,
    ) -> Reply<T> {
        let next = self.peek();
        let mut last: Option<Failure> = None;
        for (leads, prod) in table {
            if !next.is_some_and(|t| leads.iter().any(|l| l.matches(t))) {
                continue;
            }
            let mark = self.mark();
            match prod(self) {
                Ok(v) => return Ok(v),
                Err(f) if f.is_committed() => return Err(f),
                Err(f) => {
                    self.note(&f);
                    self.reset(mark);
                    last = Some(f);
                }
            }
        }
        if let Some(default) = default {
            return default(self);
        }
        if let Some(f) = last {
            return Err(f);
        }
        let mut f = self.failure(ErrorKind::UnexpectedToken);
        for (leads, _) in table {
            f.expected.extend(leads.iter().map(Lead::describe));
        }
        Err(f)
    }
}

/// Production stored in a dispatch table.
pub type Production<'t, U, T> = fn(&mut State<'t, U>) -> Reply<T>;

/// A class of leading token, used by [`State::dispatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lead {
    Kw(&'static str),
    Punct(&'static str),
    Op(&'static str),
    AnyIdent,
    AnyNumber,
    AnyString,
    AnyOp,
    AnyStep,
}

impl Lead {
    pub fn matches(&self, tok: &Token) -> bool {
        match self {
            Lead::Kw(k) => tok.is_keyword(k),
            Lead::Punct(p) => tok.is_punct(p),
            Lead::Op(o) => tok.is_op(o),
            Lead::AnyIdent => tok.kind == TokenKind::Ident,
            Lead::AnyNumber => tok.kind == TokenKind::Number,
            Lead::AnyString => matches!(tok.kind, TokenKind::Str(_)),
            Lead::AnyOp => tok.kind == TokenKind::Op,
            Lead::AnyStep => matches!(tok.kind, TokenKind::Step(_)),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Lead::Kw(s) | Lead::Punct(s) | Lead::Op(s) => format!("{:?}", s),
            Lead::AnyIdent => "identifier".into(),
            Lead::AnyNumber => "number".into(),
            Lead::AnyString => "string".into(),
            Lead::AnyOp => "operator".into(),
            Lead::AnyStep => "step marker".into(),
        }
    }
}

// ──────────────────────────────────────────────
// Parser values
// ──────────────────────────────────────────────

pub fn succeed<'t, U, T: Clone>(v: T) -> impl Fn(&mut State<'t, U>) -> Reply<T> {
    move |_: &mut State<'t, U>| Ok(v.clone())
}

pub fn fail<'t, U: Clone + Visibility, T>(
    msg: &'static str,
) -> impl Fn(&mut State<'t, U>) -> Reply<T> {
    move |st: &mut State<'t, U>| Err(st.error(ErrorKind::UnexpectedToken, msg))
}

pub fn internal<'t, U: Clone + Visibility, T>(
    note: &'static str,
) -> impl Fn(&mut State<'t, U>) -> Reply<T> {
    move |st: &mut State<'t, U>| Err(st.defect(note))
}

/// Run `p`, then the parser `f` builds from its located result.
pub fn bind<'t, U, T, V, P, F, Q>(p: P, f: F) -> impl Fn(&mut State<'t, U>) -> Reply<V>
where
    U: Clone + Visibility,
    P: Fn(&mut State<'t, U>) -> Reply<T>,
    F: Fn(Spanned<T>) -> Q,
    Q: FnOnce(&mut State<'t, U>) -> Reply<V>,
{
    move |st: &mut State<'t, U>| {
        let v = st.located(&p)?;
        f(v)(st)
    }
}

/// Run `p` then `q`, keeping the second result.
pub fn then<'t, U, T, V>(
    p: impl Fn(&mut State<'t, U>) -> Reply<T>,
    q: impl Fn(&mut State<'t, U>) -> Reply<V>,
) -> impl Fn(&mut State<'t, U>) -> Reply<V> {
    move |st: &mut State<'t, U>| {
        p(st)?;
        q(st)
    }
}

pub fn map<'t, U, T, V>(
    p: impl Fn(&mut State<'t, U>) -> Reply<T>,
    f: impl Fn(T) -> V,
) -> impl Fn(&mut State<'t, U>) -> Reply<V> {
    move |st: &mut State<'t, U>| p(st).map(&f)
}

pub fn or<'t, U: Clone + Visibility, T>(
    p: impl Fn(&mut State<'t, U>) -> Reply<T>,
    q: impl Fn(&mut State<'t, U>) -> Reply<T>,
) -> impl Fn(&mut State<'t, U>) -> Reply<T> {
    move |st: &mut State<'t, U>| st.or(&p, &q)
}

pub fn attempt<'t, U: Clone + Visibility, T>(
    p: impl Fn(&mut State<'t, U>) -> Reply<T>,
) -> impl Fn(&mut State<'t, U>) -> Reply<T> {
    move |st: &mut State<'t, U>| st.attempt(&p)
}

pub fn commit<'t, U: Clone + Visibility, T>(
    p: impl Fn(&mut State<'t, U>) -> Reply<T>,
) -> impl Fn(&mut State<'t, U>) -> Reply<T> {
    move |st: &mut State<'t, U>| st.commit(&p)
}

pub fn lookahead<'t, U: Clone + Visibility, T>(
    p: impl Fn(&mut State<'t, U>) -> Reply<T>,
) -> impl Fn(&mut State<'t, U>) -> Reply<T> {
    move |st: &mut State<'t, U>| st.lookahead(&p)
}

pub fn many<'t, U: Clone + Visibility, T>(
    p: impl Fn(&mut State<'t, U>) -> Reply<T>,
) -> impl Fn(&mut State<'t, U>) -> Reply<Vec<T>> {
    move |st: &mut State<'t, U>| st.many(&p)
}

pub fn many1<'t, U: Clone + Visibility, T>(
    p: impl Fn(&mut State<'t, U>) -> Reply<T>,
) -> impl Fn(&mut State<'t, U>) -> Reply<Vec<T>> {
    move |st: &mut State<'t, U>| st.many1(&p)
}

pub fn get<'t, U: Clone>() -> impl Fn(&mut State<'t, U>) -> Reply<U> {
    |st: &mut State<'t, U>| Ok(st.user.clone())
}

pub fn put<'t, U: Clone>(user: U) -> impl Fn(&mut State<'t, U>) -> Reply<()> {
    move |st: &mut State<'t, U>| {
        st.user = user.clone();
        Ok(())
    }
}

pub fn using<'t, U: Clone + Visibility, T>(
    user: U,
    p: impl Fn(&mut State<'t, U>) -> Reply<T>,
) -> impl Fn(&mut State<'t, U>) -> Reply<T> {
    move |st: &mut State<'t, U>| st.using(user.clone(), &p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;

    fn toks(src: &str) -> Vec<Token> {
        lex(src, "t").expect("lexes")
    }

    fn name<'t>(st: &mut State<'t, ()>) -> Reply<String> {
        st.ident().map(|s| s.node)
    }

    fn close<'t>(st: &mut State<'t, ()>) -> Reply<Span> {
        st.expect_punct(")")
    }

    fn bracket<'t>(st: &mut State<'t, ()>) -> Reply<Span> {
        st.expect_punct("]")
    }

    fn comma<'t>(st: &mut State<'t, ()>) -> Reply<Span> {
        st.expect_punct(",")
    }

    #[test]
    fn or_retries_after_backtrackable_failure() {
        let t = toks("a ]");
        let mut st = State::new(&t, ());
        let p = or(then(name, close), then(name, bracket));
        assert!(p(&mut st).is_ok());
        assert!(st.at_end());
    }

    #[test]
    fn or_does_not_retry_committed_failure() {
        let t = toks("a ]");
        let mut st = State::new(&t, ());
        let p = or(then(name, commit(close)), then(name, bracket));
        let err = p(&mut st).unwrap_err();
        assert!(err.is_committed());
        assert_eq!(err.expected, vec!["\")\"".to_string()]);
    }

    #[test]
    fn attempt_turns_committed_into_backtrackable() {
        let t = toks("a ]");
        let mut st = State::new(&t, ());
        let p = or(attempt(then(name, commit(close))), then(name, bracket));
        assert!(p(&mut st).is_ok());
    }

    #[test]
    fn commit_only_upgrades_failures() {
        let t = toks("a");
        let mut st = State::new(&t, ());
        assert_eq!(commit(name)(&mut st).unwrap(), "a");
        let err = commit(name)(&mut st).unwrap_err();
        assert_eq!(err.severity, Severity::Committed);
    }

    #[test]
    fn lookahead_restores_state() {
        let t = toks("a b");
        let mut st = State::new(&t, ());
        let seen = lookahead(name)(&mut st).unwrap();
        assert_eq!(seen, "a");
        assert_eq!(st.pos(), 0);
        assert!(lookahead(comma)(&mut st).is_err());
        assert_eq!(st.pos(), 0);
    }

    #[test]
    fn many_stops_at_first_backtrackable_failure() {
        let t = toks("a b c , d");
        let mut st = State::new(&t, ());
        let names = many(name)(&mut st).unwrap();
        assert_eq!(names, ["a", "b", "c"]);
        assert!(st.is_punct(","));

        let t = toks(", d");
        let mut st = State::new(&t, ());
        assert!(many1(name)(&mut st).is_err());
        assert!(many(name)(&mut st).unwrap().is_empty());
    }

    #[test]
    fn map_and_bind_sequence_results() {
        let t = toks("x y");
        let mut st = State::new(&t, ());
        let p = bind(name, |first: Spanned<String>| {
            move |st: &mut State<'_, ()>| -> Reply<(String, usize, String)> {
                let second = st.ident()?;
                Ok((first.node, first.span.start.col, second.node))
            }
        });
        assert_eq!(p(&mut st).unwrap(), ("x".to_string(), 0, "y".to_string()));

        let t = toks("abc");
        let mut st = State::new(&t, ());
        assert_eq!(map(name, |s: String| s.len())(&mut st).unwrap(), 3);
    }

    #[test]
    fn succeed_fail_and_internal() {
        let t = toks("x");
        let mut st = State::new(&t, ());
        assert_eq!(succeed::<(), i32>(3)(&mut st).unwrap(), 3);
        let f = fail::<(), ()>("nope")(&mut st).unwrap_err();
        assert_eq!(f.severity, Severity::Backtrackable);
        assert_eq!(f.messages, ["nope"]);
        let f = internal::<(), ()>("broken")(&mut st).unwrap_err();
        assert_eq!(f.severity, Severity::Backtrackable);
        assert_eq!(f.kind, ErrorKind::Internal);
        assert!(f.messages.is_empty());
        assert_eq!(f.notes, ["broken"]);
    }

    #[derive(Clone)]
    struct Edge(usize);

    impl Visibility for Edge {
        fn admits(&self, tok: &Token) -> bool {
            tok.column() >= self.0
        }
    }

    fn edge_name<'t>(st: &mut State<'t, Edge>) -> Reply<Spanned<String>> {
        st.ident()
    }

    #[test]
    fn user_state_controls_visibility() {
        let t = toks("a\n  b\nc");
        let mut st = State::new(&t, Edge(0));
        st.ident().unwrap();
        let inner = using(Edge(1), many(edge_name))(&mut st).unwrap();
        assert_eq!(inner.len(), 1);
        assert_eq!(st.get().0, 0);
        assert_eq!(st.ident().unwrap().node, "c");

        let mut st = State::new(&t, Edge(0));
        put(Edge(5))(&mut st).unwrap();
        assert!(st.at_end());
        assert_eq!(get()(&mut st).unwrap().0, 5);
    }

    fn paren<'t>(st: &mut State<'t, ()>) -> Reply<&'static str> {
        st.expect_punct("(")?;
        Ok("paren")
    }

    fn word<'t>(st: &mut State<'t, ()>) -> Reply<&'static str> {
        st.ident()?;
        Ok("word")
    }

    #[test]
    fn dispatch_only_tries_matching_productions() {
        let table: &[(&[Lead], Production<'_, (), &'static str>)] =
            &[(&[Lead::Punct("(")], paren), (&[Lead::AnyIdent], word)];

        let t = toks("x");
        let mut st = State::new(&t, ());
        assert_eq!(st.dispatch(table, None).unwrap(), "word");

        let t = toks("1");
        let mut st = State::new(&t, ());
        let err = st.dispatch(table, None).unwrap_err();
        assert_eq!(err.expected, ["\"(\"", "identifier"]);
    }

    #[test]
    fn furthest_failure_is_remembered() {
        let t = toks("a b c");
        let mut st = State::new(&t, ());
        let deep = |st: &mut State<'_, ()>| -> Reply<Span> {
            st.ident()?;
            st.ident()?;
            st.expect_punct(",")
        };
        let f = st.or(deep, paren_span).unwrap_err();
        let f = st.conclude(f);
        assert_eq!(f.pos, 2);
        assert_eq!(f.expected, ["\",\""]);
        let d = f.into_diagnostic(false);
        assert_eq!(d.unexpected.as_deref(), Some("identifier c"));
    }

    fn paren_span<'t>(st: &mut State<'t, ()>) -> Reply<Span> {
        st.expect_punct("(")
    }
}
