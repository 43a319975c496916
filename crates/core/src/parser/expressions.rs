use super::Parser;
use crate::ast::{
    Builtin, Bullet, Exspec, Expoint, Expr, ExprKind, Fairness, Modal, Number, Pattern,
    Quantifier, Radix,
};
use crate::combinator::resolve::{resolve, Builder, Item};
use crate::combinator::{Lead, Production, Reply};
use crate::error::ErrorKind;
use crate::lexer::{Token, TokenKind};
use crate::ops::{Assoc, Fixity, OpDescriptor, OpTable, APP_PREC, DOT_PREC};
use crate::span::{Span, Spanned};

// ──────────────────────────────────────────────
// Operator items
// ──────────────────────────────────────────────

#[derive(Debug, Clone)]
pub(super) enum OpItem {
    /// Ordinary operator; the head expression of the resulting `Apply`.
    Head(Expr),
    /// `\X`, whose chains flatten into one n-ary application.
    Cartesian(Span),
    /// `[a, b]` after an operand.
    Index(Vec<Expr>),
    /// `.field` after an operand.
    Field(Spanned<String>),
}

struct ExprBuilder;

impl ExprBuilder {
    fn unary(op: OpItem, arg: Expr, span: Span) -> Expr {
        let kind = match op {
            OpItem::Head(h) => ExprKind::Apply(Box::new(h), vec![arg]),
            OpItem::Cartesian(s) => ExprKind::Apply(
                Box::new(Expr::new(ExprKind::Internal(Builtin::Cartesian), s)),
                vec![arg],
            ),
            OpItem::Index(args) => ExprKind::FcnApp(Box::new(arg), args),
            OpItem::Field(f) => ExprKind::Dot(Box::new(arg), f),
        };
        Expr::new(kind, span)
    }
}

impl Builder<OpItem, Expr> for ExprBuilder {
    fn apply_prefix(&self, op: OpItem, arg: Expr, span: Span) -> Expr {
        Self::unary(op, arg, span)
    }

    fn apply_postfix(&self, op: OpItem, arg: Expr, span: Span) -> Expr {
        Self::unary(op, arg, span)
    }

    fn apply_infix(&self, op: OpItem, lhs: Expr, rhs: Expr, span: Span) -> Expr {
        match op {
            OpItem::Head(h) => Expr::new(ExprKind::Apply(Box::new(h), vec![lhs, rhs]), span),
            OpItem::Cartesian(s) => {
                let kind = match lhs.node {
                    ExprKind::Apply(head, mut factors)
                        if head.node == ExprKind::Internal(Builtin::Cartesian)
                            && factors.len() >= 2 =>
                    {
                        factors.push(rhs);
                        ExprKind::Apply(head, factors)
                    }
                    other => {
                        let lhs = Expr::new(other, lhs.span);
                        let head = Expr::new(ExprKind::Internal(Builtin::Cartesian), s);
                        ExprKind::Apply(Box::new(head), vec![lhs, rhs])
                    }
                };
                Expr::new(kind, span)
            }
            // selectors only arrive as postfix items; treat a stray one as
            // selecting from the left operand and applying the result
            selector => {
                let head = Self::unary(selector, lhs, span.clone());
                Expr::new(ExprKind::Apply(Box::new(head), vec![rhs]), span)
            }
        }
    }
}

/// The expression an operator token stands for as a head.
pub(super) fn op_head(d: &OpDescriptor, span: &Span) -> Expr {
    let kind = match d.builtin {
        Some(b) => ExprKind::Internal(b),
        None => ExprKind::Ident(d.name.to_owned()),
    };
    Expr::new(kind, span.clone())
}

/// Tokens that begin an operand; seeing one where an operator is due means
/// an operator is missing.
pub(super) fn starts_operand(tok: &Token) -> bool {
    match &tok.kind {
        TokenKind::Ident | TokenKind::Number | TokenKind::Str(_) => true,
        TokenKind::Punct => matches!(
            tok.text.as_str(),
            "(" | "{" | "<<" | "\\A" | "\\E" | "\\AA" | "\\EE" | "WF_" | "SF_" | "@"
        ),
        TokenKind::Keyword => matches!(
            tok.text.as_str(),
            "TRUE" | "FALSE" | "BOOLEAN" | "STRING" | "IF" | "LET" | "CHOOSE" | "LAMBDA"
        ),
        _ => false,
    }
}

fn is_bullet(tok: &Token) -> bool {
    tok.kind == TokenKind::Op && (tok.text == "/\\" || tok.text == "\\/")
}

/// Parse the digits of a number token.
pub(super) fn number_of(text: &str) -> Number {
    if let Some(rest) = text.strip_prefix('\\') {
        let radix = match rest.chars().next() {
            Some('b') | Some('B') => Radix::Binary,
            Some('o') | Some('O') => Radix::Octal,
            _ => Radix::Hex,
        };
        return Number::Nat(radix, rest[1..].to_owned());
    }
    match text.split_once('.') {
        Some((int, frac)) => Number::Decimal(int.to_owned(), frac.to_owned()),
        None => Number::Nat(Radix::Decimal, text.to_owned()),
    }
}

impl<'t> Parser<'t> {
    // ── Resolver hookup ──────────────────────────────────────────────────

    /// A full expression.
    pub(crate) fn parse_expr(&mut self) -> Reply<Expr> {
        resolve(self, &ExprBuilder, &Self::expr_items)
    }

    fn expr_items(&mut self, fresh: bool) -> Reply<Vec<Item<OpItem, Expr>>> {
        let Some(tok) = self.peek() else {
            return Ok(vec![]);
        };
        if fresh {
            return self.fresh_items(tok);
        }
        match &tok.kind {
            TokenKind::Op => self.operator_items(tok),
            TokenKind::Punct if tok.text == "[" => {
                let args = self.index_args()?;
                Ok(vec![Item::Postfix(OpItem::Index(args), APP_PREC)])
            }
            TokenKind::Punct
                if tok.text == "."
                    && self.peek_nth(1).is_some_and(|t| t.kind == TokenKind::Ident) =>
            {
                self.advance()?;
                let field = self.ident()?;
                Ok(vec![Item::Postfix(OpItem::Field(field), DOT_PREC)])
            }
            _ if starts_operand(tok) => Err(self
                .error(ErrorKind::AmbiguousOperatorSequence, "missing operator")
                .at(&tok.span)),
            _ => Ok(vec![]),
        }
    }

    fn fresh_items(&mut self, tok: &'t Token) -> Reply<Vec<Item<OpItem, Expr>>> {
        if tok.kind != TokenKind::Op {
            return Ok(vec![Item::Atom(self.primary()?)]);
        }
        if is_bullet(tok) {
            return Ok(vec![Item::Atom(self.bulleted_list()?)]);
        }
        let table = OpTable::global();
        let adjacent_paren = self
            .peek_nth(1)
            .is_some_and(|t| t.is_punct("(") && t.span.start == tok.span.end);
        if adjacent_paren && table.any_infix(&tok.text).is_some() {
            // `-(x)` stays a prefix minus; `op(a, b)` has a free comma
            let paired = self
                .scan_top_level(self.pos() + 2, |t| t.is_punct(","))
                .is_some();
            if paired || table.any_prefix(&tok.text).is_none() {
                return Ok(vec![Item::Atom(self.nested(Self::nonfix_application)?)]);
            }
        }
        match table.any_prefix(&tok.text) {
            Some(d) => {
                self.advance()?;
                Ok(vec![Item::Prefix(OpItem::Head(op_head(d, &tok.span)), d.prec)])
            }
            None => Ok(vec![]),
        }
    }

    /// Infix and postfix readings of an operator token, in that order.
    fn operator_items(&mut self, tok: &'t Token) -> Reply<Vec<Item<OpItem, Expr>>> {
        let table = OpTable::global();
        let mut out = Vec::new();
        if let Some(d) = table.any_infix(&tok.text) {
            let assoc = match d.fixity {
                Fixity::Infix(a) => a,
                _ => Assoc::Non,
            };
            let op = if d.builtin == Some(Builtin::Cartesian) {
                OpItem::Cartesian(tok.span.clone())
            } else {
                OpItem::Head(op_head(d, &tok.span))
            };
            out.push(Item::Infix(op, d.prec, assoc));
        }
        if let Some(d) = table.any_postfix(&tok.text) {
            out.push(Item::Postfix(OpItem::Head(op_head(d, &tok.span)), d.prec));
        }
        if !out.is_empty() {
            self.advance()?;
        }
        Ok(out)
    }

    /// `op(a, b)`: an infix operator used in prefix form.
    fn nonfix_application(&mut self) -> Reply<Expr> {
        let start = self.pos();
        let tok = self.advance()?;
        let Some(d) = OpTable::global().any_infix(&tok.text) else {
            return Err(self.defect("nonfix application of a non-infix operator"));
        };
        let head = op_head(d, &tok.span);
        let args = self.arguments()?;
        if args.len() != 2 {
            return Err(self.error(
                ErrorKind::UnexpectedToken,
                format!("{} takes two arguments", tok.text),
            ));
        }
        Ok(Expr::new(
            ExprKind::Apply(Box::new(head), args),
            self.span_since(start),
        ))
    }

    fn index_args(&mut self) -> Reply<Vec<Expr>> {
        self.expect_punct("[")?;
        self.nested(|st| {
            st.bracketed(|st| {
                st.commit(|st| {
                    let args = st.sep_by1(",", Self::parse_expr)?;
                    st.expect_punct("]")?;
                    Ok(args)
                })
            })
        })
    }

    // ── Bulleted lists ───────────────────────────────────────────────────

    /// `/\ a  /\ b ...` with every bullet in the same column.
    fn bulleted_list(&mut self) -> Reply<Expr> {
        let start = self.pos();
        let first = self.advance()?;
        let bullet = if first.text == "/\\" {
            Bullet::And
        } else {
            Bullet::Or
        };
        let col = first.column();
        let mut items = Vec::new();
        loop {
            items.push(self.nested(|st| st.with_ledge(col + 1, Self::parse_expr))?);
            match self.peek() {
                Some(t) if is_bullet(t) && t.text == first.text && t.column() == col => {
                    self.advance()?;
                }
                _ => break,
            }
        }
        Ok(Expr::new(
            ExprKind::List(bullet, items),
            self.span_since(start),
        ))
    }

    // ── Primary expressions ──────────────────────────────────────────────

    fn primary(&mut self) -> Reply<Expr> {
        if self.at_leaf() {
            self.primary_form()
        } else {
            self.nested(Self::primary_form)
        }
    }

    /// One-token operands, which never recurse.
    fn at_leaf(&self) -> bool {
        let Some(tok) = self.peek() else {
            return true;
        };
        match &tok.kind {
            TokenKind::Number | TokenKind::Str(_) => true,
            TokenKind::Ident => !self
                .peek_nth(1)
                .is_some_and(|t| t.is_punct("(") || t.is_punct("::") || t.is_punct("!")),
            TokenKind::Keyword => {
                matches!(tok.text.as_str(), "TRUE" | "FALSE" | "BOOLEAN" | "STRING")
            }
            TokenKind::Punct => tok.text == "@",
            _ => false,
        }
    }

    fn primary_form(&mut self) -> Reply<Expr> {
        let table: &[(&[Lead], Production<'t, super::Layout, Expr>)] = &[
            (&[Lead::AnyIdent], Self::ident_expr),
            (&[Lead::AnyNumber], Self::number),
            (&[Lead::AnyString], Self::string),
            (
                &[
                    Lead::Kw("TRUE"),
                    Lead::Kw("FALSE"),
                    Lead::Kw("BOOLEAN"),
                    Lead::Kw("STRING"),
                ],
                Self::constant,
            ),
            (&[Lead::Punct("(")], Self::parens),
            (&[Lead::Punct("{")], Self::set_expr),
            (&[Lead::Punct("[")], Self::bracket_expr),
            (&[Lead::Punct("<<")], Self::angle_expr),
            (&[Lead::Punct("\\A"), Lead::Punct("\\E")], Self::quantified),
            (&[Lead::Punct("\\AA"), Lead::Punct("\\EE")], Self::temporal_quantified),
            (&[Lead::Kw("CHOOSE")], Self::choose),
            (&[Lead::Kw("IF")], Self::if_expr),
            (&[Lead::Kw("CASE")], Self::case_expr),
            (&[Lead::Kw("LET")], Self::let_expr),
            (&[Lead::Kw("LAMBDA")], Self::lambda),
            (&[Lead::Kw("ASSUME")], Self::sequent_expr),
            (&[Lead::Punct("WF_"), Lead::Punct("SF_")], Self::fairness),
            (&[Lead::Punct("@")], Self::at),
        ];
        self.dispatch(table, Some(Self::no_expression))
    }

    fn no_expression(&mut self) -> Reply<Expr> {
        Err(self.unexpected("expression"))
    }

    /// Identifier with optional arguments, instance qualification or label.
    fn ident_expr(&mut self) -> Reply<Expr> {
        let start = self.pos();
        let name = self.ident()?;
        let mut e = Expr::new(ExprKind::Ident(name.node), name.span);
        if self.is_punct("(") {
            let args = self.arguments()?;
            e = Expr::new(ExprKind::Apply(Box::new(e), args), self.span_since(start));
        }
        if self.is_punct("::") {
            return self.label(e, start);
        }
        while self.is_punct("!") && self.peek_nth(1).is_some_and(|t| t.kind == TokenKind::Ident)
        {
            self.advance()?;
            let op = self.ident()?;
            let args = if self.is_punct("(") {
                self.arguments()?
            } else {
                Vec::new()
            };
            e = Expr::new(
                ExprKind::Bang(Box::new(e), op, args),
                self.span_since(start),
            );
        }
        Ok(e)
    }

    /// `( arg, ... )`
    pub(super) fn arguments(&mut self) -> Reply<Vec<Expr>> {
        self.expect_punct("(")?;
        self.bracketed(|st| {
            st.commit(|st| {
                let args = st.sep_by1(",", Self::argument)?;
                st.expect_punct(")")?;
                Ok(args)
            })
        })
    }

    /// An argument may be a bare operator (`F(+, S)`) or a `LAMBDA`.
    fn argument(&mut self) -> Reply<Expr> {
        if let Some(tok) = self.peek() {
            let closes = self
                .peek_nth(1)
                .is_some_and(|t| t.is_punct(",") || t.is_punct(")"));
            if tok.kind == TokenKind::Op && closes {
                if let Some(d) = OpTable::global().any_operator(&tok.text) {
                    self.advance()?;
                    return Ok(op_head(d, &tok.span));
                }
            }
            if tok.is_keyword("LAMBDA") {
                return self.lambda();
            }
        }
        self.parse_expr()
    }

    /// `name :: e` or `name(p, q) :: e`
    fn label(&mut self, head: Expr, start: usize) -> Reply<Expr> {
        let (name, args) = match head.node {
            ExprKind::Ident(n) => (Spanned::new(n, head.span), Vec::new()),
            ExprKind::Apply(h, args) => match *h {
                Expr {
                    node: ExprKind::Ident(n),
                    span,
                } => (Spanned::new(n, span), args),
                _ => return Err(self.unexpected("label name")),
            },
            _ => return Err(self.unexpected("label name")),
        };
        let mut params = Vec::with_capacity(args.len());
        for a in args {
            match a.node {
                ExprKind::Ident(p) => params.push(Spanned::new(p, a.span)),
                _ => {
                    return Err(self
                        .error(ErrorKind::UnexpectedToken, "label parameters must be names")
                        .at(&a.span))
                }
            }
        }
        self.expect_punct("::")?;
        let body = self.commit(Self::parse_expr)?;
        Ok(Expr::new(
            ExprKind::Label(name, params, Box::new(body)),
            self.span_since(start),
        ))
    }

    fn number(&mut self) -> Reply<Expr> {
        let tok = self.advance()?;
        Ok(Expr::new(
            ExprKind::Num(number_of(&tok.text)),
            tok.span.clone(),
        ))
    }

    fn string(&mut self) -> Reply<Expr> {
        let tok = self.advance()?;
        match &tok.kind {
            TokenKind::Str(s) => Ok(Expr::new(ExprKind::Str(s.clone()), tok.span.clone())),
            _ => Err(self.defect("string production on a non-string token")),
        }
    }

    fn constant(&mut self) -> Reply<Expr> {
        let tok = self.advance()?;
        let kind = match tok.text.as_str() {
            "TRUE" => ExprKind::Bool(true),
            "FALSE" => ExprKind::Bool(false),
            "BOOLEAN" => ExprKind::Internal(Builtin::Boolean),
            _ => ExprKind::Internal(Builtin::StringSet),
        };
        Ok(Expr::new(kind, tok.span.clone()))
    }

    fn at(&mut self) -> Reply<Expr> {
        let span = self.expect_punct("@")?;
        Ok(Expr::new(ExprKind::At, span))
    }

    fn parens(&mut self) -> Reply<Expr> {
        let start = self.pos();
        self.expect_punct("(")?;
        let inner = self.bracketed(|st| {
            st.commit(|st| {
                let e = st.parse_expr()?;
                st.expect_punct(")")?;
                Ok(e)
            })
        })?;
        Ok(Expr::new(
            ExprKind::Parens(Box::new(inner)),
            self.span_since(start),
        ))
    }

    // ── Sets, functions, records, tuples ─────────────────────────────────

    fn set_expr(&mut self) -> Reply<Expr> {
        let start = self.pos();
        self.expect_punct("{")?;
        let kind = self.bracketed(|st| st.commit(Self::set_body))?;
        Ok(Expr::new(kind, self.span_since(start)))
    }

    fn set_body(&mut self) -> Reply<ExprKind> {
        if self.eat_punct("}") {
            return Ok(ExprKind::SetEnum(Vec::new()));
        }
        // `{x \in S : P}` and `{x \in S, y}` share a prefix of any length;
        // a free `:` before the first free `,` picks the filter
        let filter = self.pattern_ahead()
            && self
                .scan_top_level(self.pos(), |t| t.is_punct(":") || t.is_punct(","))
                .is_some_and(|t| t.is_punct(":"));
        if filter {
            let pattern = if self.is_punct("<<") {
                self.tuple_pattern()?
            } else {
                Pattern::Name(self.ident()?)
            };
            self.expect_op("\\in")?;
            let domain = self.parse_expr()?;
            self.expect_punct(":")?;
            let pred = self.parse_expr()?;
            self.expect_punct("}")?;
            return Ok(ExprKind::SetSt(pattern, Box::new(domain), Box::new(pred)));
        }
        let first = self.parse_expr()?;
        if self.eat_punct(":") {
            let bounds = self.bounds()?;
            self.expect_punct("}")?;
            return Ok(ExprKind::SetOf(Box::new(first), bounds));
        }
        let mut elems = vec![first];
        while self.eat_punct(",") {
            elems.push(self.parse_expr()?);
        }
        self.expect_punct("}")?;
        Ok(ExprKind::SetEnum(elems))
    }

    fn bracket_expr(&mut self) -> Reply<Expr> {
        let start = self.pos();
        self.expect_punct("[")?;
        let kind = self.bracketed(|st| st.commit(Self::bracket_body))?;
        Ok(Expr::new(kind, self.span_since(start)))
    }

    fn bracket_body(&mut self) -> Reply<ExprKind> {
        let field_first = self.peek().is_some_and(Token::is_ident);
        let second = self.peek_nth(1);
        if field_first && second.is_some_and(|t| t.is_punct("|->")) {
            let fields = self.sep_by1(",", |st| st.field("|->"))?;
            self.expect_punct("]")?;
            return Ok(ExprKind::Record(fields));
        }
        if field_first && second.is_some_and(|t| t.is_punct(":")) {
            let fields = self.sep_by1(",", |st| st.field(":"))?;
            self.expect_punct("]")?;
            return Ok(ExprKind::Rect(fields));
        }
        let binds = self.peek().is_some_and(|t| t.is_ident() || t.is_punct("<<"))
            && self
                .scan_top_level(self.pos(), |t| t.is_punct("|->"))
                .is_some();
        if binds {
            let bounds = self.bounds()?;
            self.expect_punct("|->")?;
            let body = self.parse_expr()?;
            self.expect_punct("]")?;
            return Ok(ExprKind::Fcn(bounds, Box::new(body)));
        }

        let e = self.parse_expr()?;
        if self.eat_kw("EXCEPT") {
            let specs = self.sep_by1(",", Self::except_spec)?;
            self.expect_punct("]")?;
            return Ok(ExprKind::Except(Box::new(e), specs));
        }
        if self.eat_punct("->") {
            let range = self.parse_expr()?;
            self.expect_punct("]")?;
            return Ok(ExprKind::Arrow(Box::new(e), Box::new(range)));
        }
        if self.eat_punct("]_") {
            let sub = self.subscript()?;
            return Ok(ExprKind::Sub(Modal::Box, Box::new(e), Box::new(sub)));
        }
        Err(self.expected_one_of(&["EXCEPT", "->", "]_"]))
    }

    /// `name sep e` inside a record or record set.
    fn field(&mut self, sep: &str) -> Reply<(Spanned<String>, Expr)> {
        let name = self.ident()?;
        self.expect_punct(sep)?;
        Ok((name, self.parse_expr()?))
    }

    /// `!.a[i] = e`
    fn except_spec(&mut self) -> Reply<Exspec> {
        self.expect_punct("!")?;
        let mut path = Vec::new();
        loop {
            if self.eat_punct(".") {
                path.push(Expoint::Dot(self.ident()?));
            } else if self.is_punct("[") {
                path.push(Expoint::Index(self.index_args()?));
            } else {
                break;
            }
        }
        if path.is_empty() {
            return Err(self.expected_one_of(&[".", "["]));
        }
        self.expect_op("=")?;
        let value = self.parse_expr()?;
        Ok(Exspec { path, value })
    }

    fn angle_expr(&mut self) -> Reply<Expr> {
        let start = self.pos();
        self.expect_punct("<<")?;
        let kind = self.bracketed(|st| {
            st.commit(|st| {
                if st.eat_punct(">>") {
                    return Ok(ExprKind::Tuple(Vec::new()));
                }
                let mut elems = st.sep_by1(",", Self::parse_expr)?;
                if st.eat_punct(">>") {
                    return Ok(ExprKind::Tuple(elems));
                }
                if elems.len() == 1 && st.eat_punct(">>_") {
                    let action = elems.remove(0);
                    let sub = st.subscript()?;
                    return Ok(ExprKind::Sub(Modal::Angle, Box::new(action), Box::new(sub)));
                }
                Err(st.expected_one_of(&[">>", ">>_"]))
            })
        })?;
        Ok(Expr::new(kind, self.span_since(start)))
    }

    /// The `v` in `[A]_v`, `<<A>>_v` and `WF_v(A)`.
    fn subscript(&mut self) -> Reply<Expr> {
        match self.peek() {
            Some(t) if t.is_ident() => {
                let name = self.ident()?;
                Ok(Expr::new(ExprKind::Ident(name.node), name.span))
            }
            Some(t) if t.is_punct("<<") => self.angle_expr(),
            Some(t) if t.is_punct("(") => self.parens(),
            _ => Err(self.unexpected("subscript")),
        }
    }

    // ── Binders ──────────────────────────────────────────────────────────

    fn quantified(&mut self) -> Reply<Expr> {
        let start = self.pos();
        let tok = self.advance()?;
        let q = if tok.text == "\\A" {
            Quantifier::Forall
        } else {
            Quantifier::Exists
        };
        self.commit(|st| {
            let bounds = st.bounds()?;
            st.expect_punct(":")?;
            let body = st.parse_expr()?;
            Ok(Expr::new(
                ExprKind::Quant(q, bounds, Box::new(body)),
                st.span_since(start),
            ))
        })
    }

    fn temporal_quantified(&mut self) -> Reply<Expr> {
        let start = self.pos();
        let tok = self.advance()?;
        let q = if tok.text == "\\AA" {
            Quantifier::Forall
        } else {
            Quantifier::Exists
        };
        self.commit(|st| {
            let names = st.sep_by1(",", |st| st.ident())?;
            st.expect_punct(":")?;
            let body = st.parse_expr()?;
            Ok(Expr::new(
                ExprKind::Tquant(q, names, Box::new(body)),
                st.span_since(start),
            ))
        })
    }

    fn choose(&mut self) -> Reply<Expr> {
        let start = self.pos();
        self.expect_kw("CHOOSE")?;
        self.commit(|st| {
            let name = st.ident()?;
            let domain = if st.is_op("\\in") {
                st.advance()?;
                Some(Box::new(st.parse_expr()?))
            } else {
                None
            };
            st.expect_punct(":")?;
            let body = st.parse_expr()?;
            Ok(Expr::new(
                ExprKind::Choose(name, domain, Box::new(body)),
                st.span_since(start),
            ))
        })
    }

    fn lambda(&mut self) -> Reply<Expr> {
        let start = self.pos();
        self.expect_kw("LAMBDA")?;
        self.commit(|st| {
            let params = st.sep_by1(",", |st| st.ident())?;
            st.expect_punct(":")?;
            let body = st.parse_expr()?;
            Ok(Expr::new(
                ExprKind::Lambda(params, Box::new(body)),
                st.span_since(start),
            ))
        })
    }

    // ── Control ──────────────────────────────────────────────────────────

    fn if_expr(&mut self) -> Reply<Expr> {
        let start = self.pos();
        self.expect_kw("IF")?;
        self.commit(|st| {
            let cond = st.parse_expr()?;
            st.expect_kw("THEN")?;
            let then = st.parse_expr()?;
            st.expect_kw("ELSE")?;
            let other = st.parse_expr()?;
            Ok(Expr::new(
                ExprKind::If(Box::new(cond), Box::new(then), Box::new(other)),
                st.span_since(start),
            ))
        })
    }

    /// `CASE p -> e [] q -> f [] OTHER -> g`
    fn case_expr(&mut self) -> Reply<Expr> {
        let start = self.pos();
        self.expect_kw("CASE")?;
        self.commit(|st| {
            let mut arms = Vec::new();
            let mut other = None;
            loop {
                if !arms.is_empty() {
                    if !st.is_op("[]") {
                        break;
                    }
                    st.advance()?;
                }
                if st.eat_kw("OTHER") {
                    st.expect_punct("->")?;
                    other = Some(Box::new(st.parse_expr()?));
                    break;
                }
                let guard = st.parse_expr()?;
                st.expect_punct("->")?;
                let value = st.parse_expr()?;
                arms.push((guard, value));
            }
            Ok(Expr::new(
                ExprKind::Case(arms, other),
                st.span_since(start),
            ))
        })
    }

    fn let_expr(&mut self) -> Reply<Expr> {
        let start = self.pos();
        self.expect_kw("LET")?;
        self.commit(|st| {
            let defs = st.many1(|st| st.definition(false))?;
            st.expect_kw("IN")?;
            let body = st.parse_expr()?;
            Ok(Expr::new(
                ExprKind::Let(defs, Box::new(body)),
                st.span_since(start),
            ))
        })
    }

    fn sequent_expr(&mut self) -> Reply<Expr> {
        let start = self.pos();
        let sq = self.sequent()?;
        Ok(Expr::new(
            ExprKind::Sequent(Box::new(sq)),
            self.span_since(start),
        ))
    }

    /// `WF_v(A)` / `SF_v(A)`
    fn fairness(&mut self) -> Reply<Expr> {
        let start = self.pos();
        let tok = self.advance()?;
        let fairness = if tok.text == "WF_" {
            Fairness::Weak
        } else {
            Fairness::Strong
        };
        self.commit(|st| {
            let sub = st.subscript()?;
            st.expect_punct("(")?;
            let action = st.bracketed(|st| {
                let a = st.parse_expr()?;
                st.expect_punct(")")?;
                Ok(a)
            })?;
            Ok(Expr::new(
                ExprKind::Fair(fairness, Box::new(sub), Box::new(action)),
                st.span_since(start),
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::*;
    use crate::error::ErrorKind;
    use crate::parser::parse_expr_str;

    fn parse(src: &str) -> Expr {
        parse_expr_str(src).unwrap_or_else(|d| panic!("{:?} failed: {}", src, d))
    }

    fn ident(name: &str) -> Expr {
        Expr::new(ExprKind::Ident(name.into()), crate::span::Span::unknown())
    }

    fn apply(b: Builtin, args: Vec<Expr>) -> ExprKind {
        ExprKind::Apply(
            Box::new(Expr::new(ExprKind::Internal(b), crate::span::Span::unknown())),
            args,
        )
    }

    fn num(n: &str) -> Expr {
        Expr::new(
            ExprKind::Num(Number::Nat(Radix::Decimal, n.into())),
            crate::span::Span::unknown(),
        )
    }

    fn e(kind: ExprKind) -> Expr {
        Expr::new(kind, crate::span::Span::unknown())
    }

    #[test]
    fn multiplication_nests_inside_addition() {
        let got = parse("1 + 2 * 3");
        let want = apply(
            Builtin::Plus,
            vec![num("1"), e(apply(Builtin::Mult, vec![num("2"), num("3")]))],
        );
        assert_eq!(got.node, want);
    }

    #[test]
    fn junctions_lean_left_without_bullets() {
        let got = parse("TRUE /\\ FALSE \\/ TRUE");
        let t = || e(ExprKind::Bool(true));
        let f = e(ExprKind::Bool(false));
        let want = apply(
            Builtin::Disj,
            vec![e(apply(Builtin::Conj, vec![t(), f])), t()],
        );
        assert_eq!(got.node, want);
    }

    #[test]
    fn bulleted_list_is_one_node() {
        let got = parse("/\\ x = 1\n/\\ y = 2");
        let want = ExprKind::List(
            Bullet::And,
            vec![
                e(apply(Builtin::Eq, vec![ident("x"), num("1")])),
                e(apply(Builtin::Eq, vec![ident("y"), num("2")])),
            ],
        );
        assert_eq!(got.node, want);
    }

    #[test]
    fn nested_bullets_follow_columns() {
        let got = parse("/\\ a\n/\\ \\/ b\n   \\/ c\n/\\ d");
        let ExprKind::List(Bullet::And, items) = &got.node else {
            panic!("expected conjunction list, got {:?}", got.node);
        };
        assert_eq!(items.len(), 3);
        assert_eq!(
            items[1].node,
            ExprKind::List(Bullet::Or, vec![ident("b"), ident("c")])
        );
    }

    #[test]
    fn bullet_columns_count_characters() {
        let got = parse("(* \u{e9}t\u{e9} *) /\\ a\n          /\\ b");
        assert_eq!(
            got.node,
            ExprKind::List(Bullet::And, vec![ident("a"), ident("b")])
        );
    }

    #[test]
    fn bullet_operand_ends_at_an_outdented_token() {
        let got = parse("  /\\ a\n  /\\ b\n=> c");
        let ExprKind::Apply(head, args) = &got.node else {
            panic!("expected implication, got {:?}", got.node);
        };
        assert_eq!(head.node, ExprKind::Internal(Builtin::Implies));
        assert!(matches!(args[0].node, ExprKind::List(Bullet::And, _)));
    }

    #[test]
    fn except_with_index_and_field_trailers() {
        let got = parse("[f EXCEPT ![1] = 2, !.g = 3]");
        let ExprKind::Except(base, specs) = &got.node else {
            panic!("expected EXCEPT, got {:?}", got.node);
        };
        assert_eq!(base.node, ExprKind::Ident("f".into()));
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].path, vec![Expoint::Index(vec![num("1")])]);
        assert!(matches!(&specs[1].path[..], [Expoint::Dot(g)] if g.node == "g"));
        assert_eq!(specs[1].value, num("3"));
    }

    #[test]
    fn missing_operator_points_at_second_atom() {
        let err = parse_expr_str("1 2").unwrap_err();
        assert_eq!(err.kind, ErrorKind::AmbiguousOperatorSequence);
        assert!(err.mentions("missing operator"));
        assert_eq!(err.span.start.col, 2);
        assert_eq!(err.span.end.col, 3);
    }

    #[test]
    fn precedence_conflict_is_reported() {
        let err = parse_expr_str("a = b = c").unwrap_err();
        assert_eq!(err.kind, ErrorKind::AmbiguousOperatorSequence);
        assert!(err.mentions("precedence conflict"));
    }

    #[test]
    fn function_application_and_fields_bind_tightest() {
        let got = parse("-f[x].a'");
        // -( ((f[x]).a)' )
        let ExprKind::Apply(neg, args) = &got.node else {
            panic!("{:?}", got.node)
        };
        assert_eq!(neg.node, ExprKind::Internal(Builtin::Uminus));
        let ExprKind::Apply(prime, inner) = &args[0].node else {
            panic!("{:?}", args[0].node)
        };
        assert_eq!(prime.node, ExprKind::Internal(Builtin::Prime));
        assert!(matches!(&inner[0].node, ExprKind::Dot(sel, a)
            if a.node == "a" && matches!(sel.node, ExprKind::FcnApp(..))));
    }

    #[test]
    fn cartesian_products_flatten() {
        let got = parse("A \\X B \\X C");
        assert_eq!(
            got.node,
            apply(Builtin::Cartesian, vec![ident("A"), ident("B"), ident("C")])
        );
        let got = parse("(A \\X B) \\X C");
        let ExprKind::Apply(_, args) = &got.node else {
            panic!()
        };
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn nonfix_application_of_infix_operator() {
        let got = parse("+(1, 2)");
        assert_eq!(got.node, apply(Builtin::Plus, vec![num("1"), num("2")]));
        let got = parse("-(1)");
        assert_eq!(
            got.node,
            apply(Builtin::Uminus, vec![e(ExprKind::Parens(Box::new(num("1"))))])
        );
    }

    #[test]
    fn operators_as_arguments() {
        let got = parse("F(+, \\oplus, x)");
        let ExprKind::Apply(_, args) = &got.node else {
            panic!()
        };
        assert_eq!(args[0].node, ExprKind::Internal(Builtin::Plus));
        assert_eq!(args[1].node, ExprKind::Ident("(+)".into()));
    }

    #[test]
    fn set_forms() {
        assert!(matches!(parse("{}").node, ExprKind::SetEnum(v) if v.is_empty()));
        assert!(matches!(parse("{1, 2}").node, ExprKind::SetEnum(v) if v.len() == 2));
        assert!(matches!(parse("{x \\in S : x > 0}").node, ExprKind::SetSt(..)));
        assert!(matches!(
            parse("{x + 1 : x \\in S, y \\in T}").node,
            ExprKind::SetOf(_, b) if b.len() == 2
        ));
    }

    #[test]
    fn bracket_forms() {
        assert!(matches!(parse("[x \\in S |-> x]").node, ExprKind::Fcn(..)));
        assert!(matches!(parse("[S -> T]").node, ExprKind::Arrow(..)));
        assert!(matches!(parse("[a |-> 1, b |-> 2]").node, ExprKind::Record(f) if f.len() == 2));
        assert!(matches!(parse("[a : S]").node, ExprKind::Rect(..)));
        assert!(matches!(
            parse("[Next]_vars").node,
            ExprKind::Sub(Modal::Box, ..)
        ));
        assert!(matches!(
            parse("<<A>>_<<x, y>>").node,
            ExprKind::Sub(Modal::Angle, ..)
        ));
        assert!(matches!(parse("<<>>").node, ExprKind::Tuple(v) if v.is_empty()));
    }

    #[test]
    fn binders_and_bounds() {
        let got = parse("\\A x, y \\in S, z : P");
        let ExprKind::Quant(Quantifier::Forall, bounds, _) = &got.node else {
            panic!("{:?}", got.node)
        };
        let domains: Vec<_> = bounds.iter().map(|b| &b.domain).collect();
        assert!(matches!(domains[0], Domain::Bounded(_)));
        assert_eq!(domains[1], &Domain::Ditto);
        assert_eq!(domains[2], &Domain::Ditto);

        let got = parse("\\E x, y : x = y");
        let ExprKind::Quant(Quantifier::Exists, bounds, _) = &got.node else {
            panic!()
        };
        assert!(bounds.iter().all(|b| b.domain == Domain::Unbounded));

        assert!(matches!(parse("CHOOSE x \\in S : TRUE").node, ExprKind::Choose(_, Some(_), _)));
        assert!(matches!(parse("\\EE x : P").node, ExprKind::Tquant(..)));
        assert!(matches!(parse("LAMBDA x, y : x").node, ExprKind::Lambda(p, _) if p.len() == 2));
    }

    #[test]
    fn tuple_patterns_bind_components() {
        let got = parse("{<<a, b>> \\in S : a > b}");
        let ExprKind::SetSt(Pattern::Tuple(names), ..) = &got.node else {
            panic!("{:?}", got.node)
        };
        assert_eq!(names.len(), 2);

        let got = parse("[<<a, b>> \\in S, c \\in T |-> a]");
        let ExprKind::Fcn(bounds, _) = &got.node else {
            panic!("{:?}", got.node)
        };
        assert!(matches!(&bounds[0].pattern, Pattern::Tuple(n) if n.len() == 2));
        assert!(matches!(&bounds[1].pattern, Pattern::Name(n) if n.node == "c"));

        let got = parse("\\A <<a, b>> \\in S : a");
        let ExprKind::Quant(Quantifier::Forall, bounds, _) = &got.node else {
            panic!("{:?}", got.node)
        };
        let names: Vec<_> = bounds[0].pattern.names().map(|n| n.node.as_str()).collect();
        assert_eq!(names, ["a", "b"]);

        // a membership test inside an enumeration is not a binder
        assert!(matches!(
            parse("{<<a, b>> \\in S}").node,
            ExprKind::SetEnum(v) if v.len() == 1
        ));
        assert!(matches!(
            parse("{x \\in S, y}").node,
            ExprKind::SetEnum(v) if v.len() == 2
        ));
    }

    #[test]
    fn deep_binder_nesting_parses_in_linear_passes() {
        let depth = 30;
        let src = format!("{}x{}", "{x \\in ".repeat(depth), " : TRUE}".repeat(depth));
        let mut got = parse(&src);
        for _ in 0..depth {
            let ExprKind::SetSt(_, domain, _) = got.node else {
                panic!("expected a filtered set")
            };
            got = *domain;
        }
        assert_eq!(got.node, ExprKind::Ident("x".into()));

        let src = format!("{}x{}", "[x \\in ".repeat(depth), " |-> 1]".repeat(depth));
        assert!(matches!(parse(&src).node, ExprKind::Fcn(..)));
        let src = format!("{}S{}", "[".repeat(depth), " -> T]".repeat(depth));
        assert!(matches!(parse(&src).node, ExprKind::Arrow(..)));
        let src = format!("{}x{}", "-(".repeat(depth), ")".repeat(depth));
        assert!(matches!(parse(&src).node, ExprKind::Apply(..)));
        let src = format!("{}a{}", "+(".repeat(depth), ", c)".repeat(depth));
        assert!(matches!(parse(&src).node, ExprKind::Apply(_, args) if args.len() == 2));
    }

    #[test]
    fn control_forms() {
        assert!(matches!(parse("IF a THEN b ELSE c").node, ExprKind::If(..)));
        let got = parse("CASE x = 1 -> a\n  [] x = 2 -> b\n  [] OTHER -> c");
        assert!(matches!(got.node, ExprKind::Case(arms, Some(_)) if arms.len() == 2));
        let got = parse("LET f(a) == a + 1\n    g == 2\nIN f(g)");
        assert!(matches!(got.node, ExprKind::Let(defs, _) if defs.len() == 2));
    }

    #[test]
    fn temporal_forms() {
        let got = parse("Init /\\ [][Next]_vars /\\ WF_vars(Next)");
        let ExprKind::Apply(_, args) = &got.node else {
            panic!()
        };
        assert!(matches!(args[1].node, ExprKind::Fair(Fairness::Weak, ..)));
    }

    #[test]
    fn instance_qualification_and_labels() {
        let got = parse("M!Op(1)");
        assert!(matches!(&got.node, ExprKind::Bang(_, op, args) if op.node == "Op" && args.len() == 1));
        let got = parse("I(x)!J!K");
        assert!(matches!(&got.node, ExprKind::Bang(base, k, _)
            if k.node == "K" && matches!(base.node, ExprKind::Bang(..))));
        let got = parse("P(a) :: a > 0");
        assert!(matches!(&got.node, ExprKind::Label(n, ps, _) if n.node == "P" && ps.len() == 1));
    }

    #[test]
    fn literals() {
        assert_eq!(
            parse("\\hFF").node,
            ExprKind::Num(Number::Nat(Radix::Hex, "FF".into()))
        );
        assert_eq!(
            parse("2.50").node,
            ExprKind::Num(Number::Decimal("2".into(), "50".into()))
        );
        assert_eq!(parse("\"hi\"").node, ExprKind::Str("hi".into()));
        assert_eq!(parse("STRING").node, ExprKind::Internal(Builtin::StringSet));
    }

    #[test]
    fn unclosed_bracket_is_committed() {
        let err = parse_expr_str("f(1, 2").unwrap_err();
        assert!(err.expected.iter().any(|e| e == "\")\""));
    }
}
