use super::expressions::{op_head, starts_operand};
use super::Parser;
use crate::ast::{
    Bound, Defn, DefnKind, Domain, Expr, HeadForm, Instance, Param, Pattern, Shape,
};
use crate::combinator::Reply;
use crate::lexer::{Token, TokenKind};
use crate::ops::{FixityClass, OpTable};
use crate::span::Spanned;

/// How a definition head is laid out, judged from the first few tokens.
enum Head {
    Prefix,
    Infix,
    Postfix,
    Function,
    Nonfix,
}

fn is_op_of(tok: Option<&Token>, class: FixityClass) -> bool {
    tok.is_some_and(|t| {
        t.kind == TokenKind::Op
            && OpTable::global()
                .lookup(&t.text)
                .any(|d| d.fixity.class() == class)
    })
}

fn is_defeq(tok: Option<&Token>) -> bool {
    tok.is_some_and(|t| t.is_punct("=="))
}

fn is_ident(tok: Option<&Token>) -> bool {
    tok.is_some_and(Token::is_ident)
}

impl<'t> Parser<'t> {
    fn definition_head(&self) -> Option<Head> {
        let t: [Option<&Token>; 4] = [
            self.peek(),
            self.peek_nth(1),
            self.peek_nth(2),
            self.peek_nth(3),
        ];
        if is_op_of(t[0], FixityClass::Prefix) && is_ident(t[1]) && is_defeq(t[2]) {
            return Some(Head::Prefix);
        }
        if !is_ident(t[0]) {
            return None;
        }
        if is_op_of(t[1], FixityClass::Infix) && is_ident(t[2]) && is_defeq(t[3]) {
            return Some(Head::Infix);
        }
        if is_op_of(t[1], FixityClass::Postfix) && is_defeq(t[2]) {
            return Some(Head::Postfix);
        }
        match t[1] {
            Some(tok) if tok.is_punct("[") => Some(Head::Function),
            Some(tok) if tok.is_punct("(") || tok.is_punct("==") => Some(Head::Nonfix),
            _ => None,
        }
    }

    // ── Definitions ──────────────────────────────────────────────────────

    /// One operator, function or instance definition.
    pub(super) fn definition(&mut self, local: bool) -> Reply<Defn> {
        match self.definition_head() {
            Some(Head::Prefix) => {
                let name = self.operator_name(FixityClass::Prefix)?;
                let arg = self.ident()?;
                let params = vec![Param {
                    name: arg,
                    shape: Shape::Expr,
                }];
                self.operator_body(name, local, HeadForm::Prefix, params)
            }
            Some(Head::Infix) => {
                let lhs = self.ident()?;
                let name = self.operator_name(FixityClass::Infix)?;
                let rhs = self.ident()?;
                let params = [lhs, rhs]
                    .into_iter()
                    .map(|name| Param {
                        name,
                        shape: Shape::Expr,
                    })
                    .collect();
                self.operator_body(name, local, HeadForm::Infix, params)
            }
            Some(Head::Postfix) => {
                let arg = self.ident()?;
                let name = self.operator_name(FixityClass::Postfix)?;
                let params = vec![Param {
                    name: arg,
                    shape: Shape::Expr,
                }];
                self.operator_body(name, local, HeadForm::Postfix, params)
            }
            Some(Head::Function) => {
                let name = self.ident()?;
                self.expect_punct("[")?;
                let bounds = self.bracketed(|st| {
                    let b = st.bounds()?;
                    st.expect_punct("]")?;
                    Ok(b)
                })?;
                self.expect_punct("==")?;
                let body = self.commit(Self::parse_expr)?;
                Ok(Defn {
                    name,
                    local,
                    kind: DefnKind::Function { bounds, body },
                })
            }
            Some(Head::Nonfix) => {
                let name = self.ident()?;
                let params = if self.is_punct("(") {
                    self.params()?
                } else {
                    Vec::new()
                };
                if self.peek_nth(1).is_some_and(|t| t.is_keyword("INSTANCE")) {
                    self.expect_punct("==")?;
                    let instance = self.commit(Self::instance)?;
                    return Ok(Defn {
                        name,
                        local,
                        kind: DefnKind::Instance { params, instance },
                    });
                }
                self.operator_body(name, local, HeadForm::Nonfix, params)
            }
            None => Err(self.unexpected("definition")),
        }
    }

    fn operator_body(
        &mut self,
        name: Spanned<String>,
        local: bool,
        form: HeadForm,
        params: Vec<Param>,
    ) -> Reply<Defn> {
        self.expect_punct("==")?;
        let body = self.commit(Self::parse_expr)?;
        Ok(Defn {
            name,
            local,
            kind: DefnKind::Operator { form, params, body },
        })
    }

    /// An operator symbol, stored under its canonical spelling.
    pub(super) fn operator_name(&mut self, class: FixityClass) -> Reply<Spanned<String>> {
        let describe = match class {
            FixityClass::Prefix => "prefix operator",
            FixityClass::Infix => "infix operator",
            FixityClass::Postfix => "postfix operator",
        };
        let Some(tok) = self.peek() else {
            return Err(self.unexpected(describe));
        };
        match OpTable::global().find(&tok.text, class) {
            Some(d) if tok.kind == TokenKind::Op => {
                self.advance()?;
                Ok(Spanned::new(d.name.to_owned(), tok.span.clone()))
            }
            _ => Err(self.unexpected(describe)),
        }
    }

    /// `(x, F(_, _), _ + _, -. _, _ ^+)`
    fn params(&mut self) -> Reply<Vec<Param>> {
        self.expect_punct("(")?;
        self.bracketed(|st| {
            st.commit(|st| {
                let ps = st.sep_by1(",", Self::param)?;
                st.expect_punct(")")?;
                Ok(ps)
            })
        })
    }

    pub(super) fn param(&mut self) -> Reply<Param> {
        if self.eat_punct("_") {
            if self.peek_nth(1).is_some_and(|t| t.is_punct("_")) {
                let name = self.operator_name(FixityClass::Infix)?;
                self.expect_punct("_")?;
                return Ok(Param {
                    name,
                    shape: Shape::Op(2),
                });
            }
            let name = self.operator_name(FixityClass::Postfix)?;
            return Ok(Param {
                name,
                shape: Shape::Op(1),
            });
        }
        if self.peek().is_some_and(|t| t.kind == TokenKind::Op) {
            let name = self.operator_name(FixityClass::Prefix)?;
            self.expect_punct("_")?;
            return Ok(Param {
                name,
                shape: Shape::Op(1),
            });
        }
        let name = self.ident()?;
        let shape = self.placeholder_shape()?;
        Ok(Param { name, shape })
    }

    /// `(_, _)` after a declared name; `Expr` when absent.
    pub(super) fn placeholder_shape(&mut self) -> Reply<Shape> {
        if !self.is_punct("(") {
            return Ok(Shape::Expr);
        }
        self.advance()?;
        let holes = self.sep_by1(",", |st| st.expect_punct("_"))?;
        self.expect_punct(")")?;
        Ok(Shape::Op(holes.len()))
    }

    // ── Bounds ───────────────────────────────────────────────────────────

    /// `x, y \in S, <<a, b>> \in T, w`
    ///
    /// A group of names sharing one `\in` records the domain on its first
    /// name and `Ditto` on the rest. Names after the last domain repeat it
    /// (`Ditto`); with no domain anywhere they are `Unbounded`. A tuple
    /// pattern starts a group of its own and needs a domain.
    pub(super) fn bounds(&mut self) -> Reply<Vec<Bound>> {
        let mut out = Vec::new();
        let mut pending: Vec<Spanned<String>> = Vec::new();
        loop {
            if pending.is_empty() && self.is_punct("<<") {
                let pattern = self.tuple_pattern()?;
                self.expect_op("\\in")?;
                let domain = self.parse_expr()?;
                out.push(Bound {
                    pattern,
                    domain: Domain::Bounded(domain),
                });
            } else {
                pending.push(self.ident()?);
                if self.is_op("\\in") {
                    self.advance()?;
                    let mut domain = Some(self.parse_expr()?);
                    for name in pending.drain(..) {
                        let d = match domain.take() {
                            Some(e) => Domain::Bounded(e),
                            None => Domain::Ditto,
                        };
                        out.push(Bound {
                            pattern: Pattern::Name(name),
                            domain: d,
                        });
                    }
                }
            }
            let more = self.is_punct(",")
                && self
                    .peek_nth(1)
                    .is_some_and(|t| t.is_ident() || t.is_punct("<<"));
            if !more {
                break;
            }
            self.advance()?;
        }
        let rest = if out.is_empty() {
            Domain::Unbounded
        } else {
            Domain::Ditto
        };
        out.extend(pending.into_iter().map(|name| Bound {
            pattern: Pattern::Name(name),
            domain: rest.clone(),
        }));
        Ok(out)
    }

    /// `<<x, y, ...>>`
    pub(super) fn tuple_pattern(&mut self) -> Reply<Pattern> {
        self.expect_punct("<<")?;
        let names = self.sep_by1(",", |st| st.ident())?;
        self.expect_punct(">>")?;
        Ok(Pattern::Tuple(names))
    }

    /// Whether a bound pattern followed by `\in` starts at the cursor.
    pub(super) fn pattern_ahead(&self) -> bool {
        let Some(first) = self.peek() else {
            return false;
        };
        if first.is_ident() {
            return self.peek_nth(1).is_some_and(|t| t.is_op("\\in"));
        }
        if !first.is_punct("<<") {
            return false;
        }
        let mut n = 1;
        loop {
            if !self.peek_nth(n).is_some_and(Token::is_ident) {
                return false;
            }
            match self.peek_nth(n + 1) {
                Some(t) if t.is_punct(",") => n += 2,
                Some(t) if t.is_punct(">>") => {
                    return self.peek_nth(n + 2).is_some_and(|t| t.is_op("\\in"))
                }
                _ => return false,
            }
        }
    }

    // ── Instances ────────────────────────────────────────────────────────

    /// `INSTANCE M WITH a <- e, + <- f`
    pub(super) fn instance(&mut self) -> Reply<Instance> {
        self.expect_kw("INSTANCE")?;
        let module = self.ident()?;
        let mut subs = Vec::new();
        if self.eat_kw("WITH") {
            subs = self.commit(|st| st.sep_by1(",", Self::substitution))?;
        }
        Ok(Instance { module, subs })
    }

    fn substitution(&mut self) -> Reply<(Spanned<String>, Expr)> {
        let target = match self.peek() {
            Some(t) if t.kind == TokenKind::Op => {
                let Some(d) = OpTable::global().any_operator(&t.text) else {
                    return Err(self.unexpected("substitution target"));
                };
                self.advance()?;
                Spanned::new(d.name.to_owned(), t.span.clone())
            }
            _ => self.ident()?,
        };
        self.expect_punct("<-")?;
        let value = self.argument_value()?;
        Ok((target, value))
    }

    /// Right-hand side of a substitution: an expression or a bare operator.
    fn argument_value(&mut self) -> Reply<Expr> {
        if let Some(tok) = self.peek() {
            let bare = self.peek_nth(1).map_or(true, |next| {
                next.is_punct(",")
                    || next.span.start.line > tok.span.start.line
                    || !starts_operand(next)
            });
            if tok.kind == TokenKind::Op && bare {
                if let Some(d) = OpTable::global().any_operator(&tok.text) {
                    self.advance()?;
                    return Ok(op_head(d, &tok.span));
                }
            }
        }
        self.parse_expr()
    }
}
