use super::Parser;
use crate::ast::{
    Expr, ExprKind, Fact, Hyp, Marker, NewKind, Omission, Proof, Qed, Sequent, Step, StepKind,
    StepNumber, Usable,
};
use crate::combinator::Reply;
use crate::error::ErrorKind;
use crate::lexer::{StepMark, StepShape, Token, TokenKind};
use crate::ops::OpTable;
use crate::span::Spanned;

fn step_mark(tok: &Token) -> Option<&StepMark> {
    match &tok.kind {
        TokenKind::Step(mark) => Some(mark),
        _ => None,
    }
}

fn marker_of(shape: StepShape) -> Marker {
    match shape {
        StepShape::Star => Marker::Star,
        StepShape::Plus => Marker::Plus,
        StepShape::Num(n) => Marker::Num(n),
    }
}

impl<'t> Parser<'t> {
    // ── Sequents ─────────────────────────────────────────────────────────

    /// `ASSUME h, ... PROVE e`, or a plain expression.
    pub(super) fn sequent(&mut self) -> Reply<Sequent> {
        if !self.eat_kw("ASSUME") {
            let active = self.parse_expr()?;
            return Ok(Sequent {
                context: Vec::new(),
                active,
            });
        }
        self.commit(|st| {
            let context = st.sep_by1(",", |st| st.located(Self::hypothesis))?;
            st.expect_kw("PROVE")?;
            let active = st.parse_expr()?;
            Ok(Sequent { context, active })
        })
    }

    fn hypothesis(&mut self) -> Reply<Hyp> {
        let new = self.eat_kw("NEW");
        let kind = match self.peek().map(|t| t.text.as_str()) {
            Some("CONSTANT") => Some(NewKind::Constant),
            Some("VARIABLE") => Some(NewKind::Variable),
            Some("STATE") => Some(NewKind::State),
            Some("ACTION") => Some(NewKind::Action),
            Some("TEMPORAL") => Some(NewKind::Temporal),
            _ => None,
        };
        if kind.is_some() {
            self.advance()?;
        }
        if !new && kind.is_none() {
            return Ok(Hyp::Fact(self.parse_expr()?));
        }
        let name = self.ident()?;
        let shape = self.placeholder_shape()?;
        let domain = if self.is_op("\\in") {
            self.advance()?;
            Some(self.parse_expr()?)
        } else {
            None
        };
        Ok(Hyp::New {
            kind: kind.unwrap_or(NewKind::Constant),
            name,
            shape,
            domain,
        })
    }

    // ── Proofs ───────────────────────────────────────────────────────────

    /// The proof of a claim made at `parent` level.
    ///
    /// `top` is set for the proof of a theorem, where `<*>` may open the
    /// first level. A missing proof is `Omitted(Implicit)`.
    pub(super) fn proof(&mut self, parent: usize, top: bool) -> Reply<Proof> {
        let explicit = self.eat_kw("PROOF");
        if self.eat_kw("OBVIOUS") {
            return Ok(Proof::Obvious);
        }
        if self.eat_kw("OMITTED") {
            return Ok(Proof::Omitted(Omission::Explicit));
        }
        if self.is_kw("BY") {
            return self.commit(Self::by_proof);
        }
        if !self.peek().is_some_and(|t| step_mark(t).is_some()) {
            if explicit {
                return Err(self.unexpected("proof").committed());
            }
            return Ok(Proof::Omitted(Omission::Implicit));
        }
        match self.opening_level(parent, explicit || top) {
            Ok(level) => self.nested(|st| st.steps(level)),
            Err(f) if explicit => Err(f.committed()),
            // the step belongs to an enclosing proof
            Err(_) => Ok(Proof::Omitted(Omission::Implicit)),
        }
    }

    fn by_proof(&mut self) -> Reply<Proof> {
        self.expect_kw("BY")?;
        let only = self.eat_kw("ONLY");
        let usable = self.usable()?;
        if usable.facts.is_empty() && usable.defs.is_empty() {
            return Err(self.unexpected("fact"));
        }
        Ok(Proof::By { only, usable })
    }

    /// Level of the subproof whose first step marker is next.
    fn opening_level(&self, parent: usize, star_opens: bool) -> Reply<usize> {
        let Some(mark) = self.peek().and_then(step_mark) else {
            return Err(self.unexpected("step marker"));
        };
        match mark.shape {
            StepShape::Num(n) if n > parent => Ok(n),
            StepShape::Num(n) => Err(self.error(
                ErrorKind::Level,
                format!("step of level {} cannot open a proof at level {}", n, parent + 1),
            )),
            StepShape::Plus => Ok(parent + 1),
            StepShape::Star if star_opens => Ok(parent + 1),
            StepShape::Star => Err(self.error(ErrorKind::Level, "<*> continues the current level")),
        }
    }

    /// A non-first step of a level `level` proof must carry that level.
    fn check_continuation(&self, mark: &StepMark, level: usize) -> Reply<()> {
        match mark.shape {
            StepShape::Num(n) if n == level => Ok(()),
            StepShape::Star => Ok(()),
            StepShape::Num(n) if n < level => {
                Err(self.error(ErrorKind::Level, "missing QED step").committed())
            }
            StepShape::Num(n) => Err(self
                .error(
                    ErrorKind::Level,
                    format!("level {} step inside a level {} proof", n, level),
                )
                .committed()),
            StepShape::Plus => Err(self
                .error(ErrorKind::Level, "<+> does not start a new proof here")
                .committed()),
        }
    }

    fn steps(&mut self, level: usize) -> Reply<Proof> {
        let mut steps = Vec::new();
        let mut first = true;
        loop {
            let start = self.pos();
            let Some(mark) = self.peek().and_then(step_mark) else {
                return Err(self
                    .error(ErrorKind::Level, "missing QED step")
                    .committed());
            };
            if !first {
                self.check_continuation(mark, level)?;
            }
            first = false;
            self.advance()?;
            let number = StepNumber {
                marker: marker_of(mark.shape),
                label: mark.label.clone(),
                level,
            };
            if self.eat_kw("QED") {
                let proof = self.commit(|st| st.proof(level, false))?;
                let qed = Spanned::new(Qed { number, proof }, self.span_since(start));
                tracing::trace!(level, steps = steps.len(), "proof closed");
                return Ok(Proof::Steps(steps, Box::new(qed)));
            }
            let kind = self.commit(|st| st.step_kind(level))?;
            steps.push(Spanned::new(Step { number, kind }, self.span_since(start)));
        }
    }

    fn step_kind(&mut self, level: usize) -> Reply<StepKind> {
        let keyword = self
            .peek()
            .filter(|t| t.kind == TokenKind::Keyword)
            .map(|t| t.text.as_str());
        match keyword {
            Some("SUFFICES") => {
                self.advance()?;
                let sq = self.sequent()?;
                Ok(StepKind::Suffices(sq, self.proof(level, false)?))
            }
            Some("CASE") => {
                self.advance()?;
                let e = self.parse_expr()?;
                Ok(StepKind::Pcase(e, self.proof(level, false)?))
            }
            Some("PICK") => {
                self.advance()?;
                let bounds = self.bounds()?;
                self.expect_punct(":")?;
                let e = self.parse_expr()?;
                Ok(StepKind::Pick(bounds, e, self.proof(level, false)?))
            }
            Some("USE") => {
                self.advance()?;
                let only = self.eat_kw("ONLY");
                Ok(StepKind::Use {
                    only,
                    usable: self.usable()?,
                })
            }
            Some("HIDE") => {
                self.advance()?;
                Ok(StepKind::Hide(self.usable()?))
            }
            Some("DEFINE") => {
                self.advance()?;
                Ok(StepKind::Define(self.many1(|st| st.definition(false))?))
            }
            Some("HAVE") => {
                self.advance()?;
                Ok(StepKind::Have(self.parse_expr()?))
            }
            Some("TAKE") => {
                self.advance()?;
                Ok(StepKind::Take(self.bounds()?))
            }
            Some("WITNESS") => {
                self.advance()?;
                Ok(StepKind::Witness(self.sep_by1(",", Self::parse_expr)?))
            }
            _ => {
                let sq = self.sequent()?;
                Ok(StepKind::Assert(sq, self.proof(level, false)?))
            }
        }
    }

    // ── Facts and definitions in USE / HIDE / BY ─────────────────────────

    pub(super) fn usable(&mut self) -> Reply<Usable> {
        let mut usable = Usable::default();
        if !self.is_kw("DEF") && !self.is_kw("DEFS") {
            usable.facts = self
                .optional(|st| st.sep_by1(",", Self::fact))?
                .unwrap_or_default();
        }
        if self.eat_kw("DEF") || self.eat_kw("DEFS") {
            usable.defs = self.commit(|st| st.sep_by1(",", Self::def_name))?;
        }
        Ok(usable)
    }

    fn fact(&mut self) -> Reply<Fact> {
        if self.eat_kw("MODULE") {
            return Ok(Fact::Module(self.ident()?));
        }
        if let Some(tok) = self.peek().filter(|t| step_mark(t).is_some()) {
            self.advance()?;
            let name = tok.text.trim_end_matches('.').to_owned();
            return Ok(Fact::Expr(Expr::new(
                ExprKind::Ident(name),
                tok.span.clone(),
            )));
        }
        Ok(Fact::Expr(self.parse_expr()?))
    }

    fn def_name(&mut self) -> Reply<Spanned<String>> {
        match self.peek() {
            Some(tok) if tok.kind == TokenKind::Op => {
                let Some(d) = OpTable::global().any_operator(&tok.text) else {
                    return Err(self.unexpected("definition name"));
                };
                self.advance()?;
                Ok(Spanned::new(d.name.to_owned(), tok.span.clone()))
            }
            _ => self.ident(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::*;
    use crate::error::ErrorKind;
    use crate::parser::parse_module_str;

    fn theorem(text: &str) -> Result<(Sequent, Proof), crate::error::Diagnostic> {
        let src = format!("---- MODULE P ----\n{}\n====\n", text);
        let m = parse_module_str(&src)?;
        for u in m.units {
            if let UnitKind::Theorem { body, proof, .. } = u.node {
                return Ok((body, proof));
            }
        }
        panic!("no theorem in {:?}", text)
    }

    fn levels(proof: &Proof) -> Vec<usize> {
        match proof {
            Proof::Steps(steps, qed) => steps
                .iter()
                .map(|s| s.node.number.level)
                .chain(std::iter::once(qed.node.number.level))
                .collect(),
            _ => Vec::new(),
        }
    }

    #[test]
    fn two_steps_and_qed_at_level_one() {
        let (_, proof) = theorem("THEOREM T == TRUE\n<1>1. TRUE\n<1>2. TRUE\n<1> QED").unwrap();
        let Proof::Steps(steps, qed) = &proof else {
            panic!("{:?}", proof)
        };
        assert_eq!(steps.len(), 2);
        assert_eq!(levels(&proof), [1, 1, 1]);
        assert_eq!(steps[0].node.number.label.as_deref(), Some("1"));
        assert_eq!(qed.node.number.marker, Marker::Num(1));
        assert_eq!(qed.node.number.label, None);
    }

    #[test]
    fn nested_subproofs() {
        let text = "THEOREM T == TRUE\n\
                    <1>1. TRUE\n  <2>1. TRUE\n  <2> QED BY <2>1\n\
                    <1> QED OBVIOUS";
        let (_, proof) = theorem(text).unwrap();
        let Proof::Steps(steps, qed) = &proof else {
            panic!()
        };
        let StepKind::Assert(_, sub) = &steps[0].node.kind else {
            panic!()
        };
        assert_eq!(levels(sub), [2, 2]);
        let Proof::Steps(_, inner_qed) = sub else {
            panic!()
        };
        let Proof::By { usable, .. } = &inner_qed.node.proof else {
            panic!()
        };
        assert_eq!(
            usable.facts,
            [Fact::Expr(Expr::new(
                ExprKind::Ident("<2>1".into()),
                crate::span::Span::unknown()
            ))]
        );
        assert_eq!(qed.node.proof, Proof::Obvious);
    }

    #[test]
    fn star_and_plus_markers() {
        let (_, proof) = theorem("THEOREM T == TRUE\n<*>1. TRUE\n<*> QED").unwrap();
        assert_eq!(levels(&proof), [1, 1]);

        let text = "THEOREM T == TRUE\n<1>1. TRUE\n  <+> TRUE\n  <*> QED\n<1> QED";
        let (_, proof) = theorem(text).unwrap();
        let Proof::Steps(steps, _) = &proof else {
            panic!()
        };
        let StepKind::Assert(_, sub) = &steps[0].node.kind else {
            panic!()
        };
        assert_eq!(levels(sub), [2, 2]);
    }

    #[test]
    fn star_does_not_open_a_subproof_without_proof_keyword() {
        let text = "THEOREM T == TRUE\n<1>1. TRUE\n<*>2. TRUE\n<1> QED";
        let (_, proof) = theorem(text).unwrap();
        assert_eq!(levels(&proof), [1, 1, 1]);
    }

    #[test]
    fn missing_qed_is_a_level_error() {
        let err = theorem("THEOREM T == TRUE\n<1>1. TRUE\n  <2>1. TRUE\n<1>2. TRUE\n<1> QED")
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Level);
        assert!(err.mentions("missing QED step"));
    }

    #[test]
    fn deeper_step_mid_proof_is_a_level_error() {
        let err = theorem("THEOREM T == TRUE\n<2>1. TRUE\n<3>2. TRUE\n<2> QED").unwrap_err();
        // <3>2 opens a subproof of <2>1, which then lacks its QED
        assert_eq!(err.kind, ErrorKind::Level);
    }

    #[test]
    fn leaf_proofs() {
        let (_, p) = theorem("THEOREM T == TRUE OBVIOUS").unwrap();
        assert_eq!(p, Proof::Obvious);
        let (_, p) = theorem("THEOREM T == TRUE PROOF OMITTED").unwrap();
        assert_eq!(p, Proof::Omitted(Omission::Explicit));
        let (_, p) = theorem("THEOREM T == TRUE").unwrap();
        assert_eq!(p, Proof::Omitted(Omission::Implicit));
        let (_, p) = theorem("THEOREM T == TRUE BY ONLY A, MODULE Naturals DEF B, +").unwrap();
        let Proof::By { only, usable } = p else {
            panic!()
        };
        assert!(only);
        assert_eq!(usable.facts.len(), 2);
        assert!(matches!(&usable.facts[1], Fact::Module(m) if m.node == "Naturals"));
        let defs: Vec<_> = usable.defs.iter().map(|d| d.node.as_str()).collect();
        assert_eq!(defs, ["B", "+"]);
    }

    #[test]
    fn proof_keyword_requires_a_proof() {
        let err = theorem("THEOREM T == TRUE PROOF\nFoo == 1").unwrap_err();
        assert!(err.expected.iter().any(|e| e == "proof"));
    }

    #[test]
    fn sequents_with_new_declarations() {
        let (body, _) =
            theorem("THEOREM ASSUME NEW x \\in Nat, NEW TEMPORAL F, x > 0 PROVE x >= 1").unwrap();
        assert_eq!(body.context.len(), 3);
        assert!(matches!(&body.context[0].node, Hyp::New { kind: NewKind::Constant, domain: Some(_), .. }));
        assert!(matches!(&body.context[1].node, Hyp::New { kind: NewKind::Temporal, domain: None, .. }));
        assert!(matches!(&body.context[2].node, Hyp::Fact(_)));
    }

    #[test]
    fn step_forms() {
        let text = "THEOREM T == TRUE\n\
                    <1> SUFFICES ASSUME NEW n \\in Nat PROVE n >= 0\n\
                    <1>1. CASE n = 0\n\
                    <1>2. PICK m \\in Nat : m < n\n\
                    <1> USE ONLY <1>1 DEF Foo\n\
                    <1> HIDE DEF Bar\n\
                    <1> DEFINE G == 1  H(a) == a\n\
                    <1> HAVE TRUE\n\
                    <1> TAKE k \\in Nat\n\
                    <1> WITNESS 1, 2\n\
                    <1> QED";
        let (_, proof) = theorem(text).unwrap();
        let Proof::Steps(steps, _) = proof else {
            panic!()
        };
        let kinds: Vec<_> = steps.iter().map(|s| &s.node.kind).collect();
        assert!(matches!(kinds[0], StepKind::Suffices(sq, _) if sq.context.len() == 1));
        assert!(matches!(kinds[1], StepKind::Pcase(..)));
        assert!(matches!(kinds[2], StepKind::Pick(b, _, _) if b.len() == 1));
        assert!(matches!(kinds[3], StepKind::Use { only: true, usable } if usable.defs.len() == 1));
        assert!(matches!(kinds[4], StepKind::Hide(u) if u.facts.is_empty()));
        assert!(matches!(kinds[5], StepKind::Define(ds) if ds.len() == 2));
        assert!(matches!(kinds[6], StepKind::Have(_)));
        assert!(matches!(kinds[7], StepKind::Take(_)));
        assert!(matches!(kinds[8], StepKind::Witness(w) if w.len() == 2));
    }
}
