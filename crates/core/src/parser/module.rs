use super::{Layout, Parser};
use crate::ast::{AxiomKind, Module, Shape, TheoremKind, Unit, UnitKind};
use crate::combinator::{Lead, Production, Reply};
use crate::span::Spanned;

impl<'t> Parser<'t> {
    /// `---- MODULE Name ---- [EXTENDS ...] units ====`
    pub(crate) fn module(&mut self) -> Reply<Module> {
        let start = self.pos();
        self.dashes()?;
        self.expect_kw("MODULE")?;
        self.commit(|st| {
            let name = st.ident()?;
            st.dashes()?;
            let extends = if st.eat_kw("EXTENDS") {
                st.sep_by1(",", |st| st.ident())?
            } else {
                Vec::new()
            };
            let mut units = Vec::new();
            loop {
                match st.peek() {
                    Some(t) if t.is_equals() => {
                        st.advance()?;
                        break;
                    }
                    Some(_) => units.push(st.unit()?),
                    None => return Err(st.unexpected("\"====\"")),
                }
            }
            tracing::trace!(module = %name.node, units = units.len(), "module closed");
            Ok(Module {
                name,
                extends,
                units,
                span: st.span_since(start),
            })
        })
    }

    fn dashes(&mut self) -> Reply<()> {
        match self.peek() {
            Some(t) if t.is_dashes() => {
                self.advance()?;
                Ok(())
            }
            _ => Err(self.unexpected("\"----\"")),
        }
    }

    // ── Units ────────────────────────────────────────────────────────────

    fn unit(&mut self) -> Reply<Unit> {
        let table: &[(&[Lead], Production<'t, Layout, UnitKind>)] = &[
            (&[Lead::Kw("VARIABLE"), Lead::Kw("VARIABLES")], Self::variables),
            (&[Lead::Kw("CONSTANT"), Lead::Kw("CONSTANTS")], Self::constants),
            (&[Lead::Kw("RECURSIVE")], Self::recursives),
            (&[Lead::Kw("LOCAL")], Self::local_unit),
            (&[Lead::Kw("INSTANCE")], Self::instance_unit),
            (
                &[Lead::Kw("ASSUME"), Lead::Kw("ASSUMPTION"), Lead::Kw("AXIOM")],
                Self::axiom,
            ),
            (
                &[
                    Lead::Kw("THEOREM"),
                    Lead::Kw("LEMMA"),
                    Lead::Kw("PROPOSITION"),
                    Lead::Kw("COROLLARY"),
                ],
                Self::theorem,
            ),
            (&[Lead::Kw("USE"), Lead::Kw("HIDE")], Self::use_or_hide),
        ];
        let start = self.pos();
        let kind = match self.peek() {
            Some(t) if t.is_dashes() => {
                if self.peek_nth(1).is_some_and(|t| t.is_keyword("MODULE")) {
                    UnitKind::Submodule(self.nested(Self::module)?)
                } else {
                    self.advance()?;
                    UnitKind::Separator
                }
            }
            _ => self.dispatch(table, Some(Self::definition_unit))?,
        };
        Ok(Spanned::new(kind, self.span_since(start)))
    }

    fn definition_unit(&mut self) -> Reply<UnitKind> {
        Ok(UnitKind::Definition(self.definition(false)?))
    }

    fn variables(&mut self) -> Reply<UnitKind> {
        self.advance()?;
        let names = self.commit(|st| st.sep_by1(",", |st| st.ident()))?;
        Ok(UnitKind::Variables(names))
    }

    /// `CONSTANT N, F(_, _), _ ++ _`
    fn constants(&mut self) -> Reply<UnitKind> {
        self.advance()?;
        let decls = self.commit(|st| st.sep_by1(",", Self::declaration))?;
        Ok(UnitKind::Constants(decls))
    }

    fn recursives(&mut self) -> Reply<UnitKind> {
        self.advance()?;
        let decls = self.commit(|st| st.sep_by1(",", Self::declaration))?;
        Ok(UnitKind::Recursives(decls))
    }

    fn declaration(&mut self) -> Reply<(Spanned<String>, Shape)> {
        let p = self.param()?;
        Ok((p.name, p.shape))
    }

    fn local_unit(&mut self) -> Reply<UnitKind> {
        self.expect_kw("LOCAL")?;
        self.commit(|st| {
            if st.is_kw("INSTANCE") {
                let instance = st.instance()?;
                return Ok(UnitKind::Instance {
                    local: true,
                    instance,
                });
            }
            Ok(UnitKind::Definition(st.definition(true)?))
        })
    }

    fn instance_unit(&mut self) -> Reply<UnitKind> {
        let instance = self.commit(Self::instance)?;
        Ok(UnitKind::Instance {
            local: false,
            instance,
        })
    }

    /// `Name ==` in front of an axiom or theorem.
    fn claim_name(&mut self) -> Reply<Option<Spanned<String>>> {
        let named = self.peek().is_some_and(|t| t.is_ident())
            && self.peek_nth(1).is_some_and(|t| t.is_punct("=="));
        if !named {
            return Ok(None);
        }
        let name = self.ident()?;
        self.expect_punct("==")?;
        Ok(Some(name))
    }

    fn axiom(&mut self) -> Reply<UnitKind> {
        let tok = self.advance()?;
        let kind = match tok.text.as_str() {
            "ASSUME" => AxiomKind::Assume,
            "ASSUMPTION" => AxiomKind::Assumption,
            _ => AxiomKind::Axiom,
        };
        self.commit(|st| {
            let name = st.claim_name()?;
            let body = st.parse_expr()?;
            Ok(UnitKind::Axiom { kind, name, body })
        })
    }

    fn theorem(&mut self) -> Reply<UnitKind> {
        let tok = self.advance()?;
        let kind = match tok.text.as_str() {
            "THEOREM" => TheoremKind::Theorem,
            "LEMMA" => TheoremKind::Lemma,
            "PROPOSITION" => TheoremKind::Proposition,
            _ => TheoremKind::Corollary,
        };
        self.commit(|st| {
            let name = st.claim_name()?;
            let body = st.sequent()?;
            let proof = st.proof(0, true)?;
            Ok(UnitKind::Theorem {
                kind,
                name,
                body,
                proof,
            })
        })
    }

    fn use_or_hide(&mut self) -> Reply<UnitKind> {
        let tok = self.advance()?;
        self.commit(|st| {
            if tok.text == "USE" {
                let only = st.eat_kw("ONLY");
                return Ok(UnitKind::Use {
                    only,
                    usable: st.usable()?,
                });
            }
            Ok(UnitKind::Hide(st.usable()?))
        })
    }
}
