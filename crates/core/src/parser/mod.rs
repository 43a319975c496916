//! Grammar for expressions, modules and proofs, built on the combinator
//! runtime. Productions are methods on [`Parser`] spread over the files of
//! this module.
//!
//! The user state threaded through a parse is the layout left edge, where
//! tokens to the left of it are invisible (which is how an operand of a
//! bulleted list ends when the next bullet or anything further left shows
//! up), and the count of constructs open around the cursor, checked against
//! `ParseOptions::max_depth`.

use crate::ast::{Expr, Module};
use crate::combinator::{Reply, State, Visibility};
use crate::error::{Diagnostic, ErrorKind};
use crate::lexer::{self, Mode, Token, TokenKind};
use crate::options::ParseOptions;

mod definitions;
mod expressions;
mod module;
mod proof;

pub type Parser<'t> = State<'t, Layout>;

/// Indentation and nesting context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Layout {
    /// Smallest column a token may start at and still be seen.
    pub ledge: usize,
    /// Constructs open around the cursor.
    pub depth: usize,
    pub max_depth: Option<usize>,
}

impl Visibility for Layout {
    fn admits(&self, tok: &Token) -> bool {
        tok.column() >= self.ledge
    }
}

impl<'t> Parser<'t> {
    /// Run `p` inside brackets, where the left edge no longer applies.
    pub(crate) fn bracketed<T>(&mut self, p: impl FnOnce(&mut Self) -> Reply<T>) -> Reply<T> {
        self.with_ledge(0, p)
    }

    pub(crate) fn with_ledge<T>(
        &mut self,
        ledge: usize,
        p: impl FnOnce(&mut Self) -> Reply<T>,
    ) -> Reply<T> {
        let layout = Layout {
            ledge,
            ..*self.get()
        };
        self.using(layout, p)
    }

    /// Run `p` one construct deeper. Going past `max_depth` is a committed
    /// failure, so the native stack stays bounded whatever the input.
    pub(crate) fn nested<T>(&mut self, p: impl FnOnce(&mut Self) -> Reply<T>) -> Reply<T> {
        let layout = *self.get();
        let depth = layout.depth + 1;
        if layout.max_depth.is_some_and(|limit| depth > limit) {
            return Err(self
                .error(ErrorKind::UnexpectedToken, "nesting too deep")
                .committed());
        }
        self.using(Layout { depth, ..layout }, p)
    }

    /// The first token from index `from` on that satisfies `stop` while at
    /// bracket depth zero and outside the variables and domains of any
    /// binder (`\A`, `CHOOSE`, `LAMBDA`, `ASSUME`, ...). `None` when an
    /// unmatched closing bracket or the end of input comes first.
    ///
    /// This is a token scan, not a parse; the grammar uses it to choose
    /// between readings that share a long prefix.
    pub(crate) fn scan_top_level(
        &self,
        from: usize,
        stop: impl Fn(&Token) -> bool,
    ) -> Option<&'t Token> {
        let mut depth = 0usize;
        let mut binders = 0usize;
        for tok in self.tokens().get(from..).unwrap_or_default() {
            if tok.kind == TokenKind::Punct {
                match tok.text.as_str() {
                    "(" | "[" | "{" | "<<" => {
                        depth += 1;
                        continue;
                    }
                    ")" | "]" | "]_" | "}" | ">>" | ">>_" => {
                        if depth == 0 {
                            return None;
                        }
                        depth -= 1;
                        continue;
                    }
                    _ => {}
                }
            }
            if depth > 0 {
                continue;
            }
            if opens_binder(tok) {
                binders += 1;
            } else if binders > 0 {
                if tok.is_punct(":") || tok.is_keyword("PROVE") {
                    binders -= 1;
                }
            } else if stop(tok) {
                return Some(tok);
            }
        }
        None
    }

    pub(crate) fn expect_end(&mut self) -> Reply<()> {
        match self.peek_raw() {
            None => Ok(()),
            Some(_) => Err(self.unexpected("end of input")),
        }
    }

    /// Backtrackable failure listing several alternatives.
    pub(crate) fn expected_one_of(&self, alternatives: &[&str]) -> crate::combinator::Failure {
        let mut f = self.unexpected(format!("{:?}", alternatives[0]));
        f.expected
            .extend(alternatives[1..].iter().map(|a| format!("{:?}", a)));
        f
    }
}

/// Tokens whose construct owns the next free `:` (or `PROVE`).
fn opens_binder(tok: &Token) -> bool {
    match tok.kind {
        TokenKind::Punct => matches!(tok.text.as_str(), "\\A" | "\\E" | "\\AA" | "\\EE"),
        TokenKind::Keyword => matches!(tok.text.as_str(), "CHOOSE" | "LAMBDA" | "ASSUME"),
        _ => false,
    }
}

// ──────────────────────────────────────────────
// Entry points
// ──────────────────────────────────────────────

/// Parse a complete module.
#[tracing::instrument(level = "debug", skip_all, fields(source = %options.source_name))]
pub fn parse_module(src: &str, options: &ParseOptions) -> Result<Module, Diagnostic> {
    let mode = Mode::Module {
        skip_preamble: options.skip_preamble,
    };
    let tokens = lexer::tokenize(src, &options.source_name, mode)?;
    prepare(src, &tokens, options)?;
    let module = run(&tokens, options, |st| {
        let m = st.module()?;
        st.expect_end()?;
        Ok(m)
    })?;
    tracing::debug!(
        module = %module.name.node,
        units = module.units.len(),
        "parsed module"
    );
    Ok(module)
}

/// Parse one expression, e.g. a state printed by a model checker.
#[tracing::instrument(level = "debug", skip_all, fields(source = %options.source_name))]
pub fn parse_expression(src: &str, options: &ParseOptions) -> Result<Expr, Diagnostic> {
    let tokens = lexer::tokenize(src, &options.source_name, Mode::Expression)?;
    prepare(src, &tokens, options)?;
    run(&tokens, options, |st| {
        let e = st.parse_expr()?;
        st.expect_end()?;
        Ok(e)
    })
}

pub fn parse_module_str(src: &str) -> Result<Module, Diagnostic> {
    parse_module(src, &ParseOptions::default())
}

pub fn parse_expr_str(src: &str) -> Result<Expr, Diagnostic> {
    parse_expression(src, &ParseOptions::default())
}

/// Reject token lists whose bracket nesting is deeper than `limit`.
pub fn check_nesting_depth(tokens: &[Token], limit: usize) -> Result<(), Diagnostic> {
    match lexer::first_too_deep(tokens, limit) {
        None => Ok(()),
        Some(tok) => {
            let mut d = Diagnostic::new(ErrorKind::UnexpectedToken, tok.span.clone())
                .with_message("nesting too deep");
            d.unexpected = Some(tok.describe());
            Err(d)
        }
    }
}

fn prepare(src: &str, tokens: &[Token], options: &ParseOptions) -> Result<(), Diagnostic> {
    lexer::verify_spans(src, tokens)?;
    if let Some(limit) = options.max_depth {
        check_nesting_depth(tokens, limit)?;
    }
    Ok(())
}

fn run<'t, T>(
    tokens: &'t [Token],
    options: &ParseOptions,
    p: impl FnOnce(&mut Parser<'t>) -> Reply<T>,
) -> Result<T, Diagnostic> {
    let layout = Layout {
        max_depth: options.max_depth,
        ..Layout::default()
    };
    let mut st = Parser::new(tokens, layout);
    match p(&mut st) {
        Ok(v) => Ok(v),
        Err(f) => {
            let f = st.conclude(f);
            let diag = f.into_diagnostic(options.verbose);
            tracing::debug!(kind = %diag.kind, span = %diag.span, "parse failed");
            Err(diag)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ExprKind;

    fn at_ledge(ledge: usize) -> Layout {
        Layout {
            ledge,
            ..Layout::default()
        }
    }

    #[test]
    fn layout_hides_tokens_left_of_the_edge() {
        let toks = lexer::lex("a\n b\nc", "t").unwrap();
        let mut st = Parser::new(&toks, at_ledge(1));
        // `a` sits in column 0
        assert!(st.at_end());
        assert_eq!(st.peek_raw().map(|t| t.text.as_str()), Some("a"));

        st.put(at_ledge(0));
        st.advance().unwrap();
        st.put(at_ledge(1));
        assert_eq!(st.peek().map(|t| t.text.as_str()), Some("b"));
        st.advance().unwrap();
        assert!(st.at_end());
        assert_eq!(st.peek_raw().map(|t| t.text.as_str()), Some("c"));
    }

    #[test]
    fn brackets_reset_the_edge_but_keep_the_depth() {
        let toks = lexer::lex("a", "t").unwrap();
        let layout = Layout {
            ledge: 4,
            depth: 2,
            max_depth: Some(3),
        };
        let mut st = Parser::new(&toks, layout);
        let inner = st.bracketed(|st| Ok(*st.get())).unwrap();
        assert_eq!(inner.ledge, 0);
        assert_eq!(inner.depth, 2);
        assert_eq!(st.nested(|st| Ok(st.get().depth)).unwrap(), 3);
        let err = st
            .nested(|st| st.nested(|st| Ok(st.get().depth)))
            .unwrap_err();
        assert!(err.is_committed());
        assert_eq!(*st.get(), layout);
    }

    #[test]
    fn top_level_scan_skips_brackets_and_binders() {
        let toks = lexer::lex("f(a : b), \\A x, y : P, {c : d} : e", "t").unwrap();
        let st = Parser::new(&toks, Layout::default());
        let colon = st.scan_top_level(0, |t| t.is_punct(":")).unwrap();
        assert_eq!(colon.span.start.col, 31);
        let comma = st.scan_top_level(0, |t| t.is_punct(",")).unwrap();
        assert_eq!(comma.span.start.col, 8);

        let toks = lexer::lex("a ] : b", "t").unwrap();
        let st = Parser::new(&toks, Layout::default());
        assert!(st.scan_top_level(0, |t| t.is_punct(":")).is_none());
    }

    #[test]
    fn trailing_tokens_are_rejected() {
        let err = parse_expr_str("x )").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnexpectedToken);
        assert!(err.expected.iter().any(|e| e == "end of input"));
    }

    #[test]
    fn depth_limit_is_enforced() {
        let opts = ParseOptions::default().with_max_depth(2);
        assert!(parse_expression("((1))", &opts).is_ok());
        let err = parse_expression("(((1)))", &opts).unwrap_err();
        assert!(err.mentions("nesting too deep"));
        assert_eq!(err.span.start.col, 2);
    }

    #[test]
    fn depth_limit_covers_keyword_constructs() {
        let src = format!("{}c", "IF a THEN b ELSE ".repeat(200_000));
        let opts = ParseOptions::default().with_max_depth(64);
        let err = parse_expression(&src, &opts).unwrap_err();
        assert!(err.mentions("nesting too deep"));
        assert_eq!(err.kind, ErrorKind::UnexpectedToken);

        let shallow = format!("{}c", "IF a THEN b ELSE ".repeat(60));
        assert!(parse_expression(&shallow, &opts).is_ok());

        let bullets = "/\\ ".repeat(100) + "x";
        assert!(parse_expression(&bullets, &opts)
            .unwrap_err()
            .mentions("nesting too deep"));
    }

    #[test]
    fn lexical_errors_become_diagnostics() {
        let err = parse_expr_str("x = \"abc").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Lexical);
    }

    #[test]
    fn source_name_flows_into_spans() {
        let e = parse_expression("x", &ParseOptions::named("state.txt")).unwrap();
        assert_eq!(e.node, ExprKind::Ident("x".into()));
        assert_eq!(e.span.source.as_deref(), Some("state.txt"));
    }
}
