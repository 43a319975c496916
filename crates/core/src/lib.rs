#![allow(clippy::result_large_err)]
//! tlafront-core: lexer, operator table and grammar for TLA+ modules,
//! expressions and proofs.
//!
//! # Public API
//!
//! Key types are re-exported at the crate root for convenience:
//!
//! - [`parse_module()`] / [`parse_expression()`] -- parse text into an AST
//! - [`ParseOptions`] -- source name, preamble handling, depth limit
//! - [`Diagnostic`] -- the single failure value of a parse
//! - [`expr_to_string()`] / [`module_to_string()`] -- canonical printer
//! - AST types: [`Module`], [`Unit`], [`Expr`], [`ExprKind`], [`Defn`],
//!   [`Proof`], [`Sequent`]
//!
//! The lexer, operator table and combinator runtime are public modules for
//! callers that build their own grammar on the same tokens.

pub mod ast;
pub mod combinator;
pub mod error;
pub mod lexer;
pub mod ops;
pub mod options;
pub mod parser;
pub mod pretty;
pub mod span;

// ── Convenience re-exports: key types ────────────────────────────────

pub use ast::{Defn, Expr, ExprKind, Module, Proof, Sequent, Unit, UnitKind};
pub use error::{Diagnostic, ErrorKind, LexError};
pub use options::ParseOptions;
pub use span::{Position, Span, Spanned};

// ── Convenience re-exports: entry points ─────────────────────────────

pub use parser::{
    check_nesting_depth, parse_expr_str, parse_expression, parse_module, parse_module_str,
};
pub use pretty::{expr_to_string, module_to_string};
