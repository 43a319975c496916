//! Source positions and ranges.
//!
//! Every token and AST node carries a [`Span`]. Spans are plain values: they
//! are cloned freely and the source name is shared behind an `Arc`.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// A point in a source buffer.
///
/// `line` is 1-based, `bol` is the byte offset of the first character of the
/// line and `col` is the 0-based column within that line counted in
/// characters. Bulleted lists line up by `col`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Position {
    pub line: u32,
    pub bol: usize,
    pub col: usize,
    #[serde(skip)]
    offset: usize,
}

impl Position {
    /// A point on an ASCII line, where the byte offset is `bol + col`.
    pub fn new(line: u32, bol: usize, col: usize) -> Self {
        Position::at(line, bol, col, bol + col)
    }

    /// A point whose byte offset is known separately from its column.
    pub fn at(line: u32, bol: usize, col: usize, offset: usize) -> Self {
        Position {
            line,
            bol,
            col,
            offset,
        }
    }

    /// Byte offset into the source buffer.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

/// A range `[start, end)` in one named source.
///
/// A span without a source is the "unknown" sentinel: merging it with any
/// other span yields the other span unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Span {
    pub start: Position,
    pub end: Position,
    pub source: Option<Arc<str>>,
}

impl Span {
    pub fn new(source: Arc<str>, start: Position, end: Position) -> Self {
        Span {
            start,
            end,
            source: Some(source),
        }
    }

    pub fn unknown() -> Self {
        Span {
            start: Position::new(0, 0, 0),
            end: Position::new(0, 0, 0),
            source: None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.source.is_none()
    }

    /// Smallest span covering both `self` and `other`.
    ///
    /// Merging is only meaningful within one source; if the sources differ
    /// `self` is returned unchanged.
    pub fn merge(&self, other: &Span) -> Span {
        if self.is_unknown() {
            return other.clone();
        }
        if other.is_unknown() || self.source != other.source {
            return self.clone();
        }
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            source: self.source.clone(),
        }
    }

    /// A zero-width span at the end of `self`.
    pub fn end_point(&self) -> Span {
        Span {
            start: self.end,
            end: self.end,
            source: self.source.clone(),
        }
    }

    pub fn byte_range(&self) -> std::ops::Range<usize> {
        self.start.offset()..self.end.offset()
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            None => write!(f, "<unknown>"),
            Some(src) => write!(
                f,
                "{}:{}:{}-{}:{}",
                src,
                self.start.line,
                self.start.col + 1,
                self.end.line,
                self.end.col + 1
            ),
        }
    }
}

/// A value paired with its source span.
///
/// Equality compares only the node, so two trees parsed from differently
/// laid out text compare equal when their shapes agree.
#[derive(Debug, Clone)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Spanned { node, span }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Spanned<U> {
        Spanned {
            node: f(self.node),
            span: self.span,
        }
    }

    pub fn as_ref(&self) -> Spanned<&T> {
        Spanned {
            node: &self.node,
            span: self.span.clone(),
        }
    }
}

impl<T: PartialEq> PartialEq for Spanned<T> {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node
    }
}

impl<T: Eq> Eq for Spanned<T> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(line: u32, c0: usize, c1: usize) -> Span {
        Span::new(Arc::from("t.tla"), Position::new(line, 0, c0), Position::new(line, 0, c1))
    }

    #[test]
    fn merge_covers_both_operands() {
        let a = span(1, 4, 6);
        let b = span(1, 0, 2);
        let m = a.merge(&b);
        assert_eq!(m.start.col, 0);
        assert_eq!(m.end.col, 6);
    }

    #[test]
    fn unknown_span_is_identity_for_merge() {
        let a = span(3, 1, 9);
        assert_eq!(Span::unknown().merge(&a), a);
        assert_eq!(a.merge(&Span::unknown()), a);
    }

    #[test]
    fn merge_across_sources_keeps_receiver() {
        let a = span(1, 0, 1);
        let b = Span::new(Arc::from("other.tla"), Position::new(9, 0, 0), Position::new(9, 0, 4));
        assert_eq!(a.merge(&b), a);
    }

    #[test]
    fn spanned_equality_ignores_location() {
        let x = Spanned::new("x", span(1, 0, 1));
        let y = Spanned::new("x", span(7, 3, 4));
        assert_eq!(x, y);
    }

    #[test]
    fn display_is_one_based() {
        assert_eq!(span(2, 0, 3).to_string(), "t.tla:2:1-2:4");
    }
}
