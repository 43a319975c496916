use crate::span::Span;
use serde::Serialize;
use std::fmt;

/// Broad classification of a front-end failure.
///
/// The ordering matters when two failures at the same position are merged:
/// the more specific (larger) kind wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnexpectedToken,
    Lexical,
    AmbiguousOperatorSequence,
    Level,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::UnexpectedToken => "syntax error",
            ErrorKind::Lexical => "lexical error",
            ErrorKind::AmbiguousOperatorSequence => "ambiguous operator sequence",
            ErrorKind::Level => "proof level error",
            ErrorKind::Internal => "internal error",
        };
        f.write_str(s)
    }
}

/// A lexical failure. The lexer stops at the first one.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LexError {
    #[error("illegal character {ch:?}")]
    IllegalCharacter { ch: char, span: Span },

    #[error("unterminated string literal")]
    UnterminatedString { span: Span },

    #[error("unterminated comment")]
    UnterminatedComment { span: Span },

    #[error("newline inside string literal")]
    NewlineInString { span: Span },

    #[error("tab characters are not allowed outside comments")]
    TabCharacter { span: Span },

    #[error("invalid escape sequence '\\{ch}'")]
    BadEscape { ch: char, span: Span },

    #[error("no module header found")]
    MissingModule { span: Span },

    /// The computed offsets of a token do not select its literal text.
    #[error("token {text:?} does not match its source slice")]
    SpanMismatch { text: String, span: Span },
}

impl LexError {
    pub fn span(&self) -> &Span {
        match self {
            LexError::IllegalCharacter { span, .. }
            | LexError::UnterminatedString { span }
            | LexError::UnterminatedComment { span }
            | LexError::NewlineInString { span }
            | LexError::TabCharacter { span }
            | LexError::BadEscape { span, .. }
            | LexError::MissingModule { span }
            | LexError::SpanMismatch { span, .. } => span,
        }
    }
}

/// The single failure value returned by a top-level parse.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub kind: ErrorKind,
    /// Text of the offending token, if the failure happened at a token.
    pub unexpected: Option<String>,
    /// Sorted, deduplicated descriptions of what would have been accepted.
    pub expected: Vec<String>,
    /// User-facing messages.
    pub messages: Vec<String>,
    /// Internal notes, only filled in verbose mode.
    pub notes: Vec<String>,
    pub span: Span,
}

impl Diagnostic {
    pub fn new(kind: ErrorKind, span: Span) -> Self {
        Diagnostic {
            kind,
            unexpected: None,
            expected: Vec::new(),
            messages: Vec::new(),
            notes: Vec::new(),
            span,
        }
    }

    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.messages.push(msg.into());
        self
    }

    /// True when any message contains `needle`; convenient in tests and
    /// for callers that route specific failures.
    pub fn mentions(&self, needle: &str) -> bool {
        self.messages.iter().any(|m| m.contains(needle))
    }

    /// Serialize to a JSON object with every field present.
    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::json!({
            "kind":       self.kind,
            "unexpected": self.unexpected,
            "expected":   self.expected,
            "messages":   self.messages,
            "notes":      self.notes,
            "source":     self.span.source.as_deref(),
            "line":       self.span.start.line,
            "column":     self.span.start.col + 1,
        })
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.span, self.kind)?;
        if let Some(tok) = &self.unexpected {
            write!(f, ": unexpected {}", tok)?;
        }
        match self.expected.len() {
            0 => {}
            1 => write!(f, "; expecting {}", self.expected[0])?,
            _ => write!(f, "; expecting one of {}", self.expected.join(", "))?,
        }
        for m in &self.messages {
            write!(f, "; {}", m)?;
        }
        for n in &self.notes {
            write!(f, "\n  note: {}", n)?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostic {}

impl From<LexError> for Diagnostic {
    fn from(err: LexError) -> Self {
        let kind = match err {
            LexError::SpanMismatch { .. } => ErrorKind::Internal,
            _ => ErrorKind::Lexical,
        };
        Diagnostic::new(kind, err.span().clone()).with_message(err.to_string())
    }
}
