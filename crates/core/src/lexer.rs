//! Text -> token list.
//!
//! Lexing is eager: the whole buffer is turned into an immutable `Vec<Token>`
//! before the grammar runs. Comments and whitespace produce no tokens.

use crate::error::LexError;
use crate::ops::{OpTable, WORD_OPERATORS};
use crate::span::{Position, Span};
use std::cell::Cell;
use std::sync::{Arc, OnceLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepShape {
    /// `<*>`
    Star,
    /// `<+>`
    Plus,
    /// `<n>`
    Num(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepMark {
    pub shape: StepShape,
    /// Label after the marker, e.g. `1` in `<2>1.`; `None` for bare `<2>`.
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Keyword,
    /// Operator glyph, including word operators such as `SUBSET`.
    Op,
    Number,
    /// String literal; holds the decoded contents.
    Str(String),
    Punct,
    Step(StepMark),
}

/// One lexeme. `text` is always the exact source slice selected by `span`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub span: Span,
}

impl Token {
    pub fn is_punct(&self, p: &str) -> bool {
        self.kind == TokenKind::Punct && self.text == p
    }

    pub fn is_keyword(&self, k: &str) -> bool {
        self.kind == TokenKind::Keyword && self.text == k
    }

    pub fn is_op(&self, o: &str) -> bool {
        self.kind == TokenKind::Op && self.text == o
    }

    pub fn is_ident(&self) -> bool {
        self.kind == TokenKind::Ident
    }

    /// A run of four or more dashes.
    pub fn is_dashes(&self) -> bool {
        self.kind == TokenKind::Punct && self.text.len() >= 4 && self.text.starts_with("----")
    }

    /// A run of four or more equals signs.
    pub fn is_equals(&self) -> bool {
        self.kind == TokenKind::Punct && self.text.len() >= 4 && self.text.starts_with("====")
    }

    pub fn column(&self) -> usize {
        self.span.start.col
    }

    /// How the token reads in a diagnostic.
    pub fn describe(&self) -> String {
        match &self.kind {
            TokenKind::Ident => format!("identifier {}", self.text),
            TokenKind::Number => format!("number {}", self.text),
            TokenKind::Str(_) => format!("string {}", self.text),
            _ => format!("{:?}", self.text),
        }
    }
}

pub const KEYWORDS: &[&str] = &[
    "ACTION",
    "ASSUME",
    "ASSUMPTION",
    "AXIOM",
    "BOOLEAN",
    "BY",
    "CASE",
    "CHOOSE",
    "CONSTANT",
    "CONSTANTS",
    "COROLLARY",
    "DEF",
    "DEFINE",
    "DEFS",
    "ELSE",
    "EXCEPT",
    "EXTENDS",
    "FALSE",
    "HAVE",
    "HIDE",
    "IF",
    "IN",
    "INSTANCE",
    "LAMBDA",
    "LEMMA",
    "LET",
    "LOCAL",
    "MODULE",
    "NEW",
    "OBVIOUS",
    "OMITTED",
    "ONLY",
    "OTHER",
    "PICK",
    "PROOF",
    "PROPOSITION",
    "PROVE",
    "QED",
    "RECURSIVE",
    "STATE",
    "STRING",
    "SUFFICES",
    "TAKE",
    "TEMPORAL",
    "THEN",
    "THEOREM",
    "TRUE",
    "USE",
    "VARIABLE",
    "VARIABLES",
    "WITH",
    "WITNESS",
];

const PUNCTUATION: &[&str] = &[
    "(", ")", "[", "]", "{", "}", "<<", ">>", ">>_", "]_", ",", ":", "::", ".", "==", "!", "@",
    "->", "|->", "<-", "\\A", "\\E", "\\AA", "\\EE",
];

/// Every non-word symbol, longest first, tagged with its token kind.
fn symbols() -> &'static [(&'static str, TokenKind)] {
    static SYMBOLS: OnceLock<Vec<(&'static str, TokenKind)>> = OnceLock::new();
    SYMBOLS.get_or_init(|| {
        let mut syms: Vec<(&'static str, TokenKind)> = OpTable::global()
            .all_spellings()
            .filter(|s| !s.starts_with(|c: char| c.is_ascii_alphabetic()))
            .map(|s| (s, TokenKind::Op))
            .collect();
        syms.extend(PUNCTUATION.iter().map(|p| (*p, TokenKind::Punct)));
        syms.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then(a.0.cmp(b.0)));
        syms
    })
}

/// Lexing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// A bare expression: lex everything.
    Expression,
    /// A module file: stop after the `====` that closes the outermost
    /// module. With `skip_preamble`, text before the first `---- MODULE`
    /// line is ignored.
    Module { skip_preamble: bool },
}

impl Mode {
    fn is_module(&self) -> bool {
        matches!(self, Mode::Module { .. })
    }
}

struct Lexer<'s> {
    src: &'s str,
    bytes: &'s [u8],
    pos: usize,
    line: u32,
    bol: usize,
    /// Last computed `(byte, column)` pair on the current line.
    col: Cell<(usize, usize)>,
    source: Arc<str>,
    tokens: Vec<Token>,
    mode: Mode,
    depth: usize,
}

/// Lex a buffer in the given mode.
pub fn tokenize(src: &str, source_name: &str, mode: Mode) -> Result<Vec<Token>, LexError> {
    let mut lx = Lexer {
        src,
        bytes: src.as_bytes(),
        pos: 0,
        line: 1,
        bol: 0,
        col: Cell::new((0, 0)),
        source: Arc::from(source_name),
        tokens: Vec::new(),
        mode,
        depth: 0,
    };
    if mode == (Mode::Module { skip_preamble: true }) {
        lx.skip_preamble()?;
    }
    lx.run()?;
    tracing::debug!(
        source = source_name,
        tokens = lx.tokens.len(),
        "lexed buffer"
    );
    Ok(lx.tokens)
}

/// Lex a bare expression.
pub fn lex(src: &str, source_name: &str) -> Result<Vec<Token>, LexError> {
    tokenize(src, source_name, Mode::Expression)
}

impl<'s> Lexer<'s> {
    fn here(&self) -> Position {
        let (mut byte, mut col) = self.col.get();
        if byte < self.bol || byte > self.pos {
            (byte, col) = (self.bol, 0);
        }
        col += self.bytes[byte..self.pos]
            .iter()
            .filter(|&&b| b & 0xC0 != 0x80)
            .count();
        self.col.set((self.pos, col));
        Position::at(self.line, self.bol, col, self.pos)
    }

    fn span_from(&self, start: Position) -> Span {
        Span::new(self.source.clone(), start, self.here())
    }

    fn point(&self) -> Span {
        let p = self.here();
        Span::new(self.source.clone(), p, p)
    }

    fn peek_at(&self, off: usize) -> Option<u8> {
        self.bytes.get(self.pos + off).copied()
    }

    fn rest(&self) -> &'s str {
        &self.src[self.pos..]
    }

    fn newline(&mut self) {
        self.pos += 1;
        self.line += 1;
        self.bol = self.pos;
        self.col.set((self.pos, 0));
    }

    fn push(&mut self, kind: TokenKind, start: Position) {
        let text = self.src[start.offset()..self.pos].to_owned();
        let span = self.span_from(start);
        self.tokens.push(Token { kind, text, span });
    }

    /// Advance to the first `----+ MODULE` line, keeping line accounting.
    fn skip_preamble(&mut self) -> Result<(), LexError> {
        let mut search = 0usize;
        while let Some(found) = self.src[search..].find("----") {
            let at = search + found;
            let after = self.src[at..].trim_start_matches('-');
            let after = after.trim_start_matches(|c: char| c == ' ' || c == '\t');
            if after.starts_with("MODULE")
                && !after[6..].starts_with(|c: char| c.is_ascii_alphanumeric() || c == '_')
            {
                while self.pos < at {
                    if self.bytes[self.pos] == b'\n' {
                        self.newline();
                    } else {
                        self.pos += 1;
                    }
                }
                tracing::debug!(offset = at, "skipped preamble");
                return Ok(());
            }
            search = at + 4;
        }
        Err(LexError::MissingModule { span: self.point() })
    }

    fn run(&mut self) -> Result<(), LexError> {
        while self.pos < self.bytes.len() {
            let c = self.bytes[self.pos];
            match c {
                b'\n' => self.newline(),
                b' ' | b'\r' | 0x0c => self.pos += 1,
                b'\t' => {
                    let start = self.here();
                    self.pos += 1;
                    return Err(LexError::TabCharacter {
                        span: self.span_from(start),
                    });
                }
                b'(' if self.peek_at(1) == Some(b'*') => self.block_comment()?,
                b'\\' if self.peek_at(1) == Some(b'*') => self.line_comment(),
                b'"' => self.string()?,
                b'<' if self.step_marker() => {}
                b'\\' if self.based_number() => {}
                b'-' if self.rest().starts_with("----") => self.rule(b'-'),
                b'=' if self.rest().starts_with("====") => {
                    self.rule(b'=');
                    if self.mode.is_module() {
                        self.depth = self.depth.saturating_sub(1);
                        if self.depth == 0 {
                            return Ok(());
                        }
                    }
                }
                c if c.is_ascii_alphanumeric() || c == b'_' => self.word(),
                _ => self.symbol()?,
            }
        }
        Ok(())
    }

    fn block_comment(&mut self) -> Result<(), LexError> {
        let start = self.here();
        self.pos += 2;
        let mut depth = 1usize;
        while depth > 0 {
            match self.peek_at(0) {
                None => {
                    return Err(LexError::UnterminatedComment {
                        span: Span::new(self.source.clone(), start, self.here()),
                    })
                }
                Some(b'\n') => self.newline(),
                Some(b'(') if self.peek_at(1) == Some(b'*') => {
                    depth += 1;
                    self.pos += 2;
                }
                Some(b'*') if self.peek_at(1) == Some(b')') => {
                    depth -= 1;
                    self.pos += 2;
                }
                Some(_) => self.pos += 1,
            }
        }
        Ok(())
    }

    fn line_comment(&mut self) {
        while let Some(c) = self.peek_at(0) {
            if c == b'\n' {
                break;
            }
            self.pos += 1;
        }
    }

    fn string(&mut self) -> Result<(), LexError> {
        let start = self.here();
        self.pos += 1;
        let mut value = String::new();
        loop {
            let rest = self.rest();
            let Some(ch) = rest.chars().next() else {
                return Err(LexError::UnterminatedString {
                    span: self.span_from(start),
                });
            };
            match ch {
                '"' => {
                    self.pos += 1;
                    break;
                }
                '\n' => {
                    return Err(LexError::NewlineInString {
                        span: self.span_from(start),
                    })
                }
                '\\' => {
                    let esc_start = self.here();
                    self.pos += 1;
                    let Some(e) = self.rest().chars().next() else {
                        return Err(LexError::UnterminatedString {
                            span: self.span_from(start),
                        });
                    };
                    let decoded = match e {
                        '"' => '"',
                        '\\' => '\\',
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        'f' => '\x0c',
                        '\n' => {
                            return Err(LexError::NewlineInString {
                                span: self.span_from(start),
                            })
                        }
                        other => {
                            self.pos += other.len_utf8();
                            return Err(LexError::BadEscape {
                                ch: other,
                                span: self.span_from(esc_start),
                            });
                        }
                    };
                    value.push(decoded);
                    self.pos += e.len_utf8();
                }
                other => {
                    value.push(other);
                    self.pos += other.len_utf8();
                }
            }
        }
        self.push(TokenKind::Str(value), start);
        Ok(())
    }

    /// `<n>label.`, `<*>`, `<+>`; returns false without consuming anything
    /// when the text at the cursor is not a step marker.
    fn step_marker(&mut self) -> bool {
        let rest = self.rest().as_bytes();
        let shape;
        let mut i = 1;
        match rest.get(1) {
            Some(b'*') | Some(b'+') if rest.get(2) == Some(&b'>') => {
                shape = if rest[1] == b'*' {
                    StepShape::Star
                } else {
                    StepShape::Plus
                };
                i = 3;
            }
            Some(d) if d.is_ascii_digit() => {
                while rest.get(i).is_some_and(u8::is_ascii_digit) {
                    i += 1;
                }
                if rest.get(i) != Some(&b'>') {
                    return false;
                }
                let Ok(level) = self.rest()[1..i].parse::<usize>() else {
                    return false;
                };
                shape = StepShape::Num(level);
                i += 1;
            }
            _ => return false,
        }
        let label_start = i;
        while rest
            .get(i)
            .is_some_and(|c| c.is_ascii_alphanumeric() || *c == b'_')
        {
            i += 1;
        }
        let label = (i > label_start).then(|| self.rest()[label_start..i].to_owned());
        while rest.get(i) == Some(&b'.') {
            i += 1;
        }
        let start = self.here();
        self.pos += i;
        self.push(TokenKind::Step(StepMark { shape, label }), start);
        true
    }

    /// `\b101`, `\o17`, `\h1F`; false when the backslash starts something else
    /// such as `\bullet` or `\oplus`.
    fn based_number(&mut self) -> bool {
        let rest = self.rest().as_bytes();
        let Some(&r) = rest.get(1) else {
            return false;
        };
        let digit_ok: fn(&u8) -> bool = match r {
            b'b' | b'B' => |c| *c == b'0' || *c == b'1',
            b'o' | b'O' => |c| (b'0'..=b'7').contains(c),
            b'h' | b'H' => u8::is_ascii_hexdigit,
            _ => return false,
        };
        let mut i = 2;
        while rest.get(i).is_some_and(digit_ok) {
            i += 1;
        }
        if i == 2
            || rest
                .get(i)
                .is_some_and(|c| c.is_ascii_alphanumeric() || *c == b'_')
        {
            return false;
        }
        let start = self.here();
        self.pos += i;
        self.push(TokenKind::Number, start);
        true
    }

    /// Runs of four or more `-` or `=`.
    fn rule(&mut self, c: u8) {
        let start = self.here();
        while self.peek_at(0) == Some(c) {
            self.pos += 1;
        }
        self.push(TokenKind::Punct, start);
    }

    fn word(&mut self) {
        let start = self.here();
        let rest = self.rest();
        if rest.starts_with("WF_") || rest.starts_with("SF_") {
            self.pos += 3;
            self.push(TokenKind::Punct, start);
            return;
        }
        let len = rest
            .bytes()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == b'_')
            .count();
        let word = &rest[..len];
        self.pos += len;

        if word.bytes().all(|c| c.is_ascii_digit()) {
            // decimal fraction: digits '.' digits, but not the range `1..2`
            if self.peek_at(0) == Some(b'.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit())
            {
                self.pos += 1;
                while self.peek_at(0).is_some_and(|c| c.is_ascii_digit()) {
                    self.pos += 1;
                }
            }
            self.push(TokenKind::Number, start);
            return;
        }

        let kind = if word == "_" {
            TokenKind::Punct
        } else if KEYWORDS.contains(&word) {
            if word == "MODULE" && self.tokens.last().is_some_and(Token::is_dashes) {
                self.depth += 1;
            }
            TokenKind::Keyword
        } else if WORD_OPERATORS.contains(&word) {
            TokenKind::Op
        } else {
            TokenKind::Ident
        };
        self.push(kind, start);
    }

    fn symbol(&mut self) -> Result<(), LexError> {
        let rest = self.rest();
        for (sym, kind) in symbols() {
            if !rest.starts_with(sym) {
                continue;
            }
            // `\in` must not swallow the start of `\inx`
            let wordy = sym.len() > 1
                && sym.starts_with('\\')
                && sym[1..].bytes().all(|c| c.is_ascii_alphabetic());
            if wordy
                && rest[sym.len()..]
                    .bytes()
                    .next()
                    .is_some_and(|c| c.is_ascii_alphanumeric() || c == b'_')
            {
                continue;
            }
            let start = self.here();
            self.pos += sym.len();
            self.push(kind.clone(), start);
            return Ok(());
        }
        let start = self.here();
        let ch = rest.chars().next().unwrap_or('\0');
        self.pos += ch.len_utf8().max(1);
        Err(LexError::IllegalCharacter {
            ch,
            span: self.span_from(start),
        })
    }
}

/// Check that every token's span selects exactly its text in `src`.
///
/// The grammar relies on this for column-based layout, so entry points run
/// it before parsing.
pub fn verify_spans(src: &str, tokens: &[Token]) -> Result<(), LexError> {
    for tok in tokens {
        let range = tok.span.byte_range();
        if src.get(range) != Some(tok.text.as_str()) {
            return Err(LexError::SpanMismatch {
                text: tok.text.clone(),
                span: tok.span.clone(),
            });
        }
    }
    Ok(())
}

/// Rebuild text from tokens: adjacent tokens are concatenated, any gap
/// becomes one space.
pub fn reconstruct(tokens: &[Token]) -> String {
    let mut out = String::new();
    let mut prev_end: Option<usize> = None;
    for tok in tokens {
        if let Some(end) = prev_end {
            if tok.span.start.offset() > end {
                out.push(' ');
            }
        }
        out.push_str(&tok.text);
        prev_end = Some(tok.span.end.offset());
    }
    out
}

/// The first token that opens a bracket beyond `limit` levels deep,
/// counting `(`, `[`, `{` and `<<`.
pub fn first_too_deep(tokens: &[Token], limit: usize) -> Option<&Token> {
    let mut depth = 0usize;
    for tok in tokens {
        if tok.kind != TokenKind::Punct {
            continue;
        }
        match tok.text.as_str() {
            "(" | "[" | "{" | "<<" => {
                depth += 1;
                if depth > limit {
                    return Some(tok);
                }
            }
            ")" | "]" | "]_" | "}" | ">>" | ">>_" => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    None
}
