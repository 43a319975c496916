//! Abstract syntax tree produced by the grammar.
//!
//! The tree is strict: every node owns its children and nothing points back
//! up. Node equality ignores spans (see [`Spanned`]), so trees parsed from
//! differently formatted text compare equal when their shapes agree.

use crate::span::{Span, Spanned};

// ──────────────────────────────────────────────
// Expressions
// ──────────────────────────────────────────────

pub type Expr = Spanned<ExprKind>;

/// Operators with fixed meaning. User-definable symbols without a fixed
/// meaning (`\oplus`, `++`, ...) appear as [`ExprKind::Ident`] heads instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    // logic
    Implies,
    Equiv,
    Conj,
    Disj,
    Neg,
    Eq,
    Neq,
    // sets
    Mem,
    Notmem,
    Setminus,
    Cap,
    Cup,
    Subseteq,
    Subset,
    Union,
    Boolean,
    StringSet,
    Cartesian,
    // functions
    Domain,
    // actions and temporal
    Prime,
    Enabled,
    Unchanged,
    Cdot,
    Actplus,
    Leadsto,
    Box,
    Diamond,
    // arithmetic
    Plus,
    Minus,
    Uminus,
    Mult,
    Ratio,
    Quotient,
    Remainder,
    Exp,
    Lt,
    Lteq,
    Gt,
    Gteq,
    Range,
}

impl Builtin {
    /// The spelling the printer uses.
    pub fn spelling(&self) -> &'static str {
        match self {
            Builtin::Implies => "=>",
            Builtin::Equiv => "<=>",
            Builtin::Conj => "/\\",
            Builtin::Disj => "\\/",
            Builtin::Neg => "~",
            Builtin::Eq => "=",
            Builtin::Neq => "/=",
            Builtin::Mem => "\\in",
            Builtin::Notmem => "\\notin",
            Builtin::Setminus => "\\",
            Builtin::Cap => "\\cap",
            Builtin::Cup => "\\cup",
            Builtin::Subseteq => "\\subseteq",
            Builtin::Subset => "SUBSET",
            Builtin::Union => "UNION",
            Builtin::Boolean => "BOOLEAN",
            Builtin::StringSet => "STRING",
            Builtin::Cartesian => "\\X",
            Builtin::Domain => "DOMAIN",
            Builtin::Prime => "'",
            Builtin::Enabled => "ENABLED",
            Builtin::Unchanged => "UNCHANGED",
            Builtin::Cdot => "\\cdot",
            Builtin::Actplus => "-+->",
            Builtin::Leadsto => "~>",
            Builtin::Box => "[]",
            Builtin::Diamond => "<>",
            Builtin::Plus => "+",
            Builtin::Minus => "-",
            Builtin::Uminus => "-",
            Builtin::Mult => "*",
            Builtin::Ratio => "/",
            Builtin::Quotient => "\\div",
            Builtin::Remainder => "%",
            Builtin::Exp => "^",
            Builtin::Lt => "<",
            Builtin::Lteq => "=<",
            Builtin::Gt => ">",
            Builtin::Gteq => ">=",
            Builtin::Range => "..",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Radix {
    Binary,
    Octal,
    Decimal,
    Hex,
}

impl Radix {
    pub fn base(&self) -> u32 {
        match self {
            Radix::Binary => 2,
            Radix::Octal => 8,
            Radix::Decimal => 10,
            Radix::Hex => 16,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Number {
    /// Natural number literal; digits without the `\b`/`\o`/`\h` prefix.
    Nat(Radix, String),
    /// `int.frac`
    Decimal(String, String),
}

impl Number {
    pub fn to_i64(&self) -> Option<i64> {
        match self {
            Number::Nat(radix, digits) => i64::from_str_radix(digits, radix.base()).ok(),
            Number::Decimal(..) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quantifier {
    Forall,
    Exists,
}

/// Which junction a bulleted list uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bullet {
    And,
    Or,
}

/// `[A]_v` is `Box`, `<<A>>_v` is `Angle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modal {
    Box,
    Angle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fairness {
    Weak,
    Strong,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Identifier, or a user-definable operator symbol in canonical spelling.
    Ident(String),
    /// A built-in operator used as a head or a value.
    Internal(Builtin),
    /// Operator application, including every prefix/infix/postfix use.
    Apply(Box<Expr>, Vec<Expr>),
    /// Instance-qualified operator: `M!Op(args)`, `IS(x)!Op`, `A!B!C`.
    Bang(Box<Expr>, Spanned<String>, Vec<Expr>),
    Lambda(Vec<Spanned<String>>, Box<Expr>),
    /// `ASSUME ... PROVE ...` used where an expression is expected.
    Sequent(Box<Sequent>),
    /// `name(args) :: e`
    Label(Spanned<String>, Vec<Spanned<String>>, Box<Expr>),
    /// `@` inside an EXCEPT replacement.
    At,
    Bool(bool),
    Num(Number),
    Str(String),
    Tuple(Vec<Expr>),
    SetEnum(Vec<Expr>),
    /// `{x \in S : P}` or `{<<x, y>> \in S : P}`
    SetSt(Pattern, Box<Expr>, Box<Expr>),
    /// `{e : x \in S, ...}`
    SetOf(Box<Expr>, Vec<Bound>),
    /// `[x \in S |-> e]`
    Fcn(Vec<Bound>, Box<Expr>),
    /// `f[a, b]`
    FcnApp(Box<Expr>, Vec<Expr>),
    /// `[S -> T]`
    Arrow(Box<Expr>, Box<Expr>),
    /// `[a |-> e, ...]`
    Record(Vec<(Spanned<String>, Expr)>),
    /// `[a : S, ...]`
    Rect(Vec<(Spanned<String>, Expr)>),
    /// `r.a`
    Dot(Box<Expr>, Spanned<String>),
    Except(Box<Expr>, Vec<Exspec>),
    Quant(Quantifier, Vec<Bound>, Box<Expr>),
    /// `\AA x : P` / `\EE x : P`
    Tquant(Quantifier, Vec<Spanned<String>>, Box<Expr>),
    Choose(Spanned<String>, Option<Box<Expr>>, Box<Expr>),
    If(Box<Expr>, Box<Expr>, Box<Expr>),
    /// Arms and the optional `OTHER` arm.
    Case(Vec<(Expr, Expr)>, Option<Box<Expr>>),
    Let(Vec<Defn>, Box<Expr>),
    /// Bulleted `/\` or `\/` list.
    List(Bullet, Vec<Expr>),
    /// `[A]_v` or `<<A>>_v`
    Sub(Modal, Box<Expr>, Box<Expr>),
    /// `WF_v(A)` / `SF_v(A)`; the subscript first.
    Fair(Fairness, Box<Expr>, Box<Expr>),
    Parens(Box<Expr>),
}

impl ExprKind {
    /// Strip any number of enclosing parentheses.
    pub fn unparen(&self) -> &ExprKind {
        match self {
            ExprKind::Parens(inner) => inner.node.unparen(),
            other => other,
        }
    }
}

/// A bound variable; `Ditto` means "same domain as the previous bound".
#[derive(Debug, Clone, PartialEq)]
pub struct Bound {
    pub pattern: Pattern,
    pub domain: Domain,
}

/// What a bound introduces. A tuple pattern always has its own domain.
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Name(Spanned<String>),
    /// `<<x, y>>`
    Tuple(Vec<Spanned<String>>),
}

impl Pattern {
    pub fn names(&self) -> impl Iterator<Item = &Spanned<String>> {
        let names: &[Spanned<String>] = match self {
            Pattern::Name(n) => std::slice::from_ref(n),
            Pattern::Tuple(ns) => ns,
        };
        names.iter()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Domain {
    Unbounded,
    Bounded(Expr),
    Ditto,
}

/// One `!path = value` trailer of an EXCEPT.
#[derive(Debug, Clone, PartialEq)]
pub struct Exspec {
    pub path: Vec<Expoint>,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expoint {
    /// `.field`
    Dot(Spanned<String>),
    /// `[e1, ..., en]`
    Index(Vec<Expr>),
}

// ──────────────────────────────────────────────
// Definitions
// ──────────────────────────────────────────────

/// Placeholder arity of a declared or parameter operator: `x` is `Expr`,
/// `F(_, _)` and `_ + _` are `Op(2)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    Expr,
    Op(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Spanned<String>,
    pub shape: Shape,
}

/// How the head of an operator definition was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeadForm {
    Nonfix,
    Prefix,
    Infix,
    Postfix,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Defn {
    pub name: Spanned<String>,
    pub local: bool,
    pub kind: DefnKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DefnKind {
    Operator {
        form: HeadForm,
        params: Vec<Param>,
        body: Expr,
    },
    /// `f[x \in S] == e`
    Function { bounds: Vec<Bound>, body: Expr },
    /// `I(x) == INSTANCE M WITH ...`
    Instance { params: Vec<Param>, instance: Instance },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    pub module: Spanned<String>,
    pub subs: Vec<(Spanned<String>, Expr)>,
}

// ──────────────────────────────────────────────
// Sequents
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NewKind {
    Constant,
    Variable,
    State,
    Action,
    Temporal,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Hyp {
    /// `NEW [kind] x [\in S]` or `NEW [kind] F(_)`
    New {
        kind: NewKind,
        name: Spanned<String>,
        shape: Shape,
        domain: Option<Expr>,
    },
    Fact(Expr),
}

/// `ASSUME h1, ..., hn PROVE goal`; a bare assertion has no hypotheses.
#[derive(Debug, Clone, PartialEq)]
pub struct Sequent {
    pub context: Vec<Spanned<Hyp>>,
    pub active: Expr,
}

// ──────────────────────────────────────────────
// Proofs
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Omission {
    /// No proof was written.
    Implicit,
    /// `OMITTED`
    Explicit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Fact {
    Expr(Expr),
    Module(Spanned<String>),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Usable {
    pub facts: Vec<Fact>,
    pub defs: Vec<Spanned<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Proof {
    Omitted(Omission),
    Obvious,
    By { only: bool, usable: Usable },
    Steps(Vec<Spanned<Step>>, Box<Spanned<Qed>>),
}

/// The written shape of a step marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marker {
    /// `<*>`
    Star,
    /// `<+>`
    Plus,
    /// `<n>`
    Num(usize),
}

/// Marker as written plus the level derived while parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepNumber {
    pub marker: Marker,
    pub label: Option<String>,
    pub level: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub number: StepNumber,
    pub kind: StepKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepKind {
    Assert(Sequent, Proof),
    Suffices(Sequent, Proof),
    /// proof-level `CASE e`
    Pcase(Expr, Proof),
    Pick(Vec<Bound>, Expr, Proof),
    Use { only: bool, usable: Usable },
    Hide(Usable),
    Define(Vec<Defn>),
    Have(Expr),
    Take(Vec<Bound>),
    Witness(Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Qed {
    pub number: StepNumber,
    pub proof: Proof,
}

// ──────────────────────────────────────────────
// Modules
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TheoremKind {
    Theorem,
    Lemma,
    Proposition,
    Corollary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AxiomKind {
    Assume,
    Assumption,
    Axiom,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UnitKind {
    Constants(Vec<(Spanned<String>, Shape)>),
    Variables(Vec<Spanned<String>>),
    Recursives(Vec<(Spanned<String>, Shape)>),
    Definition(Defn),
    Instance { local: bool, instance: Instance },
    Axiom {
        kind: AxiomKind,
        name: Option<Spanned<String>>,
        body: Expr,
    },
    Theorem {
        kind: TheoremKind,
        name: Option<Spanned<String>>,
        body: Sequent,
        proof: Proof,
    },
    Use { only: bool, usable: Usable },
    Hide(Usable),
    Submodule(Module),
    /// `----` between units
    Separator,
}

pub type Unit = Spanned<UnitKind>;

#[derive(Debug, Clone)]
pub struct Module {
    pub name: Spanned<String>,
    pub extends: Vec<Spanned<String>>,
    pub units: Vec<Unit>,
    pub span: Span,
}

impl PartialEq for Module {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.extends == other.extends && self.units == other.units
    }
}
