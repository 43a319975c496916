//! Operator table: spelling -> {precedence range, fixity, canonical tag}.
//!
//! The table is built once per process behind a `OnceLock` and is read-only
//! afterwards. Aliases (`\land` for `/\`, `\union` for `\cup`, ...) share a
//! descriptor with their canonical spelling.

use crate::ast::Builtin;
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

/// A closed precedence interval `[lo, hi]`, `lo <= hi`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Prec {
    pub lo: u8,
    pub hi: u8,
}

impl Prec {
    pub const fn new(lo: u8, hi: u8) -> Self {
        Prec { lo, hi }
    }

    /// `self` lies entirely below `other`.
    pub fn below(&self, other: &Prec) -> bool {
        self.hi < other.lo
    }

    /// Neither range lies entirely below the other.
    pub fn conflicts(&self, other: &Prec) -> bool {
        !self.below(other) && !other.below(self)
    }
}

impl fmt::Display for Prec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.lo == self.hi {
            write!(f, "{}", self.lo)
        } else {
            write!(f, "{}-{}", self.lo, self.hi)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Assoc {
    Left,
    Right,
    Non,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fixity {
    Prefix,
    Postfix,
    Infix(Assoc),
}

impl Fixity {
    pub fn class(&self) -> FixityClass {
        match self {
            Fixity::Prefix => FixityClass::Prefix,
            Fixity::Postfix => FixityClass::Postfix,
            Fixity::Infix(_) => FixityClass::Infix,
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            Fixity::Infix(_) => 2,
            _ => 1,
        }
    }
}

/// Fixity without associativity; the key of the per-class lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FixityClass {
    Prefix,
    Postfix,
    Infix,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpDescriptor {
    /// Canonical spelling, e.g. `/\` for both `/\` and `\land`.
    pub name: &'static str,
    pub prec: Prec,
    pub fixity: Fixity,
    /// Built-in AST tag; `None` for user-definable symbols like `\oplus`.
    pub builtin: Option<Builtin>,
}

/// The operator catalog.
pub struct OpTable {
    descriptors: Vec<OpDescriptor>,
    /// spelling -> indices into `descriptors`, in registration order
    by_spelling: HashMap<&'static str, Vec<usize>>,
    /// canonical name -> spellings, canonical spelling first
    spellings: HashMap<&'static str, Vec<&'static str>>,
}

// (spellings, lo, hi, fixity, builtin); the first spelling is canonical.
type Row = (&'static [&'static str], u8, u8, Fixity, Option<Builtin>);

const L: Fixity = Fixity::Infix(Assoc::Left);
const N: Fixity = Fixity::Infix(Assoc::Non);
const PRE: Fixity = Fixity::Prefix;
const POST: Fixity = Fixity::Postfix;

const ROWS: &[Row] = &[
    // ── prefix ───────────────────────────────────────────────────────────
    (&["-.", "-"], 12, 12, PRE, Some(Builtin::Uminus)),
    (&["~", "\\lnot", "\\neg"], 4, 4, PRE, Some(Builtin::Neg)),
    (&["[]"], 4, 15, PRE, Some(Builtin::Box)),
    (&["<>"], 4, 15, PRE, Some(Builtin::Diamond)),
    (&["DOMAIN"], 9, 9, PRE, Some(Builtin::Domain)),
    (&["ENABLED"], 4, 15, PRE, Some(Builtin::Enabled)),
    (&["SUBSET"], 8, 8, PRE, Some(Builtin::Subset)),
    (&["UNCHANGED"], 4, 15, PRE, Some(Builtin::Unchanged)),
    (&["UNION"], 8, 8, PRE, Some(Builtin::Union)),
    // ── postfix ──────────────────────────────────────────────────────────
    (&["'"], 15, 15, POST, Some(Builtin::Prime)),
    (&["^+"], 15, 15, POST, None),
    (&["^*"], 15, 15, POST, None),
    (&["^#"], 15, 15, POST, None),
    // ── infix: logic ─────────────────────────────────────────────────────
    (&["=>"], 1, 1, N, Some(Builtin::Implies)),
    (&["<=>", "\\equiv"], 2, 2, N, Some(Builtin::Equiv)),
    (&["~>"], 2, 2, N, Some(Builtin::Leadsto)),
    (&["-+->"], 2, 2, N, Some(Builtin::Actplus)),
    (&["/\\", "\\land"], 3, 3, L, Some(Builtin::Conj)),
    (&["\\/", "\\lor"], 3, 3, L, Some(Builtin::Disj)),
    // ── infix: relations ─────────────────────────────────────────────────
    (&["="], 5, 5, N, Some(Builtin::Eq)),
    (&["/=", "#"], 5, 5, N, Some(Builtin::Neq)),
    (&["<"], 5, 5, N, Some(Builtin::Lt)),
    (&["=<", "<=", "\\leq"], 5, 5, N, Some(Builtin::Lteq)),
    (&[">"], 5, 5, N, Some(Builtin::Gt)),
    (&[">=", "\\geq"], 5, 5, N, Some(Builtin::Gteq)),
    (&["\\in"], 5, 5, N, Some(Builtin::Mem)),
    (&["\\notin"], 5, 5, N, Some(Builtin::Notmem)),
    (&["\\subseteq"], 5, 5, N, Some(Builtin::Subseteq)),
    (&["\\cdot"], 5, 14, L, Some(Builtin::Cdot)),
    (&["-|"], 5, 5, N, None),
    (&["::="], 5, 5, N, None),
    (&[":="], 5, 5, N, None),
    (&["=|"], 5, 5, N, None),
    (&["|-"], 5, 5, N, None),
    (&["|="], 5, 5, N, None),
    (&["\\approx"], 5, 5, N, None),
    (&["\\asymp"], 5, 5, N, None),
    (&["\\cong"], 5, 5, N, None),
    (&["\\doteq"], 5, 5, N, None),
    (&["\\gg"], 5, 5, N, None),
    (&["\\ll"], 5, 5, N, None),
    (&["\\prec"], 5, 5, N, None),
    (&["\\preceq"], 5, 5, N, None),
    (&["\\propto"], 5, 5, N, None),
    (&["\\sim"], 5, 5, N, None),
    (&["\\simeq"], 5, 5, N, None),
    (&["\\sqsubset"], 5, 5, N, None),
    (&["\\sqsubseteq"], 5, 5, N, None),
    (&["\\sqsupset"], 5, 5, N, None),
    (&["\\sqsupseteq"], 5, 5, N, None),
    (&["\\subset"], 5, 5, N, None),
    (&["\\succ"], 5, 5, N, None),
    (&["\\succeq"], 5, 5, N, None),
    (&["\\supset"], 5, 5, N, None),
    (&["\\supseteq"], 5, 5, N, None),
    // ── infix: functions and sets ────────────────────────────────────────
    (&["@@"], 6, 6, L, None),
    (&[":>"], 7, 7, N, None),
    (&["<:"], 7, 7, N, None),
    (&["\\", "\\setminus"], 8, 8, N, Some(Builtin::Setminus)),
    (&["\\cap", "\\intersect"], 8, 8, L, Some(Builtin::Cap)),
    (&["\\cup", "\\union"], 8, 8, L, Some(Builtin::Cup)),
    (&[".."], 9, 9, N, Some(Builtin::Range)),
    (&["..."], 9, 9, N, None),
    (&["!!"], 9, 13, N, None),
    (&["##"], 9, 13, L, None),
    (&["$"], 9, 13, L, None),
    (&["$$"], 9, 13, L, None),
    (&["??"], 9, 13, L, None),
    (&["\\sqcap"], 9, 13, L, None),
    (&["\\sqcup"], 9, 13, L, None),
    (&["\\uplus"], 9, 13, L, None),
    (&["\\wr"], 9, 14, N, None),
    // ── infix: arithmetic ────────────────────────────────────────────────
    (&["+"], 10, 10, L, Some(Builtin::Plus)),
    (&["++"], 10, 10, L, None),
    (&["(+)", "\\oplus"], 10, 10, L, None),
    (&["%"], 10, 11, N, Some(Builtin::Remainder)),
    (&["%%"], 10, 11, L, None),
    (&["|"], 10, 11, L, None),
    (&["||"], 10, 11, L, None),
    (&["\\X", "\\times"], 10, 13, L, Some(Builtin::Cartesian)),
    (&["-"], 11, 11, L, Some(Builtin::Minus)),
    (&["--"], 11, 11, L, None),
    (&["(-)", "\\ominus"], 11, 11, L, None),
    (&["&"], 13, 13, L, None),
    (&["&&"], 13, 13, L, None),
    (&["*"], 13, 13, L, Some(Builtin::Mult)),
    (&["**"], 13, 13, L, None),
    (&["/"], 13, 13, N, Some(Builtin::Ratio)),
    (&["//"], 13, 13, N, None),
    (&["\\div"], 13, 13, N, Some(Builtin::Quotient)),
    (&["(.)", "\\odot"], 13, 13, L, None),
    (&["(/)", "\\oslash"], 13, 13, N, None),
    (&["(\\X)", "\\otimes"], 13, 13, L, None),
    (&["\\o", "\\circ"], 13, 13, L, None),
    (&["\\bigcirc"], 13, 13, L, None),
    (&["\\bullet"], 13, 13, L, None),
    (&["\\star"], 13, 13, L, None),
    (&["^"], 14, 14, N, Some(Builtin::Exp)),
    (&["^^"], 14, 14, N, None),
];

impl OpTable {
    fn build() -> Self {
        let mut descriptors = Vec::with_capacity(ROWS.len());
        let mut by_spelling: HashMap<&'static str, Vec<usize>> = HashMap::new();
        let mut spellings: HashMap<&'static str, Vec<&'static str>> = HashMap::new();

        for (names, lo, hi, fixity, builtin) in ROWS {
            let idx = descriptors.len();
            let name = names[0];
            descriptors.push(OpDescriptor {
                name,
                prec: Prec::new(*lo, *hi),
                fixity: *fixity,
                builtin: *builtin,
            });
            for spelling in names.iter() {
                by_spelling.entry(spelling).or_default().push(idx);
                let entry = spellings.entry(name).or_default();
                if !entry.contains(spelling) {
                    entry.push(spelling);
                }
            }
        }

        OpTable {
            descriptors,
            by_spelling,
            spellings,
        }
    }

    /// The process-wide table.
    pub fn global() -> &'static OpTable {
        static TABLE: OnceLock<OpTable> = OnceLock::new();
        TABLE.get_or_init(OpTable::build)
    }

    /// Every descriptor registered for `spelling`, in table order.
    pub fn lookup(&self, spelling: &str) -> impl Iterator<Item = &OpDescriptor> {
        self.by_spelling
            .get(spelling)
            .into_iter()
            .flatten()
            .map(move |&i| &self.descriptors[i])
    }

    pub fn find(&self, spelling: &str, class: FixityClass) -> Option<&OpDescriptor> {
        self.lookup(spelling).find(|d| d.fixity.class() == class)
    }

    pub fn any_prefix(&self, spelling: &str) -> Option<&OpDescriptor> {
        self.find(spelling, FixityClass::Prefix)
    }

    pub fn any_infix(&self, spelling: &str) -> Option<&OpDescriptor> {
        self.find(spelling, FixityClass::Infix)
    }

    pub fn any_postfix(&self, spelling: &str) -> Option<&OpDescriptor> {
        self.find(spelling, FixityClass::Postfix)
    }

    /// The canonical descriptor for a spelling regardless of fixity; used
    /// when an operator appears as a plain argument, e.g. `F(+, S)`.
    /// Infix readings are preferred since they are the common case.
    pub fn any_operator(&self, spelling: &str) -> Option<&OpDescriptor> {
        self.any_infix(spelling)
            .or_else(|| self.any_prefix(spelling))
            .or_else(|| self.any_postfix(spelling))
    }

    pub fn is_operator(&self, spelling: &str) -> bool {
        self.by_spelling.contains_key(spelling)
    }

    pub fn descriptors(&self) -> &[OpDescriptor] {
        &self.descriptors
    }

    /// All spellings (canonical first) of the descriptor named `name`.
    pub fn spellings_of(&self, name: &str) -> &[&'static str] {
        self.spellings.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All registered spellings.
    pub fn all_spellings(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.by_spelling.keys().copied()
    }

    /// The descriptor carrying a given builtin tag and fixity class.
    pub fn of_builtin(&self, builtin: Builtin, class: FixityClass) -> Option<&OpDescriptor> {
        self.descriptors
            .iter()
            .find(|d| d.builtin == Some(builtin) && d.fixity.class() == class)
    }
}

/// Function application `f[a]` binds tighter than every table operator.
pub const APP_PREC: Prec = Prec::new(16, 16);
/// Field selection `r.a` binds tighter still.
pub const DOT_PREC: Prec = Prec::new(17, 17);

/// Word-shaped spellings that lex as prefix operators, not identifiers.
pub const WORD_OPERATORS: &[&str] = &["DOMAIN", "ENABLED", "SUBSET", "UNCHANGED", "UNION"];
