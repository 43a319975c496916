//! Canonical printer.
//!
//! Printed text parses back to a tree equal to the one printed, for every
//! tree the parser can produce. Operators use their canonical spelling,
//! bulleted lists put one item per line with the bullets aligned, and no
//! parentheses are invented: an infix application that cannot be written
//! infix without regrouping (`*(a + b, c)`) keeps its nonfix form.
//!
//! Trees built by hand may have shapes no text produces, such as a prefix
//! operator applied to a lower-precedence sum without a `Parens` node. Those
//! are closed off with a nonfix form or parentheses; the text is valid but
//! may parse back to a slightly different tree.

use crate::ast::{
    AxiomKind, Bound, Builtin, Bullet, Defn, DefnKind, Domain, Exspec, Expoint, Expr, ExprKind,
    Fact, Fairness, HeadForm, Hyp, Instance, Marker, Modal, Module, NewKind, Number, Omission,
    Param, Pattern, Proof, Quantifier, Radix, Sequent, Shape, Step, StepKind, StepNumber,
    TheoremKind, UnitKind, Usable,
};
use crate::combinator::resolve::{reduces_first, Item};
use crate::ops::{Fixity, FixityClass, OpDescriptor, OpTable, APP_PREC, DOT_PREC};
use crate::span::Spanned;

/// Indentation of the steps of a theorem's proof.
const PROOF_INDENT: usize = 2;

pub fn expr_to_string(e: &Expr) -> String {
    let mut p = Printer::default();
    p.expr(e);
    p.out
}

pub fn module_to_string(m: &Module) -> String {
    let mut p = Printer::default();
    p.module(m);
    p.out.push('\n');
    p.out
}

// ──────────────────────────────────────────────
// Operator shapes
// ──────────────────────────────────────────────

/// An operator as the resolver sees it; only precedence and fixity matter.
type Op = Item<(), ()>;

/// How an expression is laid out, as far as the operators around it care.
enum Form<'e> {
    /// Self-delimiting: an atom, a bracketed form or a nonfix application.
    Closed,
    /// Ends in an expression that would swallow a following operator.
    Open,
    Prefix(&'e str, Op, &'e Expr),
    Postfix(&'e str, Op, &'e Expr),
    Infix(&'e str, Op, &'e Expr, &'e Expr),
    /// `a \X b \X c`
    Chain(Op, &'e [Expr]),
    /// `f[a]` and `r.a`
    Select(Op, &'e Expr),
}

/// Spelling and descriptor of an operator head applied to `arity` operands.
fn operator_of(head: &Expr, arity: usize) -> Option<(&str, &'static OpDescriptor)> {
    let table = OpTable::global();
    let classes: &[FixityClass] = match arity {
        1 => &[FixityClass::Prefix, FixityClass::Postfix],
        2 => &[FixityClass::Infix],
        _ => &[],
    };
    match &head.node {
        ExprKind::Internal(b) => classes
            .iter()
            .find_map(|c| table.of_builtin(*b, *c))
            .map(|d| (b.spelling(), d)),
        ExprKind::Ident(name) => classes
            .iter()
            .find_map(|c| table.find(name, *c))
            .map(|d| (name.as_str(), d)),
        _ => None,
    }
}

fn item_of(d: &OpDescriptor) -> Op {
    match d.fixity {
        Fixity::Prefix => Item::Prefix((), d.prec),
        Fixity::Postfix => Item::Postfix((), d.prec),
        Fixity::Infix(assoc) => Item::Infix((), d.prec, assoc),
    }
}

fn reduces(stacked: &Op, incoming: &Op) -> bool {
    reduces_first(stacked, incoming) == Some(true)
}

fn shifts(stacked: &Op, incoming: &Op) -> bool {
    reduces_first(stacked, incoming) == Some(false)
}

fn is_cartesian(e: &Expr) -> bool {
    matches!(&e.node, ExprKind::Apply(head, args)
        if head.node == ExprKind::Internal(Builtin::Cartesian) && args.len() >= 2)
}

fn form(e: &Expr) -> Form<'_> {
    match &e.node {
        ExprKind::Apply(head, args) => {
            let chain = is_cartesian(e);
            let arity = if chain { 2 } else { args.len() };
            let Some((spelling, d)) = operator_of(head, arity) else {
                return Form::Closed;
            };
            let op = item_of(d);
            match (d.fixity, args.as_slice()) {
                (_, [l, r]) if chain => {
                    if is_cartesian(l) || is_cartesian(r) || !fits_infix(&op, l, r) {
                        Form::Closed
                    } else {
                        Form::Chain(op, args)
                    }
                }
                _ if chain => Form::Chain(op, args),
                (Fixity::Prefix, [a]) => Form::Prefix(spelling, op, a),
                (Fixity::Postfix, [a]) => Form::Postfix(spelling, op, a),
                (Fixity::Infix(_), [l, r]) if fits_infix(&op, l, r) => {
                    Form::Infix(spelling, op, l, r)
                }
                _ => Form::Closed,
            }
        }
        ExprKind::FcnApp(base, _) => Form::Select(Item::Postfix((), APP_PREC), base),
        ExprKind::Dot(base, _) => Form::Select(Item::Postfix((), DOT_PREC), base),
        ExprKind::Quant(..)
        | ExprKind::Tquant(..)
        | ExprKind::Choose(..)
        | ExprKind::Lambda(..)
        | ExprKind::If(..)
        | ExprKind::Case(..)
        | ExprKind::Let(..)
        | ExprKind::Label(..)
        | ExprKind::Sequent(..)
        | ExprKind::List(..) => Form::Open,
        _ => Form::Closed,
    }
}

fn fits_infix(op: &Op, lhs: &Expr, rhs: &Expr) -> bool {
    fits_after(lhs, op) && fits_before(op, rhs)
}

/// Every operator still open at the right end of `e` reduces before
/// `incoming` is pushed.
fn fits_after(e: &Expr, incoming: &Op) -> bool {
    match form(e) {
        Form::Closed | Form::Postfix(..) | Form::Select(..) => true,
        Form::Open => false,
        Form::Prefix(_, op, arg) => {
            reduces(&op, incoming) && (!fits_before(&op, arg) || fits_after(arg, incoming))
        }
        Form::Infix(_, op, _, rhs) => reduces(&op, incoming) && fits_after(rhs, incoming),
        Form::Chain(op, factors) => {
            let last = factors.len() - 1;
            reduces(&op, incoming)
                && (!factor_is_bare(&op, factors, last) || fits_after(&factors[last], incoming))
        }
    }
}

/// Every operator waiting at the left end of `e` is pushed on top of
/// `stacked` instead of reducing it.
fn fits_before(stacked: &Op, e: &Expr) -> bool {
    match form(e) {
        Form::Closed | Form::Open | Form::Prefix(..) => true,
        Form::Postfix(_, op, arg) | Form::Select(op, arg) => {
            shifts(stacked, &op) && (!fits_after(arg, &op) || fits_before(stacked, arg))
        }
        Form::Infix(_, op, lhs, _) => shifts(stacked, &op) && fits_before(stacked, lhs),
        Form::Chain(op, factors) => {
            shifts(stacked, &op)
                && (!factor_is_bare(&op, factors, 0) || fits_before(stacked, &factors[0]))
        }
    }
}

/// Whether factor `i` of a `\X` chain can be printed without brackets.
fn factor_is_bare(op: &Op, factors: &[Expr], i: usize) -> bool {
    let f = &factors[i];
    !is_cartesian(f)
        && (i == 0 || fits_before(op, f))
        && (i + 1 == factors.len() || fits_after(f, op))
}

/// An infix application that can be written `op(a, b)`.
fn infix_parts(e: &Expr) -> Option<(&Expr, &[Expr])> {
    match &e.node {
        ExprKind::Apply(head, args) if args.len() == 2 => {
            operator_of(head, 2).map(|_| (head.as_ref(), args.as_slice()))
        }
        _ => None,
    }
}

fn standalone(b: Builtin) -> &'static str {
    match b {
        // plain `-` reads as binary minus in argument position
        Builtin::Uminus => "-.",
        other => other.spelling(),
    }
}

// ──────────────────────────────────────────────
// Printer
// ──────────────────────────────────────────────

#[derive(Default)]
struct Printer {
    out: String,
}

impl Printer {
    fn col(&self) -> usize {
        let line = self.out.rfind('\n').map_or(0, |i| i + 1);
        self.out[line..].chars().count()
    }

    fn word(&mut self, s: &str) {
        self.out.push_str(s);
    }

    fn newline(&mut self, indent: usize) {
        self.out.push('\n');
        self.out.push_str(&" ".repeat(indent));
    }

    fn sep<T>(&mut self, items: &[T], sep: &str, mut each: impl FnMut(&mut Self, &T)) {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.word(sep);
            }
            each(self, item);
        }
    }

    fn exprs(&mut self, es: &[Expr]) {
        self.sep(es, ", ", |p, e| p.expr(e));
    }

    fn names(&mut self, names: &[Spanned<String>]) {
        self.sep(names, ", ", |p, n| p.word(&n.node));
    }

    // ── Expressions ──────────────────────────────────────────────────────

    fn expr(&mut self, e: &Expr) {
        match &e.node {
            ExprKind::Ident(name) => self.word(name),
            ExprKind::Internal(b) => self.word(standalone(*b)),
            ExprKind::Apply(head, args) => self.apply(e, head, args),
            ExprKind::Bang(base, op, args) => {
                self.expr(base);
                self.word("!");
                self.word(&op.node);
                if !args.is_empty() {
                    self.arguments(args);
                }
            }
            ExprKind::Lambda(params, body) => {
                self.word("LAMBDA ");
                self.names(params);
                self.word(" : ");
                self.expr(body);
            }
            ExprKind::Sequent(sq) => self.sequent(sq),
            ExprKind::Label(name, params, body) => {
                self.word(&name.node);
                if !params.is_empty() {
                    self.word("(");
                    self.names(params);
                    self.word(")");
                }
                self.word(" :: ");
                self.expr(body);
            }
            ExprKind::At => self.word("@"),
            ExprKind::Bool(true) => self.word("TRUE"),
            ExprKind::Bool(false) => self.word("FALSE"),
            ExprKind::Num(n) => self.number(n),
            ExprKind::Str(s) => self.string(s),
            ExprKind::Tuple(es) => {
                self.word("<<");
                self.exprs(es);
                self.word(">>");
            }
            ExprKind::SetEnum(es) => {
                self.word("{");
                self.exprs(es);
                self.word("}");
            }
            ExprKind::SetSt(pattern, domain, pred) => {
                self.word("{");
                self.pattern(pattern);
                self.word(" \\in ");
                self.expr(domain);
                self.word(" : ");
                self.expr(pred);
                self.word("}");
            }
            ExprKind::SetOf(elem, bounds) => {
                self.word("{");
                self.expr(elem);
                self.word(" : ");
                self.bounds(bounds);
                self.word("}");
            }
            ExprKind::Fcn(bounds, body) => {
                self.word("[");
                self.bounds(bounds);
                self.word(" |-> ");
                self.expr(body);
                self.word("]");
            }
            ExprKind::FcnApp(base, args) => {
                self.operand_before(base, &Item::Postfix((), APP_PREC));
                self.word("[");
                self.exprs(args);
                self.word("]");
            }
            ExprKind::Arrow(dom, range) => {
                self.word("[");
                self.expr(dom);
                self.word(" -> ");
                self.expr(range);
                self.word("]");
            }
            ExprKind::Record(fields) => self.fields(fields, " |-> "),
            ExprKind::Rect(fields) => self.fields(fields, " : "),
            ExprKind::Dot(base, field) => {
                self.operand_before(base, &Item::Postfix((), DOT_PREC));
                self.word(".");
                self.word(&field.node);
            }
            ExprKind::Except(base, specs) => {
                self.word("[");
                self.expr(base);
                self.word(" EXCEPT ");
                self.sep(specs, ", ", Self::except_spec);
                self.word("]");
            }
            ExprKind::Quant(q, bounds, body) => {
                self.word(match q {
                    Quantifier::Forall => "\\A ",
                    Quantifier::Exists => "\\E ",
                });
                self.bounds(bounds);
                self.word(" : ");
                self.expr(body);
            }
            ExprKind::Tquant(q, names, body) => {
                self.word(match q {
                    Quantifier::Forall => "\\AA ",
                    Quantifier::Exists => "\\EE ",
                });
                self.names(names);
                self.word(" : ");
                self.expr(body);
            }
            ExprKind::Choose(name, domain, body) => {
                self.word("CHOOSE ");
                self.word(&name.node);
                if let Some(d) = domain {
                    self.word(" \\in ");
                    self.expr(d);
                }
                self.word(" : ");
                self.expr(body);
            }
            ExprKind::If(c, t, f) => {
                self.word("IF ");
                self.expr(c);
                self.word(" THEN ");
                self.expr(t);
                self.word(" ELSE ");
                self.expr(f);
            }
            ExprKind::Case(arms, other) => {
                self.word("CASE ");
                self.sep(arms, " [] ", |p, (guard, value)| {
                    p.expr(guard);
                    p.word(" -> ");
                    p.expr(value);
                });
                if let Some(o) = other {
                    if !arms.is_empty() {
                        self.word(" [] ");
                    }
                    self.word("OTHER -> ");
                    self.expr(o);
                }
            }
            ExprKind::Let(defs, body) => {
                self.word("LET ");
                self.sep(defs, " ", Self::definition);
                self.word(" IN ");
                self.expr(body);
            }
            ExprKind::List(bullet, items) => self.list(*bullet, items),
            ExprKind::Sub(modal, action, sub) => {
                let (open, close) = match modal {
                    Modal::Box => ("[", "]_"),
                    Modal::Angle => ("<<", ">>_"),
                };
                self.word(open);
                self.expr(action);
                self.word(close);
                self.subscript(sub);
            }
            ExprKind::Fair(fairness, sub, action) => {
                self.word(match fairness {
                    Fairness::Weak => "WF_",
                    Fairness::Strong => "SF_",
                });
                self.subscript(sub);
                self.word("(");
                self.expr(action);
                self.word(")");
            }
            ExprKind::Parens(inner) => self.parens(inner),
        }
    }

    fn apply(&mut self, e: &Expr, head: &Expr, args: &[Expr]) {
        match form(e) {
            Form::Prefix(spelling, op, arg) => {
                self.word(spelling);
                self.word(" ");
                if fits_before(&op, arg) {
                    self.expr(arg);
                } else {
                    self.closed(arg);
                }
            }
            Form::Postfix(spelling, op, arg) => {
                self.operand_before(arg, &op);
                self.word(spelling);
            }
            Form::Infix(spelling, _, lhs, rhs) => {
                self.expr(lhs);
                self.word(" ");
                self.word(spelling);
                self.word(" ");
                self.expr(rhs);
            }
            Form::Chain(op, factors) => {
                for (i, f) in factors.iter().enumerate() {
                    if i > 0 {
                        self.word(" \\X ");
                    }
                    if factor_is_bare(&op, factors, i) {
                        self.expr(f);
                    } else {
                        self.parens(f);
                    }
                }
            }
            _ => self.nonfix(head, args),
        }
    }

    /// `op(a, b)` or `F(a, b)`
    fn nonfix(&mut self, head: &Expr, args: &[Expr]) {
        match &head.node {
            // `/\(` would open a bulleted list
            ExprKind::Internal(Builtin::Conj) => self.word("\\land"),
            ExprKind::Internal(Builtin::Disj) => self.word("\\lor"),
            ExprKind::Internal(b) => self.word(b.spelling()),
            _ => self.expr(head),
        }
        self.arguments(args);
    }

    fn arguments(&mut self, args: &[Expr]) {
        self.word("(");
        self.exprs(args);
        self.word(")");
    }

    /// `e` followed by the postfix-like `op`.
    fn operand_before(&mut self, e: &Expr, op: &Op) {
        if fits_after(e, op) {
            self.expr(e);
        } else {
            self.closed(e);
        }
    }

    /// `e` in a form no neighbouring operator can reach into.
    fn closed(&mut self, e: &Expr) {
        match infix_parts(e) {
            Some((head, args)) if !is_cartesian(e) => self.nonfix(head, args),
            _ => self.parens(e),
        }
    }

    fn parens(&mut self, e: &Expr) {
        self.word("(");
        self.expr(e);
        self.word(")");
    }

    /// Bullets line up in the column where the list starts.
    fn list(&mut self, bullet: Bullet, items: &[Expr]) {
        let col = self.col();
        let mark = match bullet {
            Bullet::And => "/\\ ",
            Bullet::Or => "\\/ ",
        };
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.newline(col);
            }
            self.word(mark);
            self.expr(item);
        }
    }

    fn subscript(&mut self, sub: &Expr) {
        match &sub.node {
            ExprKind::Ident(_) | ExprKind::Tuple(_) | ExprKind::Parens(_) => self.expr(sub),
            _ => self.parens(sub),
        }
    }

    fn fields(&mut self, fields: &[(Spanned<String>, Expr)], sep: &str) {
        self.word("[");
        self.sep(fields, ", ", |p, (name, value)| {
            p.word(&name.node);
            p.word(sep);
            p.expr(value);
        });
        self.word("]");
    }

    fn except_spec(&mut self, spec: &Exspec) {
        self.word("!");
        for point in &spec.path {
            match point {
                Expoint::Dot(field) => {
                    self.word(".");
                    self.word(&field.node);
                }
                Expoint::Index(args) => {
                    self.word("[");
                    self.exprs(args);
                    self.word("]");
                }
            }
        }
        self.word(" = ");
        self.expr(&spec.value);
    }

    fn number(&mut self, n: &Number) {
        match n {
            Number::Nat(radix, digits) => {
                self.word(match radix {
                    Radix::Binary => "\\b",
                    Radix::Octal => "\\o",
                    Radix::Hex => "\\h",
                    Radix::Decimal => "",
                });
                self.word(digits);
            }
            Number::Decimal(int, frac) => {
                self.word(int);
                self.word(".");
                self.word(frac);
            }
        }
    }

    fn string(&mut self, s: &str) {
        self.out.push('"');
        for ch in s.chars() {
            match ch {
                '"' => self.word("\\\""),
                '\\' => self.word("\\\\"),
                '\n' => self.word("\\n"),
                '\t' => self.word("\\t"),
                '\r' => self.word("\\r"),
                '\x0c' => self.word("\\f"),
                other => self.out.push(other),
            }
        }
        self.out.push('"');
    }

    fn pattern(&mut self, pattern: &Pattern) {
        match pattern {
            Pattern::Name(name) => self.word(&name.node),
            Pattern::Tuple(names) => {
                self.word("<<");
                self.sep(names, ", ", |p, n| p.word(&n.node));
                self.word(">>");
            }
        }
    }

    /// A domain is written once, after the last name that shares it. A
    /// tuple never shares.
    fn bounds(&mut self, bounds: &[Bound]) {
        let mut i = 0;
        while i < bounds.len() {
            if i > 0 {
                self.word(", ");
            }
            match &bounds[i].domain {
                Domain::Bounded(domain) => {
                    let mut j = i + 1;
                    if matches!(bounds[i].pattern, Pattern::Name(_)) {
                        while j < bounds.len()
                            && bounds[j].domain == Domain::Ditto
                            && matches!(bounds[j].pattern, Pattern::Name(_))
                        {
                            j += 1;
                        }
                    }
                    self.sep(&bounds[i..j], ", ", |p, b| p.pattern(&b.pattern));
                    self.word(" \\in ");
                    self.expr(domain);
                    i = j;
                }
                Domain::Unbounded | Domain::Ditto => {
                    self.pattern(&bounds[i].pattern);
                    i += 1;
                }
            }
        }
    }

    // ── Definitions ──────────────────────────────────────────────────────

    fn definition(&mut self, d: &Defn) {
        if d.local {
            self.word("LOCAL ");
        }
        let name = d.name.node.as_str();
        match &d.kind {
            DefnKind::Operator { form, params, body } => {
                match (form, params.as_slice()) {
                    (HeadForm::Prefix, [x]) => {
                        self.word(name);
                        self.word(" ");
                        self.word(&x.name.node);
                    }
                    (HeadForm::Infix, [x, y]) => {
                        self.word(&x.name.node);
                        self.word(" ");
                        self.word(name);
                        self.word(" ");
                        self.word(&y.name.node);
                    }
                    (HeadForm::Postfix, [x]) => {
                        self.word(&x.name.node);
                        self.word(" ");
                        self.word(name);
                    }
                    _ => {
                        self.word(name);
                        self.params(params);
                    }
                }
                self.word(" == ");
                self.expr(body);
            }
            DefnKind::Function { bounds, body } => {
                self.word(name);
                self.word("[");
                self.bounds(bounds);
                self.word("] == ");
                self.expr(body);
            }
            DefnKind::Instance { params, instance } => {
                self.word(name);
                self.params(params);
                self.word(" == ");
                self.instance(instance);
            }
        }
    }

    fn params(&mut self, params: &[Param]) {
        if params.is_empty() {
            return;
        }
        self.word("(");
        self.sep(params, ", ", |p, param| p.declaration(&param.name.node, param.shape));
        self.word(")");
    }

    /// `x`, `F(_, _)`, `_ + _`, `-. _` or `_ ^+`.
    fn declaration(&mut self, name: &str, shape: Shape) {
        let table = OpTable::global();
        match shape {
            Shape::Expr => self.word(name),
            Shape::Op(2) if table.any_infix(name).is_some() => {
                self.word("_ ");
                self.word(name);
                self.word(" _");
            }
            Shape::Op(1) if table.any_prefix(name).is_some() => {
                self.word(name);
                self.word(" _");
            }
            Shape::Op(1) if table.any_postfix(name).is_some() => {
                self.word("_ ");
                self.word(name);
            }
            Shape::Op(n) => {
                self.word(name);
                self.word("(");
                self.word(&vec!["_"; n].join(", "));
                self.word(")");
            }
        }
    }

    fn instance(&mut self, inst: &Instance) {
        self.word("INSTANCE ");
        self.word(&inst.module.node);
        if !inst.subs.is_empty() {
            self.word(" WITH ");
            self.sep(&inst.subs, ", ", |p, (target, value)| {
                p.word(&target.node);
                p.word(" <- ");
                p.expr(value);
            });
        }
    }

    // ── Sequents and proofs ──────────────────────────────────────────────

    fn sequent(&mut self, sq: &Sequent) {
        if sq.context.is_empty() {
            self.expr(&sq.active);
            return;
        }
        self.word("ASSUME ");
        self.sep(&sq.context, ", ", |p, h| p.hypothesis(&h.node));
        self.word(" PROVE ");
        self.expr(&sq.active);
    }

    fn hypothesis(&mut self, h: &Hyp) {
        match h {
            Hyp::New {
                kind,
                name,
                shape,
                domain,
            } => {
                self.word(match kind {
                    NewKind::Constant => "NEW ",
                    NewKind::Variable => "NEW VARIABLE ",
                    NewKind::State => "NEW STATE ",
                    NewKind::Action => "NEW ACTION ",
                    NewKind::Temporal => "NEW TEMPORAL ",
                });
                self.declaration(&name.node, *shape);
                if let Some(d) = domain {
                    self.word(" \\in ");
                    self.expr(d);
                }
            }
            Hyp::Fact(e) => self.expr(e),
        }
    }

    /// Leaf proofs stay on the claim's line; steps start on fresh lines
    /// indented by `indent`.
    fn proof(&mut self, proof: &Proof, indent: usize, top: bool) {
        match proof {
            Proof::Omitted(Omission::Implicit) => {}
            Proof::Omitted(Omission::Explicit) => self.word(" OMITTED"),
            Proof::Obvious => self.word(" OBVIOUS"),
            Proof::By { only, usable } => {
                self.word(" BY ");
                if *only {
                    self.word("ONLY ");
                }
                self.usable(usable);
            }
            Proof::Steps(steps, qed) => {
                let first = steps
                    .first()
                    .map_or(&qed.node.number, |s| &s.node.number);
                // `<*>` only opens a nested proof after PROOF
                if first.marker == Marker::Star && !top {
                    self.word(" PROOF");
                }
                for step in steps {
                    self.newline(indent);
                    self.step(&step.node, indent);
                }
                self.newline(indent);
                self.step_number(&qed.node.number);
                self.word(" QED");
                self.proof(&qed.node.proof, indent + PROOF_INDENT, false);
            }
        }
    }

    fn step_number(&mut self, n: &StepNumber) {
        match n.marker {
            Marker::Num(level) => self.word(&format!("<{}>", level)),
            Marker::Star => self.word("<*>"),
            Marker::Plus => self.word("<+>"),
        }
        if let Some(label) = &n.label {
            self.word(label);
            self.word(".");
        }
    }

    fn step(&mut self, step: &Step, indent: usize) {
        self.step_number(&step.number);
        self.word(" ");
        let nested = indent + PROOF_INDENT;
        match &step.kind {
            StepKind::Assert(sq, proof) => {
                self.sequent(sq);
                self.proof(proof, nested, false);
            }
            StepKind::Suffices(sq, proof) => {
                self.word("SUFFICES ");
                self.sequent(sq);
                self.proof(proof, nested, false);
            }
            StepKind::Pcase(e, proof) => {
                self.word("CASE ");
                self.expr(e);
                self.proof(proof, nested, false);
            }
            StepKind::Pick(bounds, e, proof) => {
                self.word("PICK ");
                self.bounds(bounds);
                self.word(" : ");
                self.expr(e);
                self.proof(proof, nested, false);
            }
            StepKind::Use { only, usable } => {
                self.word("USE");
                if *only {
                    self.word(" ONLY");
                }
                self.usable_after_keyword(usable);
            }
            StepKind::Hide(usable) => {
                self.word("HIDE");
                self.usable_after_keyword(usable);
            }
            StepKind::Define(defs) => {
                self.word("DEFINE ");
                self.sep(defs, " ", Self::definition);
            }
            StepKind::Have(e) => {
                self.word("HAVE ");
                self.expr(e);
            }
            StepKind::Take(bounds) => {
                self.word("TAKE ");
                self.bounds(bounds);
            }
            StepKind::Witness(es) => {
                self.word("WITNESS ");
                self.exprs(es);
            }
        }
    }

    fn usable_after_keyword(&mut self, usable: &Usable) {
        if !usable.facts.is_empty() || !usable.defs.is_empty() {
            self.word(" ");
            self.usable(usable);
        }
    }

    fn usable(&mut self, usable: &Usable) {
        self.sep(&usable.facts, ", ", |p, fact| match fact {
            Fact::Expr(e) => p.expr(e),
            Fact::Module(m) => {
                p.word("MODULE ");
                p.word(&m.node);
            }
        });
        if !usable.defs.is_empty() {
            if !usable.facts.is_empty() {
                self.word(" ");
            }
            self.word("DEF ");
            self.names(&usable.defs);
        }
    }

    // ── Modules ──────────────────────────────────────────────────────────

    fn module(&mut self, m: &Module) {
        self.word("---- MODULE ");
        self.word(&m.name.node);
        self.word(" ----");
        if !m.extends.is_empty() {
            self.newline(0);
            self.word("EXTENDS ");
            self.names(&m.extends);
        }
        for unit in &m.units {
            self.newline(0);
            self.unit(&unit.node);
        }
        self.newline(0);
        self.word("====");
    }

    fn unit(&mut self, unit: &UnitKind) {
        match unit {
            UnitKind::Constants(decls) => {
                self.word("CONSTANTS ");
                self.sep(decls, ", ", |p, (name, shape)| p.declaration(&name.node, *shape));
            }
            UnitKind::Variables(names) => {
                self.word("VARIABLES ");
                self.names(names);
            }
            UnitKind::Recursives(decls) => {
                self.word("RECURSIVE ");
                self.sep(decls, ", ", |p, (name, shape)| p.declaration(&name.node, *shape));
            }
            UnitKind::Definition(d) => self.definition(d),
            UnitKind::Instance { local, instance } => {
                if *local {
                    self.word("LOCAL ");
                }
                self.instance(instance);
            }
            UnitKind::Axiom { kind, name, body } => {
                self.word(match kind {
                    AxiomKind::Assume => "ASSUME ",
                    AxiomKind::Assumption => "ASSUMPTION ",
                    AxiomKind::Axiom => "AXIOM ",
                });
                self.claim_name(name.as_ref());
                self.expr(body);
            }
            UnitKind::Theorem {
                kind,
                name,
                body,
                proof,
            } => {
                self.word(match kind {
                    TheoremKind::Theorem => "THEOREM ",
                    TheoremKind::Lemma => "LEMMA ",
                    TheoremKind::Proposition => "PROPOSITION ",
                    TheoremKind::Corollary => "COROLLARY ",
                });
                self.claim_name(name.as_ref());
                self.sequent(body);
                self.proof(proof, PROOF_INDENT, true);
            }
            UnitKind::Use { only, usable } => {
                self.word("USE");
                if *only {
                    self.word(" ONLY");
                }
                self.usable_after_keyword(usable);
            }
            UnitKind::Hide(usable) => {
                self.word("HIDE");
                self.usable_after_keyword(usable);
            }
            UnitKind::Submodule(m) => self.module(m),
            UnitKind::Separator => self.word("----"),
        }
    }

    fn claim_name(&mut self, name: Option<&Spanned<String>>) {
        if let Some(n) = name {
            self.word(&n.node);
            self.word(" == ");
        }
    }
}
