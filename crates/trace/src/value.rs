//! Values a model checker prints inside a state, and their ITF encoding.

use crate::error::TraceError;
use crate::options::TraceOptions;
use serde_json::json;
use std::fmt;
use tlafront_core::ast::{Builtin, Number};
use tlafront_core::{Expr, ExprKind, Span};

/// Largest integer a JSON number carries without loss in common readers.
const MAX_SAFE_INTEGER: u64 = (1 << 53) - 1;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Str(String),
    /// A TLC model value such as `p1`. ITF has no type for these, so they
    /// are written as strings.
    Model(String),
    /// Sorted, without duplicates.
    Set(Vec<Value>),
    Tuple(Vec<Value>),
    /// Fields in printed order.
    Record(Vec<(String, Value)>),
    /// `k :> v @@ ...`; keys in printed order, each at most once.
    Map(Vec<(Value, Value)>),
}

impl Value {
    pub fn set(elems: impl IntoIterator<Item = Value>) -> Value {
        let mut elems: Vec<Value> = elems.into_iter().collect();
        elems.sort();
        elems.dedup();
        Value::Set(elems)
    }

    /// Read a value from the subset of expressions a state printer emits:
    /// literals, model values, sets, tuples, records, `:>`/`@@` functions
    /// and negated integers. Anything else is rejected.
    pub fn from_expr(e: &Expr) -> Result<Value, TraceError> {
        match e.node.unparen() {
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Num(n) => Ok(Value::Int(integer(n, false, &e.span)?)),
            ExprKind::Str(s) => Ok(Value::Str(s.clone())),
            ExprKind::Ident(name) => Ok(Value::Model(name.clone())),
            ExprKind::SetEnum(elems) => Ok(Value::set(values(elems)?)),
            ExprKind::Tuple(elems) => Ok(Value::Tuple(values(elems)?)),
            ExprKind::Record(fields) => {
                let mut out: Vec<(String, Value)> = Vec::with_capacity(fields.len());
                for (name, field) in fields {
                    if out.iter().any(|(n, _)| *n == name.node) {
                        return Err(TraceError::unsupported(
                            format!("record with repeated field {}", name.node),
                            &name.span,
                        ));
                    }
                    out.push((name.node.clone(), Value::from_expr(field)?));
                }
                Ok(Value::Record(out))
            }
            ExprKind::Apply(head, args) => application(head, args, &e.span),
            other => Err(TraceError::unsupported(shape_of(other), &e.span)),
        }
    }

    /// ITF JSON for this value.
    pub fn to_itf(&self, options: &TraceOptions) -> serde_json::Value {
        match self {
            Value::Bool(b) => json!(b),
            Value::Int(n) if options.plain_integers && n.unsigned_abs() <= MAX_SAFE_INTEGER => {
                json!(n)
            }
            Value::Int(n) => json!({ "#bigint": n.to_string() }),
            Value::Str(s) | Value::Model(s) => json!(s),
            Value::Set(elems) => json!({ "#set": itf_all(elems, options) }),
            Value::Tuple(elems) => json!({ "#tup": itf_all(elems, options) }),
            Value::Record(fields) if options.records_as_objects => {
                let obj: serde_json::Map<String, serde_json::Value> = fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_itf(options)))
                    .collect();
                serde_json::Value::Object(obj)
            }
            Value::Record(fields) => {
                let entries: Vec<serde_json::Value> = fields
                    .iter()
                    .map(|(k, v)| json!([k, v.to_itf(options)]))
                    .collect();
                json!({ "#map": entries })
            }
            Value::Map(pairs) => {
                let entries: Vec<serde_json::Value> = pairs
                    .iter()
                    .map(|(k, v)| json!([k.to_itf(options), v.to_itf(options)]))
                    .collect();
                json!({ "#map": entries })
            }
        }
    }
}

fn values(elems: &[Expr]) -> Result<Vec<Value>, TraceError> {
    elems.iter().map(Value::from_expr).collect()
}

fn itf_all(elems: &[Value], options: &TraceOptions) -> Vec<serde_json::Value> {
    elems.iter().map(|v| v.to_itf(options)).collect()
}

fn application(head: &Expr, args: &[Expr], span: &Span) -> Result<Value, TraceError> {
    match (&head.node, args) {
        (ExprKind::Internal(Builtin::Uminus), [arg]) => match arg.node.unparen() {
            ExprKind::Num(n) => Ok(Value::Int(integer(n, true, span)?)),
            _ => Err(TraceError::unsupported("negation of a non-literal", span)),
        },
        (ExprKind::Ident(op), [k, v]) if op == ":>" => Ok(Value::Map(vec![(
            Value::from_expr(k)?,
            Value::from_expr(v)?,
        )])),
        (ExprKind::Ident(op), [f, g]) if op == "@@" => {
            let (Value::Map(mut left), Value::Map(right)) =
                (Value::from_expr(f)?, Value::from_expr(g)?)
            else {
                return Err(TraceError::unsupported("@@ of a non-function", span));
            };
            // the left function wins on shared keys
            for (k, v) in right {
                if !left.iter().any(|(lk, _)| *lk == k) {
                    left.push((k, v));
                }
            }
            Ok(Value::Map(left))
        }
        _ => Err(TraceError::unsupported("operator application", span)),
    }
}

fn integer(n: &Number, negate: bool, span: &Span) -> Result<i64, TraceError> {
    let Number::Nat(radix, digits) = n else {
        return Err(TraceError::unsupported("real number", span));
    };
    let overflow = || TraceError::IntegerOverflow {
        text: format!("{}{}", if negate { "-" } else { "" }, digits),
        span: span.clone(),
    };
    let magnitude = i128::from_str_radix(digits, radix.base()).map_err(|_| overflow())?;
    let signed = if negate { -magnitude } else { magnitude };
    i64::try_from(signed).map_err(|_| overflow())
}

fn shape_of(kind: &ExprKind) -> &'static str {
    match kind {
        ExprKind::Bang(..) => "instance reference",
        ExprKind::SetSt(..) | ExprKind::SetOf(..) => "set comprehension",
        ExprKind::Fcn(..) => "function constructor",
        ExprKind::FcnApp(..) => "function application",
        ExprKind::Rect(_) | ExprKind::Arrow(..) => "set of records or functions",
        ExprKind::Quant(..) | ExprKind::Tquant(..) | ExprKind::Choose(..) => "binder",
        ExprKind::If(..) | ExprKind::Case(..) | ExprKind::Let(..) => "conditional",
        ExprKind::List(..) => "bulleted list",
        _ => "expression",
    }
}

// ── TLA+ rendering ───────────────────────────────────────────────────

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(true) => f.write_str("TRUE"),
            Value::Bool(false) => f.write_str("FALSE"),
            Value::Int(n) => write!(f, "{}", n),
            Value::Model(name) => f.write_str(name),
            Value::Str(s) => {
                f.write_str("\"")?;
                for c in s.chars() {
                    match c {
                        '"' => f.write_str("\\\"")?,
                        '\\' => f.write_str("\\\\")?,
                        '\n' => f.write_str("\\n")?,
                        '\t' => f.write_str("\\t")?,
                        '\r' => f.write_str("\\r")?,
                        c => write!(f, "{}", c)?,
                    }
                }
                f.write_str("\"")
            }
            Value::Set(elems) => {
                f.write_str("{")?;
                comma_list(f, elems)?;
                f.write_str("}")
            }
            Value::Tuple(elems) => {
                f.write_str("<<")?;
                comma_list(f, elems)?;
                f.write_str(">>")
            }
            Value::Record(fields) => {
                f.write_str("[")?;
                for (i, (k, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{} |-> {}", k, v)?;
                }
                f.write_str("]")
            }
            Value::Map(pairs) if pairs.is_empty() => f.write_str("<<>>"),
            Value::Map(pairs) => {
                f.write_str("(")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" @@ ")?;
                    }
                    write!(f, "{} :> {}", k, v)?;
                }
                f.write_str(")")
            }
        }
    }
}

fn comma_list(f: &mut fmt::Formatter<'_>, elems: &[Value]) -> fmt::Result {
    for (i, e) in elems.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", e)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tlafront_core::parse_expr_str;

    fn value(src: &str) -> Result<Value, TraceError> {
        Value::from_expr(&parse_expr_str(src).unwrap())
    }

    #[test]
    fn literals_and_collections() {
        assert_eq!(value("TRUE").unwrap(), Value::Bool(true));
        assert_eq!(value("-12").unwrap(), Value::Int(-12));
        assert_eq!(value("\\h1F").unwrap(), Value::Int(31));
        assert_eq!(value("\"a\\\"b\"").unwrap(), Value::Str("a\"b".into()));
        assert_eq!(
            value("{3, 1, 3}").unwrap(),
            Value::Set(vec![Value::Int(1), Value::Int(3)])
        );
        assert_eq!(
            value("<<1, <<>>>>").unwrap(),
            Value::Tuple(vec![Value::Int(1), Value::Tuple(vec![])])
        );
        assert_eq!(
            value("[b |-> 1, a |-> {}]").unwrap(),
            Value::Record(vec![
                ("b".into(), Value::Int(1)),
                ("a".into(), Value::Set(vec![])),
            ])
        );
    }

    #[test]
    fn functions_from_colon_greater_and_double_at() {
        let got = value("(1 :> \"x\" @@ 2 :> \"y\" @@ 1 :> \"z\")").unwrap();
        assert_eq!(
            got,
            Value::Map(vec![
                (Value::Int(1), Value::Str("x".into())),
                (Value::Int(2), Value::Str("y".into())),
            ])
        );
    }

    #[test]
    fn model_values_stay_distinct_from_strings() {
        let got = value("{p1, \"p1\"}").unwrap();
        assert_eq!(
            got,
            Value::Set(vec![Value::Str("p1".into()), Value::Model("p1".into())])
        );
        assert_eq!(got.to_string(), "{\"p1\", p1}");
        let itf = Value::Model("p1".into()).to_itf(&TraceOptions::default());
        assert_eq!(itf, serde_json::json!("p1"));
    }

    #[test]
    fn integers_outside_i64_overflow() {
        assert_eq!(value("-9223372036854775808").unwrap(), Value::Int(i64::MIN));
        assert!(matches!(
            value("9223372036854775808"),
            Err(TraceError::IntegerOverflow { .. })
        ));
        assert!(matches!(
            value("123456789012345678901234567890"),
            Err(TraceError::IntegerOverflow { .. })
        ));
    }

    #[test]
    fn non_values_are_rejected() {
        for src in ["M!x", "1 + 2", "{x \\in S : TRUE}", "[x \\in S |-> 1]", "1.5", "-x"] {
            assert!(
                matches!(value(src), Err(TraceError::Unsupported { .. })),
                "{}",
                src
            );
        }
    }

    #[test]
    fn itf_encoding() {
        let opts = TraceOptions::default();
        let v = value("[s |-> {1}, t |-> <<TRUE, \"a\">>, f |-> (0 :> -1)]").unwrap();
        assert_eq!(
            v.to_itf(&opts),
            json!({
                "s": { "#set": [{ "#bigint": "1" }] },
                "t": { "#tup": [true, "a"] },
                "f": { "#map": [[{ "#bigint": "0" }, { "#bigint": "-1" }]] },
            })
        );
        let plain = TraceOptions {
            plain_integers: true,
            records_as_objects: false,
            ..TraceOptions::default()
        };
        assert_eq!(
            value("[a |-> 7]").unwrap().to_itf(&plain),
            json!({ "#map": [["a", 7]] })
        );
        assert_eq!(
            Value::Int(i64::MAX).to_itf(&plain),
            json!({ "#bigint": i64::MAX.to_string() })
        );
    }

    #[test]
    fn display_reads_back() {
        for src in [
            "{-1, 2}",
            "<<\"q\\\"\", FALSE>>",
            "[a |-> (1 :> {} @@ 2 :> <<>>)]",
        ] {
            let v = value(src).unwrap();
            assert_eq!(value(&v.to_string()).unwrap(), v, "{}", v);
        }
    }
}
