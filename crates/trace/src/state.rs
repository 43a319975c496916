//! One model-checker state: a conjunction of `variable = value` equalities
//! read into an ordered variable map.

use crate::error::TraceError;
use crate::options::TraceOptions;
use crate::value::Value;
use std::fmt;
use tlafront_core::ast::{Builtin, Bullet};
use tlafront_core::{parse_expression, Expr, ExprKind, ParseOptions};

/// Variable assignments in the order they were printed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateMap {
    vars: Vec<(String, Value)>,
}

impl StateMap {
    pub fn new() -> Self {
        StateMap::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.vars.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.vars.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Variable name -> ITF value, for one entry of an ITF `states` array.
    pub fn to_itf(&self, options: &TraceOptions) -> serde_json::Map<String, serde_json::Value> {
        self.vars
            .iter()
            .map(|(n, v)| (n.clone(), v.to_itf(options)))
            .collect()
    }

    fn assign(&mut self, lhs: &Expr, rhs: &Expr) -> Result<(), TraceError> {
        let ExprKind::Ident(name) = lhs.node.unparen() else {
            return Err(TraceError::NotAState {
                reason: format!("left side of the equality at {} is not a variable", lhs.span),
            });
        };
        if self.get(name).is_some() {
            return Err(TraceError::DuplicateVariable {
                name: name.clone(),
                span: lhs.span.clone(),
            });
        }
        let value = Value::from_expr(rhs)?;
        self.vars.push((name.clone(), value));
        Ok(())
    }
}

impl fmt::Display for StateMap {
    /// One `/\ x = v` line per variable, the way TLC prints a state.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (n, v)) in self.vars.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "/\\ {} = {}", n, v)?;
        }
        Ok(())
    }
}

/// Read a parsed state expression: a bulleted `/\` list or a `/\` tree
/// whose leaves are `x = value` equalities.
pub fn extract_state(expr: &Expr) -> Result<StateMap, TraceError> {
    let mut state = StateMap::new();
    collect(expr, &mut state)?;
    tracing::debug!(vars = state.len(), "extracted state");
    Ok(state)
}

fn collect(e: &Expr, state: &mut StateMap) -> Result<(), TraceError> {
    match e.node.unparen() {
        ExprKind::List(Bullet::And, items) => {
            for item in items {
                collect(item, state)?;
            }
            Ok(())
        }
        ExprKind::Apply(head, args) if args.len() == 2 => match head.node {
            ExprKind::Internal(Builtin::Conj) => {
                collect(&args[0], state)?;
                collect(&args[1], state)
            }
            ExprKind::Internal(Builtin::Eq) => state.assign(&args[0], &args[1]),
            _ => Err(not_a_state(e)),
        },
        _ => Err(not_a_state(e)),
    }
}

fn not_a_state(e: &Expr) -> TraceError {
    TraceError::NotAState {
        reason: format!("expected a conjunction of equalities at {}", e.span),
    }
}

/// Parse and extract one state printed by a model checker.
pub fn parse_state(text: &str) -> Result<StateMap, TraceError> {
    let expr = parse_expression(text, &ParseOptions::named("<state>"))?;
    extract_state(&expr)
}
