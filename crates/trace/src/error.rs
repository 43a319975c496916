use tlafront_core::{Diagnostic, Span};

/// Everything that can go wrong turning checker output into a trace.
#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    /// The state text is not valid TLA+.
    #[error("parse error: {0}")]
    Parse(#[from] Diagnostic),

    /// A well-formed expression a model checker never prints as a value.
    #[error("unsupported {shape} at {span}")]
    Unsupported { shape: String, span: Span },

    /// One state assigns the same variable twice.
    #[error("variable {name} assigned twice at {span}")]
    DuplicateVariable { name: String, span: Span },

    #[error("integer {text} does not fit in 64 bits at {span}")]
    IntegerOverflow { text: String, span: Span },

    /// The expression is not a conjunction of `variable = value` equalities,
    /// or a state disagrees with the trace about which variables exist.
    #[error("not a state: {reason}")]
    NotAState { reason: String },
}

impl TraceError {
    pub(crate) fn unsupported(shape: impl Into<String>, span: &Span) -> Self {
        TraceError::Unsupported {
            shape: shape.into(),
            span: span.clone(),
        }
    }
}
