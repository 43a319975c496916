use serde::{Deserialize, Serialize};

/// How a trace is written out as ITF.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceOptions {
    /// `#meta.description` of the trace.
    pub description: Option<String>,
    /// `#meta.source`, usually the specification file the trace came from.
    pub source: Option<String>,
    /// Records become plain JSON objects; otherwise `#map`s keyed by field name.
    pub records_as_objects: bool,
    /// Integers within the JSON-safe range become plain numbers instead of
    /// `#bigint` objects.
    pub plain_integers: bool,
}

impl Default for TraceOptions {
    fn default() -> Self {
        TraceOptions {
            description: None,
            source: None,
            records_as_objects: true,
            plain_integers: false,
        }
    }
}

impl TraceOptions {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_itf() {
        let opts = TraceOptions::from_json(r#"{ "source": "Spec.tla" }"#).unwrap();
        assert_eq!(opts.source.as_deref(), Some("Spec.tla"));
        assert!(opts.records_as_objects);
        assert!(!opts.plain_integers);
        assert_eq!(opts.description, None);
    }
}
