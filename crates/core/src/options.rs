use serde::{Deserialize, Serialize};

/// Knobs for one parse call.
///
/// Deserializable so embedders can keep them next to the rest of their
/// configuration; every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    /// Label stored in every span.
    pub source_name: String,
    /// Ignore text before the first `---- MODULE` line.
    pub skip_preamble: bool,
    /// Reject input nested deeper than this. Brackets are counted before
    /// the grammar runs; keyword constructs, bullets and submodules count
    /// while parsing.
    pub max_depth: Option<usize>,
    /// Keep internal notes in diagnostics.
    pub verbose: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            source_name: "<input>".to_owned(),
            skip_preamble: true,
            max_depth: None,
            verbose: false,
        }
    }
}

impl ParseOptions {
    pub fn named(source_name: impl Into<String>) -> Self {
        ParseOptions {
            source_name: source_name.into(),
            ..ParseOptions::default()
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
