//! A sequence of states and its ITF (Informal Trace Format) encoding.

use crate::error::TraceError;
use crate::options::TraceOptions;
use crate::state::{parse_state, StateMap};
use serde_json::json;

const FORMAT_DESCRIPTION: &str = "https://apalache-mc.org/docs/adr/015adr-trace.html";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceState {
    /// The action that produced the state, as the checker labelled it.
    pub action: Option<String>,
    pub vars: StateMap,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Trace {
    vars: Vec<String>,
    states: Vec<TraceState>,
    /// Index of the state a lasso-shaped trace returns to.
    loop_index: Option<usize>,
}

impl Trace {
    pub fn new() -> Self {
        Trace::default()
    }

    pub fn vars(&self) -> &[String] {
        &self.vars
    }

    pub fn states(&self) -> &[TraceState] {
        &self.states
    }

    pub fn loop_index(&self) -> Option<usize> {
        self.loop_index
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Append a state. The first state fixes the variable set; later ones
    /// must assign exactly the same variables.
    pub fn push(&mut self, vars: StateMap, action: Option<String>) -> Result<(), TraceError> {
        if self.states.is_empty() {
            self.vars = vars.names().map(str::to_owned).collect();
        } else {
            let same = vars.len() == self.vars.len()
                && self.vars.iter().all(|v| vars.get(v).is_some());
            if !same {
                return Err(TraceError::NotAState {
                    reason: format!(
                        "state {} assigns {{{}}} but the trace has {{{}}}",
                        self.states.len(),
                        vars.names().collect::<Vec<_>>().join(", "),
                        self.vars.join(", ")
                    ),
                });
            }
        }
        self.states.push(TraceState { action, vars });
        Ok(())
    }

    /// Mark the trace as a lasso returning to state `index` (0-based).
    pub fn close_loop(&mut self, index: usize) -> Result<(), TraceError> {
        if index >= self.states.len() {
            return Err(TraceError::NotAState {
                reason: format!(
                    "loop back to state {} of a {}-state trace",
                    index + 1,
                    self.states.len()
                ),
            });
        }
        self.loop_index = Some(index);
        Ok(())
    }

    // ── TLC output ───────────────────────────────────────────────────────

    /// Read the error trace in TLC's textual output: `State n: <action>`
    /// headers, each followed by the state's `/\` lines and a blank line,
    /// optionally ending in `State n: Stuttering` or `Back to state n`. Lines
    /// outside a state block are ignored.
    pub fn from_tlc_output(text: &str) -> Result<Trace, TraceError> {
        let mut trace = Trace::new();
        let mut pending: Option<(Option<String>, Vec<&str>)> = None;
        for line in text.lines() {
            if let Some(header) = Header::parse(line) {
                if let Some((action, body)) = pending.take() {
                    trace.push(parse_state(&body.join("\n"))?, action)?;
                }
                match header {
                    Header::State(action) => pending = Some((action, Vec::new())),
                    Header::Stuttering => {
                        if let Some(last) = trace.states.last() {
                            let vars = last.vars.clone();
                            trace.push(vars, Some("Stuttering".to_owned()))?;
                        }
                    }
                    Header::BackTo(n) => trace.close_loop(n.saturating_sub(1))?,
                }
                continue;
            }
            let blank = line.trim().is_empty();
            match pending.as_mut() {
                Some((_, body)) if !blank => body.push(line),
                Some((_, body)) if !body.is_empty() => {
                    if let Some((action, body)) = pending.take() {
                        trace.push(parse_state(&body.join("\n"))?, action)?;
                    }
                }
                _ => {}
            }
        }
        if let Some((action, body)) = pending {
            if !body.is_empty() {
                trace.push(parse_state(&body.join("\n"))?, action)?;
            }
        }
        tracing::debug!(
            states = trace.len(),
            vars = trace.vars.len(),
            lasso = trace.loop_index.is_some(),
            "read TLC trace"
        );
        Ok(trace)
    }

    // ── ITF ──────────────────────────────────────────────────────────────

    pub fn to_itf(&self, options: &TraceOptions) -> serde_json::Value {
        let mut meta = serde_json::Map::new();
        meta.insert("format".into(), "ITF".into());
        meta.insert("format-description".into(), FORMAT_DESCRIPTION.into());
        if let Some(source) = &options.source {
            meta.insert("source".into(), source.clone().into());
        }
        if let Some(description) = &options.description {
            meta.insert("description".into(), description.clone().into());
        }

        let states: Vec<serde_json::Value> = self
            .states
            .iter()
            .enumerate()
            .map(|(i, state)| {
                let mut obj = state.vars.to_itf(options);
                let mut state_meta = serde_json::Map::new();
                state_meta.insert("index".into(), i.into());
                if let Some(action) = &state.action {
                    state_meta.insert("action".into(), action.clone().into());
                }
                obj.insert("#meta".into(), serde_json::Value::Object(state_meta));
                serde_json::Value::Object(obj)
            })
            .collect();

        let mut out = json!({
            "#meta": meta,
            "vars": self.vars,
            "states": states,
        });
        if let (Some(index), Some(obj)) = (self.loop_index, out.as_object_mut()) {
            obj.insert("loop".into(), index.into());
        }
        out
    }

    pub fn to_itf_string(&self, options: &TraceOptions) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.to_itf(options))
    }
}

/// A line that opens a new block of TLC trace output.
enum Header {
    State(Option<String>),
    Stuttering,
    BackTo(usize),
}

impl Header {
    fn parse(line: &str) -> Option<Header> {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("Back to state") {
            let n = rest.trim_start().split(|c: char| !c.is_ascii_digit()).next()?;
            return n.parse().ok().map(Header::BackTo);
        }
        let rest = line.strip_prefix("State ")?;
        let (number, label) = rest.split_once(':')?;
        if number.trim().parse::<usize>().is_err() {
            return None;
        }
        let label = label.trim();
        if label == "Stuttering" {
            return Some(Header::Stuttering);
        }
        let label = label
            .strip_prefix('<')
            .and_then(|l| l.strip_suffix('>'))
            .unwrap_or(label);
        Some(Header::State((!label.is_empty()).then(|| label.to_owned())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    const TLC_OUTPUT: &str = "\
Error: Invariant Safe is violated.
Error: The behavior up to this point is:
State 1: <Initial predicate>
/\\ x = 0
/\\ buf = <<>>

State 2: <Send line 12, col 9 to line 14, col 30 of module Queue>
/\\ x = 1
/\\ buf = <<\"m\">>

State 3: Stuttering
12 states generated, 9 distinct states found.
";

    #[test]
    fn reads_tlc_error_trace() {
        let trace = Trace::from_tlc_output(TLC_OUTPUT).unwrap();
        assert_eq!(trace.vars(), ["x", "buf"]);
        assert_eq!(trace.len(), 3);
        let s = trace.states();
        assert_eq!(s[0].action.as_deref(), Some("Initial predicate"));
        assert!(s[1].action.as_deref().is_some_and(|a| a.starts_with("Send line 12")));
        assert_eq!(s[1].vars.get("x"), Some(&Value::Int(1)));
        assert_eq!(s[2].vars, s[1].vars);
        assert_eq!(s[2].action.as_deref(), Some("Stuttering"));
        assert_eq!(trace.loop_index(), None);
    }

    #[test]
    fn back_to_state_closes_a_lasso() {
        let text = "State 1: <Init>\n/\\ x = 0\n\nState 2: <Next>\n/\\ x = 1\n\nBack to state 1: <Next>\n";
        let trace = Trace::from_tlc_output(text).unwrap();
        assert_eq!(trace.len(), 2);
        assert_eq!(trace.loop_index(), Some(0));
        assert_eq!(trace.to_itf(&TraceOptions::default())["loop"], 0);
    }

    #[test]
    fn states_must_agree_on_variables() {
        let mut trace = Trace::new();
        trace.push(parse_state("x = 0 /\\ y = 0").unwrap(), None).unwrap();
        let err = trace.push(parse_state("x = 1").unwrap(), None).unwrap_err();
        assert!(matches!(err, TraceError::NotAState { .. }));
        assert!(trace.close_loop(3).is_err());
    }

    #[test]
    fn itf_document_shape() {
        let mut trace = Trace::new();
        trace
            .push(parse_state("/\\ n = 2\n/\\ s = {TRUE}").unwrap(), Some("Init".into()))
            .unwrap();
        let opts = TraceOptions {
            source: Some("Spec.tla".into()),
            ..TraceOptions::default()
        };
        let itf = trace.to_itf(&opts);
        assert_eq!(itf["#meta"]["format"], "ITF");
        assert_eq!(itf["#meta"]["source"], "Spec.tla");
        assert_eq!(itf["vars"], json!(["n", "s"]));
        assert_eq!(
            itf["states"][0],
            json!({
                "#meta": { "index": 0, "action": "Init" },
                "n": { "#bigint": "2" },
                "s": { "#set": [true] },
            })
        );
        assert!(itf.get("loop").is_none());
        let text = trace.to_itf_string(&opts).unwrap();
        assert!(text.contains("\"#bigint\": \"2\""));
    }
}
