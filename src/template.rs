//! Template variable resolution.
//!
//! Config values may contain `{{step-id.path.to.value}}` placeholders
//! that are substituted with the results of prior steps. Resolution is
//! deliberately lenient: a reference whose path does not exist is left as
//! the literal token, so a misconfigured workflow degrades to a visible
//! placeholder instead of aborting the run.

use std::sync::OnceLock;

use regex_lite::{Captures, Regex};
use serde_json::Value;

use crate::workflow::StepResults;

/// Regex for `{{ path.to.value }}` placeholders.
fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER_REGEX: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER_REGEX.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z0-9_\-]+(?:\.[A-Za-z0-9_\-]+)*)\s*\}\}").expect("valid regex")
    })
}

/// Resolve placeholders in a config value against accumulated results.
///
/// Recurses into objects and arrays; non-string scalars pass through
/// unchanged. String values have each placeholder replaced independently,
/// so a value may mix literal text and several references.
pub fn resolve_value(value: &Value, results: &StepResults) -> Value {
    match value {
        Value::String(s) => Value::String(resolve_string(s, results)),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve_value(v, results)))
                .collect(),
        ),
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| resolve_value(v, results)).collect())
        }
        other => other.clone(),
    }
}

/// Resolve placeholders in a single string.
pub fn resolve_string(input: &str, results: &StepResults) -> String {
    placeholder_regex()
        .replace_all(input, |caps: &Captures| {
            match lookup_path(&caps[1], results) {
                Some(value) => render(value),
                // Missing path: keep the literal token visible.
                None => caps[0].to_string(),
            }
        })
        .to_string()
}

/// Walk a dotted path: the first segment is a step id, the rest traverse
/// into that step's result.
fn lookup_path<'a>(path: &str, results: &'a StepResults) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let step_id = segments.next()?;
    let mut current = results.get(step_id)?;

    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }

    Some(current)
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
