//! Hand results of dependencies to the tasks that consume them.
//!
//! A string parameter may reference a dependency's result as `{dep-id}`.
//! Placeholders are only filled from the task's own declared dependencies;
//! anything else in braces is left as written.

use serde_json::Value;
use std::collections::HashMap;

use crate::core::{Parameters, TaskId};

/// Replace `{id}` placeholders in every string of `parameters`.
///
/// `results` pairs each declared dependency with its result.
pub fn interpolate(parameters: &Parameters, results: &[(&TaskId, &Value)]) -> Parameters {
    if results.is_empty() {
        return parameters.clone();
    }
    let replacements: HashMap<&str, String> = results
        .iter()
        .map(|(id, value)| (id.as_str(), render(value)))
        .collect();
    parameters
        .iter()
        .map(|(key, value)| (key.clone(), substitute(value, &replacements)))
        .collect()
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn substitute(value: &Value, replacements: &HashMap<&str, String>) -> Value {
    match value {
        Value::String(s) if s.contains('{') => Value::String(fill(s, replacements)),
        Value::Array(items) => Value::Array(items.iter().map(|v| substitute(v, replacements)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), substitute(v, replacements)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Single left-to-right pass over `template`. Inserted text is never
/// scanned again.
fn fill(template: &str, replacements: &HashMap<&str, String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let resolved = after.find('}').and_then(|close| {
            replacements
                .get(&after[..close])
                .map(|text| (text, close))
        });
        match resolved {
            Some((text, close)) => {
                out.push_str(text);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}
