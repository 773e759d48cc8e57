//! Variable substitution into request payloads
//!
//! Payload strings may contain `{{name}}` placeholders resolved from the
//! layered variable scope, or `{{source:type:key}}` placeholders resolved
//! through a value-provider plugin (the first two segments form the
//! provider key, the rest is the lookup key).

use std::collections::HashMap;

use serde_json::Value;

use crate::common::Result;
use crate::plugin::PluginRegistry;

/// Substitute placeholders throughout a JSON payload
pub fn substitute_payload(
    registry: &PluginRegistry,
    payload: &Value,
    vars: &HashMap<String, String>,
) -> Result<Value> {
    Ok(match payload {
        Value::String(s) => Value::String(substitute_str(registry, s, vars)?),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|v| substitute_payload(registry, v, vars))
                .collect::<Result<_>>()?,
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| Ok((k.clone(), substitute_payload(registry, v, vars)?)))
                .collect::<Result<_>>()?,
        ),
        other => other.clone(),
    })
}

fn substitute_str(
    registry: &PluginRegistry,
    input: &str,
    vars: &HashMap<String, String>,
) -> Result<String> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let name = after[..end].trim();
                out.push_str(&resolve(registry, name, vars)?);
                rest = &after[end + 2..];
            }
            None => {
                // Unterminated placeholder, keep literally
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    Ok(out)
}

fn resolve(
    registry: &PluginRegistry,
    name: &str,
    vars: &HashMap<String, String>,
) -> Result<String> {
    let segments: Vec<&str> = name.split(':').collect();
    if segments.len() >= 3 {
        let provider = format!("{}:{}", segments[0], segments[1]);
        let key = segments[2..].join(":");
        // A provider returning None means "not found", substituted empty
        return Ok(registry
            .resolve_value_provider(&provider, &key, None)?
            .unwrap_or_default());
    }
    Ok(vars.get(name).cloned().unwrap_or_default())
}
