//! Environment variable substitution for declarative config files.
//!
//! Any string value of the form `$env:NAME|default` is replaced with the value
//! of `NAME`, or with `default` when the variable is not set. Substituted
//! values are always strings; numeric and boolean config fields accept their
//! string form (see [`super::scalar`]).

use serde_json::{Map, Value};

/// Prefix marking a string config value as an environment lookup.
pub const CONFIG_ENV_PREFIX: &str = "$env:";

/// Substitutes environment references using the process environment.
pub fn substitute_env(value: Value, warnings: &mut Vec<String>) -> Value {
    substitute_env_with(value, &|name| std::env::var(name).ok(), warnings)
}

/// Substitutes environment references using `lookup`.
pub fn substitute_env_with<F>(value: Value, lookup: &F, warnings: &mut Vec<String>) -> Value
where
    F: Fn(&str) -> Option<String>,
{
    match value {
        Value::String(s) => match s.strip_prefix(CONFIG_ENV_PREFIX) {
            Some(reference) => resolve_reference(reference, lookup, warnings),
            None => Value::String(s),
        },
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| substitute_env_with(item, lookup, warnings))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, item)| (key, substitute_env_with(item, lookup, warnings)))
                .collect::<Map<String, Value>>(),
        ),
        other => other,
    }
}

fn resolve_reference<F>(reference: &str, lookup: &F, warnings: &mut Vec<String>) -> Value
where
    F: Fn(&str) -> Option<String>,
{
    let (name, default) = match reference.split_once('|') {
        Some((name, default)) => (name, Some(default)),
        None => (reference, None),
    };
    match lookup(name) {
        Some(raw) => Value::String(raw),
        None => match default {
            Some(default) => Value::String(default.to_string()),
            None => {
                warnings.push(format!("Env var {name} is not defined."));
                Value::Null
            }
        },
    }
}
