//! The three workflow roles and their shared output-decoding helpers.
//!
//! Each role builds a prompt, calls the reasoner, and decodes the structured
//! response. Roles never mutate workflow state; they return immutable records
//! the engine folds in, and share only the session store for logging.

use std::sync::LazyLock;

use anyhow::{Context, Result, bail};
use jsonschema::Draft;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;

pub mod critic;
pub mod developer;
pub mod planner;

/// Extract the first-to-last brace span from free-form reasoner text.
///
/// Reasoners wrap JSON in prose and code fences; the greedy brace match
/// recovers the object in both cases. Returns the input unchanged when no
/// braces are found so the downstream parse error names the real content.
pub(crate) fn extract_json(text: &str) -> &str {
    static JSON_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\{[\s\S]*\}").expect("valid regex"));
    match JSON_RE.find(text) {
        Some(m) => m.as_str(),
        None => text,
    }
}

/// Decode a role's reasoner text: extract JSON, check it against the role's
/// output schema, then deserialize.
pub(crate) fn decode_role_output<T: DeserializeOwned>(
    text: &str,
    schema: &str,
    role: &str,
) -> Result<T> {
    let raw = extract_json(text);
    let value: Value =
        serde_json::from_str(raw).with_context(|| format!("parse {role} output as json"))?;
    validate_schema(&value, schema, role)?;
    serde_json::from_value(value).with_context(|| format!("decode {role} output"))
}

/// Parse a role's reasoner text into a JSON value with schema validation,
/// without binding to a concrete type. Used where decoding needs coercion.
pub(crate) fn decode_role_value(text: &str, schema: &str, role: &str) -> Result<Value> {
    let raw = extract_json(text);
    let value: Value =
        serde_json::from_str(raw).with_context(|| format!("parse {role} output as json"))?;
    validate_schema(&value, schema, role)?;
    Ok(value)
}

fn validate_schema(instance: &Value, schema: &str, role: &str) -> Result<()> {
    let schema_json: Value =
        serde_json::from_str(schema).with_context(|| format!("parse {role} schema"))?;
    let compiled = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema_json)
        .with_context(|| format!("compile {role} schema"))?;
    let messages: Vec<String> = compiled
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        bail!("{role} output failed schema validation: {}", messages.join("; "));
    }
    Ok(())
}
