//! Shared helpers for command handlers.

use std::path::Path;

use crate::error::CliError;

/// Split `key=value` query arguments.
pub fn parse_query(pairs: &[String]) -> Result<Vec<(String, String)>, CliError> {
    pairs
        .iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
                .ok_or_else(|| CliError::Validation {
                    field: "query".into(),
                    reason: format!("expected KEY=VALUE, got '{pair}'"),
                })
        })
        .collect()
}

/// Parse a `--data` argument: inline JSON, or `@path` to read a file.
pub fn read_body(data: &str) -> Result<serde_json::Value, CliError> {
    let text = match data.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(Path::new(path))?,
        None => data.to_owned(),
    };
    Ok(serde_json::from_str(&text)?)
}

/// Pretty-print a response body; `null` (empty body) prints nothing.
pub fn print_json(value: &serde_json::Value) -> Result<(), CliError> {
    if !value.is_null() {
        println!("{}", serde_json::to_string_pretty(value)?);
    }
    Ok(())
}
