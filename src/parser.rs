//! JSON parser for Open Data responses.

use thiserror::Error;

use crate::table::{Table, Value};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("expected a JSON array of records, found {0}")]
    NotAnArray(&'static str),

    #[error("element {index} is not a JSON object")]
    NotAnObject { index: usize },
}

/// Decodes a JSON array of flat objects into a [`Table`].
///
/// # Errors
///
/// Returns an error if the bytes are not valid JSON, the top level is not an
/// array, or any element of the array is not an object.
pub fn parse_table(bytes: &[u8]) -> Result<Table, ParseError> {
    let json: serde_json::Value = serde_json::from_slice(bytes)?;

    let items = match json {
        serde_json::Value::Array(items) => items,
        other => return Err(ParseError::NotAnArray(kind(&other))),
    };

    let mut table = Table::new();
    for (index, item) in items.into_iter().enumerate() {
        let serde_json::Value::Object(fields) = item else {
            return Err(ParseError::NotAnObject { index });
        };
        // preserve_order keeps the portal's field order for the column list
        table.push_row(fields.into_iter().map(|(k, v)| (k, Value::from(v))));
    }

    Ok(table)
}

fn kind(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
