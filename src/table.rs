//! In-memory tabular dataset built from an Open Data JSON response.
//!
//! A [`Table`] is an ordered list of [`Record`]s. Records are sparse: a
//! field missing from one row is simply absent from that row's map, and
//! [`Table::columns`] reports the union of every field seen, in first-seen
//! order.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// A single cell value.
///
/// Open Data portals serve most scalars as JSON strings, so numeric helpers
/// such as [`Value::as_f64`] also accept numeric text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Text(String),
    Number(serde_json::Number),
    Null,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the value as a float if it is a number or numeric text.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => n.as_f64(),
            Value::Text(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            Value::Null => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Parses the value as a calendar date.
    ///
    /// Accepts `YYYY-MM-DD`, floating timestamps such as
    /// `2023-06-01T00:00:00.000`, and RFC 3339 timestamps.
    pub fn as_date(&self) -> Option<NaiveDate> {
        let s = self.as_str()?.trim();
        if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Some(d);
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
            return Some(dt.date());
        }
        DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive())
    }
}

impl From<serde_json::Value> for Value {
    /// Flattens a JSON value into a cell. Booleans become `"true"`/`"false"`
    /// and nested objects or arrays become their compact JSON text.
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Number(n) => Value::Number(n),
            serde_json::Value::Bool(b) => Value::Text(b.to_string()),
            nested @ (serde_json::Value::Array(_) | serde_json::Value::Object(_)) => {
                Value::Text(nested.to_string())
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => write!(f, "{s}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Null => Ok(()),
        }
    }
}

/// One row: field name to value.
pub type Record = BTreeMap<String, Value>;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Record>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a row given as `(field, value)` pairs, extending the column
    /// list with any field not seen before.
    pub fn push_row<I>(&mut self, fields: I)
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let mut record = Record::new();
        for (name, value) in fields {
            if !self.columns.iter().any(|c| c == &name) {
                self.columns.push(name.clone());
            }
            record.insert(name, value);
        }
        self.rows.push(record);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn get(&self, row: usize, field: &str) -> Option<&Value> {
        self.rows.get(row)?.get(field)
    }

    /// Yields the value of `field` for every row, `None` where the row omits it.
    pub fn column<'a>(&'a self, field: &'a str) -> impl Iterator<Item = Option<&'a Value>> + 'a {
        self.rows.iter().map(move |r| r.get(field))
    }

    /// Collects the numeric values of `field`, skipping missing and
    /// non-numeric cells.
    pub fn numeric_column(&self, field: &str) -> Vec<f64> {
        self.column(field)
            .filter_map(|v| v.and_then(Value::as_f64))
            .collect()
    }

    /// Splits the table at `cutoff` using the date in `date_field`.
    ///
    /// Rows dated on or after the cutoff land in the second table. Rows with
    /// a missing or unparseable date are dropped from both.
    pub fn partition_by_date(&self, date_field: &str, cutoff: NaiveDate) -> (Table, Table) {
        let mut before = Table {
            columns: self.columns.clone(),
            rows: Vec::new(),
        };
        let mut after = before.clone();

        for row in &self.rows {
            match row.get(date_field).and_then(Value::as_date) {
                Some(d) if d >= cutoff => after.rows.push(row.clone()),
                Some(_) => before.rows.push(row.clone()),
                None => {}
            }
        }

        (before, after)
    }
}
