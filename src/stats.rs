use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::table::Table;

/// How many rows carry a non-null value for one column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnCoverage {
    pub name: String,
    pub present: usize,
    pub percent: f64,
}

/// Shape summary of a fetched table.
#[derive(Debug, Default, Serialize)]
pub struct TableStats {
    pub total_rows: usize,
    pub total_columns: usize,
    pub coverage: Vec<ColumnCoverage>,
}

impl TableStats {
    pub fn from_table(table: &Table) -> Self {
        let total_rows = table.len();

        let coverage = table
            .columns()
            .iter()
            .map(|name| {
                let present = table
                    .column(name)
                    .filter(|v| v.is_some_and(|v| !v.is_null()))
                    .count();
                ColumnCoverage {
                    name: name.clone(),
                    present,
                    percent: Self::pct(present, total_rows),
                }
            })
            .collect();

        TableStats {
            total_rows,
            total_columns: table.columns().len(),
            coverage,
        }
    }

    pub fn pct(part: usize, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            (part as f64 / total as f64) * 100.0
        }
    }

    /// Columns present in fewer than every row.
    pub fn sparse_columns(&self) -> impl Iterator<Item = &ColumnCoverage> {
        self.coverage.iter().filter(|c| c.present < self.total_rows)
    }
}

/// One line of the fetch-run log, appended to CSV after every fetch.
#[derive(Debug, Default, Serialize)]
pub struct FetchRecord {
    pub timestamp: DateTime<Utc>,
    pub dataset: Option<String>,
    pub endpoint: Option<String>,
    pub limit: usize,
    pub rows: usize,
    pub columns: usize,

    // error tracking
    pub error_type: Option<String>,
    pub error_message: Option<String>,
}

impl FetchRecord {
    pub fn from_table(table: &Table, limit: usize) -> Self {
        FetchRecord {
            timestamp: Utc::now(),
            limit,
            rows: table.len(),
            columns: table.columns().len(),
            ..Default::default()
        }
    }

    /// Create an error record with timestamp and error information
    pub fn from_error(limit: usize, error_type: &str, error_message: &str) -> Self {
        FetchRecord {
            timestamp: Utc::now(),
            limit,
            error_type: Some(error_type.to_string()),
            error_message: Some(error_message.to_string()),
            ..Default::default()
        }
    }

    /// Set dataset metadata (name and endpoint)
    pub fn with_dataset(mut self, dataset: &str, endpoint: &str) -> Self {
        self.dataset = Some(dataset.to_string());
        self.endpoint = Some(endpoint.to_string());
        self
    }

    /// Whether the server filled the request, which usually means more rows
    /// exist than were fetched.
    pub fn hit_limit(&self) -> bool {
        self.error_type.is_none() && self.limit > 0 && self.rows >= self.limit
    }
}
