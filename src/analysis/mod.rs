//! Before/after comparison of dataset metrics around a policy start date.
//!
//! A table is split at the cutoff date, each requested numeric column is
//! compared with a pooled two-sample t-test, and the per-metric results are
//! rolled up into an [`AnalysisSummary`].

pub mod compare;
pub mod ttest;
pub mod utility;

pub use compare::{AnalysisSummary, Comparison, compare_column, log_summary, summarize};
pub use ttest::{DEFAULT_ALPHA, TestResult, two_sample_t_test};

use chrono::NaiveDate;
use thiserror::Error;

/// Start of congestion pricing used as the default split date.
pub const DEFAULT_CUTOFF: NaiveDate = NaiveDate::from_ymd_opt(2023, 6, 1).unwrap();

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("need at least two values on each side, got {before} before and {after} after")]
    InsufficientData { before: usize, after: usize },

    #[error("both samples have zero variance")]
    ZeroVariance,
}
