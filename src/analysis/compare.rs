use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;

use super::AnalysisError;
use super::ttest::{TestResult, two_sample_t_test};
use crate::table::Table;

/// Result of comparing one metric before and after the cutoff.
#[derive(Debug, Clone, Serialize)]
pub struct Comparison {
    pub metric: String,
    pub before_count: usize,
    pub after_count: usize,
    pub result: TestResult,
}

impl Comparison {
    pub fn change_pct(&self) -> f64 {
        self.result.percentage_change
    }
}

/// Splits `table` at `cutoff` on `date_field` and tests `value_field`.
///
/// Only numeric cells count toward each side.
pub fn compare_column(
    table: &Table,
    date_field: &str,
    value_field: &str,
    cutoff: NaiveDate,
    alpha: f64,
) -> Result<Comparison, AnalysisError> {
    let (before, after) = table.partition_by_date(date_field, cutoff);
    let before = before.numeric_column(value_field);
    let after = after.numeric_column(value_field);

    let result = two_sample_t_test(&before, &after, alpha)?;

    Ok(Comparison {
        metric: value_field.to_string(),
        before_count: before.len(),
        after_count: after.len(),
        result,
    })
}

/// Roll-up across every compared metric.
#[derive(Debug, Default, Serialize)]
pub struct AnalysisSummary {
    pub metrics: usize,
    pub average_change: f64,
    pub positive_changes: usize,
    pub negative_changes: usize,
    /// Up to three metrics with the largest increase, largest first.
    pub top_improvements: Vec<(String, f64)>,
    /// Up to three metrics with the largest decrease, smallest first.
    pub areas_of_concern: Vec<(String, f64)>,
}

const TOP_N: usize = 3;

pub fn summarize(comparisons: &[Comparison]) -> AnalysisSummary {
    if comparisons.is_empty() {
        return AnalysisSummary::default();
    }

    let changes: Vec<f64> = comparisons.iter().map(Comparison::change_pct).collect();

    let mut positive: Vec<(String, f64)> = comparisons
        .iter()
        .filter(|c| c.change_pct() > 0.0)
        .map(|c| (c.metric.clone(), c.change_pct()))
        .collect();
    let mut negative: Vec<(String, f64)> = comparisons
        .iter()
        .filter(|c| c.change_pct() < 0.0)
        .map(|c| (c.metric.clone(), c.change_pct()))
        .collect();

    let (positive_changes, negative_changes) = (positive.len(), negative.len());

    positive.sort_by(|a, b| b.1.total_cmp(&a.1));
    positive.truncate(TOP_N);
    negative.sort_by(|a, b| a.1.total_cmp(&b.1));
    negative.truncate(TOP_N);

    AnalysisSummary {
        metrics: comparisons.len(),
        average_change: super::utility::mean(&changes),
        positive_changes,
        negative_changes,
        top_improvements: positive,
        areas_of_concern: negative,
    }
}

/// Logs each comparison and the summary at info level.
pub fn log_summary(comparisons: &[Comparison], summary: &AnalysisSummary) {
    for c in comparisons {
        info!(
            metric = %c.metric,
            before_n = c.before_count,
            after_n = c.after_count,
            before_mean = c.result.before_mean,
            after_mean = c.result.after_mean,
            change_pct = %format!("{:+.2}", c.change_pct()),
            p_value = c.result.p_value,
            cohens_d = c.result.cohens_d,
            significant = c.result.significant,
            "Metric comparison"
        );
    }

    info!(
        metrics = summary.metrics,
        average_change = %format!("{:+.2}", summary.average_change),
        positive = summary.positive_changes,
        negative = summary.negative_changes,
        "Analysis summary"
    );

    for (metric, change) in &summary.top_improvements {
        info!(metric = %metric, change_pct = %format!("{change:+.2}"), "Top improvement");
    }
    for (metric, change) in &summary.areas_of_concern {
        info!(metric = %metric, change_pct = %format!("{change:+.2}"), "Area of concern");
    }
}
