/// Computes the arithmetic mean of a slice of values. Returns 0.0 for empty input.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance (divides by n). Returns 0.0 for empty input.
pub fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

/// Sample variance (divides by n - 1). Returns 0.0 for fewer than two values.
pub fn sample_variance(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    variance(values) * n as f64 / (n - 1) as f64
}

/// Percentage change from the mean of `before` to the mean of `after`.
///
/// Returns 0.0 when the `before` mean is zero.
pub fn percentage_change(before: &[f64], after: &[f64]) -> f64 {
    let before_mean = mean(before);
    if before_mean == 0.0 {
        return 0.0;
    }
    (mean(after) - before_mean) / before_mean * 100.0
}
