//! Two-sample Student's t-test with pooled variance.

use serde::Serialize;

use super::AnalysisError;
use super::utility::{mean, percentage_change, sample_variance, variance};

/// Significance level used when the caller does not pick one.
pub const DEFAULT_ALPHA: f64 = 0.05;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestResult {
    pub t_statistic: f64,
    pub p_value: f64,
    pub cohens_d: f64,
    pub significant: bool,
    pub before_mean: f64,
    pub after_mean: f64,
    pub percentage_change: f64,
}

/// Compares two independent samples assuming equal variances.
///
/// The t statistic is signed `before - after`, so a drop after the cutoff
/// gives a positive t. Cohen's d is signed `after - before` and uses the
/// population variance of each side for the pooled deviation.
///
/// # Errors
///
/// [`AnalysisError::InsufficientData`] if either side has fewer than two
/// values, [`AnalysisError::ZeroVariance`] if both sides are constant.
pub fn two_sample_t_test(
    before: &[f64],
    after: &[f64],
    alpha: f64,
) -> Result<TestResult, AnalysisError> {
    let (n1, n2) = (before.len(), after.len());
    if n1 < 2 || n2 < 2 {
        return Err(AnalysisError::InsufficientData {
            before: n1,
            after: n2,
        });
    }

    if is_constant(before) && is_constant(after) {
        return Err(AnalysisError::ZeroVariance);
    }

    let before_mean = mean(before);
    let after_mean = mean(after);
    let df = (n1 + n2 - 2) as f64;
    let (n1f, n2f) = (n1 as f64, n2 as f64);

    let pooled_var =
        ((n1f - 1.0) * sample_variance(before) + (n2f - 1.0) * sample_variance(after)) / df;

    let se = (pooled_var * (1.0 / n1f + 1.0 / n2f)).sqrt();
    let t_statistic = (before_mean - after_mean) / se;
    let p_value = two_sided_p_value(t_statistic, df);

    let pooled_sd =
        (((n1f - 1.0) * variance(before) + (n2f - 1.0) * variance(after)) / df).sqrt();
    let cohens_d = (after_mean - before_mean) / pooled_sd;

    Ok(TestResult {
        t_statistic,
        p_value,
        cohens_d,
        significant: p_value < alpha,
        before_mean,
        after_mean,
        percentage_change: percentage_change(before, after),
    })
}

/// Exact comparison: rounding in the mean leaves a constant sample with a
/// tiny non-zero variance, so the variance alone cannot detect it.
fn is_constant(values: &[f64]) -> bool {
    values.iter().all(|v| *v == values[0])
}

/// `P(|T| >= |t|)` for Student's t with `df` degrees of freedom.
pub fn two_sided_p_value(t: f64, df: f64) -> f64 {
    if !t.is_finite() {
        return 0.0;
    }
    let x = df / (df + t * t);
    regularized_incomplete_beta(df / 2.0, 0.5, x).clamp(0.0, 1.0)
}

/// `I_x(a, b)`, evaluated with the continued fraction on whichever side
/// converges faster.
fn regularized_incomplete_beta(a: f64, b: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }

    let ln_front = ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln();
    let front = ln_front.exp();

    if x < (a + 1.0) / (a + b + 2.0) {
        front * beta_continued_fraction(a, b, x) / a
    } else {
        1.0 - front * beta_continued_fraction(b, a, 1.0 - x) / b
    }
}

fn beta_continued_fraction(a: f64, b: f64, x: f64) -> f64 {
    const MAX_ITER: usize = 300;
    const EPS: f64 = 3e-14;
    const TINY: f64 = 1e-300;

    let guard = |v: f64| if v.abs() < TINY { TINY } else { v };

    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;

    let mut c = 1.0;
    let mut d = 1.0 / guard(1.0 - qab * x / qap);
    let mut h = d;

    for m in 1..=MAX_ITER {
        let m = m as f64;
        let m2 = 2.0 * m;

        let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 / guard(1.0 + aa * d);
        c = guard(1.0 + aa / c);
        h *= d * c;

        let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 / guard(1.0 + aa * d);
        c = guard(1.0 + aa / c);
        let delta = d * c;
        h *= delta;

        if (delta - 1.0).abs() < EPS {
            break;
        }
    }

    h
}

/// Lanczos approximation (g = 7, n = 9).
fn ln_gamma(x: f64) -> f64 {
    const G: f64 = 7.0;
    const COEF: [f64; 9] = [
        0.999_999_999_999_809_9,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_1,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];

    if x < 0.5 {
        let pi = std::f64::consts::PI;
        return (pi / (pi * x).sin().abs()).ln() - ln_gamma(1.0 - x);
    }

    let x = x - 1.0;
    let t = x + G + 0.5;
    let series = COEF
        .iter()
        .enumerate()
        .skip(1)
        .fold(COEF[0], |acc, (i, c)| acc + c / (x + i as f64));

    0.5 * (2.0 * std::f64::consts::PI).ln() + (x + 0.5) * t.ln() - t + series.ln()
}
