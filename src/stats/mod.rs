//! Small numeric helpers shared by the pipeline stages.

pub mod cluster;

use statrs::distribution::{ContinuousCDF, StudentsT};
use thiserror::Error;

use crate::simd;

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("group {group} needs at least 2 samples, found {n}")]
    TooFewSamples { group: &'static str, n: usize },
    #[error("t distribution: {0}")]
    Distribution(String),
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample variance (n - 1 denominator). Zero for fewer than two values.
pub fn sample_variance(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    sum_sq_dev(values) / (n - 1) as f64
}

/// Population variance (n denominator).
pub fn population_variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    sum_sq_dev(values) / values.len() as f64
}

fn sum_sq_dev(values: &[f64]) -> f64 {
    let m = mean(values);
    let dev: Vec<f64> = values.iter().map(|v| v - m).collect();
    simd::dot_f64(&dev, &dev)
}

/// Median; mean of the two middle values for even lengths.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len();
    if n % 2 == 1 {
        Some(sorted[n / 2])
    } else {
        Some((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WelchResult {
    pub t: f64,
    pub df: f64,
    pub p_value: f64,
    /// Both groups had zero variance; reported with p = 1.
    pub degenerate: bool,
}

/// Two-sided Welch t-test of `b` against `a`; positive `t` means `b` is higher.
pub fn welch_t_test(a: &[f64], b: &[f64]) -> Result<WelchResult, StatsError> {
    if a.len() < 2 {
        return Err(StatsError::TooFewSamples {
            group: "reference",
            n: a.len(),
        });
    }
    if b.len() < 2 {
        return Err(StatsError::TooFewSamples {
            group: "test",
            n: b.len(),
        });
    }
    let na = a.len() as f64;
    let nb = b.len() as f64;
    let degenerate = WelchResult {
        t: 0.0,
        df: na + nb - 2.0,
        p_value: 1.0,
        degenerate: true,
    };
    // a constant group can still leave rounding residue in its variance
    if is_constant(a) && is_constant(b) {
        return Ok(degenerate);
    }
    let va = sample_variance(a) / na;
    let vb = sample_variance(b) / nb;
    let se2 = va + vb;
    if se2 <= 0.0 || !se2.is_finite() {
        return Ok(degenerate);
    }

    let t = (mean(b) - mean(a)) / se2.sqrt();
    let df = se2 * se2 / (va * va / (na - 1.0) + vb * vb / (nb - 1.0));
    let dist =
        StudentsT::new(0.0, 1.0, df).map_err(|e| StatsError::Distribution(e.to_string()))?;
    let p_value = (2.0 * dist.sf(t.abs())).clamp(0.0, 1.0);

    Ok(WelchResult {
        t,
        df,
        p_value,
        degenerate: false,
    })
}

fn is_constant(values: &[f64]) -> bool {
    values.iter().all(|&v| v == values[0])
}

/// Benjamini-Hochberg adjusted p-values, returned in input order.
pub fn benjamini_hochberg(p_values: &[f64]) -> Vec<f64> {
    let m = p_values.len();
    if m == 0 {
        return Vec::new();
    }
    let key = |p: f64| if p.is_nan() { 1.0 } else { p };
    let mut order: Vec<usize> = (0..m).collect();
    order.sort_by(|&i, &j| key(p_values[i]).total_cmp(&key(p_values[j])).then(i.cmp(&j)));

    let mut adjusted = vec![1.0; m];
    let mut running = 1.0f64;
    for rank in (1..=m).rev() {
        let idx = order[rank - 1];
        let q = key(p_values[idx]) * m as f64 / rank as f64;
        running = running.min(q);
        adjusted[idx] = running.min(1.0);
    }
    adjusted
}

#[cfg(test)]
#[path = "../../tests/src_inline/stats/mod.rs"]
mod tests;
