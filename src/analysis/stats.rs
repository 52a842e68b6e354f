//! Shared statistics primitives for the summary, trend and degradation engines.
//!
//! All window arguments count from the end of the series (most recent last).

use serde::Serialize;

/// Round to two decimals, the precision every persisted rate uses.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Round to three decimals.
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// A series of success rates, oldest first.
#[derive(Debug, Clone, Default)]
pub struct TimeSeries {
    values: Vec<f64>,
}

impl TimeSeries {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn last(&self) -> Option<f64> {
        self.values.last().copied()
    }

    /// The last `n` values (all of them if fewer).
    pub fn tail(&self, n: usize) -> &[f64] {
        let start = self.values.len().saturating_sub(n);
        &self.values[start..]
    }

    /// The `n` values immediately before the last `skip` values.
    /// Shorter (possibly empty) near the start of the series.
    pub fn window_before(&self, skip: usize, n: usize) -> &[f64] {
        let end = self.values.len().saturating_sub(skip);
        let start = end.saturating_sub(n);
        &self.values[start..end]
    }

    pub fn mean(&self) -> f64 {
        mean(&self.values)
    }

    /// Population variance.
    pub fn variance(&self) -> f64 {
        variance(&self.values)
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Population standard deviation of the last `window` values, rounded to two
    /// decimals; 0 with fewer than two values.
    pub fn volatility(&self, window: usize) -> f64 {
        volatility(self.tail(window))
    }

    /// Number of trailing values strictly below `threshold`, stopping at the
    /// first value that meets it.
    pub fn trailing_below(&self, threshold: f64) -> usize {
        self.values
            .iter()
            .rev()
            .take_while(|&&v| v < threshold)
            .count()
    }

    /// Number of trailing values at or above `threshold`.
    pub fn trailing_at_least(&self, threshold: f64) -> usize {
        self.values
            .iter()
            .rev()
            .take_while(|&&v| v >= threshold)
            .count()
    }

    /// Longest run of consecutive values satisfying `pred`.
    pub fn longest_streak<F>(&self, pred: F) -> usize
    where
        F: Fn(f64) -> bool,
    {
        let mut current = 0;
        let mut longest = 0;
        for &v in &self.values {
            if pred(v) {
                current += 1;
                longest = longest.max(current);
            } else {
                current = 0;
            }
        }
        longest
    }

    /// Ordinary least-squares fit of value against index `0..n`.
    /// `None` with fewer than two points.
    pub fn linear_fit(&self) -> Option<LinearFit> {
        linear_fit(&self.values)
    }

    /// Z-score of `value` relative to this series. `None` when the series is
    /// too short or has no spread.
    pub fn z_score(&self, value: f64) -> Option<f64> {
        if self.values.len() < 2 {
            return None;
        }
        let std = self.std_dev();
        if std == 0.0 {
            return None;
        }
        Some((value - self.mean()) / std)
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance; 0 for an empty slice.
pub fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|&x| (x - m).powi(2)).sum::<f64>() / values.len() as f64
}

pub fn std_dev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

/// Population standard deviation rounded to two decimals; 0 when `n < 2`.
pub fn volatility(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    round2(std_dev(values))
}

pub fn min(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::INFINITY, f64::min)
}

pub fn max(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

/// Result of a least-squares regression of value against index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// Coefficient of determination in `[0, 1]`; 0 when the series has no spread.
    pub r_squared: f64,
}

pub fn linear_fit(values: &[f64]) -> Option<LinearFit> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let nf = n as f64;
    let (mut sum_x, mut sum_y, mut sum_xy, mut sum_x2) = (0.0, 0.0, 0.0, 0.0);
    for (i, &y) in values.iter().enumerate() {
        let x = i as f64;
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_x2 += x * x;
    }

    let denom = nf * sum_x2 - sum_x * sum_x;
    if denom == 0.0 {
        return None;
    }
    let slope = (nf * sum_xy - sum_x * sum_y) / denom;
    let y_mean = sum_y / nf;
    let intercept = y_mean - slope * (sum_x / nf);

    let ss_tot: f64 = values.iter().map(|&y| (y - y_mean).powi(2)).sum();
    let ss_res: f64 = values
        .iter()
        .enumerate()
        .map(|(i, &y)| (y - (slope * i as f64 + intercept)).powi(2))
        .sum();

    let r_squared = if ss_tot == 0.0 {
        0.0
    } else {
        (1.0 - ss_res / ss_tot).clamp(0.0, 1.0)
    };

    Some(LinearFit {
        slope,
        intercept,
        r_squared,
    })
}
