//! Soft-threshold power selection via the scale-free topology fit.
//!
//! Choosing the power is a documented human-in-the-loop decision: the
//! selector applies the standard policy (smallest power crossing the fit
//! threshold, with a connectivity-based fallback) but always returns the
//! full diagnostic table, and refuses to guess when no candidate fits.

use crate::error::{CoexError, Result};
use crate::network::{connectivity, soft_threshold, NetworkMode};
use ndarray::Array2;

/// Diagnostics for one candidate power.
#[derive(Debug, Clone)]
pub struct PowerFit {
    pub power: f64,
    /// Scale-free topology fit index: R-squared of the log-log degree
    /// regression, negated when the slope is positive.
    pub fit_index: f64,
    pub slope: f64,
    pub mean_connectivity: f64,
    pub median_connectivity: f64,
    pub max_connectivity: f64,
}

/// Selection thresholds.
#[derive(Debug, Clone)]
pub struct TopologyCriteria {
    /// Primary fit-index threshold (commonly 0.85-0.90).
    pub fit_threshold: f64,
    /// Fallback threshold for the highest-mean-connectivity rule.
    pub relaxed_threshold: f64,
    /// Number of equal-width connectivity bins for the degree histogram.
    pub bins: usize,
}

impl Default for TopologyCriteria {
    fn default() -> Self {
        Self {
            fit_threshold: 0.85,
            relaxed_threshold: 0.5,
            bins: 10,
        }
    }
}

/// The chosen power plus the evidence behind the choice.
#[derive(Debug, Clone)]
pub struct PowerSelection {
    pub power: f64,
    /// True when the primary threshold was never crossed and the relaxed
    /// fallback picked the power instead.
    pub relaxed: bool,
    pub fits: Vec<PowerFit>,
}

fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

/// Simple least-squares fit of `y` on `x`; returns `(slope, r_squared)`.
fn linear_fit(x: &[f64], y: &[f64]) -> Option<(f64, f64)> {
    let n = x.len() as f64;
    if x.len() < 3 {
        return None;
    }
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;
    let mut sxx = 0.0;
    let mut sxy = 0.0;
    let mut syy = 0.0;
    for (&xi, &yi) in x.iter().zip(y.iter()) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        sxx += dx * dx;
        sxy += dx * dy;
        syy += dy * dy;
    }
    if sxx <= 0.0 || syy <= 0.0 {
        return None;
    }
    let slope = sxy / sxx;
    let r_squared = (sxy * sxy) / (sxx * syy);
    Some((slope, r_squared))
}

/// Evaluate the scale-free fit of one adjacency's connectivity
/// distribution: bin connectivities, regress log10(frequency) on
/// log10(mean bin connectivity), sign the R-squared by the slope.
pub fn scale_free_fit(adjacency: &Array2<f64>, bins: usize) -> (f64, f64) {
    let k = connectivity(adjacency);
    let k_max = k.iter().cloned().fold(f64::MIN, f64::max);
    let k_min = k.iter().cloned().fold(f64::MAX, f64::min);
    if !(k_max - k_min).is_finite() || k_max <= k_min {
        return (0.0, 0.0);
    }

    let width = (k_max - k_min) / bins as f64;
    let mut counts = vec![0usize; bins];
    let mut sums = vec![0.0f64; bins];
    for &ki in k.iter() {
        let mut bin = ((ki - k_min) / width) as usize;
        if bin >= bins {
            bin = bins - 1;
        }
        counts[bin] += 1;
        sums[bin] += ki;
    }

    // Empty bins (and zero-connectivity bins) drop out of the regression.
    let mut log_k = Vec::with_capacity(bins);
    let mut log_p = Vec::with_capacity(bins);
    let total = k.len() as f64;
    for bin in 0..bins {
        if counts[bin] == 0 {
            continue;
        }
        let mean_k = sums[bin] / counts[bin] as f64;
        if mean_k <= 0.0 {
            continue;
        }
        log_k.push(mean_k.log10());
        log_p.push((counts[bin] as f64 / total).log10());
    }

    match linear_fit(&log_k, &log_p) {
        Some((slope, r_squared)) => {
            let fit_index = if slope < 0.0 { r_squared } else { -r_squared };
            (fit_index, slope)
        }
        None => (0.0, 0.0),
    }
}

/// Diagnostics for a single candidate power, reusing a precomputed
/// correlation matrix so a sweep costs one correlation pass total.
pub fn power_fit(
    correlations: &Array2<f64>,
    power: f64,
    mode: NetworkMode,
    bins: usize,
) -> PowerFit {
    let adjacency = soft_threshold(correlations, power, mode);
    let (fit_index, slope) = scale_free_fit(&adjacency, bins);
    let k = connectivity(&adjacency);
    let mut sorted: Vec<f64> = k.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).expect("connectivity is finite"));
    PowerFit {
        power,
        fit_index,
        slope,
        mean_connectivity: k.mean().unwrap_or(0.0),
        median_connectivity: median(&sorted),
        max_connectivity: *sorted.last().expect("non-empty network"),
    }
}

/// Evaluate a whole candidate set of powers.
pub fn evaluate_powers(
    correlations: &Array2<f64>,
    powers: &[f64],
    mode: NetworkMode,
    criteria: &TopologyCriteria,
) -> Vec<PowerFit> {
    powers
        .iter()
        .map(|&p| power_fit(correlations, p, mode, criteria.bins))
        .collect()
}

/// Apply the selection policy to an evaluated candidate set.
///
/// Smallest power whose fit index crosses the primary threshold wins.
/// If none does, the power with the highest mean connectivity among
/// those at or above the relaxed threshold wins (flagged `relaxed`).
/// Otherwise [`CoexError::NoScaleFreeFit`] reports the best candidate so
/// the caller can decide on an explicit override.
pub fn select_power(fits: Vec<PowerFit>, criteria: &TopologyCriteria) -> Result<PowerSelection> {
    if fits.is_empty() {
        return Err(CoexError::EmptyInput("no candidate powers".into()));
    }

    if let Some(hit) = fits.iter().find(|f| f.fit_index >= criteria.fit_threshold) {
        return Ok(PowerSelection {
            power: hit.power,
            relaxed: false,
            fits,
        });
    }

    let fallback = fits
        .iter()
        .filter(|f| f.fit_index >= criteria.relaxed_threshold)
        .max_by(|a, b| {
            a.mean_connectivity
                .partial_cmp(&b.mean_connectivity)
                .expect("connectivity is finite")
        })
        .map(|f| f.power);
    if let Some(power) = fallback {
        return Ok(PowerSelection {
            power,
            relaxed: true,
            fits,
        });
    }

    let best = fits
        .iter()
        .max_by(|a, b| {
            a.fit_index
                .partial_cmp(&b.fit_index)
                .expect("fit index is finite")
        })
        .expect("non-empty candidate set");
    Err(CoexError::NoScaleFreeFit {
        best_power: best.power,
        best_fit: best.fit_index,
    })
}

/// The conventional candidate range: integer powers 1..=20.
pub fn default_candidate_powers() -> Vec<f64> {
    (1..=20).map(|p| p as f64).collect()
}
