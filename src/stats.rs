//! Univariate two-group screen: per-feature Welch t-test, Mann-Whitney
//! U, log2 fold change, and Benjamini-Hochberg adjustment.
//!
//! The screen reports the parametric and the rank test side by side; a
//! reader picks per the distribution of each measurement rather than the
//! pipeline deciding normality on its own.

use crate::data::{ExpressionMatrix, TraitMatrix};
use crate::error::{CoexError, Result};
use log::info;
use rayon::prelude::*;
use statrs::distribution::{ContinuousCDF, Normal, StudentsT};

/// One feature's screen results.
#[derive(Debug, Clone)]
pub struct ScreenRow {
    pub feature_id: String,
    pub t_statistic: f64,
    pub t_p_value: f64,
    pub u_statistic: f64,
    pub u_p_value: f64,
    pub log2_fold_change: f64,
    /// Benjamini-Hochberg adjusted t-test p-value.
    pub q_value: f64,
}

/// Screen results for every feature, in input feature order.
#[derive(Debug, Clone)]
pub struct UnivariateTable {
    pub rows: Vec<ScreenRow>,
    /// Number of samples in the reference (trait = 0) and case (trait = 1)
    /// groups.
    pub group_sizes: (usize, usize),
}

/// Welch's unequal-variance t-test, two-sided.
pub fn welch_t_test(a: &[f64], b: &[f64]) -> Result<(f64, f64)> {
    if a.len() < 2 || b.len() < 2 {
        return Err(CoexError::EmptyInput(
            "t-test needs at least 2 observations per group".into(),
        ));
    }
    let n_a = a.len() as f64;
    let n_b = b.len() as f64;
    let mean_a = a.iter().sum::<f64>() / n_a;
    let mean_b = b.iter().sum::<f64>() / n_b;
    let var_a = a.iter().map(|x| (x - mean_a).powi(2)).sum::<f64>() / (n_a - 1.0);
    let var_b = b.iter().map(|x| (x - mean_b).powi(2)).sum::<f64>() / (n_b - 1.0);

    let se_sq = var_a / n_a + var_b / n_b;
    if se_sq <= 0.0 {
        return Err(CoexError::Numerical(
            "both groups are constant; t-test is undefined".into(),
        ));
    }
    let t_stat = (mean_a - mean_b) / se_sq.sqrt();

    // Welch-Satterthwaite degrees of freedom.
    let df = se_sq.powi(2)
        / ((var_a / n_a).powi(2) / (n_a - 1.0) + (var_b / n_b).powi(2) / (n_b - 1.0));
    let dist = StudentsT::new(0.0, 1.0, df)
        .map_err(|e| CoexError::Numerical(format!("t-distribution with df {}: {}", df, e)))?;
    let p = (2.0 * dist.sf(t_stat.abs())).min(1.0);
    Ok((t_stat, p))
}

/// Mann-Whitney U test via the normal approximation with tie correction
/// and continuity correction, two-sided. Returns the U statistic of the
/// first group.
pub fn mann_whitney_u(a: &[f64], b: &[f64]) -> Result<(f64, f64)> {
    let n_a = a.len();
    let n_b = b.len();
    if n_a < 2 || n_b < 2 {
        return Err(CoexError::EmptyInput(
            "Mann-Whitney needs at least 2 observations per group".into(),
        ));
    }

    // Midranks over the pooled sample.
    let mut pooled: Vec<(f64, usize)> = a
        .iter()
        .map(|&v| (v, 0usize))
        .chain(b.iter().map(|&v| (v, 1usize)))
        .collect();
    pooled.sort_by(|x, y| x.0.partial_cmp(&y.0).expect("finite measurements"));

    let n = pooled.len();
    let mut ranks = vec![0.0f64; n];
    let mut tie_term = 0.0f64;
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && pooled[j + 1].0 == pooled[i].0 {
            j += 1;
        }
        let midrank = (i + j) as f64 / 2.0 + 1.0;
        for slot in ranks.iter_mut().take(j + 1).skip(i) {
            *slot = midrank;
        }
        let t = (j - i + 1) as f64;
        tie_term += t.powi(3) - t;
        i = j + 1;
    }

    let rank_sum_a: f64 = pooled
        .iter()
        .zip(ranks.iter())
        .filter(|((_, group), _)| *group == 0)
        .map(|(_, &r)| r)
        .sum();
    let n_a_f = n_a as f64;
    let n_b_f = n_b as f64;
    let u_a = rank_sum_a - n_a_f * (n_a_f + 1.0) / 2.0;

    let mean_u = n_a_f * n_b_f / 2.0;
    let n_f = n as f64;
    let variance =
        n_a_f * n_b_f / 12.0 * ((n_f + 1.0) - tie_term / (n_f * (n_f - 1.0)));
    if variance <= 0.0 {
        return Err(CoexError::Numerical(
            "all pooled observations tie; Mann-Whitney is undefined".into(),
        ));
    }

    // Continuity correction toward the mean.
    let z = (u_a - mean_u - 0.5 * (u_a - mean_u).signum()) / variance.sqrt();
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| CoexError::Numerical(format!("standard normal: {}", e)))?;
    let p = (2.0 * normal.sf(z.abs())).min(1.0);
    Ok((u_a, p))
}

/// log2 of the ratio of group means. Non-positive means make the ratio
/// meaningless for log-scaling and yield `NaN`, which the writer renders
/// as `NA`.
pub fn log2_fold_change(case: &[f64], reference: &[f64]) -> f64 {
    let mean_case = case.iter().sum::<f64>() / case.len() as f64;
    let mean_ref = reference.iter().sum::<f64>() / reference.len() as f64;
    if mean_case <= 0.0 || mean_ref <= 0.0 {
        return f64::NAN;
    }
    (mean_case / mean_ref).log2()
}

/// Benjamini-Hochberg adjusted p-values (q-values), input order
/// preserved: `q[i] = min over j with p[j] >= p[i] of p[j] * n / rank[j]`.
pub fn benjamini_hochberg(p_values: &[f64]) -> Vec<f64> {
    let n = p_values.len();
    if n == 0 {
        return Vec::new();
    }
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        p_values[a]
            .partial_cmp(&p_values[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut q = vec![0.0f64; n];
    let mut running_min = 1.0f64;
    for rank in (0..n).rev() {
        let idx = order[rank];
        let adjusted = (p_values[idx] * n as f64 / (rank + 1) as f64).min(1.0);
        running_min = running_min.min(adjusted);
        q[idx] = running_min;
    }
    q
}

/// Split feature values into (reference, case) groups by a binary trait
/// column; missing trait entries drop their samples.
fn split_groups(
    feature: ndarray::ArrayView1<f64>,
    trait_column: &[f64],
) -> (Vec<f64>, Vec<f64>) {
    let mut reference = Vec::new();
    let mut case = Vec::new();
    for (&value, &group) in feature.iter().zip(trait_column.iter()) {
        if !group.is_finite() {
            continue;
        }
        if group == 0.0 {
            reference.push(value);
        } else {
            case.push(value);
        }
    }
    (reference, case)
}

/// Run the full univariate screen of every feature against a binary
/// trait (0 = reference, 1 = case; anything non-zero counts as case).
pub fn two_group_screen(
    expression: &ExpressionMatrix,
    traits: &TraitMatrix,
    trait_name: &str,
) -> Result<UnivariateTable> {
    let trait_column = traits.trait_column(trait_name)?;
    if traits.n_samples() != expression.n_samples() {
        return Err(CoexError::DimensionMismatch {
            context: "trait rows vs expression rows",
            expected: expression.n_samples(),
            actual: traits.n_samples(),
        });
    }

    let (reference_probe, case_probe) =
        split_groups(expression.values().column(0), &trait_column);
    if reference_probe.len() < 2 || case_probe.len() < 2 {
        return Err(CoexError::InvalidParameter(format!(
            "trait '{}' does not split the cohort into two groups of at least 2 \
             (got {} reference, {} case)",
            trait_name,
            reference_probe.len(),
            case_probe.len()
        )));
    }
    let group_sizes = (reference_probe.len(), case_probe.len());

    let partial: Vec<Result<(String, f64, f64, f64, f64, f64)>> = (0..expression.n_features())
        .into_par_iter()
        .map(|f| {
            let (reference, case) = split_groups(expression.values().column(f), &trait_column);
            let (t_stat, t_p) = welch_t_test(&case, &reference)?;
            let (u_stat, u_p) = mann_whitney_u(&case, &reference)?;
            let fc = log2_fold_change(&case, &reference);
            Ok((
                expression.feature_ids()[f].clone(),
                t_stat,
                t_p,
                u_stat,
                u_p,
                fc,
            ))
        })
        .collect();

    let mut rows = Vec::with_capacity(partial.len());
    for item in partial {
        let (feature_id, t_statistic, t_p_value, u_statistic, u_p_value, log2_fc) = item?;
        rows.push(ScreenRow {
            feature_id,
            t_statistic,
            t_p_value,
            u_statistic,
            u_p_value,
            log2_fold_change: log2_fc,
            q_value: 0.0,
        });
    }

    let q_values = benjamini_hochberg(&rows.iter().map(|r| r.t_p_value).collect::<Vec<_>>());
    for (row, q) in rows.iter_mut().zip(q_values) {
        row.q_value = q;
    }

    info!(
        "Univariate screen: {} features, groups {}/{} on trait '{}'.",
        rows.len(),
        group_sizes.0,
        group_sizes.1,
        trait_name
    );
    Ok(UnivariateTable { rows, group_sizes })
}
