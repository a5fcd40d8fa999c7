//! Low-information feature filtering.
//!
//! Near-constant columns carry no co-expression signal and break the
//! downstream correlation invariant (zero variance makes Pearson
//! undefined), so they are removed up front and reported for audit.

use crate::data::ExpressionMatrix;
use crate::error::{CoexError, Result};
use log::{debug, info};
use ndarray::ArrayView1;

/// Thresholds for the feature filter.
#[derive(Debug, Clone)]
pub struct FilterParams {
    /// Columns with sample variance at or below this are removed.
    pub min_variance: f64,
    /// Columns where the fraction of distinct values falls below this are
    /// removed (catches quantized / mostly-imputed measurements that keep
    /// a nominal variance).
    pub min_unique_fraction: f64,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            min_variance: 1e-12,
            min_unique_fraction: 0.1,
        }
    }
}

/// Outcome of a filter pass: the retained matrix plus the identifiers of
/// every removed column.
#[derive(Debug, Clone)]
pub struct FilterOutcome {
    pub matrix: ExpressionMatrix,
    pub removed: Vec<String>,
}

fn unique_fraction(column: ArrayView1<f64>) -> f64 {
    let mut values: Vec<f64> = column.to_vec();
    values.sort_by(|a, b| a.partial_cmp(b).expect("finite by construction"));
    values.dedup();
    values.len() as f64 / column.len() as f64
}

/// Remove near-constant and low-uniqueness feature columns.
///
/// Fails with [`CoexError::EmptyFeatureSet`] when nothing survives.
pub fn filter_features(
    expression: &ExpressionMatrix,
    params: &FilterParams,
) -> Result<FilterOutcome> {
    let mut kept = Vec::new();
    let mut removed = Vec::new();

    for (col, feature_id) in expression.feature_ids().iter().enumerate() {
        let column = expression.values().column(col);
        let variance = column.var(1.0);
        if variance <= params.min_variance {
            debug!(
                "Removing feature '{}' (variance {:.3e} <= {:.3e}).",
                feature_id, variance, params.min_variance
            );
            removed.push(feature_id.clone());
            continue;
        }
        if unique_fraction(column) < params.min_unique_fraction {
            debug!(
                "Removing feature '{}' (distinct-value fraction below {}).",
                feature_id, params.min_unique_fraction
            );
            removed.push(feature_id.clone());
            continue;
        }
        kept.push(col);
    }

    if kept.is_empty() {
        return Err(CoexError::EmptyFeatureSet);
    }

    info!(
        "Feature filter: kept {} / {} features ({} removed).",
        kept.len(),
        expression.n_features(),
        removed.len()
    );
    Ok(FilterOutcome {
        matrix: expression.select_features(&kept)?,
        removed,
    })
}
