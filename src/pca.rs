//! Sample-space PCA for cohort-structure inspection: batch effects and
//! confounders show up as separation along the leading components.

use crate::data::ExpressionMatrix;
use crate::error::{CoexError, Result};
use log::{info, warn};
use nalgebra::DMatrix;
use ndarray::Array2;

/// PCA output: per-sample component scores plus the fraction of total
/// variance each component explains.
#[derive(Debug, Clone)]
pub struct PcaResult {
    pub sample_ids: Vec<String>,
    /// samples x components.
    pub scores: Array2<f64>,
    pub explained_variance: Vec<f64>,
}

/// Centered PCA of the samples x features matrix via SVD, keeping up to
/// `components` components (capped at `min(samples, features)`).
pub fn sample_pca(expression: &ExpressionMatrix, components: usize) -> Result<PcaResult> {
    if components == 0 {
        return Err(CoexError::InvalidParameter(
            "number of components must be > 0".into(),
        ));
    }
    let n_samples = expression.n_samples();
    let n_features = expression.n_features();
    if n_samples < 2 {
        return Err(CoexError::EmptyInput("PCA needs at least 2 samples".into()));
    }

    let max_k = n_samples.min(n_features);
    let k = if components > max_k {
        warn!(
            "Requested {} components exceeds max possible ({}), capping.",
            components, max_k
        );
        max_k
    } else {
        components
    };

    // Column-center into nalgebra for the decomposition.
    let values = expression.values();
    let mut centered = DMatrix::<f64>::zeros(n_samples, n_features);
    for j in 0..n_features {
        let column = values.column(j);
        let mean = column.mean().expect("non-empty column");
        for i in 0..n_samples {
            centered[(i, j)] = column[i] - mean;
        }
    }

    let svd = centered.svd(true, false);
    let u = svd
        .u
        .as_ref()
        .ok_or_else(|| CoexError::Numerical("SVD did not return U".into()))?;

    // Order components by singular value, largest first.
    let mut order: Vec<usize> = (0..svd.singular_values.len()).collect();
    order.sort_by(|&a, &b| {
        svd.singular_values[b]
            .partial_cmp(&svd.singular_values[a])
            .expect("singular values are finite")
    });
    order.truncate(k);

    let total_variance: f64 = svd.singular_values.iter().map(|s| s * s).sum();
    let mut scores = Array2::<f64>::zeros((n_samples, order.len()));
    let mut explained_variance = Vec::with_capacity(order.len());
    for (out_idx, &comp) in order.iter().enumerate() {
        let sigma = svd.singular_values[comp];
        for i in 0..n_samples {
            scores[[i, out_idx]] = u[(i, comp)] * sigma;
        }
        explained_variance.push(if total_variance > 0.0 {
            sigma * sigma / total_variance
        } else {
            0.0
        });
    }

    info!(
        "PCA: {} components over {} samples x {} features.",
        order.len(),
        n_samples,
        n_features
    );
    Ok(PcaResult {
        sample_ids: expression.sample_ids().to_vec(),
        scores,
        explained_variance,
    })
}
