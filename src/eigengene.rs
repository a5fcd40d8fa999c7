//! Module eigengenes: the first principal component of a module's
//! expression submatrix, one score per sample.

use crate::correlation::pearson;
use crate::error::{CoexError, Result};
use nalgebra::DMatrix;
use ndarray::{Array1, Array2, ArrayView2};

/// Eigengene of one module: PC1 sample scores of the column-centered
/// submatrix (samples x member variables).
///
/// SVD leaves the sign of the component arbitrary; the convention here
/// orients the eigengene to correlate positively with the mean profile
/// of its member variables, which makes reruns deterministic.
pub fn module_eigengene(submatrix: ArrayView2<f64>) -> Result<Array1<f64>> {
    let n_samples = submatrix.nrows();
    let n_members = submatrix.ncols();
    if n_samples < 2 {
        return Err(CoexError::EmptyInput(
            "eigengene needs at least 2 samples".into(),
        ));
    }
    if n_members == 0 {
        return Err(CoexError::EmptyInput("eigengene of an empty module".into()));
    }

    // Column-center into a nalgebra matrix for the decomposition.
    let mut centered = DMatrix::<f64>::zeros(n_samples, n_members);
    for j in 0..n_members {
        let column = submatrix.column(j);
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

    // nalgebra does not guarantee ordering of singular values.
    let (leading, sigma) = svd
        .singular_values
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).expect("singular values are finite"))
        .map(|(idx, &s)| (idx, s))
        .ok_or_else(|| CoexError::Numerical("SVD returned no singular values".into()))?;

    let mut scores = Array1::from_iter((0..n_samples).map(|i| u[(i, leading)] * sigma));

    // Orient against the mean member profile.
    let mean_profile = Array1::from_iter(
        (0..n_samples).map(|i| submatrix.row(i).mean().expect("non-empty row")),
    );
    if let Some(r) = pearson(scores.view(), mean_profile.view()) {
        if r < 0.0 {
            scores.mapv_inplace(|v| -v);
        }
    }
    Ok(scores)
}

/// Eigengene matrix (samples x modules) for the given module labels,
/// one column per entry of `module_labels`, in order.
///
/// `labels` assigns each feature column of `expression_values` to a
/// module; label 0 is the unassigned pool and is never summarized.
pub fn eigengene_matrix(
    expression_values: &Array2<f64>,
    labels: &[usize],
    module_labels: &[usize],
) -> Result<Array2<f64>> {
    let n_samples = expression_values.nrows();
    let mut eigengenes = Array2::<f64>::zeros((n_samples, module_labels.len()));
    for (idx, &module) in module_labels.iter().enumerate() {
        let members: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|(_, &l)| l == module)
            .map(|(col, _)| col)
            .collect();
        if members.is_empty() {
            return Err(CoexError::EmptyInput(format!(
                "module {} has no member variables",
                module
            )));
        }
        let submatrix = expression_values.select(ndarray::Axis(1), &members);
        let eigengene = module_eigengene(submatrix.view())?;
        eigengenes.column_mut(idx).assign(&eigengene);
    }
    Ok(eigengenes)
}
