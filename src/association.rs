//! Module-trait association: eigengenes correlated against clinical
//! trait vectors, with Student-t significance.

use crate::correlation::{correlation_p_value, pairwise_complete_pearson};
use crate::data::TraitMatrix;
use crate::error::{CoexError, Result};
use log::info;
use ndarray::{Array2, ArrayView1};

/// Modules x traits correlation and p-value tables.
#[derive(Debug, Clone)]
pub struct AssociationTable {
    pub module_labels: Vec<usize>,
    pub trait_names: Vec<String>,
    pub correlations: Array2<f64>,
    pub p_values: Array2<f64>,
}

/// Validate one trait column: it must have at least 3 observed values
/// and non-zero variance among them.
pub(crate) fn validate_trait(name: &str, column: ArrayView1<f64>) -> Result<()> {
    let observed: Vec<f64> = column.iter().copied().filter(|v| v.is_finite()).collect();
    if observed.len() < 3 {
        return Err(CoexError::InsufficientObservations {
            name: name.to_string(),
            observed: observed.len(),
        });
    }
    let mean = observed.iter().sum::<f64>() / observed.len() as f64;
    let variance = observed.iter().map(|v| (v - mean).powi(2)).sum::<f64>();
    if variance <= 0.0 {
        return Err(CoexError::ConstantTrait {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Correlate every module eigengene against every trait column.
///
/// Trait entries may be missing (`NaN`); those samples drop out pairwise
/// per cell. Constant or nearly-unobserved traits fail loudly instead of
/// seeding `NaN` into downstream ranking.
pub fn module_trait_associations(
    eigengenes: &Array2<f64>,
    module_labels: &[usize],
    traits: &TraitMatrix,
) -> Result<AssociationTable> {
    if eigengenes.nrows() != traits.n_samples() {
        return Err(CoexError::DimensionMismatch {
            context: "eigengene rows vs trait rows",
            expected: traits.n_samples(),
            actual: eigengenes.nrows(),
        });
    }
    if eigengenes.ncols() != module_labels.len() {
        return Err(CoexError::DimensionMismatch {
            context: "eigengene columns vs module labels",
            expected: module_labels.len(),
            actual: eigengenes.ncols(),
        });
    }

    for (t, name) in traits.trait_names().iter().enumerate() {
        validate_trait(name, traits.values().column(t))?;
    }

    let n_modules = eigengenes.ncols();
    let n_traits = traits.n_traits();
    let mut correlations = Array2::<f64>::zeros((n_modules, n_traits));
    let mut p_values = Array2::<f64>::zeros((n_modules, n_traits));

    for m in 0..n_modules {
        for t in 0..n_traits {
            let name = &traits.trait_names()[t];
            let (r, n) =
                pairwise_complete_pearson(eigengenes.column(m), traits.values().column(t))
                    .ok_or_else(|| CoexError::ConstantTrait { name: name.clone() })?;
            correlations[[m, t]] = r;
            p_values[[m, t]] = correlation_p_value(r, n)?;
        }
    }

    info!(
        "Module-trait association: {} modules x {} traits.",
        n_modules, n_traits
    );
    Ok(AssociationTable {
        module_labels: module_labels.to_vec(),
        trait_names: traits.trait_names().to_vec(),
        correlations,
        p_values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn traits_from(values: Array2<f64>, names: Vec<&str>) -> TraitMatrix {
        let sample_ids = (0..values.nrows()).map(|i| format!("s{}", i)).collect();
        TraitMatrix::new(
            sample_ids,
            names.into_iter().map(String::from).collect(),
            values,
        )
        .unwrap()
    }

    #[test]
    fn constant_trait_is_rejected() {
        let eigengenes = array![[1.0], [2.0], [3.0], [4.0]];
        let traits = traits_from(array![[1.0], [1.0], [1.0], [1.0]], vec!["status"]);
        match module_trait_associations(&eigengenes, &[1], &traits) {
            Err(CoexError::ConstantTrait { name }) => assert_eq!(name, "status"),
            other => panic!("expected ConstantTrait, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn missing_entries_drop_pairwise() {
        let eigengenes = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let traits = traits_from(
            array![[2.0], [f64::NAN], [6.0], [8.0], [10.0]],
            vec!["score"],
        );
        let table = module_trait_associations(&eigengenes, &[1], &traits).unwrap();
        assert_abs_diff_eq!(table.correlations[[0, 0]], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(table.p_values[[0, 0]], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn binary_trait_correlates_with_matching_eigengene() {
        let eigengenes = array![[2.0], [1.8], [2.2], [-2.0], [-1.9], [-2.1]];
        let traits = traits_from(
            array![[1.0], [1.0], [1.0], [0.0], [0.0], [0.0]],
            vec!["case"],
        );
        let table = module_trait_associations(&eigengenes, &[1], &traits).unwrap();
        assert!(table.correlations[[0, 0]] > 0.99);
        assert!(table.p_values[[0, 0]] < 0.01);
    }
}
