//! Labeled input matrices shared by every pipeline stage.
//!
//! Both matrix types carry their row and column labels so that every
//! selection downstream happens by name against a validated object,
//! never by positional slicing.

use crate::error::{CoexError, Result};
use ndarray::Array2;

/// Expression data: samples (rows) x features (columns).
///
/// Values must be finite; missing-value handling belongs to the upstream
/// imputation step, not to this crate.
#[derive(Debug, Clone)]
pub struct ExpressionMatrix {
    sample_ids: Vec<String>,
    feature_ids: Vec<String>,
    values: Array2<f64>,
}

impl ExpressionMatrix {
    pub fn new(
        sample_ids: Vec<String>,
        feature_ids: Vec<String>,
        values: Array2<f64>,
    ) -> Result<Self> {
        if sample_ids.is_empty() {
            return Err(CoexError::EmptyInput("no samples".into()));
        }
        if feature_ids.is_empty() {
            return Err(CoexError::EmptyInput("no features".into()));
        }
        if values.nrows() != sample_ids.len() {
            return Err(CoexError::DimensionMismatch {
                context: "expression rows vs sample ids",
                expected: sample_ids.len(),
                actual: values.nrows(),
            });
        }
        if values.ncols() != feature_ids.len() {
            return Err(CoexError::DimensionMismatch {
                context: "expression columns vs feature ids",
                expected: feature_ids.len(),
                actual: values.ncols(),
            });
        }
        for ((row, col), value) in values.indexed_iter() {
            if !value.is_finite() {
                return Err(CoexError::NonFiniteValue {
                    feature: feature_ids[col].clone(),
                    sample: sample_ids[row].clone(),
                });
            }
        }
        Ok(Self {
            sample_ids,
            feature_ids,
            values,
        })
    }

    pub fn n_samples(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.values.ncols()
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    pub fn feature_ids(&self) -> &[String] {
        &self.feature_ids
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn feature_index(&self, name: &str) -> Result<usize> {
        self.feature_ids
            .iter()
            .position(|f| f == name)
            .ok_or_else(|| CoexError::UnknownName {
                kind: "feature",
                name: name.to_string(),
            })
    }

    /// New matrix restricted to the given feature column indices, in order.
    pub fn select_features(&self, indices: &[usize]) -> Result<Self> {
        if indices.is_empty() {
            return Err(CoexError::EmptyFeatureSet);
        }
        let feature_ids = indices
            .iter()
            .map(|&i| self.feature_ids[i].clone())
            .collect();
        let values = self.values.select(ndarray::Axis(1), indices);
        Self::new(self.sample_ids.clone(), feature_ids, values)
    }
}

/// Clinical trait data: samples (rows) x traits (columns).
///
/// `NaN` encodes a missing clinical value and is excluded pairwise (not
/// row-wise) wherever a trait column enters a correlation.
#[derive(Debug, Clone)]
pub struct TraitMatrix {
    sample_ids: Vec<String>,
    trait_names: Vec<String>,
    values: Array2<f64>,
}

impl TraitMatrix {
    pub fn new(
        sample_ids: Vec<String>,
        trait_names: Vec<String>,
        values: Array2<f64>,
    ) -> Result<Self> {
        if trait_names.is_empty() {
            return Err(CoexError::EmptyInput("no traits".into()));
        }
        if values.nrows() != sample_ids.len() {
            return Err(CoexError::DimensionMismatch {
                context: "trait rows vs sample ids",
                expected: sample_ids.len(),
                actual: values.nrows(),
            });
        }
        if values.ncols() != trait_names.len() {
            return Err(CoexError::DimensionMismatch {
                context: "trait columns vs trait names",
                expected: trait_names.len(),
                actual: values.ncols(),
            });
        }
        Ok(Self {
            sample_ids,
            trait_names,
            values,
        })
    }

    pub fn n_samples(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_traits(&self) -> usize {
        self.values.ncols()
    }

    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    pub fn trait_names(&self) -> &[String] {
        &self.trait_names
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn trait_index(&self, name: &str) -> Result<usize> {
        self.trait_names
            .iter()
            .position(|t| t == name)
            .ok_or_else(|| CoexError::UnknownName {
                kind: "trait",
                name: name.to_string(),
            })
    }

    /// One trait column by name.
    pub fn trait_column(&self, name: &str) -> Result<Vec<f64>> {
        let idx = self.trait_index(name)?;
        Ok(self.values.column(idx).to_vec())
    }

    /// Reorder rows to match the sample order of an expression matrix.
    ///
    /// Every expression sample must be present in the trait table; extra
    /// trait rows are dropped.
    pub fn aligned_to(&self, expression: &ExpressionMatrix) -> Result<Self> {
        let mut row_order = Vec::with_capacity(expression.n_samples());
        for wanted in expression.sample_ids() {
            let row = self
                .sample_ids
                .iter()
                .position(|s| s == wanted)
                .ok_or_else(|| {
                    CoexError::SampleMismatch(format!(
                        "expression sample '{}' is missing from the trait table",
                        wanted
                    ))
                })?;
            row_order.push(row);
        }
        let values = self.values.select(ndarray::Axis(0), &row_order);
        Self::new(
            expression.sample_ids().to_vec(),
            self.trait_names.clone(),
            values,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn ids(prefix: &str, n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{}{}", prefix, i)).collect()
    }

    #[test]
    fn expression_rejects_nan() {
        let values = array![[1.0, 2.0], [3.0, f64::NAN]];
        let err = ExpressionMatrix::new(ids("s", 2), ids("f", 2), values).unwrap_err();
        assert!(matches!(err, CoexError::NonFiniteValue { .. }));
    }

    #[test]
    fn expression_rejects_dimension_mismatch() {
        let values = array![[1.0, 2.0], [3.0, 4.0]];
        let err = ExpressionMatrix::new(ids("s", 3), ids("f", 2), values).unwrap_err();
        assert!(matches!(err, CoexError::DimensionMismatch { .. }));
    }

    #[test]
    fn select_features_keeps_order() {
        let values = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let expr = ExpressionMatrix::new(ids("s", 2), ids("f", 3), values).unwrap();
        let sub = expr.select_features(&[2, 0]).unwrap();
        assert_eq!(sub.feature_ids(), &["f2".to_string(), "f0".to_string()]);
        assert_eq!(sub.values()[[0, 0]], 3.0);
        assert_eq!(sub.values()[[1, 1]], 4.0);
    }

    #[test]
    fn trait_alignment_reorders_rows() {
        let expr_values = array![[1.0, 2.0], [3.0, 4.0]];
        let expr =
            ExpressionMatrix::new(vec!["a".into(), "b".into()], ids("f", 2), expr_values).unwrap();
        let trait_values = array![[10.0], [20.0], [30.0]];
        let traits = TraitMatrix::new(
            vec!["b".into(), "c".into(), "a".into()],
            vec!["status".into()],
            trait_values,
        )
        .unwrap();
        let aligned = traits.aligned_to(&expr).unwrap();
        assert_eq!(aligned.sample_ids(), expr.sample_ids());
        assert_eq!(aligned.values()[[0, 0]], 30.0);
        assert_eq!(aligned.values()[[1, 0]], 10.0);
    }

    #[test]
    fn trait_alignment_fails_on_missing_sample() {
        let expr_values = array![[1.0], [2.0]];
        let expr =
            ExpressionMatrix::new(vec!["a".into(), "b".into()], ids("f", 1), expr_values).unwrap();
        let traits =
            TraitMatrix::new(vec!["a".into()], vec!["status".into()], array![[1.0]]).unwrap();
        assert!(matches!(
            traits.aligned_to(&expr),
            Err(CoexError::SampleMismatch(_))
        ));
    }
}
