//! Adjacency construction: correlation soft-thresholding in signed or
//! unsigned mode.

use crate::correlation::column_correlation_matrix;
use crate::data::ExpressionMatrix;
use crate::error::{CoexError, Result};
use log::info;
use ndarray::{Array1, Array2};
use std::str::FromStr;

/// How negative correlations enter the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkMode {
    /// `|cor|^power`: correlation sign is discarded.
    Unsigned,
    /// `((1 + cor) / 2)^power`: negative correlations are down-weighted
    /// instead of folded in, preserving sign information.
    Signed,
}

impl NetworkMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkMode::Unsigned => "unsigned",
            NetworkMode::Signed => "signed",
        }
    }
}

impl FromStr for NetworkMode {
    type Err = CoexError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "unsigned" => Ok(NetworkMode::Unsigned),
            "signed" => Ok(NetworkMode::Signed),
            other => Err(CoexError::InvalidParameter(format!(
                "network mode must be 'signed' or 'unsigned', got '{}'",
                other
            ))),
        }
    }
}

/// Apply the soft threshold to a correlation matrix. The result is a
/// symmetric matrix with entries in [0, 1]; the diagonal is zeroed so
/// connectivity sums never count self-similarity.
pub fn soft_threshold(correlations: &Array2<f64>, power: f64, mode: NetworkMode) -> Array2<f64> {
    let mut adjacency = correlations.mapv(|c| match mode {
        NetworkMode::Unsigned => c.abs().powf(power),
        NetworkMode::Signed => ((1.0 + c) / 2.0).powf(power),
    });
    for i in 0..adjacency.nrows() {
        adjacency[[i, i]] = 0.0;
    }
    adjacency
}

/// Build the adjacency matrix for an expression matrix.
pub fn adjacency(
    expression: &ExpressionMatrix,
    power: f64,
    mode: NetworkMode,
) -> Result<Array2<f64>> {
    if power <= 0.0 {
        return Err(CoexError::InvalidParameter(format!(
            "soft-threshold power must be positive, got {}",
            power
        )));
    }
    let correlations =
        column_correlation_matrix(expression.values(), expression.feature_ids())?;
    info!(
        "Built {} adjacency for {} features at power {}.",
        mode.as_str(),
        expression.n_features(),
        power
    );
    Ok(soft_threshold(&correlations, power, mode))
}

/// Per-variable connectivity: row sums of the adjacency (diagonal is
/// already excluded by construction).
pub fn connectivity(adjacency: &Array2<f64>) -> Array1<f64> {
    adjacency.sum_axis(ndarray::Axis(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn unsigned_folds_negative_correlations() {
        let corr = array![[1.0, -0.5], [-0.5, 1.0]];
        let adj = soft_threshold(&corr, 2.0, NetworkMode::Unsigned);
        assert_abs_diff_eq!(adj[[0, 1]], 0.25, epsilon = 1e-12);
        assert_eq!(adj[[0, 0]], 0.0);
    }

    #[test]
    fn signed_downweights_negative_correlations() {
        let corr = array![[1.0, -0.5], [-0.5, 1.0]];
        let adj = soft_threshold(&corr, 2.0, NetworkMode::Signed);
        assert_abs_diff_eq!(adj[[0, 1]], 0.0625, epsilon = 1e-12);
    }

    #[test]
    fn higher_power_never_raises_off_diagonal_entries() {
        let corr = array![[1.0, 0.8, -0.3], [0.8, 1.0, 0.1], [-0.3, 0.1, 1.0]];
        for mode in [NetworkMode::Unsigned, NetworkMode::Signed] {
            let low = soft_threshold(&corr, 2.0, mode);
            let high = soft_threshold(&corr, 6.0, mode);
            for i in 0..3 {
                for j in 0..3 {
                    if i != j {
                        assert!(high[[i, j]] <= low[[i, j]] + 1e-12);
                    }
                }
            }
        }
    }

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!(
            "Signed".parse::<NetworkMode>().unwrap(),
            NetworkMode::Signed
        );
        assert!("weird".parse::<NetworkMode>().is_err());
    }
}
