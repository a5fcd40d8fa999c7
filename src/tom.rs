//! Topological overlap transform.
//!
//! Converts an adjacency matrix into a neighborhood-aware similarity:
//! two variables score high only when their direct connection is backed
//! by shared neighbors, which suppresses spurious one-off correlations
//! in small cohorts.

use crate::error::{CoexError, Result};
use log::info;
use ndarray::Array2;
use rayon::prelude::*;

/// Denominators below this are treated as isolated-variable cases and
/// the overlap is defined as 0 instead of dividing.
const DENOM_EPS: f64 = 1e-10;

/// Topological overlap matrix of a symmetric adjacency with zeroed
/// diagonal. Entries lie in [0, 1]; the diagonal is 1 by definition.
///
/// For each pair (i, j):
/// `tom[i,j] = (shared + a[i,j]) / (min(k_i, k_j) + 1 - a[i,j])`
/// where `shared = sum over k != i,j of min(a[i,k], a[j,k])` and `k_i`
/// is the connectivity of variable i.
pub fn topological_overlap(adjacency: &Array2<f64>) -> Result<Array2<f64>> {
    let p = adjacency.nrows();
    if p != adjacency.ncols() {
        return Err(CoexError::DimensionMismatch {
            context: "adjacency must be square",
            expected: p,
            actual: adjacency.ncols(),
        });
    }

    let k: Vec<f64> = (0..p).map(|i| adjacency.row(i).sum()).collect();

    let mut tom = Array2::<f64>::zeros((p, p));
    {
        let k_ref = &k;
        tom.axis_iter_mut(ndarray::Axis(0))
            .into_par_iter()
            .enumerate()
            .for_each(|(i, mut row)| {
                let a_i = adjacency.row(i);
                row[i] = 1.0;
                for j in (i + 1)..p {
                    let a_j = adjacency.row(j);
                    let a_ij = a_i[j];
                    let mut shared = 0.0;
                    for l in 0..p {
                        if l == i || l == j {
                            continue;
                        }
                        shared += a_i[l].min(a_j[l]);
                    }
                    let denominator = k_ref[i].min(k_ref[j]) + 1.0 - a_ij;
                    row[j] = if denominator.abs() < DENOM_EPS {
                        0.0
                    } else {
                        ((shared + a_ij) / denominator).clamp(0.0, 1.0)
                    };
                }
            });
    }
    for i in 0..p {
        for j in (i + 1)..p {
            tom[[j, i]] = tom[[i, j]];
        }
    }

    info!("Topological overlap computed for {} variables.", p);
    Ok(tom)
}

/// Dissimilarity used for clustering: `1 - TOM`.
pub fn tom_dissimilarity(tom: &Array2<f64>) -> Array2<f64> {
    tom.mapv(|t| 1.0 - t)
}
