//! Pearson correlation primitives shared by the network, association,
//! and membership stages.

use crate::error::{CoexError, Result};
use ndarray::{Array2, ArrayView1};
use rayon::prelude::*;
use statrs::distribution::{ContinuousCDF, StudentsT};

/// Pearson correlation of two equal-length slices. Returns `None` when
/// either side has zero variance.
pub fn pearson(a: ArrayView1<f64>, b: ArrayView1<f64>) -> Option<f64> {
    debug_assert_eq!(a.len(), b.len());
    let n = a.len() as f64;
    if n < 2.0 {
        return None;
    }
    let mean_a = a.mean()?;
    let mean_b = b.mean()?;
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }
    if var_a <= 0.0 || var_b <= 0.0 {
        return None;
    }
    Some((cov / (var_a.sqrt() * var_b.sqrt())).clamp(-1.0, 1.0))
}

/// Pearson correlation over pairwise-complete observations: pairs where
/// `b` is `NaN` are dropped (missing clinical values), `a` is assumed
/// complete. Returns the coefficient and the number of complete pairs.
pub fn pairwise_complete_pearson(a: ArrayView1<f64>, b: ArrayView1<f64>) -> Option<(f64, usize)> {
    debug_assert_eq!(a.len(), b.len());
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .zip(b.iter())
        .filter(|(_, y)| y.is_finite())
        .map(|(&x, &y)| (x, y))
        .collect();
    let n = pairs.len();
    if n < 3 {
        return None;
    }
    let xs = ndarray::Array1::from_iter(pairs.iter().map(|p| p.0));
    let ys = ndarray::Array1::from_iter(pairs.iter().map(|p| p.1));
    pearson(xs.view(), ys.view()).map(|r| (r, n))
}

/// Two-sided p-value for a Pearson coefficient via the Student-t
/// approximation with `n - 2` degrees of freedom.
pub fn correlation_p_value(r: f64, n: usize) -> Result<f64> {
    if n < 3 {
        return Err(CoexError::Numerical(format!(
            "correlation p-value needs at least 3 observations, got {}",
            n
        )));
    }
    let df = (n - 2) as f64;
    // |r| == 1 gives an infinite t statistic; the tail mass is zero.
    let denom = 1.0 - r * r;
    if denom <= f64::EPSILON {
        return Ok(0.0);
    }
    let t_stat = r.abs() * (df / denom).sqrt();
    let dist = StudentsT::new(0.0, 1.0, df)
        .map_err(|e| CoexError::Numerical(format!("t-distribution with df {}: {}", df, e)))?;
    // sf() is more stable than 1 - cdf() in the far tail.
    Ok((2.0 * dist.sf(t_stat)).min(1.0))
}

/// Full column-by-column Pearson correlation matrix of `x`
/// (observations in rows, variables in columns).
///
/// Fails fast with [`CoexError::DegenerateColumn`] if any column has
/// zero variance; the upstream feature filter is expected to make this
/// unreachable.
pub fn column_correlation_matrix(x: &Array2<f64>, column_ids: &[String]) -> Result<Array2<f64>> {
    let n = x.nrows();
    let p = x.ncols();
    if n < 2 {
        return Err(CoexError::EmptyInput(
            "correlation needs at least 2 observations".into(),
        ));
    }

    // Standardize columns once; the correlation matrix is then Z'Z / (n-1).
    let mut z = x.clone();
    for (col, mut column) in z.columns_mut().into_iter().enumerate() {
        let mean = column.mean().expect("non-empty column");
        let sd = column.std(1.0);
        if sd <= 0.0 {
            return Err(CoexError::DegenerateColumn {
                feature: column_ids
                    .get(col)
                    .cloned()
                    .unwrap_or_else(|| format!("column {}", col)),
            });
        }
        column.mapv_inplace(|v| (v - mean) / sd);
    }

    let scale = 1.0 / (n as f64 - 1.0);
    let mut corr = Array2::<f64>::zeros((p, p));
    {
        let z_ref = &z;
        corr.axis_iter_mut(ndarray::Axis(0))
            .into_par_iter()
            .enumerate()
            .for_each(|(i, mut row)| {
                let zi = z_ref.column(i);
                row[i] = 1.0;
                for j in (i + 1)..p {
                    let r = (zi.dot(&z_ref.column(j)) * scale).clamp(-1.0, 1.0);
                    row[j] = r;
                }
            });
    }
    // Mirror the upper triangle.
    for i in 0..p {
        for j in (i + 1)..p {
            corr[[j, i]] = corr[[i, j]];
        }
    }
    Ok(corr)
}
