//! Dense vector and small-matrix primitives used by the distance engine.
//!
//! - slice operators: `norm`, `dot`, `euclidean_dist`
//! - covariance estimation over N row vectors (unbiased, N-1 denominator)
//! - Gauss-Jordan inversion with partial pivoting, failing on singular input
//! - ridge-regularised inversion that escalates until the matrix inverts
//!
//! Matrices are row-major `Vec<Vec<f64>>`, D×D with D the feature dimensionality.

use log::{debug, trace, warn};

use crate::error::{Result, TopoError};

/// Pivot magnitude below which a matrix is treated as singular (relative to its scale).
pub const SINGULAR_TOLERANCE: f64 = 1e-12;
/// Upper bound on ridge escalation steps.
const MAX_RIDGE_STEPS: usize = 12;

/// Computes the Euclidean norm (L2) without allocating.
#[inline]
pub fn norm(a: &[f64]) -> f64 {
    a.iter().map(|&x| x * x).sum::<f64>().sqrt()
}

#[inline]
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub fn euclidean_dist(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

pub fn column_means(rows: &[Vec<f64>]) -> Vec<f64> {
    let d = rows.first().map(|r| r.len()).unwrap_or(0);
    let mut means = vec![0.0; d];
    if rows.is_empty() {
        return means;
    }
    for row in rows {
        for (m, v) in means.iter_mut().zip(row) {
            *m += v;
        }
    }
    let n = rows.len() as f64;
    means.iter_mut().for_each(|m| *m /= n);
    means
}

/// Sample covariance of the rows (D×D). A single row yields the zero matrix.
pub fn covariance(rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let d = rows.first().map(|r| r.len()).unwrap_or(0);
    let mut cov = vec![vec![0.0; d]; d];
    if rows.len() < 2 {
        return cov;
    }

    let means = column_means(rows);
    for row in rows {
        let centred: Vec<f64> = row.iter().zip(&means).map(|(v, m)| v - m).collect();
        for a in 0..d {
            if centred[a] == 0.0 {
                continue;
            }
            for b in a..d {
                cov[a][b] += centred[a] * centred[b];
            }
        }
    }

    let denom = (rows.len() - 1) as f64;
    for a in 0..d {
        for b in a..d {
            let v = cov[a][b] / denom;
            cov[a][b] = v;
            cov[b][a] = v;
        }
    }
    cov
}

/// Invert a square matrix by Gauss-Jordan elimination with partial pivoting.
///
/// Fails with `SingularCovariance` when a pivot falls below
/// `SINGULAR_TOLERANCE` times the largest entry magnitude. The tolerance is
/// purely relative, so rescaling the matrix never changes the outcome. A
/// non-empty zero matrix is singular.
pub fn invert(matrix: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
    let d = matrix.len();
    if d == 0 {
        return Ok(Vec::new());
    }
    let scale = matrix
        .iter()
        .flat_map(|r| r.iter())
        .map(|v| v.abs())
        .fold(0.0_f64, f64::max);
    if scale == 0.0 {
        trace!("zero matrix ({}x{})", d, d);
        return Err(TopoError::SingularCovariance {
            dimension: d,
            pivot: 0.0,
        });
    }

    // augmented [A | I]
    let mut aug: Vec<Vec<f64>> = matrix
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let mut r = Vec::with_capacity(2 * d);
            r.extend_from_slice(row);
            r.extend((0..d).map(|j| if i == j { 1.0 } else { 0.0 }));
            r
        })
        .collect();

    for col in 0..d {
        let (pivot_row, pivot) = (col..d)
            .map(|r| (r, aug[r][col].abs()))
            .fold((col, -1.0), |best, cur| if cur.1 > best.1 { cur } else { best });

        if pivot < SINGULAR_TOLERANCE * scale {
            trace!("singular at column {} (pivot {:.3e})", col, pivot);
            return Err(TopoError::SingularCovariance {
                dimension: d,
                pivot,
            });
        }
        aug.swap(col, pivot_row);

        let p = aug[col][col];
        aug[col].iter_mut().for_each(|v| *v /= p);

        for r in 0..d {
            if r == col {
                continue;
            }
            let factor = aug[r][col];
            if factor == 0.0 {
                continue;
            }
            for c in col..2 * d {
                let delta = factor * aug[col][c];
                aug[r][c] -= delta;
            }
        }
    }

    Ok(aug.into_iter().map(|r| r[d..].to_vec()).collect())
}

/// Inverse of `cov`, regularised when singular.
///
/// Tries a plain inversion first; on `SingularCovariance` adds
/// `ridge * mean_variance` to the diagonal and retries, multiplying the ridge by
/// ten each time. Returns the inverse and the absolute ridge applied (`None` when
/// the matrix inverted as-is).
pub fn invert_regularised(cov: &[Vec<f64>], ridge: f64) -> Result<(Vec<Vec<f64>>, Option<f64>)> {
    match invert(cov) {
        Ok(inv) => return Ok((inv, None)),
        Err(e @ TopoError::SingularCovariance { .. }) => {
            warn!("{}; falling back to ridge regularisation", e);
        }
        Err(e) => return Err(e),
    }

    let d = cov.len();
    let mean_variance = if d > 0 {
        (0..d).map(|i| cov[i][i]).sum::<f64>() / d as f64
    } else {
        0.0
    };
    let base = if mean_variance > 0.0 { mean_variance } else { 1.0 };
    let mut lambda = ridge * base;

    let mut last_err = None;
    for step in 0..MAX_RIDGE_STEPS {
        let mut regularised = cov.to_vec();
        for (i, row) in regularised.iter_mut().enumerate() {
            row[i] += lambda;
        }
        match invert(&regularised) {
            Ok(inv) => {
                debug!("covariance inverted with ridge {:.3e} after {} step(s)", lambda, step + 1);
                return Ok((inv, Some(lambda)));
            }
            Err(e) => last_err = Some(e),
        }
        lambda *= 10.0;
    }

    Err(last_err.unwrap_or(TopoError::SingularCovariance {
        dimension: d,
        pivot: 0.0,
    }))
}

/// `sqrt(max(0, (a-b)^T M (a-b)))`.
pub fn mahalanobis_dist(a: &[f64], b: &[f64], inv_cov: &[Vec<f64>]) -> f64 {
    let diff: Vec<f64> = a.iter().zip(b).map(|(x, y)| x - y).collect();
    let q: f64 = inv_cov
        .iter()
        .zip(&diff)
        .map(|(row, &di)| di * dot(row, &diff))
        .sum();
    q.max(0.0).sqrt()
}
