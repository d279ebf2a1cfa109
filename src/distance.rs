//! # Pairwise distance matrices over query feature vectors
//!
//! ## Metrics
//! - **Euclidean**: L2 norm of the difference.
//! - **Cosine**: `1 - cos(a, b)`, clamped into `[0, 2]`. A zero-norm vector has no
//!   direction: the strict primitive [`cosine_distance`] fails with
//!   `DegenerateVector`, the matrix builder assigns the orthogonal distance `1.0`
//!   to every pair touching that query and records a [`NumericFlag`].
//! - **Mahalanobis**: `sqrt((a-b)^T S^-1 (a-b))` with `S` the sample covariance of all
//!   N vectors. A singular `S` is ridge-regularised (see
//!   [`crate::operators::invert_regularised`]) and flagged.
//!
//! ## Density normalisation
//! Optional rescaling by local k-NN density:
//! `d'(i,j) = d(i,j) * r̄ / sqrt(r_i * r_j)` where `r_i` is the distance from `i`
//! to its k-th nearest neighbour and `r̄` the geometric mean of all `r_i`.
//! Symmetric, non-negative, and the identity when every `r_i` is equal.
//!
//! ## Layout
//! Each unordered pair is computed once (rows of the upper triangle in parallel)
//! and mirrored into a dense row-major N×N buffer with a zero diagonal.

use std::fmt;
use std::str::FromStr;

use log::{debug, info, trace, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TopoError};
use crate::operators::{covariance, euclidean_dist, invert_regularised, mahalanobis_dist, norm};

/// Distance assigned to pairs involving a zero-norm vector under the cosine metric.
pub const DEGENERATE_COSINE_DISTANCE: f64 = 1.0;
/// Norms at or below this are treated as zero.
pub const ZERO_NORM: f64 = 1e-12;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Euclidean,
    Cosine,
    Mahalanobis,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Euclidean, Metric::Cosine, Metric::Mahalanobis];

    pub fn name(&self) -> &'static str {
        match self {
            Metric::Euclidean => "euclidean",
            Metric::Cosine => "cosine",
            Metric::Mahalanobis => "mahalanobis",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = TopoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "euclidean" => Ok(Metric::Euclidean),
            "cosine" => Ok(Metric::Cosine),
            "mahalanobis" => Ok(Metric::Mahalanobis),
            other => Err(TopoError::invalid_parameter(format!("unknown metric '{}'", other))),
        }
    }
}

/// A numeric fallback applied while building a matrix. Carried into the artifact.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NumericFlag {
    /// Zero-norm vector under the cosine metric; its pairs use `DEGENERATE_COSINE_DISTANCE`.
    DegenerateVector { query: usize },
    /// Covariance was singular; `ridge` was added to its diagonal.
    RegularisedCovariance { ridge: f64 },
    /// Query with a zero k-NN radius; density normalisation used the global radius for it.
    DensityFloor { query: usize },
}

#[derive(Clone, Debug)]
pub struct DistanceOptions {
    /// Relative ridge for Mahalanobis regularisation (scaled by mean variance).
    pub covariance_ridge: f64,
    /// Neighbour rank for density normalisation; `None` disables it.
    pub density_k: Option<usize>,
}

impl Default for DistanceOptions {
    fn default() -> Self {
        Self {
            covariance_ridge: 1e-6,
            density_k: None,
        }
    }
}

/// Summary of the off-diagonal entries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DistanceSummary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
}

/// Symmetric N×N matrix with zero diagonal, immutable once built.
#[derive(Clone, Debug, PartialEq)]
pub struct DistanceMatrix {
    metric: Metric,
    n: usize,
    data: Vec<f64>,
    flags: Vec<NumericFlag>,
    density_normalised: bool,
}

impl DistanceMatrix {
    /// Build from a full square matrix, validating symmetry, zero diagonal and
    /// non-negative finite entries.
    pub fn from_square(metric: Metric, rows: Vec<Vec<f64>>) -> Result<Self> {
        let n = rows.len();
        let mut data = Vec::with_capacity(n * n);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != n {
                return Err(TopoError::dimension_mismatch(i, n, row.len()));
            }
            data.extend_from_slice(row);
        }
        for i in 0..n {
            if data[i * n + i] != 0.0 {
                return Err(TopoError::invalid_parameter(format!("non-zero diagonal at {}", i)));
            }
            for j in (i + 1)..n {
                let (a, b) = (data[i * n + j], data[j * n + i]);
                if !a.is_finite() || a < 0.0 || (a - b).abs() > 1e-12 * a.abs().max(1.0) {
                    return Err(TopoError::invalid_parameter(format!(
                        "entry ({}, {}) is not a symmetric non-negative distance",
                        i, j
                    )));
                }
            }
        }
        Ok(Self {
            metric,
            n,
            data,
            flags: Vec::new(),
            density_normalised: false,
        })
    }

    fn from_upper(metric: Metric, n: usize, upper: Vec<Vec<f64>>, flags: Vec<NumericFlag>) -> Self {
        let mut data = vec![0.0; n * n];
        for (i, row) in upper.into_iter().enumerate() {
            for (offset, d) in row.into_iter().enumerate() {
                let j = i + 1 + offset;
                data[i * n + j] = d;
                data[j * n + i] = d;
            }
        }
        Self {
            metric,
            n,
            data,
            flags,
            density_normalised: false,
        }
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.n + j]
    }

    #[inline]
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.n..(i + 1) * self.n]
    }

    #[inline]
    pub fn n(&self) -> usize {
        self.n
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn flags(&self) -> &[NumericFlag] {
        &self.flags
    }

    pub fn is_density_normalised(&self) -> bool {
        self.density_normalised
    }

    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        (0..self.n).map(|i| self.row(i).to_vec()).collect()
    }

    /// Upper-triangle entries in row order.
    pub fn off_diagonal(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.n).flat_map(move |i| ((i + 1)..self.n).map(move |j| self.get(i, j)))
    }

    pub fn summary(&self) -> DistanceSummary {
        let mut v: Vec<f64> = self.off_diagonal().collect();
        if v.is_empty() {
            return DistanceSummary::default();
        }
        v.sort_by(|a, b| a.total_cmp(b));
        let len = v.len();
        let median = if len % 2 == 1 {
            v[len / 2]
        } else {
            0.5 * (v[len / 2 - 1] + v[len / 2])
        };
        DistanceSummary {
            min: v[0],
            max: v[len - 1],
            mean: v.iter().sum::<f64>() / len as f64,
            median,
        }
    }
}

/// Strict cosine distance between rows `i` and `j`.
pub fn cosine_distance(rows: &[Vec<f64>], i: usize, j: usize) -> Result<f64> {
    let (a, b) = (&rows[i], &rows[j]);
    cosine_with_norms(a, b, norm(a), norm(b), i, j)
}

#[inline]
fn cosine_with_norms(a: &[f64], b: &[f64], na: f64, nb: f64, i: usize, j: usize) -> Result<f64> {
    if na <= ZERO_NORM {
        return Err(TopoError::DegenerateVector { query: i });
    }
    if nb <= ZERO_NORM {
        return Err(TopoError::DegenerateVector { query: j });
    }
    let sim = (crate::operators::dot(a, b) / (na * nb)).clamp(-1.0, 1.0);
    Ok((1.0 - sim).clamp(0.0, 2.0))
}

fn validate_rows(rows: &[Vec<f64>]) -> Result<usize> {
    let d = rows.first().map(|r| r.len()).unwrap_or(0);
    for (i, row) in rows.iter().enumerate() {
        if row.len() != d {
            return Err(TopoError::dimension_mismatch(i, d, row.len()));
        }
        if row.iter().any(|v| !v.is_finite()) {
            return Err(TopoError::invalid_vector(i, "non-finite value"));
        }
    }
    Ok(d)
}

fn upper_triangle<F>(n: usize, pair: F) -> Vec<Vec<f64>>
where
    F: Fn(usize, usize) -> f64 + Sync,
{
    (0..n)
        .into_par_iter()
        .map(|i| ((i + 1)..n).map(|j| pair(i, j)).collect())
        .collect()
}

/// Compute the pairwise distance matrix of `rows` under `metric`.
pub fn compute_distance_matrix(
    rows: &[Vec<f64>],
    metric: Metric,
    options: &DistanceOptions,
) -> Result<DistanceMatrix> {
    let n = rows.len();
    let d = validate_rows(rows)?;
    info!("Computing {} distance matrix: N={}, D={}", metric, n, d);

    let mut flags = Vec::new();
    let upper = match metric {
        Metric::Euclidean => upper_triangle(n, |i, j| euclidean_dist(&rows[i], &rows[j])),
        Metric::Cosine => {
            let norms: Vec<f64> = rows.par_iter().map(|r| norm(r)).collect();
            for (q, &nq) in norms.iter().enumerate() {
                if nq <= ZERO_NORM {
                    warn!(
                        "query {} has a zero-norm vector; cosine pairs use distance {}",
                        q, DEGENERATE_COSINE_DISTANCE
                    );
                    flags.push(NumericFlag::DegenerateVector { query: q });
                }
            }
            upper_triangle(n, |i, j| {
                cosine_with_norms(&rows[i], &rows[j], norms[i], norms[j], i, j)
                    .unwrap_or(DEGENERATE_COSINE_DISTANCE)
            })
        }
        Metric::Mahalanobis => {
            let cov = covariance(rows);
            let (inv, ridge) = invert_regularised(&cov, options.covariance_ridge)?;
            if let Some(ridge) = ridge {
                warn!("mahalanobis: covariance regularised with ridge {:.3e}", ridge);
                flags.push(NumericFlag::RegularisedCovariance { ridge });
            }
            upper_triangle(n, |i, j| mahalanobis_dist(&rows[i], &rows[j], &inv))
        }
    };

    let matrix = DistanceMatrix::from_upper(metric, n, upper, flags);
    debug!("{} matrix summary: {:?}", metric, matrix.summary());

    match options.density_k {
        Some(k) => Ok(density_normalise(&matrix, k)),
        None => Ok(matrix),
    }
}

/// k-th nearest-neighbour distance of every point (k clamped to `1..=n-1`).
pub fn knn_radii(matrix: &DistanceMatrix, k: usize) -> Vec<f64> {
    let n = matrix.n();
    if n < 2 {
        return vec![0.0; n];
    }
    let k = k.clamp(1, n - 1);
    (0..n)
        .into_par_iter()
        .map(|i| {
            let mut others: Vec<f64> = matrix
                .row(i)
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(_, &d)| d)
                .collect();
            others.select_nth_unstable_by(k - 1, |a, b| a.total_cmp(b));
            others[k - 1]
        })
        .collect()
}

/// Rescale distances by local k-NN density (see module docs).
pub fn density_normalise(matrix: &DistanceMatrix, k: usize) -> DistanceMatrix {
    let n = matrix.n();
    let mut out = matrix.clone();
    out.density_normalised = true;
    if n < 3 {
        debug!("density normalisation skipped for N={}", n);
        return out;
    }

    let radii = knn_radii(matrix, k);
    let positive: Vec<f64> = radii.iter().copied().filter(|&r| r > ZERO_NORM).collect();
    if positive.is_empty() {
        warn!("density normalisation: all k-NN radii are zero, leaving distances unchanged");
        return out;
    }
    let global = (positive.iter().map(|r| r.ln()).sum::<f64>() / positive.len() as f64).exp();

    let effective: Vec<f64> = radii
        .iter()
        .enumerate()
        .map(|(q, &r)| {
            if r > ZERO_NORM {
                r
            } else {
                out.flags.push(NumericFlag::DensityFloor { query: q });
                global
            }
        })
        .collect();
    trace!("k-NN radii (k={}): {:?}", k, effective);

    for i in 0..n {
        for j in (i + 1)..n {
            let scaled = matrix.get(i, j) * global / (effective[i] * effective[j]).sqrt();
            out.data[i * n + j] = scaled;
            out.data[j * n + i] = scaled;
        }
    }
    info!("density-normalised {} matrix with k={} (global radius {:.4})", matrix.metric(), k, global);
    out
}
