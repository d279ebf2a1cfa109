//! Threshold selection policies over the dimension-0 death times.
//!
//! API:
//! - `ThresholdStrategy`: policy enum
//! - `select_thresholds(&PersistenceDiagram, &ThresholdParams) -> Vec<Threshold>`
//! - `cluster_count_curve(&PersistenceDiagram)`: the step function C(t)
//!
//! Death times within `rel_tolerance` of each other are grouped into one candidate
//! (its largest value, so C(t) at the candidate accounts for the whole group).
//! The smallest and largest candidates are always selected.
//!
//! `MaxDecrease` (default) scores each interior candidate by the cluster-count drop
//! it causes divided by its distance to the previous candidate, and keeps the
//! candidates scoring at least the mean, bounded by `[min_count, max_count]`.
//! `Uniform` picks `max_count` candidates evenly spaced by rank.
//!
//! With no finite death (N ≤ 1) or a single candidate (every point merges at the
//! same distance) one threshold is returned.

use log::{debug, info, trace};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TopoError};
use crate::filtration::{extract_death_thresholds, PersistenceDiagram};

/// Absolute slack added to the relative tolerance; keeps zero deaths grouped.
const ABS_TOLERANCE: f64 = 1e-12;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdStrategy {
    #[default]
    MaxDecrease,
    Uniform,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdParams {
    pub strategy: ThresholdStrategy,
    pub min_count: usize,
    pub max_count: usize,
    pub rel_tolerance: f64,
}

impl Default for ThresholdParams {
    fn default() -> Self {
        Self {
            strategy: ThresholdStrategy::MaxDecrease,
            min_count: 4,
            max_count: 6,
            rel_tolerance: 1e-3,
        }
    }
}

impl ThresholdParams {
    pub fn validate(&self) -> Result<()> {
        if self.min_count == 0 || self.max_count < self.min_count {
            return Err(TopoError::invalid_parameter(format!(
                "threshold counts must satisfy 1 <= min ({}) <= max ({})",
                self.min_count, self.max_count
            )));
        }
        if !(self.rel_tolerance.is_finite() && self.rel_tolerance >= 0.0) {
            return Err(TopoError::invalid_parameter(format!(
                "rel_tolerance must be finite and non-negative, got {}",
                self.rel_tolerance
            )));
        }
        Ok(())
    }
}

/// A selected distance scale and the cluster count C(t) there.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub value: f64,
    pub cluster_count: usize,
}

#[derive(Clone, Copy, Debug)]
struct Candidate {
    value: f64,
    drop: usize,
}

#[inline]
fn nearly_equal(a: f64, b: f64, rel_tolerance: f64) -> bool {
    (a - b).abs() <= rel_tolerance * a.abs().max(b.abs()) + ABS_TOLERANCE
}

fn candidates(deaths: &[f64], rel_tolerance: f64) -> Vec<Candidate> {
    let mut out: Vec<Candidate> = Vec::new();
    let mut group_start = f64::NAN;
    for &d in deaths {
        if let Some(last) = out.last_mut() {
            if nearly_equal(group_start, d, rel_tolerance) {
                last.value = d;
                last.drop += 1;
                continue;
            }
        }
        group_start = d;
        out.push(Candidate { value: d, drop: 1 });
    }
    out
}

/// The step function C(t) evaluated at every distinct death time, plus `(0, C(0))`.
pub fn cluster_count_curve(diagram: &PersistenceDiagram) -> Vec<(f64, usize)> {
    let deaths = extract_death_thresholds(diagram, 0);
    let mut curve = vec![(0.0, diagram.cluster_count_at(0.0))];
    for c in candidates(&deaths, 0.0) {
        if c.value > 0.0 {
            curve.push((c.value, diagram.cluster_count_at(c.value)));
        }
    }
    curve
}

/// Pick a small set of representative thresholds from the dimension-0 deaths.
pub fn select_thresholds(diagram: &PersistenceDiagram, params: &ThresholdParams) -> Vec<Threshold> {
    let deaths = extract_death_thresholds(diagram, 0);
    let cands = candidates(&deaths, params.rel_tolerance);
    info!(
        "Selecting thresholds ({:?}) from {} deaths, {} candidates",
        params.strategy,
        deaths.len(),
        cands.len()
    );

    let at = |value: f64| Threshold {
        value,
        cluster_count: diagram.cluster_count_at(value),
    };

    if cands.is_empty() {
        debug!("no finite deaths; single threshold at 0");
        return vec![at(0.0)];
    }
    if cands.len() == 1 {
        debug!("all points merge at {:.6}; single threshold", cands[0].value);
        return vec![at(cands[0].value)];
    }

    let max_count = params.max_count.max(1);
    let min_count = params.min_count.clamp(1, max_count);

    let mut picked: Vec<usize> = match params.strategy {
        ThresholdStrategy::MaxDecrease => max_decrease(&cands, min_count, max_count),
        ThresholdStrategy::Uniform => uniform(cands.len(), max_count),
    };
    picked.sort_unstable();
    picked.dedup();

    let selected: Vec<Threshold> = picked.into_iter().map(|k| at(cands[k].value)).collect();
    for t in &selected {
        trace!("threshold {:.6} -> {} clusters", t.value, t.cluster_count);
    }
    debug!("selected {} thresholds", selected.len());
    selected
}

fn max_decrease(cands: &[Candidate], min_count: usize, max_count: usize) -> Vec<usize> {
    let last = cands.len() - 1;
    if max_count == 1 {
        return vec![last];
    }

    let mut interior: Vec<(usize, f64)> = (1..last)
        .map(|k| {
            let gap = (cands[k].value - cands[k - 1].value).max(ABS_TOLERANCE);
            (k, cands[k].drop as f64 / gap)
        })
        .collect();
    interior.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

    let mean = if interior.is_empty() {
        0.0
    } else {
        interior.iter().map(|(_, s)| s).sum::<f64>() / interior.len() as f64
    };
    let above_mean = interior.iter().filter(|(_, s)| *s >= mean).count();
    let keep = above_mean
        .max(min_count.saturating_sub(2))
        .min(max_count - 2)
        .min(interior.len());

    let mut picked = vec![0, last];
    picked.extend(interior.iter().take(keep).map(|(k, _)| *k));
    picked
}

fn uniform(n_candidates: usize, max_count: usize) -> Vec<usize> {
    let last = n_candidates - 1;
    let layers = max_count.min(n_candidates);
    if layers == 1 {
        return vec![last];
    }
    (0..layers)
        .map(|i| ((i as f64 / (layers - 1) as f64) * last as f64).round() as usize)
        .collect()
}
