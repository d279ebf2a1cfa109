//! Per-metric analysis pipeline as a pure function.
//!
//! `analyse_metric` runs Distance -> Filtration -> Threshold selection -> Cluster
//! evolution for one metric over prepared rows and returns an immutable
//! [`MetricAnalysis`]. Nothing is shared between metrics, so callers may run
//! several metrics in parallel.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::core::FeatureStore;
use crate::distance::{compute_distance_matrix, DistanceMatrix, DistanceOptions, Metric};
use crate::error::{Result, TopoError};
use crate::evolution::{compute_cluster_evolution, ClusterEvolution};
use crate::filtration::{
    compute_persistence_from_edges, FiltrationEdges, PersistenceDiagram, PersistenceStatistics,
};
use crate::thresholds::{select_thresholds, Threshold, ThresholdParams};

/// Run configuration. Deserialisable from JSON; missing fields take defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisParams {
    pub metrics: Vec<Metric>,
    /// z-score feature columns before computing distances.
    pub standardise: bool,
    /// Neighbour rank for density normalisation; `None` disables it.
    pub density_k: Option<usize>,
    /// 0: components only; 1: also display-only loops.
    pub max_dimension: usize,
    pub thresholds: ThresholdParams,
    pub top_k: usize,
    /// Sources to recommend for in a full run; `None` means every query.
    pub recommend_for: Option<Vec<usize>>,
    /// Embed full distance matrices in the artifact.
    pub include_distance_matrix: bool,
    /// Relative ridge for Mahalanobis regularisation.
    pub covariance_ridge: f64,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self {
            metrics: Metric::ALL.to_vec(),
            standardise: true,
            density_k: None,
            max_dimension: 1,
            thresholds: ThresholdParams::default(),
            top_k: 3,
            recommend_for: None,
            include_distance_matrix: false,
            covariance_ridge: 1e-6,
        }
    }
}

impl AnalysisParams {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let params: AnalysisParams = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        if self.metrics.is_empty() {
            return Err(TopoError::invalid_parameter("at least one metric is required"));
        }
        if self.max_dimension > 1 {
            return Err(TopoError::invalid_parameter(format!(
                "max_dimension must be 0 or 1, got {}",
                self.max_dimension
            )));
        }
        if self.density_k == Some(0) {
            return Err(TopoError::invalid_parameter("density_k must be at least 1"));
        }
        if !(self.covariance_ridge.is_finite() && self.covariance_ridge > 0.0) {
            return Err(TopoError::invalid_parameter(format!(
                "covariance_ridge must be positive, got {}",
                self.covariance_ridge
            )));
        }
        self.thresholds.validate()
    }

    pub fn distance_options(&self) -> DistanceOptions {
        DistanceOptions {
            covariance_ridge: self.covariance_ridge,
            density_k: self.density_k,
        }
    }
}

/// Everything derived for one (run, metric) pair.
#[derive(Clone, Debug)]
pub struct MetricAnalysis {
    pub metric: Metric,
    pub distances: DistanceMatrix,
    pub diagram: PersistenceDiagram,
    pub statistics: PersistenceStatistics,
    pub thresholds: Vec<Threshold>,
    pub evolution: ClusterEvolution,
}

/// Rows fed to the distance engine: standardised or raw, per `params`.
pub fn prepare_rows(store: &FeatureStore, params: &AnalysisParams) -> Result<Vec<Vec<f64>>> {
    if params.standardise {
        store.standardised_rows()
    } else {
        Ok(store.rows().to_vec())
    }
}

pub fn analyse_metric(rows: &[Vec<f64>], metric: Metric, params: &AnalysisParams) -> Result<MetricAnalysis> {
    info!("Analysing metric {} over {} queries", metric, rows.len());

    let distances = compute_distance_matrix(rows, metric, &params.distance_options())?;
    let edges = FiltrationEdges::from_matrix(&distances);
    let diagram = compute_persistence_from_edges(&distances, &edges, params.max_dimension);
    let statistics = diagram.statistics();
    debug!(
        "{}: {} features ({} finite)",
        metric, statistics.total_features, statistics.finite_features
    );

    let thresholds = select_thresholds(&diagram, &params.thresholds);
    let values: Vec<f64> = thresholds.iter().map(|t| t.value).collect();
    let evolution = compute_cluster_evolution(&edges, &values)?;

    info!(
        "{} analysis complete: {} thresholds, cluster counts {:?}",
        metric,
        thresholds.len(),
        thresholds.iter().map(|t| t.cluster_count).collect::<Vec<_>>()
    );
    Ok(MetricAnalysis {
        metric,
        distances,
        diagram,
        statistics,
        thresholds,
        evolution,
    })
}
