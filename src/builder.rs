use crate::analysis::AnalysisParams;
use crate::core::FeatureStore;
use crate::distance::Metric;
use crate::engine::TopoEngine;
use crate::error::Result;
use crate::thresholds::{ThresholdParams, ThresholdStrategy};

// Add logging
use log::{debug, info};

pub struct TopoEngineBuilder {
    run_id: String,
    params: AnalysisParams,
}

impl Default for TopoEngineBuilder {
    fn default() -> Self {
        debug!("Creating TopoEngineBuilder with default parameters");
        Self {
            run_id: "run".to_string(),
            params: AnalysisParams::default(),
        }
    }
}

impl TopoEngineBuilder {
    pub fn new() -> Self {
        info!("Initializing new TopoEngineBuilder");
        Self::default()
    }

    /// Start from a full parameter set (e.g. loaded with `AnalysisParams::from_json_str`).
    pub fn with_params(mut self, params: AnalysisParams) -> Self {
        debug!("Using explicit analysis parameters: {:?}", params);
        self.params = params;
        self
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    // -------------------- Distance configuration --------------------

    pub fn with_metrics(mut self, metrics: &[Metric]) -> Self {
        info!("Configuring metrics: {:?}", metrics);
        self.params.metrics = metrics.to_vec();
        self
    }

    /// z-score feature columns before distances (default: on).
    pub fn with_standardisation(mut self, standardise: bool) -> Self {
        info!("Setting standardisation: {}", standardise);
        self.params.standardise = standardise;
        self
    }

    /// Rescale distances by the k-th nearest-neighbour radius of each endpoint.
    pub fn with_density_normalisation(mut self, k: usize) -> Self {
        info!("Enabling density normalisation with k={}", k);
        self.params.density_k = Some(k);
        self
    }

    pub fn with_covariance_ridge(mut self, ridge: f64) -> Self {
        self.params.covariance_ridge = ridge;
        self
    }

    // -------------------- Filtration / thresholds --------------------

    /// 0 for components only; 1 also tracks display-only loops.
    pub fn with_max_dimension(mut self, max_dimension: usize) -> Self {
        info!("Setting max homology dimension: {}", max_dimension);
        self.params.max_dimension = max_dimension;
        self
    }

    pub fn with_thresholds(mut self, thresholds: ThresholdParams) -> Self {
        info!("Configuring thresholds: {:?}", thresholds);
        self.params.thresholds = thresholds;
        self
    }

    pub fn with_threshold_strategy(mut self, strategy: ThresholdStrategy) -> Self {
        self.params.thresholds.strategy = strategy;
        self
    }

    // -------------------- Recommendations / output --------------------

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.params.top_k = top_k;
        self
    }

    /// Restrict full-run recommendations to these sources.
    pub fn with_recommendations_for(mut self, sources: Vec<usize>) -> Self {
        self.params.recommend_for = Some(sources);
        self
    }

    pub fn with_distance_matrices(mut self, include: bool) -> Self {
        self.params.include_distance_matrix = include;
        self
    }

    // -------------------- Build --------------------

    /// Validate the configuration, prepare the rows and return the engine.
    ///
    /// Nothing is computed per metric until it is first requested.
    pub fn build(self, store: FeatureStore) -> Result<TopoEngine> {
        info!(
            "Building engine {} from {} queries with {} features",
            self.run_id,
            store.len(),
            store.dimensionality()
        );
        debug!("Build configuration: {:?}", self.params);
        TopoEngine::new(self.run_id, store, self.params)
    }
}
