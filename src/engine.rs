//! TopoEngine: a (run, metric)-keyed cache over the pure analysis pipeline.
//!
//! The engine owns the immutable feature store and the prepared (optionally
//! standardised) rows of one run. Each metric's [`MetricAnalysis`] is computed on
//! first use and shared as an `Arc`; concurrent callers may race to compute the
//! same metric, in which case the first inserted result wins. A full run fans the
//! configured metrics out with rayon and isolates failures per metric.

use std::sync::Arc;

use dashmap::DashMap;
use log::{debug, info, warn};
use rayon::prelude::*;

use crate::analysis::{analyse_metric, prepare_rows, AnalysisParams, MetricAnalysis};
use crate::artifact::{MetricArtifact, RunArtifact};
use crate::core::FeatureStore;
use crate::distance::Metric;
use crate::error::{Result, TopoError};
use crate::evolution::partition_at;
use crate::recommend::{recommend_from, recommend_within, Recommendation};

pub struct TopoEngine {
    run_id: String,
    store: Arc<FeatureStore>,
    rows: Arc<Vec<Vec<f64>>>,
    params: AnalysisParams,
    cache: DashMap<Metric, Arc<MetricAnalysis>>,
}

impl TopoEngine {
    pub fn new(run_id: impl Into<String>, store: FeatureStore, params: AnalysisParams) -> Result<Self> {
        params.validate()?;
        if let Some(sources) = &params.recommend_for {
            if let Some(&bad) = sources.iter().find(|&&s| s >= store.len()) {
                return Err(TopoError::UnknownQuery { query: bad });
            }
        }

        let rows = prepare_rows(&store, &params)?;
        let run_id = run_id.into();
        info!(
            "Engine {} ready: N={}, D={}, metrics={:?}",
            run_id,
            store.len(),
            store.dimensionality(),
            params.metrics
        );
        Ok(Self {
            run_id,
            store: Arc::new(store),
            rows: Arc::new(rows),
            params,
            cache: DashMap::new(),
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn store(&self) -> &FeatureStore {
        &self.store
    }

    pub fn params(&self) -> &AnalysisParams {
        &self.params
    }

    /// Rows as fed to the distance engine.
    pub fn prepared_rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn cached_metrics(&self) -> Vec<Metric> {
        let mut metrics: Vec<Metric> = self.cache.iter().map(|e| *e.key()).collect();
        metrics.sort();
        metrics
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// The analysis for `metric`, computing it if absent.
    pub fn analysis(&self, metric: Metric) -> Result<Arc<MetricAnalysis>> {
        if let Some(hit) = self.cache.get(&metric) {
            debug!("cache hit for ({}, {})", self.run_id, metric);
            return Ok(hit.value().clone());
        }
        let computed = Arc::new(analyse_metric(&self.rows, metric, &self.params)?);
        Ok(self.cache.entry(metric).or_insert(computed).value().clone())
    }

    /// Top-`top_k` queries closest to `source` under `metric`, with explanations.
    pub fn recommend(&self, source: usize, metric: Metric, top_k: usize) -> Result<Recommendation> {
        self.store.query(source)?;
        let analysis = self.analysis(metric)?;
        recommend_from(&self.store, &analysis.distances, Some(&analysis.evolution), source, top_k)
    }

    /// As [`TopoEngine::recommend`], restricted to `source`'s cluster at `threshold`.
    pub fn recommend_within_cluster(
        &self,
        source: usize,
        metric: Metric,
        top_k: usize,
        threshold: f64,
    ) -> Result<Recommendation> {
        self.store.query(source)?;
        let analysis = self.analysis(metric)?;
        let partition = partition_at(&analysis.distances, threshold);
        recommend_within(
            &self.store,
            &analysis.distances,
            Some(&analysis.evolution),
            &partition,
            source,
            top_k,
        )
    }

    fn metric_artifact(&self, metric: Metric) -> Result<MetricArtifact> {
        let analysis = self.analysis(metric)?;
        let sources: Vec<usize> = match &self.params.recommend_for {
            Some(s) => s.clone(),
            None => (0..self.store.len()).collect(),
        };
        let recommendations = sources
            .into_iter()
            .map(|s| {
                recommend_from(
                    &self.store,
                    &analysis.distances,
                    Some(&analysis.evolution),
                    s,
                    self.params.top_k,
                )
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(MetricArtifact::from_analysis(
            &analysis,
            recommendations,
            self.params.include_distance_matrix,
        ))
    }

    /// Analyse every configured metric in parallel and assemble the run artifact.
    pub fn run(&self) -> RunArtifact {
        info!("Running {} metrics for {}", self.params.metrics.len(), self.run_id);
        let outcomes: Vec<(Metric, Result<MetricArtifact>)> = self
            .params
            .metrics
            .par_iter()
            .map(|&m| (m, self.metric_artifact(m)))
            .collect();

        let mut artifact = RunArtifact {
            run_id: self.run_id.clone(),
            n_queries: self.store.len(),
            dimensionality: self.store.dimensionality(),
            feature_names: self.store.layout().names(),
            params: self.params.clone(),
            metrics: Default::default(),
            failures: Default::default(),
        };
        for (metric, outcome) in outcomes {
            match outcome {
                Ok(m) => {
                    artifact.metrics.insert(metric.name().to_string(), m);
                }
                Err(e) => {
                    warn!("metric {} failed: {}", metric, e);
                    artifact.failures.insert(metric.name().to_string(), e.to_string());
                }
            }
        }
        info!(
            "Run {} complete: {} metrics ok, {} failed",
            self.run_id,
            artifact.metrics.len(),
            artifact.failures.len()
        );
        artifact
    }
}
