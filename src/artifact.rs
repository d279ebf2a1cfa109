//! Persisted run artifact consumed by reporting and plotting tools.
//!
//! One record per run; per metric (keyed by metric name) the same shape:
//! distance summary (optionally the full matrix), persistence triples with an
//! explicit `"unbounded"` death sentinel, lifetime statistics, the C(t) curve,
//! selected thresholds with cluster counts, per-level cluster sizes and flows,
//! ranked recommendations per source query, and every numeric fallback applied.
//! Metrics that failed are listed under `failures` with their error message.
//!
//! Union-find state never leaves the engine: levels expose assignments and sizes only.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::analysis::{AnalysisParams, MetricAnalysis};
use crate::distance::{DistanceSummary, Metric, NumericFlag};
use crate::error::Result;
use crate::evolution::ClusterFlow;
use crate::filtration::{PersistenceFeature, PersistenceStatistics};
use crate::recommend::{Recommendation, RecommendationEntry};
use crate::thresholds::{cluster_count_curve, Threshold};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LevelArtifact {
    pub threshold: f64,
    pub n_clusters: usize,
    pub cluster_sizes: Vec<usize>,
    pub assignments: Vec<usize>,
    /// Flows into the next level; empty for the last one.
    pub flows_to_next: Vec<ClusterFlow>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricArtifact {
    pub metric: Metric,
    pub density_normalised: bool,
    pub distance_summary: DistanceSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_matrix: Option<Vec<Vec<f64>>>,
    pub persistence: Vec<PersistenceFeature>,
    pub statistics: PersistenceStatistics,
    pub cluster_count_curve: Vec<(f64, usize)>,
    pub thresholds: Vec<Threshold>,
    pub levels: Vec<LevelArtifact>,
    pub recommendations: BTreeMap<usize, Vec<RecommendationEntry>>,
    pub numeric_flags: Vec<NumericFlag>,
}

impl MetricArtifact {
    pub fn from_analysis(analysis: &MetricAnalysis, recommendations: Vec<Recommendation>, include_matrix: bool) -> Self {
        let levels = analysis.evolution.levels();
        let flows = analysis.evolution.flows();
        let levels = levels
            .iter()
            .enumerate()
            .map(|(i, p)| LevelArtifact {
                threshold: p.threshold(),
                n_clusters: p.n_clusters(),
                cluster_sizes: p.sizes(),
                assignments: p.assignments().to_vec(),
                flows_to_next: flows.get(i).cloned().unwrap_or_default(),
            })
            .collect();

        Self {
            metric: analysis.metric,
            density_normalised: analysis.distances.is_density_normalised(),
            distance_summary: analysis.distances.summary(),
            distance_matrix: include_matrix.then(|| analysis.distances.to_rows()),
            persistence: analysis.diagram.features().to_vec(),
            statistics: analysis.statistics.clone(),
            cluster_count_curve: cluster_count_curve(&analysis.diagram),
            thresholds: analysis.thresholds.clone(),
            levels,
            recommendations: recommendations
                .into_iter()
                .map(|r| (r.source, r.entries))
                .collect(),
            numeric_flags: analysis.distances.flags().to_vec(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunArtifact {
    pub run_id: String,
    pub n_queries: usize,
    pub dimensionality: usize,
    pub feature_names: Vec<String>,
    pub params: AnalysisParams,
    pub metrics: BTreeMap<String, MetricArtifact>,
    pub failures: BTreeMap<String, String>,
}

impl RunArtifact {
    pub fn metric(&self, metric: Metric) -> Option<&MetricArtifact> {
        self.metrics.get(metric.name())
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn write_json<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn read_json<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_json(&mut writer)?;
        writer.flush()?;
        info!("Run artifact {} written to {}", self.run_id, path.display());
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::read_json(BufReader::new(File::open(path)?))
    }
}
