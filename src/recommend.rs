//! Distance-ranked recommendations with feature-overlap explanations.
//!
//! Ranking: every other query ordered by `(distance to source, ordinal)`,
//! truncated to `top_k`. Explanations are derived afterwards from the raw feature
//! vectors and query metadata and never influence the order.

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::core::{FeatureGroup, FeatureKind, FeatureStore};
use crate::distance::{DistanceMatrix, Metric};
use crate::error::{Result, TopoError};
use crate::evolution::{ClusterEvolution, ClusterPartition};

/// Feature names shown per group in the explanation text.
pub const MAX_NAMED_FEATURES: usize = 3;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecommendationEntry {
    pub target: usize,
    pub distance: f64,
    pub explanation: String,
    /// Discrete features (structural and semantic) non-zero in both vectors.
    pub shared_features: Vec<String>,
    /// Smallest tracked threshold at which source and target share a cluster.
    pub co_cluster_threshold: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub source: usize,
    pub metric: Metric,
    pub entries: Vec<RecommendationEntry>,
}

impl Recommendation {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn targets(&self) -> Vec<usize> {
        self.entries.iter().map(|e| e.target).collect()
    }
}

/// Overlap between two queries, before rendering.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Explanation {
    pub shared_structural: Vec<String>,
    pub shared_semantic: Vec<String>,
    pub same_owner: Option<String>,
    pub shared_tags: Vec<String>,
    pub co_cluster_threshold: Option<f64>,
}

impl Explanation {
    pub fn between(store: &FeatureStore, source: usize, target: usize, co_cluster_threshold: Option<f64>) -> Result<Self> {
        let (a, b) = (store.row(source)?, store.row(target)?);
        let (qa, qb) = (store.query(source)?, store.query(target)?);

        let mut shared_structural = Vec::new();
        let mut shared_semantic = Vec::new();
        for (dim, spec) in store.layout().specs().iter().enumerate() {
            if spec.kind != FeatureKind::Discrete || a[dim] == 0.0 || b[dim] == 0.0 {
                continue;
            }
            match spec.group {
                FeatureGroup::Structural => shared_structural.push(spec.name.clone()),
                FeatureGroup::Semantic => shared_semantic.push(spec.name.clone()),
                FeatureGroup::Contextual => {}
            }
        }
        shared_structural.sort();
        shared_semantic.sort();

        let same_owner = (!qa.owner.is_empty() && qa.owner == qb.owner).then(|| qa.owner.clone());
        let mut shared_tags: Vec<String> = qa.tags.iter().filter(|t| qb.tags.contains(t)).cloned().collect();
        shared_tags.sort();
        shared_tags.dedup();

        Ok(Self {
            shared_structural,
            shared_semantic,
            same_owner,
            shared_tags,
            co_cluster_threshold,
        })
    }

    pub fn shared_features(&self) -> Vec<String> {
        self.shared_structural
            .iter()
            .chain(self.shared_semantic.iter())
            .cloned()
            .collect()
    }

    pub fn render(&self, metric: Metric, distance: f64) -> String {
        let named = |names: &[String]| names.iter().take(MAX_NAMED_FEATURES).cloned().collect::<Vec<_>>().join(", ");

        let mut parts = Vec::new();
        if !self.shared_tags.is_empty() {
            parts.push(format!("same query pattern ({})", self.shared_tags.join(", ")));
        }
        if !self.shared_structural.is_empty() {
            parts.push(format!("share structural features: {}", named(&self.shared_structural)));
        }
        if !self.shared_semantic.is_empty() {
            parts.push(format!("share semantic features: {}", named(&self.shared_semantic)));
        }
        if let Some(owner) = &self.same_owner {
            parts.push(format!("same analyst ({})", owner));
        }
        if let Some(t) = self.co_cluster_threshold {
            parts.push(format!("same cluster from threshold {:.3}", t));
        }
        if parts.is_empty() {
            parts.push("topologically similar query structure".to_string());
        }

        format!(
            "Topologically similar ({} distance: {:.3}): {}",
            metric,
            distance,
            parts.join("; ")
        )
    }
}

/// The `top_k` nearest other queries as `(ordinal, distance)`, ascending.
pub fn rank_neighbours(matrix: &DistanceMatrix, source: usize, top_k: usize) -> Result<Vec<(usize, f64)>> {
    rank_among(matrix, source, top_k, 0..matrix.n())
}

fn rank_among(
    matrix: &DistanceMatrix,
    source: usize,
    top_k: usize,
    candidates: impl Iterator<Item = usize>,
) -> Result<Vec<(usize, f64)>> {
    if source >= matrix.n() {
        return Err(TopoError::UnknownQuery { query: source });
    }
    let row = matrix.row(source);
    let mut ranked: Vec<(usize, f64)> = candidates
        .filter(|&j| j != source)
        .map(|j| (j, row[j]))
        .collect();
    ranked.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
    ranked.dedup_by_key(|(j, _)| *j);
    ranked.truncate(top_k);
    Ok(ranked)
}

fn annotate(
    store: &FeatureStore,
    matrix: &DistanceMatrix,
    evolution: Option<&ClusterEvolution>,
    source: usize,
    ranked: Vec<(usize, f64)>,
) -> Result<Recommendation> {
    let metric = matrix.metric();
    let entries = ranked
        .into_iter()
        .map(|(target, distance)| {
            let co = evolution.and_then(|ev| ev.co_cluster_threshold(source, target));
            let explanation = Explanation::between(store, source, target, co)?;
            trace!("{} -> {} ({:.4})", source, target, distance);
            Ok(RecommendationEntry {
                target,
                distance,
                explanation: explanation.render(metric, distance),
                shared_features: explanation.shared_features(),
                co_cluster_threshold: co,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    debug!("{} recommendations for query {} ({})", entries.len(), source, metric);
    Ok(Recommendation {
        source,
        metric,
        entries,
    })
}

fn check_source(store: &FeatureStore, matrix: &DistanceMatrix, source: usize) -> Result<()> {
    store.query(source)?;
    if matrix.n() != store.len() {
        return Err(TopoError::invalid_parameter(format!(
            "distance matrix covers {} queries, store holds {}",
            matrix.n(),
            store.len()
        )));
    }
    Ok(())
}

/// Rank all other queries by distance to `source` and explain the first `top_k`.
pub fn recommend_from(
    store: &FeatureStore,
    matrix: &DistanceMatrix,
    evolution: Option<&ClusterEvolution>,
    source: usize,
    top_k: usize,
) -> Result<Recommendation> {
    check_source(store, matrix, source)?;
    let ranked = rank_neighbours(matrix, source, top_k)?;
    annotate(store, matrix, evolution, source, ranked)
}

/// As [`recommend_from`], restricted to the members of `source`'s cluster in `partition`.
pub fn recommend_within(
    store: &FeatureStore,
    matrix: &DistanceMatrix,
    evolution: Option<&ClusterEvolution>,
    partition: &ClusterPartition,
    source: usize,
    top_k: usize,
) -> Result<Recommendation> {
    check_source(store, matrix, source)?;
    let cluster = partition
        .cluster_of(source)
        .ok_or(TopoError::UnknownQuery { query: source })?;
    let members = partition.members(cluster).to_vec();
    let ranked = rank_among(matrix, source, top_k, members.into_iter())?;
    annotate(store, matrix, evolution, source, ranked)
}
