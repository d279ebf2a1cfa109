//! Cluster evolution across increasing thresholds.
//!
//! - `partition_at`: single-linkage partition of all queries at one threshold.
//! - `IncrementalPartitioner`: continues one union-find across increasing
//!   thresholds over the filtration's sorted edge list (clusters only merge).
//! - `flows_between`: maps every cluster of an earlier partition to the unique
//!   cluster of a later partition that contains it.
//! - `ClusterEvolution`: partitions at the selected thresholds plus the flows
//!   between consecutive levels. Lineage is index based: a cluster at level
//!   `i + 1` refers to the level-`i` clusters it absorbed by their ids.
//!
//! Cluster ids are assigned in order of each cluster's smallest member, so they
//! are deterministic but only meaningful within one partition.

use log::{debug, info, trace};
use serde::{Deserialize, Serialize};

use crate::distance::DistanceMatrix;
use crate::error::{Result, TopoError};
use crate::filtration::{ComponentArena, FiltrationEdges};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClusterPartition {
    threshold: f64,
    /// Query ordinal -> cluster id.
    assignments: Vec<usize>,
    /// Cluster id -> ascending member ordinals.
    clusters: Vec<Vec<usize>>,
}

impl ClusterPartition {
    fn from_arena(arena: &mut ComponentArena, threshold: f64) -> Self {
        let n = arena.len();
        let mut root_to_cluster: Vec<Option<usize>> = vec![None; n];
        let mut assignments = Vec::with_capacity(n);
        let mut clusters: Vec<Vec<usize>> = Vec::with_capacity(arena.components());

        for q in 0..n {
            let root = arena.find(q);
            let cid = match root_to_cluster[root] {
                Some(cid) => cid,
                None => {
                    let cid = clusters.len();
                    root_to_cluster[root] = Some(cid);
                    clusters.push(Vec::new());
                    cid
                }
            };
            clusters[cid].push(q);
            assignments.push(cid);
        }

        Self {
            threshold,
            assignments,
            clusters,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn n_queries(&self) -> usize {
        self.assignments.len()
    }

    pub fn n_clusters(&self) -> usize {
        self.clusters.len()
    }

    pub fn cluster_of(&self, query: usize) -> Option<usize> {
        self.assignments.get(query).copied()
    }

    pub fn members(&self, cluster: usize) -> &[usize] {
        &self.clusters[cluster]
    }

    pub fn assignments(&self) -> &[usize] {
        &self.assignments
    }

    pub fn clusters(&self) -> &[Vec<usize>] {
        &self.clusters
    }

    pub fn sizes(&self) -> Vec<usize> {
        self.clusters.iter().map(|c| c.len()).collect()
    }

    pub fn same_cluster(&self, a: usize, b: usize) -> bool {
        matches!((self.cluster_of(a), self.cluster_of(b)), (Some(x), Some(y)) if x == y)
    }
}

/// Partition of the queries joined by every pair with distance ≤ `threshold`.
pub fn partition_at(matrix: &DistanceMatrix, threshold: f64) -> ClusterPartition {
    let edges = FiltrationEdges::from_matrix(matrix);
    let mut partitioner = IncrementalPartitioner::new(&edges);
    partitioner.advance(threshold);
    partitioner.snapshot()
}

/// One union-find continued across increasing thresholds.
pub struct IncrementalPartitioner<'a> {
    edges: &'a FiltrationEdges,
    arena: ComponentArena,
    cursor: usize,
    threshold: f64,
}

impl<'a> IncrementalPartitioner<'a> {
    pub fn new(edges: &'a FiltrationEdges) -> Self {
        Self {
            edges,
            arena: ComponentArena::new(edges.n()),
            cursor: 0,
            threshold: f64::NEG_INFINITY,
        }
    }

    fn advance(&mut self, threshold: f64) {
        let all = self.edges.edges();
        while self.cursor < all.len() && all[self.cursor].distance <= threshold {
            let e = all[self.cursor];
            self.arena.union(e.i, e.j);
            self.cursor += 1;
        }
        self.threshold = self.threshold.max(threshold);
    }

    fn snapshot(&mut self) -> ClusterPartition {
        ClusterPartition::from_arena(&mut self.arena, self.threshold)
    }

    /// Partition at `threshold`; fails if it is below the previous one.
    pub fn advance_to(&mut self, threshold: f64) -> Result<ClusterPartition> {
        if threshold < self.threshold {
            return Err(TopoError::InvalidFlowOrder {
                from: self.threshold,
                to: threshold,
            });
        }
        self.advance(threshold);
        trace!(
            "advanced to {:.6}: {} edges consumed, {} clusters",
            threshold,
            self.cursor,
            self.arena.components()
        );
        Ok(self.snapshot())
    }
}

/// Containment of an earlier cluster in a later one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterFlow {
    pub from_cluster: usize,
    pub to_cluster: usize,
    pub from_size: usize,
    pub to_size: usize,
}

/// Flows from every cluster of `a` into the cluster of `b` containing it.
///
/// Requires `threshold(a) <= threshold(b)` and nested partitions over the same queries.
pub fn flows_between(a: &ClusterPartition, b: &ClusterPartition) -> Result<Vec<ClusterFlow>> {
    if a.threshold > b.threshold {
        return Err(TopoError::InvalidFlowOrder {
            from: a.threshold,
            to: b.threshold,
        });
    }
    if a.n_queries() != b.n_queries() {
        return Err(TopoError::invalid_parameter(format!(
            "partitions cover {} and {} queries",
            a.n_queries(),
            b.n_queries()
        )));
    }

    a.clusters
        .iter()
        .enumerate()
        .map(|(cid, members)| {
            let to = b.assignments[members[0]];
            if members.iter().any(|&q| b.assignments[q] != to) {
                return Err(TopoError::NonNestedPartition { cluster: cid });
            }
            Ok(ClusterFlow {
                from_cluster: cid,
                to_cluster: to,
                from_size: members.len(),
                to_size: b.clusters[to].len(),
            })
        })
        .collect()
}

/// Partitions at increasing thresholds and the flows linking consecutive levels.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterEvolution {
    levels: Vec<ClusterPartition>,
    /// `flows[i]` links `levels[i]` to `levels[i + 1]`.
    flows: Vec<Vec<ClusterFlow>>,
}

impl ClusterEvolution {
    pub fn levels(&self) -> &[ClusterPartition] {
        &self.levels
    }

    pub fn flows(&self) -> &[Vec<ClusterFlow>] {
        &self.flows
    }

    /// Ids of the clusters at `level - 1` absorbed by `cluster` at `level`.
    pub fn absorbed(&self, level: usize, cluster: usize) -> Vec<usize> {
        if level == 0 || level > self.flows.len() {
            return Vec::new();
        }
        self.flows[level - 1]
            .iter()
            .filter(|f| f.to_cluster == cluster)
            .map(|f| f.from_cluster)
            .collect()
    }

    /// Smallest level threshold at which `a` and `b` share a cluster.
    pub fn co_cluster_threshold(&self, a: usize, b: usize) -> Option<f64> {
        self.levels
            .iter()
            .find(|p| p.same_cluster(a, b))
            .map(|p| p.threshold())
    }
}

/// Track clusters across `thresholds` (ascending) over a sorted edge list.
pub fn compute_cluster_evolution(edges: &FiltrationEdges, thresholds: &[f64]) -> Result<ClusterEvolution> {
    info!("Computing cluster evolution at {} thresholds", thresholds.len());
    let mut partitioner = IncrementalPartitioner::new(edges);
    let levels = thresholds
        .iter()
        .map(|&t| partitioner.advance_to(t))
        .collect::<Result<Vec<_>>>()?;

    let flows = levels
        .windows(2)
        .map(|w| flows_between(&w[0], &w[1]))
        .collect::<Result<Vec<_>>>()?;

    for p in &levels {
        debug!(
            "threshold {:.4}: {} clusters, largest {}",
            p.threshold(),
            p.n_clusters(),
            p.sizes().into_iter().max().unwrap_or(0)
        );
    }
    Ok(ClusterEvolution { levels, flows })
}
