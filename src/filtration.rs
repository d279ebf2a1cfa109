//! Vietoris–Rips filtration over a distance matrix, dimension 0 (and display-only dimension 1).
//!
//! The sweep:
//! 1. enumerate all unordered pairs `(i, j)`, `i < j`, sorted by `(d(i,j), i, j)`;
//! 2. start from N singleton components, each a dimension-0 feature born at 0;
//! 3. for every pair joining two components, the younger component dies at `d(i,j)`
//!    (later birth, ties broken by the higher founding index) and the elder keeps
//!    its birth;
//! 4. the last surviving component gets an unbounded death.
//!
//! Components live in a [`ComponentArena`]: flat vectors indexed by point id with
//! union-by-size and path halving, carrying birth and founder per root.
//!
//! Dimension-1 features are an approximation for display: when a component is
//! closed into a cycle for the first time, a loop is born at that edge's length and
//! dies at the smallest filtration value of a triangle filling that edge.
//! Zero-persistence loops are dropped. They never drive recommendations.

use std::collections::BTreeMap;

use log::{debug, info, trace};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::distance::DistanceMatrix;

/// Death time of a persistence feature, with an explicit sentinel for the
/// component that never merges.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Death {
    Finite(f64),
    Unbounded,
}

impl Death {
    /// `f64::INFINITY` for `Unbounded`.
    #[inline]
    pub fn value(&self) -> f64 {
        match self {
            Death::Finite(d) => *d,
            Death::Unbounded => f64::INFINITY,
        }
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        matches!(self, Death::Finite(_))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PersistenceFeature {
    pub dimension: usize,
    pub birth: f64,
    pub death: Death,
}

impl PersistenceFeature {
    pub fn new(dimension: usize, birth: f64, death: Death) -> Self {
        Self {
            dimension,
            birth,
            death,
        }
    }

    /// `death - birth`; infinite for unbounded features.
    #[inline]
    pub fn lifetime(&self) -> f64 {
        self.death.value() - self.birth
    }
}

/// One unordered pair of the filtration, `i < j`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Edge {
    pub i: usize,
    pub j: usize,
    pub distance: f64,
}

/// All pairs of a distance matrix, sorted by `(distance, i, j)`.
#[derive(Clone, Debug)]
pub struct FiltrationEdges {
    n: usize,
    edges: Vec<Edge>,
}

impl FiltrationEdges {
    pub fn from_matrix(matrix: &DistanceMatrix) -> Self {
        let n = matrix.n();
        let mut edges: Vec<Edge> = (0..n)
            .flat_map(|i| {
                ((i + 1)..n).map(move |j| Edge {
                    i,
                    j,
                    distance: matrix.get(i, j),
                })
            })
            .collect();
        edges.par_sort_unstable_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.i.cmp(&b.i))
                .then(a.j.cmp(&b.j))
        });
        trace!("sorted {} filtration edges", edges.len());
        Self { n, edges }
    }

    #[inline]
    pub fn n(&self) -> usize {
        self.n
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }
}

/// Outcome of joining two distinct components.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Merge {
    /// Root of the merged component.
    pub root: usize,
    /// Founding point of the component that survives.
    pub survivor: usize,
    /// Founding point of the component that dies.
    pub dying: usize,
}

/// Disjoint-set arena with birth tracking, indexed by point id.
#[derive(Clone, Debug)]
pub struct ComponentArena {
    parent: Vec<usize>,
    size: Vec<usize>,
    birth: Vec<f64>,
    founder: Vec<usize>,
    cyclic: Vec<bool>,
    components: usize,
}

impl ComponentArena {
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
            birth: vec![0.0; n],
            founder: (0..n).collect(),
            cyclic: vec![false; n],
            components: n,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.parent.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Number of components currently alive.
    #[inline]
    pub fn components(&self) -> usize {
        self.components
    }

    pub fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    /// Join the components of `a` and `b`; `None` if they already coincide.
    pub fn union(&mut self, a: usize, b: usize) -> Option<Merge> {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return None;
        }

        // elder: earlier birth, then lower founder
        let a_elder = match self.birth[ra].total_cmp(&self.birth[rb]) {
            std::cmp::Ordering::Less => true,
            std::cmp::Ordering::Greater => false,
            std::cmp::Ordering::Equal => self.founder[ra] < self.founder[rb],
        };
        let (elder, younger) = if a_elder { (ra, rb) } else { (rb, ra) };
        let (survivor, dying) = (self.founder[elder], self.founder[younger]);
        let elder_birth = self.birth[elder];
        let cyclic = self.cyclic[ra] || self.cyclic[rb];

        let (big, small) = if self.size[ra] >= self.size[rb] { (ra, rb) } else { (rb, ra) };
        self.parent[small] = big;
        self.size[big] += self.size[small];
        self.birth[big] = elder_birth;
        self.founder[big] = survivor;
        self.cyclic[big] = cyclic;
        self.components -= 1;

        Some(Merge {
            root: big,
            survivor,
            dying,
        })
    }

    /// Marks the component of `x` as holding a cycle; returns true the first time.
    fn close_cycle(&mut self, x: usize) -> bool {
        let r = self.find(x);
        !std::mem::replace(&mut self.cyclic[r], true)
    }
}

/// Full output of the filtration sweep.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PersistenceDiagram {
    n_points: usize,
    features: Vec<PersistenceFeature>,
}

impl PersistenceDiagram {
    pub fn n_points(&self) -> usize {
        self.n_points
    }

    /// Dimension-0 features in point order, then dimension-1 features in birth order.
    pub fn features(&self) -> &[PersistenceFeature] {
        &self.features
    }

    pub fn dimension(&self, dim: usize) -> impl Iterator<Item = &PersistenceFeature> + '_ {
        self.features.iter().filter(move |f| f.dimension == dim)
    }

    /// Sorted finite death times of one dimension.
    pub fn death_thresholds(&self, dim: usize) -> Vec<f64> {
        extract_death_thresholds(self, dim)
    }

    /// C(t): components alive once every pair with distance ≤ t is joined.
    pub fn cluster_count_at(&self, threshold: f64) -> usize {
        let total = self.dimension(0).count();
        let merged = self
            .dimension(0)
            .filter(|f| f.death.is_finite() && f.death.value() <= threshold)
            .count();
        total - merged
    }

    pub fn statistics(&self) -> PersistenceStatistics {
        compute_persistence_statistics(self)
    }
}

/// Compute the persistence diagram of `matrix` up to `max_dimension` (0 or 1).
pub fn compute_persistence(matrix: &DistanceMatrix, max_dimension: usize) -> PersistenceDiagram {
    let edges = FiltrationEdges::from_matrix(matrix);
    compute_persistence_from_edges(matrix, &edges, max_dimension)
}

/// As [`compute_persistence`], reusing an already sorted edge list.
pub fn compute_persistence_from_edges(
    matrix: &DistanceMatrix,
    edges: &FiltrationEdges,
    max_dimension: usize,
) -> PersistenceDiagram {
    let n = edges.n();
    info!(
        "Filtration sweep over {} points, {} edges (max dimension {})",
        n,
        edges.len(),
        max_dimension
    );

    let mut arena = ComponentArena::new(n);
    let mut deaths: Vec<Death> = vec![Death::Unbounded; n];
    let mut loops: Vec<PersistenceFeature> = Vec::new();

    for edge in edges.edges() {
        if arena.components() <= 1 && max_dimension == 0 {
            break;
        }
        match arena.union(edge.i, edge.j) {
            Some(merge) => {
                trace!(
                    "d={:.6}: component {} dies into {}",
                    edge.distance,
                    merge.dying,
                    merge.survivor
                );
                deaths[merge.dying] = Death::Finite(edge.distance);
            }
            None => {
                if max_dimension >= 1 && arena.close_cycle(edge.i) {
                    let filled = filling_triangle(matrix, edge);
                    if filled > edge.distance {
                        loops.push(PersistenceFeature::new(1, edge.distance, Death::Finite(filled)));
                    }
                }
            }
        }
    }

    let mut features: Vec<PersistenceFeature> = deaths
        .into_iter()
        .map(|death| PersistenceFeature::new(0, 0.0, death))
        .collect();
    features.extend(loops);

    debug!(
        "Filtration done: {} dim-0 features, {} dim-1 features",
        n,
        features.len() - n
    );
    PersistenceDiagram {
        n_points: n,
        features,
    }
}

/// Smallest filtration value of a triangle containing `edge`.
fn filling_triangle(matrix: &DistanceMatrix, edge: &Edge) -> f64 {
    (0..matrix.n())
        .filter(|&k| k != edge.i && k != edge.j)
        .map(|k| edge.distance.max(matrix.get(edge.i, k)).max(matrix.get(edge.j, k)))
        .fold(f64::INFINITY, f64::min)
}

/// Sorted finite death times of the features of dimension `dim`.
pub fn extract_death_thresholds(diagram: &PersistenceDiagram, dim: usize) -> Vec<f64> {
    let mut deaths: Vec<f64> = diagram
        .dimension(dim)
        .filter(|f| f.death.is_finite())
        .map(|f| f.death.value())
        .collect();
    deaths.sort_by(|a, b| a.total_cmp(b));
    deaths
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DimensionStatistics {
    pub count: usize,
    pub finite: usize,
    /// Lifetimes of the finite features, in feature order.
    pub lifetimes: Vec<f64>,
    pub mean_lifetime: f64,
    pub max_lifetime: f64,
    pub median_lifetime: f64,
    pub total_persistence: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistenceStatistics {
    pub total_features: usize,
    pub finite_features: usize,
    pub dimensions: BTreeMap<usize, DimensionStatistics>,
}

/// Summary statistics of feature lifetimes, per dimension.
pub fn compute_persistence_statistics(diagram: &PersistenceDiagram) -> PersistenceStatistics {
    let mut dimensions: BTreeMap<usize, DimensionStatistics> = BTreeMap::new();
    for f in diagram.features() {
        let entry = dimensions.entry(f.dimension).or_default();
        entry.count += 1;
        if f.death.is_finite() {
            entry.finite += 1;
            entry.lifetimes.push(f.lifetime());
        }
    }

    for stats in dimensions.values_mut() {
        if stats.lifetimes.is_empty() {
            continue;
        }
        let mut sorted = stats.lifetimes.clone();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let len = sorted.len();
        stats.total_persistence = sorted.iter().sum();
        stats.mean_lifetime = stats.total_persistence / len as f64;
        stats.max_lifetime = sorted[len - 1];
        stats.median_lifetime = if len % 2 == 1 {
            sorted[len / 2]
        } else {
            0.5 * (sorted[len / 2 - 1] + sorted[len / 2])
        };
    }

    PersistenceStatistics {
        total_features: diagram.features().len(),
        finite_features: dimensions.values().map(|s| s.finite).sum(),
        dimensions,
    }
}
