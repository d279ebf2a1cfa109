//! Seeded synthetic workloads.
//!
//! Stand-in for the upstream corpus generator and feature extractor: produces
//! SQL-shaped feature stores with planted query families, and plain Gaussian
//! blobs for numeric experiments. Deterministic for a given seed.

use log::{debug, info};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, StandardNormal};

use crate::core::{FeatureStore, Query, SqlVocabulary, SQL_QUERY_TYPES};
use crate::error::Result;

#[derive(Clone, Debug)]
pub struct SyntheticWorkload {
    /// Number of planted query families.
    pub families: usize,
    pub per_family: usize,
    /// Probability of flipping each structural/semantic indicator of the family prototype.
    pub flip_probability: f64,
    /// Probability that a query is owned by its family's usual analyst.
    pub owner_affinity: f64,
    pub vocabulary: SqlVocabulary,
    pub seed: u64,
}

impl Default for SyntheticWorkload {
    fn default() -> Self {
        let s = |v: &[&str]| v.iter().map(|x| x.to_string()).collect::<Vec<_>>();
        Self {
            families: 4,
            per_family: 6,
            flip_probability: 0.05,
            owner_affinity: 0.7,
            vocabulary: SqlVocabulary {
                tables: s(&["islands", "measurements", "penguins"]),
                columns: s(&[
                    "body_mass_g",
                    "culmen_depth_mm",
                    "culmen_length_mm",
                    "flipper_length_mm",
                    "island",
                    "researcher",
                    "sample_date",
                    "sex",
                    "species",
                ]),
                aggregations: s(&["AVG", "COUNT", "MAX", "MIN", "SUM"]),
                users: s(&["alice", "bob", "carol", "dave"]),
            },
            seed: 42,
        }
    }
}

impl SyntheticWorkload {
    pub fn new(families: usize, per_family: usize, seed: u64) -> Self {
        Self {
            families,
            per_family,
            seed,
            ..Self::default()
        }
    }

    /// Family prototype: indicator bits, one query type, small counts.
    fn prototype(&self, rng: &mut ChaCha8Rng, names: &[String]) -> (Vec<f64>, usize) {
        let query_type = rng.random_range(0..SQL_QUERY_TYPES.len());
        let proto = names
            .iter()
            .map(|name| {
                if name.starts_with("type_") {
                    if *name == format!("type_{}", SQL_QUERY_TYPES[query_type]) { 1.0 } else { 0.0 }
                } else if name.starts_with("user_") {
                    0.0
                } else if name == "num_conditions" || name.starts_with("semantic_") {
                    rng.random_range(0..4u32) as f64
                } else if rng.random::<f64>() < 0.3 {
                    1.0
                } else {
                    0.0
                }
            })
            .collect();
        (proto, query_type)
    }

    pub fn generate(&self) -> Result<FeatureStore> {
        info!(
            "Generating synthetic workload: {} families x {} queries (seed {})",
            self.families, self.per_family, self.seed
        );
        let layout = self.vocabulary.layout();
        let names = layout.names();
        let users = &self.vocabulary.users;
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);

        let mut queries = Vec::with_capacity(self.families * self.per_family);
        let mut rows = Vec::with_capacity(self.families * self.per_family);

        for family in 0..self.families {
            let (proto, query_type) = self.prototype(&mut rng, &names);
            let usual_owner = if users.is_empty() { 0 } else { family % users.len() };

            for _ in 0..self.per_family {
                let id = rows.len();
                let owner = if users.is_empty() {
                    0
                } else if rng.random::<f64>() < self.owner_affinity {
                    usual_owner
                } else {
                    rng.random_range(0..users.len())
                };
                let owner_name = users.get(owner).cloned().unwrap_or_default();

                let row: Vec<f64> = names
                    .iter()
                    .zip(&proto)
                    .map(|(name, &p)| {
                        if name.starts_with("type_") {
                            p
                        } else if name.starts_with("user_") {
                            if name[5..] == owner_name { 1.0 } else { 0.0 }
                        } else if name == "num_conditions" || name.starts_with("semantic_") {
                            let z: f64 = StandardNormal.sample(&mut rng);
                            (p + (0.5 * z).round()).max(0.0)
                        } else if rng.random::<f64>() < self.flip_probability {
                            1.0 - p
                        } else {
                            p
                        }
                    })
                    .collect();

                let pattern = SQL_QUERY_TYPES[query_type].to_string();
                queries.push(
                    Query::new(id, format!("-- synthetic {} query, family {}", pattern, family), owner_name)
                        .with_timestamp(format!("2024-01-{:02}T00:00:00", 1 + id % 28))
                        .with_tags(vec![pattern]),
                );
                rows.push(row);
            }
        }

        debug!("Generated {} rows of dimension {}", rows.len(), layout.dimensionality());
        FeatureStore::new(queries, rows, layout)
    }
}

/// Isotropic Gaussian blobs: `centres` clusters of `per_centre` points in `dim`
/// dimensions, centres `separation` apart along successive axes.
pub fn gaussian_blobs(centres: usize, per_centre: usize, dim: usize, spread: f64, separation: f64, seed: u64) -> Vec<Vec<f64>> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut rows = Vec::with_capacity(centres * per_centre);
    for c in 0..centres {
        for _ in 0..per_centre {
            let row = (0..dim)
                .map(|d| {
                    let centre = if dim > 0 && d == c % dim {
                        separation * (1 + c / dim.max(1)) as f64
                    } else {
                        0.0
                    };
                    let z: f64 = StandardNormal.sample(&mut rng);
                    centre + spread * z
                })
                .collect();
            rows.push(row);
        }
    }
    rows
}
