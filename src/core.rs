//! Query records and the read-only FeatureVector store.
//!
//! This module provides the ingestion boundary of the engine:
//!
//! - `Query`: immutable metadata for one query (ordinal id, raw text, owning
//!   analyst, timestamp, free-form tags).
//! - `FeatureLayout`: names, groups (structural / semantic / contextual) and kinds
//!   (discrete / count) of the D feature dimensions.
//! - `FeatureStore`: one fixed-length vector per query, validated once at
//!   construction and never mutated afterwards.
//!
//! Malformed input is fatal: a vector of the wrong length yields
//! `TopoError::DimensionMismatch`, a non-finite component or a mismatched id yields
//! `TopoError::InvalidFeatureVector`. Both carry the offending query ordinal.
//!
//! # Examples
//!
//! ```
//! use topospace::core::FeatureStore;
//!
//! let store = FeatureStore::from_rows(vec![vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
//! assert_eq!(store.len(), 2);
//! assert_eq!(store.dimensionality(), 2);
//! ```

use serde::{Deserialize, Serialize};

use smartcore::api::{Transformer, UnsupervisedEstimator};
use smartcore::linalg::basic::arrays::Array2;
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::preprocessing::numerical::{StandardScaler, StandardScalerParameters};

use log::{debug, info, trace};

use crate::error::{Result, TopoError};

/// One query of the analysed workload. `id` is the ordinal index `0..N`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub id: usize,
    pub text: String,
    pub owner: String,
    pub timestamp: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Query {
    pub fn new(id: usize, text: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            owner: owner.into(),
            timestamp: String::new(),
            tags: Vec::new(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureGroup {
    Structural,
    Semantic,
    Contextual,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    /// One-hot / boolean indicator; "shared" means non-zero in both vectors.
    Discrete,
    /// Counts and other magnitudes; never reported as a shared attribute.
    Count,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub name: String,
    pub group: FeatureGroup,
    pub kind: FeatureKind,
}

impl FeatureSpec {
    pub fn new(name: impl Into<String>, group: FeatureGroup, kind: FeatureKind) -> Self {
        Self {
            name: name.into(),
            group,
            kind,
        }
    }
}

/// Ordered description of the D feature dimensions.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureLayout {
    specs: Vec<FeatureSpec>,
}

impl FeatureLayout {
    pub fn new(specs: Vec<FeatureSpec>) -> Self {
        Self { specs }
    }

    /// Layout with generated names `f0..f{d-1}`, all structural and discrete.
    pub fn anonymous(dimensionality: usize) -> Self {
        Self {
            specs: (0..dimensionality)
                .map(|i| FeatureSpec::new(format!("f{}", i), FeatureGroup::Structural, FeatureKind::Discrete))
                .collect(),
        }
    }

    #[inline]
    pub fn dimensionality(&self) -> usize {
        self.specs.len()
    }

    #[inline]
    pub fn spec(&self, dim: usize) -> &FeatureSpec {
        &self.specs[dim]
    }

    pub fn specs(&self) -> &[FeatureSpec] {
        &self.specs
    }

    pub fn names(&self) -> Vec<String> {
        self.specs.iter().map(|s| s.name.clone()).collect()
    }

    /// Index range covered by a group (dimensions need not be contiguous).
    pub fn dimensions_in(&self, group: FeatureGroup) -> Vec<usize> {
        self.specs
            .iter()
            .enumerate()
            .filter(|(_, s)| s.group == group)
            .map(|(i, _)| i)
            .collect()
    }
}

/// Vocabulary of a SQL workload, used to lay out extractor output.
///
/// Dimension order: table one-hots, column one-hots, the six structural
/// indicators (`has_join`, `has_where`, `has_group_by`, `has_order_by`,
/// `has_limit`, `num_conditions`), aggregation one-hots, the four query-type
/// one-hots, analyst one-hots, and the four semantic column-type counts.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SqlVocabulary {
    pub tables: Vec<String>,
    pub columns: Vec<String>,
    pub aggregations: Vec<String>,
    pub users: Vec<String>,
}

pub const SQL_STRUCTURAL_FLAGS: [&str; 5] =
    ["has_join", "has_where", "has_group_by", "has_order_by", "has_limit"];
pub const SQL_QUERY_TYPES: [&str; 4] = ["SELECT", "FILTER", "AGGREGATION", "JOIN"];
pub const SQL_SEMANTIC_TYPES: [&str; 4] = ["temporal", "measurement", "categorical", "unknown"];

impl SqlVocabulary {
    pub fn layout(&self) -> FeatureLayout {
        use FeatureGroup::*;
        use FeatureKind::*;

        let mut specs = Vec::new();
        specs.extend(self.tables.iter().map(|t| FeatureSpec::new(format!("table_{}", t), Structural, Discrete)));
        specs.extend(self.columns.iter().map(|c| FeatureSpec::new(format!("column_{}", c), Structural, Discrete)));
        specs.extend(SQL_STRUCTURAL_FLAGS.iter().map(|f| FeatureSpec::new(*f, Structural, Discrete)));
        specs.push(FeatureSpec::new("num_conditions", Structural, Count));
        specs.extend(self.aggregations.iter().map(|a| FeatureSpec::new(format!("agg_{}", a), Semantic, Discrete)));
        specs.extend(SQL_QUERY_TYPES.iter().map(|q| FeatureSpec::new(format!("type_{}", q), Semantic, Discrete)));
        specs.extend(self.users.iter().map(|u| FeatureSpec::new(format!("user_{}", u), Contextual, Discrete)));
        specs.extend(SQL_SEMANTIC_TYPES.iter().map(|s| FeatureSpec::new(format!("semantic_{}", s), Semantic, Count)));

        FeatureLayout::new(specs)
    }
}

/// Read-only store of one FeatureVector per query.
#[derive(Clone, Debug)]
pub struct FeatureStore {
    queries: Vec<Query>,
    rows: Vec<Vec<f64>>,
    layout: FeatureLayout,
}

impl FeatureStore {
    /// Validate and ingest N queries with their vectors.
    pub fn new(queries: Vec<Query>, rows: Vec<Vec<f64>>, layout: FeatureLayout) -> Result<Self> {
        info!("Ingesting {} feature vectors", rows.len());
        if queries.len() != rows.len() {
            return Err(TopoError::invalid_parameter(format!(
                "{} queries but {} feature vectors",
                queries.len(),
                rows.len()
            )));
        }

        let d = layout.dimensionality();
        for (i, (q, row)) in queries.iter().zip(rows.iter()).enumerate() {
            if q.id != i {
                return Err(TopoError::invalid_vector(
                    i,
                    format!("query id {} does not match ordinal {}", q.id, i),
                ));
            }
            if row.len() != d {
                return Err(TopoError::dimension_mismatch(i, d, row.len()));
            }
            if let Some(pos) = row.iter().position(|v| !v.is_finite()) {
                return Err(TopoError::invalid_vector(
                    i,
                    format!("non-finite value {} at dimension {}", row[pos], pos),
                ));
            }
            trace!("query {} ok ({} dims)", i, row.len());
        }

        debug!("Feature store ready: N={}, D={}", rows.len(), d);
        Ok(Self {
            queries,
            rows,
            layout,
        })
    }

    /// Ingest bare rows: anonymous layout sized on the first row, placeholder metadata.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let d = rows.first().map(|r| r.len()).unwrap_or(0);
        let queries = (0..rows.len())
            .map(|i| Query::new(i, String::new(), String::new()))
            .collect();
        Self::new(queries, rows, FeatureLayout::anonymous(d))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[inline]
    pub fn dimensionality(&self) -> usize {
        self.layout.dimensionality()
    }

    pub fn layout(&self) -> &FeatureLayout {
        &self.layout
    }

    pub fn queries(&self) -> &[Query] {
        &self.queries
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn query(&self, id: usize) -> Result<&Query> {
        self.queries
            .get(id)
            .ok_or(TopoError::UnknownQuery { query: id })
    }

    pub fn row(&self, id: usize) -> Result<&[f64]> {
        self.rows
            .get(id)
            .map(|r| r.as_slice())
            .ok_or(TopoError::UnknownQuery { query: id })
    }

    /// Column-wise z-scored copy of the rows.
    ///
    /// Zero-variance columns (common for one-hot features) come out as 0.0.
    /// Fewer than two rows are returned unchanged.
    pub fn standardised_rows(&self) -> Result<Vec<Vec<f64>>> {
        let (n, d) = (self.len(), self.dimensionality());
        if n < 2 || d == 0 {
            debug!("Skipping standardisation for N={}, D={}", n, d);
            return Ok(self.rows.clone());
        }

        let x = DenseMatrix::from_2d_vec(&self.rows)
            .map_err(|e| TopoError::invalid_parameter(format!("feature matrix: {}", e)))?;
        let scaler = StandardScaler::fit(&x, StandardScalerParameters::default())
            .map_err(|e| TopoError::invalid_parameter(format!("standardisation: {}", e)))?;
        let scaled: DenseMatrix<f64> = scaler
            .transform(&x)
            .map_err(|e| TopoError::invalid_parameter(format!("standardisation: {}", e)))?;

        let rows = (0..n)
            .map(|i| {
                scaled
                    .get_row(i)
                    .iterator(0)
                    .map(|&v| if v.is_finite() { v } else { 0.0 })
                    .collect()
            })
            .collect();
        trace!("Standardised {}x{} feature matrix", n, d);
        Ok(rows)
    }
}
