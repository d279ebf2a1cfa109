//! # topospace
//!
//! Topological similarity over query feature vectors.
//!
//! Pairwise distances under several metrics feed a Vietoris–Rips filtration;
//! the 0-dimensional persistence of that filtration picks a handful of
//! meaningful distance thresholds, the single-linkage partitions at those
//! thresholds are tracked as they merge, and nearest neighbours are returned
//! as explained recommendations.
//!
//! ```ignore
//! use topospace::builder::TopoEngineBuilder;
//! use topospace::distance::Metric;
//! use topospace::synthetic::SyntheticWorkload;
//!
//! let store = SyntheticWorkload::new(4, 6, 42).generate()?;
//! let engine = TopoEngineBuilder::new()
//!     .with_metrics(&[Metric::Euclidean, Metric::Cosine])
//!     .build(store)?;
//! let recs = engine.recommend(0, Metric::Cosine, 3)?;
//! let artifact = engine.run();
//! ```

pub mod analysis;
pub mod artifact;
pub mod builder;
pub mod core;
pub mod distance;
pub mod engine;
pub mod error;
pub mod evolution;
pub mod filtration;
pub mod operators;
pub mod recommend;
pub mod synthetic;
pub mod thresholds;

#[cfg(test)]
mod tests;

pub use crate::builder::TopoEngineBuilder;
pub use crate::distance::Metric;
pub use crate::engine::TopoEngine;
pub use crate::error::{Result, TopoError};
