mod test_filtration;
mod test_recommend;

use crate::core::{FeatureGroup, FeatureKind, FeatureLayout, FeatureSpec, FeatureStore, Query};
use crate::distance::{DistanceMatrix, Metric};

/// Four points: pairs {0,1} and {2,3} at distance 1, joined through `d12`.
///
/// d(0,2)=2, d(0,3)=3, d(1,3)=2.5.
pub fn four_point_matrix(d12: f64) -> DistanceMatrix {
    DistanceMatrix::from_square(
        Metric::Euclidean,
        vec![
            vec![0.0, 1.0, 2.0, 3.0],
            vec![1.0, 0.0, d12, 2.5],
            vec![2.0, d12, 0.0, 1.0],
            vec![3.0, 2.5, 1.0, 0.0],
        ],
    )
    .unwrap()
}

/// Unit square, counter-clockwise from the origin.
pub fn unit_square() -> Vec<Vec<f64>> {
    vec![
        vec![0.0, 0.0],
        vec![1.0, 0.0],
        vec![1.0, 1.0],
        vec![0.0, 1.0],
    ]
}

/// Small annotated workload used by the recommendation tests.
///
/// Dimensions: `table_a`, `column_x` (structural, discrete), `agg_COUNT`
/// (semantic, discrete), `num_conditions` (structural, count).
pub fn tiny_workload() -> FeatureStore {
    let layout = FeatureLayout::new(vec![
        FeatureSpec::new("table_a", FeatureGroup::Structural, FeatureKind::Discrete),
        FeatureSpec::new("column_x", FeatureGroup::Structural, FeatureKind::Discrete),
        FeatureSpec::new("agg_COUNT", FeatureGroup::Semantic, FeatureKind::Discrete),
        FeatureSpec::new("num_conditions", FeatureGroup::Structural, FeatureKind::Count),
    ]);
    let queries = vec![
        Query::new(0, "SELECT x FROM a WHERE ...", "alice").with_tags(vec!["FILTER".into()]),
        Query::new(1, "SELECT x FROM a WHERE ... AND ...", "alice").with_tags(vec!["FILTER".into()]),
        Query::new(2, "SELECT COUNT(*) FROM b", "bob").with_tags(vec!["AGGREGATION".into()]),
        Query::new(3, "SELECT COUNT(*) FROM a WHERE ...", "carol"),
    ];
    let rows = vec![
        vec![1.0, 1.0, 0.0, 2.0],
        vec![1.0, 1.0, 0.0, 3.0],
        vec![0.0, 0.0, 1.0, 0.0],
        vec![1.0, 0.0, 1.0, 1.0],
    ];
    FeatureStore::new(queries, rows, layout).unwrap()
}
