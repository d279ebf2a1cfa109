use approx::assert_relative_eq;

use crate::core::{FeatureGroup, FeatureKind, FeatureLayout, FeatureSpec, FeatureStore};
use crate::distance::{compute_distance_matrix, DistanceMatrix, DistanceOptions, Metric};
use crate::error::TopoError;
use crate::evolution::{compute_cluster_evolution, partition_at};
use crate::filtration::FiltrationEdges;
use crate::recommend::{rank_neighbours, recommend_from, recommend_within, Explanation};
use crate::synthetic::SyntheticWorkload;
use crate::tests::tiny_workload;

fn euclidean(store: &FeatureStore) -> DistanceMatrix {
    compute_distance_matrix(store.rows(), Metric::Euclidean, &DistanceOptions::default()).unwrap()
}

#[test]
fn test_explanations() {
    let store = tiny_workload();
    let m = euclidean(&store);
    let rec = recommend_from(&store, &m, None, 0, 2).unwrap();

    assert_eq!(rec.source, 0);
    assert_eq!(rec.metric, Metric::Euclidean);
    assert_eq!(rec.targets(), vec![1, 3]);

    let first = &rec.entries[0];
    assert_relative_eq!(first.distance, 1.0, epsilon = 1e-12);
    assert_eq!(
        first.explanation,
        "Topologically similar (euclidean distance: 1.000): same query pattern (FILTER); \
         share structural features: column_x, table_a; same analyst (alice)"
    );
    assert_eq!(first.shared_features, vec!["column_x", "table_a"]);
    assert_eq!(first.co_cluster_threshold, None);

    assert_eq!(
        rec.entries[1].explanation,
        "Topologically similar (euclidean distance: 1.732): share structural features: table_a"
    );
}

#[test]
fn test_fallback_explanation() {
    let store = tiny_workload();
    let rec = recommend_from(&store, &euclidean(&store), None, 0, 3).unwrap();
    let last = rec.entries.last().unwrap();
    assert_eq!(last.target, 2);
    assert_eq!(
        last.explanation,
        "Topologically similar (euclidean distance: 2.646): topologically similar query structure"
    );
    assert!(last.shared_features.is_empty());
}

#[test]
fn test_semantic_overlap() {
    let store = tiny_workload();
    let explanation = Explanation::between(&store, 2, 3, Some(0.75)).unwrap();
    assert!(explanation.shared_structural.is_empty());
    assert_eq!(explanation.shared_semantic, vec!["agg_COUNT"]);
    assert_eq!(explanation.same_owner, None);
    assert_eq!(
        explanation.render(Metric::Cosine, 0.5),
        "Topologically similar (cosine distance: 0.500): share semantic features: agg_COUNT; \
         same cluster from threshold 0.750"
    );
}

#[test]
fn test_named_features_truncated() {
    let layout = FeatureLayout::new(
        ["e", "d", "c", "b", "a"]
            .iter()
            .map(|n| FeatureSpec::new(*n, FeatureGroup::Structural, FeatureKind::Discrete))
            .collect(),
    );
    let store = FeatureStore::new(
        vec![
            crate::core::Query::new(0, "", ""),
            crate::core::Query::new(1, "", ""),
        ],
        vec![vec![1.0; 5], vec![2.0; 5]],
        layout,
    )
    .unwrap();
    let rec = recommend_from(&store, &euclidean(&store), None, 0, 1).unwrap();
    assert_eq!(rec.entries[0].shared_features, vec!["a", "b", "c", "d", "e"]);
    assert!(rec.entries[0].explanation.ends_with("share structural features: a, b, c"));
}

#[test]
fn test_recommendations_exclude_source_and_sorted() {
    let store = SyntheticWorkload::new(3, 5, 17).generate().unwrap();
    let m = compute_distance_matrix(store.rows(), Metric::Cosine, &DistanceOptions::default()).unwrap();

    for source in 0..store.len() {
        for top_k in [0, 1, 4, 100] {
            let rec = recommend_from(&store, &m, None, source, top_k).unwrap();
            assert_eq!(rec.len(), top_k.min(store.len() - 1));
            assert!(!rec.targets().contains(&source));
            for w in rec.entries.windows(2) {
                assert!(
                    w[0].distance < w[1].distance
                        || (w[0].distance == w[1].distance && w[0].target < w[1].target)
                );
            }
        }
    }
}

#[test]
fn test_ties_broken_by_ordinal() {
    let m = DistanceMatrix::from_square(
        Metric::Euclidean,
        vec![
            vec![0.0, 1.0, 1.0, 1.0],
            vec![1.0, 0.0, 1.0, 1.0],
            vec![1.0, 1.0, 0.0, 1.0],
            vec![1.0, 1.0, 1.0, 0.0],
        ],
    )
    .unwrap();
    let ranked = rank_neighbours(&m, 2, 2).unwrap();
    assert_eq!(ranked, vec![(0, 1.0), (1, 1.0)]);
}

#[test]
fn test_single_query_has_no_recommendations() {
    let store = FeatureStore::from_rows(vec![vec![1.0, 2.0]]).unwrap();
    let rec = recommend_from(&store, &euclidean(&store), None, 0, 3).unwrap();
    assert!(rec.is_empty());
}

#[test]
fn test_unknown_source() {
    let store = tiny_workload();
    let m = euclidean(&store);
    assert!(matches!(
        recommend_from(&store, &m, None, 4, 3),
        Err(TopoError::UnknownQuery { query: 4 })
    ));
    assert!(matches!(rank_neighbours(&m, 9, 3), Err(TopoError::UnknownQuery { query: 9 })));
}

#[test]
fn test_recommend_within_cluster() {
    let store = FeatureStore::from_rows(vec![vec![0.0], vec![1.0], vec![5.0], vec![6.0]]).unwrap();
    let m = euclidean(&store);
    let partition = partition_at(&m, 1.0);

    let rec = recommend_within(&store, &m, None, &partition, 0, 3).unwrap();
    assert_eq!(rec.targets(), vec![1]);

    let rec = recommend_within(&store, &m, None, &partition, 3, 3).unwrap();
    assert_eq!(rec.targets(), vec![2]);
}

#[test]
fn test_co_cluster_threshold_from_evolution() {
    let store = FeatureStore::from_rows(vec![vec![0.0], vec![1.0], vec![5.0], vec![6.0]]).unwrap();
    let m = euclidean(&store);
    let evolution = compute_cluster_evolution(&FiltrationEdges::from_matrix(&m), &[1.0, 4.0]).unwrap();

    let rec = recommend_from(&store, &m, Some(&evolution), 0, 3).unwrap();
    let thresholds: Vec<Option<f64>> = rec.entries.iter().map(|e| e.co_cluster_threshold).collect();
    assert_eq!(rec.targets(), vec![1, 2, 3]);
    assert_eq!(thresholds, vec![Some(1.0), Some(4.0), Some(4.0)]);
    assert!(rec.entries[0].explanation.contains("same cluster from threshold 1.000"));
}
