use approx::assert_relative_eq;

use crate::distance::{compute_distance_matrix, DistanceOptions, Metric};
use crate::filtration::{
    compute_persistence, extract_death_thresholds, ComponentArena, Death, FiltrationEdges,
};
use crate::synthetic::gaussian_blobs;
use crate::tests::{four_point_matrix, unit_square};

#[test]
fn test_four_point_deaths() {
    let diagram = compute_persistence(&four_point_matrix(1.5), 0);

    assert_eq!(diagram.n_points(), 4);
    assert_eq!(diagram.features().len(), 4);
    assert!(diagram.features().iter().all(|f| f.dimension == 0 && f.birth == 0.0));
    assert_eq!(
        diagram.features().iter().filter(|f| f.death == Death::Unbounded).count(),
        1
    );
    // pairs {0,1} and {2,3} at 1, joined through d(1,2)=1.5
    assert_eq!(diagram.death_thresholds(0), vec![1.0, 1.0, 1.5]);

    // elder rule: the lower founder survives every tie
    assert_eq!(diagram.features()[0].death, Death::Unbounded);
    assert_eq!(diagram.features()[1].death, Death::Finite(1.0));
    assert_eq!(diagram.features()[2].death, Death::Finite(1.5));
    assert_eq!(diagram.features()[3].death, Death::Finite(1.0));
}

#[test]
fn test_four_point_variant_merges_at_two() {
    let diagram = compute_persistence(&four_point_matrix(2.5), 1);
    assert_eq!(extract_death_thresholds(&diagram, 0), vec![1.0, 1.0, 2.0]);
}

#[test]
fn test_cluster_count_at() {
    for d12 in [1.5, 2.5] {
        let diagram = compute_persistence(&four_point_matrix(d12), 0);
        assert_eq!(diagram.cluster_count_at(0.0), 4);
        assert_eq!(diagram.cluster_count_at(0.5), 4);
        assert_eq!(diagram.cluster_count_at(1.0), 2);
        assert_eq!(diagram.cluster_count_at(2.0), 1);
        assert_eq!(diagram.cluster_count_at(100.0), 1);
    }
}

#[test]
fn test_cluster_count_non_increasing() {
    let rows = gaussian_blobs(4, 10, 3, 0.4, 6.0, 21);
    let m = compute_distance_matrix(&rows, Metric::Euclidean, &DistanceOptions::default()).unwrap();
    let diagram = compute_persistence(&m, 0);

    assert_eq!(diagram.dimension(0).count(), 40);
    assert_eq!(diagram.dimension(0).filter(|f| !f.death.is_finite()).count(), 1);

    let max = m.summary().max;
    let mut previous = usize::MAX;
    for step in 0..=200 {
        let c = diagram.cluster_count_at(max * step as f64 / 200.0);
        assert!(c <= previous, "C(t) increased at step {step}");
        previous = c;
    }
    assert_eq!(previous, 1);
}

#[test]
fn test_persistence_is_idempotent() {
    let rows = gaussian_blobs(3, 6, 4, 0.5, 5.0, 5);
    let m = compute_distance_matrix(&rows, Metric::Cosine, &DistanceOptions::default()).unwrap();
    assert_eq!(compute_persistence(&m, 1), compute_persistence(&m, 1));
}

#[test]
fn test_degenerate_sizes() {
    let empty = compute_distance_matrix(&[], Metric::Euclidean, &DistanceOptions::default()).unwrap();
    let diagram = compute_persistence(&empty, 1);
    assert!(diagram.features().is_empty());
    assert!(diagram.death_thresholds(0).is_empty());

    let single = compute_distance_matrix(&[vec![1.0]], Metric::Euclidean, &DistanceOptions::default()).unwrap();
    let diagram = compute_persistence(&single, 1);
    assert_eq!(diagram.features().len(), 1);
    assert_eq!(diagram.features()[0].death, Death::Unbounded);
    assert_eq!(diagram.cluster_count_at(10.0), 1);
}

#[test]
fn test_duplicate_points_die_at_zero() {
    let rows = vec![vec![1.0, 1.0], vec![1.0, 1.0], vec![4.0, 5.0]];
    let m = compute_distance_matrix(&rows, Metric::Euclidean, &DistanceOptions::default()).unwrap();
    let diagram = compute_persistence(&m, 0);
    assert_eq!(diagram.death_thresholds(0), vec![0.0, 5.0]);
    assert_eq!(diagram.cluster_count_at(0.0), 2);
}

#[test]
fn test_square_has_one_loop() {
    let m = compute_distance_matrix(&unit_square(), Metric::Euclidean, &DistanceOptions::default()).unwrap();

    let with_loops = compute_persistence(&m, 1);
    let loops: Vec<_> = with_loops.dimension(1).collect();
    assert_eq!(loops.len(), 1);
    assert_relative_eq!(loops[0].birth, 1.0, epsilon = 1e-12);
    assert_relative_eq!(loops[0].death.value(), 2f64.sqrt(), epsilon = 1e-12);

    // dimension 1 is display only: components are unaffected
    let components_only = compute_persistence(&m, 0);
    assert_eq!(components_only.dimension(1).count(), 0);
    assert_eq!(
        with_loops.death_thresholds(0),
        components_only.death_thresholds(0)
    );
}

#[test]
fn test_four_point_loop_is_zero_persistence() {
    // the only cycle closes at 2 and is filled at 2 by triangle (0,1,2)
    let diagram = compute_persistence(&four_point_matrix(1.5), 1);
    assert_eq!(diagram.dimension(1).count(), 0);
}

#[test]
fn test_statistics() {
    let stats = compute_persistence(&four_point_matrix(1.5), 0).statistics();
    assert_eq!(stats.total_features, 4);
    assert_eq!(stats.finite_features, 3);

    let dim0 = &stats.dimensions[&0];
    assert_eq!(dim0.count, 4);
    assert_eq!(dim0.finite, 3);
    assert_relative_eq!(dim0.mean_lifetime, 3.5 / 3.0, epsilon = 1e-12);
    assert_eq!(dim0.max_lifetime, 1.5);
    assert_eq!(dim0.median_lifetime, 1.0);
    assert_eq!(dim0.total_persistence, 3.5);
}

#[test]
fn test_edges_sorted_with_index_tiebreak() {
    let edges = FiltrationEdges::from_matrix(&four_point_matrix(1.5));
    assert_eq!(edges.len(), 6);
    let order: Vec<(usize, usize)> = edges.edges().iter().map(|e| (e.i, e.j)).collect();
    assert_eq!(order, vec![(0, 1), (2, 3), (1, 2), (0, 2), (1, 3), (0, 3)]);
}

#[test]
fn test_component_arena() {
    let mut arena = ComponentArena::new(4);
    assert_eq!(arena.components(), 4);

    let m = arena.union(3, 2).unwrap();
    assert_eq!((m.survivor, m.dying), (2, 3));
    assert!(arena.union(2, 3).is_none());

    let m = arena.union(1, 3).unwrap();
    assert_eq!((m.survivor, m.dying), (1, 2));
    assert_eq!(arena.components(), 2);
    assert_eq!(arena.find(1), arena.find(2));
    assert_ne!(arena.find(0), arena.find(3));
}
