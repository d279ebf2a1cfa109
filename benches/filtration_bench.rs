use criterion::{BatchSize, BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::time::Duration;

use topospace::analysis::{analyse_metric, AnalysisParams};
use topospace::distance::{compute_distance_matrix, DistanceOptions, Metric};
use topospace::filtration::{compute_persistence, FiltrationEdges};
use topospace::evolution::compute_cluster_evolution;
use topospace::synthetic::{gaussian_blobs, SyntheticWorkload};
use topospace::thresholds::{select_thresholds, ThresholdParams};

/// Blobs sized so that every group sees the same point cloud for a given N.
fn blobs(n_items: usize, n_dims: usize) -> Vec<Vec<f64>> {
    let centres = 8;
    gaussian_blobs(centres, n_items / centres, n_dims, 0.5, 6.0, 42)
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let _ = env_logger::builder().is_test(true).try_init();

    // Group 1: distance matrices per metric
    let mut group_distance = c.benchmark_group("distance_matrix");
    group_distance.warm_up_time(Duration::from_millis(500));
    group_distance.measurement_time(Duration::from_secs(3));
    group_distance.sample_size(20);

    for metric in Metric::ALL {
        for &n_items in &[100, 400] {
            let rows = blobs(n_items, 24);
            group_distance.bench_function(BenchmarkId::new(metric.name(), n_items), |b| {
                b.iter(|| {
                    let m = compute_distance_matrix(&rows, metric, &DistanceOptions::default()).unwrap();
                    black_box(m);
                })
            });
        }
    }
    group_distance.finish();

    // Group 2: filtration sweep scalability
    let mut group_filtration = c.benchmark_group("filtration_sweep");
    group_filtration.warm_up_time(Duration::from_millis(500));
    group_filtration.measurement_time(Duration::from_secs(5));
    group_filtration.sample_size(10);

    for &n_items in &[100, 200, 400, 800] {
        let rows = blobs(n_items, 24);
        let m = compute_distance_matrix(&rows, Metric::Euclidean, &DistanceOptions::default()).unwrap();

        group_filtration.bench_function(BenchmarkId::new("dim0", n_items), |b| {
            b.iter(|| black_box(compute_persistence(&m, 0)))
        });
        group_filtration.bench_function(BenchmarkId::new("dim1", n_items), |b| {
            b.iter(|| black_box(compute_persistence(&m, 1)))
        });
    }
    group_filtration.finish();

    // Group 3: thresholds + evolution on a fixed diagram
    let mut group_evolution = c.benchmark_group("thresholds_and_evolution");
    group_evolution.sample_size(20);

    let rows = blobs(400, 24);
    let m = compute_distance_matrix(&rows, Metric::Euclidean, &DistanceOptions::default()).unwrap();
    let edges = FiltrationEdges::from_matrix(&m);
    let diagram = compute_persistence(&m, 0);
    let params = ThresholdParams::default();

    group_evolution.bench_function("select_thresholds", |b| {
        b.iter(|| black_box(select_thresholds(&diagram, &params)))
    });
    group_evolution.bench_function("cluster_evolution", |b| {
        let values: Vec<f64> = select_thresholds(&diagram, &params).iter().map(|t| t.value).collect();
        b.iter(|| black_box(compute_cluster_evolution(&edges, &values).unwrap()))
    });
    group_evolution.finish();

    // Group 4: full per-metric pipeline on a SQL-shaped workload
    let mut group_pipeline = c.benchmark_group("metric_pipeline");
    group_pipeline.sample_size(10);

    for &families in &[4, 16] {
        let store = SyntheticWorkload::new(families, 25, 7).generate().unwrap();
        let params = AnalysisParams::default();
        group_pipeline.bench_function(BenchmarkId::new("cosine", store.len()), |b| {
            b.iter_batched(
                || store.standardised_rows().unwrap(),
                |rows| black_box(analyse_metric(&rows, Metric::Cosine, &params).unwrap()),
                BatchSize::SmallInput,
            )
        });
    }
    group_pipeline.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
