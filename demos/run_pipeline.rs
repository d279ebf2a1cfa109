/// End-to-end run over a synthetic SQL workload.
///
/// Builds an engine for all three metrics, prints the selected thresholds and a
/// few recommendations, then writes the run artifact to the path given as the
/// first argument (default: `topospace_run.json`).
///
/// RUST_LOG=info cargo run --example run_pipeline -- out.json
use log::info;

use topospace::builder::TopoEngineBuilder;
use topospace::distance::Metric;
use topospace::synthetic::SyntheticWorkload;

fn main() -> topospace::Result<()> {
    env_logger::init();

    let out = std::env::args().nth(1).unwrap_or_else(|| "topospace_run.json".to_string());

    let store = SyntheticWorkload {
        families: 5,
        per_family: 8,
        ..SyntheticWorkload::default()
    }
    .generate()?;
    info!("📊 Workload: {} queries × {} features", store.len(), store.dimensionality());

    let engine = TopoEngineBuilder::new()
        .with_run_id("demo")
        .with_top_k(3)
        .with_recommendations_for(vec![0, 8, 16])
        .build(store)?;

    let artifact = engine.run();

    for metric in Metric::ALL {
        let Some(m) = artifact.metric(metric) else {
            println!("{:<12} failed: {}", metric.name(), artifact.failures.get(metric.name()).map(String::as_str).unwrap_or("not run"));
            continue;
        };
        println!("\n== {} ==", metric);
        println!(
            "distances: min {:.3}  median {:.3}  max {:.3}",
            m.distance_summary.min, m.distance_summary.median, m.distance_summary.max
        );
        for t in &m.thresholds {
            println!("  threshold {:>8.4} -> {:>3} clusters", t.value, t.cluster_count);
        }
        for flag in &m.numeric_flags {
            println!("  fallback: {:?}", flag);
        }
        for (source, entries) in &m.recommendations {
            println!("  query {}:", source);
            for e in entries {
                println!("    -> {:>3}  {}", e.target, e.explanation);
            }
        }
    }

    artifact.save(&out)?;
    println!("\nArtifact written to {}", out);
    Ok(())
}
