//! TrackHeat Simulator CLI
//!
//! Run deterministic heatmap scenarios over synthetic GPS corpora.

use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;
use trackheat_core::HeatmapConfig;
use trackheat_sim::{HeatmapExport, ScenarioId, ScenarioResult, ScenarioRunner};

/// TrackHeat deterministic simulation CLI
#[derive(Parser, Debug)]
#[command(name = "trackheat-sim")]
#[command(about = "Run deterministic heatmap scenarios for TrackHeat", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Scenario to run (single_cell, cell_jump, short_track, sparse_logger,
    /// commute, determinism, resume, corrupt_store, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Rides per generated corpus
    #[arg(short, long, default_value = "20")]
    tracks: usize,

    /// Logger ticks per generated ride
    #[arg(long, default_value = "180")]
    ticks: u32,

    /// Number of consecutive seeds to test (for CI mode)
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Directory for sled snapshot stores (default: in-memory)
    #[arg(long)]
    store: Option<PathBuf>,

    /// JSON file overriding engine configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Export the heatmap of a single scenario to a JSON file
    #[arg(long)]
    export: Option<PathBuf>,

    /// Keep every n-th step in the export
    #[arg(long, default_value = "1")]
    export_stride: usize,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    if !args.json {
        info!("TrackHeat Simulator v0.1.0");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let config = match &args.config {
        Some(path) => HeatmapConfig::from_json_file(path),
        None => Ok(HeatmapConfig::default()),
    };
    let config = config.unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(2);
    });

    // Parse scenarios
    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        vec![args.scenario.parse().unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            eprintln!("Available scenarios: {}, all", ScenarioId::all().iter().map(|s| s.name()).collect::<Vec<_>>().join(", "));
            std::process::exit(1);
        })]
    };

    if args.export.is_some() && (scenarios.len() > 1 || args.seeds > 1) {
        eprintln!("Error: --export only supports a single scenario and seed");
        std::process::exit(1);
    }

    if let Some(dir) = &args.store {
        if !args.json {
            let persisted: Vec<&str> = scenarios.iter().filter(|s| s.uses_store()).map(|s| s.name()).collect();
            info!("Snapshot stores under {} (resumable: {})", dir.display(), persisted.join(", "));
        }
    }

    // Determine base seed
    let base_seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(42)
    } else {
        args.seed
    };

    // Track results
    let mut all_results: Vec<ScenarioResult> = Vec::new();
    let mut failed_count = 0;

    for seed_offset in 0..args.seeds {
        let seed = base_seed.wrapping_add(seed_offset as u64);

        let mut runner = ScenarioRunner::new(seed, args.tracks)
            .with_ride_ticks(args.ticks)
            .with_config(config.clone());
        if let Some(dir) = &args.store {
            runner = runner.with_store_dir(dir);
        }

        for scenario in &scenarios {
            let result = runner.run(*scenario);

            if !args.json {
                if result.passed {
                    info!("✓ {} (seed={}) PASSED", scenario.name(), seed);
                } else {
                    error!("✗ {} (seed={}) FAILED: {}",
                        scenario.name(),
                        seed,
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
            }

            if !result.passed {
                failed_count += 1;
            }

            all_results.push(result);
        }
    }

    // Handle --export
    if let Some(export_path) = &args.export {
        match all_results.first().and_then(|r| r.series.as_ref().map(|s| (r, s))) {
            Some((result, series)) => {
                let mut export = HeatmapExport::from_series(result.scenario.name(), result.seed, series, args.export_stride);
                export.finalize(result.passed);
                match export.write_to_file(export_path) {
                    Ok(()) => info!("Exported {} frames to {}", export.frames.len(), export_path.display()),
                    Err(e) => {
                        error!("Failed to write export: {}", e);
                        failed_count += 1;
                    }
                }
            }
            None => error!("Scenario produced no heatmap to export"),
        }
    }

    // Summary
    let total = all_results.len();
    let passed = total - failed_count.min(total);

    if args.json {
        // JSON output for CI parsing
        let summary = serde_json::json!({
            "total": total,
            "passed": passed,
            "failed": failed_count,
            "results": all_results.iter().map(|r| {
                serde_json::json!({
                    "scenario": r.scenario.name(),
                    "seed": r.seed,
                    "passed": r.passed,
                    "tracks_generated": r.tracks_generated,
                    "tracks_accepted": r.tracks_accepted,
                    "steps": r.steps,
                    "visited_cells": r.metrics.visited_cells,
                    "total_hits": r.metrics.total_hits,
                    "loaded_steps": r.metrics.loaded_steps,
                    "computed_steps": r.metrics.computed_steps,
                    "failure_reason": r.failure_reason,
                })
            }).collect::<Vec<_>>(),
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("Error: {}", e),
        }
    } else {
        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        if failed_count == 0 {
            info!("✅ All {} scenario runs passed!", total);
        } else {
            error!("❌ {}/{} scenario runs failed!", failed_count, total);

            // List failed seeds
            for result in &all_results {
                if !result.passed {
                    error!("  - {} seed={}: {}",
                        result.scenario.name(),
                        result.seed,
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
            }
        }
    }

    // Exit with proper code for CI
    if failed_count > 0 {
        std::process::exit(1);
    }
}
