//! MMS View Playback Simulator CLI
//!
//! Run deterministic playback sessions against a synthetic or loaded survey.

use clap::Parser;
use mmsview_sim::scenarios::ScenarioId;
use mmsview_sim::{ProjectConfig, ScenarioResult, ScenarioRunner};
use std::path::PathBuf;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// MMS View playback simulation CLI
#[derive(Parser, Debug)]
#[command(name = "mmsview-sim")]
#[command(about = "Run deterministic playback simulations for MMS View", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Scenario to run (scrub_slider, type_input, play_pause, arrow_jump,
    /// resize_during_precompute, end_of_survey, fixed_fps, speed_change, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Frames in the synthetic survey
    #[arg(short, long, default_value = "500")]
    frames: usize,

    /// Project descriptor (TOML) naming real survey files
    #[arg(short, long)]
    project: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Export every handled event of one scenario to a JSON file
    #[arg(long)]
    export: Option<String>,
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    if !args.json {
        info!("MMS View Playback Simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    // Parse scenarios
    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        match args.scenario.parse() {
            Ok(id) => vec![id],
            Err(e) => {
                eprintln!("Error: {}", e);
                let names: Vec<_> = ScenarioId::all().iter().map(|s| s.name()).collect();
                eprintln!("Available scenarios: {}, all", names.join(", "));
                std::process::exit(1);
            }
        }
    };

    // Determine seed
    let seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(42)
    } else {
        args.seed
    };

    let mut runner = ScenarioRunner::new(seed).with_frames(args.frames);
    if let Some(path) = &args.project {
        let world = match ProjectConfig::from_file(path).and_then(|config| config.load()) {
            Ok(world) => world,
            Err(e) => {
                error!("Failed to load project {}: {}", path.display(), e);
                std::process::exit(1);
            }
        };
        info!("Using survey {} ({} frames)", world.name, world.frame_count());
        runner = runner.with_world(world);
    }

    // Handle --export mode
    if let Some(export_path) = &args.export {
        if scenarios.len() > 1 {
            eprintln!("Error: --export only supports a single scenario, not 'all'");
            std::process::exit(1);
        }

        let (result, export) = runner.run_with_export(scenarios[0]);
        match export.write_to_file(export_path) {
            Ok(()) => info!("Exported {} events to {}", export.frames.len(), export_path),
            Err(e) => error!("Failed to write export: {:?}", e),
        }
        report(&result, args.json);
        if !result.passed {
            std::process::exit(1);
        }
        return;
    }

    let results: Vec<ScenarioResult> = scenarios.iter().map(|s| runner.run(*s)).collect();
    let failed_count = results.iter().filter(|r| !r.passed).count();

    if args.json {
        let summary = serde_json::json!({
            "total": results.len(),
            "passed": results.len() - failed_count,
            "failed": failed_count,
            "results": results.iter().map(result_json).collect::<Vec<_>>(),
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{}", text),
            Err(e) => error!("Failed to encode summary: {}", e),
        }
    } else {
        for result in &results {
            report(result, false);
        }
        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        if failed_count == 0 {
            info!("✅ All {} scenario runs passed!", results.len());
        } else {
            error!("❌ {}/{} scenario runs failed!", failed_count, results.len());
        }
    }

    // Exit with proper code for CI
    if failed_count > 0 {
        std::process::exit(1);
    }
}

fn result_json(r: &ScenarioResult) -> serde_json::Value {
    serde_json::json!({
        "scenario": r.scenario.name(),
        "seed": r.seed,
        "passed": r.passed,
        "events": r.total_events,
        "final_position": r.final_position,
        "time_secs": r.final_time_secs,
        "seeks": r.metrics.seeks,
        "frames_advanced": r.metrics.frames_advanced,
        "failure_reason": r.failure_reason,
    })
}

fn report(result: &ScenarioResult, json: bool) {
    if json {
        println!("{}", result_json(result));
    } else if result.passed {
        info!(
            "✓ {} (seed={}) PASSED - {} events, {} invariant checks",
            result.scenario.name(),
            result.seed,
            result.total_events,
            result.metrics.invariant_checks
        );
    } else {
        error!(
            "✗ {} (seed={}) FAILED: {}",
            result.scenario.name(),
            result.seed,
            result.failure_reason.as_deref().unwrap_or("unknown")
        );
    }
}
