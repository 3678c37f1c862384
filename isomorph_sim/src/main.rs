//! isomorph Simulation CLI
//!
//! Run seeded graph scenarios against the validator, or compare two JSON
//! documents structurally.

use clap::{Args, Parser, Subcommand};
use isomorph_core::{validate_objects_are_equal, ValidationOptions};
use isomorph_sim::{ScenarioId, ScenarioResult, ScenarioRunner, SimError, SimExport};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// isomorph structural equality simulator
#[derive(Parser, Debug)]
#[command(name = "isomorph-sim")]
#[command(about = "Seeded simulation and JSON comparison for isomorph", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run graph scenarios
    Run(RunArgs),

    /// Compare two JSON documents; exits with 1 on mismatch
    Compare(CompareArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Scenario to run (tree, shared_diamond, self_cycle, ring, deep_chain,
    /// value_drift, length_drift, type_drift, null_drift, slow_compare, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Number of consecutive master seeds to run
    #[arg(long, default_value = "1")]
    seeds: u64,

    /// Iterations per scenario and seed
    #[arg(short, long, default_value = "10")]
    iterations: u64,

    /// Deadline of each comparison in milliseconds
    #[arg(long, default_value = "10000")]
    timeout_ms: u64,

    /// Directory of the replay files
    #[arg(long)]
    replay_dir: Option<PathBuf>,

    /// Replay the saved random numbers of this iteration
    #[arg(long)]
    replay: Option<u64>,

    /// Do not save replay files for failing iterations
    #[arg(long)]
    no_save: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Export results and statistics to a JSON file
    #[arg(long)]
    export: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct CompareArgs {
    /// Expected JSON document
    expected: PathBuf,

    /// Actual JSON document
    actual: PathBuf,

    /// Deadline in milliseconds
    #[arg(long, default_value = "10000")]
    timeout_ms: u64,

    /// Display cap for rendered values
    #[arg(long, default_value = "200")]
    max_display_length: usize,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    let outcome = match cli.command {
        Command::Run(args) => run(args).await,
        Command::Compare(args) => compare(args).await,
    };

    match outcome {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{e}");
            std::process::exit(2);
        }
    }
}

async fn run(args: RunArgs) -> Result<bool, SimError> {
    if !args.json {
        info!("isomorph simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        vec![args.scenario.parse().map_err(|_| SimError::UnknownScenario(args.scenario.clone()))?]
    };

    let base_seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos() as u64)
            .unwrap_or(1)
    } else {
        args.seed
    };

    let mut all_results: Vec<ScenarioResult> = Vec::new();
    let mut export = SimExport::new(base_seed);

    for seed_offset in 0..args.seeds {
        let seed = base_seed.wrapping_add(seed_offset);
        let mut runner = ScenarioRunner::new(seed)
            .with_iterations(args.iterations)
            .with_timeout(Duration::from_millis(args.timeout_ms))
            .with_save_failures(!args.no_save);
        if let Some(dir) = &args.replay_dir {
            runner = runner.with_replay_dir(dir);
        }
        if let Some(iteration) = args.replay {
            runner = runner.with_replay(iteration);
        }

        for scenario in &scenarios {
            let result = runner.run(*scenario).await?;

            if !args.json {
                if result.passed {
                    info!("✓ {} (seed={}) PASSED", scenario.name(), seed);
                } else {
                    error!(
                        "✗ {} (seed={}) FAILED: {}",
                        scenario.name(),
                        seed,
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
                for line in result.statistics_text.lines() {
                    tracing::debug!("  {line}");
                }
            }

            export.add_result(&result);
            all_results.push(result);
        }
    }

    export.finalize();
    if let Some(path) = &args.export {
        export.write_to_file(path)?;
        if !args.json {
            info!("Exported {} runs to {}", export.runs.len(), path.display());
        }
    }

    let total = all_results.len();
    let failed: Vec<&ScenarioResult> = all_results.iter().filter(|r| !r.passed).collect();

    if args.json {
        let summary = serde_json::json!({
            "total": total,
            "passed": total - failed.len(),
            "failed": failed.len(),
            "results": all_results.iter().map(|r| {
                serde_json::json!({
                    "scenario": r.scenario.name(),
                    "seed": r.seed,
                    "passed": r.passed,
                    "iterations": r.metrics.iterations,
                    "time_secs": r.final_time_secs,
                    "failure_reason": r.failure_reason,
                    "replay_files": r.failures.iter().filter_map(|f| f.replay_file.as_ref()).collect::<Vec<_>>(),
                })
            }).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        if failed.is_empty() {
            info!("✅ All {} scenario runs passed!", total);
        } else {
            error!("❌ {}/{} scenario runs failed!", failed.len(), total);
            for result in &failed {
                for failure in &result.failures {
                    error!(
                        "  - {} iteration={} seed={}: {}",
                        result.scenario.name(),
                        failure.iteration,
                        failure.seed,
                        failure.reason
                    );
                    if let Some(file) = &failure.replay_file {
                        error!("    replay: --scenario {} --seed {} --replay {} ({})",
                            result.scenario.name(), result.seed, failure.iteration, file.display());
                    }
                }
            }
        }
    }

    Ok(failed.is_empty())
}

async fn compare(args: CompareArgs) -> Result<bool, SimError> {
    let expected = read_json(&args.expected)?;
    let actual = read_json(&args.actual)?;
    let options = ValidationOptions::default()
        .with_timeout_ms(args.timeout_ms)
        .with_max_display_length(args.max_display_length);

    match validate_objects_are_equal(&expected, &actual, options).await {
        Ok(stats) => {
            if args.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({ "equal": true, "stats": stats }))?
                );
            } else {
                info!(
                    "✓ {} and {} are structurally equal ({} members)",
                    args.expected.display(),
                    args.actual.display(),
                    stats.members_visited
                );
            }
            Ok(true)
        }
        Err(err) if err.report().is_some() || err.is_timeout() => {
            if args.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "equal": false,
                        "kind": err.kind(),
                        "report": err.report(),
                        "message": err.to_string(),
                    }))?
                );
            } else {
                error!("✗ {err}");
            }
            Ok(false)
        }
        Err(err) => Err(err.into()),
    }
}

fn read_json(path: &Path) -> Result<serde_json::Value, SimError> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}
