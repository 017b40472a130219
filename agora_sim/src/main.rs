//! Agora load simulator CLI
//!
//! Spins up the content engine in-process, drives it with a simulated user
//! population and reports the resulting metrics.

use agora_env::{AgoraContext, TokioContext};
use agora_sim::{ScenarioId, ScenarioResult, ScenarioRunner};
use clap::Parser;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Agora load simulation CLI
#[derive(Parser, Debug)]
#[command(name = "agora-sim")]
#[command(about = "Simulate community users against the Agora content engine", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Number of simulated agents
    #[arg(short, long, default_value = "1000")]
    agents: usize,

    /// Engine address (empty = no engine, setup fails)
    #[arg(long, default_value = "localhost:8090")]
    engine_addr: String,

    /// Port reported for external metrics scraping
    #[arg(long, default_value = "2112")]
    metrics_port: u16,

    /// Scenario to run (steady, hot_spot, churn, flaky, all)
    #[arg(short = 'S', long, default_value = "steady")]
    scenario: String,

    /// Run duration in seconds (0 = until Ctrl-C)
    #[arg(short, long, default_value = "60")]
    duration: f64,

    /// Hour of day agents see (default: current local hour)
    #[arg(long)]
    hour: Option<u8>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Export per-cycle metric frames to a JSON file
    #[arg(long)]
    export: Option<String>,
}

/// Resolves when the run should end: after `duration`, or on Ctrl-C.
async fn stop_signal(duration: f64) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Ctrl-C received, shutting down");
    };

    if duration > 0.0 {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs_f64(duration)) => {}
            _ = ctrl_c => {}
        }
    } else {
        ctrl_c.await;
    }
}

fn report(result: &ScenarioResult) {
    let m = &result.metrics;
    if result.passed {
        info!(
            "✓ {} (seed={}) PASSED in {:.1}s: {} posts, {} comments, {} votes, {} joins, {} errors",
            result.scenario.name(),
            result.seed,
            result.duration_secs,
            m.posts_created,
            m.comments_created,
            m.votes_recorded,
            m.joins_recorded,
            m.errors
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

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging; RUST_LOG overrides the flag
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    if !args.json {
        info!("Agora load simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    // Parse scenarios
    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        vec![args.scenario.parse().unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            eprintln!("Available scenarios: steady, hot_spot, churn, flaky, all");
            std::process::exit(1);
        })]
    };

    if scenarios.len() > 1 && args.export.is_some() {
        eprintln!("Error: --export only supports a single scenario, not 'all'");
        std::process::exit(1);
    }
    if scenarios.len() > 1 && args.duration <= 0.0 {
        eprintln!("Error: 'all' needs a positive --duration");
        std::process::exit(1);
    }

    // Determine base seed
    let seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(1)
    } else {
        args.seed
    };

    let hour = args.hour.unwrap_or_else(|| TokioContext::new().hour_of_day());
    let engine_addr = Some(args.engine_addr.trim().to_string()).filter(|a| !a.is_empty());

    let runner = ScenarioRunner::new(seed, args.agents)
        .with_duration(args.duration)
        .with_hour(hour)
        .with_engine_address(engine_addr)
        .with_metrics_port(args.metrics_port);

    let mut all_results: Vec<ScenarioResult> = Vec::new();
    for scenario in &scenarios {
        let result = runner.run_until(*scenario, stop_signal(args.duration)).await;
        if !args.json {
            report(&result);
        }
        all_results.push(result);
    }

    if let Some(path) = &args.export {
        if let Some(result) = all_results.first() {
            match result.export.write_to_file(path) {
                Ok(()) => info!("Exported {} frames to {}", result.export.frames.len(), path),
                Err(e) => error!("Failed to write export: {:?}", e),
            }
        }
    }

    let total = all_results.len();
    let failed_count = all_results.iter().filter(|r| !r.passed).count();

    if args.json {
        // JSON output for CI parsing
        let summary = serde_json::json!({
            "total": total,
            "passed": total - failed_count,
            "failed": failed_count,
            "results": all_results.iter().map(|r| {
                serde_json::json!({
                    "scenario": r.scenario.name(),
                    "seed": r.seed,
                    "passed": r.passed,
                    "duration_secs": r.duration_secs,
                    "failure_reason": r.failure_reason,
                    "metrics": r.metrics,
                })
            }).collect::<Vec<_>>(),
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{}", text),
            Err(e) => error!("Failed to render summary: {}", e),
        }
    } else if failed_count == 0 {
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!("✅ All {} scenario runs passed!", total);
    } else {
        warn!("❌ {}/{} scenario runs failed!", failed_count, total);
    }

    // Exit with proper code for CI
    if failed_count > 0 {
        std::process::exit(1);
    }
}
