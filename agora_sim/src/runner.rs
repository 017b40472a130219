//! Scenario runner - builds a world per scenario, runs it, and grades it.

use crate::context::SimContext;
use crate::exporter::SimExport;
use crate::scenarios::ScenarioId;
use crate::world::{SimConfig, SimWorld};

use agora_core::MetricsSnapshot;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, warn};

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// At least one successful action and no setup failure
    pub passed: bool,

    /// Wall time the loops were running
    pub duration_secs: f64,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Final metrics
    pub metrics: MetricsSnapshot,

    /// Reporting-cycle frames
    pub export: SimExport,
}

/// Runs load scenarios.
pub struct ScenarioRunner {
    config: SimConfig,

    /// How long each scenario runs
    duration: Duration,

    /// Hour of day the virtual clock is pinned to
    hour: u8,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64, num_agents: usize) -> Self {
        Self {
            config: SimConfig {
                seed,
                num_agents,
                ..Default::default()
            },
            duration: Duration::from_secs(60),
            hour: 12,
        }
    }

    /// Replaces the base configuration; scenario overrides still apply.
    pub fn with_config(mut self, config: SimConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the run duration.
    pub fn with_duration(mut self, secs: f64) -> Self {
        self.duration = Duration::from_secs_f64(secs.max(0.0));
        self
    }

    /// Sets the hour of day agents see.
    pub fn with_hour(mut self, hour: u8) -> Self {
        self.hour = hour % 24;
        self
    }

    pub fn with_engine_address(mut self, address: Option<String>) -> Self {
        self.config.engine_address = address;
        self
    }

    pub fn with_metrics_port(mut self, port: u16) -> Self {
        self.config.metrics_port = port;
        self
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Runs a scenario for the configured duration.
    pub async fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        self.run_until(scenario, tokio::time::sleep(self.duration)).await
    }

    /// Runs a scenario until `stop` resolves.
    pub async fn run_until<F>(&self, scenario: ScenarioId, stop: F) -> ScenarioResult
    where
        F: Future<Output = ()>,
    {
        let mut config = self.config.clone();
        scenario.apply(&mut config);
        let seed = config.seed;

        info!(
            "Starting scenario: {} (seed={}) - {}",
            scenario.name(),
            seed,
            scenario.description()
        );

        let context = SimContext::shared(seed);
        context.set_hour(self.hour);
        let mut world = SimWorld::new(config, context, scenario.name());

        if let Err(e) = world.start().await {
            error!("Setup failed for {}: {}", scenario.name(), e);
            let metrics = world.shutdown().await;
            let mut export = world.export();
            export.finalize(false, metrics.clone());
            return ScenarioResult {
                scenario,
                seed,
                passed: false,
                duration_secs: 0.0,
                failure_reason: Some(format!("setup failed: {}", e)),
                metrics,
                export,
            };
        }

        let started = Instant::now();
        stop.await;
        let duration_secs = started.elapsed().as_secs_f64();
        let metrics = world.shutdown().await;

        let passed = metrics.total_actions() > 0;
        let failure_reason = if passed {
            None
        } else {
            warn!("{}: no action succeeded in {:.1}s", scenario.name(), duration_secs);
            Some("no successful actions".to_string())
        };

        let mut export = world.export();
        export.finalize(passed, metrics.clone());

        ScenarioResult {
            scenario,
            seed,
            passed,
            duration_secs,
            failure_reason,
            metrics,
            export,
        }
    }
}
