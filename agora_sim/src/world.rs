//! SimWorld - The simulation harness container.

use crate::controller::SimulationController;
use crate::error::SimError;
use crate::exporter::SimExport;
use crate::network::FaultyTransport;

use agora_core::{AgoraMetrics, ContentEngine, EngineHandle, MemoryStore, MetricsSnapshot};
use agora_env::{AgoraContext, DomainRequest, EngineTransport, FaultController};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

/// Engine transport used by the world's agents.
pub type WorldTransport = FaultyTransport<EngineHandle>;

/// Configuration for a simulation run.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Master seed for determinism
    pub seed: u64,

    /// Number of agents to spawn
    pub num_agents: usize,

    /// Engine address; `None` leaves the controller without an engine
    pub engine_address: Option<String>,

    /// Port an external metrics scraper is expected on
    pub metrics_port: u16,

    /// Zipf exponent for agent and community popularity
    pub zipf_skew: f64,

    /// Period of the action loop
    pub action_interval: Duration,

    /// Period of the connectivity loop
    pub connectivity_interval: Duration,

    /// Period of the reporting loop
    pub report_interval: Duration,

    /// Chance an agent is connected after each connectivity sweep
    pub connect_probability: f64,

    /// Bounded wait for every engine request
    pub request_timeout: Duration,

    /// Communities seeded before agents start
    pub num_communities: usize,

    /// Capacity of each agent's signal inbox
    pub inbox_capacity: usize,

    /// Capacity of the engine mailbox
    pub engine_capacity: usize,

    /// Fraction of engine requests dropped in transit
    pub drop_rate: f64,

    /// Latency added to every engine request
    pub injected_latency: Duration,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            num_agents: 1000,
            engine_address: Some("localhost:8090".to_string()),
            metrics_port: 2112,
            zipf_skew: 1.1,
            action_interval: Duration::from_millis(100),
            connectivity_interval: Duration::from_secs(5),
            report_interval: Duration::from_secs(5),
            connect_probability: 0.8,
            request_timeout: Duration::from_secs(5),
            num_communities: 10,
            inbox_capacity: 64,
            engine_capacity: 1024,
            drop_rate: 0.0,
            injected_latency: Duration::ZERO,
        }
    }
}

/// The SimWorld - store, engine, transport and controller wired together.
///
/// Must be created inside a tokio runtime; the engine task is spawned
/// immediately.
pub struct SimWorld<Ctx: AgoraContext> {
    /// Configuration
    pub config: SimConfig,

    /// Shared context (clock, seeds, spawning)
    pub context: Arc<Ctx>,

    store: Arc<MemoryStore>,
    metrics: Arc<AgoraMetrics>,
    transport: Option<Arc<WorldTransport>>,
    engine_task: Option<JoinHandle<()>>,
    controller: SimulationController<Ctx, WorldTransport>,
    export: Arc<Mutex<SimExport>>,
}

impl<Ctx: AgoraContext> SimWorld<Ctx> {
    /// Creates a new SimWorld. The engine is only spawned when
    /// `config.engine_address` is set.
    pub fn new(config: SimConfig, context: Arc<Ctx>, scenario: &str) -> Self {
        let store = Arc::new(MemoryStore::new());
        let metrics = AgoraMetrics::shared();
        let export = Arc::new(Mutex::new(SimExport::new(scenario, config.seed)));

        let mut controller = SimulationController::new(config.clone(), Arc::clone(&metrics), Arc::clone(&context))
            .with_export(Arc::clone(&export));

        let mut transport = None;
        let mut engine_task = None;
        if let Some(address) = &config.engine_address {
            let engine = ContentEngine::new(Arc::clone(&store), Arc::clone(&metrics), Arc::clone(&context));
            let (handle, task) = engine.spawn(address.clone(), config.engine_capacity);

            let faulty = Arc::new(FaultyTransport::new(handle, context.derive_seed(u64::MAX)));

            controller = controller.with_engine(Arc::clone(&faulty));
            transport = Some(faulty);
            engine_task = Some(task);
        }

        Self {
            config,
            context,
            store,
            metrics,
            transport,
            engine_task,
            controller,
            export,
        }
    }

    /// Verifies the engine answers a ping, then starts the controller.
    ///
    /// Configured link faults are switched on only after setup succeeded.
    pub async fn start(&mut self) -> Result<(), SimError> {
        if let Some(transport) = &self.transport {
            let reply = transport
                .request(DomainRequest::Ping, self.config.request_timeout)
                .await?;
            info!(engine = transport.address(), reply = ?reply, "engine reachable");
        }
        info!(
            port = self.config.metrics_port,
            "metrics available for scraping via AgoraMetrics::render_text"
        );
        self.controller.start().await?;

        if let Some(transport) = &self.transport {
            transport.set_drop_rate(self.config.drop_rate);
            transport.set_latency(self.config.injected_latency);
        }
        Ok(())
    }

    /// Lets the loops run for `duration`.
    pub async fn run_for(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    /// Stops the controller, then the engine. Returns the final metrics.
    pub async fn shutdown(&mut self) -> MetricsSnapshot {
        self.controller.shutdown().await;

        // Agents are gone; dropping the last handle closes the mailbox
        self.transport = None;
        if let Some(task) = self.engine_task.take() {
            let _ = task.await;
        }
        self.metrics.snapshot()
    }

    pub fn metrics(&self) -> &Arc<AgoraMetrics> {
        &self.metrics
    }

    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    /// Fault controls for the engine link, if an engine is attached.
    pub fn faults(&self) -> Option<&dyn FaultController> {
        self.transport.as_deref().map(|t| t as &dyn FaultController)
    }

    pub fn controller(&self) -> &SimulationController<Ctx, WorldTransport> {
        &self.controller
    }

    /// Copy of the frames collected so far.
    pub fn export(&self) -> SimExport {
        self.export
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}
