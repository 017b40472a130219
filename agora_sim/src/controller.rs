//! SimulationController - population setup and the three periodic loops.
//!
//! ```text
//!             ┌───────────── action loop (Zipf pick) ─────────────┐
//!             │                                                   ▼
//! controller ─┼──── connectivity loop (every agent) ────► agent inboxes ──► engine
//!             │
//!             └──── reporting loop ──► AgoraMetrics / SimExport
//! ```
//!
//! The agent list is fixed once `start` returns. All loops observe a
//! shared `watch` channel and exit on shutdown.

use crate::agent::{AgentHandle, AgentSignal, ClientAgent};
use crate::behavior::{BehaviorProfile, Persona};
use crate::content;
use crate::distribution::{AgentSelector, CommunityDistribution, CommunityEntry};
use crate::error::SimError;
use crate::exporter::{SimExport, SimFrame};
use crate::world::SimConfig;

use agora_core::AgoraMetrics;
use agora_env::{new_entity_id, AgoraContext, CreateCommunity, DomainRequest, EngineTransport, RegisterUser};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

// RNG stream ids, kept clear of the per-agent streams (index + 1)
const PROFILE_STREAM: u64 = 1 << 40;
const COMMUNITY_STREAM: u64 = (1 << 40) + 1;
const ACTION_STREAM: u64 = (1 << 40) + 2;
const CONNECTIVITY_STREAM: u64 = (1 << 40) + 3;

/// Owns the agent population and drives it.
pub struct SimulationController<Ctx, Net>
where
    Ctx: AgoraContext,
    Net: EngineTransport,
{
    config: SimConfig,
    engine: Option<Arc<Net>>,
    metrics: Arc<AgoraMetrics>,
    context: Arc<Ctx>,

    agents: Arc<Vec<AgentHandle>>,
    agent_tasks: Vec<JoinHandle<()>>,
    loop_tasks: Vec<JoinHandle<()>>,
    shutdown_tx: Option<watch::Sender<bool>>,

    communities: Arc<CommunityDistribution>,
    /// Signals lost to full or closed inboxes
    dropped_signals: Arc<AtomicU64>,
    export: Option<Arc<Mutex<SimExport>>>,
    started: bool,
}

impl<Ctx, Net> SimulationController<Ctx, Net>
where
    Ctx: AgoraContext,
    Net: EngineTransport,
{
    /// Creates a controller with no engine attached.
    pub fn new(config: SimConfig, metrics: Arc<AgoraMetrics>, context: Arc<Ctx>) -> Self {
        Self {
            config,
            engine: None,
            metrics,
            context,
            agents: Arc::new(Vec::new()),
            agent_tasks: Vec::new(),
            loop_tasks: Vec::new(),
            shutdown_tx: None,
            communities: Arc::new(CommunityDistribution::default()),
            dropped_signals: Arc::new(AtomicU64::new(0)),
            export: None,
            started: false,
        }
    }

    /// Attaches the engine transport.
    pub fn with_engine(mut self, engine: Arc<Net>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Sends a frame to `export` on every reporting cycle.
    pub fn with_export(mut self, export: Arc<Mutex<SimExport>>) -> Self {
        self.export = Some(export);
        self
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    pub fn communities(&self) -> &CommunityDistribution {
        &self.communities
    }

    pub fn dropped_signals(&self) -> u64 {
        self.dropped_signals.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.shutdown_tx.is_some()
    }

    /// Sets up the population and starts the periodic loops.
    ///
    /// Fails before any loop starts if no engine is attached, the
    /// population cannot be sampled, or any seeding/registration request
    /// fails.
    pub async fn start(&mut self) -> Result<(), SimError> {
        if self.started {
            return Err(SimError::AlreadyStarted);
        }
        let engine = self.engine.clone().ok_or(SimError::EngineUnset)?;
        let selector = AgentSelector::new(self.config.num_agents, self.config.zipf_skew)?;
        self.started = true;

        info!(
            engine = engine.address(),
            agents = self.config.num_agents,
            communities = self.config.num_communities,
            "starting simulation"
        );

        self.communities = Arc::new(self.seed_communities(engine.as_ref()).await?);
        self.spawn_population(&engine).await?;
        self.metrics.set_active_users(self.config.num_agents as i64);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        self.shutdown_tx = Some(shutdown_tx);

        let action_rng = ChaCha8Rng::seed_from_u64(self.context.derive_seed(ACTION_STREAM));
        let connectivity_rng = ChaCha8Rng::seed_from_u64(self.context.derive_seed(CONNECTIVITY_STREAM));

        self.loop_tasks.push(self.context.spawn(
            "action-loop",
            action_loop(
                Arc::clone(&self.agents),
                selector,
                action_rng,
                self.config.action_interval,
                Arc::clone(&self.dropped_signals),
                shutdown_rx.clone(),
            ),
        ));
        self.loop_tasks.push(self.context.spawn(
            "connectivity-loop",
            connectivity_loop(
                Arc::clone(&self.agents),
                connectivity_rng,
                self.config.connect_probability,
                self.config.connectivity_interval,
                Arc::clone(&self.metrics),
                Arc::clone(&self.dropped_signals),
                shutdown_rx.clone(),
            ),
        ));
        self.loop_tasks.push(self.context.spawn(
            "reporting-loop",
            reporting_loop(
                Arc::clone(&self.metrics),
                self.export.clone(),
                self.config.report_interval,
                shutdown_rx,
            ),
        ));

        Ok(())
    }

    /// Creates a founder user and `num_communities` communities.
    async fn seed_communities(&self, engine: &Net) -> Result<CommunityDistribution, SimError> {
        if self.config.num_communities == 0 {
            return Ok(CommunityDistribution::default());
        }

        let founder_id = new_entity_id();
        let founder = DomainRequest::RegisterUser(RegisterUser {
            user_id: founder_id.clone(),
            username: "agora_founder".to_string(),
            password: String::new(),
        });
        self.expect_success(engine, founder)
            .await
            .map_err(|reason| SimError::Registration {
                agent: "founder".to_string(),
                reason,
            })?;

        let mut rng = ChaCha8Rng::seed_from_u64(self.context.derive_seed(COMMUNITY_STREAM));
        let mut entries = Vec::with_capacity(self.config.num_communities);
        for index in 0..self.config.num_communities {
            let name = content::community_name(index);
            let id = new_entity_id();
            let request = DomainRequest::CreateCommunity(CreateCommunity {
                id: id.clone(),
                name: name.clone(),
                description: format!("All about {}", name),
                creator_id: founder_id.clone(),
            });
            self.expect_success(engine, request)
                .await
                .map_err(|reason| SimError::Seeding {
                    community: name.clone(),
                    reason,
                })?;

            entries.push(CommunityEntry {
                id,
                name,
                post_probability: rng.gen_range(0.3..0.9),
            });
        }

        CommunityDistribution::new(entries, self.config.zipf_skew)
    }

    async fn expect_success(&self, engine: &Net, request: DomainRequest) -> Result<String, String> {
        match engine.request(request, self.config.request_timeout).await {
            Ok(reply) => reply.into_result(),
            Err(e) => Err(e.to_string()),
        }
    }

    /// Generates, registers and spawns every agent.
    async fn spawn_population(&mut self, engine: &Arc<Net>) -> Result<(), SimError> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.context.derive_seed(PROFILE_STREAM));
        let mut persona_counts: BTreeMap<Persona, u64> = BTreeMap::new();
        let mut handles = Vec::with_capacity(self.config.num_agents);

        for index in 0..self.config.num_agents {
            let profile = BehaviorProfile::generate(&mut rng);
            *persona_counts.entry(profile.persona()).or_default() += 1;

            let agent = ClientAgent::new(
                index,
                profile,
                Arc::clone(&self.communities),
                Arc::clone(engine),
                Arc::clone(&self.metrics),
                Arc::clone(&self.context),
                self.config.request_timeout,
            );
            agent.register().await?;

            let (handle, task) = agent.spawn(self.config.inbox_capacity);
            handles.push(handle);
            self.agent_tasks.push(task);
        }

        for persona in Persona::all() {
            let count = persona_counts.get(&persona).copied().unwrap_or(0);
            self.metrics.update_persona_count(persona.name(), count);
        }
        debug!(?persona_counts, "population generated");

        self.agents = Arc::new(handles);
        Ok(())
    }

    /// Stops the loops, then closes every inbox and waits for the agents.
    ///
    /// Also cleans up after a `start` that failed halfway through setup.
    pub async fn shutdown(&mut self) {
        self.engine = None;
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(true);
        }

        for task in self.loop_tasks.drain(..) {
            if let Err(e) = task.await {
                warn!("periodic loop ended abnormally: {}", e);
            }
        }

        // Last inbox senders go away here
        self.agents = Arc::new(Vec::new());
        for task in self.agent_tasks.drain(..) {
            if let Err(e) = task.await {
                warn!("agent task ended abnormally: {}", e);
            }
        }

        let dropped = self.dropped_signals();
        if dropped > 0 {
            warn!(dropped, "signals dropped on full inboxes");
        }
        if self.started {
            info!("simulation stopped");
        }
    }
}

fn ticker(period: Duration) -> tokio::time::Interval {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Triggers one Zipf-selected agent per period.
async fn action_loop(
    agents: Arc<Vec<AgentHandle>>,
    selector: AgentSelector,
    mut rng: ChaCha8Rng,
    period: Duration,
    dropped: Arc<AtomicU64>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = ticker(period);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let index = selector.select(&mut rng);
                if let Some(agent) = agents.get(index) {
                    if !agent.signal(AgentSignal::Trigger) {
                        dropped.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
            _ = shutdown.changed() => break,
        }
    }
}

/// Redraws every agent's connectivity each period.
async fn connectivity_loop(
    agents: Arc<Vec<AgentHandle>>,
    mut rng: ChaCha8Rng,
    connect_probability: f64,
    period: Duration,
    metrics: Arc<AgoraMetrics>,
    dropped: Arc<AtomicU64>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = ticker(period);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let mut connected = 0usize;
                for agent in agents.iter() {
                    let is_connected = rng.gen::<f64>() < connect_probability;
                    if is_connected {
                        connected += 1;
                    }
                    if !agent.signal(AgentSignal::Connectivity(is_connected)) {
                        dropped.fetch_add(1, Ordering::Relaxed);
                    }
                }
                let rate = if agents.is_empty() {
                    0.0
                } else {
                    connected as f64 / agents.len() as f64
                };
                metrics.update_simulation(agents.len(), rate);
            }
            _ = shutdown.changed() => break,
        }
    }
}

/// Logs a metrics report each period and appends it to the export.
async fn reporting_loop(
    metrics: Arc<AgoraMetrics>,
    export: Option<Arc<Mutex<SimExport>>>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let started = Instant::now();
    let mut interval = ticker(period);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let snapshot = metrics.report_current_stats();
                if let Some(export) = &export {
                    let frame = SimFrame {
                        time_sec: started.elapsed().as_secs_f64(),
                        metrics: snapshot,
                    };
                    export
                        .lock()
                        .unwrap_or_else(|poisoned| poisoned.into_inner())
                        .add_frame(frame);
                }
            }
            _ = shutdown.changed() => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SimContext;
    use agora_core::{ContentEngine, EngineHandle, MemoryStore};

    fn config(num_agents: usize) -> SimConfig {
        SimConfig {
            seed: 5,
            num_agents,
            num_communities: 3,
            ..Default::default()
        }
    }

    fn engine(metrics: Arc<AgoraMetrics>, context: Arc<SimContext>) -> (Arc<EngineHandle>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let engine = ContentEngine::new(Arc::clone(&store), metrics, context);
        let (handle, _task) = engine.spawn("test-engine", 64);
        (Arc::new(handle), store)
    }

    #[tokio::test]
    async fn test_start_without_engine_fails() {
        let context = SimContext::shared(1);
        let mut controller: SimulationController<SimContext, EngineHandle> =
            SimulationController::new(config(4), AgoraMetrics::shared(), context);

        assert!(matches!(controller.start().await, Err(SimError::EngineUnset)));
        assert!(!controller.is_running());
        assert_eq!(controller.agent_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_population_fails() {
        let context = SimContext::shared(1);
        let metrics = AgoraMetrics::shared();
        let (handle, _) = engine(metrics.clone(), context.clone());
        let mut controller = SimulationController::new(config(0), metrics, context).with_engine(handle);

        assert!(matches!(controller.start().await, Err(SimError::Distribution(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_setup_registers_everyone() {
        let context = SimContext::shared(1);
        let metrics = AgoraMetrics::shared();
        let (handle, store) = engine(metrics.clone(), context.clone());
        let mut controller = SimulationController::new(config(20), metrics.clone(), context)
            .with_engine(handle);

        controller.start().await.unwrap();

        // 20 agents plus the founder
        assert_eq!(metrics.registered_users(), 21);
        assert_eq!(store.counts().0, 21);
        assert_eq!(store.counts().1, 3);
        assert_eq!(controller.communities().len(), 3);
        assert!(controller
            .communities()
            .communities()
            .iter()
            .all(|c| (0.3..0.9).contains(&c.post_probability)));
        assert_eq!(metrics.active_users(), 20);

        let snapshot = metrics.snapshot();
        let population: u64 = snapshot.personas.values().map(|p| p.agents).sum();
        assert_eq!(population, 20);
        assert_eq!(snapshot.personas.len(), Persona::all().len());

        assert!(matches!(controller.start().await, Err(SimError::AlreadyStarted)));
        controller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_connectivity_loop_reports_rate() {
        let context = SimContext::shared(9);
        let metrics = AgoraMetrics::shared();
        let (handle, _) = engine(metrics.clone(), context.clone());
        let mut controller = SimulationController::new(config(50), metrics.clone(), context)
            .with_engine(handle);

        controller.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(5_100)).await;

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.simulated_users, 50);
        assert!(snapshot.connection_rate > 0.5 && snapshot.connection_rate <= 1.0);
        controller.shutdown().await;

        // Gauge equals the number of agents left connected
        let connected = (snapshot.connection_rate * 50.0).round() as i64;
        assert_eq!(metrics.active_users(), connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reporting_loop_fills_export() {
        let context = SimContext::shared(3);
        context.set_hour(12);
        let metrics = AgoraMetrics::shared();
        let export = Arc::new(Mutex::new(SimExport::new("steady", 3)));
        let (handle, _) = engine(metrics.clone(), context.clone());
        let mut controller = SimulationController::new(config(10), metrics.clone(), context)
            .with_engine(handle)
            .with_export(Arc::clone(&export));

        controller.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(15_100)).await;
        controller.shutdown().await;

        let export = export.lock().unwrap();
        assert_eq!(export.frames.len(), 3);
        assert!(export.frames[2].time_sec >= 15.0);
        assert!(metrics.snapshot().action_latency.count > 0);
    }

    #[tokio::test]
    async fn test_shutdown_before_start_is_noop() {
        let context = SimContext::shared(1);
        let mut controller: SimulationController<SimContext, EngineHandle> =
            SimulationController::new(config(4), AgoraMetrics::shared(), context);
        controller.shutdown().await;
        assert!(!controller.is_running());
    }
}
