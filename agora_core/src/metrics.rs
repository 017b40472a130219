//! Agora Metrics Module
//! ====================
//!
//! Process-wide counters, gauges and latency histograms shared by the
//! content engine and every client agent.
//!
//! One `AgoraMetrics` is built at process start and handed out as an
//! `Arc`. Every update is a single atomic operation (or a short critical
//! section for the keyed per-persona / per-community maps), so concurrent
//! writers never coordinate and the reporting loop never blocks them for
//! long.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::info;

/// Upper bounds (seconds) of the latency histogram buckets.
pub const DEFAULT_BUCKETS: [f64; 11] = [
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Client actions tracked per persona.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Post,
    Comment,
    Vote,
    Join,
}

impl ActionKind {
    /// Returns all action kinds, in bucket-selection order.
    pub fn all() -> [ActionKind; 4] {
        [ActionKind::Post, ActionKind::Comment, ActionKind::Vote, ActionKind::Join]
    }

    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::Post => "post",
            ActionKind::Comment => "comment",
            ActionKind::Vote => "vote",
            ActionKind::Join => "join",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// =============================================================================
// LATENCY HISTOGRAM
// =============================================================================

/// Lock-free fixed-bucket histogram.
#[derive(Debug)]
pub struct LatencyHistogram {
    /// Non-cumulative counts; the last slot is the +Inf bucket
    buckets: Vec<AtomicU64>,
    count: AtomicU64,
    sum_micros: AtomicU64,
    /// Last observed value (micros)
    last_micros: AtomicU64,
}

/// Point-in-time view of a histogram.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HistogramSnapshot {
    pub count: u64,
    pub sum_seconds: f64,
    pub mean_seconds: f64,
    pub last_seconds: f64,
    /// `(upper bound, cumulative count)`, excluding +Inf
    pub buckets: Vec<(f64, u64)>,
}

impl LatencyHistogram {
    pub fn new() -> Self {
        Self {
            buckets: (0..=DEFAULT_BUCKETS.len()).map(|_| AtomicU64::new(0)).collect(),
            count: AtomicU64::new(0),
            sum_micros: AtomicU64::new(0),
            last_micros: AtomicU64::new(0),
        }
    }

    pub fn observe(&self, duration: Duration) {
        let secs = duration.as_secs_f64();
        let slot = DEFAULT_BUCKETS
            .iter()
            .position(|&bound| secs <= bound)
            .unwrap_or(DEFAULT_BUCKETS.len());
        let micros = duration.as_micros() as u64;

        self.buckets[slot].fetch_add(1, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum_micros.fetch_add(micros, Ordering::Relaxed);
        self.last_micros.store(micros, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> HistogramSnapshot {
        let count = self.count.load(Ordering::Relaxed);
        let sum_seconds = self.sum_micros.load(Ordering::Relaxed) as f64 / 1e6;
        let mut cumulative = 0;
        let buckets = DEFAULT_BUCKETS
            .iter()
            .zip(&self.buckets)
            .map(|(&bound, slot)| {
                cumulative += slot.load(Ordering::Relaxed);
                (bound, cumulative)
            })
            .collect();

        HistogramSnapshot {
            count,
            sum_seconds,
            mean_seconds: if count > 0 { sum_seconds / count as f64 } else { 0.0 },
            last_seconds: self.last_micros.load(Ordering::Relaxed) as f64 / 1e6,
            buckets,
        }
    }
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// COLLECTOR
// =============================================================================

/// Aggregate statistics for one persona.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PersonaStats {
    /// Number of agents generated with this persona
    pub agents: u64,
    pub posts: u64,
    pub comments: u64,
    pub votes: u64,
    pub joins: u64,
}

impl PersonaStats {
    fn bump(&mut self, kind: ActionKind) {
        match kind {
            ActionKind::Post => self.posts += 1,
            ActionKind::Comment => self.comments += 1,
            ActionKind::Vote => self.votes += 1,
            ActionKind::Join => self.joins += 1,
        }
    }
}

/// Process-wide metrics registry.
#[derive(Debug, Default)]
pub struct AgoraMetrics {
    posts_created: AtomicU64,
    comments_created: AtomicU64,
    votes_recorded: AtomicU64,
    joins_recorded: AtomicU64,
    registered_users: AtomicU64,
    errors: AtomicU64,
    active_user_actions: AtomicU64,
    requests_handled: AtomicU64,

    /// Connected agents, moved by edge-triggered connectivity changes
    active_users: AtomicI64,
    /// Population size reported by the connectivity loop
    simulated_users: AtomicU64,
    /// f64 bits of the last realized connected fraction
    connection_rate_bits: AtomicU64,

    /// Engine-side handling latency
    request_latency: LatencyHistogram,
    /// Agent-side trigger-to-reply latency
    action_latency: LatencyHistogram,

    personas: Mutex<BTreeMap<String, PersonaStats>>,
    community_members: Mutex<BTreeMap<String, u64>>,
}

/// Serializable point-in-time copy of every metric.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub posts_created: u64,
    pub comments_created: u64,
    pub votes_recorded: u64,
    pub joins_recorded: u64,
    pub registered_users: u64,
    pub errors: u64,
    pub active_user_actions: u64,
    pub requests_handled: u64,
    pub active_users: i64,
    pub simulated_users: u64,
    pub connection_rate: f64,
    pub request_latency: HistogramSnapshot,
    pub action_latency: HistogramSnapshot,
    pub personas: BTreeMap<String, PersonaStats>,
    pub community_members: BTreeMap<String, u64>,
}

impl MetricsSnapshot {
    /// Successful client actions across all kinds.
    pub fn total_actions(&self) -> u64 {
        self.posts_created + self.comments_created + self.votes_recorded + self.joins_recorded
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl AgoraMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an Arc-wrapped registry for sharing across tasks.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Records a successful client action under `persona`.
    pub fn record_action(&self, persona: &str, kind: ActionKind) {
        let counter = match kind {
            ActionKind::Post => &self.posts_created,
            ActionKind::Comment => &self.comments_created,
            ActionKind::Vote => &self.votes_recorded,
            ActionKind::Join => &self.joins_recorded,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        lock(&self.personas).entry(persona.to_string()).or_default().bump(kind);
    }

    pub fn record_active_user_action(&self) {
        self.active_user_actions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_registration(&self) {
        self.registered_users.fetch_add(1, Ordering::Relaxed);
    }

    /// Records engine-side handling latency of one request.
    pub fn record_request(&self, duration: Duration) {
        self.requests_handled.fetch_add(1, Ordering::Relaxed);
        self.request_latency.observe(duration);
    }

    /// Records an agent's trigger-to-reply span.
    pub fn record_simulated_action(&self, duration: Duration) {
        self.action_latency.observe(duration);
    }

    /// Moves the active-user gauge by `delta`.
    pub fn adjust_active_users(&self, delta: i64) {
        self.active_users.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn set_active_users(&self, count: i64) {
        self.active_users.store(count, Ordering::Relaxed);
    }

    /// Sets the generated population of a persona.
    pub fn update_persona_count(&self, persona: &str, count: u64) {
        lock(&self.personas).entry(persona.to_string()).or_default().agents = count;
    }

    /// Reports the population size and realized connected fraction.
    pub fn update_simulation(&self, users: usize, connection_rate: f64) {
        self.simulated_users.store(users as u64, Ordering::Relaxed);
        self.connection_rate_bits
            .store(connection_rate.to_bits(), Ordering::Relaxed);
    }

    pub fn set_community_members(&self, community_id: &str, members: u64) {
        lock(&self.community_members).insert(community_id.to_string(), members);
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn active_users(&self) -> i64 {
        self.active_users.load(Ordering::Relaxed)
    }

    pub fn registered_users(&self) -> u64 {
        self.registered_users.load(Ordering::Relaxed)
    }

    pub fn connection_rate(&self) -> f64 {
        f64::from_bits(self.connection_rate_bits.load(Ordering::Relaxed))
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            posts_created: self.posts_created.load(Ordering::Relaxed),
            comments_created: self.comments_created.load(Ordering::Relaxed),
            votes_recorded: self.votes_recorded.load(Ordering::Relaxed),
            joins_recorded: self.joins_recorded.load(Ordering::Relaxed),
            registered_users: self.registered_users.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            active_user_actions: self.active_user_actions.load(Ordering::Relaxed),
            requests_handled: self.requests_handled.load(Ordering::Relaxed),
            active_users: self.active_users(),
            simulated_users: self.simulated_users.load(Ordering::Relaxed),
            connection_rate: self.connection_rate(),
            request_latency: self.request_latency.snapshot(),
            action_latency: self.action_latency.snapshot(),
            personas: lock(&self.personas).clone(),
            community_members: lock(&self.community_members).clone(),
        }
    }

    /// Logs a one-line summary of the current snapshot.
    pub fn report_current_stats(&self) -> MetricsSnapshot {
        let snapshot = self.snapshot();
        info!(
            posts = snapshot.posts_created,
            comments = snapshot.comments_created,
            votes = snapshot.votes_recorded,
            joins = snapshot.joins_recorded,
            errors = snapshot.errors,
            active_users = snapshot.active_users,
            connection_rate = snapshot.connection_rate,
            mean_action_ms = snapshot.action_latency.mean_seconds * 1000.0,
            "metrics report"
        );
        snapshot
    }

    /// Renders the Prometheus text exposition format for an external scraper.
    pub fn render_text(&self) -> String {
        let s = self.snapshot();
        let mut out = String::new();

        let counters = [
            ("agora_posts_total", "Total number of posts created", s.posts_created),
            ("agora_comments_total", "Total number of comments created", s.comments_created),
            ("agora_votes_total", "Total number of votes recorded", s.votes_recorded),
            ("agora_joins_total", "Total number of community joins", s.joins_recorded),
            ("agora_total_users", "Total number of registered users", s.registered_users),
            ("agora_errors_total", "Total number of errors", s.errors),
            ("agora_active_user_actions_total", "Successful simulated user actions", s.active_user_actions),
            ("agora_requests_total", "Requests handled by the engine", s.requests_handled),
        ];
        for (name, help, value) in counters {
            let _ = writeln!(out, "# HELP {} {}\n# TYPE {} counter\n{} {}", name, help, name, name, value);
        }

        let _ = writeln!(out, "# HELP agora_active_users Number of currently active users");
        let _ = writeln!(out, "# TYPE agora_active_users gauge\nagora_active_users {}", s.active_users);
        let _ = writeln!(out, "# HELP agora_simulated_users_total Total number of simulated users");
        let _ = writeln!(out, "# TYPE agora_simulated_users_total gauge\nagora_simulated_users_total {}", s.simulated_users);
        let _ = writeln!(out, "# HELP agora_connection_rate Fraction of agents connected");
        let _ = writeln!(out, "# TYPE agora_connection_rate gauge\nagora_connection_rate {}", s.connection_rate);

        write_histogram(&mut out, "agora_request_duration_seconds", "Engine request duration in seconds", &s.request_latency);
        write_histogram(&mut out, "agora_action_duration_seconds", "Simulated action duration in seconds", &s.action_latency);

        let _ = writeln!(out, "# HELP agora_persona_actions_total Successful actions per persona");
        let _ = writeln!(out, "# TYPE agora_persona_actions_total counter");
        for (persona, stats) in &s.personas {
            for (action, value) in [
                ("post", stats.posts),
                ("comment", stats.comments),
                ("vote", stats.votes),
                ("join", stats.joins),
            ] {
                let _ = writeln!(
                    out,
                    "agora_persona_actions_total{{persona=\"{}\",action=\"{}\"}} {}",
                    persona, action, value
                );
            }
        }

        let _ = writeln!(out, "# HELP agora_community_members Number of members per community");
        let _ = writeln!(out, "# TYPE agora_community_members gauge");
        for (community, members) in &s.community_members {
            let _ = writeln!(out, "agora_community_members{{community=\"{}\"}} {}", community, members);
        }

        out
    }
}

fn write_histogram(out: &mut String, name: &str, help: &str, h: &HistogramSnapshot) {
    let _ = writeln!(out, "# HELP {} {}\n# TYPE {} histogram", name, help, name);
    for (bound, count) in &h.buckets {
        let _ = writeln!(out, "{}_bucket{{le=\"{}\"}} {}", name, bound, count);
    }
    let _ = writeln!(out, "{}_bucket{{le=\"+Inf\"}} {}", name, h.count);
    let _ = writeln!(out, "{}_sum {}\n{}_count {}", name, h.sum_seconds, name, h.count);
}

// =============================================================================
// TESTS
// =============================================================================
