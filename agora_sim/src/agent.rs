//! ClientAgent - one simulated user driving the content engine.
//!
//! Each agent runs as its own task and processes [`AgentSignal`]s strictly
//! in arrival order:
//! - `Trigger`: maybe perform one action (post, comment, vote or join)
//! - `Connectivity`: flip the connected flag, moving the active-user gauge
//!   only on an actual transition
//!
//! Failures never stop an agent. They are counted and the next signal is
//! processed as usual.

use crate::behavior::BehaviorProfile;
use crate::content;
use crate::distribution::CommunityDistribution;
use crate::error::SimError;

use agora_core::{ActionKind, AgoraMetrics};
use agora_env::{
    new_entity_id, AgoraContext, CastVote, CreateComment, CreatePost, DomainRequest, EngineTransport,
    JoinCommunity, RegisterUser,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Most recent own posts an agent remembers as vote/comment targets.
pub const KNOWN_POST_CAPACITY: usize = 64;

/// Chance that a post re-shares an existing title.
pub const REPOST_PROBABILITY: f64 = 0.2;

/// Chance that a vote is an upvote.
pub const UPVOTE_PROBABILITY: f64 = 0.7;

/// Signals delivered to an agent's inbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentSignal {
    /// Perform one action if connected and within active hours
    Trigger,

    /// Set the connectivity flag
    Connectivity(bool),
}

/// What a single trigger resulted in.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    /// Agent is offline, trigger ignored
    Disconnected,

    /// Current hour is outside the agent's active hours
    InactiveHour,

    /// Action selected but no request could be built
    Suppressed(ActionKind),

    /// Engine replied with success
    Succeeded(ActionKind),

    /// Engine replied with an error, or the request failed in transit
    Failed { kind: ActionKind, reason: String },
}

impl ActionOutcome {
    /// Returns true if a request was sent to the engine.
    pub fn dispatched(&self) -> bool {
        matches!(self, ActionOutcome::Succeeded(_) | ActionOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone)]
struct KnownPost {
    id: String,
    title: String,
}

/// A simulated client.
pub struct ClientAgent<Ctx, Net>
where
    Ctx: AgoraContext,
    Net: EngineTransport,
{
    /// Unique agent name, e.g. `client-17`
    name: String,
    user_id: String,
    username: String,
    profile: BehaviorProfile,
    connected: bool,

    /// Communities this agent successfully joined, in join order
    memberships: Vec<String>,
    known_posts: VecDeque<KnownPost>,

    communities: Arc<CommunityDistribution>,
    transport: Arc<Net>,
    metrics: Arc<AgoraMetrics>,
    context: Arc<Ctx>,
    rng: ChaCha8Rng,
    request_timeout: Duration,
}

impl<Ctx, Net> ClientAgent<Ctx, Net>
where
    Ctx: AgoraContext,
    Net: EngineTransport + 'static,
{
    /// Creates a connected agent with an RNG stream derived from `index`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        index: usize,
        profile: BehaviorProfile,
        communities: Arc<CommunityDistribution>,
        transport: Arc<Net>,
        metrics: Arc<AgoraMetrics>,
        context: Arc<Ctx>,
        request_timeout: Duration,
    ) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(context.derive_seed(index as u64 + 1));
        Self {
            name: format!("client-{}", index),
            user_id: new_entity_id(),
            username: content::username(index),
            profile,
            connected: true,
            memberships: Vec::new(),
            known_posts: VecDeque::new(),
            communities,
            transport,
            metrics,
            context,
            rng,
            request_timeout,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn profile(&self) -> &BehaviorProfile {
        &self.profile
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn memberships(&self) -> &[String] {
        &self.memberships
    }

    /// Registers this agent's user with the engine.
    pub async fn register(&self) -> Result<(), SimError> {
        let request = DomainRequest::RegisterUser(RegisterUser {
            user_id: self.user_id.clone(),
            username: self.username.clone(),
            password: format!("pw-{}", self.username),
        });

        let registration_error = |reason: String| SimError::Registration {
            agent: self.name.clone(),
            reason,
        };
        let reply = self
            .transport
            .request(request, self.request_timeout)
            .await
            .map_err(|e| registration_error(e.to_string()))?;
        reply.into_result().map(|_| ()).map_err(registration_error)
    }

    /// Applies a connectivity signal. Only transitions move the gauge.
    pub fn on_connectivity(&mut self, connected: bool) {
        let was_connected = self.connected;
        self.connected = connected;

        if connected && !was_connected {
            self.metrics.adjust_active_users(1);
        } else if !connected && was_connected {
            self.metrics.adjust_active_users(-1);
        }
    }

    /// Handles a trigger signal.
    pub async fn on_trigger(&mut self) -> ActionOutcome {
        if !self.connected {
            return ActionOutcome::Disconnected;
        }

        let start = self.context.now();
        let outcome = self.perform_action().await;
        // Every connected trigger contributes a latency sample, no-ops included
        self.metrics
            .record_simulated_action(self.context.now().saturating_sub(start));
        outcome
    }

    async fn perform_action(&mut self) -> ActionOutcome {
        let hour = self.context.hour_of_day();
        if !self.profile.is_active_hour(hour) {
            trace!(agent = %self.name, hour, "outside active hours");
            return ActionOutcome::InactiveHour;
        }

        let sample: f64 = self.rng.gen();
        let kind = self.profile.select_action(sample);

        let Some(request) = self.build_action(kind) else {
            return ActionOutcome::Suppressed(kind);
        };

        match self.dispatch(request.clone()).await {
            Ok(_) => {
                self.remember(&request);
                self.metrics.record_action(self.profile.persona().name(), kind);
                self.metrics.record_active_user_action();
                ActionOutcome::Succeeded(kind)
            }
            Err(reason) => {
                debug!(agent = %self.name, action = %kind, %reason, "action failed");
                self.metrics.record_error();
                ActionOutcome::Failed { kind, reason }
            }
        }
    }

    async fn dispatch(&self, request: DomainRequest) -> Result<String, String> {
        match self.transport.request(request, self.request_timeout).await {
            Ok(reply) => reply.into_result(),
            Err(e) => Err(e.to_string()),
        }
    }

    /// Builds the request for `kind`, or `None` if the action is suppressed.
    fn build_action(&mut self, kind: ActionKind) -> Option<DomainRequest> {
        match kind {
            ActionKind::Post => self.build_post(),
            ActionKind::Comment => self.build_comment(),
            ActionKind::Vote => Some(self.build_vote()),
            ActionKind::Join => self.build_join(),
        }
    }

    fn build_post(&mut self) -> Option<DomainRequest> {
        if self.memberships.is_empty() {
            return None;
        }
        let community_id = self.communities.random_community(&mut self.rng)?.id.clone();
        if !self.communities.should_create_post(&community_id, &mut self.rng) {
            return None;
        }

        let is_repost = self.rng.gen::<f64>() < REPOST_PROBABILITY;
        let content = if is_repost && !self.known_posts.is_empty() {
            let index = self.rng.gen_range(0..self.known_posts.len());
            self.known_posts[index].title.clone()
        } else {
            content::random_content(&mut self.rng)
        };

        Some(DomainRequest::CreatePost(CreatePost {
            id: new_entity_id(),
            community_id,
            author_id: self.user_id.clone(),
            title: content::random_title(&mut self.rng),
            content,
            created_at: self.context.unix_seconds(),
            is_repost,
        }))
    }

    fn build_comment(&mut self) -> Option<DomainRequest> {
        if self.memberships.is_empty() {
            return None;
        }
        Some(DomainRequest::CreateComment(CreateComment {
            id: new_entity_id(),
            post_id: self.target_post(),
            parent_id: String::new(),
            author_id: self.user_id.clone(),
            content: content::random_content(&mut self.rng),
            created_at: self.context.unix_seconds(),
        }))
    }

    fn build_vote(&mut self) -> DomainRequest {
        let is_upvote = self.rng.gen::<f64>() < UPVOTE_PROBABILITY;
        DomainRequest::CastVote(CastVote {
            target_id: self.target_post(),
            user_id: self.user_id.clone(),
            is_upvote,
        })
    }

    fn build_join(&mut self) -> Option<DomainRequest> {
        let community_id = self.communities.random_community(&mut self.rng)?.id.clone();
        Some(DomainRequest::JoinCommunity(JoinCommunity {
            community_id,
            user_id: self.user_id.clone(),
        }))
    }

    /// A remembered post id, or a fresh id when nothing is known yet.
    fn target_post(&mut self) -> String {
        if self.known_posts.is_empty() {
            return new_entity_id();
        }
        let index = self.rng.gen_range(0..self.known_posts.len());
        self.known_posts[index].id.clone()
    }

    fn remember(&mut self, request: &DomainRequest) {
        match request {
            DomainRequest::JoinCommunity(join) => {
                if !self.memberships.contains(&join.community_id) {
                    self.memberships.push(join.community_id.clone());
                }
            }
            DomainRequest::CreatePost(post) => {
                if self.known_posts.len() == KNOWN_POST_CAPACITY {
                    self.known_posts.pop_front();
                }
                self.known_posts.push_back(KnownPost {
                    id: post.id.clone(),
                    title: post.title.clone(),
                });
            }
            _ => {}
        }
    }

    /// Processes signals until the inbox closes.
    pub async fn run(mut self, mut inbox: mpsc::Receiver<AgentSignal>) {
        while let Some(signal) = inbox.recv().await {
            match signal {
                AgentSignal::Trigger => {
                    let outcome = self.on_trigger().await;
                    trace!(agent = %self.name, ?outcome, "trigger handled");
                }
                AgentSignal::Connectivity(connected) => self.on_connectivity(connected),
            }
        }
        debug!(agent = %self.name, "inbox closed, agent stopping");
    }

    /// Spawns the agent on its context and returns its inbox handle.
    pub fn spawn(self, inbox_capacity: usize) -> (AgentHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(inbox_capacity.max(1));
        let name = self.name.clone();
        let context = Arc::clone(&self.context);
        let task = context.spawn(&name, self.run(rx));
        (AgentHandle { name, tx }, task)
    }
}

/// Sending side of an agent's inbox.
#[derive(Debug, Clone)]
pub struct AgentHandle {
    name: String,
    tx: mpsc::Sender<AgentSignal>,
}

impl AgentHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Delivers a signal without waiting. Returns false if the inbox is
    /// full or closed and the signal was dropped.
    pub fn signal(&self, signal: AgentSignal) -> bool {
        self.tx.try_send(signal).is_ok()
    }
}
