//! Content Engine - the single serialization point for domain writes.
//!
//! The engine owns a mailbox. Every request that reaches it is validated,
//! applied as exactly one store operation, and answered with a success or
//! error reply. Requests are processed strictly one at a time, in arrival
//! order.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  request + oneshot  ┌───────────────────────────────┐
//! │ EngineHandle │────────────────────►│        ContentEngine          │
//! │ (transport)  │◄────────────────────│  validate → DomainStore → reply│
//! └──────────────┘       reply         │  metrics: registrations,      │
//!        ▲                             │  errors, request latency      │
//!        │ clone per client            └───────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use agora_core::{ContentEngine, MemoryStore, AgoraMetrics};
//! use agora_env::TokioContext;
//!
//! let engine = ContentEngine::new(store, metrics, TokioContext::shared());
//! let (handle, task) = engine.spawn("localhost:8090", 1024);
//! let reply = handle.request(DomainRequest::Ping, Duration::from_secs(5)).await?;
//! ```

use crate::error::StoreError;
use crate::metrics::AgoraMetrics;
use crate::models::{Comment, Community, Post, User};
use crate::store::DomainStore;
use crate::validation::validate_request;

use agora_env::{
    AgoraContext, CastVote, CreateComment, CreateCommunity, CreatePost, DomainReply,
    DomainRequest, EngineTransport, EnvError, JoinCommunity, RegisterUser,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// A request paired with the channel its reply goes back on.
struct Envelope {
    request: DomainRequest,
    reply_to: oneshot::Sender<DomainReply>,
}

/// The content engine.
///
/// Generic over the store and the context, allowing the same engine code to
/// run against the wall clock or a simulated one.
pub struct ContentEngine<S, Ctx>
where
    S: DomainStore,
    Ctx: AgoraContext,
{
    store: Arc<S>,
    metrics: Arc<AgoraMetrics>,
    context: Arc<Ctx>,
}

impl<S, Ctx> ContentEngine<S, Ctx>
where
    S: DomainStore,
    Ctx: AgoraContext,
{
    pub fn new(store: Arc<S>, metrics: Arc<AgoraMetrics>, context: Arc<Ctx>) -> Self {
        Self {
            store,
            metrics,
            context,
        }
    }

    /// Returns the underlying store (read access for inspection).
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Handles one request synchronously and produces its reply.
    pub fn handle(&self, request: DomainRequest) -> DomainReply {
        let started = self.context.now();
        let kind = request.kind();

        let outcome = validate_request(&request).and_then(|()| self.apply(request));
        self.metrics
            .record_request(self.context.now().saturating_sub(started));

        match outcome {
            Ok(message) => DomainReply::success(message),
            Err(err) => {
                debug!(request = kind, error = %err, "request rejected");
                self.metrics.record_error();
                DomainReply::error(err)
            }
        }
    }

    fn apply(&self, request: DomainRequest) -> Result<&'static str, StoreError> {
        match request {
            DomainRequest::RegisterUser(msg) => self.handle_register_user(msg),
            DomainRequest::CreateCommunity(msg) => self.handle_create_community(msg),
            DomainRequest::CreatePost(msg) => self.handle_create_post(msg),
            DomainRequest::CastVote(msg) => self.handle_cast_vote(msg),
            DomainRequest::CreateComment(msg) => self.handle_create_comment(msg),
            DomainRequest::JoinCommunity(msg) => self.handle_join_community(msg),
            DomainRequest::Ping => Ok("pong"),
        }
    }

    fn handle_register_user(&self, msg: RegisterUser) -> Result<&'static str, StoreError> {
        self.store.create_user(User {
            id: msg.user_id,
            username: msg.username,
            password: msg.password,
            created_at: self.context.unix_seconds(),
        })?;
        self.metrics.record_registration();
        Ok("User registered successfully")
    }

    fn handle_create_community(&self, msg: CreateCommunity) -> Result<&'static str, StoreError> {
        let community = Community::new(
            msg.id,
            msg.name,
            msg.description,
            msg.creator_id,
            self.context.unix_seconds(),
        );
        let id = community.id.clone();
        self.store.create_community(community)?;
        self.metrics.set_community_members(&id, 0);
        Ok("Community created successfully")
    }

    fn handle_create_post(&self, msg: CreatePost) -> Result<&'static str, StoreError> {
        self.store.create_post(Post {
            id: msg.id,
            community_id: msg.community_id,
            author_id: msg.author_id,
            title: msg.title,
            content: msg.content,
            created_at: msg.created_at,
            is_repost: msg.is_repost,
            karma: 0,
        })?;
        Ok("Post created successfully")
    }

    fn handle_cast_vote(&self, msg: CastVote) -> Result<&'static str, StoreError> {
        self.store.vote(&msg.target_id, &msg.user_id, msg.is_upvote)?;
        Ok("Vote recorded successfully")
    }

    fn handle_create_comment(&self, msg: CreateComment) -> Result<&'static str, StoreError> {
        self.store.create_comment(Comment {
            id: msg.id,
            post_id: msg.post_id,
            parent_id: msg.parent_id,
            author_id: msg.author_id,
            content: msg.content,
            created_at: msg.created_at,
        })?;
        Ok("Comment created successfully")
    }

    fn handle_join_community(&self, msg: JoinCommunity) -> Result<&'static str, StoreError> {
        let members = self.store.join_community(&msg.community_id, &msg.user_id)?;
        self.metrics
            .set_community_members(&msg.community_id, members as u64);
        Ok("Joined community successfully")
    }

    /// Moves the engine onto its own task and returns a handle to its mailbox.
    ///
    /// The task ends once every `EngineHandle` clone has been dropped.
    pub fn spawn(self, address: impl Into<String>, capacity: usize) -> (EngineHandle, JoinHandle<()>) {
        let address = address.into();
        let (tx, mut rx) = mpsc::channel::<Envelope>(capacity.max(1));
        let context = Arc::clone(&self.context);
        let name = address.clone();

        let task = context.spawn("content-engine", async move {
            info!(address = %name, "content engine started");
            while let Some(envelope) = rx.recv().await {
                let reply = self.handle(envelope.request);
                // The caller may have timed out and gone away
                let _ = envelope.reply_to.send(reply);
            }
            info!(address = %name, "content engine stopped");
        });

        (EngineHandle { address, tx }, task)
    }
}

/// Cloneable client-side handle to a running engine's mailbox.
#[derive(Clone)]
pub struct EngineHandle {
    address: String,
    tx: mpsc::Sender<Envelope>,
}

impl EngineHandle {
    /// Returns true once the engine task has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[async_trait]
impl EngineTransport for EngineHandle {
    async fn request(&self, request: DomainRequest, timeout: Duration) -> Result<DomainReply, EnvError> {
        let (reply_to, reply_rx) = oneshot::channel();
        let envelope = Envelope { request, reply_to };

        let exchange = async {
            self.tx
                .send(envelope)
                .await
                .map_err(|_| EnvError::unavailable(&self.address))?;
            reply_rx
                .await
                .map_err(|_| EnvError::network("engine dropped the reply"))
        };

        match tokio::time::timeout(timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(EnvError::timeout(timeout)),
        }
    }

    fn address(&self) -> &str {
        &self.address
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use agora_env::TokioContext;

    fn engine() -> ContentEngine<MemoryStore, TokioContext> {
        ContentEngine::new(
            Arc::new(MemoryStore::new()),
            AgoraMetrics::shared(),
            TokioContext::shared(),
        )
    }

    fn register(id: &str) -> DomainRequest {
        DomainRequest::RegisterUser(RegisterUser {
            user_id: id.to_string(),
            username: format!("name-{}", id),
            password: "pw".to_string(),
        })
    }

    fn create_community(id: &str, creator: &str) -> DomainRequest {
        DomainRequest::CreateCommunity(CreateCommunity {
            id: id.to_string(),
            name: format!("r/{}", id),
            description: "test".to_string(),
            creator_id: creator.to_string(),
        })
    }

    fn create_post(id: &str, community: &str) -> DomainRequest {
        DomainRequest::CreatePost(CreatePost {
            id: id.to_string(),
            community_id: community.to_string(),
            author_id: "u1".to_string(),
            title: "hello".to_string(),
            content: "world".to_string(),
            created_at: 1_700_000_000,
            is_repost: false,
        })
    }

    fn vote(target: &str, voter: &str, up: bool) -> DomainRequest {
        DomainRequest::CastVote(CastVote {
            target_id: target.to_string(),
            user_id: voter.to_string(),
            is_upvote: up,
        })
    }

    #[test]
    fn test_register_counts_successes_only() {
        let engine = engine();
        assert!(engine.handle(register("u1")).is_success());

        let reply = engine.handle(register("u1"));
        assert_eq!(reply, DomainReply::error("user already exists: u1"));

        let snap = engine.metrics.snapshot();
        assert_eq!(snap.registered_users, 1);
        assert_eq!(snap.errors, 1);
        assert_eq!(snap.requests_handled, 2);
        assert_eq!(snap.request_latency.count, 2);
    }

    #[test]
    fn test_invalid_request_does_not_mutate() {
        let engine = engine();
        let reply = engine.handle(DomainRequest::RegisterUser(RegisterUser {
            user_id: "u1".to_string(),
            username: String::new(),
            password: "pw".to_string(),
        }));

        assert!(!reply.is_success());
        assert!(engine.store().get_user("u1").is_err());
        assert_eq!(engine.metrics.errors(), 1);
    }

    #[test]
    fn test_community_then_join_scenario() {
        let engine = engine();
        engine.handle(register("u1"));
        assert!(engine.handle(create_community("c1", "u1")).is_success());
        assert!(engine.store().get_community("c1").unwrap().members.is_empty());

        let join = DomainRequest::JoinCommunity(JoinCommunity {
            community_id: "c1".to_string(),
            user_id: "u1".to_string(),
        });
        assert_eq!(engine.handle(join), DomainReply::success("Joined community successfully"));
        assert!(engine.store().get_community("c1").unwrap().is_member("u1"));
        assert_eq!(engine.metrics.snapshot().community_members["c1"], 1);
    }

    #[test]
    fn test_join_unknown_community_errors() {
        let engine = engine();
        let join = DomainRequest::JoinCommunity(JoinCommunity {
            community_id: "c404".to_string(),
            user_id: "u1".to_string(),
        });
        assert_eq!(engine.handle(join), DomainReply::error("community not found: c404"));
    }

    /// Delegates to a `MemoryStore` and counts every call made on it.
    #[derive(Default)]
    struct CountingStore {
        inner: MemoryStore,
        calls: std::sync::atomic::AtomicUsize,
    }

    impl CountingStore {
        fn tick(&self) {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }

        fn calls(&self) -> usize {
            self.calls.load(std::sync::atomic::Ordering::Relaxed)
        }
    }

    impl DomainStore for CountingStore {
        fn create_user(&self, user: User) -> Result<(), StoreError> {
            self.tick();
            self.inner.create_user(user)
        }
        fn get_user(&self, id: &str) -> Result<User, StoreError> {
            self.tick();
            self.inner.get_user(id)
        }
        fn create_community(&self, community: Community) -> Result<(), StoreError> {
            self.tick();
            self.inner.create_community(community)
        }
        fn get_community(&self, id: &str) -> Result<Community, StoreError> {
            self.tick();
            self.inner.get_community(id)
        }
        fn join_community(&self, community_id: &str, user_id: &str) -> Result<usize, StoreError> {
            self.tick();
            self.inner.join_community(community_id, user_id)
        }
        fn leave_community(&self, community_id: &str, user_id: &str) -> Result<(), StoreError> {
            self.tick();
            self.inner.leave_community(community_id, user_id)
        }
        fn create_post(&self, post: Post) -> Result<(), StoreError> {
            self.tick();
            self.inner.create_post(post)
        }
        fn get_post(&self, id: &str) -> Result<Post, StoreError> {
            self.tick();
            self.inner.get_post(id)
        }
        fn get_community_posts(&self, community_id: &str) -> Result<Vec<Post>, StoreError> {
            self.tick();
            self.inner.get_community_posts(community_id)
        }
        fn create_comment(&self, comment: Comment) -> Result<(), StoreError> {
            self.tick();
            self.inner.create_comment(comment)
        }
        fn get_comment(&self, id: &str) -> Result<Comment, StoreError> {
            self.tick();
            self.inner.get_comment(id)
        }
        fn get_post_comments(&self, post_id: &str) -> Result<Vec<Comment>, StoreError> {
            self.tick();
            self.inner.get_post_comments(post_id)
        }
        fn vote(&self, target_id: &str, user_id: &str, is_upvote: bool) -> Result<(), StoreError> {
            self.tick();
            self.inner.vote(target_id, user_id, is_upvote)
        }
        fn vote_of(&self, target_id: &str, user_id: &str) -> Option<bool> {
            self.tick();
            self.inner.vote_of(target_id, user_id)
        }
    }

    #[test]
    fn test_join_is_one_store_operation() {
        let store = Arc::new(CountingStore::default());
        let engine = ContentEngine::new(Arc::clone(&store), AgoraMetrics::shared(), TokioContext::shared());
        engine.handle(create_community("c1", "u1"));
        let before = store.calls();

        for user in ["u1", "u2", "u2"] {
            let join = DomainRequest::JoinCommunity(JoinCommunity {
                community_id: "c1".to_string(),
                user_id: user.to_string(),
            });
            assert!(engine.handle(join).is_success());
        }

        assert_eq!(store.calls() - before, 3);
        assert_eq!(engine.metrics.snapshot().community_members["c1"], 2);
    }

    #[test]
    fn test_vote_scenario_karma() {
        let engine = engine();
        engine.handle(create_post("p1", "c1"));

        engine.handle(vote("p1", "voterA", true));
        assert_eq!(engine.store().get_post("p1").unwrap().karma, 1);

        engine.handle(vote("p1", "voterA", false));
        assert_eq!(engine.store().get_post("p1").unwrap().karma, 0);
    }

    #[test]
    fn test_comment_on_missing_post() {
        let engine = engine();
        let reply = engine.handle(DomainRequest::CreateComment(CreateComment {
            id: "k1".to_string(),
            post_id: "p404".to_string(),
            parent_id: String::new(),
            author_id: "u1".to_string(),
            content: "hi".to_string(),
            created_at: 0,
        }));
        assert_eq!(reply, DomainReply::error("post not found: p404"));
    }

    #[tokio::test]
    async fn test_mailbox_round_trip() {
        let (handle, task) = engine().spawn("engine", 8);
        let timeout = Duration::from_secs(5);

        let reply = handle.request(DomainRequest::Ping, timeout).await.unwrap();
        assert_eq!(reply, DomainReply::success("pong"));

        assert!(handle.request(register("u1"), timeout).await.unwrap().is_success());
        assert!(!handle.request(register("u1"), timeout).await.unwrap().is_success());
        assert_eq!(handle.address(), "engine");

        drop(handle);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_request_after_shutdown_unavailable() {
        let (handle, task) = engine().spawn("engine", 8);
        task.abort();
        let _ = task.await;

        let err = handle
            .request(DomainRequest::Ping, Duration::from_millis(100))
            .await
            .unwrap_err();
        assert_eq!(err, EnvError::unavailable("engine"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_times_out_when_engine_stalls() {
        // A mailbox nobody reads from
        let (tx, _rx) = mpsc::channel::<Envelope>(1);
        let handle = EngineHandle {
            address: "stalled".to_string(),
            tx,
        };

        let err = handle
            .request(DomainRequest::Ping, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert_eq!(err, EnvError::Timeout(5000));
    }
}
