//! Agora Environment Abstraction Layer
//!
//! This crate provides the seams that let the Agora content engine and its
//! simulated client population run both in **Production** (tokio, wall clock)
//! and in a **Simulation** harness (virtual clock, seeded randomness).
//!
//! # Core Concepts
//!
//! - `AgoraContext`: time, hour-of-day, task spawning, seed derivation
//! - `EngineTransport`: bounded-wait request/reply with the content engine
//! - `DomainRequest` / `DomainReply`: the message vocabulary
//!
//! # Example
//!
//! ```ignore
//! use agora_env::{AgoraContext, EngineTransport, DomainRequest};
//!
//! async fn probe<Ctx: AgoraContext, Net: EngineTransport>(ctx: &Ctx, net: &Net) {
//!     let started = ctx.now();
//!     let reply = net.request(DomainRequest::Ping, Duration::from_secs(5)).await;
//!     println!("{:?} in {:?}", reply, ctx.now() - started);
//! }
//! ```

mod context;
mod transport;
mod types;
mod error;
mod tokio_impl;

pub use context::AgoraContext;
pub use transport::{EngineTransport, FaultController};
pub use types::{
    new_entity_id, CastVote, CreateComment, CreateCommunity, CreatePost, DomainReply,
    DomainRequest, JoinCommunity, RegisterUser,
};
pub use error::EnvError;
pub use tokio_impl::TokioContext;
