//! Agora load simulation harness
//!
//! Drives a population of simulated community users against the content
//! engine and measures what happens.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         SimWorld                            │
//! │  ┌──────────────────────────────────────────────────────┐   │
//! │  │ SimulationController                                 │   │
//! │  │   action loop · connectivity loop · reporting loop   │   │
//! │  └──────────────────────────────────────────────────────┘   │
//! │       │ signals                 │                           │
//! │  ┌────▼────┐              ┌─────▼───┐                       │
//! │  │ Client  │    ...       │ Client  │                       │
//! │  │ Agent 0 │              │ Agent N │                       │
//! │  └────┬────┘              └────┬────┘                       │
//! │       │    FaultyTransport     │                            │
//! │  ┌────▼────────────────────────▼────┐                       │
//! │  │  ContentEngine (mailbox task)    │──► MemoryStore        │
//! │  └──────────────────────────────────┘                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Randomness comes from a single 64-bit seed: every agent and every loop
//! gets its own ChaCha stream derived through [`SimContext`].
//!
//! # Usage
//!
//! ```ignore
//! use agora_sim::{ScenarioRunner, ScenarioId};
//!
//! let runner = ScenarioRunner::new(42, 1000).with_duration(60.0);
//! let result = runner.run(ScenarioId::Steady).await;
//! assert!(result.passed);
//! ```

pub mod agent;
pub mod behavior;
pub mod content;
mod context;
pub mod controller;
pub mod distribution;
mod error;
mod exporter;
pub mod network;
mod runner;
pub mod scenarios;
mod world;

pub use agent::{ActionOutcome, AgentHandle, AgentSignal, ClientAgent};
pub use behavior::{BehaviorProfile, Persona};
pub use context::SimContext;
pub use controller::SimulationController;
pub use distribution::{AgentSelector, CommunityDistribution, CommunityEntry};
pub use error::SimError;
pub use exporter::{SimExport, SimFrame};
pub use network::FaultyTransport;
pub use runner::{ScenarioResult, ScenarioRunner};
pub use scenarios::ScenarioId;
pub use world::{SimConfig, SimWorld, WorldTransport};
