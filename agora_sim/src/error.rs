//! Error types for the simulation harness.

use agora_env::EnvError;
use thiserror::Error;

/// Errors that abort simulation setup.
///
/// Once the periodic loops are running nothing is fatal; per-request
/// failures are counted in metrics instead.
#[derive(Debug, Error)]
pub enum SimError {
    /// No engine attached to the controller
    #[error("engine address is unset")]
    EngineUnset,
    
    /// `start` called twice
    #[error("simulation already started")]
    AlreadyStarted,
    
    /// Behavior profile probabilities out of range
    #[error("invalid behavior profile: {0}")]
    InvalidProfile(String),
    
    /// A distribution could not be built (e.g. empty population)
    #[error("distribution error: {0}")]
    Distribution(String),
    
    /// Seeding a community through the engine failed
    #[error("failed to seed community {community}: {reason}")]
    Seeding { community: String, reason: String },
    
    /// Registering an agent's user through the engine failed
    #[error("failed to register agent {agent}: {reason}")]
    Registration { agent: String, reason: String },
    
    /// Transport failure
    #[error(transparent)]
    Env(#[from] EnvError),
}
