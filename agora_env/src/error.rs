//! Error types for the Agora environment abstraction.

use thiserror::Error;

/// Errors that can occur while talking to the content engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvError {
    /// Transport-level failure (channel closed mid-request, reply lost)
    #[error("Network error: {0}")]
    NetworkError(String),
    
    /// The engine is unreachable (not running, or offline)
    #[error("Engine unavailable: {0}")]
    Unavailable(String),
    
    /// Context operation failed
    #[error("Context error: {0}")]
    ContextError(String),
    
    /// No reply within the bounded wait
    #[error("Timeout after {0}ms")]
    Timeout(u64),
}

impl EnvError {
    /// Creates a network error.
    pub fn network(msg: impl Into<String>) -> Self {
        Self::NetworkError(msg.into())
    }
    
    /// Creates an unavailable error.
    pub fn unavailable(address: impl std::fmt::Display) -> Self {
        Self::Unavailable(address.to_string())
    }
    
    /// Creates a timeout error from the elapsed bound.
    pub fn timeout(bound: std::time::Duration) -> Self {
        Self::Timeout(bound.as_millis() as u64)
    }
    
    /// Returns true if this is a bounded-wait expiry.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}
