//! Request/reply transport abstraction between clients and the content engine.

use async_trait::async_trait;
use crate::error::EnvError;
use crate::types::{DomainReply, DomainRequest};
use std::time::Duration;

/// Abstraction for bounded-wait request/reply with the content engine.
///
/// # Implementations
///
/// - **In-process**: `EngineHandle` - mailbox channel + oneshot reply
/// - **Simulation**: `FaultyTransport` - wraps another transport with latency/loss
///
/// # Request Flow
///
/// ```text
/// Client                     Transport                   Engine
///   |                           |                          |
///   |-- request(msg, 5s) ------>|                          |
///   |                           |-- envelope ------------->|
///   |                           |<------------- reply -----|
///   |<-- Ok(DomainReply) -------|                          |
/// ```
#[async_trait]
pub trait EngineTransport: Send + Sync + 'static {
    /// Sends a request and waits at most `timeout` for the reply.
    ///
    /// # Returns
    /// * `Ok(reply)` - The engine answered (success *or* error reply)
    /// * `Err(EnvError::Timeout)` - No reply within the bounded wait
    /// * `Err(EnvError::Unavailable)` - The engine is not reachable
    async fn request(&self, request: DomainRequest, timeout: Duration) -> Result<DomainReply, EnvError>;
    
    /// Returns the address this transport delivers to.
    fn address(&self) -> &str;
}

#[async_trait]
impl<T: EngineTransport + ?Sized> EngineTransport for std::sync::Arc<T> {
    async fn request(&self, request: DomainRequest, timeout: Duration) -> Result<DomainReply, EnvError> {
        (**self).request(request, timeout).await
    }
    
    fn address(&self) -> &str {
        (**self).address()
    }
}

/// Fault injection for transports in simulation.
///
/// Allows injecting latency, message loss, and outages.
pub trait FaultController: Send + Sync {
    /// Sets the latency added before each request is forwarded.
    fn set_latency(&self, latency: Duration);
    
    /// Sets the probability (0.0 - 1.0) that a request is silently dropped.
    fn set_drop_rate(&self, drop_rate: f64);
    
    /// Takes the engine offline (every request fails with `Unavailable`).
    fn set_offline(&self, offline: bool);
}
