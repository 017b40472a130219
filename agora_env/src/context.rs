//! Core environment context trait for Agora components.

use async_trait::async_trait;
use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::task::JoinHandle;

/// The central interface for Environment Interaction.
///
/// This trait abstracts the "real world" so that the content engine and the
/// client agents can run both in production (tokio, wall clock, OS entropy)
/// and inside a deterministic simulation harness.
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `tokio::time`, `OsRng`, local clock
/// - **Simulation**: `SimContext` - virtual clock, seeded `ChaCha8Rng`
///
/// # Determinism
///
/// For reproducible runs, all methods that would normally introduce
/// non-determinism (time, randomness) are controlled by the implementation.
#[async_trait]
pub trait AgoraContext: Send + Sync + 'static {
    /// Returns the current monotonic time since context creation.
    ///
    /// Used for latency measurements.
    fn now(&self) -> Duration;
    
    /// Returns the wall-clock time.
    ///
    /// Drives entity timestamps and the hour-of-day gate on agent activity.
    fn system_time(&self) -> SystemTime;
    
    /// Returns the wall-clock time as unix seconds.
    fn unix_seconds(&self) -> i64 {
        self.system_time()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
    
    /// Returns the current hour of day (0-23).
    ///
    /// The default derives the hour in UTC from `system_time()`.
    fn hour_of_day(&self) -> u8 {
        let secs = self.unix_seconds().max(0) as u64;
        ((secs / 3600) % 24) as u8
    }
    
    /// Suspends execution for the given duration.
    async fn sleep(&self, duration: Duration);
    
    /// Spawns a named background task.
    fn spawn<F>(&self, name: &str, future: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static;
    
    /// Derives a seed for a sub-component's RNG.
    ///
    /// Simulation combines the master seed with `seed_extension` so every
    /// agent gets a unique but reproducible stream. Production returns
    /// fresh OS entropy.
    fn derive_seed(&self, seed_extension: u64) -> u64;
    
    /// Returns the context's seed (for logging/debugging).
    ///
    /// In production, returns 0 (not seeded).
    fn seed(&self) -> u64;
}
