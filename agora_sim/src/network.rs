//! Engine transport wrapper with fault injection.

use agora_env::{DomainReply, DomainRequest, EngineTransport, EnvError, FaultController};
use async_trait::async_trait;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Wraps an [`EngineTransport`] with injectable latency, loss and outages.
///
/// - Latency is added before the request is forwarded and counts against
///   the caller's timeout
/// - A dropped request is never forwarded; the caller waits out its
///   timeout and gets `Timeout`
/// - While offline every request fails immediately with `Unavailable`
pub struct FaultyTransport<T> {
    inner: T,
    latency_micros: AtomicU64,
    /// f64 bits of the drop probability
    drop_rate_bits: AtomicU64,
    offline: AtomicBool,
    dropped: AtomicU64,
    rng: Mutex<ChaCha8Rng>,
}

impl<T: EngineTransport> FaultyTransport<T> {
    /// Creates a fault-free wrapper. `seed` drives the drop decisions.
    pub fn new(inner: T, seed: u64) -> Self {
        Self {
            inner,
            latency_micros: AtomicU64::new(0),
            drop_rate_bits: AtomicU64::new(0f64.to_bits()),
            offline: AtomicBool::new(false),
            dropped: AtomicU64::new(0),
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
        }
    }

    pub fn latency(&self) -> Duration {
        Duration::from_micros(self.latency_micros.load(Ordering::Relaxed))
    }

    pub fn drop_rate(&self) -> f64 {
        f64::from_bits(self.drop_rate_bits.load(Ordering::Relaxed))
    }

    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::Relaxed)
    }

    /// Number of requests dropped so far.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    fn roll_drop(&self) -> bool {
        let drop_rate = self.drop_rate();
        if drop_rate <= 0.0 {
            return false;
        }
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        rng.gen::<f64>() < drop_rate
    }
}

#[async_trait]
impl<T: EngineTransport> EngineTransport for FaultyTransport<T> {
    async fn request(&self, request: DomainRequest, timeout: Duration) -> Result<DomainReply, EnvError> {
        if self.is_offline() {
            return Err(EnvError::unavailable(self.inner.address()));
        }

        let latency = self.latency();
        if latency >= timeout {
            tokio::time::sleep(timeout).await;
            return Err(EnvError::timeout(timeout));
        }
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if self.roll_drop() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(kind = request.kind(), "request dropped");
            tokio::time::sleep(timeout - latency).await;
            return Err(EnvError::timeout(timeout));
        }

        self.inner.request(request, timeout - latency).await
    }

    fn address(&self) -> &str {
        self.inner.address()
    }
}

impl<T: EngineTransport> FaultController for FaultyTransport<T> {
    fn set_latency(&self, latency: Duration) {
        self.latency_micros
            .store(latency.as_micros() as u64, Ordering::Relaxed);
    }

    fn set_drop_rate(&self, drop_rate: f64) {
        self.drop_rate_bits
            .store(drop_rate.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Relaxed);
    }
}
