//! Bounded concurrency for native rendering backends
//!
//! Some dialect backends render on a limited native thread pool. The pool
//! here models that backpressure: at most `capacity` renders run at once,
//! excess requests queue on the semaphore until a slot frees.

use once_cell::sync::Lazy;
use std::sync::Arc;
use tokio::sync::{Semaphore, SemaphorePermit};

/// Environment hint for the native thread-pool size
pub const THREAD_POOL_SIZE_VAR: &str = "CASCADE_THREAD_POOL_SIZE";
const DEFAULT_THREAD_POOL_SIZE: usize = 4;

pub struct RenderPool {
    semaphore: Semaphore,
    capacity: usize,
}

impl RenderPool {
    /// A pool with at least one slot
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        RenderPool {
            semaphore: Semaphore::new(capacity),
            capacity,
        }
    }

    /// Capacity derived from the environment hint: pool size minus one,
    /// leaving a thread for the event loop
    pub fn from_env() -> Self {
        let hint = std::env::var(THREAD_POOL_SIZE_VAR)
            .ok()
            .and_then(|value| value.parse::<usize>().ok())
            .unwrap_or(DEFAULT_THREAD_POOL_SIZE);
        RenderPool::new(hint.saturating_sub(1))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Wait for a render slot. The slot is held until the permit drops.
    pub async fn acquire(&self) -> SemaphorePermit<'_> {
        self.semaphore
            .acquire()
            .await
            .expect("render pool semaphore closed")
    }
}

/// Pool shared by all loaders wrapping the limited native renderer
pub static NATIVE_RENDER_POOL: Lazy<Arc<RenderPool>> =
    Lazy::new(|| Arc::new(RenderPool::from_env()));
