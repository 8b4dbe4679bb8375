//! Centralized rate limiting for exchange calls
//!
//! Every exchange-mutating or metadata request across all charts and
//! trades funnels through one global limiter: a single request in flight
//! at a time, with a minimum spacing between dispatches. Callers hold the
//! returned slot for the duration of their request.

use crate::constants::EXCHANGE_MIN_SPACING_MS;
use once_cell::sync::Lazy;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore, SemaphorePermit};
use tokio::time::{sleep, Instant};

#[derive(Debug)]
pub struct RateLimiter {
    slot: Semaphore,
    last_dispatch: Mutex<Option<Instant>>,
    min_spacing: Duration,
}

/// Held for the duration of one exchange request; dropping it frees the
/// in-flight slot
pub struct RequestSlot<'a> {
    _permit: SemaphorePermit<'a>,
}

impl RateLimiter {
    pub fn new(min_spacing: Duration) -> Self {
        Self {
            slot: Semaphore::new(1),
            last_dispatch: Mutex::new(None),
            min_spacing,
        }
    }

    /// Wait for the in-flight slot and the minimum spacing, then claim
    /// the dispatch slot
    pub async fn begin(&self) -> RequestSlot<'_> {
        // The semaphore is never closed, acquire cannot fail
        let permit = self
            .slot
            .acquire()
            .await
            .expect("rate limiter semaphore closed");
        let mut last = self.last_dispatch.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_spacing {
                sleep(self.min_spacing - elapsed).await;
            }
        }
        *last = Some(Instant::now());
        drop(last);
        RequestSlot { _permit: permit }
    }
}

static EXCHANGE_LIMITER: Lazy<RateLimiter> =
    Lazy::new(|| RateLimiter::new(Duration::from_millis(EXCHANGE_MIN_SPACING_MS)));

/// The process-wide limiter shared by every provider call
pub fn exchange_limiter() -> &'static RateLimiter {
    &EXCHANGE_LIMITER
}
