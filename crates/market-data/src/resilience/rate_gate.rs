//! Minimum-spacing rate gate for upstream sources.
//!
//! Each source gets a slot holding the instant of its last permitted call.
//! A caller locks the slot, sleeps until `min_interval` has passed since that
//! instant, stamps the slot and releases it. The slot lock is held across the
//! sleep, so concurrent callers for one source are granted strictly in turn.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, warn};
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::{sleep_until, Instant};

/// Default spacing between calls to one source.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(100);

type Slot = Arc<AsyncMutex<Option<Instant>>>;

pub struct RateGate {
    min_interval: Duration,
    slots: Mutex<HashMap<String, Slot>>,
}

impl RateGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Lock the slot map, recovering from poison if necessary.
    fn lock_slots(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(|poisoned| {
            warn!("Rate gate slots mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn slot(&self, source: &str) -> Slot {
        let mut slots = self.lock_slots();
        Arc::clone(slots.entry(source.to_string()).or_default())
    }

    /// Wait until a call to `source` is permitted and record it.
    pub async fn acquire(&self, source: &str) {
        let slot = self.slot(source);
        let mut last = slot.lock().await;

        if let Some(prev) = *last {
            let ready_at = prev + self.min_interval;
            if ready_at > Instant::now() {
                debug!(
                    "Rate gate: waiting {:?} for '{}'",
                    ready_at - Instant::now(),
                    source
                );
                sleep_until(ready_at).await;
            }
        }

        *last = Some(Instant::now());
    }
}

impl Default for RateGate {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_call_is_immediate() {
        let gate = RateGate::default();
        let start = Instant::now();
        gate.acquire("YAHOO").await;
        assert_eq!(Instant::now(), start);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_are_spaced() {
        let gate = Arc::new(RateGate::new(Duration::from_millis(100)));

        let handles: Vec<_> = (0..5)
            .map(|_| {
                let gate = Arc::clone(&gate);
                tokio::spawn(async move {
                    gate.acquire("YAHOO").await;
                    Instant::now()
                })
            })
            .collect();

        let mut granted = Vec::new();
        for handle in handles {
            granted.push(handle.await.unwrap());
        }
        granted.sort();

        for pair in granted.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(100));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_sources_are_independent() {
        let gate = RateGate::new(Duration::from_secs(1));
        let start = Instant::now();

        gate.acquire("YAHOO").await;
        gate.acquire("ALPACA").await;
        assert_eq!(Instant::now(), start);

        gate.acquire("YAHOO").await;
        assert!(Instant::now() - start >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_wait_after_interval_passed() {
        let gate = RateGate::new(Duration::from_millis(100));
        gate.acquire("YAHOO").await;

        tokio::time::sleep(Duration::from_millis(250)).await;
        let before = Instant::now();
        gate.acquire("YAHOO").await;
        assert_eq!(Instant::now(), before);
    }
}
