//! Background sweep of expired cache entries.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use super::store::CacheStore;

/// Default sweep interval: 5 minutes
pub const DEFAULT_JANITOR_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Periodic task that evicts expired entries and persists the survivors.
pub struct CacheJanitor;

impl CacheJanitor {
    /// Spawn the sweep loop on the current runtime.
    ///
    /// The first sweep happens one full `every` after spawning. A panic inside
    /// a sweep is logged and the loop keeps running.
    pub fn spawn(store: Arc<CacheStore>, every: Duration) -> JanitorHandle {
        let task = tokio::spawn(async move {
            info!("Cache janitor started ({}s interval)", every.as_secs());

            let mut ticker = interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                run_sweep(&store).await;
            }
        });

        JanitorHandle { task }
    }
}

async fn run_sweep(store: &Arc<CacheStore>) {
    let store = Arc::clone(store);
    match tokio::task::spawn_blocking(move || store.sweep_expired()).await {
        Ok(removed) => debug!("Janitor cycle done, {} entries removed", removed),
        Err(e) => error!("Cache janitor cycle failed: {}", e),
    }
}

/// Owner of a running janitor. Dropping the handle leaves the task running.
pub struct JanitorHandle {
    task: JoinHandle<()>,
}

impl JanitorHandle {
    /// Stop the sweep loop.
    pub async fn shutdown(self) {
        self.task.abort();
        let _ = self.task.await;
        info!("Cache janitor stopped");
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
