//! Periodic purge of lapsed login-attempt counters.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::config::CleanupConfig;
use crate::lockout::AttemptStore;

/// Spawn the purge loop for `store`.
///
/// The first pass runs one interval after the call. With cleanup disabled the
/// returned task finishes at once. Abort the handle to stop the loop.
pub fn spawn_cleanup_task(store: Arc<dyn AttemptStore>, config: CleanupConfig) -> JoinHandle<()> {
    if !config.enabled {
        tracing::info!("Counter cleanup disabled");
        return tokio::spawn(async {});
    }

    let every = Duration::from_secs(config.interval_secs.max(1));
    tokio::spawn(async move {
        tracing::info!("Counter cleanup every {:?}", every);
        let mut ticks = interval_at(Instant::now() + every, every);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut total = 0usize;
        loop {
            ticks.tick().await;
            total += sweep(store.as_ref()).await;
            tracing::trace!("{} counter(s) purged since start", total);
        }
    })
}

/// One purge pass. Store errors are logged and count as nothing purged.
async fn sweep(store: &dyn AttemptStore) -> usize {
    match store.purge_expired().await {
        Ok(0) => 0,
        Ok(purged) => {
            tracing::debug!("Purged {} lapsed attempt counter(s)", purged);
            purged
        }
        Err(e) => {
            tracing::error!("Attempt counter purge failed: {}", e);
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lockout::MemoryAttemptStore;

    fn every(interval_secs: u64) -> CleanupConfig {
        CleanupConfig {
            interval_secs,
            enabled: true,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_drops_only_lapsed_counters() {
        let store = MemoryAttemptStore::new();
        store.increment("short", Duration::from_secs(5)).await.unwrap();
        store.increment("long", Duration::from_secs(500)).await.unwrap();

        assert_eq!(sweep(&store).await, 0);
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(sweep(&store).await, 1);
        assert_eq!(store.tracked(), 1);
        assert_eq!(store.count("long").await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn loop_purges_after_window() {
        let store = Arc::new(MemoryAttemptStore::new());
        store.increment("u1", Duration::from_secs(300)).await.unwrap();
        store.increment("u2", Duration::from_secs(900)).await.unwrap();

        let handle = spawn_cleanup_task(store.clone(), every(60));

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert_eq!(store.tracked(), 2);

        // u1 lapses at 300 s and goes on the next pass.
        tokio::time::sleep(Duration::from_secs(302)).await;
        assert_eq!(store.tracked(), 1);

        handle.abort();
    }

    #[tokio::test]
    async fn disabled_task_finishes_immediately() {
        let store = Arc::new(MemoryAttemptStore::new());
        let config = CleanupConfig {
            interval_secs: 1,
            enabled: false,
        };

        let handle = spawn_cleanup_task(store, config);
        tokio::time::timeout(Duration::from_millis(100), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
