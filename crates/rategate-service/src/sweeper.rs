//! Background eviction of stale counter entries.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::store::CounterStore;

/// Spawns the expiry sweeper on the current tokio runtime.
///
/// Runs [`CounterStore::sweep`] every `interval`. Each sweep runs in its own
/// task so a panic inside it is caught at the join point, logged, and the
/// next tick proceeds. Abort the returned handle to stop sweeping.
pub fn spawn_sweeper(store: CounterStore, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; there is nothing to sweep yet.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            sweep_once(&store).await;
        }
    })
}

/// Runs one isolated sweep, swallowing any failure.
pub async fn sweep_once(store: &CounterStore) -> usize {
    let store = store.clone();
    match tokio::spawn(async move { store.sweep() }).await {
        Ok(0) => {
            tracing::debug!("rate limit sweep: nothing to evict");
            0
        }
        Ok(removed) => {
            tracing::info!(removed, "Evicted stale rate limit entries");
            removed
        }
        Err(e) => {
            tracing::warn!(error = %e, "rate limit sweep failed; retrying next cycle");
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use chrono::{DateTime, Utc};

    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::store::StoreConfig;

    /// Panics on the next read after being armed, then behaves normally.
    struct FlakyClock {
        time: ManualClock,
        fail_next: AtomicBool,
    }

    impl Clock for FlakyClock {
        fn now(&self) -> DateTime<Utc> {
            assert!(
                !self.fail_next.swap(false, Ordering::SeqCst),
                "clock unavailable"
            );
            self.time.now()
        }
    }

    fn flaky_store() -> (CounterStore, Arc<FlakyClock>) {
        let clock = Arc::new(FlakyClock {
            time: ManualClock::default(),
            fail_next: AtomicBool::new(false),
        });
        let config = StoreConfig {
            stale_after: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(10),
        };
        let store = CounterStore::with_clock(config, Arc::clone(&clock) as Arc<dyn Clock>);
        (store, clock)
    }

    #[tokio::test]
    async fn failed_sweep_is_swallowed_and_next_one_evicts() {
        let (store, clock) = flaky_store();
        store.evaluate("a", 5, Duration::from_secs(30));
        clock.time.advance(Duration::from_secs(120));

        clock.fail_next.store(true, Ordering::SeqCst);
        assert_eq!(sweep_once(&store).await, 0);
        assert_eq!(store.len(), 1);

        assert_eq!(sweep_once(&store).await, 1);
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_loop_survives_a_failed_cycle() {
        let (store, clock) = flaky_store();
        store.evaluate("a", 5, Duration::from_secs(30));
        clock.time.advance(Duration::from_secs(120));
        clock.fail_next.store(true, Ordering::SeqCst);

        let handle = spawn_sweeper(store.clone(), Duration::from_secs(10));

        tokio::time::sleep(Duration::from_secs(11)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(store.len(), 1);
        assert!(!handle.is_finished());

        tokio::time::sleep(Duration::from_secs(10)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(store.is_empty());
        handle.abort();
    }

    fn store(stale_after: Duration) -> (CounterStore, ManualClock) {
        let clock = ManualClock::default();
        let config = StoreConfig {
            stale_after,
            sweep_interval: Duration::from_secs(60),
        };
        (CounterStore::with_clock(config, Arc::new(clock.clone())), clock)
    }

    #[tokio::test]
    async fn sweep_once_reports_evictions() {
        let (store, clock) = store(Duration::from_secs(60));
        store.evaluate("a", 5, Duration::from_secs(30));
        store.evaluate("b", 5, Duration::from_secs(30));
        clock.advance(Duration::from_secs(61));

        assert_eq!(sweep_once(&store).await, 2);
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_runs_on_its_cadence() {
        let (store, clock) = store(Duration::from_secs(60));
        store.evaluate("a", 5, Duration::from_secs(30));
        clock.advance(Duration::from_secs(120));

        let handle = spawn_sweeper(store.clone(), Duration::from_secs(10));
        tokio::time::sleep(Duration::from_secs(11)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        assert!(store.is_empty());
        handle.abort();
    }
}
