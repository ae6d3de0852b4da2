//! Session-bound polling of the market state cache.

use crate::state::MarketStateCache;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Scheduler lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// No timer running.
    Idle,
    /// Timer running against an active session.
    Active,
}

/// Drives periodic refreshes while a session is active.
///
/// `start` performs one full reconciliation immediately, then refreshes
/// listings on every tick. At most one poller runs per scheduler: starting
/// again replaces the previous one.
pub struct PollingScheduler {
    cache: Arc<MarketStateCache>,
    interval: Duration,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl PollingScheduler {
    pub fn new(cache: Arc<MarketStateCache>, interval: Duration) -> Self {
        Self {
            cache,
            interval,
            poller: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start polling, cancelling any poller already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let mut poller = self.poller.lock();
        if let Some(previous) = poller.take() {
            debug!("Replacing running poller");
            previous.abort();
            self.cache.invalidate();
        }

        let cache = Arc::clone(&self.cache);
        let interval = self.interval;
        *poller = Some(tokio::spawn(Self::run(cache, interval)));
        info!(interval_secs = interval.as_secs(), "Polling started");
    }

    /// Stop polling. In-flight refreshes are discarded. Idempotent.
    pub fn stop(&self) -> bool {
        let Some(poller) = self.poller.lock().take() else {
            return false;
        };
        poller.abort();
        self.cache.invalidate();
        info!("Polling stopped");
        true
    }

    pub fn state(&self) -> SchedulerState {
        match self.poller.lock().as_ref() {
            Some(handle) if !handle.is_finished() => SchedulerState::Active,
            _ => SchedulerState::Idle,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state() == SchedulerState::Active
    }

    async fn run(cache: Arc<MarketStateCache>, period: Duration) {
        if let Err(e) = cache.refresh_all().await {
            warn!("Initial reconciliation failed: {}", e);
        }

        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            // errors are already logged by the cache; the next tick retries
            let _ = cache.refresh_listings().await;
        }
    }
}

impl Drop for PollingScheduler {
    fn drop(&mut self) {
        if let Some(poller) = self.poller.get_mut().take() {
            poller.abort();
        }
    }
}

impl std::fmt::Debug for PollingScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingScheduler")
            .field("interval", &self.interval)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiClient, FakeMarket};
    use crate::session::{MemoryCredentialStorage, SessionStore};
    use reqwest::Method;
    use serde_json::json;

    const PERIOD: Duration = Duration::from_secs(5);

    fn setup() -> (Arc<FakeMarket>, Arc<MarketStateCache>, PollingScheduler) {
        let market = FakeMarket::new();
        market.respond(Method::GET, "/posts/", 200, json!([]));
        market.respond(
            Method::GET,
            "/users/me",
            200,
            json!({ "id": 1, "username": "alice", "balance": 1000.0 }),
        );
        market.respond(Method::GET, "/portfolio/1", 200, json!([]));

        let session = Arc::new(SessionStore::new(MemoryCredentialStorage::with_token("tok")));
        let api = Arc::new(ApiClient::new(market.clone(), session));
        let cache = Arc::new(MarketStateCache::new(api));
        let scheduler = PollingScheduler::new(cache.clone(), PERIOD);
        (market, cache, scheduler)
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_reconciles_then_polls_listings_only() {
        let (market, cache, scheduler) = setup();

        scheduler.start();
        settle().await;
        assert!(scheduler.is_active());
        assert_eq!(market.calls_to(Method::GET, "/users/me"), 1);
        assert_eq!(market.calls_to(Method::GET, "/posts/"), 1);
        assert!(cache.snapshot().user.is_some());

        tokio::time::advance(PERIOD).await;
        settle().await;
        tokio::time::advance(PERIOD).await;
        settle().await;

        assert_eq!(market.calls_to(Method::GET, "/posts/"), 3);
        assert_eq!(market.calls_to(Method::GET, "/users/me"), 1);
        assert_eq!(market.calls_to(Method::GET, "/portfolio/1"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_halts_network_activity() {
        let (market, _cache, scheduler) = setup();

        scheduler.start();
        settle().await;
        assert!(scheduler.stop());
        assert!(!scheduler.stop());
        assert_eq!(scheduler.state(), SchedulerState::Idle);

        let before = market.calls().len();
        tokio::time::advance(PERIOD * 3).await;
        settle().await;
        assert_eq!(market.calls().len(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_leaves_single_poller() {
        let (market, _cache, scheduler) = setup();

        scheduler.start();
        settle().await;
        scheduler.stop();
        scheduler.start();
        settle().await;
        scheduler.start();
        settle().await;

        let before = market.calls_to(Method::GET, "/posts/");
        tokio::time::advance(PERIOD).await;
        settle().await;
        assert_eq!(market.calls_to(Method::GET, "/posts/"), before + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_tick_discarded_on_stop() {
        let (market, cache, scheduler) = setup();

        scheduler.start();
        settle().await;
        market.respond(
            Method::GET,
            "/posts/",
            200,
            json!([{ "id": 1, "content": "late", "creator_id": 1, "shares_sold": 0, "current_price": 10.0 }]),
        );
        market.hold(Method::GET, "/posts/");

        tokio::time::advance(PERIOD).await;
        settle().await;
        scheduler.stop();
        market.release(Method::GET, "/posts/");
        settle().await;

        assert!(cache.snapshot().listings.is_empty());
    }
}
