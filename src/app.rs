//! Main engine module.
//!
//! This module contains the `Engine` struct that wires the session, the
//! request gateway, the market state cache, the polling scheduler and the
//! trade coordinator together, and ties polling to the session lifetime.

use crate::api::{ApiClient, HttpTransport, LeaderboardEntry, RegisteredAccount, Transport};
use crate::config::Config;
use crate::error::Result;
use crate::scheduler::PollingScheduler;
use crate::session::{CredentialStorage, FileCredentialStorage, SessionStore};
use crate::state::{Listing, MarketSnapshot, MarketStateCache};
use crate::trade::TradeCoordinator;
use crate::valuation::{self, Valuation};

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// The client-side market engine.
pub struct Engine {
    /// Configuration.
    config: Config,
    /// Credential owner.
    session: Arc<SessionStore>,
    /// Request gateway.
    api: Arc<ApiClient>,
    /// Snapshot cache.
    cache: Arc<MarketStateCache>,
    /// Session-bound poller.
    scheduler: Arc<PollingScheduler>,
    /// Trade actions.
    trades: TradeCoordinator,
    /// Task reacting to session changes.
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl Engine {
    /// Create an engine talking HTTP, with the token persisted on disk.
    pub fn new(config: Config) -> Result<Self> {
        let transport = HttpTransport::new(&config.api)?;
        let storage = FileCredentialStorage::new(config.session.resolved_token_path()?);
        Ok(Self::with_parts(config, Arc::new(transport), storage))
    }

    /// Create an engine from explicit transport and credential storage.
    pub fn with_parts(
        config: Config,
        transport: Arc<dyn Transport>,
        storage: impl CredentialStorage + 'static,
    ) -> Self {
        let session = Arc::new(SessionStore::new(storage));
        let api = Arc::new(ApiClient::new(transport, Arc::clone(&session)));
        let cache = Arc::new(MarketStateCache::new(Arc::clone(&api)));
        let scheduler = Arc::new(PollingScheduler::new(
            Arc::clone(&cache),
            config.polling.interval(),
        ));
        let trades = TradeCoordinator::new(Arc::clone(&api), Arc::clone(&cache));

        Self {
            config,
            session,
            api,
            cache,
            scheduler,
            trades,
            watcher: Mutex::new(None),
        }
    }

    /// Begin following the session: poll while a credential is present.
    ///
    /// Must be called from within a tokio runtime. Calling it again is a no-op.
    pub fn start(&self) {
        let mut watcher = self.watcher.lock();
        if watcher.is_some() {
            return;
        }

        let mut session_rx = self.session.subscribe();
        let scheduler = Arc::clone(&self.scheduler);
        let cache = Arc::clone(&self.cache);

        if session_rx.borrow_and_update().is_authenticated() {
            scheduler.start();
        }

        *watcher = Some(tokio::spawn(async move {
            while session_rx.changed().await.is_ok() {
                let authenticated = session_rx.borrow_and_update().is_authenticated();
                debug!(authenticated, "Session changed");
                Self::follow_session(&scheduler, &cache, authenticated);
            }
        }));
        info!("Engine started");
    }

    /// Stop polling and session tracking (host teardown).
    pub fn shutdown(&self) {
        if let Some(watcher) = self.watcher.lock().take() {
            watcher.abort();
        }
        self.scheduler.stop();
        debug!("Engine shut down");
    }

    fn follow_session(
        scheduler: &PollingScheduler,
        cache: &MarketStateCache,
        authenticated: bool,
    ) {
        scheduler.stop();
        cache.evict_session();
        if authenticated {
            scheduler.start();
        }
    }

    /// Log in and install the returned credential.
    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        let token = self.api.login(username, password).await?;
        self.session.set_credential(token)?;
        info!("Logged in as {}", username);
        Ok(())
    }

    /// Create an account. Does not log in.
    pub async fn register(&self, username: &str, password: &str) -> Result<RegisteredAccount> {
        let account = self.api.register(username, password).await?;
        info!("Registered {}", account.username);
        Ok(account)
    }

    /// End the session. User state and polling are gone when this returns.
    pub fn logout(&self) {
        self.session.clear_credential();
        Self::follow_session(&self.scheduler, &self.cache, false);
        info!("Logged out");
    }

    /// Buy shares of a listing.
    pub async fn buy(&self, post_id: i64, shares: u32) -> Result<()> {
        self.trades.buy(post_id, shares).await
    }

    /// Sell shares of a listing.
    pub async fn sell(&self, post_id: i64, shares: u32) -> Result<()> {
        self.trades.sell(post_id, shares).await
    }

    /// Launch a new listing.
    pub async fn create_listing(&self, content: &str) -> Result<Listing> {
        self.trades.create_listing(content).await
    }

    /// Run a full reconciliation now.
    pub async fn refresh(&self) -> Result<()> {
        self.cache.refresh_all().await
    }

    /// Fetch the net worth ranking. Not cached.
    pub async fn leaderboard(&self) -> Result<Vec<LeaderboardEntry>> {
        self.api.leaderboard().await
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> MarketSnapshot {
        self.cache.snapshot()
    }

    /// Observe snapshot changes.
    pub fn subscribe(&self) -> watch::Receiver<MarketSnapshot> {
        self.cache.subscribe()
    }

    /// Value the current snapshot.
    pub fn valuation(&self) -> Valuation {
        valuation::valuate(&self.cache.snapshot())
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    pub fn is_polling(&self) -> bool {
        self.scheduler.is_active()
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::FakeMarket;
    use crate::session::MemoryCredentialStorage;
    use pretty_assertions::assert_eq;
    use reqwest::Method;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use std::time::Duration;

    const PERIOD: Duration = Duration::from_secs(5);

    fn market() -> Arc<FakeMarket> {
        let market = FakeMarket::new();
        market.respond(Method::POST, "/token", 200, json!({ "access_token": "jwt" }));
        market.respond(
            Method::GET,
            "/posts/",
            200,
            json!([{ "id": 5, "content": "gm", "creator_id": 2, "shares_sold": 3, "current_price": 15.0 }]),
        );
        market.respond(
            Method::GET,
            "/users/me",
            200,
            json!({ "id": 1, "username": "alice", "balance": 1000.0 }),
        );
        market.respond(
            Method::GET,
            "/portfolio/1",
            200,
            json!([{ "post_id": 5, "shares_owned": 3, "avg_buy_price": 10.0 }]),
        );
        market
    }

    fn engine(market: &Arc<FakeMarket>, storage: MemoryCredentialStorage) -> Engine {
        Engine::with_parts(Config::default(), market.clone(), storage)
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_reconciles_and_persists() {
        let market = market();
        let storage = MemoryCredentialStorage::new();
        let engine = engine(&market, storage.clone());
        engine.start();
        assert!(!engine.is_polling());

        engine.login("alice", "pw").await.unwrap();
        settle().await;

        assert_eq!(storage.stored(), Some("jwt".to_string()));
        assert!(engine.is_polling());

        let valuation = engine.valuation();
        assert_eq!(valuation.net_worth, Some(dec!(1045)));
        assert_eq!(valuation.assets[0].pnl_percent, dec!(50));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restored_session_polls_on_start() {
        let market = market();
        let engine = engine(&market, MemoryCredentialStorage::with_token("persisted"));

        engine.start();
        settle().await;

        assert!(engine.is_polling());
        assert!(engine.snapshot().user.is_some());
        assert_eq!(
            market.calls()[1].authorization.as_deref(),
            Some("Bearer persisted")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_logout_clears_state_despite_in_flight_refresh() {
        let market = market();
        let engine = engine(&market, MemoryCredentialStorage::with_token("tok"));
        engine.start();
        settle().await;
        assert!(engine.snapshot().user.is_some());

        market.hold(Method::GET, "/users/me");
        let refresh = tokio::spawn({
            let cache = engine.cache.clone();
            async move { cache.refresh_user().await }
        });
        settle().await;

        engine.logout();
        market.release(Method::GET, "/users/me");
        refresh.await.unwrap().unwrap();
        settle().await;

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.user, None);
        assert!(snapshot.holdings.is_empty());
        assert!(!engine.is_polling());
        assert_eq!(engine.valuation().net_worth, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_logout_login_keeps_one_poller() {
        let market = market();
        let engine = engine(&market, MemoryCredentialStorage::new());
        engine.start();

        engine.login("alice", "pw").await.unwrap();
        settle().await;
        engine.logout();
        settle().await;
        engine.login("alice", "pw").await.unwrap();
        settle().await;
        assert!(engine.is_polling());

        let before = market.calls_to(Method::GET, "/posts/");
        tokio::time::advance(PERIOD).await;
        settle().await;
        assert_eq!(market.calls_to(Method::GET, "/posts/"), before + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_credential_stops_polling() {
        let market = market();
        let engine = engine(&market, MemoryCredentialStorage::with_token("tok"));
        engine.start();
        settle().await;

        market.respond(Method::GET, "/users/me", 401, json!({ "detail": "expired" }));
        assert!(engine.refresh().await.unwrap_err().is_unauthorized());
        settle().await;

        assert!(!engine.is_authenticated());
        assert!(!engine.is_polling());
        assert_eq!(engine.snapshot().user, None);

        let before = market.calls().len();
        tokio::time::advance(PERIOD * 2).await;
        settle().await;
        assert_eq!(market.calls().len(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_buy_during_polling_triggers_one_reconciliation() {
        let market = market();
        market.respond(Method::POST, "/trade/buy", 200, json!({ "status": "success" }));
        let engine = engine(&market, MemoryCredentialStorage::with_token("tok"));
        engine.start();
        settle().await;
        tokio::time::advance(PERIOD / 2).await;

        let users_before = market.calls_to(Method::GET, "/users/me");
        let holdings_before = market.calls_to(Method::GET, "/portfolio/1");
        engine.buy(7, 2).await.unwrap();

        assert_eq!(market.calls_to(Method::GET, "/users/me"), users_before + 1);
        assert_eq!(market.calls_to(Method::GET, "/portfolio/1"), holdings_before + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_leaderboard_passthrough() {
        let market = market();
        market.respond(
            Method::GET,
            "/leaderboard",
            200,
            json!([{ "username": "bob", "net_worth": 1520.5 }, { "username": "alice", "net_worth": 1045.0 }]),
        );
        let engine = engine(&market, MemoryCredentialStorage::new());

        let ranking = engine.leaderboard().await.unwrap();
        assert_eq!(ranking[0].username, "bob");
        assert_eq!(ranking[0].net_worth, dec!(1520.5));
    }
}
