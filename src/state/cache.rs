//! Snapshot cache with controlled refresh operations.

use super::{MarketSnapshot, SnapshotUpdate};
use crate::api::ApiClient;
use crate::error::Result;
use crate::session::SessionStore;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tracing::{debug, warn};

/// Identifies the world a refresh was started in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Ticket {
    generation: u64,
    session_epoch: u64,
}

/// Holds the latest [`MarketSnapshot`] and refreshes it from the API.
///
/// Each `refresh_*` replaces exactly one snapshot field, and only on
/// success. A result is dropped if the cache was invalidated or the session
/// changed while its request was in flight.
pub struct MarketStateCache {
    api: Arc<ApiClient>,
    snapshot: watch::Sender<MarketSnapshot>,
    generation: AtomicU64,
}

impl MarketStateCache {
    /// Create a cache with an empty snapshot.
    pub fn new(api: Arc<ApiClient>) -> Self {
        let (snapshot, _) = watch::channel(MarketSnapshot::default());
        Self {
            api,
            snapshot,
            generation: AtomicU64::new(0),
        }
    }

    fn session(&self) -> &SessionStore {
        self.api.session()
    }

    /// Clone of the current snapshot.
    pub fn snapshot(&self) -> MarketSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Observe snapshot changes.
    pub fn subscribe(&self) -> watch::Receiver<MarketSnapshot> {
        self.snapshot.subscribe()
    }

    /// Current invalidation generation.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Refresh listings, newest first.
    pub async fn refresh_listings(&self) -> Result<()> {
        let ticket = self.ticket();
        let listings = self.api.listings().await.inspect_err(|e| {
            warn!("Failed to refresh listings: {}", e);
        })?;
        debug!("Fetched {} listings", listings.len());
        self.apply(ticket, SnapshotUpdate::ListingsLoaded(listings));
        Ok(())
    }

    /// Refresh the current user. No-op without a credential.
    pub async fn refresh_user(&self) -> Result<()> {
        if !self.session().is_authenticated() {
            debug!("Skipping user refresh, no session");
            return Ok(());
        }

        let ticket = self.ticket();
        match self.api.current_user().await {
            Ok(user) => {
                self.apply(ticket, SnapshotUpdate::UserLoaded(user));
                Ok(())
            }
            Err(e) if e.is_unauthorized() => {
                self.evict_expired(ticket);
                Err(e)
            }
            Err(e) => {
                warn!("Failed to refresh user: {}", e);
                Err(e)
            }
        }
    }

    /// Refresh holdings for the loaded user. No-op without a user.
    pub async fn refresh_holdings(&self) -> Result<()> {
        let user_id = self.snapshot.borrow().user_id();
        let Some(user_id) = user_id else {
            debug!("Skipping holdings refresh, no user loaded");
            return Ok(());
        };

        let ticket = self.ticket();
        let holdings = self.api.portfolio(user_id).await.inspect_err(|e| {
            warn!("Failed to refresh holdings for user {}: {}", user_id, e);
        })?;
        self.apply(ticket, SnapshotUpdate::HoldingsLoaded(holdings));
        Ok(())
    }

    /// Listings, then user, then holdings.
    ///
    /// Holdings need the user id resolved by the user refresh, so the order
    /// is fixed. Every step runs; the first failure is returned.
    pub async fn refresh_all(&self) -> Result<()> {
        let listings = self.refresh_listings().await;
        let user = self.refresh_user().await;
        let holdings = self.refresh_holdings().await;
        listings.and(user).and(holdings)
    }

    /// Forget user and holdings, and discard every in-flight refresh.
    pub fn evict_session(&self) {
        let generation = &self.generation;
        self.snapshot.send_modify(|snapshot| {
            generation.fetch_add(1, Ordering::SeqCst);
            snapshot.reduce(SnapshotUpdate::SessionEvicted);
        });
        debug!("Evicted user state");
    }

    /// Evict after a 401, unless the refresh went stale or a new credential
    /// is already in place.
    fn evict_expired(&self, ticket: Ticket) {
        let generation = &self.generation;
        let session = self.session();
        let evicted = self.snapshot.send_if_modified(|snapshot| {
            if generation.load(Ordering::SeqCst) != ticket.generation
                || session.is_authenticated()
            {
                return false;
            }
            generation.fetch_add(1, Ordering::SeqCst);
            snapshot.reduce(SnapshotUpdate::SessionEvicted);
            true
        });

        if evicted {
            debug!("Evicted user state after expired credential");
        } else {
            debug!(?ticket, "Ignoring unauthorized result from a replaced session");
        }
    }

    /// Discard every in-flight refresh without touching the snapshot.
    pub fn invalidate(&self) {
        // taken under the snapshot lock so no apply can interleave
        let generation = &self.generation;
        self.snapshot.send_if_modified(|_| {
            generation.fetch_add(1, Ordering::SeqCst);
            false
        });
    }

    fn ticket(&self) -> Ticket {
        Ticket {
            generation: self.generation(),
            session_epoch: self.session().epoch(),
        }
    }

    fn apply(&self, ticket: Ticket, update: SnapshotUpdate) -> bool {
        let generation = &self.generation;
        let session = self.session();
        self.snapshot.send_if_modified(|snapshot| {
            let current = Ticket {
                generation: generation.load(Ordering::SeqCst),
                session_epoch: session.epoch(),
            };
            if current != ticket {
                debug!(?ticket, ?current, "Discarding stale refresh result");
                return false;
            }
            snapshot.reduce(update);
            true
        })
    }
}

impl std::fmt::Debug for MarketStateCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketStateCache")
            .field("generation", &self.generation())
            .finish_non_exhaustive()
    }
}
