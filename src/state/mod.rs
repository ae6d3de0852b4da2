//! Market state for BlueChip.
//!
//! The [`MarketSnapshot`] is the single view renderers consume. It only
//! changes through [`SnapshotUpdate`]s, each of which replaces one field
//! wholesale, so a snapshot never holds a locally predicted value.

mod cache;
mod market_state;
mod portfolio_state;

pub use cache::MarketStateCache;
pub use market_state::{Listing, SHARE_POOL_CAP};
pub use portfolio_state::{Holding, UserRecord};

use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Updates that can be applied to a snapshot.
#[derive(Debug, Clone)]
pub enum SnapshotUpdate {
    /// Fresh listings from `/posts/`.
    ListingsLoaded(Vec<Listing>),
    /// Fresh user record from `/users/me`.
    UserLoaded(UserRecord),
    /// Fresh holdings for the current user.
    HoldingsLoaded(Vec<Holding>),
    /// Session ended: forget everything user-scoped.
    SessionEvicted,
}

/// Latest known listings, user and holdings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketSnapshot {
    /// All listings, newest (highest id) first.
    pub listings: Vec<Listing>,
    /// Current user, `None` until loaded or after logout.
    pub user: Option<UserRecord>,
    /// Holdings keyed by listing id.
    pub holdings: HashMap<i64, Holding>,
    /// Last time any field was replaced.
    pub last_updated: Option<DateTime<Utc>>,
}

impl MarketSnapshot {
    /// Apply an update.
    pub fn reduce(&mut self, update: SnapshotUpdate) {
        match update {
            SnapshotUpdate::ListingsLoaded(mut listings) => {
                listings.sort_by(|a, b| b.id.cmp(&a.id));
                self.listings = listings;
            }
            SnapshotUpdate::UserLoaded(user) => {
                self.user = Some(user);
            }
            SnapshotUpdate::HoldingsLoaded(holdings) => {
                self.holdings = holdings.into_iter().map(|h| (h.post_id, h)).collect();
            }
            SnapshotUpdate::SessionEvicted => {
                self.user = None;
                self.holdings.clear();
            }
        }
        self.last_updated = Some(Utc::now());
    }

    /// Look up a listing by id.
    pub fn listing(&self, id: i64) -> Option<&Listing> {
        self.listings.iter().find(|l| l.id == id)
    }

    /// Shares the current user owns in a listing.
    pub fn shares_owned(&self, post_id: i64) -> u32 {
        self.holdings
            .get(&post_id)
            .map(|h| h.shares_owned)
            .unwrap_or_default()
    }

    /// Current user id, if a user is loaded.
    pub fn user_id(&self) -> Option<i64> {
        self.user.as_ref().map(|u| u.id)
    }
}
