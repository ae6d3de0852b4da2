//! Trade and listing actions.

use crate::api::{ApiClient, TradeSide};
use crate::error::{Error, Result};
use crate::state::{Listing, MarketStateCache};
use std::sync::Arc;
use tracing::{info, warn};

/// Longest listing text the market accepts.
pub const MAX_LISTING_LENGTH: usize = 280;

/// Executes user intents against the API, then reconciles the cache.
///
/// The coordinator never predicts a post-trade price or balance. After a
/// successful action the whole snapshot is refetched; after a failed one
/// nothing is touched and the error goes back to the caller.
#[derive(Debug, Clone)]
pub struct TradeCoordinator {
    api: Arc<ApiClient>,
    cache: Arc<MarketStateCache>,
}

impl TradeCoordinator {
    pub fn new(api: Arc<ApiClient>, cache: Arc<MarketStateCache>) -> Self {
        Self { api, cache }
    }

    /// Buy shares of a listing.
    pub async fn buy(&self, post_id: i64, shares: u32) -> Result<()> {
        self.trade(TradeSide::Buy, post_id, shares).await
    }

    /// Sell shares of a listing.
    pub async fn sell(&self, post_id: i64, shares: u32) -> Result<()> {
        self.trade(TradeSide::Sell, post_id, shares).await
    }

    async fn trade(&self, side: TradeSide, post_id: i64, shares: u32) -> Result<()> {
        if shares < 1 {
            return Err(Error::invalid_input("Trade at least one share"));
        }

        self.api
            .trade(side, post_id, shares)
            .await
            .inspect_err(|e| warn!("{} of {} x #{} failed: {}", side, shares, post_id, e))?;

        info!("{} {} x #{}", side, shares, post_id);
        self.reconcile().await;
        Ok(())
    }

    /// Launch a new listing. The creator is taken from the session.
    pub async fn create_listing(&self, content: &str) -> Result<Listing> {
        let content = content.trim();
        if content.is_empty() {
            return Err(Error::invalid_input("Listing content is empty"));
        }
        if content.chars().count() > MAX_LISTING_LENGTH {
            return Err(Error::invalid_input(format!(
                "Listing content exceeds {} characters",
                MAX_LISTING_LENGTH
            )));
        }

        let listing = self
            .api
            .create_listing(content)
            .await
            .inspect_err(|e| warn!("Listing creation failed: {}", e))?;

        info!("Listed #{}", listing.id);
        self.reconcile().await;
        Ok(listing)
    }

    async fn reconcile(&self) {
        // the action already succeeded; the next poll heals a failed refresh
        if let Err(e) = self.cache.refresh_all().await {
            warn!("Post-action refresh failed: {}", e);
        }
    }
}
