//! Portfolio valuation.
//!
//! Pure functions over a [`MarketSnapshot`]. Nothing here is cached: every
//! call recomputes from the snapshot it is given.

use crate::state::{Holding, Listing, MarketSnapshot};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use tracing::warn;

/// A held position marked to the current listing price.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedAsset {
    pub post_id: i64,
    pub content: String,
    pub shares: u32,
    /// Average price paid per share.
    pub avg_cost: Decimal,
    /// Current listing price.
    pub market_price: Decimal,
    pub market_value: Decimal,
    pub cost_basis: Decimal,
    pub pnl: Decimal,
    /// Percentage return on cost basis; zero when cost basis is zero.
    pub pnl_percent: Decimal,
}

impl DerivedAsset {
    /// Mark a holding to market. `None` when the amounts overflow.
    fn from_holding(holding: &Holding, listing: &Listing) -> Option<Self> {
        let shares = Decimal::from(holding.shares_owned);
        let market_value = shares.checked_mul(listing.current_price)?;
        let cost_basis = holding.cost_basis()?;
        let pnl = market_value.checked_sub(cost_basis)?;
        let pnl_percent = if cost_basis > Decimal::ZERO {
            pnl.checked_div(cost_basis)
                .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
                .unwrap_or_else(|| {
                    warn!(post_id = listing.id, "Return on cost basis out of range");
                    Decimal::ZERO
                })
        } else {
            Decimal::ZERO
        };

        Some(Self {
            post_id: listing.id,
            content: listing.content.clone(),
            shares: holding.shares_owned,
            avg_cost: holding.avg_buy_price,
            market_price: listing.current_price,
            market_value,
            cost_basis,
            pnl,
            pnl_percent,
        })
    }

    /// Check if the position is at or above cost.
    pub fn is_profitable(&self) -> bool {
        self.pnl >= Decimal::ZERO
    }
}

/// Result of a valuation pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Valuation {
    /// Open positions with a known listing, newest listing first.
    pub assets: Vec<DerivedAsset>,
    /// Cash balance, `None` when no user is loaded.
    pub cash: Option<Decimal>,
    /// Sum of market value over `assets`.
    pub holdings_value: Decimal,
    /// Sum of pnl over `assets`.
    pub total_pnl: Decimal,
    /// Cash plus holdings value, `None` when no user is loaded.
    pub net_worth: Option<Decimal>,
}

/// Value every open holding in the snapshot.
///
/// Closed holdings, holdings whose listing is missing from the snapshot and
/// holdings whose value overflows are skipped.
pub fn valuate(snapshot: &MarketSnapshot) -> Valuation {
    let listings: HashMap<i64, &Listing> = snapshot.listings.iter().map(|l| (l.id, l)).collect();

    let mut assets: Vec<DerivedAsset> = snapshot
        .holdings
        .values()
        .filter(|h| h.is_open())
        .filter_map(|h| {
            let listing = listings.get(&h.post_id)?;
            let asset = DerivedAsset::from_holding(h, listing);
            if asset.is_none() {
                warn!(post_id = h.post_id, "Skipping holding with out-of-range value");
            }
            asset
        })
        .collect();
    assets.sort_by(|a, b| b.post_id.cmp(&a.post_id));

    let holdings_value = checked_sum(assets.iter().map(|a| a.market_value));
    let total_pnl = checked_sum(assets.iter().map(|a| a.pnl));
    let cash = snapshot.user.as_ref().map(|u| u.balance);
    let net_worth = cash.and_then(|balance| balance.checked_add(holdings_value));

    Valuation {
        assets,
        cash,
        holdings_value,
        total_pnl,
        net_worth,
    }
}

fn checked_sum(mut values: impl Iterator<Item = Decimal>) -> Decimal {
    values
        .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(v))
        .unwrap_or_else(|| {
            warn!("Portfolio total out of range");
            Decimal::MAX
        })
}
