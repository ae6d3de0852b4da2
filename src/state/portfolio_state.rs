//! User and holding records.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The authenticated user as served by `/users/me`.
///
/// `balance` is authoritative cash and is only ever replaced wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub balance: Decimal,
}

/// A position in one listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    /// Listing the position refers to.
    pub post_id: i64,
    /// Shares owned. Zero means the position is closed.
    pub shares_owned: u32,
    /// Weighted average purchase price.
    pub avg_buy_price: Decimal,
}

impl Holding {
    /// Check if the position still holds shares.
    pub fn is_open(&self) -> bool {
        self.shares_owned > 0
    }

    /// Total paid for the shares still held. `None` on overflow.
    pub fn cost_basis(&self) -> Option<Decimal> {
        Decimal::from(self.shares_owned).checked_mul(self.avg_buy_price)
    }
}
