//! Listing-related state.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Maximum number of shares a single listing can ever have outstanding.
pub const SHARE_POOL_CAP: u32 = 100;

/// A tradable post.
///
/// Price is server-computed from `shares_sold`; the client never derives it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    /// Listing ID (post id).
    pub id: i64,
    /// User who created the listing.
    pub creator_id: i64,
    /// Post text.
    pub content: String,
    /// Price of the next share.
    pub current_price: Decimal,
    /// Shares currently held by traders.
    pub shares_sold: u32,
    /// Creation time as reported by the server.
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
}

impl Listing {
    /// Shares still available in the pool.
    pub fn shares_available(&self) -> u32 {
        SHARE_POOL_CAP.saturating_sub(self.shares_sold)
    }

    /// Check if the whole pool has been bought.
    pub fn is_sold_out(&self) -> bool {
        self.shares_available() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_decodes_server_payload() {
        let json = r#"{
            "id": 5,
            "content": "gm",
            "creator_id": 2,
            "shares_sold": 10,
            "current_price": 15.0,
            "created_at": "2025-03-01T09:30:00.123456"
        }"#;
        let listing: Listing = serde_json::from_str(json).unwrap();
        assert_eq!(listing.id, 5);
        assert_eq!(listing.current_price, dec!(15));
        assert_eq!(listing.shares_available(), 90);
        assert!(listing.created_at.is_some());
    }

    #[test]
    fn test_sold_out_at_cap() {
        let listing = Listing {
            id: 1,
            creator_id: 1,
            content: "full".to_string(),
            current_price: dec!(510),
            shares_sold: SHARE_POOL_CAP,
            created_at: None,
        };
        assert!(listing.is_sold_out());
    }
}
