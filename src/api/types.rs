//! Wire payloads for the market API that are not snapshot records.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Starting cash granted to new accounts.
pub const STARTING_BALANCE: Decimal = Decimal::ONE_THOUSAND;

/// Response of `POST /token`.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Body of `POST /register`.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password_hash: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
}

/// Account returned by `POST /register`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RegisteredAccount {
    pub id: i64,
    pub username: String,
}

/// Body of `POST /posts/`. The creator comes from the credential.
#[derive(Debug, Clone, Serialize)]
pub struct CreateListingRequest {
    pub content: String,
}

/// One row of `GET /leaderboard`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LeaderboardEntry {
    pub username: String,
    pub net_worth: Decimal,
}

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    /// Endpoint path for this side.
    pub fn path(&self) -> &'static str {
        match self {
            Self::Buy => "/trade/buy",
            Self::Sell => "/trade/sell",
        }
    }
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "Buy"),
            Self::Sell => write!(f, "Sell"),
        }
    }
}
