//! Market API integration.
//!
//! This module provides the request gateway to the remote trading API,
//! handling credential injection and failure classification.

mod client;
mod transport;
mod types;

pub use client::ApiClient;
pub use transport::{ApiRequest, ApiResponse, HttpTransport, RequestBody, Transport};
pub use types::{
    CreateListingRequest, LeaderboardEntry, RegisterRequest, RegisteredAccount, STARTING_BALANCE,
    TokenResponse, TradeSide,
};

#[cfg(test)]
pub(crate) use transport::fake::FakeMarket;
#[cfg(test)]
pub(crate) use transport::MockTransport;
