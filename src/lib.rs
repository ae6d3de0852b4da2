//! # BlueChip - Attention Market Client Engine
//!
//! Client-side engine for the BlueChip text exchange, where short posts
//! trade like securities. It keeps the session, live listing prices, the
//! user's cash balance and holdings consistent across overlapping refresh
//! cycles, and derives portfolio valuation from them.
//!
//! ## Architecture
//!
//! - **Session**: credential ownership and persistence
//! - **API**: request gateway with credential injection and failure classification
//! - **State**: market snapshot and its cache
//! - **Scheduler**: session-bound polling
//! - **Valuation**: net worth and per-position P&L
//! - **Trade**: buy/sell/list actions followed by reconciliation
//! - **App**: the `Engine` wiring everything together
//! - **Config**: configuration management

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod scheduler;
pub mod session;
pub mod state;
pub mod trade;
pub mod valuation;

pub use app::Engine;
pub use config::Config;
pub use error::{Error, Result};
pub use state::MarketSnapshot;
pub use valuation::{DerivedAsset, Valuation, valuate};
