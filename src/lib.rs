//! A central limit order book matching engine for a single venue with
//! multiple symbols.
//!
//! The core is the per-symbol [`orderbook::OrderBook`]: two ordered maps of
//! FIFO [`orderbook::PriceLevel`]s implementing price-time priority matching
//! for limit, market, immediate-or-cancel and fill-or-kill orders, with
//! exact decimal prices and quantities. The [`engine::MatchingEngine`]
//! dispatches orders to books (created lazily per symbol), records trade
//! history, tracks performance counters and broadcasts trade / book-update
//! events. The [`api`] module puts an axum HTTP + WebSocket surface over the
//! engine.

pub mod api;
pub mod engine;
pub mod errors;
pub mod orderbook;
pub mod orders;
pub mod state;
pub mod trade;
pub mod utils;

pub use engine::{EngineStats, MatchingEngine};
pub use errors::EngineError;
pub use orderbook::{BookSnapshot, OrderBook, PriceLevel};
pub use orders::{Order, OrderType, Side};
pub use trade::Trade;
