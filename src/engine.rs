use crate::{
    errors::EngineError,
    orderbook::{BookSnapshot, OrderBook},
    orders::{Order, OrderType},
    trade::Trade,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::{Mutex, RwLock, broadcast};
use tracing::info;

/// Default number of price levels returned by snapshots.
pub const DEFAULT_DEPTH: usize = 10;

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Performance counters for `GET /stats`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStats {
    pub processed_orders: u64,
    pub uptime_seconds: f64,
    pub orders_per_second: f64,
    pub active_symbols: usize,
}

/// Routes incoming orders to per-symbol books and fans trade/book events out
/// to the market-data side.
///
/// Books are created lazily on the first order for a symbol and live for the
/// process lifetime. The symbol map is read-mostly (`RwLock`); each book sits
/// behind its own `Mutex`, held for the whole of one match call, so matching
/// on a symbol is strictly serial while distinct symbols match in parallel.
pub struct MatchingEngine {
    books: RwLock<HashMap<String, Arc<Mutex<OrderBook>>>>,
    trade_history: RwLock<HashMap<String, Vec<Trade>>>,
    processed_orders: AtomicU64,
    started_at: Instant,
    trade_tx: broadcast::Sender<Trade>,
    book_tx: broadcast::Sender<String>,
}

impl MatchingEngine {
    pub fn new() -> Self {
        let (trade_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (book_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            books: RwLock::new(HashMap::new()),
            trade_history: RwLock::new(HashMap::new()),
            processed_orders: AtomicU64::new(0),
            started_at: Instant::now(),
            trade_tx,
            book_tx,
        }
    }

    /// Trade events, one per fill, in execution order.
    pub fn subscribe_trades(&self) -> broadcast::Receiver<Trade> {
        self.trade_tx.subscribe()
    }

    /// Symbols whose book changed, one event per mutating submit.
    pub fn subscribe_book_updates(&self) -> broadcast::Receiver<String> {
        self.book_tx.subscribe()
    }

    async fn book_for(&self, symbol: &str) -> Arc<Mutex<OrderBook>> {
        if let Some(book) = self.books.read().await.get(symbol) {
            return Arc::clone(book);
        }
        let mut books = self.books.write().await;
        // Re-check: another submit may have created the book while we were
        // waiting for the write lock.
        if let Some(book) = books.get(symbol) {
            return Arc::clone(book);
        }
        info!(symbol, "creating order book");
        let book = Arc::new(Mutex::new(OrderBook::new(symbol)));
        books.insert(symbol.to_string(), Arc::clone(&book));
        self.trade_history
            .write()
            .await
            .insert(symbol.to_string(), Vec::new());
        book
    }

    /// Validates and matches one order, returning the trades it produced.
    ///
    /// The trades are appended to the symbol's history and broadcast to
    /// subscribers, and a book-update event is published when the submit
    /// changed the book, all before this call returns. Every completed
    /// dispatch bumps the processed-order counter, trades or not.
    pub async fn submit(&self, order: Order) -> Result<Vec<Trade>, EngineError> {
        order.validate()?;

        let symbol = order.symbol.clone();
        let is_limit = order.order_type == OrderType::Limit;
        let book = self.book_for(&symbol).await;

        let trades = {
            let mut book = book.lock().await;
            book.add_order(order)
        };

        if !trades.is_empty() {
            let mut history = self.trade_history.write().await;
            history
                .entry(symbol.clone())
                .or_default()
                .extend(trades.iter().cloned());
        }
        self.processed_orders.fetch_add(1, Ordering::Relaxed);

        for trade in &trades {
            let _ = self.trade_tx.send(trade.clone());
        }
        // A limit order always mutates the book (it trades or it rests); the
        // other types only do so when they traded.
        if is_limit || !trades.is_empty() {
            let _ = self.book_tx.send(symbol);
        }

        Ok(trades)
    }

    /// Point-in-time snapshot of one symbol's book, top `depth` levels per
    /// side. Fails with `SymbolNotFound` for symbols no order has ever named.
    pub async fn snapshot(&self, symbol: &str, depth: usize) -> Result<BookSnapshot, EngineError> {
        let book = {
            let books = self.books.read().await;
            books
                .get(symbol)
                .cloned()
                .ok_or_else(|| EngineError::SymbolNotFound(symbol.to_string()))?
        };
        let book = book.lock().await;
        Ok(BookSnapshot::of(&book, depth))
    }

    /// The most recent `limit` trades for a symbol, oldest first. Unknown
    /// symbols yield an empty page.
    pub async fn trades(&self, symbol: &str, limit: usize) -> Vec<Trade> {
        let history = self.trade_history.read().await;
        match history.get(symbol) {
            Some(trades) => {
                let start = trades.len().saturating_sub(limit);
                trades[start..].to_vec()
            }
            None => Vec::new(),
        }
    }

    pub async fn stats(&self) -> EngineStats {
        let uptime_seconds = self.started_at.elapsed().as_secs_f64();
        let processed_orders = self.processed_orders.load(Ordering::Relaxed);
        let orders_per_second = if uptime_seconds > 0.0 {
            processed_orders as f64 / uptime_seconds
        } else {
            0.0
        };
        EngineStats {
            processed_orders,
            uptime_seconds,
            orders_per_second,
            active_symbols: self.books.read().await.len(),
        }
    }
}

impl Default for MatchingEngine {
    fn default() -> Self {
        Self::new()
    }
}
