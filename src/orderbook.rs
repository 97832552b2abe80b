use crate::{
    orders::{Order, OrderType, Side},
    trade::Trade,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, trace};

/// All resting orders at one price on one side of one book.
///
/// Orders queue in arrival order ([`VecDeque`]) and are only ever consumed
/// from the front, which is what gives time priority within the level.
/// `total_quantity` caches the sum of the remaining quantities in the queue
/// so depth queries never walk the orders.
#[derive(Debug)]
pub struct PriceLevel {
    price: Decimal,
    orders: VecDeque<Order>,
    total_quantity: Decimal,
}

impl PriceLevel {
    pub fn new(price: Decimal) -> Self {
        Self {
            price,
            orders: VecDeque::new(),
            total_quantity: Decimal::ZERO,
        }
    }

    pub fn price(&self) -> Decimal {
        self.price
    }

    pub fn total_quantity(&self) -> Decimal {
        self.total_quantity
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    /// Appends `order` to the tail of the queue. Precondition: the order's
    /// remaining quantity is positive.
    pub fn append(&mut self, order: Order) {
        debug_assert!(order.quantity > Decimal::ZERO);
        self.total_quantity += order.quantity;
        self.orders.push_back(order);
    }

    pub fn peek_front(&self) -> Option<&Order> {
        self.orders.front()
    }

    /// Removes and returns the head order, deducting whatever quantity it
    /// still carried from the level total.
    pub fn pop_front(&mut self) -> Option<Order> {
        let order = self.orders.pop_front()?;
        self.total_quantity -= order.quantity;
        Some(order)
    }

    /// Subtracts `delta` from the head order and from the level total.
    /// Precondition: `delta` does not exceed the head's remaining quantity.
    /// A head left at zero must be popped before the next match iteration.
    pub fn decrement_front(&mut self, delta: Decimal) {
        if let Some(front) = self.orders.front_mut() {
            debug_assert!(delta <= front.quantity);
            front.quantity -= delta;
            self.total_quantity -= delta;
        }
    }
}

/// An [`OrderBook`] stores **active** buy and sell orders for one symbol in
/// two [`BTreeMap`]s keyed by price:
/// - `bids` (buy orders)
/// - `asks` (sell orders)
///
/// Each entry is a [`PriceLevel`] FIFO queue, so matching walks best price
/// first and oldest order first within a price: price-time priority. The
/// ordered maps give O(log P) best-price lookup and level insert/remove.
pub struct OrderBook {
    symbol: String,

    /// Buy side, keyed by price in ascending order.
    ///
    /// For matching we iterate **in reverse** to find the highest bid first.
    bids: BTreeMap<Decimal, PriceLevel>,

    /// Sell side, keyed by price in ascending order.
    ///
    /// For matching we iterate **forwards** to find the lowest ask first.
    asks: BTreeMap<Decimal, PriceLevel>,

    best_bid: Option<Decimal>,
    best_ask: Option<Decimal>,
}

/// Matches an incoming **taker** against one side of the book, producing a
/// series of [`Trade`]s.
///
/// # Parameters
/// - `taker`: the incoming order; its `quantity` is decremented in place.
/// - `book_side`: the opposite side (`asks` for a buy, `bids` for a sell).
/// - `descending`: iterate prices descending (`true`, matching against
///   bids) or ascending (`false`, matching against asks).
/// - `cap`: the taker's limit price; `None` means no cap (market order,
///   including market orders that arrived carrying a price).
///
/// Each fill is `min(taker remaining, maker remaining)`, executed at the
/// maker's resting price. Fully consumed makers are popped; fully consumed
/// levels are removed from the map before the next price is considered.
fn match_incoming_side(
    taker: &mut Order,
    symbol: &str,
    book_side: &mut BTreeMap<Decimal, PriceLevel>,
    descending: bool,
    cap: Option<Decimal>,
) -> Vec<Trade> {
    let mut trades = Vec::new();

    while taker.quantity > Decimal::ZERO {
        let best = if descending {
            book_side.keys().next_back().copied()
        } else {
            book_side.keys().next().copied()
        };
        let Some(best) = best else { break };

        // Limit eligibility is non-strict: a taker priced exactly at the
        // best opposite price crosses.
        let crosses = match cap {
            None => true,
            Some(limit) if descending => limit <= best,
            Some(limit) => limit >= best,
        };
        if !crosses {
            break;
        }

        let Some(level) = book_side.get_mut(&best) else {
            break;
        };

        while taker.quantity > Decimal::ZERO {
            let Some(maker) = level.peek_front() else { break };
            let maker_id = maker.order_id.clone();
            let fill = taker.quantity.min(maker.quantity);

            trace!(
                symbol,
                price = %best,
                quantity = %fill,
                maker = %maker_id,
                taker = %taker.order_id,
                "fill"
            );
            trades.push(Trade::new(
                symbol,
                level.price(),
                fill,
                taker.side,
                &maker_id,
                &taker.order_id,
            ));

            taker.quantity -= fill;
            level.decrement_front(fill);

            // A maker left at zero is done; pop it before the next fill.
            if level.peek_front().is_some_and(|o| o.quantity.is_zero()) {
                level.pop_front();
            }
        }

        if level.is_empty() {
            debug!(symbol, price = %best, "price level exhausted");
            book_side.remove(&best);
        }
    }

    trades
}

impl OrderBook {
    /// Creates a new, empty book for `symbol`.
    pub fn new(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            best_bid: None,
            best_ask: None,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Runs one order through the book and returns the trades it produced.
    ///
    /// - Limit: matches what crosses, rests the remainder on its own side.
    /// - Market: sweeps the opposite side at any price; unfilled remainder
    ///   is dropped. A price on a market order is ignored.
    /// - Ioc: only proceeds if the best opposite price crosses the limit;
    ///   unfilled remainder is dropped.
    /// - Fok: only proceeds if the liquidity resting at crossing prices
    ///   covers the full quantity; otherwise nothing happens at all.
    ///
    /// Best bid/ask are recomputed before returning, and the book is never
    /// left crossed.
    pub fn add_order(&mut self, mut order: Order) -> Vec<Trade> {
        if matches!(order.order_type, OrderType::Ioc | OrderType::Fok)
            && !self.can_fill_immediately(&order)
        {
            trace!(symbol = %self.symbol, order_id = %order.order_id,
                   order_type = ?order.order_type, "not fillable, dropped");
            return Vec::new();
        }

        let cap = match order.order_type {
            OrderType::Market => None,
            _ => order.price,
        };
        let trades = match order.side {
            Side::Buy => {
                match_incoming_side(&mut order, &self.symbol, &mut self.asks, false, cap)
            }
            Side::Sell => {
                match_incoming_side(&mut order, &self.symbol, &mut self.bids, true, cap)
            }
        };

        // Only a limit order may rest; market/ioc residuals are dropped and
        // a fok that got this far cannot have a residual.
        if order.quantity > Decimal::ZERO && order.order_type == OrderType::Limit {
            self.rest_order(order);
        }

        self.update_bbo();
        trades
    }

    fn rest_order(&mut self, order: Order) {
        let Some(price) = order.price else {
            debug!(symbol = %self.symbol, order_id = %order.order_id,
                   "unpriced order cannot rest, dropped");
            return;
        };
        let book_side = match order.side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        };
        book_side
            .entry(price)
            .or_insert_with(|| PriceLevel::new(price))
            .append(order);
    }

    /// Pre-match feasibility for Ioc/Fok; read-only, so an infeasible order
    /// leaves the book untouched.
    fn can_fill_immediately(&self, order: &Order) -> bool {
        let Some(limit) = order.price else {
            return false;
        };
        match order.order_type {
            OrderType::Ioc => match order.side {
                Side::Buy => self.asks.keys().next().is_some_and(|best| limit >= *best),
                Side::Sell => self.bids.keys().next_back().is_some_and(|best| limit <= *best),
            },
            OrderType::Fok => self.has_eligible_depth(order.side, limit, order.quantity),
            _ => true,
        }
    }

    /// Walks the opposite side best-first, summing level totals at prices
    /// that cross `limit`, and reports whether they reach `required`.
    fn has_eligible_depth(&self, side: Side, limit: Decimal, required: Decimal) -> bool {
        let mut depth = Decimal::ZERO;
        match side {
            Side::Buy => {
                for (price, level) in self.asks.iter() {
                    if *price > limit {
                        break;
                    }
                    depth += level.total_quantity();
                    if depth >= required {
                        return true;
                    }
                }
            }
            Side::Sell => {
                for (price, level) in self.bids.iter().rev() {
                    if *price < limit {
                        break;
                    }
                    depth += level.total_quantity();
                    if depth >= required {
                        return true;
                    }
                }
            }
        }
        depth >= required
    }

    fn update_bbo(&mut self) {
        self.best_bid = self.bids.keys().next_back().copied();
        self.best_ask = self.asks.keys().next().copied();
    }

    /// Current best bid and best ask, either of which may be absent.
    pub fn get_bbo(&self) -> (Option<Decimal>, Option<Decimal>) {
        (self.best_bid, self.best_ask)
    }

    /// Top `levels` price levels per side as `(price, total_quantity)`
    /// pairs: bids in descending price order, asks ascending.
    pub fn get_depth(&self, levels: usize) -> (Vec<(Decimal, Decimal)>, Vec<(Decimal, Decimal)>) {
        let bids = self
            .bids
            .iter()
            .rev()
            .take(levels)
            .map(|(price, level)| (*price, level.total_quantity()))
            .collect();
        let asks = self
            .asks
            .iter()
            .take(levels)
            .map(|(price, level)| (*price, level.total_quantity()))
            .collect();
        (bids, asks)
    }
}

/// A point-in-time view of one book, shared by the REST snapshot endpoint
/// and the websocket book-update frames. Prices and quantities serialize as
/// decimal strings; an absent best price serializes as `null`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookSnapshot {
    pub symbol: String,
    pub best_bid: Option<Decimal>,
    pub best_ask: Option<Decimal>,
    pub bids: Vec<(Decimal, Decimal)>,
    pub asks: Vec<(Decimal, Decimal)>,
    pub timestamp: DateTime<Utc>,
}

impl BookSnapshot {
    /// Snapshot of a symbol no order has touched yet: both sides empty.
    pub fn empty(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            best_bid: None,
            best_ask: None,
            bids: Vec::new(),
            asks: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn of(book: &OrderBook, depth: usize) -> Self {
        let (best_bid, best_ask) = book.get_bbo();
        let (bids, asks) = book.get_depth(depth);
        Self {
            symbol: book.symbol().to_string(),
            best_bid,
            best_ask,
            bids,
            asks,
            timestamp: Utc::now(),
        }
    }
}
