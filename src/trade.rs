use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::orders::Side;

/// A trade represents a matched transaction between two orders
///
/// - The price comes from the makers order (i.e resting order)
/// - Quantity is the amount filled
/// - the taker is the incoming order that triggered the trade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: String,
    pub symbol: String,
    pub price: Decimal,
    pub quantity: Decimal,
    pub aggressor_side: Side,
    pub maker_order_id: String,
    pub taker_order_id: String,
    pub timestamp: DateTime<Utc>,
}

impl Trade {
    /// Builds a trade for one maker/taker match. The trade id is a fresh
    /// uuid-v4 minted here, never derived from the order ids.
    pub fn new(
        symbol: &str,
        price: Decimal,
        quantity: Decimal,
        aggressor_side: Side,
        maker_order_id: &str,
        taker_order_id: &str,
    ) -> Self {
        Self {
            trade_id: Uuid::new_v4().to_string(),
            symbol: symbol.to_string(),
            price,
            quantity,
            aggressor_side,
            maker_order_id: maker_order_id.to_string(),
            taker_order_id: taker_order_id.to_string(),
            timestamp: Utc::now(),
        }
    }
}
