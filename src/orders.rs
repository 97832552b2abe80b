use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,  //Bid,
    Sell, //Ask,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Limit,
    Market,
    /// Immediate-or-cancel: fill what crosses at the limit now, drop the rest.
    Ioc,
    /// Fill-or-kill: fill the whole quantity at or better than the limit, or nothing.
    Fok,
}

impl OrderType {
    /// Market orders are the only type allowed to omit a price.
    pub fn requires_price(&self) -> bool {
        !matches!(self, OrderType::Market)
    }
}

/// An order as accepted by the engine.
///
/// `quantity` is the *remaining* quantity: matching decrements it in place,
/// and a partially filled limit order rests with whatever is left. `price`
/// and `side` never change once the order has been submitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: String,
    pub symbol: String,
    pub order_type: OrderType,
    pub side: Side,
    pub quantity: Decimal,
    pub price: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
    pub user_id: Option<String>,
}

impl Order {
    /// Ingress validation; rejected orders never touch a book.
    ///
    /// A market order carrying a price passes: the price is simply ignored
    /// during matching.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.order_type.requires_price() && self.price.is_none() {
            return Err(EngineError::MissingPrice(self.order_type));
        }
        if self.quantity <= Decimal::ZERO {
            return Err(EngineError::NonPositiveQuantity);
        }
        Ok(())
    }
}
