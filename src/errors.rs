use thiserror::Error;

use crate::orders::OrderType;

/// Errors surfaced at the engine boundary.
///
/// Unparseable sides/types and malformed decimals never reach the engine:
/// they fail serde deserialization at the API layer. No error is raised for
/// an IOC/FOK that fails its feasibility check or a market order that runs
/// out of liquidity; both return an empty trade list.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0:?} orders require a price")]
    MissingPrice(OrderType),
    #[error("quantity must be > 0")]
    NonPositiveQuantity,
    #[error("unknown symbol `{0}`")]
    SymbolNotFound(String),
}
