use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::json;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{error, warn};

use axum::{
    Json, Router,
    body::Bytes,
    extract::{
        FromRequest, Path, Query, Request, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    engine::DEFAULT_DEPTH,
    errors::EngineError,
    orderbook::BookSnapshot,
    orders::{Order, OrderType, Side},
    state::AppState,
    trade::Trade,
};

type ApiErr = (StatusCode, Json<serde_json::Value>);
fn err(status: StatusCode, msg: &str) -> ApiErr {
    (status, Json(json!({ "error": msg })))
}

impl From<EngineError> for ApiErr {
    fn from(e: EngineError) -> Self {
        let status = match e {
            EngineError::SymbolNotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::BAD_REQUEST,
        };
        err(status, &e.to_string())
    }
}

fn log_rejected(payload: &NewOrder, reason: &str) {
    warn!(
        reason,
        side = ?payload.side,
        order_type = ?payload.order_type,
        price = ?payload.price,
        quantity = %payload.quantity,
        symbol = %payload.symbol,
        "order rejected"
    );
}

/// JSON extractor that logs rejected bodies before returning 422.
///
/// Malformed decimals and unknown side/type values fail here, at the
/// deserialization boundary, so the engine never sees them.
pub struct LoggedJson<T>(pub T);

impl<S, T> FromRequest<S> for LoggedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiErr;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        //capture request details for logging
        let method = req.method().clone();
        let uri = req.uri().clone();
        // read full body
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| err(StatusCode::BAD_REQUEST, &e.to_string()))?;

        match serde_json::from_slice::<T>(&bytes) {
            Ok(val) => Ok(LoggedJson(val)),
            Err(e) => {
                //cap body preview to avoid giant logs
                let preview = String::from_utf8_lossy(&bytes);
                let preview = &preview[..preview.len().min(4096)];
                warn!(
                    error = %e,
                    %method,
                    uri = %uri,
                    body_preview = %preview,
                    "order rejected: JSON deserialization failed"
                );
                Err(err(StatusCode::UNPROCESSABLE_ENTITY, &e.to_string()))
            }
        }
    }
}

/// Request payload for `POST /orders`.
///
/// - `symbol`: trading symbol, e.g. `"BTC-USDT"`
/// - `order_type`: market | limit | ioc | fok
/// - `side`: buy | sell
/// - `quantity`: decimal string, must be > 0
/// - `price`: decimal string; required for limit/ioc/fok, ignored for market
/// - `user_id`: optional opaque tag, not used by matching
/// - `order_id`: optional; a uuid is minted when absent
#[derive(Deserialize)]
pub struct NewOrder {
    pub symbol: String,
    pub order_type: OrderType,
    pub side: Side,
    pub quantity: Decimal,
    pub price: Option<Decimal>,
    pub user_id: Option<String>,
    pub order_id: Option<String>,
}

/// Response for `POST /orders`.
///
/// - `order_id`: the (possibly minted) order ID
/// - `trades`: any matched trades resulting from this order
#[derive(Serialize, Deserialize)]
pub struct OrderAck {
    pub order_id: String,
    pub trades: Vec<Trade>,
}

fn default_depth() -> usize {
    DEFAULT_DEPTH
}
#[derive(Deserialize)]
pub struct DepthQuery {
    #[serde(default = "default_depth")]
    depth: usize,
}

fn default_limit() -> usize {
    100
}
#[derive(Deserialize)]
pub struct TradesQuery {
    #[serde(default = "default_limit")]
    limit: usize,
}

/// A websocket message: the initial book snapshot, a book update after a
/// mutating order, or a single trade event.
///
/// Serialized as an internally-tagged enum:
/// ```json
/// {"type": "book_snapshot", "data": { /* snapshot fields */ }}
/// {"type": "book_update",   "data": { /* snapshot fields */ }}
/// {"type": "trade",         "data": { /* trade fields */ }}
/// ```
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum WsFrame {
    BookSnapshot(BookSnapshot),
    BookUpdate(BookSnapshot),
    Trade(Trade),
}

/// `POST /orders`
/// Submits a new order to the engine.
///
/// *Success:*
///   • 200, JSON [`OrderAck`]
/// *Bad Request:*
///   • 400, JSON `{ "error": "limit orders require a price" }` etc.
/// *Unprocessable:*
///   • 422 for bodies that fail to deserialize (unknown side/type,
///     malformed decimal)
pub async fn create_order(
    State(state): State<AppState>,
    LoggedJson(payload): LoggedJson<NewOrder>,
) -> Result<Json<OrderAck>, ApiErr> {
    let order = Order {
        order_id: payload
            .order_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string()),
        symbol: payload.symbol.clone(),
        order_type: payload.order_type,
        side: payload.side,
        quantity: payload.quantity,
        price: payload.price,
        timestamp: Utc::now(),
        user_id: payload.user_id.clone(),
    };
    let order_id = order.order_id.clone();

    let trades = state.engine.submit(order).await.map_err(|e| {
        log_rejected(&payload, &e.to_string());
        ApiErr::from(e)
    })?;

    Ok(Json(OrderAck { order_id, trades }))
}

/// `GET /book/{symbol}?depth=10`
/// Returns a JSON snapshot of the order book: best bid/ask (or `null`) and
/// the top `depth` levels per side as `[price, quantity]` decimal strings.
/// 404 for symbols the engine has never seen.
pub async fn get_order_book(
    Path(symbol): Path<String>,
    Query(q): Query<DepthQuery>,
    State(state): State<AppState>,
) -> Result<Json<BookSnapshot>, ApiErr> {
    let snapshot = state.engine.snapshot(&symbol, q.depth).await?;
    Ok(Json(snapshot))
}

/// `GET /trades/{symbol}?limit=100`
/// Returns the most recent trades for the symbol, oldest first. `limit` is
/// capped at 1000. Unknown symbols yield an empty list.
pub async fn get_trade_log(
    Path(symbol): Path<String>,
    Query(q): Query<TradesQuery>,
    State(state): State<AppState>,
) -> Json<Vec<Trade>> {
    let limit = q.limit.min(1000);
    Json(state.engine.trades(&symbol, limit).await)
}

/// `GET /stats`
/// Engine-level performance counters.
pub async fn get_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.engine.stats().await)
}

/// `GET /ws/{symbol}`
/// Upgrades the HTTP connection to a WebSocket and streams order-book
/// updates and trade events for the symbol.
pub async fn ws_handler(
    Path(symbol): Path<String>,
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, symbol))
}

/// Once the socket is upgraded, drives the message loop:
///  - Sends an initial book snapshot
///  - Forwards trade and book-update broadcasts for the symbol
pub async fn handle_socket(mut socket: WebSocket, state: AppState, symbol: String) {
    let mut trade_rx = state.engine.subscribe_trades();
    let mut book_rx = state.engine.subscribe_book_updates();

    let initial = match state.engine.snapshot(&symbol, DEFAULT_DEPTH).await {
        Ok(snapshot) => snapshot,
        Err(_) => BookSnapshot::empty(&symbol),
    };
    let Ok(text) = serde_json::to_string(&WsFrame::BookSnapshot(initial)) else {
        return;
    };
    if let Err(e) = socket.send(Message::Text(text.into())).await {
        error!("Failed to send initial snapshot: {:?}", e);
        return;
    }

    loop {
        tokio::select! {
            Ok(trade) = trade_rx.recv() => {
                if trade.symbol == symbol {
                    let Ok(text) = serde_json::to_string(&WsFrame::Trade(trade)) else { break };
                    if let Err(e) = socket.send(Message::Text(text.into())).await {
                        error!("WebSocket send trade failed: {:?}", e);
                        break;
                    }
                }
            }
            Ok(updated) = book_rx.recv() => {
                if updated == symbol {
                    let Ok(snapshot) = state.engine.snapshot(&symbol, DEFAULT_DEPTH).await else {
                        continue;
                    };
                    let Ok(text) = serde_json::to_string(&WsFrame::BookUpdate(snapshot)) else { break };
                    if let Err(e) = socket.send(Message::Text(text.into())).await {
                        error!("WebSocket send snapshot failed: {:?}", e);
                        break;
                    }
                }
            }
            else => break
        }
    }
}

/// Constructs the application's `Router` with all routes and shared state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/orders", post(create_order))
        .route("/book/{symbol}", get(get_order_book))
        .route("/trades/{symbol}", get(get_trade_log))
        .route("/stats", get(get_stats))
        .route("/ws/{symbol}", get(ws_handler))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(
                    DefaultMakeSpan::new()
                        .include_headers(false)
                        .level(tracing::Level::TRACE),
                )
                .on_response(DefaultOnResponse::new().level(tracing::Level::TRACE)),
        )
        .with_state(state)
}
