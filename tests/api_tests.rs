use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
    response::Response,
};
use http_body_util::BodyExt;

use matching_engine::{
    api::{OrderAck, router},
    state::AppState,
};
use serde_json::{Value, json};
use tower::ServiceExt;

fn test_app() -> Router {
    router(AppState::new())
}

async fn body_json(res: Response) -> Value {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn json<T: serde::de::DeserializeOwned>(res: Response) -> T {
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_order(body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/orders")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn create_order_rejects_zero_qty() {
    let app = test_app();

    let body = json!({
        "symbol": "BTC-USDT",
        "order_type": "limit",
        "side": "buy",
        "price": "50000",
        "quantity": "0"
    });

    let res = app.oneshot(post_order(&body)).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let v = body_json(res).await;
    assert_eq!(v["error"], "quantity must be > 0");
}

#[tokio::test]
async fn create_order_rejects_priceless_limit_ioc_fok() {
    for order_type in ["limit", "ioc", "fok"] {
        let app = test_app();
        let body = json!({
            "symbol": "BTC-USDT",
            "order_type": order_type,
            "side": "buy",
            "quantity": "1"
        });
        let res = app.oneshot(post_order(&body)).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{order_type}");
        let v = body_json(res).await;
        assert!(
            v["error"].as_str().unwrap().contains("require a price"),
            "{order_type}: {v}"
        );
    }
}

#[tokio::test]
async fn create_order_unknown_side_yields_422_from_loggedjson() {
    let app = test_app();
    let body = json!({
        "symbol": "BTC-USDT",
        "order_type": "limit",
        "side": "hold",
        "price": "50000",
        "quantity": "1"
    });
    let res = app.oneshot(post_order(&body)).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn create_order_malformed_decimal_yields_422() {
    let app = test_app();
    let body = json!({
        "symbol": "BTC-USDT",
        "order_type": "limit",
        "side": "buy",
        "price": "not-a-number",
        "quantity": "1"
    });
    let res = app.oneshot(post_order(&body)).await.unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn book_returns_404_for_unknown_symbol() {
    let app = test_app();
    let res = app.oneshot(get("/book/BTC-USDT")).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let v = body_json(res).await;
    assert!(v["error"].as_str().unwrap().contains("unknown symbol"));
}

#[tokio::test]
async fn market_order_with_price_is_accepted() {
    let app = test_app();
    let body = json!({
        "symbol": "BTC-USDT",
        "order_type": "market",
        "side": "buy",
        "price": "50000",
        "quantity": "1"
    });
    let res = app.oneshot(post_order(&body)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let ack: OrderAck = json(res).await;
    assert!(ack.trades.is_empty());
}

#[tokio::test]
async fn orders_cross_and_book_serializes_decimal_strings() {
    let app = test_app();

    let rest = json!({
        "symbol": "BTC-USDT",
        "order_type": "limit",
        "side": "sell",
        "price": "50000",
        "quantity": "1.0"
    });
    let res = app.clone().oneshot(post_order(&rest)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let ack: OrderAck = json(res).await;
    assert!(ack.trades.is_empty());
    let maker_id = ack.order_id;

    let take = json!({
        "symbol": "BTC-USDT",
        "order_type": "market",
        "side": "buy",
        "quantity": "0.4",
        "user_id": "alice"
    });
    let res = app.clone().oneshot(post_order(&take)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let v = body_json(res).await;
    let trade = &v["trades"][0];
    assert_eq!(trade["price"], "50000");
    assert_eq!(trade["quantity"], "0.4");
    assert_eq!(trade["aggressor_side"], "buy");
    assert_eq!(trade["maker_order_id"], maker_id.as_str());
    assert!(!trade["trade_id"].as_str().unwrap().is_empty());
    assert!(trade["timestamp"].as_str().unwrap().ends_with('Z'));

    let res = app.clone().oneshot(get("/book/BTC-USDT")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let snap = body_json(res).await;
    assert_eq!(snap["symbol"], "BTC-USDT");
    assert_eq!(snap["best_bid"], Value::Null);
    assert_eq!(snap["best_ask"], "50000");
    assert_eq!(snap["asks"][0][0], "50000");
    assert_eq!(snap["asks"][0][1], "0.6");
    assert!(snap["bids"].as_array().unwrap().is_empty());
    assert!(snap["timestamp"].as_str().unwrap().ends_with('Z'));
}

#[tokio::test]
async fn book_depth_query_caps_levels() {
    let app = test_app();
    for price in ["50100", "50200", "50300"] {
        let body = json!({
            "symbol": "BTC-USDT",
            "order_type": "limit",
            "side": "sell",
            "price": price,
            "quantity": "1"
        });
        let res = app.clone().oneshot(post_order(&body)).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    let res = app.oneshot(get("/book/BTC-USDT?depth=2")).await.unwrap();
    let snap = body_json(res).await;
    let asks = snap["asks"].as_array().unwrap();
    assert_eq!(asks.len(), 2);
    assert_eq!(asks[0][0], "50100");
    assert_eq!(asks[1][0], "50200");
}

#[tokio::test]
async fn trades_endpoint_returns_recent_fills() {
    let app = test_app();

    let seed = json!({
        "symbol": "BTC-USDT",
        "order_type": "limit",
        "side": "sell",
        "price": "52",
        "quantity": "3"
    });
    app.clone().oneshot(post_order(&seed)).await.unwrap();

    for _ in 0..2 {
        let buy = json!({
            "symbol": "BTC-USDT",
            "order_type": "market",
            "side": "buy",
            "quantity": "1"
        });
        app.clone().oneshot(post_order(&buy)).await.unwrap();
    }

    let res = app.clone().oneshot(get("/trades/BTC-USDT")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let v = body_json(res).await;
    let items = v.as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["quantity"], "1");

    let res = app
        .clone()
        .oneshot(get("/trades/BTC-USDT?limit=1"))
        .await
        .unwrap();
    let v = body_json(res).await;
    assert_eq!(v.as_array().unwrap().len(), 1);

    // unknown symbols are an empty page, not an error
    let res = app.oneshot(get("/trades/ETH-USDT")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let v = body_json(res).await;
    assert!(v.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn stats_counts_processed_orders() {
    let app = test_app();

    let body = json!({
        "symbol": "BTC-USDT",
        "order_type": "limit",
        "side": "buy",
        "price": "50000",
        "quantity": "1"
    });
    app.clone().oneshot(post_order(&body)).await.unwrap();

    let res = app.oneshot(get("/stats")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let v = body_json(res).await;
    assert_eq!(v["processed_orders"], 1);
    assert_eq!(v["active_symbols"], 1);
    assert!(v["orders_per_second"].as_f64().unwrap() >= 0.0);
}
