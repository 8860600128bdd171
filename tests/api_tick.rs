use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use paper_trader::api::{create_router, AppState};
use paper_trader::collector::{CandleSource, SourceRegistry};
use paper_trader::domain::Candle;
use paper_trader::ml::{ConstantPolicy, PolicyProvider};
use paper_trader::persistence::DecisionLedger;
use paper_trader::rl::{EngineConfig, FeatureConfig};
use paper_trader::services::{LiveTrader, TickDefaults};
use paper_trader::Result;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const LOOKBACK: usize = 10;

/// Serves a fixed candle series regardless of symbol/interval
struct StaticSource {
    candles: Vec<Candle>,
}

#[async_trait]
impl CandleSource for StaticSource {
    async fn fetch(&self, _symbol: &str, _interval: &str, limit: usize) -> Result<Vec<Candle>> {
        let start = self.candles.len().saturating_sub(limit);
        Ok(self.candles[start..].to_vec())
    }

    fn kind(&self) -> &'static str {
        "csv"
    }
}

fn rising(n: usize) -> Vec<Candle> {
    (0..n)
        .map(|i| {
            let close = 100.0 + i as f64;
            Candle::new(
                1_704_067_200_000 + i as i64 * 60_000,
                close - 0.5,
                close + 1.0,
                close - 1.0,
                close,
                50.0 + i as f64,
            )
        })
        .collect()
}

fn app(candles: usize, policy: PolicyProvider, ledger_dir: &std::path::Path) -> axum::Router {
    let trader = LiveTrader::new(
        EngineConfig::default(),
        FeatureConfig::with_lookback(LOOKBACK),
        Arc::new(policy),
        SourceRegistry::new().with(Arc::new(StaticSource {
            candles: rising(candles),
        })),
        Arc::new(DecisionLedger::local(ledger_dir)),
        TickDefaults {
            symbol: "BTCUSDT".to_string(),
            interval: "1m".to_string(),
            lookback: LOOKBACK,
            source: None,
        },
    );
    create_router(AppState::new(Arc::new(trader)))
}

fn tick_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/tick")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn get(app: &axum::Router, uri: &str) -> axum::response::Response {
    app.clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

#[tokio::test]
async fn tick_returns_decision_and_records_it() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(
        40,
        PolicyProvider::fixed(Arc::new(ConstantPolicy::new(0.75))),
        dir.path(),
    );

    let response = app
        .clone()
        .oneshot(tick_request(r#"{"symbol":"BTCUSDT","interval":"1m","lookback":10}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["price"], 139.0);
    assert_eq!(body["action"], 0.75);
    assert_eq!(body["position"], 0.75);
    assert_eq!(body["note"], "paper-trade");
    assert_eq!(body["ts"], 1_704_067_200 + 39 * 60);
    let equity = body["equity"].as_f64().unwrap();
    assert!((equity - (10_000.0 - 0.75 * 138.0 * 0.001)).abs() < 1e-9);

    // The ledger write is detached; wait for it to land.
    let mut records = Vec::new();
    for _ in 0..50 {
        let recent = json_body(get(&app, "/recent?limit=5").await).await;
        records = recent["records"].as_array().cloned().unwrap_or_default();
        if !records.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["position"], 0.75);
    assert_eq!(records[0]["trade_count"], 1);

    let status = json_body(get(&app, "/status").await).await;
    assert_eq!(status["position"], 0.75);
    assert_eq!(status["trade_count"], 1);
    assert_eq!(status["model_loaded"], true);
    assert_eq!(status["model_reference"], "inline:constant(0.75)");
}

#[tokio::test]
async fn tick_without_body_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(
        40,
        PolicyProvider::fixed(Arc::new(ConstantPolicy::new(-5.0))),
        dir.path(),
    );

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/tick")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["action"], -1.0);
}

#[tokio::test]
async fn short_history_is_a_client_error() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(
        5,
        PolicyProvider::fixed(Arc::new(ConstantPolicy::new(1.0))),
        dir.path(),
    );

    let response = app.clone().oneshot(tick_request("{}")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let status = json_body(get(&app, "/status").await).await;
    assert_eq!(status["position"], 0.0);
    assert_eq!(status["trade_count"], 0);
}

#[tokio::test]
async fn oversized_lookback_is_a_client_error() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(
        40,
        PolicyProvider::fixed(Arc::new(ConstantPolicy::new(1.0))),
        dir.path(),
    );

    let response = app
        .clone()
        .oneshot(tick_request(r#"{"lookback":18446744073709551615}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let status = json_body(get(&app, "/status").await).await;
    assert_eq!(status["trade_count"], 0);
}

#[tokio::test]
async fn path_like_interval_is_a_client_error() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(
        40,
        PolicyProvider::fixed(Arc::new(ConstantPolicy::new(1.0))),
        dir.path(),
    );

    let response = app
        .oneshot(tick_request(r#"{"interval":"../../etc/passwd"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_source_is_a_client_error() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(
        40,
        PolicyProvider::fixed(Arc::new(ConstantPolicy::new(1.0))),
        dir.path(),
    );

    let response = app
        .oneshot(tick_request(r#"{"source":"synthetic"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_model_is_service_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let models = tempfile::tempdir().unwrap();
    let app = app(
        40,
        PolicyProvider::from_dir(models.path(), LOOKBACK),
        dir.path(),
    );

    let response = app.clone().oneshot(tick_request("{}")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let reload = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/reload_model")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(reload.status(), StatusCode::SERVICE_UNAVAILABLE);

    let health = json_body(get(&app, "/health").await).await;
    assert_eq!(health["status"], "degraded");
    assert_eq!(health["model_loaded"], false);
}
