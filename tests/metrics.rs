// tests/metrics.rs
//
// Full application wiring (config file + /metrics exporter):
// - the shipped config/truetale.toml parses to the built-in defaults
// - app() builds, serves /health, and exposes Prometheus series after traffic
// - building the app twice in one process reuses the installed recorder

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::json;
use std::path::Path;
use tower::ServiceExt;

use truetale_analyzer::config::AppConfig;

async fn get_text(app: &Router, uri: &str) -> (StatusCode, String) {
    let resp = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8_lossy(&bytes).into_owned())
}

#[test]
fn shipped_config_matches_defaults() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/truetale.toml");
    let cfg = AppConfig::from_path(&path).expect("sample config parses");
    assert_eq!(cfg, AppConfig::default());
}

#[serial_test::serial]
#[tokio::test]
async fn metrics_endpoint_exposes_analysis_counters() {
    let app = truetale_analyzer::app_with_config(&AppConfig::default()).expect("app builds");

    let (status, body) = get_text(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");

    let payload = json!({
        "reviews": [{"id": "r1", "text": "nice", "date": "2020-01-01"}],
        "user_history": {"activity_frequency": 1, "reviewed_products": ["a", "b", "c"]},
        "source_id": "metrics-shop"
    });
    let req = Request::builder()
        .method("POST")
        .uri("/analyze_reviews")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let (status, text) = get_text(&app, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(text.contains("reviews_analyzed_total"), "{text}");
    assert!(text.contains("reviews_flagged_total"));
    assert!(text.contains("verdict_cache_misses_total"));
    assert!(text.contains("verdict_cache_sweep_interval_secs"));
}

#[serial_test::serial]
#[tokio::test]
async fn app_can_be_built_twice() {
    let a = truetale_analyzer::app_with_config(&AppConfig::default());
    let b = truetale_analyzer::app_with_config(&AppConfig::default());
    assert!(a.is_ok());
    assert!(b.is_ok());
}
