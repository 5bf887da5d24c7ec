//! HTTP surface. Handlers stay thin: admission control, extraction, then a
//! single call into [`ReviewService`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use shuttle_axum::axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::aggregator::VerdictAggregator;
use crate::cache::ResultCache;
use crate::classifier::build_classifier;
use crate::config::AppConfig;
use crate::error::{AnalyzeError, ErrorKind, RateLimited};
use crate::ingest::providers::{fixture::StaticSource, google_places::GooglePlacesSource};
use crate::ingest::types::ReviewSource;
use crate::ratelimit::{GlobalPacing, PerClientWindow};
use crate::review::{ReviewRecord, ReviewerHistory};
use crate::service::{Analyzed, ReviewService};
use crate::sweeper::{CacheSweeper, SweeperHandle};

pub const CACHE_HEADER: HeaderName = HeaderName::from_static("x-verdict-cache");
pub const CLIENT_ID_HEADER: &str = "x-client-id";
pub const ANONYMOUS_CLIENT: &str = "anonymous";

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ReviewService>,
    pub cache: Arc<ResultCache>,
    pub clients: Arc<PerClientWindow>,
    pub sweeper: Arc<SweeperHandle>,
}

impl AppState {
    /// Build every component from config and start the sweeper.
    /// Must be called inside a Tokio runtime.
    pub fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        let cache = Arc::new(ResultCache::new());

        let source: Arc<dyn ReviewSource> = match cfg.places_api_key() {
            Some(key) => Arc::new(GooglePlacesSource::new(key)?),
            None => {
                warn!(
                    target: "api",
                    "no places api key; /fetch_reviews serves an empty static source"
                );
                Arc::new(StaticSource::new())
            }
        };

        let aggregator = VerdictAggregator::new(cfg.detectors.clone());
        let pacing = Arc::new(GlobalPacing::per_minute(cfg.rate_limit.fetch_per_minute));
        let mut service = ReviewService::new(aggregator, cache.clone())
            .with_source(source, pacing)
            .with_fetch_history(cfg.fetch.default_history.clone());
        if let Some(classifier) = build_classifier(&cfg.classifier) {
            info!(target: "api", provider = classifier.name(), "classifier enabled");
            service = service.with_classifier(classifier, cfg.classifier.suspicious_threshold);
        }

        Ok(Self::assemble(cfg, service, cache))
    }

    /// Wire a prepared service with admission control and a running sweeper.
    pub fn assemble(cfg: &AppConfig, service: ReviewService, cache: Arc<ResultCache>) -> Self {
        let clients = Arc::new(PerClientWindow::new(
            cfg.rate_limit.client_limit,
            cfg.rate_limit.client_window(),
        ));
        let sweeper = CacheSweeper::new(cfg.cache.sweep_interval())
            .target(cache.clone())
            .target(clients.clone())
            .spawn();

        Self {
            service: Arc::new(service),
            cache,
            clients,
            sweeper: Arc::new(sweeper),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/analyze_reviews", post(analyze_reviews))
        .route("/fetch_reviews", get(fetch_reviews))
        .route("/predict", post(predict))
        .route("/debug/cache", get(debug_cache))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

// ------------------------------------------------------------
// Errors
// ------------------------------------------------------------

pub struct ApiError(AnalyzeError);

impl From<AnalyzeError> for ApiError {
    fn from(e: AnalyzeError) -> Self {
        Self(e)
    }
}

impl From<RateLimited> for ApiError {
    fn from(e: RateLimited) -> Self {
        Self(AnalyzeError::RateLimited(e))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rej: JsonRejection) -> Self {
        Self(AnalyzeError::BadRequest(rej.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.kind() {
            ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::ClassifierUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::UpstreamUnavailable => StatusCode::BAD_GATEWAY,
            ErrorKind::CacheUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::BadRequest | ErrorKind::InvalidField | ErrorKind::MalformedDate => {
                StatusCode::BAD_REQUEST
            }
        };

        let mut resp = (status, Json(self.0.body())).into_response();
        if let AnalyzeError::RateLimited(rl) = &self.0 {
            if let Ok(v) = HeaderValue::from_str(&rl.retry_after_secs().to_string()) {
                resp.headers_mut().insert(header::RETRY_AFTER, v);
            }
        }
        resp
    }
}

// ------------------------------------------------------------
// Admission
// ------------------------------------------------------------

fn client_id(headers: &HeaderMap) -> &str {
    headers
        .get(CLIENT_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(ANONYMOUS_CLIENT)
}

fn admit(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    state.clients.check(client_id(headers)).map_err(|rl| {
        metrics::counter!("rate_limited_total", "policy" => "per_client").increment(1);
        ApiError::from(rl)
    })
}

fn report_response(analyzed: Analyzed) -> Response {
    let mut resp = Json(analyzed.report.as_ref()).into_response();
    resp.headers_mut()
        .insert(CACHE_HEADER, HeaderValue::from_static(analyzed.cache.as_str()));
    resp
}

// ------------------------------------------------------------
// Handlers
// ------------------------------------------------------------

#[derive(Deserialize)]
struct AnalyzeReq {
    #[serde(default)]
    reviews: Vec<Value>,
    #[serde(default)]
    user_history: ReviewerHistory,
    #[serde(default)]
    source_id: Option<String>,
}

async fn analyze_reviews(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<AnalyzeReq>, JsonRejection>,
) -> Result<Response, ApiError> {
    admit(&state, &headers)?;
    let Json(req) = payload?;

    // non-object entries become empty records and fail individually
    let records: Vec<ReviewRecord> = req
        .reviews
        .into_iter()
        .map(|v| serde_json::from_value(v).unwrap_or_default())
        .collect();

    let analyzed = state
        .service
        .analyze(req.source_id.as_deref(), &records, &req.user_history)
        .await;
    Ok(report_response(analyzed))
}

#[derive(Deserialize)]
struct FetchParams {
    #[serde(default)]
    place_id: Option<String>,
}

async fn fetch_reviews(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<FetchParams>,
) -> Result<Response, ApiError> {
    admit(&state, &headers)?;
    let place_id = params.place_id.unwrap_or_default();
    let analyzed = state.service.fetch_and_analyze(&place_id).await?;
    Ok(report_response(analyzed))
}

#[derive(Deserialize)]
struct PredictReq {
    #[serde(default)]
    review_text: Option<String>,
}

#[derive(Serialize)]
struct PredictResp {
    prediction: bool,
    confidence: f32,
}

async fn predict(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<PredictReq>, JsonRejection>,
) -> Result<Json<PredictResp>, ApiError> {
    admit(&state, &headers)?;
    let Json(req) = payload?;
    let c = state
        .service
        .predict(req.review_text.as_deref().unwrap_or_default())
        .await?;
    Ok(Json(PredictResp {
        prediction: c.label,
        confidence: c.confidence,
    }))
}

#[derive(Serialize)]
struct CacheDebug {
    entries: usize,
    oldest_inserted_at: Option<chrono::DateTime<chrono::Utc>>,
    sweep_interval_secs: u64,
    sweeps_completed: u64,
    tracked_clients: usize,
}

async fn debug_cache(State(state): State<AppState>) -> Json<CacheDebug> {
    let stats = state.cache.stats();
    Json(CacheDebug {
        entries: stats.entries,
        oldest_inserted_at: stats.oldest_inserted_at,
        sweep_interval_secs: state.sweeper.period().as_secs(),
        sweeps_completed: state.sweeper.sweeps_completed(),
        tracked_clients: state.clients.tracked_clients(),
    })
}
