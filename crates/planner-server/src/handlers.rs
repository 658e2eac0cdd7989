//! HTTP Handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use planner_core::{BroadcastSummary, Locale, Report};

use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub database_connected: bool,
    pub next_broadcast: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, code: &str, error: impl ToString) -> ApiError {
    (
        status,
        Json(ErrorResponse { error: error.to_string(), code: code.into() }),
    )
}

// ============================================================================
// Router
// ============================================================================

pub fn routes(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/broadcast", post(trigger_broadcast))
        .route("/api/report/{locale}", get(preview_report))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let next = state.scheduler.schedule().next_after(chrono::Utc::now());

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        database_connected: state.store.ping().await,
        next_broadcast: next.to_rfc3339(),
    })
}

/// Run a broadcast now (external cron trigger)
pub async fn trigger_broadcast(
    State(state): State<AppState>,
) -> Result<Json<BroadcastSummary>, ApiError> {
    tracing::info!("broadcast triggered over HTTP");
    state
        .scheduler
        .broadcast()
        .await
        .map(Json)
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, "BROADCAST_FAILED", e))
}

/// Render the report a recipient with `locale` would receive
pub async fn preview_report(
    State(state): State<AppState>,
    Path(locale): Path<String>,
) -> Result<Json<Report>, ApiError> {
    let locale = Locale::from_code(&locale).ok_or_else(|| {
        api_error(StatusCode::BAD_REQUEST, "UNKNOWN_LOCALE", format!("unsupported locale {locale:?}"))
    })?;

    state
        .reports
        .build(locale)
        .await
        .map(Json)
        .map_err(|e| api_error(StatusCode::SERVICE_UNAVAILABLE, "PRIMARY_DATA_UNAVAILABLE", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use market_feeds::{FetchError, MockMarketData, MockNews, MockSentiment};
    use planner_core::{
        BroadcastScheduler, DailySchedule, RecipientId, RecipientStore, RecordingTransport,
        ReportAggregator, ReportConfig, StaticLocalizer,
    };
    use planner_runtime::SqliteStore;
    use serde_json::Value;
    use tower::ServiceExt;

    async fn state_with(market: MockMarketData) -> (AppState, Arc<RecordingTransport>) {
        let store = Arc::new(SqliteStore::in_memory(Locale::Es).await.unwrap());
        let transport = Arc::new(RecordingTransport::new());
        let reports = Arc::new(ReportAggregator::new(
            Arc::new(market),
            Arc::new(MockSentiment::new(20)),
            Arc::new(MockNews::new()),
            Arc::new(StaticLocalizer::new()),
            ReportConfig::default(),
        ));
        let scheduler = Arc::new(BroadcastScheduler::new(
            store.clone(),
            reports.clone(),
            transport.clone(),
            DailySchedule::parse("09:00", "Europe/Madrid").unwrap(),
        ));

        (AppState { reports, scheduler, store }, transport)
    }

    async fn call(state: AppState, method: &str, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri).body(Body::empty()).unwrap();
        let response = routes(state).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (state, _) = state_with(MockMarketData::new()).await;
        let (status, body) = call(state, "GET", "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["database_connected"], true);
    }

    #[tokio::test]
    async fn test_report_preview() {
        let (state, _) = state_with(MockMarketData::new()).await;

        let (status, body) = call(state.clone(), "GET", "/api/report/en").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["locale"], "en");
        assert_eq!(body["sections"][0]["kind"], "Header");

        let (status, body) = call(state, "GET", "/api/report/fr").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "UNKNOWN_LOCALE");
    }

    #[tokio::test]
    async fn test_report_preview_without_prices() {
        let (state, _) = state_with(MockMarketData::failing(FetchError::Http(503))).await;
        let (status, body) = call(state, "GET", "/api/report/es").await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["code"], "PRIMARY_DATA_UNAVAILABLE");
    }

    #[tokio::test]
    async fn test_broadcast_trigger() {
        let (state, transport) = state_with(MockMarketData::new()).await;
        state.store.upsert_locale(RecipientId::new(1), Locale::Es).await.unwrap();
        state.store.upsert_locale(RecipientId::new(2), Locale::En).await.unwrap();

        let (status, body) = call(state, "POST", "/api/broadcast").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["attempted"], 2);
        assert_eq!(body["delivered"], 2);
        assert_eq!(transport.sent().await.len(), 2);
    }
}
