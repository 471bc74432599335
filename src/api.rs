// src/api.rs
// Thin HTTP surface over the aggregation core. Input validation happens
// here, before any upstream work; partial upstream failure is still 200.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::aggregator::{AggregateResult, NewsAggregator};
use crate::error::{ApiError, ApiResult};
use crate::providers::{CountryOptions, SearchOptions};

const MAX_QUERY_CHARS: usize = 500;

#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<NewsAggregator>,
}

impl AppState {
    pub fn new(aggregator: NewsAggregator) -> Self {
        Self {
            aggregator: Arc::new(aggregator),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/health/news", get(health_news))
        .route("/api/news/search", get(search))
        .route("/api/news/country/{country}", get(by_country))
        .route("/api/news/sources", get(sources))
        .route("/api/cache/stats", get(cache_stats))
        .route("/api/cache/clear", post(cache_clear))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "UP" }))
}

async fn health_news(State(state): State<AppState>) -> impl IntoResponse {
    let services = state.aggregator.check_health().await;
    let all_up = !services.is_empty() && services.iter().all(|s| s.status == "up");
    let (code, status) = if all_up {
        (StatusCode::OK, "UP")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "DEGRADED")
    };
    (
        code,
        Json(json!({
            "status": status,
            "services": services,
            "timestamp": Utc::now(),
        })),
    )
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    q: Option<String>,
    language: Option<String>,
    timespan: Option<String>,
}

async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<AggregateResult>> {
    let q = params.q.as_deref().map(str::trim).unwrap_or_default();
    if q.is_empty() {
        return Err(ApiError::InvalidRequest(
            "query parameter 'q' is required".to_string(),
        ));
    }
    if q.chars().count() > MAX_QUERY_CHARS {
        return Err(ApiError::InvalidRequest(format!(
            "query parameter 'q' must be at most {MAX_QUERY_CHARS} characters"
        )));
    }

    let opts = SearchOptions::new(params.language, params.timespan);
    Ok(Json(state.aggregator.aggregate_by_query(q, &opts).await))
}

#[derive(Debug, Deserialize)]
struct CountryParams {
    timespan: Option<String>,
}

async fn by_country(
    State(state): State<AppState>,
    Path(country): Path<String>,
    Query(params): Query<CountryParams>,
) -> ApiResult<Json<AggregateResult>> {
    let code = country.trim();
    if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ApiError::InvalidRequest(format!(
            "invalid country code '{country}': expected exactly 2 letters"
        )));
    }
    let code = code.to_ascii_uppercase();

    let opts = CountryOptions::new(params.timespan);
    Ok(Json(state.aggregator.aggregate_by_country(&code, &opts).await))
}

async fn sources(State(state): State<AppState>) -> Json<crate::aggregator::SourceListing> {
    Json(state.aggregator.sources())
}

async fn cache_stats(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "size": state.aggregator.cache_len(),
        "timestamp": Utc::now(),
    }))
}

async fn cache_clear(State(state): State<AppState>) -> Json<serde_json::Value> {
    let flushed = state.aggregator.clear_cache();
    tracing::info!(flushed, "cache cleared");
    Json(json!({ "message": format!("cache cleared ({flushed} entries flushed)") }))
}
