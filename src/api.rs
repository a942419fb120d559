use axum::{
    extract::{Query, State},
    http::{
        header::{
            ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN,
        },
        HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::{set_header::SetResponseHeaderLayer, trace::TraceLayer};

use crate::pipeline::ExtractionPipeline;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<ExtractionPipeline>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub async fn scrape_product(
    State(state): State<Arc<AppState>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    // A repeated `url` takes its first value.
    let url = params
        .iter()
        .find(|(key, _)| key == "url")
        .map(|(_, value)| value.trim());
    let url = match url {
        Some(url) if !url.is_empty() => url.to_string(),
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: "Missing URL parameter".to_string(),
                }),
            )
                .into_response();
        }
    };

    // Pipeline failures are reported in the body, still with 200.
    let record = state.pipeline.scrape(&url).await;
    Json(record).into_response()
}

pub async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

pub async fn health() -> &'static str {
    "ok"
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/scraper",
            get(scrape_product).post(scrape_product).options(preflight),
        )
        .route("/health", get(health))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, POST, OPTIONS"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
