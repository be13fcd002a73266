use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use serde_json::json;
use std::sync::Arc;

use mechmatch::matching::{
    matching_router, rating_router, MatchingService, MechanicDirectory, RatingLog, RatingService,
    RequestBoard, WeightRepository,
};
use mechmatch::tracking::{
    tracking_router, LocationBroadcast, TrackingRepository, TrackingService,
};

/// Compose the domain routers with the operational endpoints.
pub(crate) fn with_service_routes<D, B, L, W, T, C>(
    matching: Arc<MatchingService<D, B, W>>,
    ratings: Arc<RatingService<B, D, L, W>>,
    tracking: Arc<TrackingService<B, T, C>>,
) -> axum::Router
where
    D: MechanicDirectory + 'static,
    B: RequestBoard + 'static,
    L: RatingLog + 'static,
    W: WeightRepository + 'static,
    T: TrackingRepository + 'static,
    C: LocationBroadcast + 'static,
{
    matching_router(matching)
        .merge(rating_router(ratings))
        .merge(tracking_router(tracking))
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
