use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{MechanicId, RatingId, RequestId};
use super::geo::Coordinates;
use super::repository::{MechanicDirectory, RatingLog, RequestBoard};
use super::service::{MatchingError, MatchingService, RatingError, RatingService};
use super::weights::WeightRepository;

/// Router exposing the ranking queries and the weight diagnostic.
pub fn matching_router<D, B, W>(service: Arc<MatchingService<D, B, W>>) -> Router
where
    D: MechanicDirectory + 'static,
    B: RequestBoard + 'static,
    W: WeightRepository + 'static,
{
    Router::new()
        .route(
            "/api/v1/matching/mechanics",
            get(rank_mechanics_handler::<D, B, W>),
        )
        .route(
            "/api/v1/matching/requests",
            get(rank_requests_handler::<D, B, W>),
        )
        .route("/api/v1/matching/weights", get(weights_handler::<D, B, W>))
        .with_state(service)
}

/// Router exposing the rating lifecycle.
pub fn rating_router<B, D, L, W>(service: Arc<RatingService<B, D, L, W>>) -> Router
where
    B: RequestBoard + 'static,
    D: MechanicDirectory + 'static,
    L: RatingLog + 'static,
    W: WeightRepository + 'static,
{
    Router::new()
        .route(
            "/api/v1/requests/:request_id/rating",
            post(submit_rating_handler::<B, D, L, W>),
        )
        .route(
            "/api/v1/ratings/:rating_id",
            patch(amend_rating_handler::<B, D, L, W>),
        )
        .route(
            "/api/v1/ratings/:rating_id",
            delete(withdraw_rating_handler::<B, D, L, W>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct RankMechanicsQuery {
    pub(crate) lat: f64,
    pub(crate) lng: f64,
    pub(crate) service: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RankRequestsQuery {
    pub(crate) mechanic_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RatingPayload {
    pub(crate) stars: u8,
    #[serde(default)]
    pub(crate) feedback: Option<String>,
}

pub(crate) async fn rank_mechanics_handler<D, B, W>(
    State(service): State<Arc<MatchingService<D, B, W>>>,
    Query(query): Query<RankMechanicsQuery>,
) -> Response
where
    D: MechanicDirectory + 'static,
    B: RequestBoard + 'static,
    W: WeightRepository + 'static,
{
    let requester = Coordinates::new(query.lat, query.lng);
    match service.rank_mechanics(requester, &query.service) {
        Ok(ranked) => (StatusCode::OK, axum::Json(json!({ "mechanics": ranked }))).into_response(),
        Err(error) => matching_error_response(error),
    }
}

pub(crate) async fn rank_requests_handler<D, B, W>(
    State(service): State<Arc<MatchingService<D, B, W>>>,
    Query(query): Query<RankRequestsQuery>,
) -> Response
where
    D: MechanicDirectory + 'static,
    B: RequestBoard + 'static,
    W: WeightRepository + 'static,
{
    let mechanic = MechanicId(query.mechanic_id);
    match service.rank_requests(&mechanic) {
        Ok(ranked) => (StatusCode::OK, axum::Json(json!({ "requests": ranked }))).into_response(),
        Err(error) => matching_error_response(error),
    }
}

pub(crate) async fn weights_handler<D, B, W>(
    State(service): State<Arc<MatchingService<D, B, W>>>,
) -> Response
where
    D: MechanicDirectory + 'static,
    B: RequestBoard + 'static,
    W: WeightRepository + 'static,
{
    match service.current_weights() {
        Ok(snapshot) => (StatusCode::OK, axum::Json(snapshot)).into_response(),
        Err(error) => matching_error_response(error),
    }
}

pub(crate) async fn submit_rating_handler<B, D, L, W>(
    State(service): State<Arc<RatingService<B, D, L, W>>>,
    Path(request_id): Path<i64>,
    axum::Json(payload): axum::Json<RatingPayload>,
) -> Response
where
    B: RequestBoard + 'static,
    D: MechanicDirectory + 'static,
    L: RatingLog + 'static,
    W: WeightRepository + 'static,
{
    match service.submit(RequestId(request_id), payload.stars, payload.feedback) {
        Ok(record) => (StatusCode::CREATED, axum::Json(record)).into_response(),
        Err(error) => rating_error_response(error),
    }
}

pub(crate) async fn amend_rating_handler<B, D, L, W>(
    State(service): State<Arc<RatingService<B, D, L, W>>>,
    Path(rating_id): Path<i64>,
    axum::Json(payload): axum::Json<RatingPayload>,
) -> Response
where
    B: RequestBoard + 'static,
    D: MechanicDirectory + 'static,
    L: RatingLog + 'static,
    W: WeightRepository + 'static,
{
    match service.amend(RatingId(rating_id), payload.stars, payload.feedback) {
        Ok(record) => (StatusCode::OK, axum::Json(record)).into_response(),
        Err(error) => rating_error_response(error),
    }
}

pub(crate) async fn withdraw_rating_handler<B, D, L, W>(
    State(service): State<Arc<RatingService<B, D, L, W>>>,
    Path(rating_id): Path<i64>,
) -> Response
where
    B: RequestBoard + 'static,
    D: MechanicDirectory + 'static,
    L: RatingLog + 'static,
    W: WeightRepository + 'static,
{
    match service.withdraw(RatingId(rating_id)) {
        Ok(()) => (
            StatusCode::OK,
            axum::Json(json!({ "message": "rating withdrawn" })),
        )
            .into_response(),
        Err(error) => rating_error_response(error),
    }
}

fn matching_error_response(error: MatchingError) -> Response {
    let status = match error {
        MatchingError::UnknownMechanic => StatusCode::NOT_FOUND,
        MatchingError::WorkshopLocationUnset | MatchingError::NotAcceptingJobs => {
            StatusCode::BAD_REQUEST
        }
        MatchingError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = axum::Json(json!({ "error": error.to_string() }));
    (status, body).into_response()
}

fn rating_error_response(error: RatingError) -> Response {
    let status = match error {
        RatingError::StarsOutOfRange(_) => StatusCode::UNPROCESSABLE_ENTITY,
        RatingError::UnknownRequest | RatingError::UnknownRating => StatusCode::NOT_FOUND,
        RatingError::AlreadyRated => StatusCode::CONFLICT,
        RatingError::NotRatable { .. } | RatingError::UnassignedRequest => StatusCode::BAD_REQUEST,
        RatingError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let body = axum::Json(json!({ "error": error.to_string() }));
    (status, body).into_response()
}
