//! Live mechanic tracking: movement-gated persistence, arrival detection,
//! and fan-out of location updates to everyone watching a request.
//!
//! The connection registry that actually holds WebSocket subscribers lives
//! outside this crate; it is reached through [`LocationBroadcast`].

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::patch,
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::matching::domain::{RequestId, RequestStatus};
use crate::matching::geo::{great_circle_distance, Coordinates, DistanceUnit};
use crate::matching::repository::{RepositoryError, RequestBoard};

/// Movement and arrival thresholds for live location reports.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackingPolicy {
    /// Minimum movement before the stored point is refreshed.
    pub min_movement_m: f64,
    /// Refresh the stored point after this long even without movement.
    pub heartbeat_secs: i64,
    /// Radius around the requester that counts as arrival.
    pub arrival_radius_m: f64,
}

impl Default for TrackingPolicy {
    fn default() -> Self {
        Self {
            min_movement_m: 10.0,
            heartbeat_secs: 30,
            arrival_radius_m: 25.0,
        }
    }
}

/// Last accepted location for a tracked request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackedPoint {
    pub position: Coordinates,
    pub recorded_at: DateTime<Utc>,
}

/// Payload fanned out to subscribers of a request's tracking channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationUpdate {
    pub request_id: RequestId,
    pub position: Coordinates,
    pub arrived: bool,
    pub timestamp: DateTime<Utc>,
}

/// Storage for the per-request tracking row.
pub trait TrackingRepository: Send + Sync {
    fn last_point(&self, request: RequestId) -> Result<Option<TrackedPoint>, RepositoryError>;
    fn store_point(&self, request: RequestId, point: TrackedPoint)
        -> Result<(), RepositoryError>;
}

/// Fan-out seam over the connection registry, owned by the gateway layer.
pub trait LocationBroadcast: Send + Sync {
    fn publish(&self, update: &LocationUpdate) -> Result<(), BroadcastError>;
    /// Tear down the channel once tracking for the request is over.
    fn close(&self, request: RequestId);
}

#[derive(Debug, thiserror::Error)]
pub enum BroadcastError {
    #[error("broadcast transport unavailable: {0}")]
    Transport(String),
}

/// What a single location report did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrackingOutcome {
    /// Whether the stored point was refreshed (movement or heartbeat).
    pub persisted: bool,
    pub arrived: bool,
}

/// Errors surfaced by location reporting.
#[derive(Debug, thiserror::Error)]
pub enum TrackingError {
    #[error("request not found")]
    UnknownRequest,
    #[error("tracking is not active for a request in status {}", .status.label())]
    TrackingInactive { status: RequestStatus },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Broadcast(#[from] BroadcastError),
}

/// Processes live location reports from the assigned mechanic.
pub struct TrackingService<B, T, C> {
    board: Arc<B>,
    points: Arc<T>,
    broadcast: Arc<C>,
    policy: TrackingPolicy,
}

impl<B, T, C> TrackingService<B, T, C>
where
    B: RequestBoard + 'static,
    T: TrackingRepository + 'static,
    C: LocationBroadcast + 'static,
{
    pub fn new(board: Arc<B>, points: Arc<T>, broadcast: Arc<C>, policy: TrackingPolicy) -> Self {
        Self {
            board,
            points,
            broadcast,
            policy,
        }
    }

    /// Handle one location report.
    ///
    /// The stored point only refreshes when the mechanic moved at least
    /// `min_movement_m` or the heartbeat elapsed, keeping write volume
    /// bounded while the mechanic is stuck in traffic. Every report is
    /// broadcast regardless, and arrival within `arrival_radius_m` of the
    /// requester flips the request to arrived and closes the channel.
    pub fn report_location(
        &self,
        request_id: RequestId,
        position: Coordinates,
        now: DateTime<Utc>,
    ) -> Result<TrackingOutcome, TrackingError> {
        let request = self
            .board
            .fetch(request_id)?
            .ok_or(TrackingError::UnknownRequest)?;
        if request.status != RequestStatus::Accepted {
            return Err(TrackingError::TrackingInactive {
                status: request.status,
            });
        }

        let point = TrackedPoint {
            position,
            recorded_at: now,
        };
        let persisted = match self.points.last_point(request_id)? {
            None => {
                self.points.store_point(request_id, point)?;
                true
            }
            Some(last) => {
                let moved_m =
                    great_circle_distance(last.position, position, DistanceUnit::Meters);
                let quiet_secs = (now - last.recorded_at).num_seconds();
                if moved_m >= self.policy.min_movement_m
                    || quiet_secs >= self.policy.heartbeat_secs
                {
                    self.points.store_point(request_id, point)?;
                    true
                } else {
                    false
                }
            }
        };

        let remaining_m =
            great_circle_distance(request.location, position, DistanceUnit::Meters);
        let arrived = remaining_m <= self.policy.arrival_radius_m;
        if arrived {
            self.board.mark_arrived(request_id)?;
        }

        self.broadcast.publish(&LocationUpdate {
            request_id,
            position,
            arrived,
            timestamp: now,
        })?;
        if arrived {
            self.broadcast.close(request_id);
            info!(request = request_id.0, "mechanic arrived, tracking closed");
        }

        Ok(TrackingOutcome { persisted, arrived })
    }
}

/// Router exposing the mechanic-facing location report endpoint.
pub fn tracking_router<B, T, C>(service: Arc<TrackingService<B, T, C>>) -> Router
where
    B: RequestBoard + 'static,
    T: TrackingRepository + 'static,
    C: LocationBroadcast + 'static,
{
    Router::new()
        .route(
            "/api/v1/tracking/:request_id/location",
            patch(report_location_handler::<B, T, C>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct LocationReport {
    pub(crate) lat: f64,
    pub(crate) lng: f64,
}

pub(crate) async fn report_location_handler<B, T, C>(
    State(service): State<Arc<TrackingService<B, T, C>>>,
    Path(request_id): Path<i64>,
    axum::Json(report): axum::Json<LocationReport>,
) -> Response
where
    B: RequestBoard + 'static,
    T: TrackingRepository + 'static,
    C: LocationBroadcast + 'static,
{
    let position = Coordinates::new(report.lat, report.lng);
    match service.report_location(RequestId(request_id), position, Utc::now()) {
        Ok(outcome) => (StatusCode::OK, axum::Json(outcome)).into_response(),
        Err(error) => {
            let status = match error {
                TrackingError::UnknownRequest => StatusCode::NOT_FOUND,
                TrackingError::TrackingInactive { .. } => StatusCode::BAD_REQUEST,
                TrackingError::Repository(_) | TrackingError::Broadcast(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            };
            let body = axum::Json(json!({ "error": error.to_string() }));
            (status, body).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::domain::ServiceRequestSummary;
    use chrono::Duration;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeBoard {
        requests: Mutex<HashMap<i64, ServiceRequestSummary>>,
    }

    impl FakeBoard {
        fn with_accepted_request(location: Coordinates) -> Self {
            let request = ServiceRequestSummary {
                id: RequestId(1),
                requester: "Stranded Sara".to_string(),
                service: "battery".to_string(),
                location,
                status: RequestStatus::Accepted,
                mechanic_id: None,
                created_at: Utc::now(),
            };
            Self {
                requests: Mutex::new(HashMap::from([(1, request)])),
            }
        }

        fn status(&self, id: i64) -> RequestStatus {
            self.requests.lock().expect("board mutex poisoned")[&id].status
        }
    }

    impl RequestBoard for FakeBoard {
        fn open_requests(&self) -> Result<Vec<ServiceRequestSummary>, RepositoryError> {
            Ok(Vec::new())
        }

        fn fetch(&self, id: RequestId) -> Result<Option<ServiceRequestSummary>, RepositoryError> {
            Ok(self
                .requests
                .lock()
                .expect("board mutex poisoned")
                .get(&id.0)
                .cloned())
        }

        fn mark_arrived(&self, id: RequestId) -> Result<(), RepositoryError> {
            let mut requests = self.requests.lock().expect("board mutex poisoned");
            match requests.get_mut(&id.0) {
                Some(request) => {
                    request.status = RequestStatus::Arrived;
                    Ok(())
                }
                None => Err(RepositoryError::NotFound),
            }
        }
    }

    #[derive(Default)]
    struct FakePoints {
        points: Mutex<HashMap<i64, TrackedPoint>>,
    }

    impl TrackingRepository for FakePoints {
        fn last_point(&self, request: RequestId) -> Result<Option<TrackedPoint>, RepositoryError> {
            Ok(self
                .points
                .lock()
                .expect("points mutex poisoned")
                .get(&request.0)
                .copied())
        }

        fn store_point(
            &self,
            request: RequestId,
            point: TrackedPoint,
        ) -> Result<(), RepositoryError> {
            self.points
                .lock()
                .expect("points mutex poisoned")
                .insert(request.0, point);
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeBroadcast {
        updates: Mutex<Vec<LocationUpdate>>,
        closed: Mutex<Vec<RequestId>>,
    }

    impl LocationBroadcast for FakeBroadcast {
        fn publish(&self, update: &LocationUpdate) -> Result<(), BroadcastError> {
            self.updates
                .lock()
                .expect("broadcast mutex poisoned")
                .push(update.clone());
            Ok(())
        }

        fn close(&self, request: RequestId) {
            self.closed
                .lock()
                .expect("broadcast mutex poisoned")
                .push(request);
        }
    }

    const DESTINATION: Coordinates = Coordinates::new(30.0444, 31.2357);
    // Roughly 1.2 km north of the destination.
    const FAR_AWAY: Coordinates = Coordinates::new(30.0552, 31.2357);
    // A couple of meters from FAR_AWAY.
    const BARELY_MOVED: Coordinates = Coordinates::new(30.05522, 31.2357);

    fn service() -> (
        TrackingService<FakeBoard, FakePoints, FakeBroadcast>,
        Arc<FakeBoard>,
        Arc<FakeBroadcast>,
    ) {
        let board = Arc::new(FakeBoard::with_accepted_request(DESTINATION));
        let broadcast = Arc::new(FakeBroadcast::default());
        let tracking = TrackingService::new(
            board.clone(),
            Arc::new(FakePoints::default()),
            broadcast.clone(),
            TrackingPolicy::default(),
        );
        (tracking, board, broadcast)
    }

    #[test]
    fn first_report_is_always_persisted() {
        let (tracking, _, broadcast) = service();
        let outcome = tracking
            .report_location(RequestId(1), FAR_AWAY, Utc::now())
            .expect("report processes");
        assert!(outcome.persisted);
        assert!(!outcome.arrived);
        assert_eq!(broadcast.updates.lock().expect("lock").len(), 1);
    }

    #[test]
    fn small_move_within_heartbeat_is_broadcast_but_not_persisted() {
        let (tracking, _, broadcast) = service();
        let start = Utc::now();
        tracking
            .report_location(RequestId(1), FAR_AWAY, start)
            .expect("first report");

        let outcome = tracking
            .report_location(RequestId(1), BARELY_MOVED, start + Duration::seconds(5))
            .expect("second report");

        assert!(!outcome.persisted);
        assert_eq!(broadcast.updates.lock().expect("lock").len(), 2);
    }

    #[test]
    fn heartbeat_refreshes_the_point_without_movement() {
        let (tracking, _, _) = service();
        let start = Utc::now();
        tracking
            .report_location(RequestId(1), FAR_AWAY, start)
            .expect("first report");

        let outcome = tracking
            .report_location(RequestId(1), FAR_AWAY, start + Duration::seconds(31))
            .expect("heartbeat report");

        assert!(outcome.persisted);
    }

    #[test]
    fn arrival_flips_the_request_and_closes_the_channel() {
        let (tracking, board, broadcast) = service();
        let outcome = tracking
            .report_location(RequestId(1), DESTINATION, Utc::now())
            .expect("arrival report");

        assert!(outcome.arrived);
        assert_eq!(board.status(1), RequestStatus::Arrived);
        assert_eq!(
            broadcast.closed.lock().expect("lock").clone(),
            vec![RequestId(1)]
        );
        let updates = broadcast.updates.lock().expect("lock");
        assert!(updates.last().expect("update published").arrived);
    }

    #[test]
    fn reports_for_non_accepted_requests_are_rejected() {
        let (tracking, board, _) = service();
        board
            .mark_arrived(RequestId(1))
            .expect("request exists");

        let err = tracking
            .report_location(RequestId(1), FAR_AWAY, Utc::now())
            .expect_err("tracking must be inactive");
        assert!(matches!(err, TrackingError::TrackingInactive { .. }));
    }

    #[test]
    fn unknown_request_is_rejected() {
        let (tracking, _, _) = service();
        let err = tracking
            .report_location(RequestId(99), FAR_AWAY, Utc::now())
            .expect_err("request does not exist");
        assert!(matches!(err, TrackingError::UnknownRequest));
    }
}
