use crate::cli::ServeArgs;
use crate::infra::{
    AppState, InMemoryLocationBroadcast, InMemoryMechanicDirectory, InMemoryRatingLog,
    InMemoryRequestBoard, InMemoryTrackingStore, InMemoryWeightStore,
};
use crate::routes::with_service_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

use mechmatch::config::AppConfig;
use mechmatch::error::AppError;
use mechmatch::matching::{MatchingService, RatingService, ScoringParams, WeightAdapter};
use mechmatch::telemetry;
use mechmatch::tracking::{TrackingPolicy, TrackingService};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let directory = Arc::new(InMemoryMechanicDirectory::default());
    let board = Arc::new(InMemoryRequestBoard::default());
    let rating_log = Arc::new(InMemoryRatingLog::default());
    let weight_store = Arc::new(InMemoryWeightStore::default());
    let tracking_store = Arc::new(InMemoryTrackingStore::default());
    let broadcast = Arc::new(InMemoryLocationBroadcast::default());

    let matching = Arc::new(MatchingService::new(
        directory.clone(),
        board.clone(),
        weight_store.clone(),
        ScoringParams {
            max_distance_km: config.matching.max_distance_km,
        },
    ));
    let ratings = Arc::new(RatingService::new(
        board.clone(),
        directory.clone(),
        rating_log,
        WeightAdapter::new(weight_store, config.matching.learning_rate),
    ));
    let tracking = Arc::new(TrackingService::new(
        board,
        tracking_store,
        broadcast,
        TrackingPolicy {
            arrival_radius_m: config.matching.arrival_radius_m,
            ..TrackingPolicy::default()
        },
    ));

    let app = with_service_routes(matching, ratings, tracking)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "roadside marketplace service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
