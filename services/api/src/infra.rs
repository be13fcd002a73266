use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::debug;

use mechmatch::matching::{
    Coordinates, MechanicDirectory, MechanicId, MechanicProfile, RatingId, RatingLog,
    RatingRecord, RepositoryError, RequestBoard, RequestId, RequestStatus, ReputationSummary,
    ServiceRequestSummary, WeightPair, WeightRepository, WeightSnapshot,
};
use mechmatch::tracking::{
    BroadcastError, LocationBroadcast, LocationUpdate, TrackedPoint, TrackingRepository,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Single-row weight store with an optimistic version counter, standing in
/// for the durable `(reputation_weight, distance_weight, updated_at)` row.
#[derive(Default)]
pub(crate) struct InMemoryWeightStore {
    row: Mutex<Option<WeightSnapshot>>,
}

impl WeightRepository for InMemoryWeightStore {
    fn load_or_init(&self) -> Result<WeightSnapshot, RepositoryError> {
        let mut row = self.row.lock().expect("weight mutex poisoned");
        Ok(*row.get_or_insert_with(|| WeightSnapshot {
            weights: WeightPair::default(),
            version: 0,
            updated_at: Utc::now(),
        }))
    }

    fn compare_and_store(
        &self,
        expected_version: u64,
        next: WeightPair,
    ) -> Result<bool, RepositoryError> {
        let mut row = self.row.lock().expect("weight mutex poisoned");
        match row.as_mut() {
            Some(snapshot) if snapshot.version == expected_version => {
                snapshot.weights = next;
                snapshot.version += 1;
                snapshot.updated_at = Utc::now();
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(RepositoryError::NotFound),
        }
    }
}

#[derive(Default)]
pub(crate) struct InMemoryMechanicDirectory {
    mechanics: Mutex<HashMap<MechanicId, MechanicProfile>>,
}

impl InMemoryMechanicDirectory {
    pub(crate) fn insert(&self, profile: MechanicProfile) {
        self.mechanics
            .lock()
            .expect("directory mutex poisoned")
            .insert(profile.id.clone(), profile);
    }
}

impl MechanicDirectory for InMemoryMechanicDirectory {
    fn available(&self) -> Result<Vec<MechanicProfile>, RepositoryError> {
        Ok(self
            .mechanics
            .lock()
            .expect("directory mutex poisoned")
            .values()
            .filter(|mechanic| mechanic.accepting_jobs)
            .cloned()
            .collect())
    }

    fn fetch(&self, id: &MechanicId) -> Result<Option<MechanicProfile>, RepositoryError> {
        Ok(self
            .mechanics
            .lock()
            .expect("directory mutex poisoned")
            .get(id)
            .cloned())
    }

    fn store_reputation(
        &self,
        id: &MechanicId,
        reputation: ReputationSummary,
    ) -> Result<(), RepositoryError> {
        let mut mechanics = self.mechanics.lock().expect("directory mutex poisoned");
        match mechanics.get_mut(id) {
            Some(mechanic) => {
                mechanic.reputation = reputation;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }
}

#[derive(Default)]
pub(crate) struct InMemoryRequestBoard {
    requests: Mutex<HashMap<i64, ServiceRequestSummary>>,
}

impl InMemoryRequestBoard {
    pub(crate) fn insert(&self, request: ServiceRequestSummary) {
        self.requests
            .lock()
            .expect("board mutex poisoned")
            .insert(request.id.0, request);
    }
}

impl RequestBoard for InMemoryRequestBoard {
    fn open_requests(&self) -> Result<Vec<ServiceRequestSummary>, RepositoryError> {
        Ok(self
            .requests
            .lock()
            .expect("board mutex poisoned")
            .values()
            .filter(|request| request.status == RequestStatus::Pending)
            .cloned()
            .collect())
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
pub(crate) struct InMemoryRatingLog {
    ratings: Mutex<HashMap<i64, RatingRecord>>,
}

impl RatingLog for InMemoryRatingLog {
    fn insert(&self, record: RatingRecord) -> Result<RatingRecord, RepositoryError> {
        let mut ratings = self.ratings.lock().expect("rating mutex poisoned");
        if ratings.contains_key(&record.id.0) {
            return Err(RepositoryError::Conflict);
        }
        ratings.insert(record.id.0, record.clone());
        Ok(record)
    }

    fn update(&self, record: RatingRecord) -> Result<(), RepositoryError> {
        let mut ratings = self.ratings.lock().expect("rating mutex poisoned");
        if ratings.contains_key(&record.id.0) {
            ratings.insert(record.id.0, record);
            Ok(())
        } else {
            Err(RepositoryError::NotFound)
        }
    }

    fn remove(&self, id: RatingId) -> Result<(), RepositoryError> {
        self.ratings
            .lock()
            .expect("rating mutex poisoned")
            .remove(&id.0)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound)
    }

    fn fetch(&self, id: RatingId) -> Result<Option<RatingRecord>, RepositoryError> {
        Ok(self
            .ratings
            .lock()
            .expect("rating mutex poisoned")
            .get(&id.0)
            .cloned())
    }

    fn find_by_request(
        &self,
        request: RequestId,
    ) -> Result<Option<RatingRecord>, RepositoryError> {
        Ok(self
            .ratings
            .lock()
            .expect("rating mutex poisoned")
            .values()
            .find(|record| record.request_id == request)
            .cloned())
    }

    fn for_mechanic(
        &self,
        mechanic: &MechanicId,
    ) -> Result<Vec<RatingRecord>, RepositoryError> {
        Ok(self
            .ratings
            .lock()
            .expect("rating mutex poisoned")
            .values()
            .filter(|record| &record.mechanic_id == mechanic)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub(crate) struct InMemoryTrackingStore {
    points: Mutex<HashMap<i64, TrackedPoint>>,
}

impl TrackingRepository for InMemoryTrackingStore {
    fn last_point(&self, request: RequestId) -> Result<Option<TrackedPoint>, RepositoryError> {
        Ok(self
            .points
            .lock()
            .expect("tracking mutex poisoned")
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
            .expect("tracking mutex poisoned")
            .insert(request.0, point);
        Ok(())
    }
}

/// Broadcast adapter that records every update; the WebSocket registry this
/// stands in for lives in the gateway deployment.
#[derive(Default)]
pub(crate) struct InMemoryLocationBroadcast {
    updates: Mutex<Vec<LocationUpdate>>,
    closed: Mutex<Vec<RequestId>>,
}

impl InMemoryLocationBroadcast {
    pub(crate) fn updates(&self) -> Vec<LocationUpdate> {
        self.updates.lock().expect("broadcast mutex poisoned").clone()
    }

    pub(crate) fn closed_channels(&self) -> Vec<RequestId> {
        self.closed.lock().expect("broadcast mutex poisoned").clone()
    }
}

impl LocationBroadcast for InMemoryLocationBroadcast {
    fn publish(&self, update: &LocationUpdate) -> Result<(), BroadcastError> {
        debug!(
            request = update.request_id.0,
            lat = update.position.latitude,
            lng = update.position.longitude,
            arrived = update.arrived,
            "location update broadcast"
        );
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

fn mechanic(
    id: &str,
    workshop_name: &str,
    workshop: Coordinates,
    services: &[&str],
    average_stars: f64,
    review_count: u32,
) -> MechanicProfile {
    MechanicProfile {
        id: MechanicId(id.to_string()),
        workshop_name: workshop_name.to_string(),
        workshop: Some(workshop),
        services: services.iter().map(|s| s.to_string()).collect(),
        reputation: ReputationSummary {
            average_stars,
            review_count,
        },
        accepting_jobs: true,
    }
}

/// Cairo-area fixture set shared by the CLI demo.
pub(crate) fn seed_demo_fixtures(
    directory: &InMemoryMechanicDirectory,
    board: &InMemoryRequestBoard,
) {
    directory.insert(mechanic(
        "m-fast-fix",
        "Fast Fix Garage",
        Coordinates::new(30.0500, 31.2400),
        &["battery", "engine"],
        4.7,
        128,
    ));
    directory.insert(mechanic(
        "m-budget",
        "Budget Auto Care",
        Coordinates::new(30.1000, 31.3000),
        &["battery", "tires"],
        3.2,
        41,
    ));
    directory.insert(mechanic(
        "m-giza",
        "Giza Roadside Crew",
        Coordinates::new(29.9870, 31.2118),
        &["battery", "engine", "tires"],
        4.1,
        89,
    ));

    board.insert(ServiceRequestSummary {
        id: RequestId(1),
        requester: "Stranded Sara".to_string(),
        service: "battery".to_string(),
        location: Coordinates::new(30.0444, 31.2357),
        status: RequestStatus::Completed,
        mechanic_id: Some(MechanicId("m-fast-fix".to_string())),
        created_at: Utc::now(),
    });
    board.insert(ServiceRequestSummary {
        id: RequestId(2),
        requester: "Omar K.".to_string(),
        service: "engine".to_string(),
        location: Coordinates::new(30.0450, 31.2360),
        status: RequestStatus::Accepted,
        mechanic_id: Some(MechanicId("m-fast-fix".to_string())),
        created_at: Utc::now(),
    });
    board.insert(ServiceRequestSummary {
        id: RequestId(3),
        requester: "Laila M.".to_string(),
        service: "battery".to_string(),
        location: Coordinates::new(30.0600, 31.2500),
        status: RequestStatus::Pending,
        mechanic_id: None,
        created_at: Utc::now(),
    });
}
