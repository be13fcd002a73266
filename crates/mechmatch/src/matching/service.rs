use std::cmp::Ordering;
use std::sync::atomic::{AtomicI64, Ordering as AtomicOrdering};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use super::domain::{
    MechanicId, RankedMechanic, RankedRequest, RatingId, RatingRecord, RequestId, RequestStatus,
    ReputationSummary,
};
use super::geo::Coordinates;
use super::repository::{MechanicDirectory, RatingLog, RepositoryError, RequestBoard};
use super::scoring::{score_candidate, ScoringParams};
use super::weights::{RatingEvent, WeightAdapter, WeightRepository, WeightSnapshot};

/// Ranking facade: reads one weight snapshot and scores candidates with it.
///
/// Scoring is read-only against the weight row; a snapshot that is a few
/// updates stale is acceptable and never corrupts invariants.
pub struct MatchingService<D, B, W> {
    directory: Arc<D>,
    board: Arc<B>,
    weights: Arc<W>,
    params: ScoringParams,
}

impl<D, B, W> MatchingService<D, B, W>
where
    D: MechanicDirectory + 'static,
    B: RequestBoard + 'static,
    W: WeightRepository + 'static,
{
    pub fn new(directory: Arc<D>, board: Arc<B>, weights: Arc<W>, params: ScoringParams) -> Self {
        Self {
            directory,
            board,
            weights,
            params,
        }
    }

    /// Diagnostic read of the shared weight row.
    pub fn current_weights(&self) -> Result<WeightSnapshot, MatchingError> {
        Ok(self.weights.load_or_init()?)
    }

    /// Available mechanics offering `service`, scored against the driver's
    /// position and ordered by descending total score.
    pub fn rank_mechanics(
        &self,
        requester: Coordinates,
        service: &str,
    ) -> Result<Vec<RankedMechanic>, MatchingError> {
        let weights = self.weights.load_or_init()?.weights;

        let mut ranked = Vec::new();
        for mechanic in self.directory.available()? {
            let Some(workshop) = mechanic.workshop else {
                continue;
            };
            if !mechanic.services.iter().any(|offered| offered == service) {
                continue;
            }

            let score = score_candidate(
                requester,
                workshop,
                mechanic.reputation.average_stars,
                weights,
                self.params,
            );
            ranked.push(RankedMechanic {
                mechanic_id: mechanic.id,
                workshop_name: mechanic.workshop_name,
                workshop,
                reputation: mechanic.reputation,
                score,
            });
        }

        ranked.sort_by(|a, b| descending(a.score.total_score, b.score.total_score));
        debug!(candidates = ranked.len(), service, "ranked mechanics");
        Ok(ranked)
    }

    /// Pending requests the mechanic can serve, scored against the
    /// mechanic's workshop and own reputation, ordered by descending total.
    pub fn rank_requests(&self, mechanic_id: &MechanicId) -> Result<Vec<RankedRequest>, MatchingError> {
        let mechanic = self
            .directory
            .fetch(mechanic_id)?
            .ok_or(MatchingError::UnknownMechanic)?;
        let workshop = mechanic
            .workshop
            .ok_or(MatchingError::WorkshopLocationUnset)?;
        if !mechanic.accepting_jobs {
            return Err(MatchingError::NotAcceptingJobs);
        }

        let weights = self.weights.load_or_init()?.weights;

        let mut ranked = Vec::new();
        for request in self.board.open_requests()? {
            if request.status != RequestStatus::Pending {
                continue;
            }
            if !mechanic
                .services
                .iter()
                .any(|offered| *offered == request.service)
            {
                continue;
            }

            let score = score_candidate(
                request.location,
                workshop,
                mechanic.reputation.average_stars,
                weights,
                self.params,
            );
            ranked.push(RankedRequest {
                request_id: request.id,
                requester: request.requester,
                service: request.service,
                location: request.location,
                created_at: request.created_at,
                score,
            });
        }

        ranked.sort_by(|a, b| descending(a.score.total_score, b.score.total_score));
        debug!(candidates = ranked.len(), "ranked open requests");
        Ok(ranked)
    }
}

/// Stable descending order by total score; ties keep insertion order so
/// repeated calls over the same candidate set reproduce the same ranking.
fn descending(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

/// Errors surfaced by the ranking queries.
#[derive(Debug, thiserror::Error)]
pub enum MatchingError {
    #[error("mechanic not found")]
    UnknownMechanic,
    #[error("set the workshop location first")]
    WorkshopLocationUnset,
    #[error("mechanic is not accepting jobs")]
    NotAcceptingJobs,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

static RATING_SEQUENCE: AtomicI64 = AtomicI64::new(1);

fn next_rating_id() -> RatingId {
    RatingId(RATING_SEQUENCE.fetch_add(1, AtomicOrdering::Relaxed))
}

/// Rating lifecycle: every create, amend, and withdrawal nudges the shared
/// weight pair and refreshes the mechanic's aggregate reputation.
pub struct RatingService<B, D, L, W> {
    board: Arc<B>,
    directory: Arc<D>,
    log: Arc<L>,
    adapter: WeightAdapter<W>,
}

impl<B, D, L, W> RatingService<B, D, L, W>
where
    B: RequestBoard + 'static,
    D: MechanicDirectory + 'static,
    L: RatingLog + 'static,
    W: WeightRepository + 'static,
{
    pub fn new(board: Arc<B>, directory: Arc<D>, log: Arc<L>, adapter: WeightAdapter<W>) -> Self {
        Self {
            board,
            directory,
            log,
            adapter,
        }
    }

    /// Submit a rating for a finished request.
    ///
    /// The weight nudge is applied before the rating is persisted, mirroring
    /// the order ratings have always been processed in; the adapter must not
    /// miss an event even if the insert fails afterwards.
    pub fn submit(
        &self,
        request_id: RequestId,
        stars: u8,
        feedback: Option<String>,
    ) -> Result<RatingRecord, RatingError> {
        validate_stars(stars)?;

        let request = self
            .board
            .fetch(request_id)?
            .ok_or(RatingError::UnknownRequest)?;
        if !request.status.ratable() {
            return Err(RatingError::NotRatable {
                status: request.status,
            });
        }
        let mechanic_id = request
            .mechanic_id
            .ok_or(RatingError::UnassignedRequest)?;
        if self.log.find_by_request(request_id)?.is_some() {
            return Err(RatingError::AlreadyRated);
        }

        self.adapter.record(RatingEvent::Created { stars })?;

        let record = RatingRecord {
            id: next_rating_id(),
            request_id,
            mechanic_id: mechanic_id.clone(),
            stars,
            feedback,
            applied_reward: RatingEvent::reward_for(stars),
            created_at: Utc::now(),
        };
        let stored = self.log.insert(record)?;
        self.refresh_reputation(&mechanic_id)?;

        info!(request = request_id.0, stars, "rating submitted");
        Ok(stored)
    }

    /// Replace the stars and feedback of an existing rating. The weight
    /// delta is the reward change relative to what the rating applied last.
    pub fn amend(
        &self,
        rating_id: RatingId,
        stars: u8,
        feedback: Option<String>,
    ) -> Result<RatingRecord, RatingError> {
        validate_stars(stars)?;

        let mut record = self
            .log
            .fetch(rating_id)?
            .ok_or(RatingError::UnknownRating)?;

        self.adapter.record(RatingEvent::Amended {
            previous_reward: record.applied_reward,
            stars,
        })?;

        record.stars = stars;
        record.feedback = feedback;
        record.applied_reward = RatingEvent::reward_for(stars);
        record.created_at = Utc::now();
        self.log.update(record.clone())?;
        self.refresh_reputation(&record.mechanic_id)?;

        info!(rating = rating_id.0, stars, "rating amended");
        Ok(record)
    }

    /// Remove a rating, reversing exactly the reward it applied.
    pub fn withdraw(&self, rating_id: RatingId) -> Result<(), RatingError> {
        let record = self
            .log
            .fetch(rating_id)?
            .ok_or(RatingError::UnknownRating)?;

        self.adapter.record(RatingEvent::Withdrawn {
            previous_reward: record.applied_reward,
        })?;

        self.log.remove(rating_id)?;
        self.refresh_reputation(&record.mechanic_id)?;

        info!(rating = rating_id.0, "rating withdrawn");
        Ok(())
    }

    fn refresh_reputation(&self, mechanic: &MechanicId) -> Result<(), RatingError> {
        let ratings = self.log.for_mechanic(mechanic)?;
        let stars: Vec<u8> = ratings.iter().map(|rating| rating.stars).collect();
        self.directory
            .store_reputation(mechanic, ReputationSummary::from_stars(&stars))?;
        Ok(())
    }
}

fn validate_stars(stars: u8) -> Result<(), RatingError> {
    if (1..=5).contains(&stars) {
        Ok(())
    } else {
        Err(RatingError::StarsOutOfRange(stars))
    }
}

/// Errors surfaced by the rating lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum RatingError {
    #[error("stars must be between 1 and 5, got {0}")]
    StarsOutOfRange(u8),
    #[error("request not found")]
    UnknownRequest,
    #[error("request has no assigned mechanic")]
    UnassignedRequest,
    #[error("a request in status {} cannot be rated", .status.label())]
    NotRatable { status: RequestStatus },
    #[error("request already has a rating")]
    AlreadyRated,
    #[error("rating not found")]
    UnknownRating,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
