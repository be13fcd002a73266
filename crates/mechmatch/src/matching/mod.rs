//! Mechanic matching: geographic scoring, adaptive factor weighting, and the
//! rating feedback loop that tunes the weights over time.

pub mod bandit;
pub mod domain;
pub mod geo;
pub mod repository;
pub mod router;
pub mod scoring;
pub mod service;
pub mod weights;

pub use bandit::{ArmStats, BanditConfig, BanditStats, EpsilonGreedyBandit};
pub use domain::{
    MechanicId, MechanicProfile, RankedMechanic, RankedRequest, RatingId, RatingRecord, RequestId,
    RequestStatus, ReputationSummary, ServiceRequestSummary,
};
pub use geo::{great_circle_distance, Coordinates, DistanceUnit};
pub use repository::{MechanicDirectory, RatingLog, RepositoryError, RequestBoard};
pub use router::{matching_router, rating_router};
pub use scoring::{
    normalize_distance, normalize_reputation, score_candidate, ScoreBreakdown, ScoringParams,
};
pub use service::{MatchingError, MatchingService, RatingError, RatingService};
pub use weights::{RatingEvent, WeightAdapter, WeightPair, WeightRepository, WeightSnapshot};
