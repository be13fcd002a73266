use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::geo::Coordinates;
use super::scoring::ScoreBreakdown;

/// Identifier wrapper for mechanics, owned by the accounts system.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MechanicId(pub String);

/// Identifier for roadside service requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub i64);

/// Identifier for submitted ratings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RatingId(pub i64);

/// Aggregate rating state carried on a mechanic profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReputationSummary {
    pub average_stars: f64,
    pub review_count: u32,
}

impl ReputationSummary {
    /// Recompute from the surviving star values. An empty set resets the
    /// average to 0.0, which the scorer maps below every rated mechanic.
    pub fn from_stars(stars: &[u8]) -> Self {
        if stars.is_empty() {
            return Self {
                average_stars: 0.0,
                review_count: 0,
            };
        }

        let total: u32 = stars.iter().map(|value| u32::from(*value)).sum();
        Self {
            average_stars: f64::from(total) / stars.len() as f64,
            review_count: stars.len() as u32,
        }
    }
}

/// Directory view of a mechanic used during matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MechanicProfile {
    pub id: MechanicId,
    pub workshop_name: String,
    /// Unset until the mechanic registers a workshop location; such
    /// mechanics never appear in rankings.
    pub workshop: Option<Coordinates>,
    /// Service kinds the mechanic covers (battery, tires, engine, ...).
    pub services: Vec<String>,
    pub reputation: ReputationSummary,
    pub accepting_jobs: bool,
}

/// Lifecycle states for a roadside service request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    Pending,
    Accepted,
    Arrived,
    Completed,
    CanceledByUser,
    CanceledByMechanic,
}

impl RequestStatus {
    pub const fn label(self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Accepted => "accepted",
            RequestStatus::Arrived => "arrived",
            RequestStatus::Completed => "completed",
            RequestStatus::CanceledByUser => "canceled_by_user",
            RequestStatus::CanceledByMechanic => "canceled_by_mechanic",
        }
    }

    /// A rating may only be left once the job finished, or after the
    /// mechanic backed out.
    pub const fn ratable(self) -> bool {
        matches!(
            self,
            RequestStatus::Completed | RequestStatus::CanceledByMechanic
        )
    }
}

/// Board view of a service request used during matching and tracking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRequestSummary {
    pub id: RequestId,
    pub requester: String,
    pub service: String,
    pub location: Coordinates,
    pub status: RequestStatus,
    pub mechanic_id: Option<MechanicId>,
    pub created_at: DateTime<Utc>,
}

/// A stored rating with the reward credited to the adapter when it applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingRecord {
    pub id: RatingId,
    pub request_id: RequestId,
    pub mechanic_id: MechanicId,
    pub stars: u8,
    pub feedback: Option<String>,
    /// `stars / 5` at apply time; later edits and deletions derive their
    /// weight delta from this instead of recomputing history.
    pub applied_reward: f64,
    pub created_at: DateTime<Utc>,
}

/// Ranked candidate returned to a stranded driver.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedMechanic {
    pub mechanic_id: MechanicId,
    pub workshop_name: String,
    pub workshop: Coordinates,
    pub reputation: ReputationSummary,
    pub score: ScoreBreakdown,
}

/// Ranked open request returned to an available mechanic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedRequest {
    pub request_id: RequestId,
    pub requester: String,
    pub service: String,
    pub location: Coordinates,
    pub created_at: DateTime<Utc>,
    pub score: ScoreBreakdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reputation_recomputes_from_surviving_stars() {
        let summary = ReputationSummary::from_stars(&[5, 4, 3]);
        assert_eq!(summary.review_count, 3);
        assert!((summary.average_stars - 4.0).abs() < 1e-12);
    }

    #[test]
    fn reputation_resets_when_all_ratings_are_gone() {
        let summary = ReputationSummary::from_stars(&[]);
        assert_eq!(summary.review_count, 0);
        assert_eq!(summary.average_stars, 0.0);
    }

    #[test]
    fn only_finished_or_abandoned_requests_are_ratable() {
        assert!(RequestStatus::Completed.ratable());
        assert!(RequestStatus::CanceledByMechanic.ratable());
        assert!(!RequestStatus::Pending.ratable());
        assert!(!RequestStatus::Accepted.ratable());
        assert!(!RequestStatus::CanceledByUser.ratable());
    }
}
