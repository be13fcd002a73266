use super::domain::{
    MechanicId, MechanicProfile, RatingId, RatingRecord, RequestId, ReputationSummary,
    ServiceRequestSummary,
};

/// Error enumeration shared by the storage seams.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("optimistic update lost {0} consecutive races")]
    Contention(usize),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Mechanic profile access, owned by the accounts system.
pub trait MechanicDirectory: Send + Sync {
    /// Mechanics currently accepting jobs.
    fn available(&self) -> Result<Vec<MechanicProfile>, RepositoryError>;
    fn fetch(&self, id: &MechanicId) -> Result<Option<MechanicProfile>, RepositoryError>;
    /// Replace the aggregate reputation after a rating lifecycle event.
    fn store_reputation(
        &self,
        id: &MechanicId,
        reputation: ReputationSummary,
    ) -> Result<(), RepositoryError>;
}

/// Service-request board access, owned by the request system.
pub trait RequestBoard: Send + Sync {
    /// Requests still waiting for a mechanic.
    fn open_requests(&self) -> Result<Vec<ServiceRequestSummary>, RepositoryError>;
    fn fetch(&self, id: RequestId) -> Result<Option<ServiceRequestSummary>, RepositoryError>;
    /// Flip an accepted request to arrived once the mechanic is on site.
    fn mark_arrived(&self, id: RequestId) -> Result<(), RepositoryError>;
}

/// Persistence for ratings and their applied rewards.
pub trait RatingLog: Send + Sync {
    fn insert(&self, record: RatingRecord) -> Result<RatingRecord, RepositoryError>;
    fn update(&self, record: RatingRecord) -> Result<(), RepositoryError>;
    fn remove(&self, id: RatingId) -> Result<(), RepositoryError>;
    fn fetch(&self, id: RatingId) -> Result<Option<RatingRecord>, RepositoryError>;
    fn find_by_request(
        &self,
        request: RequestId,
    ) -> Result<Option<RatingRecord>, RepositoryError>;
    fn for_mechanic(&self, mechanic: &MechanicId)
        -> Result<Vec<RatingRecord>, RepositoryError>;
}
