use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::repository::RepositoryError;

/// Floor applied to the renormalization divisor so a degenerate pair can
/// never divide by zero.
const MIN_NORMALIZER: f64 = 1e-9;

/// Bounded optimistic-retry budget for one adapter update.
const MAX_CAS_ATTEMPTS: usize = 64;

/// Convex-combination weighting over the two scoring factors.
///
/// The pair sums to 1.0 after every update. Individual components are
/// intentionally not clamped: a long one-sided run of feedback can push a
/// weight outside [0, 1], inverting that factor's contribution. Changing
/// that is a product decision, not a bug fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightPair {
    pub reputation: f64,
    pub distance: f64,
}

impl WeightPair {
    pub const fn new(reputation: f64, distance: f64) -> Self {
        Self {
            reputation,
            distance,
        }
    }

    pub fn sum(&self) -> f64 {
        self.reputation + self.distance
    }

    /// Shift emphasis by `learning_rate * delta` toward reputation (positive
    /// delta) or proximity (negative delta), then renormalize to sum 1.0.
    #[must_use]
    pub fn nudged(self, delta: f64, learning_rate: f64) -> WeightPair {
        let reputation = self.reputation + learning_rate * delta;
        let distance = self.distance - learning_rate * delta;

        let mut total = reputation + distance;
        if total.abs() < MIN_NORMALIZER {
            total = MIN_NORMALIZER;
        }

        WeightPair {
            reputation: reputation / total,
            distance: distance / total,
        }
    }
}

impl Default for WeightPair {
    /// Launch split: reputation 0.6, proximity 0.4.
    fn default() -> Self {
        Self::new(0.6, 0.4)
    }
}

/// Durable weight row plus the version counter used for optimistic updates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightSnapshot {
    pub weights: WeightPair,
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

/// Rating lifecycle events that feed the adapter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RatingEvent {
    Created { stars: u8 },
    Amended { previous_reward: f64, stars: u8 },
    Withdrawn { previous_reward: f64 },
}

impl RatingEvent {
    /// Reward attributed to a 1-5 star rating, on [0.2, 1.0].
    pub fn reward_for(stars: u8) -> f64 {
        f64::from(stars) / 5.0
    }

    /// Signed reward change this event contributes to the weight pair.
    pub fn reward_delta(&self) -> f64 {
        match *self {
            RatingEvent::Created { stars } => Self::reward_for(stars),
            RatingEvent::Amended {
                previous_reward,
                stars,
            } => Self::reward_for(stars) - previous_reward,
            RatingEvent::Withdrawn { previous_reward } => -previous_reward,
        }
    }

    /// Reward recorded on the rating once the event applies, if it survives.
    pub fn applied_reward(&self) -> Option<f64> {
        match *self {
            RatingEvent::Created { stars } | RatingEvent::Amended { stars, .. } => {
                Some(Self::reward_for(stars))
            }
            RatingEvent::Withdrawn { .. } => None,
        }
    }
}

/// Storage seam for the single shared weight row.
///
/// `compare_and_store` must apply only while the stored version still equals
/// `expected_version`; that check is what keeps concurrent adapter calls
/// from losing updates, even across server processes sharing the store.
pub trait WeightRepository: Send + Sync {
    /// Current snapshot, creating the default row when none exists yet.
    /// Must be idempotent under concurrent first access.
    fn load_or_init(&self) -> Result<WeightSnapshot, RepositoryError>;

    /// Optimistically replace the row; `Ok(false)` signals a version race.
    fn compare_and_store(
        &self,
        expected_version: u64,
        next: WeightPair,
    ) -> Result<bool, RepositoryError>;
}

/// Online single-pair adapter: every rating event nudges the shared pair.
///
/// The pair acts as a slowly adapting indicator of whether reputation or
/// proximity better predicts driver satisfaction.
pub struct WeightAdapter<W> {
    repository: Arc<W>,
    learning_rate: f64,
}

impl<W: WeightRepository> WeightAdapter<W> {
    pub fn new(repository: Arc<W>, learning_rate: f64) -> Self {
        Self {
            repository,
            learning_rate,
        }
    }

    pub fn current(&self) -> Result<WeightSnapshot, RepositoryError> {
        self.repository.load_or_init()
    }

    /// Apply one rating event through a compare-and-swap retry loop.
    pub fn record(&self, event: RatingEvent) -> Result<WeightPair, RepositoryError> {
        let delta = event.reward_delta();

        for _ in 0..MAX_CAS_ATTEMPTS {
            let snapshot = self.repository.load_or_init()?;
            let next = snapshot.weights.nudged(delta, self.learning_rate);
            if self
                .repository
                .compare_and_store(snapshot.version, next)?
            {
                debug!(
                    delta,
                    reputation = next.reputation,
                    distance = next.distance,
                    "weight pair nudged"
                );
                return Ok(next);
            }
        }

        Err(RepositoryError::Contention(MAX_CAS_ATTEMPTS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryWeightStore {
        row: Mutex<Option<WeightSnapshot>>,
    }

    impl WeightRepository for MemoryWeightStore {
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

    fn adapter() -> WeightAdapter<MemoryWeightStore> {
        WeightAdapter::new(Arc::new(MemoryWeightStore::default()), 0.05)
    }

    #[test]
    fn reward_deltas_follow_the_lifecycle_table() {
        assert_eq!(RatingEvent::Created { stars: 5 }.reward_delta(), 1.0);
        assert_eq!(RatingEvent::Created { stars: 1 }.reward_delta(), 0.2);
        assert!(
            (RatingEvent::Amended {
                previous_reward: 0.6,
                stars: 5
            }
            .reward_delta()
                - 0.4)
                .abs()
                < 1e-12
        );
        assert_eq!(
            RatingEvent::Withdrawn {
                previous_reward: 0.8
            }
            .reward_delta(),
            -0.8
        );
    }

    #[test]
    fn applied_reward_survives_creates_and_amends_only() {
        assert_eq!(
            RatingEvent::Created { stars: 3 }.applied_reward(),
            Some(0.6)
        );
        assert_eq!(
            RatingEvent::Amended {
                previous_reward: 0.6,
                stars: 4
            }
            .applied_reward(),
            Some(0.8)
        );
        assert_eq!(
            RatingEvent::Withdrawn {
                previous_reward: 0.6
            }
            .applied_reward(),
            None
        );
    }

    #[test]
    fn first_access_initializes_the_default_split() {
        let adapter = adapter();
        let snapshot = adapter.current().expect("snapshot loads");
        assert_eq!(snapshot.weights, WeightPair::new(0.6, 0.4));
        assert_eq!(snapshot.version, 0);
    }

    #[test]
    fn pair_sums_to_one_after_every_update() {
        let adapter = adapter();
        let deltas: [f64; 8] = [1.0, -0.8, 0.4, -0.2, 0.6, -1.0, 0.2, 0.9];
        for (index, delta) in deltas.iter().enumerate() {
            let event = if *delta >= 0.0 {
                RatingEvent::Amended {
                    previous_reward: 0.0,
                    stars: (delta * 5.0).round() as u8,
                }
            } else {
                RatingEvent::Withdrawn {
                    previous_reward: -delta,
                }
            };
            let weights = adapter.record(event).expect("update applies");
            assert!(
                (weights.sum() - 1.0).abs() < 1e-9,
                "sum drifted after update {index}"
            );
        }
    }

    #[test]
    fn five_star_edit_example() {
        // A 3-star rating edited to 5 stars: delta 0.4 at learning rate 0.05.
        let adapter = adapter();
        let weights = adapter
            .record(RatingEvent::Amended {
                previous_reward: 0.6,
                stars: 5,
            })
            .expect("update applies");
        assert!((weights.reputation - 0.62).abs() < 1e-9);
        assert!((weights.distance - 0.38).abs() < 1e-9);
    }

    #[test]
    fn withdraw_reverses_create() {
        let adapter = adapter();
        let before = adapter.current().expect("snapshot loads").weights;

        adapter
            .record(RatingEvent::Created { stars: 4 })
            .expect("create applies");
        let after = adapter
            .record(RatingEvent::Withdrawn {
                previous_reward: RatingEvent::reward_for(4),
            })
            .expect("withdraw applies");

        assert!((after.reputation - before.reputation).abs() < 1e-9);
        assert!((after.distance - before.distance).abs() < 1e-9);
    }

    #[test]
    fn renormalization_survives_a_degenerate_pair() {
        let collapsed = WeightPair::new(0.0, 0.0);
        let nudged = collapsed.nudged(0.0, 0.05);
        assert!(nudged.reputation.is_finite());
        assert!(nudged.distance.is_finite());
    }

    #[test]
    fn version_race_surfaces_as_contention() {
        struct AlwaysRacingStore;

        impl WeightRepository for AlwaysRacingStore {
            fn load_or_init(&self) -> Result<WeightSnapshot, RepositoryError> {
                Ok(WeightSnapshot {
                    weights: WeightPair::default(),
                    version: 0,
                    updated_at: Utc::now(),
                })
            }

            fn compare_and_store(
                &self,
                _expected_version: u64,
                _next: WeightPair,
            ) -> Result<bool, RepositoryError> {
                Ok(false)
            }
        }

        let adapter = WeightAdapter::new(Arc::new(AlwaysRacingStore), 0.05);
        let err = adapter
            .record(RatingEvent::Created { stars: 5 })
            .expect_err("permanent races must not spin forever");
        assert!(matches!(err, RepositoryError::Contention(_)));
    }
}
