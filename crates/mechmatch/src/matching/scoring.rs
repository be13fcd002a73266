use serde::{Deserialize, Serialize};

use super::geo::{great_circle_distance, round_to, Coordinates, DistanceUnit};
use super::weights::WeightPair;

/// Tunables for a single scoring pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringParams {
    /// Radius beyond which the distance component bottoms out at zero.
    pub max_distance_km: f64,
}

impl Default for ScoringParams {
    fn default() -> Self {
        Self {
            max_distance_km: 50.0,
        }
    }
}

/// Per-candidate output of one scoring pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub distance_km: f64,
    pub distance_score: f64,
    pub reputation_score: f64,
    pub total_score: f64,
}

/// Linear falloff from 1.0 at zero distance to 0.0 at the cutoff radius.
pub fn normalize_distance(distance_km: f64, max_distance_km: f64) -> f64 {
    if distance_km >= max_distance_km {
        return 0.0;
    }
    round_to(1.0 - distance_km / max_distance_km, 4)
}

/// Rescale a 1-5 star average onto [0, 1].
///
/// An average of 0.0 (a mechanic with no reviews yet) lands at -0.25; the
/// ranking keeps that behavior, so unrated mechanics sort below rated ones.
pub fn normalize_reputation(average_stars: f64) -> f64 {
    round_to((average_stars - 1.0) / 4.0, 4)
}

/// Weighted blend of proximity and reputation for one candidate.
///
/// Pure over its inputs; NaN coordinates or stars propagate into the output
/// rather than erroring.
pub fn score_candidate(
    requester: Coordinates,
    workshop: Coordinates,
    average_stars: f64,
    weights: WeightPair,
    params: ScoringParams,
) -> ScoreBreakdown {
    let distance_km = great_circle_distance(requester, workshop, DistanceUnit::Kilometers);
    let distance_score = normalize_distance(distance_km, params.max_distance_km);
    let reputation_score = normalize_reputation(average_stars);
    let total_score = round_to(
        weights.reputation * reputation_score + weights.distance * distance_score,
        4,
    );

    ScoreBreakdown {
        distance_km,
        distance_score,
        reputation_score,
        total_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_score_boundaries() {
        assert_eq!(normalize_distance(50.0, 50.0), 0.0);
        assert_eq!(normalize_distance(75.0, 50.0), 0.0);
        assert_eq!(normalize_distance(0.0, 50.0), 1.0);
        assert_eq!(normalize_distance(25.0, 50.0), 0.5);
    }

    #[test]
    fn distance_score_is_monotonically_decreasing() {
        let mut previous = f64::INFINITY;
        for step in 0..=50 {
            let score = normalize_distance(f64::from(step), 50.0);
            assert!(score <= previous, "score rose at {step} km");
            previous = score;
        }
    }

    #[test]
    fn reputation_score_is_linear_over_the_star_range() {
        assert_eq!(normalize_reputation(1.0), 0.0);
        assert_eq!(normalize_reputation(3.0), 0.5);
        assert_eq!(normalize_reputation(5.0), 1.0);
    }

    #[test]
    fn unrated_mechanic_scores_below_every_rated_one() {
        assert_eq!(normalize_reputation(0.0), -0.25);
    }

    #[test]
    fn cairo_example_scores_as_published() {
        // Stranded driver downtown, workshop a short hop north-east, 4.7 stars.
        let driver = Coordinates::new(30.0444, 31.2357);
        let workshop = Coordinates::new(30.0500, 31.2400);
        let weights = WeightPair {
            reputation: 0.6,
            distance: 0.4,
        };

        let score = score_candidate(driver, workshop, 4.7, weights, ScoringParams::default());

        assert_eq!(score.distance_km, 0.75);
        assert_eq!(score.distance_score, 0.985);
        assert_eq!(score.reputation_score, 0.925);
        assert!((score.total_score - 0.949).abs() < 1e-9);
    }

    #[test]
    fn nan_input_propagates_instead_of_panicking() {
        let driver = Coordinates::new(f64::NAN, 31.2357);
        let workshop = Coordinates::new(30.05, 31.24);
        let score = score_candidate(
            driver,
            workshop,
            4.0,
            WeightPair::default(),
            ScoringParams::default(),
        );
        assert!(score.distance_km.is_nan());
        assert!(score.total_score.is_nan());
    }
}
