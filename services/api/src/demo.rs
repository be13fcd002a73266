use crate::infra::{
    seed_demo_fixtures, InMemoryLocationBroadcast, InMemoryMechanicDirectory, InMemoryRatingLog,
    InMemoryRequestBoard, InMemoryTrackingStore, InMemoryWeightStore,
};
use chrono::Utc;
use clap::Args;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

use mechmatch::error::AppError;
use mechmatch::matching::{
    score_candidate, BanditConfig, Coordinates, EpsilonGreedyBandit, MatchingService,
    RatingService, RequestId, ScoringParams, WeightAdapter,
};
use mechmatch::tracking::{TrackingPolicy, TrackingService};

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Learning rate applied to every rating reward delta
    #[arg(long, default_value_t = 0.05)]
    pub(crate) learning_rate: f64,
    /// Cutoff radius for the distance score
    #[arg(long, default_value_t = 50.0)]
    pub(crate) max_distance_km: f64,
}

#[derive(Args, Debug)]
pub(crate) struct SimulateArgs {
    /// Number of simulated request/feedback rounds
    #[arg(long, default_value_t = 50)]
    pub(crate) rounds: u32,
    /// Exploration probability for the epsilon-greedy policy
    #[arg(long, default_value_t = 0.1)]
    pub(crate) epsilon: f64,
    /// Step size for the post-reward arm adjustment
    #[arg(long, default_value_t = 0.05)]
    pub(crate) learning_rate: f64,
    /// Number of candidate weight pairs to explore
    #[arg(long, default_value_t = 3)]
    pub(crate) arms: usize,
    /// RNG seed so runs can be replayed
    #[arg(long, default_value_t = 42)]
    pub(crate) seed: u64,
}

/// Scripted end-to-end walk through ranking, the rating feedback loop, and
/// live tracking, against the in-memory fixture set.
pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let directory = Arc::new(InMemoryMechanicDirectory::default());
    let board = Arc::new(InMemoryRequestBoard::default());
    let rating_log = Arc::new(InMemoryRatingLog::default());
    let weight_store = Arc::new(InMemoryWeightStore::default());
    let broadcast = Arc::new(InMemoryLocationBroadcast::default());
    seed_demo_fixtures(&directory, &board);

    let matching = MatchingService::new(
        directory.clone(),
        board.clone(),
        weight_store.clone(),
        ScoringParams {
            max_distance_km: args.max_distance_km,
        },
    );
    let ratings = RatingService::new(
        board.clone(),
        directory,
        rating_log,
        WeightAdapter::new(weight_store, args.learning_rate),
    );
    let tracking = TrackingService::new(
        board,
        Arc::new(InMemoryTrackingStore::default()),
        broadcast.clone(),
        TrackingPolicy::default(),
    );

    let driver = Coordinates::new(30.0444, 31.2357);

    println!("== Roadside mechanic marketplace demo ==");
    let snapshot = matching.current_weights()?;
    println!(
        "starting weights: reputation {:.4} / distance {:.4}",
        snapshot.weights.reputation, snapshot.weights.distance
    );

    println!("\n-- ranked battery mechanics for a driver at ({:.4}, {:.4}) --",
        driver.latitude, driver.longitude
    );
    for (position, candidate) in matching.rank_mechanics(driver, "battery")?.iter().enumerate() {
        println!(
            "{}. {} | total {:.4} (reputation {:.4}, distance {:.4}, {:.2} km)",
            position + 1,
            candidate.workshop_name,
            candidate.score.total_score,
            candidate.score.reputation_score,
            candidate.score.distance_score,
            candidate.score.distance_km,
        );
    }

    println!("\n-- rating feedback loop --");
    let record = ratings.submit(RequestId(1), 5, Some("fixed it in minutes".to_string()))?;
    let weights = matching.current_weights()?.weights;
    println!(
        "5-star rating submitted: weights now {:.4} / {:.4}",
        weights.reputation, weights.distance
    );

    ratings.amend(record.id, 3, Some("price crept up afterwards".to_string()))?;
    let weights = matching.current_weights()?.weights;
    println!(
        "rating amended to 3 stars: weights now {:.4} / {:.4}",
        weights.reputation, weights.distance
    );

    ratings.withdraw(record.id)?;
    let weights = matching.current_weights()?.weights;
    println!(
        "rating withdrawn: weights back to {:.4} / {:.4}",
        weights.reputation, weights.distance
    );

    println!("\n-- live tracking for request 2 --");
    let en_route = Coordinates::new(30.0480, 31.2385);
    let outcome = tracking.report_location(RequestId(2), en_route, Utc::now())?;
    println!(
        "en-route report: persisted={} arrived={}",
        outcome.persisted, outcome.arrived
    );

    let at_driver = Coordinates::new(30.0450, 31.2360);
    let outcome = tracking.report_location(RequestId(2), at_driver, Utc::now())?;
    println!(
        "on-site report: persisted={} arrived={}",
        outcome.persisted, outcome.arrived
    );
    println!(
        "{} updates broadcast, {} channel(s) closed",
        broadcast.updates().len(),
        broadcast.closed_channels().len()
    );

    Ok(())
}

struct SimulatedMechanic {
    name: &'static str,
    workshop: Coordinates,
    average_stars: f64,
}

static SIMULATED_MECHANICS: [SimulatedMechanic; 5] = [
    SimulatedMechanic {
        name: "Fast Fix Garage",
        workshop: Coordinates::new(30.0500, 31.2400),
        average_stars: 4.7,
    },
    SimulatedMechanic {
        name: "Budget Auto Care",
        workshop: Coordinates::new(30.1000, 31.3000),
        average_stars: 3.2,
    },
    SimulatedMechanic {
        name: "Giza Roadside Crew",
        workshop: Coordinates::new(29.9870, 31.2118),
        average_stars: 4.1,
    },
    SimulatedMechanic {
        name: "Nile Motor Works",
        workshop: Coordinates::new(30.0700, 31.2200),
        average_stars: 4.5,
    },
    SimulatedMechanic {
        name: "Downtown Wrenches",
        workshop: Coordinates::new(30.0420, 31.2500),
        average_stars: 3.9,
    },
];

/// Offline epsilon-greedy exploration over candidate weight pairs: each
/// round ranks the fixture mechanics under the chosen arm, then feeds a
/// noisy satisfaction signal for the winner back into the bandit.
pub(crate) fn run_simulation(args: SimulateArgs) -> Result<(), AppError> {
    let config = BanditConfig {
        epsilon: args.epsilon,
        learning_rate: args.learning_rate,
        arms: args.arms,
    };
    let mut bandit = EpsilonGreedyBandit::new(config, args.seed);
    let mut rng = StdRng::seed_from_u64(args.seed.wrapping_add(1));
    let params = ScoringParams::default();

    println!(
        "== weight exploration: {} rounds, {} arms, epsilon {:.2} ==",
        args.rounds,
        bandit.arm_count(),
        args.epsilon
    );

    for round in 1..=args.rounds {
        let driver = Coordinates::new(
            30.0444 + rng.gen_range(-0.1..0.1),
            31.2357 + rng.gen_range(-0.1..0.1),
        );

        let (arm, weights) = bandit.choose();

        let mut best: Option<(&SimulatedMechanic, f64, f64, f64)> = None;
        for mechanic in &SIMULATED_MECHANICS {
            let score = score_candidate(
                driver,
                mechanic.workshop,
                mechanic.average_stars,
                weights,
                params,
            );
            let replace = match best {
                Some((_, total, _, _)) => score.total_score > total,
                None => true,
            };
            if replace {
                best = Some((
                    mechanic,
                    score.total_score,
                    score.reputation_score,
                    score.distance_score,
                ));
            }
        }

        let (winner, _, reputation_score, distance_score) =
            best.expect("fixture set is never empty");

        // The driver's eventual satisfaction leans on reputation over
        // proximity, plus noise the bandit has to average away.
        let noise = rng.gen_range(-0.1..0.1);
        let satisfaction =
            (0.6 * reputation_score + 0.4 * distance_score + noise).clamp(0.0, 1.0);
        bandit.reinforce(arm, satisfaction);

        if round % 10 == 0 {
            let stats = bandit.statistics();
            println!(
                "round {:>4}: arm {} served {} | average reward {:.4}",
                round, arm, winner.name, stats.average_reward
            );
        }
    }

    let stats = bandit.statistics();
    println!("\n== exploration summary ==");
    println!("trials: {}", stats.trials);
    println!("average reward: {:.4}", stats.average_reward);
    for arm in &stats.arms {
        println!(
            "arm {}: weights {:.3}/{:.3} | pulls {:>4} | average reward {:.4}",
            arm.index, arm.weights.reputation, arm.weights.distance, arm.pulls, arm.average_reward
        );
    }
    if let Some(best) = stats.best_arm {
        let weights = stats.arms[best].weights;
        println!(
            "best arm: {} with weights {:.3}/{:.3}",
            best, weights.reputation, weights.distance
        );
    }

    Ok(())
}
