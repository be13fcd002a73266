//! Discrete exploration over candidate weight pairs.
//!
//! An alternative to the online [`super::weights::WeightAdapter`]: instead of
//! nudging one shared pair, keep a small set of fixed candidates and learn
//! which one earns the best driver feedback. Not wired into the live request
//! path; the `simulate` CLI command drives it as an offline experiment, and
//! its per-arm counters are never mixed with the production weight row.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use super::weights::WeightPair;

/// Rewards above this level also pull the winning arm toward an even split.
const STRONG_REWARD: f64 = 0.7;

/// Tunables for the epsilon-greedy explorer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BanditConfig {
    /// Probability of exploring a random arm instead of exploiting the best.
    pub epsilon: f64,
    /// Step size for the post-reward arm adjustment.
    pub learning_rate: f64,
    /// Number of candidate weight pairs.
    pub arms: usize,
}

impl Default for BanditConfig {
    fn default() -> Self {
        Self {
            epsilon: 0.1,
            learning_rate: 0.05,
            arms: 3,
        }
    }
}

/// Epsilon-greedy multi-armed bandit over candidate weight pairs.
pub struct EpsilonGreedyBandit {
    config: BanditConfig,
    arms: Vec<WeightPair>,
    pulls: Vec<u64>,
    rewards: Vec<f64>,
    rng: StdRng,
}

impl EpsilonGreedyBandit {
    pub fn new(config: BanditConfig, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let arms = seed_arms(config.arms, &mut rng);
        let count = arms.len();

        Self {
            config,
            arms,
            pulls: vec![0; count],
            rewards: vec![0.0; count],
            rng,
        }
    }

    pub fn arm_count(&self) -> usize {
        self.arms.len()
    }

    /// Pick an arm: explore with probability epsilon, otherwise exploit the
    /// best average reward observed so far. Before any feedback exists the
    /// exploit branch falls back to a random arm.
    pub fn choose(&mut self) -> (usize, WeightPair) {
        let arm = if self.rng.gen::<f64>() < self.config.epsilon {
            self.rng.gen_range(0..self.arms.len())
        } else {
            match self.best_arm() {
                Some(best) => best,
                None => self.rng.gen_range(0..self.arms.len()),
            }
        };

        (arm, self.arms[arm])
    }

    /// Credit `reward` to `arm`. Strong rewards additionally nudge the arm's
    /// pair toward an even split, floored at zero and renormalized.
    pub fn reinforce(&mut self, arm: usize, reward: f64) {
        self.pulls[arm] += 1;
        self.rewards[arm] += reward;

        if reward > STRONG_REWARD {
            let adjustment = self.config.learning_rate * (1.0 - reward);
            let reputation = (self.arms[arm].reputation + adjustment).max(0.0);
            let distance = (self.arms[arm].distance + adjustment).max(0.0);
            let total = reputation + distance;
            if total > 0.0 {
                self.arms[arm] = WeightPair::new(reputation / total, distance / total);
            }
        }
    }

    /// Arm with the highest average reward among those pulled at least once.
    pub fn best_arm(&self) -> Option<usize> {
        (0..self.arms.len())
            .filter(|arm| self.pulls[*arm] > 0)
            .max_by(|a, b| {
                let avg_a = self.rewards[*a] / self.pulls[*a] as f64;
                let avg_b = self.rewards[*b] / self.pulls[*b] as f64;
                avg_a
                    .partial_cmp(&avg_b)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    }

    pub fn statistics(&self) -> BanditStats {
        let trials: u64 = self.pulls.iter().sum();
        let total_reward: f64 = self.rewards.iter().sum();
        let average_reward = if trials > 0 {
            total_reward / trials as f64
        } else {
            0.0
        };

        let arms = self
            .arms
            .iter()
            .enumerate()
            .map(|(index, weights)| ArmStats {
                index,
                weights: *weights,
                pulls: self.pulls[index],
                average_reward: if self.pulls[index] > 0 {
                    self.rewards[index] / self.pulls[index] as f64
                } else {
                    0.0
                },
            })
            .collect();

        BanditStats {
            trials,
            average_reward,
            best_arm: self.best_arm(),
            arms,
        }
    }
}

/// The first three arms are fixed business-meaningful splits; any further
/// arms are drawn uniformly from the two-component simplex.
fn seed_arms(count: usize, rng: &mut StdRng) -> Vec<WeightPair> {
    let base = [
        WeightPair::new(0.6, 0.4),
        WeightPair::new(0.4, 0.6),
        WeightPair::new(0.5, 0.5),
    ];

    let mut arms: Vec<WeightPair> = base.iter().copied().take(count.max(1)).collect();
    while arms.len() < count {
        let reputation = rng.gen::<f64>();
        arms.push(WeightPair::new(reputation, 1.0 - reputation));
    }
    arms
}

/// Per-arm summary exposed by [`EpsilonGreedyBandit::statistics`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ArmStats {
    pub index: usize,
    pub weights: WeightPair,
    pub pulls: u64,
    pub average_reward: f64,
}

/// Aggregate view of the experiment so far.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BanditStats {
    pub trials: u64,
    pub average_reward: f64,
    pub best_arm: Option<usize>,
    pub arms: Vec<ArmStats>,
}
