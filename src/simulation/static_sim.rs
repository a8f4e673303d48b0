//! Static incentive simulation.
//!
//! Models a flat-payment scheme: each synthetic participant submits one
//! measurement in a grid cell chosen uniformly at random, independent of the
//! cell's current coverage, and is paid a fixed reward.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::info;

use crate::assign::CellAssignment;
use crate::error::SimError;

/// Outcome of one simulation run. The three count series are index-aligned
/// with the baseline assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationResult {
    pub initial_counts: Vec<u64>,
    pub new_submissions: Vec<u64>,
    pub final_counts: Vec<u64>,
    pub total_payout: f64,
}

/// Runs the static incentive simulation with the crate's seeding policy:
/// a `ChaCha8Rng` seeded from `seed`, or from OS entropy when unseeded
/// (non-reproducible by design).
pub fn simulate(
    baseline: &CellAssignment,
    num_users: u32,
    reward_per_submission: f64,
    seed: Option<u64>,
) -> Result<SimulationResult, SimError> {
    let mut rng = match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    };
    simulate_with_rng(baseline, num_users, reward_per_submission, &mut rng)
}

/// Same as [`simulate`], with an explicit generator instead of ambient
/// seeding, so callers can share or stage RNG streams.
///
/// The sampling scheme is fixed for reproducibility: one
/// `Rng::gen_range(0..cells)` draw per synthetic user, i.e. rand's uniform
/// integer distribution. Identical `(cell count, num_users, rng state)`
/// produce bit-identical `new_submissions`.
pub fn simulate_with_rng<R: Rng>(
    baseline: &CellAssignment,
    num_users: u32,
    reward_per_submission: f64,
    rng: &mut R,
) -> Result<SimulationResult, SimError> {
    if !(reward_per_submission >= 0.0) {
        return Err(SimError::InvalidParameter(format!(
            "reward_per_submission must be non-negative, got {reward_per_submission}"
        )));
    }
    if baseline.is_empty() && num_users > 0 {
        return Err(SimError::EmptyGrid);
    }

    let initial_counts = baseline.counts().to_vec();
    let mut new_submissions = vec![0u64; baseline.len()];
    for _ in 0..num_users {
        let cell = rng.gen_range(0..baseline.len());
        new_submissions[cell] += 1;
    }

    let final_counts = initial_counts
        .iter()
        .zip(&new_submissions)
        .map(|(initial, new)| initial + new)
        .collect();
    let total_payout = f64::from(num_users) * reward_per_submission;
    info!(
        num_users,
        total_payout, "static incentive simulation complete"
    );

    Ok(SimulationResult {
        initial_counts,
        new_submissions,
        final_counts,
        total_payout,
    })
}
