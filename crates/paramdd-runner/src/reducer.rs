//! Randomized reduction loop
//!
//! Shrinks the set of parameters in which the target differs from the
//! baseline. Each iteration:
//!
//! 1. proposes a candidate by resetting every still-differing key to its
//!    baseline record with independent probability `p`;
//! 2. measures the current target, then the candidate, with the oracle;
//! 3. keeps the candidate if the [`EquivalenceRule`] deems the two runs
//!    equivalent;
//! 4. checkpoints the current target.
//!
//! The loop stops once at most `threshold` keys still differ. It is strictly
//! sequential: the two measurements being compared are never taken
//! concurrently.

use paramdd_model::{AlignedPair, ParamSet};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

use crate::acceptance::{DEFAULT_TOLERANCE, EquivalenceMode, EquivalenceRule, Rejection, Verdict};
use crate::checkpoint;
use crate::error::{Error, Result};
use crate::oracle::{Cost, Oracle};

/// Default stopping threshold
pub const DEFAULT_THRESHOLD: usize = 5;

/// Default per-key revert probability
pub const DEFAULT_REVERT_PROBABILITY: f64 = 0.1;

/// Tuning knobs for the reduction loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReductionConfig {
    /// Stop once at most this many keys still differ
    pub threshold: usize,
    /// Probability of reverting each differing key in a proposal
    pub revert_probability: f64,
    /// Equivalence tolerance (strict upper bound on distance)
    pub tolerance: f64,
    /// Distance measure for the equivalence check
    pub mode: EquivalenceMode,
    /// Give up after this many iterations
    pub max_iterations: Option<u64>,
    /// RNG seed; drawn from entropy when absent
    pub seed: Option<u64>,
}

impl Default for ReductionConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            revert_probability: DEFAULT_REVERT_PROBABILITY,
            tolerance: DEFAULT_TOLERANCE,
            mode: EquivalenceMode::Ratio,
            max_iterations: None,
            seed: None,
        }
    }
}

impl ReductionConfig {
    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an out-of-range probability or tolerance.
    pub fn validate(&self) -> Result<()> {
        if !(self.revert_probability > 0.0 && self.revert_probability <= 1.0) {
            return Err(Error::Config(format!(
                "revert_probability must be in (0, 1], got {}",
                self.revert_probability
            )));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(Error::Config(format!(
                "tolerance must be a positive finite number, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }

    /// Equivalence rule built from `tolerance` and `mode`
    #[must_use]
    pub fn rule(&self) -> EquivalenceRule {
        EquivalenceRule::new(self.tolerance, self.mode)
    }

    /// Seeded generator, plus the seed actually used
    #[must_use]
    pub fn rng(&self) -> (u64, ChaCha8Rng) {
        let seed = self.seed.unwrap_or_else(rand::random);
        (seed, ChaCha8Rng::seed_from_u64(seed))
    }
}

/// Why the loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// At most `threshold` keys still differ
    Converged,
    /// `max_iterations` reached first
    IterationLimit,
    /// Cancellation was requested
    Cancelled,
}

/// Counters for one reduction run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReductionStats {
    /// Iterations performed
    pub iterations: u64,
    /// Candidates accepted
    pub accepted: u64,
    /// Candidates rejected
    pub rejected: u64,
    /// Proposals that reverted no key
    pub empty_proposals: u64,
    /// Oracle evaluations
    pub oracle_calls: u64,
    /// Differing keys before the first iteration
    pub initial_diff: usize,
    /// Differing keys at the end
    pub final_diff: usize,
}

/// What happened in one iteration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    /// 1-based iteration number
    pub iteration: u64,
    /// Differing keys before the iteration
    pub diff_before: usize,
    /// Keys reset to baseline in the candidate
    pub reverted: usize,
    /// Cost measured for the target
    pub target_cost: Cost,
    /// Cost measured for the candidate; `None` if it never ran
    pub candidate_cost: Option<Cost>,
    /// Acceptance decision
    pub verdict: Verdict,
    /// Differing keys after the iteration
    pub diff_after: usize,
}

/// Result of [`Reducer::run`]
#[derive(Debug, Clone)]
pub struct ReductionOutcome {
    /// Final reduced target
    pub target: ParamSet,
    /// Keys in which `target` still differs from the baseline
    pub diff: Vec<String>,
    /// Counters
    pub stats: ReductionStats,
    /// Why the loop ended
    pub stop_reason: StopReason,
    /// Per-iteration log
    pub iterations: Vec<IterationRecord>,
}

/// The reduction loop
///
/// Owns the baseline/target pair, the oracle, and the random generator.
#[derive(Debug)]
pub struct Reducer<O: Oracle, R: Rng> {
    config: ReductionConfig,
    pair: AlignedPair,
    oracle: O,
    rng: R,
    checkpoint: Option<PathBuf>,
    cancel: Option<Arc<AtomicBool>>,
}

impl<O: Oracle, R: Rng> Reducer<O, R> {
    /// Create a reducer
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `config` is out of range.
    pub fn new(config: ReductionConfig, pair: AlignedPair, oracle: O, rng: R) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            pair,
            oracle,
            rng,
            checkpoint: None,
            cancel: None,
        })
    }

    /// Write the target to `path` after every iteration
    #[must_use]
    pub fn with_checkpoint(mut self, path: impl Into<PathBuf>) -> Self {
        self.checkpoint = Some(path.into());
        self
    }

    /// Stop between iterations once `flag` is set
    #[must_use]
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Current baseline/target pair
    #[must_use]
    pub fn pair(&self) -> &AlignedPair {
        &self.pair
    }

    /// Build a candidate from the current target
    ///
    /// Returns the candidate and the number of keys reverted.
    ///
    /// # Errors
    ///
    /// Fails only if a key in `diff` is unknown to the pair.
    pub fn propose(&mut self, diff: &[String]) -> Result<(ParamSet, usize)> {
        let p = self.config.revert_probability;
        let rng = &mut self.rng;
        let chosen: Vec<&str> = diff
            .iter()
            .map(String::as_str)
            .filter(|_| rng.gen_bool(p))
            .collect();
        let candidate = self.pair.revert(chosen.iter().copied())?;
        Ok((candidate, chosen.len()))
    }

    /// Run one propose/measure/decide iteration
    ///
    /// `diff` must be the current diff of the pair.
    ///
    /// # Errors
    ///
    /// Propagates fatal oracle and model errors.
    pub fn step(&mut self, iteration: u64, diff: &[String]) -> Result<IterationRecord> {
        let (candidate, reverted) = self.propose(diff)?;

        let target_cost = self.oracle.evaluate(self.pair.target())?;
        if self.cancelled() {
            debug!(iteration, target = %target_cost, "Cancelled before candidate run");
            return Ok(IterationRecord {
                iteration,
                diff_before: diff.len(),
                reverted,
                target_cost,
                candidate_cost: None,
                verdict: Verdict::Rejected(Rejection::Cancelled),
                diff_after: diff.len(),
            });
        }
        let candidate_cost = self.oracle.evaluate(&candidate)?;
        let verdict = self.config.rule().judge(&target_cost, &candidate_cost);

        let diff_after = if verdict.is_accepted() {
            self.pair.set_target(candidate)?;
            diff.len() - reverted
        } else {
            diff.len()
        };

        debug!(
            iteration,
            reverted,
            target = %target_cost,
            candidate = %candidate_cost,
            ?verdict,
            "Iteration"
        );

        Ok(IterationRecord {
            iteration,
            diff_before: diff.len(),
            reverted,
            target_cost,
            candidate_cost: Some(candidate_cost),
            verdict,
            diff_after,
        })
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    fn write_checkpoint(&self) -> Result<()> {
        match &self.checkpoint {
            Some(path) => checkpoint::write_atomic(path, self.pair.target()),
            None => Ok(()),
        }
    }

    /// Reduce until converged, capped, or cancelled
    ///
    /// # Errors
    ///
    /// Returns the first fatal error (checkpoint IO, materialization IO,
    /// oracle spawn failure). Oracle failures are not errors.
    pub fn run(mut self) -> Result<ReductionOutcome> {
        let mut diff = self.pair.diff()?;
        let mut stats = ReductionStats {
            initial_diff: diff.len(),
            ..ReductionStats::default()
        };
        let mut iterations = Vec::new();

        info!(
            diff = diff.len(),
            threshold = self.config.threshold,
            probability = self.config.revert_probability,
            "Starting reduction"
        );

        let stop_reason = loop {
            if diff.len() <= self.config.threshold {
                break StopReason::Converged;
            }
            if self
                .config
                .max_iterations
                .is_some_and(|max| stats.iterations >= max)
            {
                break StopReason::IterationLimit;
            }
            if self.cancelled() {
                warn!(iterations = stats.iterations, "Reduction cancelled");
                break StopReason::Cancelled;
            }

            stats.iterations += 1;
            let record = self.step(stats.iterations, &diff)?;
            stats.oracle_calls += if record.candidate_cost.is_some() { 2 } else { 1 };
            if record.reverted == 0 {
                stats.empty_proposals += 1;
            }

            if record.verdict.is_accepted() {
                stats.accepted += 1;
                let old = diff.len();
                diff = self.pair.diff()?;
                if diff.len() < old {
                    if let Some(candidate) = &record.candidate_cost {
                        info!(
                            from = old,
                            to = diff.len(),
                            target = %record.target_cost,
                            candidate = %candidate,
                            "Improved from {old} to {}",
                            diff.len()
                        );
                    }
                }
            } else {
                stats.rejected += 1;
            }

            self.write_checkpoint()?;
            iterations.push(record);
        };

        stats.final_diff = diff.len();
        info!(
            ?stop_reason,
            iterations = stats.iterations,
            accepted = stats.accepted,
            remaining = diff.len(),
            "Reduction finished"
        );

        let (_, target) = self.pair.into_parts();
        Ok(ReductionOutcome {
            target,
            diff,
            stats,
            stop_reason,
            iterations,
        })
    }
}
