//! Equivalence rule deciding whether a candidate replaces the target
//!
//! Two passing runs with nearly equal wall-clock time are taken as
//! behaviorally equivalent. A rejected cost on either side always loses.
//! The tolerance comparison is strict: a distance exactly equal to the
//! tolerance is rejected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::oracle::Cost;

/// Default equivalence tolerance (0.5%)
pub const DEFAULT_TOLERANCE: f64 = 0.005;

/// How the distance between two timings is measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquivalenceMode {
    /// `|t_target / t_candidate - 1|`
    #[default]
    Ratio,
    /// `|t_target - t_candidate| / max(t_target, t_candidate)`
    Symmetric,
}

impl FromStr for EquivalenceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ratio" => Ok(Self::Ratio),
            "symmetric" => Ok(Self::Symmetric),
            _ => Err(format!("Unknown equivalence mode: {s}")),
        }
    }
}

impl fmt::Display for EquivalenceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ratio => write!(f, "ratio"),
            Self::Symmetric => write!(f, "symmetric"),
        }
    }
}

/// Why a candidate was not accepted
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    /// The unchanged target failed or timed out on this measurement
    TargetFailed,
    /// The candidate failed or timed out
    CandidateFailed,
    /// The candidate ran in zero time but the target did not
    ZeroDuration,
    /// Both passed but their timings are too far apart
    OutsideTolerance {
        /// Measured distance
        distance: f64,
    },
    /// Cancellation arrived before the candidate ran
    Cancelled,
}

/// Outcome of comparing target and candidate costs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Candidate deemed equivalent
    Accepted {
        /// Measured distance
        distance: f64,
    },
    /// Candidate rejected
    Rejected(Rejection),
}

impl Verdict {
    /// Whether the candidate was accepted
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// Tolerance-based equivalence check
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquivalenceRule {
    /// Distance must be strictly below this
    pub tolerance: f64,
    /// Distance measure
    pub mode: EquivalenceMode,
}

impl Default for EquivalenceRule {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            mode: EquivalenceMode::Ratio,
        }
    }
}

impl EquivalenceRule {
    /// Create a rule
    #[must_use]
    pub fn new(tolerance: f64, mode: EquivalenceMode) -> Self {
        Self { tolerance, mode }
    }

    /// Distance between two timings in seconds
    ///
    /// Returns `None` when the ratio is undefined (zero candidate time with
    /// a non-zero target time).
    #[must_use]
    pub fn distance(&self, target_secs: f64, candidate_secs: f64) -> Option<f64> {
        if target_secs == 0.0 && candidate_secs == 0.0 {
            return Some(0.0);
        }
        match self.mode {
            EquivalenceMode::Ratio => {
                if candidate_secs == 0.0 {
                    None
                } else {
                    Some((target_secs / candidate_secs - 1.0).abs())
                }
            }
            EquivalenceMode::Symmetric => {
                Some((target_secs - candidate_secs).abs() / target_secs.max(candidate_secs))
            }
        }
    }

    /// Compare the target's cost with the candidate's
    #[must_use]
    pub fn judge(&self, target: &Cost, candidate: &Cost) -> Verdict {
        let (Some(t), Some(c)) = (target.duration(), candidate.duration()) else {
            return Verdict::Rejected(if target.is_measured() {
                Rejection::CandidateFailed
            } else {
                Rejection::TargetFailed
            });
        };
        match self.distance(t.as_secs_f64(), c.as_secs_f64()) {
            None => Verdict::Rejected(Rejection::ZeroDuration),
            Some(distance) if distance < self.tolerance => Verdict::Accepted { distance },
            Some(distance) => Verdict::Rejected(Rejection::OutsideTolerance { distance }),
        }
    }
}
