//! Machine-readable summary of a reduction run

use chrono::{DateTime, Utc};
use paramdd_model::Param;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;
use crate::reducer::{IterationRecord, ReductionConfig, ReductionOutcome, ReductionStats, StopReason};

/// JSON report written at the end of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReductionReport {
    /// When the report was produced
    pub created_at: DateTime<Utc>,
    /// Seed the run used
    pub seed: u64,
    /// Oracle command line
    pub oracle: String,
    /// Loop settings
    pub config: ReductionConfig,
    /// Why the loop ended
    pub stop_reason: StopReason,
    /// Counters
    pub stats: ReductionStats,
    /// Target records still differing from the baseline, in file order
    pub remaining: Vec<Param>,
    /// Per-iteration log
    pub iterations: Vec<IterationRecord>,
}

impl ReductionReport {
    /// Summarize `outcome`
    #[must_use]
    pub fn new(
        outcome: &ReductionOutcome,
        config: &ReductionConfig,
        seed: u64,
        oracle: impl Into<String>,
    ) -> Self {
        let remaining = outcome
            .diff
            .iter()
            .filter_map(|key| outcome.target.get(key).cloned())
            .collect();
        Self {
            created_at: Utc::now(),
            seed,
            oracle: oracle.into(),
            config: ReductionConfig {
                seed: Some(seed),
                ..config.clone()
            },
            stop_reason: outcome.stop_reason,
            stats: outcome.stats.clone(),
            remaining,
            iterations: outcome.iterations.clone(),
        }
    }

    /// Render as pretty JSON
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report to `path`
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Read a report back
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}
