//! Oracle client: materialize a configuration, run the test, report a cost
//!
//! The external test reads its configuration from a fixed path. Evaluating
//! a parameter set is therefore a two-step protocol:
//!
//! 1. dump the set to the materialize path (overwriting it);
//! 2. run the oracle command and fold its outcome into a [`Cost`].
//!
//! Oracle failures and timeouts are routine: they become
//! [`Cost::Rejected`], never an `Err`.

use paramdd_model::ParamSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::command::{CommandOutcome, CommandRunner};
use crate::error::Result;

/// Why an oracle run produced no usable timing
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Non-zero exit, or killed by a signal
    Failed {
        /// Exit code, if any
        exit_code: Option<i32>,
    },
    /// Hard timeout reached
    TimedOut,
}

/// Cost of one oracle run
///
/// Ordering places every `Rejected` cost above every `Measured` one, so a
/// failed run is worse than any real timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cost {
    /// Test passed in this wall-clock time
    Measured(Duration),
    /// Test failed or timed out
    Rejected(RejectReason),
}

impl Cost {
    /// Whether this cost carries a usable timing
    #[must_use]
    pub const fn is_measured(&self) -> bool {
        matches!(self, Self::Measured(_))
    }

    /// Timing, if measured
    #[must_use]
    pub const fn duration(&self) -> Option<Duration> {
        match self {
            Self::Measured(d) => Some(*d),
            Self::Rejected(_) => None,
        }
    }
}

impl From<CommandOutcome> for Cost {
    fn from(outcome: CommandOutcome) -> Self {
        match outcome {
            CommandOutcome::Success { elapsed } => Self::Measured(elapsed),
            CommandOutcome::Failure { exit_code, .. } => {
                Self::Rejected(RejectReason::Failed { exit_code })
            }
            CommandOutcome::Timeout { .. } => Self::Rejected(RejectReason::TimedOut),
        }
    }
}

impl fmt::Display for Cost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Measured(d) => write!(f, "{:.3}s", d.as_secs_f64()),
            Self::Rejected(RejectReason::TimedOut) => write!(f, "timeout"),
            Self::Rejected(RejectReason::Failed {
                exit_code: Some(code),
            }) => write!(f, "failed (exit {code})"),
            Self::Rejected(RejectReason::Failed { exit_code: None }) => {
                write!(f, "failed (signal)")
            }
        }
    }
}

/// Judges a parameter set by running the test against it
pub trait Oracle {
    /// Evaluate `params`
    ///
    /// # Errors
    ///
    /// Returns an error only for fatal conditions (the configuration cannot
    /// be written, the command cannot be started).
    fn evaluate(&mut self, params: &ParamSet) -> Result<Cost>;
}

impl<F> Oracle for F
where
    F: FnMut(&ParamSet) -> Result<Cost>,
{
    fn evaluate(&mut self, params: &ParamSet) -> Result<Cost> {
        self(params)
    }
}

/// Oracle backed by an external command reading a materialized file
#[derive(Debug)]
pub struct CommandOracle<R: CommandRunner> {
    materialize_path: PathBuf,
    runner: R,
}

impl<R: CommandRunner> CommandOracle<R> {
    /// Create an oracle that writes to `materialize_path` before each run
    #[must_use]
    pub fn new(materialize_path: impl Into<PathBuf>, runner: R) -> Self {
        Self {
            materialize_path: materialize_path.into(),
            runner,
        }
    }

    /// Path the configuration is written to
    #[must_use]
    pub fn materialize_path(&self) -> &Path {
        &self.materialize_path
    }

    /// Underlying command runner
    #[must_use]
    pub fn runner(&self) -> &R {
        &self.runner
    }
}

impl<R: CommandRunner> Oracle for CommandOracle<R> {
    fn evaluate(&mut self, params: &ParamSet) -> Result<Cost> {
        params.dump_to_file(&self.materialize_path)?;
        let outcome = self.runner.run()?;
        match outcome {
            CommandOutcome::Timeout { elapsed } => warn!(
                command = %self.runner.describe(),
                elapsed_ms = elapsed.as_millis(),
                "Oracle timed out"
            ),
            CommandOutcome::Failure { exit_code, .. } => {
                debug!(?exit_code, "Oracle failed");
            }
            CommandOutcome::Success { .. } => {}
        }
        Ok(Cost::from(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::MockCommandRunner;
    use paramdd_model::Param;

    fn sample() -> ParamSet {
        ParamSet::from_records([
            Param::new("a", "1", "int"),
            Param::new("b", "x", "symbol"),
        ])
        .unwrap()
    }

    #[test]
    fn test_cost_from_outcome() {
        assert_eq!(
            Cost::from(CommandOutcome::success(Duration::from_secs(1))),
            Cost::Measured(Duration::from_secs(1))
        );
        assert_eq!(
            Cost::from(CommandOutcome::failure(1)),
            Cost::Rejected(RejectReason::Failed { exit_code: Some(1) })
        );
        assert_eq!(
            Cost::from(CommandOutcome::Timeout {
                elapsed: Duration::from_secs(8)
            }),
            Cost::Rejected(RejectReason::TimedOut)
        );
    }

    #[test]
    fn test_rejected_is_worse_than_any_measurement() {
        let slow = Cost::Measured(Duration::from_secs(u64::MAX / 2));
        assert!(slow < Cost::Rejected(RejectReason::TimedOut));
        assert!(slow < Cost::Rejected(RejectReason::Failed { exit_code: None }));
        assert!(Cost::Measured(Duration::ZERO) < slow);
    }

    #[test]
    fn test_cost_display() {
        assert_eq!(Cost::Measured(Duration::from_millis(1500)).to_string(), "1.500s");
        assert_eq!(Cost::Rejected(RejectReason::TimedOut).to_string(), "timeout");
        assert_eq!(
            Cost::Rejected(RejectReason::Failed { exit_code: Some(2) }).to_string(),
            "failed (exit 2)"
        );
    }

    #[test]
    fn test_command_oracle_materializes_before_running() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("z3.params");
        let mut oracle = CommandOracle::new(&path, MockCommandRunner::new());

        let cost = oracle.evaluate(&sample()).unwrap();
        assert_eq!(cost, Cost::Measured(Duration::from_secs(1)));
        assert_eq!(ParamSet::from_file(&path).unwrap(), sample());
        assert_eq!(oracle.runner().calls(), 1);
    }

    #[test]
    fn test_command_oracle_folds_failure_into_cost() {
        let dir = tempfile::tempdir().unwrap();
        let runner = MockCommandRunner::new().with_script([CommandOutcome::Timeout {
            elapsed: Duration::from_secs(8),
        }]);
        let mut oracle = CommandOracle::new(dir.path().join("z3.params"), runner);
        assert_eq!(
            oracle.evaluate(&sample()).unwrap(),
            Cost::Rejected(RejectReason::TimedOut)
        );
    }

    #[test]
    fn test_command_oracle_unwritable_path_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("z3.params");
        let mut oracle = CommandOracle::new(path, MockCommandRunner::new());
        assert!(oracle.evaluate(&sample()).is_err());
        assert_eq!(oracle.runner().calls(), 0);
    }

    #[test]
    fn test_closure_oracle() {
        let mut calls = 0;
        let mut oracle = |params: &ParamSet| -> Result<Cost> {
            calls += 1;
            Ok(Cost::Measured(Duration::from_millis(params.len() as u64)))
        };
        assert_eq!(
            oracle.evaluate(&sample()).unwrap(),
            Cost::Measured(Duration::from_millis(2))
        );
        drop(oracle);
        assert_eq!(calls, 1);
    }
}
