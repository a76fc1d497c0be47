//! Oracle command execution
//!
//! Trait-based abstraction over running the external test command, so the
//! reduction loop can be tested without spawning processes.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::process::{ProcessGuard, WaitOutcome};

/// Default oracle program
pub const DEFAULT_PROGRAM: &str = "./run-tests";

/// Default oracle arguments (gtest runner restricted to one suite)
pub const DEFAULT_ARGS: &[&str] = &[
    "--gtest_output=xml:test_results.xml",
    "--gtest_color=yes",
    "--gtest_filter=Necla/*",
];

/// Default hard timeout for one oracle run
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(8);

/// Result of one oracle command run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Exit status 0
    Success {
        /// Wall-clock time from spawn to exit
        elapsed: Duration,
    },
    /// Non-zero exit status, or killed by a signal (`exit_code: None`)
    Failure {
        /// Exit code, if the process exited normally
        exit_code: Option<i32>,
        /// Wall-clock time from spawn to exit
        elapsed: Duration,
    },
    /// Hard timeout reached; the process was killed
    Timeout {
        /// Time waited before the kill
        elapsed: Duration,
    },
}

impl CommandOutcome {
    /// Create a successful outcome
    #[must_use]
    pub fn success(elapsed: Duration) -> Self {
        Self::Success { elapsed }
    }

    /// Create a failed outcome
    #[must_use]
    pub fn failure(exit_code: i32) -> Self {
        Self::Failure {
            exit_code: Some(exit_code),
            elapsed: Duration::ZERO,
        }
    }

    /// Whether the command passed
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Wall-clock time spent
    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        match self {
            Self::Success { elapsed }
            | Self::Failure { elapsed, .. }
            | Self::Timeout { elapsed } => *elapsed,
        }
    }
}

/// Trait for running the oracle command
///
/// The command reads whatever configuration was last materialized; it
/// takes no parameters of its own.
pub trait CommandRunner: Send + Sync {
    /// Run the command once, blocking until it exits or times out
    ///
    /// # Errors
    ///
    /// Returns an error only if the command cannot be started or polled.
    /// A failing or hung command is an `Ok` outcome.
    fn run(&self) -> Result<CommandOutcome>;

    /// Human-readable command line for logs
    fn describe(&self) -> String;
}

/// Runner that spawns the real oracle process
#[derive(Debug, Clone)]
pub struct RealCommandRunner {
    /// Program to execute
    pub program: String,
    /// Fixed arguments
    pub args: Vec<String>,
    /// Hard wall-clock limit per run
    pub timeout: Duration,
    /// Working directory (inherited if `None`)
    pub working_dir: Option<PathBuf>,
}

impl Default for RealCommandRunner {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            args: DEFAULT_ARGS.iter().map(ToString::to_string).collect(),
            timeout: DEFAULT_TIMEOUT,
            working_dir: None,
        }
    }
}

impl RealCommandRunner {
    /// Create a runner for `program` with no arguments
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            working_dir: None,
        }
    }

    /// Set the arguments
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the working directory
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

impl CommandRunner for RealCommandRunner {
    fn run(&self) -> Result<CommandOutcome> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        let start = Instant::now();
        let guard = ProcessGuard::spawn(&mut cmd).map_err(|source| Error::Spawn {
            program: self.program.clone(),
            source,
        })?;
        let waited = guard.wait_timeout(self.timeout)?;
        let elapsed = start.elapsed();

        Ok(match waited {
            WaitOutcome::Exited(status) if status.success() => CommandOutcome::Success { elapsed },
            WaitOutcome::Exited(status) => CommandOutcome::Failure {
                exit_code: status.code(),
                elapsed,
            },
            WaitOutcome::TimedOut => CommandOutcome::Timeout { elapsed },
            WaitOutcome::Reaped => CommandOutcome::Failure {
                exit_code: None,
                elapsed,
            },
        })
    }

    fn describe(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Mock runner replaying scripted outcomes
///
/// Outcomes are returned in order; once the script is exhausted the
/// fallback is returned forever.
#[derive(Debug)]
pub struct MockCommandRunner {
    script: Mutex<VecDeque<CommandOutcome>>,
    fallback: CommandOutcome,
    calls: AtomicUsize,
}

impl Default for MockCommandRunner {
    fn default() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: CommandOutcome::success(Duration::from_secs(1)),
            calls: AtomicUsize::new(0),
        }
    }
}

impl MockCommandRunner {
    /// Create a mock that always succeeds in one second
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue outcomes to return before the fallback
    #[must_use]
    pub fn with_script(self, outcomes: impl IntoIterator<Item = CommandOutcome>) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.extend(outcomes);
        }
        self
    }

    /// Set the outcome returned once the script runs out
    #[must_use]
    pub fn with_fallback(mut self, outcome: CommandOutcome) -> Self {
        self.fallback = outcome;
        self
    }

    /// Number of times `run` was called
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CommandRunner for MockCommandRunner {
    fn run(&self) -> Result<CommandOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front());
        Ok(next.unwrap_or(self.fallback))
    }

    fn describe(&self) -> String {
        "mock-oracle".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_runner_runs_gtest_suite() {
        let runner = RealCommandRunner::default();
        assert_eq!(runner.timeout, Duration::from_secs(8));
        assert!(runner.describe().starts_with("./run-tests --gtest_output="));
        assert!(runner.describe().ends_with("--gtest_filter=Necla/*"));
    }

    #[test]
    fn test_builder() {
        let runner = RealCommandRunner::new("make")
            .with_args(["check", "-j1"])
            .with_timeout(Duration::from_millis(1500))
            .with_working_dir("/tmp");
        assert_eq!(runner.describe(), "make check -j1");
        assert_eq!(runner.timeout, Duration::from_millis(1500));
        assert_eq!(runner.working_dir, Some(PathBuf::from("/tmp")));
    }

    #[test]
    fn test_outcome_helpers() {
        let ok = CommandOutcome::success(Duration::from_millis(250));
        assert!(ok.is_success());
        assert_eq!(ok.elapsed(), Duration::from_millis(250));
        assert!(!CommandOutcome::failure(2).is_success());
        assert!(
            !CommandOutcome::Timeout {
                elapsed: Duration::from_secs(8)
            }
            .is_success()
        );
    }

    #[test]
    fn test_mock_script_then_fallback() {
        let mock = MockCommandRunner::new()
            .with_script([CommandOutcome::failure(1)])
            .with_fallback(CommandOutcome::success(Duration::from_secs(2)));
        assert_eq!(mock.run().unwrap(), CommandOutcome::failure(1));
        assert_eq!(
            mock.run().unwrap(),
            CommandOutcome::success(Duration::from_secs(2))
        );
        assert_eq!(
            mock.run().unwrap(),
            CommandOutcome::success(Duration::from_secs(2))
        );
        assert_eq!(mock.calls(), 3);
    }

    #[cfg(unix)]
    #[test]
    fn test_real_runner_success() {
        let outcome = RealCommandRunner::new("true").run().unwrap();
        assert!(outcome.is_success());
    }

    #[cfg(unix)]
    #[test]
    fn test_real_runner_elapsed_tracks_actual_exit() {
        let runner = RealCommandRunner::new("true");
        let fastest = (0..5)
            .map(|_| {
                let outcome = runner.run().unwrap();
                assert!(outcome.is_success());
                outcome.elapsed()
            })
            .min()
            .unwrap();
        assert!(fastest < Duration::from_millis(5), "fastest run took {fastest:?}");
    }

    #[cfg(unix)]
    #[test]
    fn test_real_runner_failure_exit_code() {
        let outcome = RealCommandRunner::new("sh")
            .with_args(["-c", "exit 3"])
            .run()
            .unwrap();
        assert!(matches!(
            outcome,
            CommandOutcome::Failure {
                exit_code: Some(3),
                ..
            }
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_real_runner_timeout() {
        let outcome = RealCommandRunner::new("sleep")
            .with_args(["30"])
            .with_timeout(Duration::from_millis(100))
            .run()
            .unwrap();
        assert!(matches!(outcome, CommandOutcome::Timeout { .. }));
        assert!(outcome.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[test]
    fn test_real_runner_discards_output() {
        let outcome = RealCommandRunner::new("sh")
            .with_args(["-c", "echo noisy; echo louder >&2"])
            .run()
            .unwrap();
        assert!(outcome.is_success());
    }

    #[test]
    fn test_real_runner_spawn_failure_is_error() {
        let err = RealCommandRunner::new("/nonexistent/paramdd-oracle")
            .run()
            .unwrap_err();
        assert!(matches!(err, Error::Spawn { .. }));
    }
}
