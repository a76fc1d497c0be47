//! Run configuration
//!
//! A run is described by a YAML file; every field has a default matching
//! the z3 gtest setup, so an empty file is a valid configuration:
//!
//! ```yaml
//! baseline: z3.params.defaults
//! target: z3.params.0
//! materialize_path: z3.params
//! checkpoint_path: z3.params.dd
//! oracle:
//!   program: ./run-tests
//!   args: ["--gtest_filter=Necla/*"]
//!   timeout_ms: 8000
//! reduction:
//!   threshold: 5
//!   revert_probability: 0.1
//!   tolerance: 0.005
//!   mode: ratio
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::command::{DEFAULT_ARGS, DEFAULT_PROGRAM, DEFAULT_TIMEOUT, RealCommandRunner};
use crate::error::{Error, Result};
use crate::reducer::ReductionConfig;

/// How to invoke the external test
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Program to execute
    pub program: String,
    /// Fixed arguments
    pub args: Vec<String>,
    /// Hard timeout per run in milliseconds
    pub timeout_ms: u64,
    /// Working directory for the oracle
    pub working_dir: Option<PathBuf>,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            program: DEFAULT_PROGRAM.to_string(),
            args: DEFAULT_ARGS.iter().map(ToString::to_string).collect(),
            timeout_ms: u64::try_from(DEFAULT_TIMEOUT.as_millis()).unwrap_or(8_000),
            working_dir: None,
        }
    }
}

impl OracleConfig {
    /// Build the process runner for this oracle
    #[must_use]
    pub fn runner(&self) -> RealCommandRunner {
        let runner = RealCommandRunner::new(&self.program)
            .with_args(self.args.iter().cloned())
            .with_timeout(Duration::from_millis(self.timeout_ms));
        match &self.working_dir {
            Some(dir) => runner.with_working_dir(dir),
            None => runner,
        }
    }
}

/// Complete description of a reduction run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Known-good parameter file
    pub baseline: PathBuf,
    /// Initial target parameter file
    pub target: PathBuf,
    /// File the oracle reads its configuration from
    pub materialize_path: PathBuf,
    /// File the best-known target is checkpointed to
    pub checkpoint_path: PathBuf,
    /// Oracle invocation
    pub oracle: OracleConfig,
    /// Loop tuning
    pub reduction: ReductionConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            baseline: PathBuf::from("z3.params.defaults"),
            target: PathBuf::from("z3.params.0"),
            materialize_path: PathBuf::from("z3.params"),
            checkpoint_path: PathBuf::from("z3.params.dd"),
            oracle: OracleConfig::default(),
            reduction: ReductionConfig::default(),
        }
    }
}

impl RunConfig {
    /// Load a configuration file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid YAML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse a configuration from YAML
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    /// Convert to YAML
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(Error::from)
    }

    /// Check the configuration before any file is touched
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        self.reduction.validate()?;
        if self.oracle.program.trim().is_empty() {
            return Err(Error::Config("oracle program is empty".to_string()));
        }
        if self.oracle.timeout_ms == 0 {
            return Err(Error::Config("oracle timeout must be non-zero".to_string()));
        }
        for input in [&self.baseline, &self.target] {
            if &self.materialize_path == input {
                return Err(Error::Config(format!(
                    "materialize path {} would overwrite an input file",
                    input.display()
                )));
            }
        }
        if self.checkpoint_path == self.baseline {
            return Err(Error::Config(format!(
                "checkpoint path {} would overwrite the baseline",
                self.baseline.display()
            )));
        }
        if self.checkpoint_path == self.materialize_path {
            return Err(Error::Config(
                "checkpoint and materialize paths must differ".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acceptance::EquivalenceMode;
    use crate::command::CommandRunner;

    #[test]
    fn test_defaults_target_z3_setup() {
        let config = RunConfig::default();
        assert_eq!(config.baseline, PathBuf::from("z3.params.defaults"));
        assert_eq!(config.target, PathBuf::from("z3.params.0"));
        assert_eq!(config.materialize_path, PathBuf::from("z3.params"));
        assert_eq!(config.checkpoint_path, PathBuf::from("z3.params.dd"));
        assert_eq!(config.oracle.timeout_ms, 8_000);
        assert_eq!(config.oracle.program, "./run-tests");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(RunConfig::from_yaml("").unwrap(), RunConfig::default());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r"
target: broken.params
oracle:
  program: make
  args: [check]
  timeout_ms: 2500
reduction:
  threshold: 2
  mode: symmetric
  seed: 17
";
        let config = RunConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.target, PathBuf::from("broken.params"));
        assert_eq!(config.baseline, PathBuf::from("z3.params.defaults"));
        assert_eq!(config.oracle.args, ["check"]);
        assert_eq!(config.reduction.threshold, 2);
        assert_eq!(config.reduction.mode, EquivalenceMode::Symmetric);
        assert_eq!(config.reduction.seed, Some(17));
        assert!((config.reduction.revert_probability - 0.1).abs() < f64::EPSILON);

        let runner = config.oracle.runner();
        assert_eq!(runner.describe(), "make check");
        assert_eq!(runner.timeout, Duration::from_millis(2500));
    }

    #[test]
    fn test_yaml_round_trip() {
        let mut config = RunConfig::default();
        config.reduction.max_iterations = Some(500);
        config.oracle.working_dir = Some(PathBuf::from("build"));
        let yaml = config.to_yaml().unwrap();
        assert_eq!(RunConfig::from_yaml(&yaml).unwrap(), config);
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(matches!(
            RunConfig::from_yaml("reduction: [1, 2"),
            Err(Error::YamlError(_))
        ));
    }

    #[test]
    fn test_validate_rejects_overwriting_inputs() {
        let config = RunConfig {
            materialize_path: PathBuf::from("z3.params.0"),
            ..RunConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let config = RunConfig {
            checkpoint_path: PathBuf::from("z3.params"),
            ..RunConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_oracle() {
        let mut config = RunConfig::default();
        config.oracle.timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = RunConfig::default();
        config.oracle.program = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            RunConfig::from_file(dir.path().join("absent.yaml")),
            Err(Error::IoError(_))
        ));
    }
}
