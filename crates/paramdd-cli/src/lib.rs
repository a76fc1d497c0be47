//! paramdd CLI library
//!
//! Library functions behind the `paramdd` binary: configuration assembly,
//! input loading, and the reduction run itself.

#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
// Allow common patterns in test code
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

use paramdd_model::{AlignedPair, ParamSet};
use paramdd_runner::{
    CommandOracle, CommandRunner, EquivalenceMode, Error, ReductionOutcome, ReductionReport,
    Reducer, Result, RunConfig, checkpoint,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tracing::info;

/// Command-line values that override the configuration file
#[derive(Debug, Clone, Default)]
pub struct ReduceOverrides {
    /// Baseline parameter file
    pub baseline: Option<PathBuf>,
    /// Initial target parameter file
    pub target: Option<PathBuf>,
    /// File the oracle reads
    pub materialize: Option<PathBuf>,
    /// Checkpoint file
    pub checkpoint: Option<PathBuf>,
    /// Stop threshold
    pub threshold: Option<usize>,
    /// Per-key revert probability
    pub probability: Option<f64>,
    /// Equivalence tolerance
    pub tolerance: Option<f64>,
    /// Equivalence mode name
    pub mode: Option<String>,
    /// Iteration cap
    pub max_iterations: Option<u64>,
    /// RNG seed
    pub seed: Option<u64>,
    /// Oracle timeout in milliseconds
    pub timeout_ms: Option<u64>,
    /// Oracle working directory
    pub working_dir: Option<PathBuf>,
    /// Oracle program followed by its arguments
    pub command: Vec<String>,
}

/// Parse an equivalence mode name
pub fn parse_mode(mode: &str) -> Result<EquivalenceMode> {
    mode.parse().map_err(Error::Config)
}

/// Merge the optional config file with command-line overrides
pub fn build_run_config(config_file: Option<&Path>, overrides: &ReduceOverrides) -> Result<RunConfig> {
    let mut config = match config_file {
        Some(path) => RunConfig::from_file(path)?,
        None => RunConfig::default(),
    };
    let o = overrides.clone();

    if let Some(p) = o.baseline {
        config.baseline = p;
    }
    if let Some(p) = o.target {
        config.target = p;
    }
    if let Some(p) = o.materialize {
        config.materialize_path = p;
    }
    if let Some(p) = o.checkpoint {
        config.checkpoint_path = p;
    }
    if let Some(t) = o.threshold {
        config.reduction.threshold = t;
    }
    if let Some(p) = o.probability {
        config.reduction.revert_probability = p;
    }
    if let Some(t) = o.tolerance {
        config.reduction.tolerance = t;
    }
    if let Some(mode) = o.mode {
        config.reduction.mode = parse_mode(&mode)?;
    }
    if o.max_iterations.is_some() {
        config.reduction.max_iterations = o.max_iterations;
    }
    if o.seed.is_some() {
        config.reduction.seed = o.seed;
    }
    if let Some(ms) = o.timeout_ms {
        config.oracle.timeout_ms = ms;
    }
    if o.working_dir.is_some() {
        config.oracle.working_dir = o.working_dir;
    }
    if let Some((program, args)) = o.command.split_first() {
        config.oracle.program.clone_from(program);
        config.oracle.args = args.to_vec();
    }

    config.validate()?;
    Ok(config)
}

/// Load baseline and target, optionally resuming from the checkpoint
///
/// Returns the aligned pair and whether the target came from the checkpoint.
pub fn load_pair(config: &RunConfig, resume: bool) -> Result<(AlignedPair, bool)> {
    let baseline = ParamSet::from_file(&config.baseline)?;
    let resumed = if resume {
        checkpoint::load_resume(&config.checkpoint_path, &baseline)?
    } else {
        None
    };
    let (target, from_checkpoint) = match resumed {
        Some(target) => {
            info!(path = %config.checkpoint_path.display(), "Resuming from checkpoint");
            (target, true)
        }
        None => (ParamSet::from_file(&config.target)?, false),
    };
    let pair = AlignedPair::new(baseline, target).map_err(|e| {
        e.in_file(if from_checkpoint {
            &config.checkpoint_path
        } else {
            &config.target
        })
    })?;
    Ok((pair, from_checkpoint))
}

/// Outcome of [`execute_reduction`]
#[derive(Debug)]
pub struct ReductionRun {
    /// Loop result
    pub outcome: ReductionOutcome,
    /// Seed used
    pub seed: u64,
    /// Whether the run resumed from a checkpoint
    pub resumed: bool,
    /// Report of the run
    pub report: ReductionReport,
}

/// Run the reduction described by `config` against its real oracle
pub fn execute_reduction(
    config: &RunConfig,
    resume: bool,
    cancel: Arc<AtomicBool>,
) -> Result<ReductionRun> {
    let runner = config.oracle.runner();
    let describe = runner.describe();
    let oracle = CommandOracle::new(&config.materialize_path, runner);
    execute_with_oracle(config, resume, cancel, oracle, describe)
}

/// Run the reduction with a caller-supplied oracle
pub fn execute_with_oracle<O: paramdd_runner::Oracle>(
    config: &RunConfig,
    resume: bool,
    cancel: Arc<AtomicBool>,
    oracle: O,
    describe: String,
) -> Result<ReductionRun> {
    let (pair, resumed) = load_pair(config, resume)?;
    let (seed, rng) = config.reduction.rng();
    info!(
        seed,
        oracle = %describe,
        baseline = %config.baseline.display(),
        "Loaded {} parameters",
        pair.baseline().len()
    );

    let outcome = Reducer::new(config.reduction.clone(), pair, oracle, rng)?
        .with_checkpoint(&config.checkpoint_path)
        .with_cancel_flag(cancel)
        .run()?;
    let report = ReductionReport::new(&outcome, &config.reduction, seed, describe);
    Ok(ReductionRun {
        outcome,
        seed,
        resumed,
        report,
    })
}

/// Keys that differ between two parameter files
pub fn diff_files(a: &Path, b: &Path) -> Result<Vec<String>> {
    let left = ParamSet::from_file(a)?;
    let right = ParamSet::from_file(b)?;
    paramdd_model::diff(&left, &right)
        .map_err(|e| e.in_file(b))
        .map_err(Error::from)
}

/// Initialize structured logging with `RUST_LOG` override support
pub fn init_tracing(default_level: &str) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init()
}
