//! paramdd
//!
//! Command-line interface for shrinking a parameter diff against a test.

#![allow(clippy::doc_markdown)]
#![allow(clippy::needless_pass_by_value)]

use clap::{Parser, Subcommand};
use paramdd_cli::{ReduceOverrides, build_run_config, diff_files, execute_reduction, init_tracing};
use paramdd_runner::StopReason;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Parser)]
#[command(name = "paramdd")]
#[command(about = "Delta-debug a parameter file against a timing test", long_about = None)]
#[command(version)]
struct Cli {
    /// Log every iteration
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Shrink the target's difference from the baseline
    Reduce {
        /// YAML run configuration
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Known-good parameter file
        #[arg(long)]
        baseline: Option<PathBuf>,

        /// Parameter file to reduce
        #[arg(long)]
        target: Option<PathBuf>,

        /// File the test reads its parameters from
        #[arg(long)]
        materialize: Option<PathBuf>,

        /// Where the current best target is saved
        #[arg(long)]
        checkpoint: Option<PathBuf>,

        /// Stop once this many keys still differ
        #[arg(long)]
        threshold: Option<usize>,

        /// Chance of reverting each differing key
        #[arg(long)]
        probability: Option<f64>,

        /// Relative timing tolerance
        #[arg(long)]
        tolerance: Option<f64>,

        /// Equivalence mode (ratio, symmetric)
        #[arg(long)]
        mode: Option<String>,

        /// Give up after this many iterations
        #[arg(long)]
        max_iterations: Option<u64>,

        /// Seed for a reproducible run
        #[arg(long)]
        seed: Option<u64>,

        /// Per-run timeout of the test in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Working directory for the test command
        #[arg(long)]
        working_dir: Option<PathBuf>,

        /// Continue from an existing checkpoint
        #[arg(long)]
        resume: bool,

        /// Write a JSON report here
        #[arg(long)]
        report: Option<PathBuf>,

        /// Test command and its arguments
        #[arg(last = true, value_name = "COMMAND")]
        command: Vec<String>,
    },

    /// List keys whose records differ between two files
    Diff {
        /// First parameter file
        a: PathBuf,

        /// Second parameter file
        b: PathBuf,
    },
}

/// First SIGINT stops the loop after reaping the running test; a second one
/// exits immediately.
fn setup_signal_handler(cancel: Arc<AtomicBool>) {
    if let Err(e) = ctrlc::set_handler(move || {
        let count = paramdd_runner::process::kill_all_registered();
        if cancel.swap(true, Ordering::SeqCst) {
            eprintln!("\nSIGINT received again, exiting.");
            std::process::exit(130); // 128 + SIGINT(2)
        }
        eprintln!("\nSIGINT received. Reaped {count} child process(es), stopping after this iteration...");
    }) {
        eprintln!("Warning: Failed to set signal handler: {e}");
    }
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    if let Err(e) = init_tracing(level) {
        eprintln!("Warning: Failed to initialize logging: {e}");
    }

    match cli.command {
        Commands::Reduce {
            config,
            baseline,
            target,
            materialize,
            checkpoint,
            threshold,
            probability,
            tolerance,
            mode,
            max_iterations,
            seed,
            timeout_ms,
            working_dir,
            resume,
            report,
            command,
        } => {
            let overrides = ReduceOverrides {
                baseline,
                target,
                materialize,
                checkpoint,
                threshold,
                probability,
                tolerance,
                mode,
                max_iterations,
                seed,
                timeout_ms,
                working_dir,
                command,
            };
            run_reduce(config, overrides, resume, report);
        }
        Commands::Diff { a, b } => match diff_files(&a, &b) {
            Ok(keys) => {
                for key in keys {
                    println!("{key}");
                }
            }
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        },
    }
}

fn run_reduce(
    config: Option<PathBuf>,
    overrides: ReduceOverrides,
    resume: bool,
    report_path: Option<PathBuf>,
) {
    let run_config = match build_run_config(config.as_deref(), &overrides) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let cancel = Arc::new(AtomicBool::new(false));
    setup_signal_handler(cancel.clone());

    let run = match execute_reduction(&run_config, resume, cancel) {
        Ok(run) => run,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    if let Some(path) = report_path {
        if let Err(e) = run.report.save(&path) {
            eprintln!("Error writing report {}: {e}", path.display());
            std::process::exit(1);
        }
    }

    println!(
        "{} key(s) still differ after {} iteration(s) (seed {})",
        run.outcome.diff.len(),
        run.outcome.stats.iterations,
        run.seed
    );
    if run.outcome.stats.iterations > 0 {
        println!("Best target: {}", run_config.checkpoint_path.display());
    }
    for key in &run.outcome.diff {
        println!("  {key}");
    }

    if run.outcome.stop_reason == StopReason::Cancelled {
        std::process::exit(130);
    }
}
