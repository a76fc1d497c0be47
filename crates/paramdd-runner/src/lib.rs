//! paramdd runner
//!
//! Drives the randomized reduction of a parameter diff against an external,
//! noisy test oracle: process execution with a hard timeout, the timing
//! equivalence rule, the reduction loop itself, and its checkpoints.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
// Allow common patterns
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::float_cmp)]
// Allow common patterns in test code
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::redundant_clone))]
#![cfg_attr(test, allow(clippy::cast_sign_loss))]

pub mod acceptance;
pub mod checkpoint;
pub mod command;
pub mod config;
pub mod error;
pub mod oracle;
pub mod process;
pub mod reducer;
pub mod report;

pub use acceptance::{EquivalenceMode, EquivalenceRule, Rejection, Verdict};
pub use command::{CommandOutcome, CommandRunner, MockCommandRunner, RealCommandRunner};
pub use config::{OracleConfig, RunConfig};
pub use error::{Error, Result};
pub use oracle::{CommandOracle, Cost, Oracle, RejectReason};
pub use reducer::{
    IterationRecord, ReductionConfig, ReductionOutcome, ReductionStats, Reducer, StopReason,
};
pub use report::ReductionReport;
