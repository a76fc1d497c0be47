//! paramdd
//!
//! Randomized delta debugging of `KEY = VALUE (TYPE)` parameter files: given
//! a known-good baseline and a target that differs in many keys, shrink the
//! set of differing keys while an external timing test keeps behaving the
//! same.
//!
//! The work is split across two crates, re-exported here:
//!
//! - [`model`]: the record format, positional diff and alignment checks
//! - [`runner`]: oracle execution, the equivalence rule, the reduction loop,
//!   checkpoints, configuration and reports

#![forbid(unsafe_code)]

pub use paramdd_model as model;
pub use paramdd_runner as runner;

pub use paramdd_model::{AlignedPair, Param, ParamSet};
pub use paramdd_runner::{Reducer, ReductionConfig, ReductionOutcome, RunConfig, StopReason};
