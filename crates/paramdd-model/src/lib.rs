//! paramdd parameter model
//!
//! Ordered `KEY = VALUE (TYPE)` parameter sets and the positional diff that
//! the reduction loop is built on.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
// Allow common patterns
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
// Allow common patterns in test code
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::redundant_clone))]

pub mod diff;
pub mod error;
pub mod params;
pub mod proptest_impl;

pub use diff::{AlignedPair, check_aligned, diff};
pub use error::{Error, Result};
pub use params::{Param, ParamSet};
