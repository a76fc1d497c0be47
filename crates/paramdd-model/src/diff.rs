//! Positional diffing of parameter sets
//!
//! Two sets are compared record by record, position by position. Both must
//! come from files with the same key order; anything else is a caller error
//! and is reported, never papered over by key lookup or truncation.

use crate::error::{Error, Result};
use crate::params::ParamSet;

/// Verify that `a` and `b` have the same length and the same key order
///
/// # Errors
///
/// Returns [`Error::LengthMismatch`] or [`Error::KeyMismatch`] for the
/// first disagreement found.
pub fn check_aligned(a: &ParamSet, b: &ParamSet) -> Result<()> {
    if a.len() != b.len() {
        return Err(Error::LengthMismatch {
            left: a.len(),
            right: b.len(),
        });
    }
    for (position, (left, right)) in a.iter().zip(b.iter()).enumerate() {
        if left.key != right.key {
            return Err(Error::KeyMismatch {
                position,
                left: left.key.clone(),
                right: right.key.clone(),
            });
        }
    }
    Ok(())
}

/// Keys whose value or type tag differ between `a` and `b`, in file order
///
/// # Errors
///
/// Returns [`Error::LengthMismatch`] if the sets differ in size and
/// [`Error::KeyMismatch`] if a position holds different keys.
pub fn diff(a: &ParamSet, b: &ParamSet) -> Result<Vec<String>> {
    check_aligned(a, b)?;
    Ok(a.iter()
        .zip(b.iter())
        .filter(|(left, right)| left != right)
        .map(|(left, _)| left.key.clone())
        .collect())
}

/// A baseline and a target known to share key order
///
/// Construction checks alignment once; every later target must pass the
/// same check before it is swapped in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignedPair {
    baseline: ParamSet,
    target: ParamSet,
}

impl AlignedPair {
    /// Pair a baseline with a target
    ///
    /// # Errors
    ///
    /// Returns an alignment error if the key sequences differ.
    pub fn new(baseline: ParamSet, target: ParamSet) -> Result<Self> {
        check_aligned(&baseline, &target)?;
        Ok(Self { baseline, target })
    }

    /// The known-good configuration
    #[must_use]
    pub fn baseline(&self) -> &ParamSet {
        &self.baseline
    }

    /// The current target configuration
    #[must_use]
    pub fn target(&self) -> &ParamSet {
        &self.target
    }

    /// Keys still differing from the baseline
    ///
    /// # Errors
    ///
    /// Only fails if the alignment invariant was broken, which the
    /// constructors prevent.
    pub fn diff(&self) -> Result<Vec<String>> {
        diff(&self.baseline, &self.target)
    }

    /// Copy of the target with `keys` reset to their baseline records
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownKey`] if a key is not in the baseline.
    pub fn revert<'k>(&self, keys: impl IntoIterator<Item = &'k str>) -> Result<ParamSet> {
        let mut candidate = self.target.clone();
        for key in keys {
            let record = self
                .baseline
                .get(key)
                .ok_or_else(|| Error::UnknownKey(key.to_string()))?;
            candidate.replace(key, record.clone())?;
        }
        Ok(candidate)
    }

    /// Swap in a new target after re-checking alignment
    ///
    /// # Errors
    ///
    /// Returns an alignment error, leaving the pair unchanged.
    pub fn set_target(&mut self, target: ParamSet) -> Result<ParamSet> {
        check_aligned(&self.baseline, &target)?;
        Ok(std::mem::replace(&mut self.target, target))
    }

    /// Split back into `(baseline, target)`
    #[must_use]
    pub fn into_parts(self) -> (ParamSet, ParamSet) {
        (self.baseline, self.target)
    }
}
