//! Proptest strategies for parameter sets
//!
//! Generated keys, values and type tags stay inside the record format's
//! unescaped alphabet so that every generated set survives a dump/load.

use crate::params::{Param, ParamSet};
use proptest::prelude::*;
use std::ops::Range;

/// Strategy for parameter keys (dotted, solver-style names)
pub fn key_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,6}(\\.[a-z][a-z0-9_]{0,6}){0,2}"
}

/// Strategy for raw values
pub fn value_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        (0u32..10_000).prop_map(|n| n.to_string()),
        Just("true".to_string()),
        Just("false".to_string()),
        "[a-z_]{1,10}",
        Just(String::new()),
    ]
}

/// Strategy for type tags
pub fn ttype_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec![
        "bool",
        "unsigned int",
        "double",
        "symbol",
        "string",
    ])
    .prop_map(str::to_string)
}

/// Strategy for a set with unique keys and a record count in `size`
pub fn param_set_strategy(size: Range<usize>) -> impl Strategy<Value = ParamSet> {
    prop::collection::btree_set(key_strategy(), size).prop_flat_map(|keys| {
        let n = keys.len();
        (
            Just(keys.into_iter().collect::<Vec<_>>()),
            prop::collection::vec(value_strategy(), n),
            prop::collection::vec(ttype_strategy(), n),
        )
            .prop_map(|(keys, values, ttypes)| {
                let records = keys
                    .into_iter()
                    .zip(values)
                    .zip(ttypes)
                    .map(|((k, v), t)| Param::new(k, v, t));
                // Keys come from a set, so this cannot fail
                ParamSet::from_records(records).unwrap_or_default()
            })
    })
}

/// Strategy for `(baseline, target, changed_positions)`
///
/// The target shares the baseline's key order and differs exactly at the
/// positions listed, which are in ascending order.
pub fn aligned_pair_strategy(
    size: Range<usize>,
) -> impl Strategy<Value = (ParamSet, ParamSet, Vec<usize>)> {
    param_set_strategy(size).prop_flat_map(|base| {
        let n = base.len();
        (Just(base), prop::collection::vec(any::<bool>(), n)).prop_map(|(base, flags)| {
            let mut target = base.clone();
            let mut changed = Vec::new();
            for (position, flip) in flags.into_iter().enumerate() {
                if !flip {
                    continue;
                }
                let mut record = base.records()[position].clone();
                record.value.push('1');
                let key = record.key.clone();
                if target.replace(&key, record).is_ok() {
                    changed.push(position);
                }
            }
            (base, target, changed)
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::strategy::ValueTree;
    use proptest::test_runner::TestRunner;

    #[test]
    fn test_param_set_strategy_respects_size() {
        let mut runner = TestRunner::default();
        for _ in 0..50 {
            let set = param_set_strategy(3..8)
                .new_tree(&mut runner)
                .expect("Failed to generate")
                .current();
            assert!((3..8).contains(&set.len()));
        }
    }

    #[test]
    fn test_aligned_pair_strategy_keeps_key_order() {
        let mut runner = TestRunner::default();
        for _ in 0..50 {
            let (base, target, changed) = aligned_pair_strategy(1..10)
                .new_tree(&mut runner)
                .expect("Failed to generate")
                .current();
            assert!(base.keys().eq(target.keys()));
            assert!(changed.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn test_key_strategy_has_no_separator() {
        let mut runner = TestRunner::default();
        for _ in 0..100 {
            let key = key_strategy()
                .new_tree(&mut runner)
                .expect("Failed to generate")
                .current();
            assert!(!key.contains(' '));
            assert!(!key.is_empty());
        }
    }
}
