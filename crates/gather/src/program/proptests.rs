//! Property tests for batching invariants.

use std::collections::HashSet;
use std::sync::Arc;

use proptest::prelude::*;

use crate::program::{traverse, Query};
use crate::runtime::tests::mocks::MockSource;
use crate::runtime::Runtime;

fn source_with_limit(limit: Option<usize>) -> Arc<MockSource<u32, String>> {
    let source =
        MockSource::new("numbers").entries((0u32..64).map(|n| (n, n.to_string())));
    match limit {
        Some(limit) => source.max_batch(limit).shared(),
        None => source.shared(),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// No identity reaches a source twice within a run, and every batch
    /// respects the declared bound.
    #[test]
    fn prop_batches_are_deduplicated_and_bounded(
        ids in proptest::collection::vec(0u32..16, 1..40),
        limit in proptest::option::of(1usize..6),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let source = source_with_limit(limit);

        let values = rt
            .block_on(Runtime::new().run(traverse(ids.clone(), |n| Query::fetch(&source, n))))
            .unwrap();
        let batches = rt.block_on(source.batches());

        // Requested values come back in request order.
        let expected: Vec<String> = ids.iter().map(|n| n.to_string()).collect();
        prop_assert_eq!(values, expected);

        // Dedup across the whole run: batches and single fetches
        // together touch each identity at most once.
        let mut seen = HashSet::new();
        for batch in &batches {
            for id in batch {
                prop_assert!(seen.insert(*id), "identity {} fetched twice", id);
            }
        }

        // Batch bound.
        if let Some(limit) = limit {
            for batch in &batches {
                prop_assert!(batch.len() <= limit);
            }
        }
    }

    /// Round count tracks invocation waves, not requested identities:
    /// one wave of independent fetches is always a single round.
    #[test]
    fn prop_independent_fetches_run_in_one_round(
        ids in proptest::collection::vec(0u32..16, 1..40),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let source = source_with_limit(None);

        let (rounds, _) = rt
            .block_on(Runtime::new().run_log(traverse(ids, |n| Query::fetch(&source, n))))
            .unwrap();

        prop_assert_eq!(rounds.len(), 1);
    }

    /// Functor law, observationally: running `map(p, f)` equals running
    /// `p` and applying `f` outside.
    #[test]
    fn prop_map_commutes_with_run(ids in proptest::collection::vec(0u32..16, 1..20)) {
        let rt = tokio::runtime::Runtime::new().unwrap();

        let mapped = {
            let source = source_with_limit(None);
            rt.block_on(Runtime::new().run(
                traverse(ids.clone(), |n| Query::fetch(&source, n)).map(|values| values.len()),
            ))
            .unwrap()
        };
        let outside = {
            let source = source_with_limit(None);
            rt.block_on(Runtime::new().run(traverse(ids, |n| Query::fetch(&source, n))))
                .unwrap()
                .len()
        };

        prop_assert_eq!(mapped, outside);
    }
}
