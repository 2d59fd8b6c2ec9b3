//! Property tests for task sharding and retry backoff.
//!
//! 1. Chunks partition the input in order, with no gaps or overlaps
//! 2. Backoff delays never exceed their ceiling, which never exceeds the cap

use etfscope_runner::{list_chunk, RetryPolicy};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;

proptest! {
    #[test]
    fn chunks_partition_the_input(len in 0usize..200, count in 1usize..20) {
        let items: Vec<usize> = (0..len).collect();
        let mut rebuilt = Vec::new();
        let size = len.div_ceil(count);
        for idx in 0..count {
            let chunk = list_chunk(&items, idx, count).unwrap();
            prop_assert!(chunk.len() <= size);
            rebuilt.extend_from_slice(chunk);
        }
        prop_assert_eq!(rebuilt, items);
    }

    #[test]
    fn out_of_range_index_is_rejected(len in 0usize..50, count in 1usize..10, extra in 0usize..5) {
        let items: Vec<usize> = (0..len).collect();
        prop_assert!(list_chunk(&items, count + extra, count).is_err());
    }

    #[test]
    fn delays_stay_under_the_cap(
        base_ms in 0u64..5_000,
        max_ms in 0u64..120_000,
        attempt in 1u32..64,
        seed in any::<u64>(),
    ) {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(base_ms),
            max_delay: Duration::from_millis(max_ms),
        };
        let ceiling = policy.backoff_ceiling(attempt);
        prop_assert!(ceiling <= policy.max_delay);
        let mut rng = StdRng::seed_from_u64(seed);
        prop_assert!(policy.delay_for(attempt, &mut rng) <= ceiling);
    }
}
