//! Backoff schedule property tests

use chainpay::retry::{PollBackoff, RetryConfig};
use proptest::prelude::*;

proptest! {
    #[test]
    fn poll_delay_never_exceeds_ceiling(
        attempt in 0u32..64,
        initial in 100u64..5_000,
        jitter in 0u64..2_000,
    ) {
        let backoff = PollBackoff::new(initial, 10_000, jitter);
        let delay = backoff.delay_for(attempt);
        prop_assert!(delay.as_millis() <= 10_000);
    }

    #[test]
    fn retry_delay_respects_cap(attempt in 0u32..32) {
        let config = RetryConfig {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 5_000,
            jitter_ms: 1_000,
        };
        let delay = config.delay_for(attempt);
        // Exponential part capped at max_delay_ms; jitter rides on top.
        prop_assert!(delay.as_millis() as u64 <= 5_000 + 1_000);
    }
}

#[test]
fn poll_expected_delay_is_non_decreasing() {
    let backoff = PollBackoff::new(1_000, 10_000, 1_000);
    let mut previous = 0;
    for attempt in 0..40 {
        let expected = backoff.expected_delay_ms(attempt);
        assert!(
            expected >= previous,
            "attempt {attempt}: {expected} < {previous}"
        );
        previous = expected;
    }
}

#[test]
fn poll_expected_delay_saturates_at_ceiling() {
    let backoff = PollBackoff::new(1_000, 10_000, 0);
    // 1000 * 1.5^6 = 11390 > 10000, so attempt 6 onward sits at the cap.
    assert_eq!(backoff.expected_delay_ms(6), 10_000);
    assert_eq!(backoff.expected_delay_ms(30), 10_000);
}

#[test]
fn retry_delay_doubles_each_attempt() {
    let config = RetryConfig {
        max_attempts: 5,
        base_delay_ms: 500,
        max_delay_ms: 60_000,
        jitter_ms: 0,
    };
    assert_eq!(config.delay_for(0).as_millis(), 500);
    assert_eq!(config.delay_for(1).as_millis(), 1_000);
    assert_eq!(config.delay_for(2).as_millis(), 2_000);
    assert_eq!(config.delay_for(3).as_millis(), 4_000);
}
