//! Delay between reconcile passes after failures.

use std::time::Duration;
use rand::Rng;

use crate::config::schema::RetryConfig;

/// Delay before the pass following `failures` consecutive failed passes.
///
/// Doubles from `base_ms` per failure, capped at `max_ms`, plus up to 10%
/// jitter so several controllers do not retry against the proxy in lockstep.
pub fn pass_delay(failures: u32, base_ms: u64, max_ms: u64) -> Duration {
    if failures == 0 {
        return Duration::ZERO;
    }

    let factor = 1u64.checked_shl(failures - 1).unwrap_or(u64::MAX);
    let delay_ms = base_ms.saturating_mul(factor).min(max_ms);

    let spread = delay_ms / 10;
    let jitter = if spread > 0 {
        rand::thread_rng().gen_range(0..spread)
    } else {
        0
    };

    Duration::from_millis(delay_ms + jitter)
}

/// Counts consecutive failed passes of the reconcile loop.
#[derive(Debug, Clone)]
pub struct Backoff {
    base_ms: u64,
    max_ms: u64,
    failures: u32,
}

impl Backoff {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            base_ms: config.base_delay_ms,
            max_ms: config.max_delay_ms,
            failures: 0,
        }
    }

    /// Record a failed pass and return how long to wait before the next one.
    pub fn fail(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        pass_delay(self.failures, self.base_ms, self.max_ms)
    }

    /// A pass succeeded; the next failure starts from the base delay again.
    pub fn reset(&mut self) {
        self.failures = 0;
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_doubles_per_failure() {
        assert_eq!(pass_delay(0, 100, 2000), Duration::ZERO);

        let first = pass_delay(1, 100, 2000).as_millis();
        assert!((100..110).contains(&first));

        let third = pass_delay(3, 100, 2000).as_millis();
        assert!((400..440).contains(&third));
    }

    #[test]
    fn test_delay_is_capped() {
        let capped = pass_delay(10, 100, 1000).as_millis();
        assert!((1000..1100).contains(&capped));

        // shift overflow saturates instead of wrapping
        let huge = pass_delay(200, 500, 30_000).as_millis();
        assert!((30_000..33_000).contains(&huge));
    }

    #[test]
    fn test_backoff_resets_after_success() {
        let mut backoff = Backoff::new(&RetryConfig { base_delay_ms: 50, max_delay_ms: 400 });
        assert!(backoff.fail() >= Duration::from_millis(50));
        assert!(backoff.fail() >= Duration::from_millis(100));
        assert_eq!(backoff.failures(), 2);

        backoff.reset();
        assert_eq!(backoff.failures(), 0);
        assert!(backoff.fail() < Duration::from_millis(100));
    }
}
