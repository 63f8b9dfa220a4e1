use std::time::Duration;

use anyhow::Result;

use crate::cancel::CancelToken;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Bounded retry with a fixed delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

#[derive(Debug)]
pub enum RetryOutcome<T> {
    Succeeded { value: T, attempts: u32 },
    Exhausted { error: anyhow::Error, attempts: u32 },
    Cancelled { attempts: u32 },
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Calls `attempt` with the 1-based attempt number until it succeeds, the
    /// attempts run out, or `cancel` fires. `on_retry` sees each failure that
    /// will be followed by another attempt.
    pub fn run<T>(
        &self,
        cancel: &CancelToken,
        mut attempt: impl FnMut(u32) -> Result<T>,
        mut on_retry: impl FnMut(u32, &anyhow::Error),
    ) -> RetryOutcome<T> {
        let max_attempts = self.max_attempts.max(1);
        let mut attempts = 0;
        loop {
            if cancel.is_cancelled() {
                return RetryOutcome::Cancelled { attempts };
            }
            attempts += 1;
            match attempt(attempts) {
                Ok(value) => return RetryOutcome::Succeeded { value, attempts },
                Err(error) => {
                    if attempts >= max_attempts {
                        return RetryOutcome::Exhausted { error, attempts };
                    }
                    on_retry(attempts, &error);
                    if !cancel.wait(self.delay) {
                        return RetryOutcome::Cancelled { attempts };
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use anyhow::anyhow;

    use super::{RetryOutcome, RetryPolicy};
    use crate::cancel::CancelToken;

    #[test]
    fn default_policy_is_four_attempts_one_second_apart() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.delay, Duration::from_secs(1));
    }

    #[test]
    fn succeeds_after_transient_failures() {
        let policy = RetryPolicy::new(4, Duration::from_millis(5));
        let mut retries = Vec::new();
        let outcome = policy.run(
            &CancelToken::new(),
            |attempt| {
                if attempt < 3 {
                    Err(anyhow!("attempt {attempt} failed"))
                } else {
                    Ok(attempt * 10)
                }
            },
            |attempt, _| retries.push(attempt),
        );
        match outcome {
            RetryOutcome::Succeeded { value, attempts } => {
                assert_eq!(value, 30);
                assert_eq!(attempts, 3);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(retries, vec![1, 2]);
    }

    #[test]
    fn exhausts_with_spacing_between_attempts() {
        let policy = RetryPolicy::new(4, Duration::from_millis(20));
        let mut stamps = Vec::new();
        let outcome: RetryOutcome<()> = policy.run(
            &CancelToken::new(),
            |_| {
                stamps.push(Instant::now());
                Err(anyhow!("decode failed"))
            },
            |_, _| {},
        );
        match outcome {
            RetryOutcome::Exhausted { error, attempts } => {
                assert_eq!(attempts, 4);
                assert_eq!(error.to_string(), "decode failed");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(stamps.len(), 4);
        for pair in stamps.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(20));
        }
    }

    #[test]
    fn cancellation_stops_before_next_attempt() {
        let policy = RetryPolicy::new(4, Duration::from_secs(30));
        let cancel = CancelToken::new();
        let mut calls = 0;
        let outcome: RetryOutcome<()> = policy.run(
            &cancel,
            |_| {
                calls += 1;
                Err(anyhow!("boom"))
            },
            |_, _| cancel.cancel(),
        );
        assert!(matches!(outcome, RetryOutcome::Cancelled { attempts: 1 }));
        assert_eq!(calls, 1);
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        let policy = RetryPolicy::new(0, Duration::from_millis(1));
        assert_eq!(policy.max_attempts, 1);
    }
}
