//! Per-item retry policy: bounded attempts, randomized exponential backoff and
//! a predicate deciding which errors are worth another attempt.

use etfscope_core::Classify;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::time::Duration;
use tracing::info;

/// Retry parameters as they appear in the `[retry]` config table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetrySettings::default().policy()
    }
}

/// Outcome of [`RetryPolicy::run`]: the final result and how many attempts it took.
#[derive(Debug)]
pub struct Attempts<T, E> {
    pub result: Result<T, E>,
    pub attempts: u32,
}

impl RetryPolicy {
    /// No waiting between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Upper bound of the wait after failed attempt `attempt` (1-based):
    /// `base * 2^(attempt - 1)`, capped.
    pub fn backoff_ceiling(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// A uniformly random wait in `[0, backoff_ceiling(attempt)]`.
    pub fn delay_for<R: Rng>(&self, attempt: u32, rng: &mut R) -> Duration {
        let ceiling = self.backoff_ceiling(attempt).as_millis() as u64;
        if ceiling == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rng.gen_range(0..=ceiling))
    }

    /// The jittered delay, raised to a server-requested `floor`. Never above `max_delay`.
    pub fn wait_before_retry<R: Rng>(
        &self,
        attempt: u32,
        floor: Option<Duration>,
        rng: &mut R,
    ) -> Duration {
        let delay = self.delay_for(attempt, rng);
        match floor {
            Some(floor) => delay.max(floor.min(self.max_delay)),
            None => delay,
        }
    }

    /// Run `op` until it succeeds, fails with an error `retryable` rejects, or
    /// the attempt budget is spent. `op` receives the 1-based attempt number.
    pub fn run_if<T, E, F, P>(&self, label: &str, op: F, retryable: P) -> Attempts<T, E>
    where
        E: Display,
        F: FnMut(u32) -> Result<T, E>,
        P: Fn(&E) -> bool,
    {
        self.run_with(label, op, retryable, |_| None)
    }

    /// [`run_if`](Self::run_if) with the error taxonomy deciding what is retryable
    /// and a rate limit's `Retry-After` as the minimum wait.
    pub fn run<T, E, F>(&self, label: &str, op: F) -> Attempts<T, E>
    where
        E: Display + Classify,
        F: FnMut(u32) -> Result<T, E>,
    {
        self.run_with(label, op, |e: &E| e.is_retryable(), |e: &E| e.retry_after())
    }

    fn run_with<T, E, F, P, W>(&self, label: &str, mut op: F, retryable: P, floor: W) -> Attempts<T, E>
    where
        E: Display,
        F: FnMut(u32) -> Result<T, E>,
        P: Fn(&E) -> bool,
        W: Fn(&E) -> Option<Duration>,
    {
        let mut rng = rand::thread_rng();
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(value) => {
                    return Attempts {
                        result: Ok(value),
                        attempts: attempt,
                    }
                }
                Err(e) if attempt < self.max_attempts && retryable(&e) => {
                    let delay = self.wait_before_retry(attempt, floor(&e), &mut rng);
                    info!(
                        item = label,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying after failure"
                    );
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                    attempt += 1;
                }
                Err(e) => {
                    return Attempts {
                        result: Err(e),
                        attempts: attempt,
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use etfscope_core::domain::Provider;
    use etfscope_core::FetchError;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn backoff_grows_then_caps() {
        let p = RetrySettings::default().policy();
        assert_eq!(p.backoff_ceiling(1), Duration::from_secs(1));
        assert_eq!(p.backoff_ceiling(2), Duration::from_secs(2));
        assert_eq!(p.backoff_ceiling(3), Duration::from_secs(4));
        assert_eq!(p.backoff_ceiling(7), Duration::from_secs(60));
        assert_eq!(p.backoff_ceiling(40), Duration::from_secs(60));

        let mut rng = StdRng::seed_from_u64(7);
        for attempt in 1..6 {
            assert!(p.delay_for(attempt, &mut rng) <= p.backoff_ceiling(attempt));
        }
    }

    #[test]
    fn server_wait_is_a_capped_floor() {
        let p = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::ZERO,
            max_delay: Duration::from_secs(60),
        };
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(p.wait_before_retry(1, None, &mut rng), Duration::ZERO);
        assert_eq!(
            p.wait_before_retry(1, Some(Duration::from_secs(7)), &mut rng),
            Duration::from_secs(7)
        );
        assert_eq!(
            p.wait_before_retry(1, Some(Duration::from_secs(600)), &mut rng),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn rate_limited_attempts_sleep_at_least_the_floor() {
        let p = RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::ZERO,
            max_delay: Duration::from_millis(30),
        };
        let started = std::time::Instant::now();
        let outcome = p.run("SPY", |attempt| {
            if attempt == 1 {
                Err(FetchError::RateLimited { retry_after_secs: 5 })
            } else {
                Ok(attempt)
            }
        });
        assert_eq!(outcome.result.unwrap(), 2);
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn transient_errors_are_retried_until_success() {
        let outcome = RetryPolicy::immediate(3).run("IVV", |attempt| {
            if attempt < 2 {
                Err(FetchError::Network("connection reset".into()))
            } else {
                Ok(attempt)
            }
        });
        assert_eq!(outcome.result.unwrap(), 2);
        assert_eq!(outcome.attempts, 2);
    }

    #[test]
    fn budget_is_respected() {
        let mut calls = 0;
        let outcome: Attempts<(), _> = RetryPolicy::immediate(3).run("IVV", |_| {
            calls += 1;
            Err(FetchError::HttpStatus {
                status: 503,
                url: "http://x".into(),
            })
        });
        assert!(outcome.result.is_err());
        assert_eq!(outcome.attempts, 3);
        assert_eq!(calls, 3);
    }

    #[test]
    fn invalid_parameters_fail_immediately() {
        let mut calls = 0;
        let outcome: Attempts<(), _> = RetryPolicy::immediate(3).run("SPY", |_| {
            calls += 1;
            Err(FetchError::UnsupportedQuery {
                provider: Provider::SSGA,
                reason: "latest only".into(),
            })
        });
        assert_eq!(outcome.attempts, 1);
        assert_eq!(calls, 1);
    }

    #[test]
    fn custom_predicate() {
        let outcome: Attempts<(), String> =
            RetryPolicy::immediate(5).run_if("x", |_| Err("nope".to_string()), |_| false);
        assert_eq!(outcome.attempts, 1);
    }

    #[test]
    fn settings_deserialize_partially() {
        let s: RetrySettings = toml::from_str("max_attempts = 5").unwrap();
        assert_eq!(s.max_attempts, 5);
        assert_eq!(s.max_delay_ms, 60_000);
    }
}
