//! Bounded retry with jittered backoff for transient conflicts.

use std::thread;
use std::time::Duration;

use rand::Rng;

/// Local retry policy for optimistic-lock and counter-reservation races.
///
/// Only transient failures are retried; deterministic errors surface on the
/// first attempt. The delay grows linearly per attempt with a random jitter
/// so two racing writers do not collide again in lockstep. Total sleep across
/// a full retry budget stays well under 100ms; callers may sit on an async
/// worker thread.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
        }
    }
}

impl RetryPolicy {
    /// Run `op`, retrying while `is_transient` holds and attempts remain.
    pub fn run<T, E>(
        &self,
        mut op: impl FnMut() -> Result<T, E>,
        is_transient: impl Fn(&E) -> bool,
    ) -> Result<T, E> {
        let mut attempt = 1u32;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_attempts && is_transient(&e) => {
                    let jitter_ms = rand::thread_rng()
                        .gen_range(0..=self.base_delay.as_millis().max(1) as u64);
                    thread::sleep(self.base_delay * attempt + Duration::from_millis(jitter_ms));
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_failures_are_retried_until_success() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(0),
        };
        let mut calls = 0u32;
        let result: Result<u32, &str> = policy.run(
            || {
                calls += 1;
                if calls < 3 { Err("busy") } else { Ok(calls) }
            },
            |_| true,
        );
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn deterministic_failures_are_not_retried() {
        let policy = RetryPolicy::default();
        let mut calls = 0u32;
        let result: Result<(), &str> = policy.run(
            || {
                calls += 1;
                Err("invalid")
            },
            |_| false,
        );
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn exhaustion_surfaces_the_last_error() {
        let policy = RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_millis(0),
        };
        let mut calls = 0u32;
        let result: Result<(), &str> = policy.run(
            || {
                calls += 1;
                Err("busy")
            },
            |_| true,
        );
        assert!(result.is_err());
        assert_eq!(calls, 2);
    }
}
