//! Generic bounded-attempt retry engine with pluggable backoff and predicates.
//!
//! This crate has no knowledge of HTTP or of any particular wire protocol —
//! it retries an arbitrary async thunk parameterized by attempt number. The
//! caller supplies the predicate that decides whether a given error is worth
//! retrying; callers with their own error enum implement [`RetryClassify`]
//! on it and pass [`version_conflict`] or [`connection_transient`] (or any
//! other closure) as the predicate.
//!
//! # Example
//!
//! ```no_run
//! use dataplane_retry::{retry, Backoff, RetryConfig};
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() {
//! let config = RetryConfig {
//!     max_attempts: 4,
//!     backoff: Backoff::Exponential,
//!     base_delay: Duration::from_millis(100),
//! };
//! let cancel = CancellationToken::new();
//! let result = retry(&config, &cancel, |_e: &&str| true, |attempt| async move {
//!     if attempt < 3 { Err("transient") } else { Ok("done") }
//! }).await;
//! assert_eq!(result.unwrap(), "done");
//! # }
//! ```

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Backoff strategy between attempts. `Linear` is, per the table this crate
/// implements, a *constant* delay equal to `base_delay` — not `base_delay *
/// attempt` — distinguishing it from `None` only in that it is nonzero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    /// No delay between attempts.
    None,
    /// Constant delay equal to `base_delay` on every attempt.
    #[default]
    Linear,
    /// `base_delay * 2^(attempt - 1)`.
    Exponential,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay() -> Duration {
    Duration::from_millis(100)
}

/// Configuration for a bounded retry loop. Zero or unset fields collapse to
/// documented defaults on deserialize; callers constructing this in code are
/// expected to set `max_attempts` explicitly since `0` would never attempt
/// the operation at all (`retry` treats it as `1`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts, inclusive of the first. Must be >= 1.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Backoff strategy applied between attempts.
    #[serde(default)]
    pub backoff: Backoff,
    /// Base delay used by the `Linear` and `Exponential` strategies.
    #[serde(default = "default_base_delay", with = "humantime_serde")]
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff: Backoff::default(),
            base_delay: default_base_delay(),
        }
    }
}

/// Compute the delay before the next attempt, given the attempt number just
/// completed (1-indexed).
pub fn calculate_delay(config: &RetryConfig, attempt: u32) -> Duration {
    match config.backoff {
        Backoff::None => Duration::ZERO,
        Backoff::Linear => config.base_delay,
        Backoff::Exponential => {
            let pow = attempt.saturating_sub(1).min(16);
            config.base_delay.saturating_mul(2_u32.saturating_pow(pow))
        }
    }
}

/// Outcome of an exhausted or cancelled retry loop.
///
/// `Failed` carries the *raw* underlying error verbatim — the retry engine
/// itself never wraps an exhausted error; that's a decision left to callers
/// such as a version adapter that wants a "retries exhausted" wrapper of its
/// own (see `dataplane-client`).
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// The cancellation token fired before or during an attempt.
    #[error("retry loop cancelled")]
    Cancelled,
    /// The predicate rejected the error, or the last attempt was reached.
    #[error(transparent)]
    Failed(#[from] E),
}

/// Classifies a caller's error type against the two retry predicates this
/// crate ships. Implement this on your own error enum to reuse
/// [`version_conflict`] and [`connection_transient`] instead of hand-rolling
/// the predicate closure at every call site.
pub trait RetryClassify {
    /// True if this error represents an optimistic-lock version conflict.
    fn is_version_conflict(&self) -> bool {
        false
    }
    /// True if this error represents a transient connection failure
    /// (connection refused, connection reset, DNS lookup failure, dial
    /// error), whether carried as a structured value or as a substring of
    /// an opaque message. Must never be true for HTTP status errors,
    /// authentication errors, parse errors, or cancellation.
    fn is_connection_transient(&self) -> bool {
        false
    }
}

/// Predicate: retry only on a version-conflict error.
pub fn version_conflict<E: RetryClassify>(err: &E) -> bool {
    err.is_version_conflict()
}

/// Predicate: retry only on a transient connection failure.
pub fn connection_transient<E: RetryClassify>(err: &E) -> bool {
    err.is_connection_transient()
}

/// Run `operation` up to `config.max_attempts` times.
///
/// Before each attempt, and again before sleeping out a backoff delay,
/// `cancel` is checked; a fired token aborts the loop with
/// [`RetryError::Cancelled`] without starting another attempt. On failure
/// the `predicate` decides whether the error is retryable; a rejected
/// predicate or an exhausted attempt budget returns
/// [`RetryError::Failed`] wrapping the last error verbatim.
pub async fn retry<T, E, Fut, F, P>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    predicate: P,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled);
        }

        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= max_attempts || !predicate(&err) {
                    return Err(RetryError::Failed(err));
                }

                let delay = calculate_delay(config, attempt);
                if delay > Duration::ZERO {
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                    }
                }
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum TestError {
        VersionConflict,
        ConnectionRefused,
        Parse,
    }

    impl RetryClassify for TestError {
        fn is_version_conflict(&self) -> bool {
            matches!(self, TestError::VersionConflict)
        }
        fn is_connection_transient(&self) -> bool {
            matches!(self, TestError::ConnectionRefused)
        }
    }

    #[test]
    fn calculate_delay_none_is_always_zero() {
        let config = RetryConfig {
            max_attempts: 4,
            backoff: Backoff::None,
            base_delay: Duration::from_millis(100),
        };
        for attempt in 1..=4 {
            assert_eq!(calculate_delay(&config, attempt), Duration::ZERO);
        }
    }

    #[test]
    fn calculate_delay_linear_is_constant() {
        let config = RetryConfig {
            max_attempts: 4,
            backoff: Backoff::Linear,
            base_delay: Duration::from_millis(100),
        };
        for attempt in 1..=4 {
            assert_eq!(calculate_delay(&config, attempt), Duration::from_millis(100));
        }
    }

    #[test]
    fn calculate_delay_exponential_matches_backoff_table() {
        let config = RetryConfig {
            max_attempts: 4,
            backoff: Backoff::Exponential,
            base_delay: Duration::from_millis(100),
        };
        assert_eq!(calculate_delay(&config, 1), Duration::from_millis(100));
        assert_eq!(calculate_delay(&config, 2), Duration::from_millis(200));
        assert_eq!(calculate_delay(&config, 3), Duration::from_millis(400));
        assert_eq!(calculate_delay(&config, 4), Duration::from_millis(800));
    }

    proptest! {
        #[test]
        fn exponential_backoff_formula_holds(base_ms in 1u64..500, attempt in 1u32..12) {
            let config = RetryConfig {
                max_attempts: attempt + 1,
                backoff: Backoff::Exponential,
                base_delay: Duration::from_millis(base_ms),
            };
            let expected = Duration::from_millis(base_ms) * 2u32.pow(attempt - 1);
            prop_assert_eq!(calculate_delay(&config, attempt), expected);
        }
    }

    #[tokio::test]
    async fn succeeds_without_retrying() {
        let config = RetryConfig {
            max_attempts: 3,
            backoff: Backoff::None,
            base_delay: Duration::ZERO,
        };
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);
        let result: Result<&str, RetryError<TestError>> =
            retry(&config, &cancel, version_conflict, |_attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok("ok") }
            })
            .await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_up_to_max_attempts_then_returns_raw_error() {
        let config = RetryConfig {
            max_attempts: 4,
            backoff: Backoff::None,
            base_delay: Duration::ZERO,
        };
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);
        let result: Result<(), RetryError<TestError>> =
            retry(&config, &cancel, version_conflict, |_attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError::VersionConflict) }
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        match result {
            Err(RetryError::Failed(TestError::VersionConflict)) => {}
            other => panic!("expected raw VersionConflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn predicate_rejecting_error_stops_immediately() {
        let config = RetryConfig {
            max_attempts: 5,
            backoff: Backoff::None,
            base_delay: Duration::ZERO,
        };
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);
        let result: Result<(), RetryError<TestError>> =
            retry(&config, &cancel, version_conflict, |_attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError::Parse) }
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(RetryError::Failed(TestError::Parse))));
    }

    #[tokio::test]
    async fn connection_transient_predicate_matches_only_transient() {
        let config = RetryConfig {
            max_attempts: 2,
            backoff: Backoff::None,
            base_delay: Duration::ZERO,
        };
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);
        let result: Result<(), RetryError<TestError>> =
            retry(&config, &cancel, connection_transient, |_attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TestError::ConnectionRefused) }
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(matches!(
            result,
            Err(RetryError::Failed(TestError::ConnectionRefused))
        ));
    }

    #[tokio::test]
    async fn already_cancelled_token_aborts_before_first_attempt() {
        let config = RetryConfig {
            max_attempts: 3,
            backoff: Backoff::None,
            base_delay: Duration::ZERO,
        };
        let cancel = CancellationToken::new();
        cancel.cancel();
        let calls = AtomicU32::new(0);
        let result: Result<(), RetryError<TestError>> =
            retry(&config, &cancel, version_conflict, |_attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(matches!(result, Err(RetryError::Cancelled)));
    }

    #[tokio::test]
    async fn elapsed_time_respects_exponential_backoff_floor() {
        let config = RetryConfig {
            max_attempts: 4,
            backoff: Backoff::Exponential,
            base_delay: Duration::from_millis(50),
        };
        let cancel = CancellationToken::new();
        let start = Instant::now();
        let _: Result<(), RetryError<TestError>> =
            retry(&config, &cancel, version_conflict, |_attempt| async {
                Err(TestError::VersionConflict)
            })
            .await;
        // Three sleeps of 50, 100, 200ms separate the four attempts.
        assert!(start.elapsed() >= Duration::from_millis(350));
    }
}
