//! Retry execution with configurable backoff.
//!
//! A [`RetryPolicy`] is a reusable value object built with `with_*`
//! combinators. Both execution variants share the same attempt, backoff,
//! and predicate semantics; they differ only in how the inter-attempt
//! delay is awaited: [`execute`](RetryPolicy::execute) sleeps the calling
//! thread, [`execute_async`](RetryPolicy::execute_async) suspends on the
//! tokio timer without occupying a worker thread.

use crate::cancellation::CancellationToken;
use crate::errors::{BoxError, ExecError, ExecutionResult};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

type RetryPredicate = Arc<dyn Fn(&BoxError) -> bool + Send + Sync>;
type DelayFn = Arc<dyn Fn(u32, Duration) -> Duration + Send + Sync>;
type RetryObserver = Arc<dyn Fn(u32, &BoxError, Duration) + Send + Sync>;

/// Granularity of the blocking wait, so cancellation is observed mid-sleep.
const BLOCKING_SLEEP_SLICE: Duration = Duration::from_millis(25);

/// A retry-with-backoff policy around an arbitrary fallible operation.
///
/// Attempts are counted from 1. The default delay between a failed
/// attempt `n` and attempt `n + 1` is
/// `initial_delay * backoff_multiplier^(n - 1)`; no delay ever precedes
/// the first attempt. Retry predicates configured via
/// [`retry_when`](Self::retry_when) compose by logical AND.
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    backoff_multiplier: f64,
    delay_fn: Option<DelayFn>,
    predicates: Vec<RetryPredicate>,
    observer: Option<RetryObserver>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            backoff_multiplier: 2.0,
            delay_fn: None,
            predicates: Vec::new(),
            observer: None,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of attempts (clamped to at least 1).
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Sets the base delay used by the backoff formula.
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the backoff multiplier (clamped to at least 1.0).
    #[must_use]
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier.max(1.0);
        self
    }

    /// Replaces the delay formula with a custom calculator.
    ///
    /// The calculator receives the just-failed attempt number (1-based)
    /// and the configured initial delay.
    #[must_use]
    pub fn with_custom_delay<F>(mut self, delay_fn: F) -> Self
    where
        F: Fn(u32, Duration) -> Duration + Send + Sync + 'static,
    {
        self.delay_fn = Some(Arc::new(delay_fn));
        self
    }

    /// Restricts which errors are retried.
    ///
    /// Each call ANDs the new predicate with any previously configured
    /// ones: all predicates must accept an error for a retry to occur.
    /// With no predicates configured, every error is retried.
    #[must_use]
    pub fn retry_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&BoxError) -> bool + Send + Sync + 'static,
    {
        self.predicates.push(Arc::new(predicate));
        self
    }

    /// Restricts retries to errors that downcast to `E`.
    ///
    /// Sugar over [`retry_when`](Self::retry_when); composes by AND
    /// like any other predicate.
    #[must_use]
    pub fn retry_on<E>(self) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.retry_when(|error| error.downcast_ref::<E>().is_some())
    }

    /// Registers an observer invoked once per failed-but-retried attempt.
    ///
    /// The observer receives the attempt number, the error, and the
    /// computed delay, strictly before the wait. It never fires for the
    /// attempt that succeeds or for the terminal failure.
    #[must_use]
    pub fn on_retry<F>(mut self, observer: F) -> Self
    where
        F: Fn(u32, &BoxError, Duration) + Send + Sync + 'static,
    {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Returns the configured maximum number of attempts.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns a serializable view of the configuration.
    #[must_use]
    pub fn snapshot(&self) -> RetryPolicySnapshot {
        RetryPolicySnapshot {
            max_attempts: self.max_attempts,
            initial_delay_ms: u64::try_from(self.initial_delay.as_millis()).unwrap_or(u64::MAX),
            backoff_multiplier: self.backoff_multiplier,
            custom_delay: self.delay_fn.is_some(),
            predicate_count: self.predicates.len(),
            has_observer: self.observer.is_some(),
        }
    }

    /// Executes the operation, blocking the calling thread between
    /// attempts.
    pub fn execute<T, F>(&self, operation: F) -> ExecutionResult<T>
    where
        F: FnMut() -> Result<T, BoxError>,
    {
        self.execute_with_token(&CancellationToken::new(), operation)
    }

    /// Executes the operation with a cancellation token.
    ///
    /// The token is checked before each attempt and during the
    /// inter-attempt wait; a triggered token aborts with a cancellation
    /// error, distinct from exhaustion.
    pub fn execute_with_token<T, F>(
        &self,
        token: &CancellationToken,
        mut operation: F,
    ) -> ExecutionResult<T>
    where
        F: FnMut() -> Result<T, BoxError>,
    {
        let mut attempt = 1;
        loop {
            if token.is_cancelled() {
                return Err(cancelled_error(token));
            }
            match operation() {
                Ok(value) => return Ok(value),
                Err(error) => {
                    let delay = self.after_failure(attempt, error)?;
                    blocking_wait(token, delay)?;
                    attempt += 1;
                }
            }
        }
    }

    /// Executes the async operation, suspending on the tokio timer
    /// between attempts.
    pub async fn execute_async<T, F, Fut>(&self, operation: F) -> ExecutionResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BoxError>>,
    {
        self.execute_async_with_token(&CancellationToken::new(), operation)
            .await
    }

    /// Async variant of [`execute_with_token`](Self::execute_with_token)
    /// with identical attempt, backoff, and predicate semantics.
    pub async fn execute_async_with_token<T, F, Fut>(
        &self,
        token: &CancellationToken,
        mut operation: F,
    ) -> ExecutionResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BoxError>>,
    {
        let mut attempt = 1;
        loop {
            if token.is_cancelled() {
                return Err(cancelled_error(token));
            }
            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    let delay = self.after_failure(attempt, error)?;
                    tokio::select! {
                        () = tokio::time::sleep(delay) => {}
                        () = token.cancelled() => return Err(cancelled_error(token)),
                    }
                    attempt += 1;
                }
            }
        }
    }

    /// Decides what follows a failed attempt: a terminal error, or the
    /// delay before the next attempt (observer already notified).
    fn after_failure(&self, attempt: u32, error: BoxError) -> ExecutionResult<Duration> {
        if attempt >= self.max_attempts {
            return Err(ExecError::RetryExhausted {
                attempts: attempt,
                source: error,
            });
        }
        if !self.predicates.iter().all(|accepts| accepts(&error)) {
            return Err(ExecError::NonRetryable { source: error });
        }

        let delay = self.delay_for(attempt);
        debug!(
            attempt,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %error,
            "retrying after error"
        );
        if let Some(observer) = &self.observer {
            observer(attempt, &error, delay);
        }
        Ok(delay)
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        if let Some(delay_fn) = &self.delay_fn {
            return delay_fn(attempt, self.initial_delay);
        }
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        self.initial_delay
            .mul_f64(self.backoff_multiplier.powi(exponent))
    }
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("config", &self.snapshot())
            .finish()
    }
}

/// Serializable view of a [`RetryPolicy`] for logging and diagnostics.
///
/// Closure-valued settings are reported as flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicySnapshot {
    /// Maximum attempts, including the first.
    pub max_attempts: u32,
    /// Base delay in milliseconds.
    pub initial_delay_ms: u64,
    /// Backoff multiplier.
    pub backoff_multiplier: f64,
    /// Whether a custom delay calculator is configured.
    pub custom_delay: bool,
    /// Number of ANDed retry predicates.
    pub predicate_count: usize,
    /// Whether a per-retry observer is configured.
    pub has_observer: bool,
}

fn cancelled_error(token: &CancellationToken) -> ExecError {
    ExecError::cancelled(token.reason().unwrap_or_else(|| "cancelled".to_string()))
}

/// Sleeps in bounded slices so a cancellation request interrupts the wait.
fn blocking_wait(token: &CancellationToken, delay: Duration) -> ExecutionResult<()> {
    let deadline = Instant::now() + delay;
    loop {
        if token.is_cancelled() {
            return Err(cancelled_error(token));
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(());
        }
        std::thread::sleep((deadline - now).min(BLOCKING_SLEEP_SLICE));
    }
}
