//! Retry policy executor for remote calls
//!
//! Every call to the gateway goes through [`with_retry`] (directly or via a
//! [`Retryable`] wrapper):
//!
//! 1. Run the operation; return immediately on success
//! 2. On failure ask `is_retryable`; permanent errors and an exhausted budget
//!    return the last error unchanged
//! 3. Otherwise wait `min(initial * multiplier^attempt, max)` (jittered into
//!    `[0.5, 1.0]` of that when enabled), report through `on_retry`, retry
//!
//! A retry sequence is never cancelled once started.

mod backoff;
mod classify;

pub use backoff::Backoff;
pub use classify::{is_transient_message, RetryClassify};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use crate::error::CoreError;

/// Classifier deciding whether a failed attempt may be retried
pub type RetryPredicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Observer invoked before each retry with `(attempt, delay)`; attempt is 1-based
pub type RetryObserver = Arc<dyn Fn(u32, Duration) + Send + Sync>;

/// Retry policy configuration
pub struct RetryConfig<E = CoreError> {
    /// Retries after the first attempt; `0` means a single attempt
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub jitter: bool,
    pub is_retryable: RetryPredicate<E>,
    pub on_retry: Option<RetryObserver>,
}

impl<E> Clone for RetryConfig<E> {
    fn clone(&self) -> Self {
        Self {
            max_retries: self.max_retries,
            initial_delay: self.initial_delay,
            max_delay: self.max_delay,
            backoff_multiplier: self.backoff_multiplier,
            jitter: self.jitter,
            is_retryable: Arc::clone(&self.is_retryable),
            on_retry: self.on_retry.clone(),
        }
    }
}

impl<E> fmt::Debug for RetryConfig<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryConfig")
            .field("max_retries", &self.max_retries)
            .field("initial_delay", &self.initial_delay)
            .field("max_delay", &self.max_delay)
            .field("backoff_multiplier", &self.backoff_multiplier)
            .field("jitter", &self.jitter)
            .field("on_retry", &self.on_retry.is_some())
            .finish()
    }
}

impl<E: RetryClassify + 'static> Default for RetryConfig<E> {
    fn default() -> Self {
        Self::standard()
    }
}

impl<E: RetryClassify + 'static> RetryConfig<E> {
    fn preset(max_retries: u32, initial_ms: u64, max_ms: u64, multiplier: f64) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::from_millis(initial_ms),
            max_delay: Duration::from_millis(max_ms),
            backoff_multiplier: multiplier,
            jitter: true,
            is_retryable: Arc::new(|err: &E| err.is_retryable()),
            on_retry: None,
        }
    }

    /// Interactive calls where the user is waiting
    pub fn quick() -> Self {
        Self::preset(2, 100, 1_000, 2.0)
    }

    /// Default for remote calls
    pub fn standard() -> Self {
        Self::preset(3, 500, 10_000, 2.0)
    }

    /// Calls that must eventually land (sending a message)
    pub fn aggressive() -> Self {
        Self::preset(5, 200, 5_000, 1.5)
    }

    /// Background refreshes that should not hammer the gateway
    pub fn gentle() -> Self {
        Self::preset(3, 2_000, 60_000, 3.0)
    }
}

impl<E> RetryConfig<E> {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Replace the retryability classifier
    pub fn with_classifier(mut self, classifier: impl Fn(&E) -> bool + Send + Sync + 'static) -> Self {
        self.is_retryable = Arc::new(classifier);
        self
    }

    /// Install the `(attempt, delay)` observer
    pub fn on_retry(mut self, observer: impl Fn(u32, Duration) + Send + Sync + 'static) -> Self {
        self.on_retry = Some(Arc::new(observer));
        self
    }

    /// Backoff schedule described by this config
    pub fn backoff(&self) -> Backoff {
        Backoff::new(
            self.initial_delay,
            self.max_delay,
            self.backoff_multiplier,
            self.jitter,
        )
    }
}

/// Named points in the retry configuration space, for config files
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryPreset {
    Quick,
    #[default]
    Standard,
    Aggressive,
    Gentle,
}

impl RetryPreset {
    pub fn config<E: RetryClassify + 'static>(self) -> RetryConfig<E> {
        match self {
            RetryPreset::Quick => RetryConfig::quick(),
            RetryPreset::Standard => RetryConfig::standard(),
            RetryPreset::Aggressive => RetryConfig::aggressive(),
            RetryPreset::Gentle => RetryConfig::gentle(),
        }
    }
}

/// One failed-but-retried execution, kept only for logging
#[derive(Debug)]
pub struct RetryAttempt<'a, E> {
    pub attempt: u32,
    pub delay: Duration,
    pub last_error: &'a E,
}

/// Run `operation` under `config`, with jitter drawn from a fresh entropy-seeded RNG
pub async fn with_retry<T, E, F, Fut>(operation: F, config: &RetryConfig<E>) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    let mut rng = StdRng::from_entropy();
    with_retry_using(operation, config, &mut rng).await
}

/// Run `operation` under `config`, drawing jitter from `rng`
pub async fn with_retry_using<T, E, F, Fut, R>(
    mut operation: F,
    config: &RetryConfig<E>,
    rng: &mut R,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
    R: Rng + ?Sized,
{
    let backoff = config.backoff();
    let mut attempt: u32 = 0;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::info!("Operation succeeded after {} retries", attempt);
                }
                return Ok(value);
            }
            Err(err) => {
                if !(config.is_retryable)(&err) {
                    tracing::debug!("Not retrying permanent error: {}", err);
                    return Err(err);
                }
                if attempt >= config.max_retries {
                    if config.max_retries > 0 {
                        tracing::error!(
                            "Giving up after {} attempts: {}",
                            attempt + 1,
                            err
                        );
                    }
                    return Err(err);
                }

                let delay = backoff.delay(attempt, rng);
                attempt += 1;

                log_retry(&RetryAttempt {
                    attempt,
                    delay,
                    last_error: &err,
                });
                if let Some(observer) = &config.on_retry {
                    observer(attempt, delay);
                }

                sleep(delay).await;
            }
        }
    }
}

fn log_retry<E: fmt::Display>(record: &RetryAttempt<'_, E>) {
    tracing::warn!(
        "Attempt {} failed: {}, retrying in {:?}",
        record.attempt,
        record.last_error,
        record.delay
    );
}

/// A remote-call function wrapped once with a retry policy
///
/// Arguments are cloned for every attempt; pass a tuple for several.
pub struct Retryable<F, E = CoreError> {
    inner: F,
    config: RetryConfig<E>,
}

/// Wrap `f` so every [`Retryable::call`] applies `config`
pub fn retryable<F, E>(f: F, config: RetryConfig<E>) -> Retryable<F, E> {
    Retryable { inner: f, config }
}

impl<F, E> Retryable<F, E> {
    pub async fn call<A, T, Fut>(&self, args: A) -> Result<T, E>
    where
        A: Clone,
        F: Fn(A) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        with_retry(|| (self.inner)(args.clone()), &self.config).await
    }

    pub fn config(&self) -> &RetryConfig<E> {
        &self.config
    }
}
