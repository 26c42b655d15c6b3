//! Retry configuration: an ordered list of inter-attempt delays.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

use crate::error::Error;

/// Configuration for retry behavior.
///
/// One delay per retry attempt: `[1s, 2s, 5s]` allows up to three retries
/// after the initial attempt. An empty list means the first failure is
/// terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    delays: Vec<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::backoff(
            3,
            Duration::from_millis(500),
            Duration::from_secs(30),
            BackoffStrategy::Exponential { factor: 2.0 },
        )
    }
}

impl RetryConfig {
    /// Retry with exactly these delays.
    pub fn new(delays: impl IntoIterator<Item = Duration>) -> Self {
        Self {
            delays: delays.into_iter().collect(),
        }
    }

    /// Disable retries.
    pub fn no_retry() -> Self {
        Self { delays: Vec::new() }
    }

    /// Retry `count` times with a constant delay.
    pub fn fixed(count: u32, delay: Duration) -> Self {
        Self::backoff(count, delay, delay, BackoffStrategy::Constant)
    }

    /// Precompute `count` delays from a backoff strategy.
    pub fn backoff(
        count: u32,
        initial_delay: Duration,
        max_delay: Duration,
        strategy: BackoffStrategy,
    ) -> Self {
        Self {
            delays: (0..count)
                .map(|attempt| strategy.delay(attempt, initial_delay, max_delay))
                .collect(),
        }
    }

    /// The configured delays, in retry order.
    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }

    /// Maximum number of retries after the initial attempt.
    pub fn max_retries(&self) -> u32 {
        self.delays.len() as u32
    }
}

/// Backoff strategy for determining retry delays.
#[derive(Debug, Clone, Copy)]
pub enum BackoffStrategy {
    /// Constant delay between retries.
    Constant,
    /// Linear increase in delay (delay * attempt).
    Linear,
    /// Exponential increase in delay (delay * factor^attempt).
    Exponential { factor: f64 },
    /// Exponential with random jitter to avoid thundering herd.
    ExponentialWithJitter { factor: f64 },
}

impl BackoffStrategy {
    /// Calculate the delay for a given attempt number (0-indexed).
    pub fn delay(&self, attempt: u32, initial_delay: Duration, max_delay: Duration) -> Duration {
        let delay = match self {
            BackoffStrategy::Constant => initial_delay,
            BackoffStrategy::Linear => initial_delay * (attempt + 1),
            BackoffStrategy::Exponential { factor } => {
                let multiplier = factor.powi(attempt as i32);
                Duration::from_secs_f64(initial_delay.as_secs_f64() * multiplier)
            }
            BackoffStrategy::ExponentialWithJitter { factor } => {
                let base_delay = initial_delay.as_secs_f64() * factor.powi(attempt as i32);
                let jitter = rand::rng().random::<f64>() * base_delay;
                Duration::from_secs_f64(base_delay + jitter)
            }
        };

        std::cmp::min(delay, max_delay)
    }
}

/// Decides whether a failed attempt may be retried.
pub trait RetryClassifier: Send + Sync {
    /// Returns true if `error` is worth another attempt.
    fn is_retryable(&self, error: &Error) -> bool;
}

/// Retries connectivity failures, timeouts and 408/503/504 responses.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRetryClassifier;

impl RetryClassifier for DefaultRetryClassifier {
    fn is_retryable(&self, error: &Error) -> bool {
        !error.is_cancelled() && error.root_kind().is_retryable()
    }
}

impl<F> RetryClassifier for F
where
    F: Fn(&Error) -> bool + Send + Sync,
{
    fn is_retryable(&self, error: &Error) -> bool {
        self(error)
    }
}

/// Per-call retry state: attempt counter plus the remaining delays.
#[derive(Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
    classifier: Arc<dyn RetryClassifier>,
    attempt: u32,
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("config", &self.config)
            .field("attempt", &self.attempt)
            .finish()
    }
}

impl RetryPolicy {
    /// Create a policy using the default classifier.
    pub fn new(config: RetryConfig) -> Self {
        Self::with_classifier(config, Arc::new(DefaultRetryClassifier))
    }

    /// Create a policy with a custom classifier.
    pub fn with_classifier(config: RetryConfig, classifier: Arc<dyn RetryClassifier>) -> Self {
        Self {
            config,
            classifier,
            attempt: 0,
        }
    }

    /// Number of retries taken so far.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Returns true if retries remain.
    pub fn should_retry(&self) -> bool {
        self.attempt < self.config.max_retries()
    }

    /// Delay before the next attempt for `error`, advancing the counter.
    ///
    /// Returns None when the error is not retryable or retries are exhausted.
    pub fn next_delay(&mut self, error: &Error) -> Option<Duration> {
        if !self.classifier.is_retryable(error) {
            return None;
        }
        let delay = *self.config.delays.get(self.attempt as usize)?;
        self.attempt += 1;
        Some(delay)
    }
}
