//! Execute strategy: runs one call pipeline under the retry policy.

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Error, ErrorKind, Result};
use crate::retry::{DefaultRetryClassifier, RetryClassifier, RetryConfig, RetryPolicy};
use crate::security::redact_url;

/// Context attached to terminal errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    /// Base URL of the endpoint being called.
    pub base_url: String,
    /// Name of the client type issuing the call.
    pub client: String,
}

impl CallSite {
    /// Create a call site.
    pub fn new(base_url: impl Into<String>, client: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: client.into(),
        }
    }

    /// Wrap a terminal error with this call site.
    ///
    /// Errors that already are client-level errors (HTTP responses, call
    /// failures, cancellation) propagate unchanged.
    pub fn wrap(&self, error: Error) -> Error {
        if error.is_client_error() {
            return error;
        }
        let message = error.to_string();
        Error::with_source(
            ErrorKind::Call {
                base_url: redact_url(&self.base_url),
                client: self.client.clone(),
                message,
            },
            error,
        )
    }
}

/// Retry state machine around a call pipeline.
///
/// `Attempting -> {Success, Retrying -> Attempting, Failed}`.
#[derive(Clone)]
pub struct ExecuteStrategy {
    retry: RetryConfig,
    classifier: Arc<dyn RetryClassifier>,
}

impl std::fmt::Debug for ExecuteStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecuteStrategy")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl Default for ExecuteStrategy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl ExecuteStrategy {
    /// Create a strategy with the default retry classifier.
    pub fn new(retry: RetryConfig) -> Self {
        Self {
            retry,
            classifier: Arc::new(DefaultRetryClassifier),
        }
    }

    /// Replace the retry classifier.
    pub fn with_classifier(mut self, classifier: Arc<dyn RetryClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// The retry configuration.
    pub fn retry(&self) -> &RetryConfig {
        &self.retry
    }

    fn policy(&self) -> RetryPolicy {
        RetryPolicy::with_classifier(self.retry.clone(), self.classifier.clone())
    }

    /// Run `action` until it succeeds, fails terminally or retries run out.
    ///
    /// The action receives the zero-based attempt number. Delays block the
    /// current thread.
    pub fn execute<T, F>(&self, site: &CallSite, mut action: F) -> Result<T>
    where
        F: FnMut(u32) -> Result<T>,
    {
        let mut policy = self.policy();
        loop {
            let attempt = policy.attempt();
            match action(attempt) {
                Ok(value) => return Ok(value),
                Err(err) => match policy.next_delay(&err) {
                    Some(delay) => {
                        warn!(
                            attempt = attempt + 1,
                            delay_ms = delay.as_millis() as u64,
                            client = %site.client,
                            error = %err,
                            "Call failed, retrying"
                        );
                        std::thread::sleep(delay);
                    }
                    None => {
                        debug!(attempts = attempt + 1, error = %err, "Call failed");
                        return Err(site.wrap(err));
                    }
                },
            }
        }
    }

    /// Async variant of [`execute`](Self::execute).
    ///
    /// Cancellation is observed before each attempt, while the attempt is in
    /// flight and during the retry delay. A cancelled call fails with
    /// `ErrorKind::Cancelled`, never wrapped.
    pub async fn execute_async<T, F, Fut>(
        &self,
        site: &CallSite,
        cancellation: &CancellationToken,
        mut action: F,
    ) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut policy = self.policy();
        loop {
            if cancellation.is_cancelled() {
                return Err(Error::cancelled());
            }

            let attempt = policy.attempt();
            let outcome = tokio::select! {
                biased;
                _ = cancellation.cancelled() => return Err(Error::cancelled()),
                outcome = action(attempt) => outcome,
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(err) if err.is_cancelled() => return Err(Error::cancelled()),
                Err(err) => match policy.next_delay(&err) {
                    Some(delay) => {
                        warn!(
                            attempt = attempt + 1,
                            delay_ms = delay.as_millis() as u64,
                            client = %site.client,
                            error = %err,
                            "Call failed, retrying"
                        );
                        tokio::select! {
                            biased;
                            _ = cancellation.cancelled() => return Err(Error::cancelled()),
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                    None => {
                        debug!(attempts = attempt + 1, error = %err, "Call failed");
                        return Err(site.wrap(err));
                    }
                },
            }
        }
    }
}
