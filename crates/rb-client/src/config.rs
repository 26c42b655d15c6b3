//! Settings shared by every endpoint of one client.
//!
//! An [`EndpointConfig`](crate::EndpointConfig) describes one remote service
//! (base URL, timeout, static headers, credentials, proxy). A `ClientConfig`
//! describes the client talking to it: the retry schedule the execute
//! strategy walks through, the connection pool the transport keeps, and how
//! loudly exchanges are logged.

use crate::retry::RetryConfig;
use std::time::Duration;

/// Client-wide settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Delays between attempts of one call.
    pub retry: RetryConfig,
    /// Time allowed to open a connection.
    pub connect_timeout: Duration,
    /// How long an unused pooled connection is kept.
    pub idle_timeout: Duration,
    /// Pooled connections kept per host.
    pub max_idle_per_host: usize,
    pub user_agent: String,
    /// Log each request, each response status and non-success bodies.
    pub log_exchanges: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            connect_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(90),
            max_idle_per_host: 10,
            user_agent: crate::USER_AGENT.to_string(),
            log_exchanges: true,
        }
    }
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    /// Retry after each of `delays`, in order.
    pub fn with_retry_delays(mut self, delays: impl IntoIterator<Item = Duration>) -> Self {
        self.config.retry = RetryConfig::new(delays);
        self
    }

    /// Make every call a single attempt.
    pub fn without_retry(mut self) -> Self {
        self.config.retry = RetryConfig::no_retry();
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_timeout = timeout;
        self
    }

    pub fn with_max_idle_per_host(mut self, max: usize) -> Self {
        self.config.max_idle_per_host = max;
        self
    }

    /// Replace the default `restbind/<version>` agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    pub fn with_exchange_logging(mut self, enabled: bool) -> Self {
        self.config.log_exchanges = enabled;
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}
