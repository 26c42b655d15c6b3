//! Per-call binding state.

use restbind_client::EndpointConfig;
use tokio_util::sync::CancellationToken;

/// State of one call, owned by the call for its whole duration.
#[derive(Debug)]
pub struct BindingContext<'a, M> {
    /// Client (profile) name.
    pub client: &'a str,
    /// The request model.
    pub model: &'a M,
    pub endpoint: &'a EndpointConfig,
    /// Base URL before binding.
    pub base_url: &'a str,
    /// URL after binding, set once composed.
    pub request_url: Option<String>,
    /// Cancellation signal of async calls.
    pub cancellation: Option<&'a CancellationToken>,
}

impl<'a, M> BindingContext<'a, M> {
    pub fn new(client: &'a str, model: &'a M, endpoint: &'a EndpointConfig) -> Self {
        Self {
            client,
            model,
            endpoint,
            base_url: &endpoint.base_url,
            request_url: None,
            cancellation: None,
        }
    }

    pub fn with_cancellation(mut self, cancellation: &'a CancellationToken) -> Self {
        self.cancellation = Some(cancellation);
        self
    }

    /// True if the call was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_some_and(CancellationToken::is_cancelled)
    }
}
