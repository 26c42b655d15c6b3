//! Call observers: a sink for request and response events.

use std::time::Duration;

use restbind_client::security::redact_url;
use restbind_client::{Error, ResponseMetadata, TransportRequest};
use tracing::{debug, info, warn};

/// Receives one event per request sent and per outcome.
///
/// Called once per attempt, so a retried call reports several requests.
pub trait CallObserver: Send + Sync {
    fn on_request(&self, client: &str, request: &TransportRequest);

    fn on_response(&self, client: &str, metadata: &ResponseMetadata, elapsed: Duration);

    fn on_error(&self, client: &str, error: &Error, elapsed: Duration);
}

/// Logs events through `tracing`. URLs are redacted.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl CallObserver for TracingObserver {
    fn on_request(&self, client: &str, request: &TransportRequest) {
        debug!(
            client,
            method = %request.method,
            url = %redact_url(&request.url),
            headers = request.headers.len(),
            body_bytes = request.body.as_ref().map(|b| b.len()).unwrap_or(0),
            "Request bound"
        );
    }

    fn on_response(&self, client: &str, metadata: &ResponseMetadata, elapsed: Duration) {
        let elapsed_ms = elapsed.as_millis() as u64;
        if metadata.is_success() {
            debug!(client, status = metadata.status, elapsed_ms, "Response");
        } else {
            info!(client, status = metadata.status, elapsed_ms, "Response");
        }
    }

    fn on_error(&self, client: &str, error: &Error, elapsed: Duration) {
        warn!(client, error = %error, elapsed_ms = elapsed.as_millis() as u64, "Request failed");
    }
}

/// Ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl CallObserver for NoopObserver {
    fn on_request(&self, _client: &str, _request: &TransportRequest) {}

    fn on_response(&self, _client: &str, _metadata: &ResponseMetadata, _elapsed: Duration) {}

    fn on_error(&self, _client: &str, _error: &Error, _elapsed: Duration) {}
}
