use std::sync::{Arc, Once};
use std::time::Duration;

use restbind::bind::{Binder, ClientProfile, HttpClient, Model, NoopObserver, Schema};
use restbind::client::{EndpointConfig, RetryConfig};
use serde::{Deserialize, Serialize};
use wiremock::MockServer;

static TRACING: Once = Once::new();

/// Route test logs through the test writer; `RUST_LOG` selects the level.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Endpoint rooted at the mock server.
pub fn endpoint(server: &MockServer, path: &str) -> EndpointConfig {
    EndpointConfig::new(format!("{}{}", server.uri(), path))
}

/// Async client with an isolated binder and one short retry.
pub fn client<P: ClientProfile>(endpoint: EndpointConfig) -> HttpClient<P> {
    init_tracing();
    HttpClient::<P>::builder(endpoint)
        .binder(Arc::new(Binder::new()))
        .retry(RetryConfig::new([Duration::from_millis(10)]))
        .observer(Arc::new(NoopObserver))
        .build()
        .expect("client should build")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
}

/// `GET .../users/{id}`.
#[derive(Debug)]
pub struct GetUser {
    pub id: u64,
}

impl Model for GetUser {
    fn describe(schema: &mut Schema<Self>) {
        schema.field("id", |m| &m.id).path();
    }
}
