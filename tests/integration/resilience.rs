//! Retries, cancellation and the blocking client.

use std::sync::Arc;
use std::time::{Duration, Instant};

use super::common::{client, endpoint, init_tracing, GetUser, User};
use restbind::bind::{Binder, BlockingHttpClient, HttpClient};
use restbind::client::{Error, ErrorKind, RetryConfig};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn flaky_server(failures: u64, status: u16) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(status))
        .up_to_n_times(failures)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1, "name": "ada"})))
        .with_priority(2)
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_service_unavailable_is_retried() {
    let server = flaky_server(1, 503).await;
    let client: HttpClient = client(endpoint(&server, "/users/{id}"));

    let user: User = client.call(&GetUser { id: 1 }).await.unwrap();

    assert_eq!(user.name, "ada");
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_retries_exhausted_surface_last_response() {
    let server = flaky_server(10, 504).await;
    let client: HttpClient = HttpClient::builder(endpoint(&server, "/users/{id}"))
        .binder(Arc::new(Binder::new()))
        .retry(RetryConfig::new([Duration::from_millis(5), Duration::from_millis(5)]))
        .build()
        .unwrap();

    let err = client.call::<_, User>(&GetUser { id: 1 }).await.unwrap_err();

    assert_eq!(err.status(), Some(504));
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let server = flaky_server(10, 400).await;
    let client: HttpClient = client(endpoint(&server, "/users/{id}"));

    let err = client.call::<_, User>(&GetUser { id: 1 }).await.unwrap_err();

    assert_eq!(err.status(), Some(400));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_custom_classifier_retries_conflicts() {
    let server = flaky_server(1, 409).await;
    let classifier = |error: &Error| error.status() == Some(409);
    let client: HttpClient = HttpClient::builder(endpoint(&server, "/users/{id}"))
        .binder(Arc::new(Binder::new()))
        .retry(RetryConfig::new([Duration::from_millis(5)]))
        .retry_classifier(Arc::new(classifier))
        .build()
        .unwrap();

    let user: User = client.call(&GetUser { id: 1 }).await.unwrap();
    assert_eq!(user.id, 1);
}

#[tokio::test]
async fn test_cancellation_aborts_in_flight_call() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"id": 1, "name": "slow"}))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;
    let client: HttpClient = client(endpoint(&server, "/users/{id}"));
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = client
        .call_with_cancellation::<_, User>(&GetUser { id: 1 }, &token)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert!(matches!(err.kind, ErrorKind::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_unreachable_host_wrapped_with_call_site() {
    init_tracing();
    let client: HttpClient = HttpClient::builder(restbind::client::EndpointConfig::new(
        "http://127.0.0.1:9/users/{id}",
    ))
    .binder(Arc::new(Binder::new()))
    .retry(RetryConfig::no_retry())
    .build()
    .unwrap();

    let err = client.call::<_, User>(&GetUser { id: 1 }).await.unwrap_err();

    match &err.kind {
        ErrorKind::Call { base_url, client, .. } => {
            assert_eq!(base_url, "http://127.0.0.1:9/users/{id}");
            assert_eq!(client, "DefaultProfile");
        }
        other => panic!("expected call error, got {other:?}"),
    }
}

#[test]
fn test_blocking_client_round_trip() {
    init_tracing();
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let server = runtime.block_on(flaky_server(1, 503));

    let client: BlockingHttpClient = BlockingHttpClient::builder(endpoint(&server, "/users/{id}"))
        .binder(Arc::new(Binder::new()))
        .retry(RetryConfig::new([Duration::from_millis(5)]))
        .build()
        .unwrap();

    let user: User = client.call(&GetUser { id: 1 }).unwrap();

    assert_eq!(user.name, "ada");
    let received = runtime.block_on(server.received_requests()).unwrap();
    assert_eq!(received.len(), 2);
}
