//! Response reading: content types, content encodings, envelopes, streams.

use std::io::Write;

use super::common::{client, endpoint, GetUser, User};
use futures::TryStreamExt;
use restbind::bind::{ClientProfile, Envelope, HttpClient, Json, ResponseFormat, ResponseStream};
use restbind::client::ErrorKind;
use serde::Deserialize;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn serve(server: &MockServer, template: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/users/1"))
        .respond_with(template)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_not_modified_envelope_and_error() {
    let server = MockServer::start().await;
    serve(
        &server,
        ResponseTemplate::new(304)
            .insert_header("ETag", "\"v2\"")
            .insert_header("Last-Modified", "Wed, 21 Oct 2026 07:28:00 GMT"),
    )
    .await;
    let client: HttpClient = client(endpoint(&server, "/users/{id}"));

    let envelope: Envelope<User> = client.call(&GetUser { id: 1 }).await.unwrap();
    assert!(envelope.value.is_none());
    assert_eq!(envelope.status, 304);
    assert_eq!(envelope.etag.as_deref(), Some("\"v2\""));
    assert_eq!(
        envelope.last_modified.as_deref(),
        Some("Wed, 21 Oct 2026 07:28:00 GMT")
    );

    let err = client.call::<_, User>(&GetUser { id: 1 }).await.unwrap_err();
    assert_eq!(err.status(), Some(304));
    assert!(matches!(err.kind, ErrorKind::Http(_)));
}

#[tokio::test]
async fn test_envelope_carries_value_and_headers() {
    let server = MockServer::start().await;
    serve(
        &server,
        ResponseTemplate::new(200)
            .insert_header("ETag", "\"v1\"")
            .set_body_json(json!({"id": 1, "name": "ada"})),
    )
    .await;
    let client: HttpClient = client(endpoint(&server, "/users/{id}"));

    let envelope: Envelope<User> = client.call(&GetUser { id: 1 }).await.unwrap();

    assert_eq!(envelope.value.map(|u| u.name).as_deref(), Some("ada"));
    assert_eq!(envelope.etag.as_deref(), Some("\"v1\""));
    assert_eq!(envelope.headers.get_ignore_case("etag"), Some("\"v1\""));
}

#[tokio::test]
async fn test_gzip_body_is_decoded() {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(br#"{"id":1,"name":"zipped"}"#).unwrap();
    let compressed = encoder.finish().unwrap();

    let server = MockServer::start().await;
    serve(
        &server,
        ResponseTemplate::new(200)
            .insert_header("Content-Encoding", "gzip")
            .set_body_raw(compressed, "application/json"),
    )
    .await;
    let client: HttpClient = client(endpoint(&server, "/users/{id}"));

    let user: User = client.call(&GetUser { id: 1 }).await.unwrap();
    assert_eq!(user.name, "zipped");
}

#[tokio::test]
async fn test_truncated_gzip_body_is_not_retried() {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(br#"{"id":1,"name":"truncated"}"#).unwrap();
    let mut compressed = encoder.finish().unwrap();
    compressed.truncate(compressed.len() - 12);

    let server = MockServer::start().await;
    serve(
        &server,
        ResponseTemplate::new(200)
            .insert_header("Content-Encoding", "gzip")
            .set_body_raw(compressed, "application/json"),
    )
    .await;
    let client: HttpClient = client(endpoint(&server, "/users/{id}"));

    let err = client.call::<_, User>(&GetUser { id: 1 }).await.unwrap_err();

    assert!(
        matches!(err.root_kind(), ErrorKind::Deserialization(_)),
        "expected deserialization error, got {err:?}"
    );
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_malformed_json_is_not_retried() {
    let server = MockServer::start().await;
    serve(
        &server,
        ResponseTemplate::new(200).set_body_raw(r#"{"id":1,"name":"#, "application/json"),
    )
    .await;
    let client: HttpClient = client(endpoint(&server, "/users/{id}"));

    let err = client.call::<_, User>(&GetUser { id: 1 }).await.unwrap_err();

    assert!(matches!(err.root_kind(), ErrorKind::Deserialization(_)));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[derive(Debug, Deserialize)]
#[serde(rename = "user")]
struct XmlUser {
    name: String,
}

#[tokio::test]
async fn test_xml_and_text_bodies() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<user><name>grace</name></user>", "application/xml"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/2"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("plain words", "text/plain"))
        .mount(&server)
        .await;
    let client: HttpClient = client(endpoint(&server, "/users/{id}"));

    let user: XmlUser = client.call(&GetUser { id: 1 }).await.unwrap();
    assert_eq!(user.name, "grace");

    let text: String = client.call(&GetUser { id: 2 }).await.unwrap();
    assert_eq!(text, "plain words");

    let bytes: Vec<u8> = client.call(&GetUser { id: 2 }).await.unwrap();
    assert_eq!(bytes, b"plain words");
}

#[tokio::test]
async fn test_unknown_content_type_has_no_deserializer() {
    let server = MockServer::start().await;
    serve(
        &server,
        ResponseTemplate::new(200).set_body_raw(vec![0x89, 0x50], "image/png"),
    )
    .await;
    let client: HttpClient = client(endpoint(&server, "/users/{id}"));

    let err = client.call::<_, User>(&GetUser { id: 1 }).await.unwrap_err();

    match err.root_kind() {
        ErrorKind::NoDeserializer { content_type, .. } => assert_eq!(content_type, "image/png"),
        other => panic!("expected missing deserializer, got {other:?}"),
    }
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_result_marker_overrides_content_type() {
    let server = MockServer::start().await;
    serve(
        &server,
        ResponseTemplate::new(200)
            .set_body_raw(r#"{"id":1,"name":"ada"}"#, "application/octet-stream"),
    )
    .await;
    let client: HttpClient = client(endpoint(&server, "/users/{id}"));

    let Json(user): Json<User> = client.call(&GetUser { id: 1 }).await.unwrap();
    assert_eq!(user.name, "ada");
}

struct LegacyApi;

impl ClientProfile for LegacyApi {
    fn response_format() -> Option<ResponseFormat> {
        Some(ResponseFormat::Json)
    }
}

#[tokio::test]
async fn test_profile_marker_applies_to_typed_results_only() {
    let server = MockServer::start().await;
    serve(
        &server,
        ResponseTemplate::new(200).set_body_raw(r#"{"id":1,"name":"ada"}"#, "text/html"),
    )
    .await;
    let client: HttpClient<LegacyApi> = client(endpoint(&server, "/users/{id}"));

    let user: User = client.call(&GetUser { id: 1 }).await.unwrap();
    assert_eq!(user.name, "ada");

    let raw: String = client.call(&GetUser { id: 1 }).await.unwrap();
    assert_eq!(raw, r#"{"id":1,"name":"ada"}"#);
}

#[tokio::test]
async fn test_stream_result_is_handed_over() {
    let server = MockServer::start().await;
    serve(
        &server,
        ResponseTemplate::new(200).set_body_raw(vec![1u8; 4096], "application/octet-stream"),
    )
    .await;
    let client: HttpClient = client(endpoint(&server, "/users/{id}"));

    let stream: ResponseStream = client.call(&GetUser { id: 1 }).await.unwrap();
    let chunks: Vec<bytes::Bytes> = stream
        .into_stream()
        .expect("async client yields an async stream")
        .try_collect()
        .await
        .unwrap();

    assert_eq!(chunks.concat().len(), 4096);
}

#[tokio::test]
async fn test_server_error_carries_metadata() {
    let server = MockServer::start().await;
    serve(
        &server,
        ResponseTemplate::new(404).set_body_json(json!({"error": "missing"})),
    )
    .await;
    let client: HttpClient = client(endpoint(&server, "/users/{id}"));

    let err = client.call::<_, User>(&GetUser { id: 1 }).await.unwrap_err();

    assert_eq!(err.status(), Some(404));
    let metadata = err.metadata().expect("http errors carry metadata");
    assert_eq!(metadata.content_type.as_deref(), Some("application/json"));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}
