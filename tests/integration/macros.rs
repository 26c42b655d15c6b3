//! Clients generated by `http_client!`.

use std::sync::Arc;
use std::time::Duration;

use super::common::{endpoint, init_tracing, GetUser, User};
use restbind::bind::{
    Binder, BlockingHttpClient, BodyFormat, ClientProfile, HttpClient, Model, Schema,
};
use restbind::client::RetryConfig;
use serde::Serialize;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Serialize)]
struct RenameUser {
    #[serde(skip)]
    id: u64,
    name: &'static str,
}

impl Model for RenameUser {
    fn describe(schema: &mut Schema<Self>) {
        schema.body(BodyFormat::Json);
        schema.field("id", |m| &m.id).path();
        schema.field("name", |m| &m.name);
    }
}

struct UsersService;

impl ClientProfile for UsersService {
    fn name() -> &'static str {
        "users-service"
    }
}

restbind::http_client! {
    /// The users service.
    pub struct UsersApi<UsersService>;

    /// Fetch one user.
    fn get_user(GetUser) -> User;
    fn rename_user(RenameUser) -> User;
}

restbind::http_client! {
    pub blocking struct UsersSync;

    fn get_user(GetUser) -> User;
}

async fn users_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 4, "name": "ada"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/users/4"))
        .and(body_json(json!({"name": "grace"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 4, "name": "grace"})))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_generated_async_client() {
    init_tracing();
    let server = users_server().await;
    let api = UsersApi::from_client(
        HttpClient::builder(endpoint(&server, "/users/{id}"))
            .binder(Arc::new(Binder::new()))
            .retry(RetryConfig::new([Duration::from_millis(5)]))
            .build()
            .unwrap(),
    );

    let user = api.get_user(&GetUser { id: 4 }).await.unwrap();
    assert_eq!(user.name, "ada");

    let renamed = api
        .rename_user(&RenameUser { id: 4, name: "grace" })
        .await
        .unwrap();
    assert_eq!(renamed.name, "grace");
    assert_eq!(api.inner().name(), "users-service");
}

#[tokio::test]
async fn test_generated_client_errors_name_profile() {
    let api = UsersApi::new(restbind::client::EndpointConfig::new("http://[bad/{id}")).unwrap();

    let err = api.get_user(&GetUser { id: 1 }).await.unwrap_err();

    match &err.kind {
        restbind::ErrorKind::Call { client, .. } => assert_eq!(client, "users-service"),
        other => panic!("expected call error, got {other:?}"),
    }
}

#[test]
fn test_generated_blocking_client() {
    init_tracing();
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let server = runtime.block_on(users_server());

    let api = UsersSync::from_client(
        BlockingHttpClient::builder(endpoint(&server, "/users/{id}"))
            .binder(Arc::new(Binder::new()))
            .build()
            .unwrap(),
    );

    let user = api.get_user(&GetUser { id: 4 }).unwrap();
    assert_eq!(user.id, 4);
    assert_eq!(api.inner().name(), "DefaultProfile");
}
