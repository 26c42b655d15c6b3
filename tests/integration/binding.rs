//! Request binding against a live server: URL, headers, credentials, body.

use super::common::{client, endpoint, GetUser, User};
use restbind::bind::{BodyFormat, ClientProfile, HttpClient, Model, Schema};
use restbind::client::{BasicCredentials, BearerToken, EndpointConfig, RequestMethod};
use serde::Serialize;
use serde_json::json;
use wiremock::matchers::{body_json, header, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

struct SearchUsers {
    org: &'static str,
    q: &'static str,
    tags: Vec<&'static str>,
    trace_id: &'static str,
    internal: u32,
}

impl Model for SearchUsers {
    fn describe(schema: &mut Schema<Self>) {
        schema.field("org", |m| &m.org);
        schema.field("q", |m| &m.q);
        schema.field("tags", |m| &m.tags);
        schema.field("trace_id", |m| &m.trace_id).header().rename("X-Trace-Id");
        schema.field("internal", |m| &m.internal).ignore();
    }
}

#[tokio::test]
async fn test_path_query_and_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/orgs/acme%20corp/users"))
        .and(query_param("q", "ada lovelace"))
        .and(query_param("tags", "admin"))
        .and(query_param("tags", "ops"))
        .and(header("X-Trace-Id", "t-1"))
        .and(header("X-Api-Version", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1, "name": "ada"}])))
        .expect(1)
        .mount(&server)
        .await;

    let endpoint = EndpointConfig::builder(format!("{}/orgs/{{org}}/users", server.uri()))
        .with_header("X-Api-Version", "2")
        .build();
    let client: HttpClient = client(endpoint);

    let users: Vec<User> = client
        .call(&SearchUsers {
            org: "acme corp",
            q: "ada lovelace",
            tags: vec!["admin", "ops"],
            trace_id: "t-1",
            internal: 9,
        })
        .await
        .unwrap();

    assert_eq!(users, vec![User { id: 1, name: "ada".into() }]);
    let received = server.received_requests().await.unwrap();
    assert!(!received[0].url.query().unwrap_or("").contains("internal"));
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateUser {
    #[serde(skip)]
    tenant: &'static str,
    display_name: String,
    email: String,
}

impl Model for CreateUser {
    fn describe(schema: &mut Schema<Self>) {
        schema.body(BodyFormat::Json);
        schema.field("tenant", |m| &m.tenant).header().rename("X-Tenant");
        schema.field("display_name", |m| &m.display_name);
        schema.field("email", |m| &m.email);
    }
}

#[tokio::test]
async fn test_json_body_infers_post() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/users"))
        .and(header("X-Tenant", "acme"))
        .and(header("Content-Type", "application/json; charset=utf-8"))
        .and(body_json(json!({"displayName": "Ada", "email": "ada@example.com"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 5, "name": "Ada"})))
        .expect(1)
        .mount(&server)
        .await;

    let client: HttpClient = client(endpoint(&server, "/users"));
    let created: User = client
        .call(&CreateUser {
            tenant: "acme",
            display_name: "Ada".into(),
            email: "ada@example.com".into(),
        })
        .await
        .unwrap();

    assert_eq!(created.id, 5);
}

struct JsonApi;

impl ClientProfile for JsonApi {
    fn body_format() -> Option<BodyFormat> {
        Some(BodyFormat::Json)
    }
}

#[derive(Serialize)]
struct CreateNote {
    text: &'static str,
}

impl Model for CreateNote {
    fn describe(schema: &mut Schema<Self>) {
        schema.serializable();
        schema.field("text", |m| &m.text);
    }
}

#[tokio::test]
async fn test_profile_body_format_serializes_opted_in_models_only() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/notes"))
        .and(body_json(json!({"text": "hi"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 1, "name": "hi"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 7, "name": "ada"})))
        .expect(1)
        .mount(&server)
        .await;

    let notes: HttpClient<JsonApi> = client(endpoint(&server, "/notes"));
    let created: User = notes.call(&CreateNote { text: "hi" }).await.unwrap();
    assert_eq!(created.name, "hi");

    let users: HttpClient<JsonApi> = client(endpoint(&server, "/users/{id}"));
    let user: User = users.call(&GetUser { id: 7 }).await.unwrap();
    assert_eq!(user.id, 7);
    let received = server.received_requests().await.unwrap();
    assert!(received[1].body.is_empty());
}

#[tokio::test]
async fn test_pinned_method_without_body_sends_zero_length() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/users/3"))
        .and(header("Content-Length", "0"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client: HttpClient = client(endpoint(&server, "/users/{id}"));
    client
        .call_with_method::<_, ()>(&GetUser { id: 3 }, RequestMethod::Put)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_endpoint_credentials_are_preemptive() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("Authorization", "Bearer static-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1, "name": "a"})))
        .expect(1)
        .mount(&server)
        .await;

    let endpoint = EndpointConfig::builder(format!("{}/users/{{id}}", server.uri()))
        .with_bearer_token("static-token")
        .build();
    let client: HttpClient = client(endpoint);

    let user: User = client.call(&GetUser { id: 1 }).await.unwrap();
    assert_eq!(user.id, 1);
}

struct MultiAuth {
    basic: BasicCredentials,
    bearer: BearerToken,
}

impl Model for MultiAuth {
    fn describe(schema: &mut Schema<Self>) {
        schema.field("basic", |m| &m.basic);
        schema.field("bearer", |m| &m.bearer);
    }
}

#[tokio::test]
async fn test_credential_cache_answers_challenge() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("Authorization", "Bearer model-token"))
        .respond_with(ResponseTemplate::new(200).set_body_string("welcome"))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(401).insert_header("WWW-Authenticate", "Bearer realm=\"api\""),
        )
        .with_priority(10)
        .mount(&server)
        .await;

    let client: HttpClient = client(endpoint(&server, "/secure"));
    let text: String = client
        .call(&MultiAuth {
            basic: BasicCredentials::new("user", "pw"),
            bearer: BearerToken::new("model-token"),
        })
        .await
        .unwrap();

    assert_eq!(text, "welcome");
    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 2);
    assert!(!received[0].headers.contains_key("authorization"));
}

struct Paging {
    page: u32,
    size: u32,
}

impl Model for Paging {
    fn describe(schema: &mut Schema<Self>) {
        schema.field("page", |m| &m.page);
        schema.field("size", |m| &m.size);
    }
}

struct ListUsers {
    paging: Paging,
    filter: Option<Paging>,
}

impl Model for ListUsers {
    fn describe(schema: &mut Schema<Self>) {
        schema.nested("paging", |m| Some(&m.paging));
        schema.nested("filter", |m| m.filter.as_ref()).rename("f");
    }
}

#[tokio::test]
async fn test_nested_models_expand_into_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .and(query_param("page", "2"))
        .and(query_param("size", "50"))
        .and(query_param("f.page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let client: HttpClient = client(endpoint(&server, "/users"));
    let users: Vec<User> = client
        .call(&ListUsers {
            paging: Paging { page: 2, size: 50 },
            filter: Some(Paging { page: 1, size: 10 }),
        })
        .await
        .unwrap();

    assert!(users.is_empty());
}

#[tokio::test]
async fn test_accept_encoding_added_unless_disabled() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(|request: &Request| {
            let value = request
                .headers
                .get("accept-encoding")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("none")
                .to_string();
            ResponseTemplate::new(200).set_body_string(value)
        })
        .mount(&server)
        .await;

    let default: HttpClient = client(endpoint(&server, "/users/{id}"));
    let sent: String = default.call(&GetUser { id: 1 }).await.unwrap();
    assert_eq!(sent, "deflate, gzip, x-gzip");

    let disabled: HttpClient = client(
        EndpointConfig::builder(format!("{}/users/{{id}}", server.uri()))
            .with_auto_accept_encoding(false)
            .build(),
    );
    let sent: String = disabled.call(&GetUser { id: 1 }).await.unwrap();
    assert_eq!(sent, "none");
}

#[tokio::test]
async fn test_user_agent_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header_exists("user-agent"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client: HttpClient = client(endpoint(&server, "/users/{id}"));
    client.call::<_, ()>(&GetUser { id: 1 }).await.unwrap();
}
