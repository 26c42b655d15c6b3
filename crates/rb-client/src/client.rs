//! Async transport over `reqwest`.

use futures::future::BoxFuture;
use futures::{StreamExt, TryStreamExt};
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH};
use tracing::{debug, info, instrument};

use crate::config::ClientConfig;
use crate::credentials::Credentials;
use crate::endpoint::EndpointConfig;
use crate::error::{Error, ErrorKind, Result};
use crate::kv::KeyValues;
use crate::request::TransportRequest;
use crate::response::ResponseMetadata;
use crate::security::{redact_url, sanitize_error_message};
use crate::transport::{AsyncBody, AsyncTransport, TransportOutcome};

/// Async HTTP transport for one endpoint.
///
/// Automatic decompression is disabled; bodies arrive as sent and are decoded
/// by the response reader.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    inner: reqwest::Client,
    config: ClientConfig,
}

impl ReqwestTransport {
    /// Create a transport configured for `endpoint`.
    pub fn new(endpoint: &EndpointConfig, config: ClientConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(endpoint.timeout())
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(config.idle_timeout)
            .pool_max_idle_per_host(config.max_idle_per_host)
            .user_agent(&config.user_agent)
            .gzip(false)
            .deflate(false);

        if let Some(proxy) = proxy_for(endpoint)? {
            builder = builder.proxy(proxy);
        }
        if let Some(identity) = identity_for(endpoint)? {
            builder = builder.identity(identity);
        }

        let inner = builder
            .build()
            .map_err(|e| Error::with_source(ErrorKind::Config(e.to_string()), e))?;

        Ok(Self { inner, config })
    }

    /// Wrap an existing reqwest client.
    pub fn from_client(inner: reqwest::Client, config: ClientConfig) -> Self {
        Self { inner, config }
    }

    /// Get the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[instrument(
        skip(self, request),
        fields(method = %request.method, url = %redact_url(&request.url))
    )]
    async fn execute(&self, request: TransportRequest) -> Result<TransportOutcome<AsyncBody>> {
        let preemptive = request
            .credentials
            .as_ref()
            .and_then(Credentials::preemptive_authorization);
        let mut response = self.send_once(&request, preemptive.as_deref()).await?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED && preemptive.is_none() {
            if let Some(authorization) = challenge_response(&request, response.headers()) {
                debug!("Answering authentication challenge");
                response = self.send_once(&request, Some(&authorization)).await?;
            }
        }

        let metadata = metadata_of(response.status(), response.headers());
        if self.config.log_exchanges {
            if metadata.is_success() {
                debug!(
                    status = metadata.status,
                    content_length = metadata.content_length,
                    "Response received"
                );
            } else {
                info!(
                    status = metadata.status,
                    content_length = metadata.content_length,
                    "Non-success response"
                );
            }
        }

        if metadata.is_success() || metadata.is_safe_redirect() {
            let body: AsyncBody = response.bytes_stream().map_err(Error::from).boxed();
            return Ok(TransportOutcome::from_parts(metadata, body));
        }

        if self.config.log_exchanges {
            let text = response.text().await.unwrap_or_default();
            debug!(body = %sanitize_error_message(&text), "Error response body");
        }
        Err(Error::http(metadata))
    }

    async fn send_once(
        &self,
        request: &TransportRequest,
        authorization: Option<&str>,
    ) -> Result<reqwest::Response> {
        let mut req = self
            .inner
            .request(request.method.to_reqwest(), &request.url);

        for (name, value) in request.headers.pairs() {
            req = req.header(name, value);
        }
        if let Some(authorization) = authorization {
            if !request.headers.contains_key_ignore_case("authorization") {
                req = req.header(AUTHORIZATION, authorization);
            }
        }
        if let Some(timeout) = request.timeout {
            req = req.timeout(timeout);
        }

        req = match (&request.body, request.content_length) {
            (Some(body), _) => req.body(body.clone()),
            (None, Some(length)) => req.header(CONTENT_LENGTH, length).body(Vec::new()),
            (None, None) => req,
        };

        if self.config.log_exchanges {
            debug!(method = %request.method, url = %redact_url(&request.url), "Sending request");
        }

        Ok(req.send().await?)
    }
}

impl AsyncTransport for ReqwestTransport {
    fn send(
        &self,
        request: TransportRequest,
    ) -> BoxFuture<'_, Result<TransportOutcome<AsyncBody>>> {
        Box::pin(self.execute(request))
    }
}

/// Authorization value answering a `WWW-Authenticate` challenge, if the
/// request's credentials hold a matching entry.
pub(crate) fn challenge_response(
    request: &TransportRequest,
    headers: &reqwest::header::HeaderMap,
) -> Option<String> {
    let credentials = request.credentials.as_ref()?;
    let authority = request.authority()?;
    let scheme = headers
        .get(reqwest::header::WWW_AUTHENTICATE)?
        .to_str()
        .ok()?
        .split_whitespace()
        .next()?;
    credentials
        .for_challenge(&authority, scheme)
        .map(|credential| credential.authorization())
}

/// Response metadata from a status line and header map.
pub(crate) fn metadata_of(
    status: reqwest::StatusCode,
    headers: &reqwest::header::HeaderMap,
) -> ResponseMetadata {
    ResponseMetadata::new(
        status.as_u16(),
        status.canonical_reason().unwrap_or_default(),
        KeyValues::from(headers),
    )
}

pub(crate) fn proxy_for(endpoint: &EndpointConfig) -> Result<Option<reqwest::Proxy>> {
    let Some(config) = &endpoint.proxy else {
        return Ok(None);
    };
    let mut proxy = reqwest::Proxy::all(&config.url).map_err(|e| {
        Error::with_source(
            ErrorKind::Config(format!("Invalid proxy URL '{}'", redact_url(&config.url))),
            e,
        )
    })?;
    if let Some(username) = &config.username {
        proxy = proxy.basic_auth(username, config.password.as_deref().unwrap_or_default());
    }
    Ok(Some(proxy))
}

pub(crate) fn identity_for(endpoint: &EndpointConfig) -> Result<Option<reqwest::Identity>> {
    if endpoint.client_certificates.is_empty() {
        return Ok(None);
    }
    let mut pem = Vec::new();
    for path in &endpoint.client_certificates {
        let bytes = std::fs::read(path).map_err(|e| {
            Error::with_source(
                ErrorKind::Config(format!("Cannot read client certificate {}", path.display())),
                e,
            )
        })?;
        pem.extend_from_slice(&bytes);
        pem.push(b'\n');
    }
    let identity = reqwest::Identity::from_pem(&pem).map_err(|e| {
        Error::with_source(ErrorKind::Config("Invalid client certificate".to_string()), e)
    })?;
    Ok(Some(identity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{BasicCredentials, BearerToken, Credential, CredentialCache};
    use crate::endpoint::ProxyConfig;
    use crate::request::RequestMethod;
    use futures::TryStreamExt;
    use std::sync::Arc;
    use wiremock::matchers::{body_string, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport(server: &MockServer) -> ReqwestTransport {
        ReqwestTransport::new(
            &EndpointConfig::new(server.uri()),
            ClientConfig::builder().without_retry().build(),
        )
        .unwrap()
    }

    async fn body_of(outcome: TransportOutcome<AsyncBody>) -> Vec<u8> {
        match outcome {
            TransportOutcome::Response(response) => {
                let chunks: Vec<bytes::Bytes> = response.body.try_collect().await.unwrap();
                chunks.concat()
            }
            TransportOutcome::RedirectNoBody(meta) => panic!("unexpected redirect {}", meta.status),
        }
    }

    #[tokio::test]
    async fn test_transport_creation() {
        let endpoint = EndpointConfig::builder("http://localhost")
            .with_proxy(ProxyConfig {
                url: "http://proxy.internal:3128".into(),
                username: Some("u".into()),
                password: Some("p".into()),
            })
            .build();
        let transport = ReqwestTransport::new(&endpoint, ClientConfig::default()).unwrap();
        assert!(transport.config().log_exchanges);
    }

    #[tokio::test]
    async fn test_missing_certificate_is_config_error() {
        let endpoint = EndpointConfig::builder("http://localhost")
            .with_client_certificate("/nonexistent/client.pem")
            .build();
        let err = ReqwestTransport::new(&endpoint, ClientConfig::default()).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Config(_)));
    }

    #[tokio::test]
    async fn test_successful_request_with_preemptive_credentials() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/users"))
            .and(query_param("page", "2"))
            .and(header("Authorization", "Bearer test-token"))
            .and(header("X-Tenant", "acme"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "application/json")
                    .set_body_string(r#"{"success":true}"#),
            )
            .mount(&mock_server)
            .await;

        let mut request = TransportRequest::new(
            RequestMethod::Get,
            format!("{}/users?page=2", mock_server.uri()),
        );
        request.headers.add("X-Tenant", "acme");
        request.credentials = Some(Credentials::Single(Arc::new(BearerToken::new("test-token"))));

        let outcome = transport(&mock_server).send(request).await.unwrap();
        assert_eq!(outcome.metadata().status, 200);
        assert_eq!(
            outcome.metadata().content_type.as_deref(),
            Some("application/json")
        );
        assert_eq!(body_of(outcome).await, br#"{"success":true}"#);
    }

    #[tokio::test]
    async fn test_error_status_carries_metadata() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404).insert_header("ETag", "\"v1\""))
            .mount(&mock_server)
            .await;

        let url = format!("{}/missing", mock_server.uri());
        let request = TransportRequest::new(RequestMethod::Get, url);
        let err = transport(&mock_server).send(request).await.unwrap_err();

        assert_eq!(err.status(), Some(404));
        let meta = err.metadata().unwrap();
        assert_eq!(meta.reason, "Not Found");
        assert_eq!(meta.etag(), Some("\"v1\""));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_not_modified_is_redirect_outcome() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/cached"))
            .and(header("If-None-Match", "\"abc123\""))
            .respond_with(ResponseTemplate::new(304).insert_header("ETag", "\"abc123\""))
            .mount(&mock_server)
            .await;

        let url = format!("{}/cached", mock_server.uri());
        let mut request = TransportRequest::new(RequestMethod::Get, url);
        request.headers.add("If-None-Match", "\"abc123\"");

        let outcome = transport(&mock_server).send(request).await.unwrap();
        match outcome {
            TransportOutcome::RedirectNoBody(meta) => {
                assert_eq!(meta.status, 304);
                assert_eq!(meta.etag(), Some("\"abc123\""));
            }
            other => panic!("expected redirect outcome, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_credential_cache_answers_challenge() {
        let mock_server = MockServer::start().await;
        let basic = BasicCredentials::new("svc", "pw");

        Mock::given(method("GET"))
            .and(path("/secure"))
            .and(header("Authorization", basic.authorization().as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/secure"))
            .respond_with(
                ResponseTemplate::new(401).insert_header("WWW-Authenticate", "Basic realm=\"api\""),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let url = format!("{}/secure", mock_server.uri());
        let mut request = TransportRequest::new(RequestMethod::Get, url);
        let authority = request.authority().unwrap();
        let mut cache = CredentialCache::new();
        cache.add(authority.clone(), "Primary", Arc::new(BearerToken::new("t")));
        cache.add(authority, "Secondary", Arc::new(basic.clone()));
        request.credentials = Some(Credentials::Cache(cache));

        let outcome = transport(&mock_server).send(request).await.unwrap();
        assert_eq!(body_of(outcome).await, b"ok");
    }

    #[tokio::test]
    async fn test_empty_put_sends_zero_content_length() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/items/1"))
            .and(header("Content-Length", "0"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&mock_server)
            .await;

        let url = format!("{}/items/1", mock_server.uri());
        let mut request = TransportRequest::new(RequestMethod::Put, url);
        request.content_length = Some(0);

        let outcome = transport(&mock_server).send(request).await.unwrap();
        assert_eq!(outcome.metadata().status, 204);
    }

    #[tokio::test]
    async fn test_body_is_sent() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/items"))
            .and(body_string(r#"{"name":"widget"}"#))
            .respond_with(ResponseTemplate::new(201))
            .mount(&mock_server)
            .await;

        let url = format!("{}/items", mock_server.uri());
        let mut request = TransportRequest::new(RequestMethod::Post, url);
        request.headers.add("Content-Type", "application/json");
        request.body = Some(bytes::Bytes::from_static(br#"{"name":"widget"}"#));

        let outcome = transport(&mock_server).send(request).await.unwrap();
        assert_eq!(outcome.metadata().status, 201);
    }

    #[tokio::test]
    async fn test_service_unavailable_is_retryable() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let request = TransportRequest::new(RequestMethod::Get, mock_server.uri());
        let err = transport(&mock_server).send(request).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_connection_refused_is_retryable() {
        let request = TransportRequest::new(RequestMethod::Get, "http://127.0.0.1:1/unreachable");
        let transport = ReqwestTransport::new(
            &EndpointConfig::new("http://127.0.0.1:1"),
            ClientConfig::default(),
        )
        .unwrap();
        let err = transport.send(request).await.unwrap_err();
        assert!(err.is_retryable(), "expected retryable, got {err:?}");
    }
}
