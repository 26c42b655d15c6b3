//! Blocking transport over `reqwest::blocking`.
//!
//! Must not be created or used from inside an async runtime; use
//! [`ReqwestTransport`](crate::ReqwestTransport) there.

use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH};
use tracing::{debug, info, instrument};

use crate::client::{challenge_response, identity_for, metadata_of, proxy_for};
use crate::config::ClientConfig;
use crate::credentials::Credentials;
use crate::endpoint::EndpointConfig;
use crate::error::{Error, ErrorKind, Result};
use crate::request::TransportRequest;
use crate::security::{redact_url, sanitize_error_message};
use crate::transport::{BlockingBody, Transport, TransportOutcome};

/// Blocking HTTP transport for one endpoint.
#[derive(Debug, Clone)]
pub struct BlockingReqwestTransport {
    inner: reqwest::blocking::Client,
    config: ClientConfig,
}

impl BlockingReqwestTransport {
    /// Create a transport configured for `endpoint`.
    pub fn new(endpoint: &EndpointConfig, config: ClientConfig) -> Result<Self> {
        let mut builder = reqwest::blocking::Client::builder()
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

    /// Get the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn send_once(
        &self,
        request: &TransportRequest,
        authorization: Option<&str>,
    ) -> Result<reqwest::blocking::Response> {
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
            (Some(body), _) => req.body(body.to_vec()),
            (None, Some(length)) => req.header(CONTENT_LENGTH, length).body(Vec::new()),
            (None, None) => req,
        };

        if self.config.log_exchanges {
            debug!(method = %request.method, url = %redact_url(&request.url), "Sending request");
        }

        Ok(req.send()?)
    }
}

impl Transport for BlockingReqwestTransport {
    #[instrument(
        skip(self, request),
        fields(method = %request.method, url = %redact_url(&request.url))
    )]
    fn send(&self, request: TransportRequest) -> Result<TransportOutcome<BlockingBody>> {
        let preemptive = request
            .credentials
            .as_ref()
            .and_then(Credentials::preemptive_authorization);
        let mut response = self.send_once(&request, preemptive.as_deref())?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED && preemptive.is_none() {
            if let Some(authorization) = challenge_response(&request, response.headers()) {
                debug!("Answering authentication challenge");
                response = self.send_once(&request, Some(&authorization))?;
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
            let body: BlockingBody = Box::new(response);
            return Ok(TransportOutcome::from_parts(metadata, body));
        }

        if self.config.log_exchanges {
            let text = response.text().unwrap_or_default();
            debug!(body = %sanitize_error_message(&text), "Error response body");
        }
        Err(Error::http(metadata))
    }
}
