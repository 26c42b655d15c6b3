//! Endpoint configuration and the providers that look it up by name.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::credentials::CredentialSpec;
use crate::error::{Error, ErrorKind, Result};
use crate::request::RequestMethod;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT_MS: u64 = 90_000;

/// One statically configured header.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HeaderEntry {
    pub name: String,
    pub value: String,
}

/// Outbound proxy settings.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyConfig {
    /// Proxy URL, e.g. `http://proxy.internal:3128`.
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("url", &crate::security::redact_url(&self.url))
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Everything the pipeline needs to know about one named endpoint.
///
/// Deserializes from camelCase JSON; absent keys take the defaults
/// (timeout 90 000 ms, automatic `Accept-Encoding` on, everything else empty).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EndpointConfig {
    /// Base URL, possibly holding `{placeholder}` path segments.
    pub base_url: String,
    /// Pinned HTTP method; inferred per call when absent.
    pub method: Option<RequestMethod>,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Advertise the registered content decoders in `Accept-Encoding`.
    pub auto_accept_encoding: bool,
    /// Static headers, applied in order before model headers.
    pub headers: Vec<HeaderEntry>,
    /// Default credentials, used when the model carries none.
    pub credentials: Option<CredentialSpec>,
    /// PEM files holding a client certificate and its private key.
    pub client_certificates: Vec<PathBuf>,
    /// Outbound proxy.
    pub proxy: Option<ProxyConfig>,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            method: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            auto_accept_encoding: true,
            headers: Vec::new(),
            credentials: None,
            client_certificates: Vec::new(),
            proxy: None,
        }
    }
}

impl EndpointConfig {
    /// Start building a configuration for `base_url`.
    pub fn builder(base_url: impl Into<String>) -> EndpointConfigBuilder {
        EndpointConfigBuilder {
            config: EndpointConfig {
                base_url: base_url.into(),
                ..Default::default()
            },
        }
    }

    /// A configuration with defaults and the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::builder(base_url).build()
    }

    /// Look up `name` in `provider`, falling back to the compiled-in defaults.
    pub fn from_provider(provider: &dyn EndpointProvider, name: &str) -> Result<Self> {
        Ok(provider.endpoint(name)?.unwrap_or_default())
    }

    /// The timeout as a Duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Builder for EndpointConfig.
#[derive(Debug, Clone)]
pub struct EndpointConfigBuilder {
    config: EndpointConfig,
}

impl EndpointConfigBuilder {
    /// Pin the HTTP method.
    pub fn with_method(mut self, method: RequestMethod) -> Self {
        self.config.method = Some(method);
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Enable or disable the automatic `Accept-Encoding` header.
    pub fn with_auto_accept_encoding(mut self, enabled: bool) -> Self {
        self.config.auto_accept_encoding = enabled;
        self
    }

    /// Append a static header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.headers.push(HeaderEntry {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Default basic credentials.
    pub fn with_basic_auth(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.config.credentials = Some(CredentialSpec::Basic {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// Default bearer token.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.config.credentials = Some(CredentialSpec::Bearer {
            token: token.into(),
        });
        self
    }

    /// Add a PEM client certificate file.
    pub fn with_client_certificate(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.client_certificates.push(path.into());
        self
    }

    /// Route requests through a proxy.
    pub fn with_proxy(mut self, proxy: ProxyConfig) -> Self {
        self.config.proxy = Some(proxy);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> EndpointConfig {
        self.config
    }
}

/// Looks up endpoint configuration by name.
pub trait EndpointProvider: Send + Sync {
    /// The configuration for `name`, or None if unconfigured.
    fn endpoint(&self, name: &str) -> Result<Option<EndpointConfig>>;
}

/// Endpoints held in memory, optionally loaded from JSON.
///
/// The JSON form is an object keyed by endpoint name:
///
/// ```json
/// { "users": { "baseUrl": "https://api.example.com/users/{id}", "timeoutMs": 5000 } }
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticEndpoints {
    endpoints: HashMap<String, EndpointConfig>,
}

impl StaticEndpoints {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an endpoint.
    pub fn with_endpoint(mut self, name: impl Into<String>, config: EndpointConfig) -> Self {
        self.endpoints.insert(name.into(), config);
        self
    }

    /// Parse endpoints from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let endpoints = serde_json::from_str(json).map_err(|e| {
            Error::with_source(
                ErrorKind::Config(format!("Invalid endpoint configuration: {e}")),
                e,
            )
        })?;
        Ok(Self { endpoints })
    }

    /// Load endpoints from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::with_source(
                ErrorKind::Config(format!("Cannot read {}: {e}", path.display())),
                e,
            )
        })?;
        Self::from_json_str(&contents)
    }

    /// Configured endpoint names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.endpoints.keys().map(String::as_str)
    }
}

impl EndpointProvider for StaticEndpoints {
    fn endpoint(&self, name: &str) -> Result<Option<EndpointConfig>> {
        Ok(self.endpoints.get(name).cloned())
    }
}

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Endpoints read from environment variables.
///
/// For prefix `RESTBIND` and endpoint `users`:
///
/// | Variable | Meaning |
/// |---|---|
/// | `RESTBIND_USERS_URL` | base URL (required; endpoint is unconfigured without it) |
/// | `RESTBIND_USERS_METHOD` | pinned method |
/// | `RESTBIND_USERS_TIMEOUT_MS` | timeout |
/// | `RESTBIND_USERS_ACCEPT_ENCODING` | `true`/`false` |
/// | `RESTBIND_USERS_HEADERS` | `Name: value; Other: value` |
/// | `RESTBIND_USERS_BEARER_TOKEN` | bearer credentials |
/// | `RESTBIND_USERS_USERNAME` / `_PASSWORD` | basic credentials |
/// | `RESTBIND_USERS_PROXY` | proxy URL |
pub struct EnvEndpoints {
    prefix: String,
    lookup: EnvLookup,
}

impl fmt::Debug for EnvEndpoints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvEndpoints")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl EnvEndpoints {
    /// Read from the process environment.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self::with_lookup(prefix, |key| std::env::var(key).ok())
    }

    /// Read through a custom lookup function.
    pub fn with_lookup(
        prefix: impl Into<String>,
        lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            lookup: Box::new(lookup),
        }
    }

    fn key(&self, name: &str, suffix: &str) -> String {
        let name: String = name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("{}_{}_{}", self.prefix, name, suffix)
    }

    fn var(&self, name: &str, suffix: &str) -> Option<String> {
        (self.lookup)(&self.key(name, suffix)).filter(|v| !v.trim().is_empty())
    }
}

impl EndpointProvider for EnvEndpoints {
    fn endpoint(&self, name: &str) -> Result<Option<EndpointConfig>> {
        let Some(base_url) = self.var(name, "URL") else {
            return Ok(None);
        };
        let mut builder = EndpointConfig::builder(base_url);

        if let Some(method) = self.var(name, "METHOD") {
            builder = builder.with_method(method.parse()?);
        }

        if let Some(timeout) = self.var(name, "TIMEOUT_MS") {
            let ms: u64 = timeout.trim().parse().map_err(|_| {
                Error::config(format!(
                    "{} must be a number of milliseconds, got '{timeout}'",
                    self.key(name, "TIMEOUT_MS")
                ))
            })?;
            builder = builder.with_timeout(Duration::from_millis(ms));
        }

        if let Some(flag) = self.var(name, "ACCEPT_ENCODING") {
            builder = builder.with_auto_accept_encoding(parse_flag(&flag).ok_or_else(|| {
                Error::config(format!(
                    "{} must be true or false, got '{flag}'",
                    self.key(name, "ACCEPT_ENCODING")
                ))
            })?);
        }

        if let Some(headers) = self.var(name, "HEADERS") {
            for entry in headers.split(';').filter(|e| !e.trim().is_empty()) {
                let (header, value) = entry.split_once(':').ok_or_else(|| {
                    Error::config(format!(
                        "{} entries must look like 'Name: value'",
                        self.key(name, "HEADERS")
                    ))
                })?;
                builder = builder.with_header(header.trim(), value.trim());
            }
        }

        if let Some(token) = self.var(name, "BEARER_TOKEN") {
            builder = builder.with_bearer_token(token);
        } else if let Some(username) = self.var(name, "USERNAME") {
            let password = self.var(name, "PASSWORD").unwrap_or_default();
            builder = builder.with_basic_auth(username, password);
        }

        if let Some(proxy) = self.var(name, "PROXY") {
            builder = builder.with_proxy(ProxyConfig {
                url: proxy,
                username: None,
                password: None,
            });
        }

        Ok(Some(builder.build()))
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
