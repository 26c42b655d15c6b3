//! # restbind-client
//!
//! HTTP transport infrastructure underneath the restbind binding engine.
//!
//! This crate provides:
//! - The [`Transport`] / [`AsyncTransport`] abstraction with reqwest-backed
//!   implementations
//! - Endpoint configuration and providers (static, JSON file, environment)
//! - The execute strategy: retry with an ordered delay list, cancellation,
//!   call-site error wrapping
//! - Credential types, including per-challenge credential caches
//! - Content decoders for gzip and deflate bodies
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                restbind-bind (HttpClient)                   │
//! │  - Binds request models to URL, headers, credentials, body  │
//! │  - Reads responses into typed results                       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    ExecuteStrategy                          │
//! │  - Retry delays, retry classification, cancellation         │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │        ReqwestTransport / BlockingReqwestTransport          │
//! │  - Timeouts, proxy, client certificates, auth challenges    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use restbind_client::{AsyncTransport, ClientConfig, EndpointConfig, ReqwestTransport,
//!     RequestMethod, TransportRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), restbind_client::Error> {
//!     let endpoint = EndpointConfig::new("https://api.example.com");
//!     let transport = ReqwestTransport::new(&endpoint, ClientConfig::default())?;
//!
//!     let outcome = transport
//!         .send(TransportRequest::new(RequestMethod::Get, "https://api.example.com/health"))
//!         .await?;
//!     println!("{}", outcome.metadata().status);
//!     Ok(())
//! }
//! ```

mod blocking;
mod client;
mod config;
mod credentials;
mod decode;
mod endpoint;
mod error;
mod execute;
mod kv;
mod request;
mod response;
mod retry;
pub mod security;
mod transport;

pub use blocking::BlockingReqwestTransport;
pub use client::ReqwestTransport;
pub use config::{ClientConfig, ClientConfigBuilder};
pub use credentials::{
    BasicCredentials, BearerToken, Credential, CredentialCache, CredentialSpec, Credentials,
};
pub use decode::{ContentDecoder, DecoderRegistry, DeflateDecoder, GzipDecoder};
pub use endpoint::{
    EndpointConfig, EndpointConfigBuilder, EndpointProvider, EnvEndpoints, HeaderEntry,
    ProxyConfig, StaticEndpoints, DEFAULT_TIMEOUT_MS,
};
pub use error::{Error, ErrorKind, Result};
pub use execute::{CallSite, ExecuteStrategy};
pub use kv::KeyValues;
pub use request::{authority_of, RequestMethod, TransportRequest};
pub use response::{is_safe_redirect, ResponseMetadata, SAFE_REDIRECT_STATUSES};
pub use retry::{BackoffStrategy, DefaultRetryClassifier, RetryClassifier, RetryConfig, RetryPolicy};
pub use transport::{
    AsyncBody, AsyncTransport, BlockingBody, Transport, TransportOutcome, TransportResponse,
};

/// User-Agent string for the client
pub const USER_AGENT: &str = concat!("restbind/", env!("CARGO_PKG_VERSION"));
