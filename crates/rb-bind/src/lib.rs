//! # restbind-bind
//!
//! Binds plain request models to HTTP calls and reads responses into typed
//! results.
//!
//! ## Features
//!
//! - **Model schema** - Each request type registers its fields once through
//!   [`Model::describe`]
//! - **Classification** - Fields become path segments, query parameters,
//!   headers, credentials or the request body
//! - **Metadata cache** - Classification runs once per profile and model type
//! - **Response reading** - Content-type driven deserialization with JSON, XML
//!   and text providers, plus [`Envelope`] and [`ResponseStream`] results
//! - **Façades** - [`HttpClient`] (async) and [`BlockingHttpClient`] running
//!   calls under the retry strategy of `restbind-client`
//!
//! ## Example
//!
//! ```rust,ignore
//! use restbind_bind::{HttpClient, Model, Schema};
//! use restbind_client::EndpointConfig;
//!
//! struct SearchUsers {
//!     org: String,
//!     q: String,
//! }
//!
//! impl Model for SearchUsers {
//!     fn describe(schema: &mut Schema<Self>) {
//!         schema.field("org", |m| &m.org);
//!         schema.field("q", |m| &m.q);
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), restbind_bind::Error> {
//!     let endpoint = EndpointConfig::new("https://api.example.com/{org}/users");
//!     let client = HttpClient::new(endpoint)?;
//!
//!     // GET https://api.example.com/acme/users?q=ada
//!     let users: Vec<serde_json::Value> = client
//!         .call(&SearchUsers { org: "acme".into(), q: "ada".into() })
//!         .await?;
//!     println!("{}", users.len());
//!     Ok(())
//! }
//! ```

mod binder;
mod blocking;
pub mod body;
mod cache;
mod classify;
mod client;
mod context;
mod convert;
pub mod deserialize;
mod headers;
mod model;
mod observer;
mod profile;
mod response;
mod url;
mod value;

pub use binder::Binder;
pub use blocking::{BlockingHttpClient, BlockingHttpClientBuilder, BlockingOperation};
pub use client::{HttpClient, HttpClientBuilder, Operation};
pub use context::BindingContext;
pub use observer::{CallObserver, NoopObserver, TracingObserver};

// Model schema and classification
pub use cache::MetadataCache;
pub use classify::{BindingTarget, FieldBinding, ModelDescriptor};
pub use convert::{BoundPair, Converter};
pub use model::{FieldSpec, Model, Schema};
pub use profile::{ClientProfile, DefaultProfile, Owner};

// Values
pub use value::{
    BindValue, ErasedModel, FieldKind, FormatSpec, ObjectRef, Scalar, ScalarValue,
    SeparatedConverter, ValueConverter, ValueView,
};

// Request composition
pub use body::{BodyEncoder, BodyFormat, RequestBody};
pub use headers::{compose_headers, resolve_credentials};
pub use crate::url::compose_url;

// Responses
pub use deserialize::{
    DeserializationProvider, DeserializeSink, DeserializerRegistry, JsonProvider, TargetShape,
    TargetType, TextProvider, TypedSink, XmlProvider,
};
pub use response::{
    read_async, read_blocking, Envelope, FromResponse, Json, ResponseFormat, ResponsePayload,
    ResponseStream, Xml,
};

pub use restbind_client::{Error, ErrorKind, Result};
