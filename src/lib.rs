//! # restbind
//!
//! A declarative HTTP client for Rust.
//!
//! Request models are plain structs. Each one describes its fields once, and
//! the binder turns a value into a URL, headers, credentials and a body.
//! Responses are read into typed results chosen by content type.
//!
//! ## Security
//!
//! - Credentials are redacted in Debug output
//! - URLs are logged without userinfo
//! - Error bodies are sanitized before they reach error messages
//!
//! ## Crates
//!
//! - **restbind-client** - Transports, endpoint configuration, retries, credentials and
//!   content decoding
//! - **restbind-bind** - Model binding, response reading, async and blocking clients
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use restbind::bind::{Model, Schema};
//! use restbind::client::EndpointConfig;
//!
//! struct GetUser {
//!     id: u64,
//! }
//!
//! impl Model for GetUser {
//!     fn describe(schema: &mut Schema<Self>) {
//!         schema.field("id", |m| &m.id).path();
//!     }
//! }
//!
//! #[derive(serde::Deserialize)]
//! struct User {
//!     name: String,
//! }
//!
//! restbind::http_client! {
//!     /// The users service.
//!     pub struct UsersApi;
//!
//!     fn get_user(GetUser) -> User;
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), restbind::Error> {
//!     let api = UsersApi::new(EndpointConfig::new("https://api.example.com/users/{id}"))?;
//!     let user = api.get_user(&GetUser { id: 7 }).await?;
//!     println!("{}", user.name);
//!     Ok(())
//! }
//! ```

// Re-export all crates for convenient access
pub use restbind_bind as bind;
pub use restbind_client as client;

// Re-export commonly used types at the top level
pub use restbind_bind::{BlockingHttpClient, HttpClient, Model, Schema};
pub use restbind_client::{ClientConfig, EndpointConfig, Error, ErrorKind, Result};

/// Generate a typed client from a list of operations.
///
/// Each `fn name(Request) -> Response;` becomes a method taking `&Request`.
/// Prefix `struct` with `blocking` for a client built on
/// [`BlockingHttpClient`]. An optional `<Profile>` after the name selects the
/// client profile.
///
/// ```rust,ignore
/// restbind::http_client! {
///     pub struct OrdersApi<OrdersProfile>;
///
///     fn get_order(GetOrder) -> Order;
///     fn cancel_order(CancelOrder) -> ();
/// }
///
/// restbind::http_client! {
///     pub blocking struct OrdersSync;
///
///     fn get_order(GetOrder) -> Order;
/// }
/// ```
#[macro_export]
macro_rules! http_client {
    (
        $(#[$meta:meta])*
        $vis:vis blocking struct $name:ident $(<$profile:ty>)?;
        $(
            $(#[$op_meta:meta])*
            fn $op:ident($request:ty) -> $response:ty;
        )*
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        $vis struct $name {
            inner: $crate::bind::BlockingHttpClient<$crate::__http_client_profile!($($profile)?)>,
        }

        impl $name {
            /// Create the client for `endpoint` with default settings.
            pub fn new(endpoint: $crate::client::EndpointConfig) -> $crate::client::Result<Self> {
                Ok(Self {
                    inner: $crate::bind::BlockingHttpClient::builder(endpoint).build()?,
                })
            }

            /// Wrap a configured client.
            pub fn from_client(
                inner: $crate::bind::BlockingHttpClient<
                    $crate::__http_client_profile!($($profile)?),
                >,
            ) -> Self {
                Self { inner }
            }

            /// The underlying client.
            pub fn inner(
                &self,
            ) -> &$crate::bind::BlockingHttpClient<$crate::__http_client_profile!($($profile)?)> {
                &self.inner
            }

            $(
                $(#[$op_meta])*
                pub fn $op(&self, request: &$request) -> $crate::client::Result<$response> {
                    self.inner.call(request)
                }
            )*
        }
    };
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident $(<$profile:ty>)?;
        $(
            $(#[$op_meta:meta])*
            fn $op:ident($request:ty) -> $response:ty;
        )*
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        $vis struct $name {
            inner: $crate::bind::HttpClient<$crate::__http_client_profile!($($profile)?)>,
        }

        impl $name {
            /// Create the client for `endpoint` with default settings.
            pub fn new(endpoint: $crate::client::EndpointConfig) -> $crate::client::Result<Self> {
                Ok(Self {
                    inner: $crate::bind::HttpClient::builder(endpoint).build()?,
                })
            }

            /// Wrap a configured client.
            pub fn from_client(
                inner: $crate::bind::HttpClient<$crate::__http_client_profile!($($profile)?)>,
            ) -> Self {
                Self { inner }
            }

            /// The underlying client.
            pub fn inner(
                &self,
            ) -> &$crate::bind::HttpClient<$crate::__http_client_profile!($($profile)?)> {
                &self.inner
            }

            $(
                $(#[$op_meta])*
                pub async fn $op(&self, request: &$request) -> $crate::client::Result<$response> {
                    self.inner.call(request).await
                }
            )*
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __http_client_profile {
    () => {
        $crate::bind::DefaultProfile
    };
    ($profile:ty) => {
        $profile
    };
}
