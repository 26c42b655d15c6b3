//! Error types for restbind.

use crate::response::ResponseMetadata;

/// Result type alias for restbind operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for restbind operations.
#[derive(Debug, thiserror::Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional source error.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Create a new error with the given kind.
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, source: None }
    }

    /// Create a new error with the given kind and source.
    pub fn with_source(
        kind: ErrorKind,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            source: Some(Box::new(source)),
        }
    }

    /// Shorthand for a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config(message.into()))
    }

    /// Shorthand for a cancelled call.
    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled)
    }

    /// Create an HTTP error carrying the response metadata.
    pub fn http(metadata: ResponseMetadata) -> Self {
        Self::new(ErrorKind::Http(Box::new(metadata)))
    }

    /// Returns true if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// Returns true if the call was cancelled by the caller.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.root_kind(), ErrorKind::Cancelled)
    }

    /// Returns true if this error is already a client-level error that the
    /// execute strategy propagates without wrapping.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::Call { .. } | ErrorKind::Http(_) | ErrorKind::Cancelled
        )
    }

    /// The innermost restbind error kind, following wrapped sources.
    pub fn root_kind(&self) -> &ErrorKind {
        let mut current = self;
        while let Some(inner) = current
            .source
            .as_deref()
            .and_then(|s| s.downcast_ref::<Error>())
        {
            current = inner;
        }
        &current.kind
    }

    /// Response metadata carried by this error or any wrapped error.
    pub fn metadata(&self) -> Option<&ResponseMetadata> {
        let mut current = Some(self);
        while let Some(err) = current {
            if let ErrorKind::Http(meta) = &err.kind {
                return Some(meta);
            }
            current = err
                .source
                .as_deref()
                .and_then(|s| s.downcast_ref::<Error>());
        }
        None
    }

    /// HTTP status carried by this error or any wrapped error.
    pub fn status(&self) -> Option<u16> {
        self.metadata().map(|m| m.status)
    }
}

/// The kind of error that occurred.
#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    /// Malformed or ambiguous model annotation, or invalid client setup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Building the request URL failed.
    #[error("Failed to build URL from base '{base_url}' for model '{model_type}'")]
    UrlBuild {
        base_url: String,
        model_type: String,
    },

    /// Building headers, credentials or body failed.
    #[error("Failed to compose request: {0}")]
    Composition(String),

    /// Connection error.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Request timeout.
    #[error("Request timeout")]
    Timeout,

    /// The server answered with a non-success status.
    #[error("HTTP error: {} {}", .0.status, .0.reason)]
    Http(Box<ResponseMetadata>),

    /// No deserializer applies to the response.
    #[error("Cannot determine how to deserialize {content_type} into {target}")]
    NoDeserializer { content_type: String, target: String },

    /// A deserializer failed.
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Request body serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The caller cancelled the call.
    #[error("Call cancelled")]
    Cancelled,

    /// An application error classified as never worth retrying.
    #[error("Unrecoverable error: {0}")]
    Unrecoverable(String),

    /// Operation not supported.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// A client call failed; the original cause is the error source.
    #[error("Call to '{base_url}' from client '{client}' failed: {message}")]
    Call {
        base_url: String,
        client: String,
        message: String,
    },

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl ErrorKind {
    /// Returns true if this error kind is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            ErrorKind::Timeout => true,
            ErrorKind::Connection(_) => true,
            ErrorKind::Http(meta) => is_retryable_status(meta.status),
            _ => false,
        }
    }
}

/// Service unavailable, request timeout and gateway timeout.
fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 503 | 504)
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            ErrorKind::Timeout
        } else if err.is_connect() {
            ErrorKind::Connection(err.to_string())
        } else if err.is_builder() {
            ErrorKind::Config(err.to_string())
        } else if err.is_request() || err.is_body() {
            ErrorKind::Connection(err.to_string())
        } else {
            ErrorKind::Other(err.to_string())
        };

        Error::with_source(kind, err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::TimedOut => ErrorKind::Timeout,
            std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::UnexpectedEof => ErrorKind::Connection(err.to_string()),
            _ => ErrorKind::Other(err.to_string()),
        };
        Error::with_source(kind, err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::with_source(ErrorKind::Deserialization(err.to_string()), err)
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::with_source(ErrorKind::Config(format!("Invalid URL: {}", err)), err)
    }
}
