//! Response metadata shared by transports, errors and result envelopes.

use crate::kv::KeyValues;

/// Status codes treated as non-error outcomes when the caller asked for an
/// envelope result.
pub const SAFE_REDIRECT_STATUSES: [u16; 5] = [301, 302, 303, 304, 307];

/// Returns true if `status` is one of the safe redirect codes.
pub fn is_safe_redirect(status: u16) -> bool {
    SAFE_REDIRECT_STATUSES.contains(&status)
}

/// Status line and headers of an HTTP response, detached from its body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseMetadata {
    /// HTTP status code.
    pub status: u16,
    /// Status description (reason phrase).
    pub reason: String,
    /// Response headers in received order.
    pub headers: KeyValues,
    /// Content-Type header value, if any.
    pub content_type: Option<String>,
    /// Content-Length header value, if any.
    pub content_length: Option<u64>,
}

impl ResponseMetadata {
    /// Create metadata with the given status and headers.
    ///
    /// `content_type` and `content_length` are read from the headers.
    pub fn new(status: u16, reason: impl Into<String>, headers: KeyValues) -> Self {
        let content_type = headers.get_ignore_case("content-type").map(str::to_string);
        let content_length = headers
            .get_ignore_case("content-length")
            .and_then(|v| v.trim().parse().ok());
        Self {
            status,
            reason: reason.into(),
            headers,
            content_type,
            content_length,
        }
    }

    /// Returns true if the response status is successful (2xx).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns true if this is a safe redirect status.
    pub fn is_safe_redirect(&self) -> bool {
        is_safe_redirect(self.status)
    }

    /// Get a header value (case-insensitive name).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get_ignore_case(name)
    }

    /// Get the ETag header value.
    pub fn etag(&self) -> Option<&str> {
        self.header("etag")
    }

    /// Get the Last-Modified header value.
    pub fn last_modified(&self) -> Option<&str> {
        self.header("last-modified")
    }

    /// Get the Content-Encoding header value.
    pub fn content_encoding(&self) -> Option<&str> {
        self.header("content-encoding")
    }

    /// Scheme of the `WWW-Authenticate` challenge (e.g. `Basic`), if any.
    pub fn challenge_scheme(&self) -> Option<&str> {
        self.header("www-authenticate")
            .and_then(|v| v.split_whitespace().next())
    }
}
