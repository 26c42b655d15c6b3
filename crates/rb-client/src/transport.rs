//! Transport abstraction consumed by the binding pipeline.
//!
//! A transport sends one [`TransportRequest`] and returns either a response
//! with a readable body or, for safe redirect statuses, metadata only.
//! Non-success statuses are errors of kind [`ErrorKind::Http`](crate::ErrorKind::Http).

use std::io::Read;

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::stream::BoxStream;

use crate::error::Result;
use crate::request::TransportRequest;
use crate::response::ResponseMetadata;

/// Response body read synchronously.
pub type BlockingBody = Box<dyn Read + Send>;

/// Response body streamed asynchronously.
pub type AsyncBody = BoxStream<'static, Result<Bytes>>;

/// Response metadata plus a live body.
pub struct TransportResponse<B> {
    /// Status and headers.
    pub metadata: ResponseMetadata,
    /// Body, owned by whoever consumes it.
    pub body: B,
}

impl<B> std::fmt::Debug for TransportResponse<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportResponse")
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// Outcome of a successful send.
pub enum TransportOutcome<B> {
    /// A response to be read.
    Response(TransportResponse<B>),
    /// A safe redirect status (301, 302, 303, 304, 307) with no usable body.
    RedirectNoBody(ResponseMetadata),
}

impl<B> std::fmt::Debug for TransportOutcome<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportOutcome::Response(response) => response.fmt(f),
            TransportOutcome::RedirectNoBody(metadata) => {
                f.debug_tuple("RedirectNoBody").field(metadata).finish()
            }
        }
    }
}

impl<B> TransportOutcome<B> {
    /// Metadata of either variant.
    pub fn metadata(&self) -> &ResponseMetadata {
        match self {
            TransportOutcome::Response(response) => &response.metadata,
            TransportOutcome::RedirectNoBody(metadata) => metadata,
        }
    }

    /// Classify a received response by status.
    pub fn from_parts(metadata: ResponseMetadata, body: B) -> Self {
        if metadata.is_safe_redirect() {
            TransportOutcome::RedirectNoBody(metadata)
        } else {
            TransportOutcome::Response(TransportResponse { metadata, body })
        }
    }
}

/// Blocking transport.
pub trait Transport: Send + Sync {
    /// Send a request and wait for the response head.
    fn send(&self, request: TransportRequest) -> Result<TransportOutcome<BlockingBody>>;
}

/// Async transport.
pub trait AsyncTransport: Send + Sync {
    /// Send a request and resolve once the response head arrived.
    fn send(&self, request: TransportRequest) -> BoxFuture<'_, Result<TransportOutcome<AsyncBody>>>;
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn send(&self, request: TransportRequest) -> Result<TransportOutcome<BlockingBody>> {
        (**self).send(request)
    }
}

impl<T: AsyncTransport + ?Sized> AsyncTransport for std::sync::Arc<T> {
    fn send(
        &self,
        request: TransportRequest,
    ) -> BoxFuture<'_, Result<TransportOutcome<AsyncBody>>> {
        (**self).send(request)
    }
}
