//! Typed results and response reading.
//!
//! A declared result type picks how the body is read, in this order: a
//! format marker on the result type, the client profile's format marker
//! (typed results only), a raw stream, the empty result, the first accepting
//! deserialization provider, text, bytes. Anything else fails with
//! `ErrorKind::NoDeserializer`.

use std::any::{Any, TypeId};
use std::fmt;
use std::io::Read;
use std::sync::Arc;

use futures::StreamExt;
use restbind_client::{
    AsyncBody, BlockingBody, DecoderRegistry, Error, ErrorKind, KeyValues, ResponseMetadata,
    Result, TransportOutcome, TransportResponse,
};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::deserialize::{
    decode_text, DeserializationProvider, DeserializeSink, DeserializerRegistry, TargetShape,
    TargetType, TypedSink,
};
use crate::profile::Owner;

/// An explicit response format marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseFormat {
    Json,
    Xml,
    /// A provider registered under this name.
    Named(String),
}

impl ResponseFormat {
    /// Registry name of the provider.
    pub fn provider_name(&self) -> &str {
        match self {
            ResponseFormat::Json => "json",
            ResponseFormat::Xml => "xml",
            ResponseFormat::Named(name) => name,
        }
    }
}

/// Body handed to [`FromResponse::from_payload`].
pub enum ResponsePayload {
    /// Output of a deserialization provider.
    Decoded(Box<dyn Any + Send>),
    Text(String),
    Bytes(Vec<u8>),
    Empty,
    Stream(ResponseStream),
}

impl fmt::Debug for ResponsePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponsePayload::Decoded(_) => f.write_str("Decoded"),
            ResponsePayload::Text(text) => f.debug_tuple("Text").field(&text.len()).finish(),
            ResponsePayload::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            ResponsePayload::Empty => f.write_str("Empty"),
            ResponsePayload::Stream(_) => f.write_str("Stream"),
        }
    }
}

/// A type a response can be read into.
///
/// Implemented for every `DeserializeOwned` type: `String` reads text,
/// `Vec<u8>` reads bytes, `()` discards the body, anything else goes through
/// the deserialization providers.
pub trait FromResponse: Sized + Send + 'static {
    /// Name and shape of this type.
    fn target() -> TargetType;

    /// Explicit format marker.
    fn format() -> Option<ResponseFormat> {
        None
    }

    /// Sink a provider writes the value into.
    fn sink() -> Box<dyn DeserializeSink>;

    /// Build the result.
    fn from_payload(payload: ResponsePayload, metadata: ResponseMetadata) -> Result<Self>;

    /// Result for a safe redirect status. `None` makes the redirect an error.
    fn from_redirect(_metadata: &ResponseMetadata) -> Option<Self> {
        None
    }
}

fn downcast<T: 'static>(value: Box<dyn Any + Send>) -> Result<T> {
    value.downcast::<T>().map(|v| *v).map_err(|_| {
        Error::new(ErrorKind::Deserialization(format!(
            "payload does not match {}",
            std::any::type_name::<T>()
        )))
    })
}

fn payload_into<T: 'static>(payload: ResponsePayload) -> Result<T> {
    match payload {
        ResponsePayload::Decoded(value) => downcast(value),
        ResponsePayload::Text(text) => downcast(Box::new(text)),
        ResponsePayload::Bytes(bytes) => downcast(Box::new(bytes)),
        ResponsePayload::Empty => downcast(Box::new(())),
        ResponsePayload::Stream(_) => Err(Error::new(ErrorKind::Unsupported(format!(
            "a body stream cannot be read into {}",
            std::any::type_name::<T>()
        )))),
    }
}

impl<T: DeserializeOwned + Send + 'static> FromResponse for T {
    fn target() -> TargetType {
        let id = TypeId::of::<T>();
        let shape = if id == TypeId::of::<()>() {
            TargetShape::Empty
        } else if id == TypeId::of::<String>() {
            TargetShape::Text
        } else if id == TypeId::of::<Vec<u8>>() {
            TargetShape::Bytes
        } else {
            TargetShape::Typed
        };
        TargetType::new(std::any::type_name::<T>(), shape)
    }

    fn sink() -> Box<dyn DeserializeSink> {
        Box::new(TypedSink::<T>::new(Self::target()))
    }

    fn from_payload(payload: ResponsePayload, _metadata: ResponseMetadata) -> Result<Self> {
        payload_into(payload)
    }
}

macro_rules! format_wrapper {
    ($(#[$doc:meta])* $name:ident => $format:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq)]
        pub struct $name<T>(pub T);

        impl<T> $name<T> {
            /// Unwrap the value.
            pub fn into_inner(self) -> T {
                self.0
            }
        }

        impl<T: DeserializeOwned + Send + 'static> FromResponse for $name<T> {
            fn target() -> TargetType {
                TargetType::new(std::any::type_name::<T>(), TargetShape::Typed)
            }

            fn format() -> Option<ResponseFormat> {
                Some($format)
            }

            fn sink() -> Box<dyn DeserializeSink> {
                Box::new(TypedSink::<T>::new(Self::target()))
            }

            fn from_payload(payload: ResponsePayload, _metadata: ResponseMetadata) -> Result<Self> {
                payload_into(payload).map($name)
            }
        }
    };
}

format_wrapper!(
    /// A value always read as JSON, whatever the content type.
    Json => ResponseFormat::Json
);
format_wrapper!(
    /// A value always read as XML, whatever the content type.
    Xml => ResponseFormat::Xml
);

/// A value plus the response status line and headers.
///
/// A safe redirect status (301, 302, 303, 304, 307) yields an envelope with
/// no value instead of an error.
#[derive(Debug)]
pub struct Envelope<T> {
    pub value: Option<T>,
    pub status: u16,
    pub reason: String,
    pub headers: KeyValues,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

impl<T> Envelope<T> {
    fn from_metadata(value: Option<T>, metadata: &ResponseMetadata) -> Self {
        Self {
            value,
            status: metadata.status,
            reason: metadata.reason.clone(),
            etag: metadata.etag().map(str::to_string),
            last_modified: metadata.last_modified().map(str::to_string),
            headers: metadata.headers.clone(),
        }
    }
}

impl<T: FromResponse> FromResponse for Envelope<T> {
    fn target() -> TargetType {
        T::target()
    }

    fn format() -> Option<ResponseFormat> {
        T::format()
    }

    fn sink() -> Box<dyn DeserializeSink> {
        T::sink()
    }

    fn from_payload(payload: ResponsePayload, metadata: ResponseMetadata) -> Result<Self> {
        let value = T::from_payload(payload, metadata.clone())?;
        Ok(Self::from_metadata(Some(value), &metadata))
    }

    fn from_redirect(metadata: &ResponseMetadata) -> Option<Self> {
        Some(Self::from_metadata(None, metadata))
    }
}

/// The live response body; the caller owns and drains it.
///
/// Blocking streams are already decoded; async streams arrive as sent.
pub enum ResponseStream {
    Blocking(BlockingBody),
    Async(AsyncBody),
}

impl fmt::Debug for ResponseStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseStream::Blocking(_) => f.write_str("ResponseStream::Blocking"),
            ResponseStream::Async(_) => f.write_str("ResponseStream::Async"),
        }
    }
}

impl ResponseStream {
    /// The blocking reader, if this is a blocking stream.
    pub fn into_reader(self) -> Option<BlockingBody> {
        match self {
            ResponseStream::Blocking(body) => Some(body),
            ResponseStream::Async(_) => None,
        }
    }

    /// The async stream, if this is an async stream.
    pub fn into_stream(self) -> Option<AsyncBody> {
        match self {
            ResponseStream::Async(body) => Some(body),
            ResponseStream::Blocking(_) => None,
        }
    }
}

impl FromResponse for ResponseStream {
    fn target() -> TargetType {
        TargetType::new("ResponseStream", TargetShape::Stream)
    }

    fn sink() -> Box<dyn DeserializeSink> {
        Box::new(TypedSink::<()>::new(Self::target()))
    }

    fn from_payload(payload: ResponsePayload, _metadata: ResponseMetadata) -> Result<Self> {
        match payload {
            ResponsePayload::Stream(stream) => Ok(stream),
            other => Err(Error::new(ErrorKind::Unsupported(format!(
                "expected a body stream, got {other:?}"
            )))),
        }
    }
}

enum ReadPlan {
    Provider(Arc<dyn DeserializationProvider>),
    Stream,
    Empty,
    Text,
    Bytes,
}

fn provider_named(
    registry: &DeserializerRegistry,
    format: &ResponseFormat,
) -> Result<Arc<dyn DeserializationProvider>> {
    registry.by_name(format.provider_name()).ok_or_else(|| {
        Error::config(format!(
            "no deserialization provider named '{}'",
            format.provider_name()
        ))
    })
}

fn plan<R: FromResponse>(
    registry: &DeserializerRegistry,
    owner: &Owner,
    metadata: &ResponseMetadata,
) -> Result<ReadPlan> {
    let target = R::target();
    if let Some(format) = R::format() {
        return provider_named(registry, &format).map(ReadPlan::Provider);
    }
    if target.shape == TargetShape::Typed {
        if let Some(format) = &owner.response_format {
            return provider_named(registry, format).map(ReadPlan::Provider);
        }
    }
    match target.shape {
        TargetShape::Stream => return Ok(ReadPlan::Stream),
        TargetShape::Empty => return Ok(ReadPlan::Empty),
        _ => {}
    }
    if let Some(provider) = registry.find(metadata, &target) {
        return Ok(ReadPlan::Provider(provider));
    }
    match target.shape {
        TargetShape::Text => Ok(ReadPlan::Text),
        TargetShape::Bytes => Ok(ReadPlan::Bytes),
        _ => Err(Error::new(ErrorKind::NoDeserializer {
            content_type: metadata
                .content_type
                .clone()
                .unwrap_or_else(|| "(none)".to_string()),
            target: target.name.to_string(),
        })),
    }
}

fn finish<R: FromResponse>(
    plan: ReadPlan,
    body: Vec<u8>,
    metadata: ResponseMetadata,
) -> Result<R> {
    let payload = match plan {
        ReadPlan::Provider(provider) => {
            let mut sink = R::sink();
            provider.deserialize(&body, &metadata, sink.as_mut())?;
            ResponsePayload::Decoded(sink.finish()?)
        }
        ReadPlan::Text => {
            ResponsePayload::Text(decode_text(&body, metadata.content_type.as_deref()))
        }
        ReadPlan::Bytes => ResponsePayload::Bytes(body),
        ReadPlan::Empty => ResponsePayload::Empty,
        ReadPlan::Stream => {
            return Err(Error::new(ErrorKind::Unsupported(
                "stream results are not buffered".to_string(),
            )))
        }
    };
    R::from_payload(payload, metadata)
}

/// Turn a redirect (as outcome or as transport error) into a result, or
/// pass the transport result through.
fn settle_redirect<R: FromResponse, B>(
    outcome: Result<TransportOutcome<B>>,
) -> Result<std::result::Result<R, TransportResponse<B>>> {
    match outcome {
        Ok(TransportOutcome::Response(response)) => Ok(Err(response)),
        Ok(TransportOutcome::RedirectNoBody(metadata)) => {
            R::from_redirect(&metadata).map(Ok).ok_or_else(|| Error::http(metadata))
        }
        Err(err) => {
            let redirect = err
                .metadata()
                .filter(|m| m.is_safe_redirect())
                .and_then(R::from_redirect);
            match redirect {
                Some(result) => Ok(Ok(result)),
                None => Err(err),
            }
        }
    }
}

/// Read a blocking transport outcome into `R`.
pub fn read_blocking<R: FromResponse>(
    registry: &DeserializerRegistry,
    decoders: &DecoderRegistry,
    owner: &Owner,
    outcome: Result<TransportOutcome<BlockingBody>>,
) -> Result<R> {
    let response = match settle_redirect::<R, _>(outcome)? {
        Ok(result) => return Ok(result),
        Err(response) => response,
    };
    let TransportResponse { metadata, mut body } = response;
    let plan = plan::<R>(registry, owner, &metadata)?;

    match plan {
        ReadPlan::Stream => {
            let body = decoders.wrap(metadata.content_encoding(), body);
            let stream = ResponseStream::Blocking(body);
            R::from_payload(ResponsePayload::Stream(stream), metadata)
        }
        ReadPlan::Empty => {
            std::io::copy(&mut body, &mut std::io::sink())?;
            R::from_payload(ResponsePayload::Empty, metadata)
        }
        plan => {
            let mut raw = Vec::new();
            body.read_to_end(&mut raw)?;
            let bytes = decoders.decode_bytes(metadata.content_encoding(), raw)?;
            finish(plan, bytes, metadata)
        }
    }
}

/// Read an async transport outcome into `R`.
///
/// Cancellation is observed while the body is collected.
pub async fn read_async<R: FromResponse>(
    registry: &DeserializerRegistry,
    decoders: &DecoderRegistry,
    owner: &Owner,
    outcome: Result<TransportOutcome<AsyncBody>>,
    cancellation: &CancellationToken,
) -> Result<R> {
    let response = match settle_redirect::<R, _>(outcome)? {
        Ok(result) => return Ok(result),
        Err(response) => response,
    };
    let TransportResponse { metadata, body } = response;
    let plan = plan::<R>(registry, owner, &metadata)?;

    if let ReadPlan::Stream = plan {
        return R::from_payload(ResponsePayload::Stream(ResponseStream::Async(body)), metadata);
    }

    let raw = tokio::select! {
        biased;
        _ = cancellation.cancelled() => return Err(Error::cancelled()),
        collected = collect(body) => collected?,
    };

    if let ReadPlan::Empty = plan {
        return R::from_payload(ResponsePayload::Empty, metadata);
    }
    let bytes = decoders.decode_bytes(metadata.content_encoding(), raw)?;
    finish(plan, bytes, metadata)
}

async fn collect(mut body: AsyncBody) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    while let Some(chunk) = body.next().await {
        bytes.extend_from_slice(&chunk?);
    }
    Ok(bytes)
}
