//! Content-based deserialization providers and their registry.

use std::any::Any;
use std::sync::Arc;

use arc_swap::ArcSwap;
use restbind_client::{Error, ErrorKind, ResponseMetadata, Result};
use serde::de::DeserializeOwned;

/// What a declared result type needs from the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetShape {
    /// A value built by a deserializer.
    Typed,
    /// The body decoded as text.
    Text,
    /// The raw body bytes.
    Bytes,
    /// Nothing; the body is discarded.
    Empty,
    /// The live body stream, handed to the caller.
    Stream,
}

/// Name and shape of a declared result type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetType {
    pub name: &'static str,
    pub shape: TargetShape,
}

impl TargetType {
    pub fn new(name: &'static str, shape: TargetShape) -> Self {
        Self { name, shape }
    }
}

/// Receives the value a provider produced for one result type.
pub trait DeserializeSink: Send {
    /// The result type being built.
    fn target(&self) -> TargetType;

    /// Build the value from a JSON document.
    fn json(&mut self, body: &[u8]) -> Result<()>;

    /// Build the value from an XML document.
    fn xml(&mut self, text: &str) -> Result<()>;

    /// Build the value from an already parsed tree.
    fn value(&mut self, value: serde_json::Value) -> Result<()>;

    /// The built value.
    fn finish(self: Box<Self>) -> Result<Box<dyn Any + Send>>;
}

/// Sink for any `DeserializeOwned` type.
pub struct TypedSink<T> {
    target: TargetType,
    value: Option<T>,
}

impl<T> TypedSink<T> {
    pub fn new(target: TargetType) -> Self {
        Self {
            target,
            value: None,
        }
    }
}

fn deserialization_error(e: impl std::error::Error + Send + Sync + 'static) -> Error {
    Error::with_source(ErrorKind::Deserialization(e.to_string()), e)
}

impl<T: DeserializeOwned + Send + 'static> DeserializeSink for TypedSink<T> {
    fn target(&self) -> TargetType {
        self.target
    }

    fn json(&mut self, body: &[u8]) -> Result<()> {
        self.value = Some(serde_json::from_slice(body)?);
        Ok(())
    }

    fn xml(&mut self, text: &str) -> Result<()> {
        self.value = Some(quick_xml::de::from_str(text).map_err(deserialization_error)?);
        Ok(())
    }

    fn value(&mut self, value: serde_json::Value) -> Result<()> {
        self.value = Some(serde_json::from_value(value)?);
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<Box<dyn Any + Send>> {
        match self.value {
            Some(value) => Ok(Box::new(value)),
            None => Err(Error::new(ErrorKind::Deserialization(format!(
                "no value produced for {}",
                self.target.name
            )))),
        }
    }
}

/// Turns a response body into a typed value.
pub trait DeserializationProvider: Send + Sync {
    /// Name used by explicit format markers.
    fn name(&self) -> &str;

    /// True if this provider handles `metadata`'s content for `target`.
    fn accepts(&self, metadata: &ResponseMetadata, target: &TargetType) -> bool;

    /// Deserialize `body` into `sink`.
    fn deserialize(
        &self,
        body: &[u8],
        metadata: &ResponseMetadata,
        sink: &mut dyn DeserializeSink,
    ) -> Result<()>;
}

fn media_type(metadata: &ResponseMetadata) -> Option<mime::Mime> {
    metadata.content_type.as_deref()?.parse().ok()
}

fn has_suffix(media: &mime::Mime, suffix: &str) -> bool {
    media
        .suffix()
        .is_some_and(|s| s.as_str().eq_ignore_ascii_case(suffix))
}

/// Decode `body` using the charset of `content_type`.
///
/// `text/*` without a charset is read as ISO-8859-1; anything else without a
/// charset as UTF-8.
pub fn decode_text(body: &[u8], content_type: Option<&str>) -> String {
    let media: Option<mime::Mime> = content_type.and_then(|ct| ct.parse().ok());
    let encoding = media
        .as_ref()
        .and_then(|m| m.get_param(mime::CHARSET))
        .and_then(|charset| encoding_rs::Encoding::for_label(charset.as_str().as_bytes()))
        .unwrap_or_else(|| match &media {
            Some(m) if m.type_() == mime::TEXT => encoding_rs::WINDOWS_1252,
            _ => encoding_rs::UTF_8,
        });
    let (text, _, _) = encoding.decode(body);
    text.into_owned()
}

fn declared_charset_is_utf8(metadata: &ResponseMetadata) -> bool {
    media_type(metadata)
        .and_then(|m| m.get_param(mime::CHARSET).map(|c| c.as_str().to_ascii_lowercase()))
        .is_none_or(|charset| charset == "utf-8" || charset == "utf8")
}

/// `application/json` and `+json` media types.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonProvider;

impl DeserializationProvider for JsonProvider {
    fn name(&self) -> &str {
        "json"
    }

    fn accepts(&self, metadata: &ResponseMetadata, target: &TargetType) -> bool {
        target.shape == TargetShape::Typed
            && media_type(metadata).is_some_and(|m| {
                (m.type_() == mime::APPLICATION && m.subtype() == mime::JSON)
                    || has_suffix(&m, "json")
            })
    }

    fn deserialize(
        &self,
        body: &[u8],
        metadata: &ResponseMetadata,
        sink: &mut dyn DeserializeSink,
    ) -> Result<()> {
        if declared_charset_is_utf8(metadata) {
            sink.json(body)
        } else {
            let text = decode_text(body, metadata.content_type.as_deref());
            sink.json(text.as_bytes())
        }
    }
}

/// `application/xml`, `text/xml` and `+xml` media types.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlProvider;

impl DeserializationProvider for XmlProvider {
    fn name(&self) -> &str {
        "xml"
    }

    fn accepts(&self, metadata: &ResponseMetadata, target: &TargetType) -> bool {
        target.shape == TargetShape::Typed
            && media_type(metadata).is_some_and(|m| {
                ((m.type_() == mime::APPLICATION || m.type_() == mime::TEXT)
                    && m.subtype() == mime::XML)
                    || has_suffix(&m, "xml")
            })
    }

    fn deserialize(
        &self,
        body: &[u8],
        metadata: &ResponseMetadata,
        sink: &mut dyn DeserializeSink,
    ) -> Result<()> {
        let text = if declared_charset_is_utf8(metadata) {
            String::from_utf8_lossy(body).into_owned()
        } else {
            decode_text(body, metadata.content_type.as_deref())
        };
        sink.xml(&text)
    }
}

/// `text/plain` into a typed value built from a string.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextProvider;

impl DeserializationProvider for TextProvider {
    fn name(&self) -> &str {
        "text"
    }

    fn accepts(&self, metadata: &ResponseMetadata, target: &TargetType) -> bool {
        target.shape == TargetShape::Typed
            && media_type(metadata)
                .is_some_and(|m| m.type_() == mime::TEXT && m.subtype() == mime::PLAIN)
    }

    fn deserialize(
        &self,
        body: &[u8],
        metadata: &ResponseMetadata,
        sink: &mut dyn DeserializeSink,
    ) -> Result<()> {
        let text = decode_text(body, metadata.content_type.as_deref());
        sink.value(serde_json::Value::String(text))
    }
}

type ProviderList = Vec<Arc<dyn DeserializationProvider>>;

/// Ordered provider list, replaced as a whole.
///
/// Readers take a snapshot and never observe a partially updated list.
pub struct DeserializerRegistry {
    providers: ArcSwap<ProviderList>,
}

impl std::fmt::Debug for DeserializerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self
            .providers
            .load()
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        f.debug_struct("DeserializerRegistry")
            .field("providers", &names)
            .finish()
    }
}

impl Default for DeserializerRegistry {
    fn default() -> Self {
        Self::new(default_providers())
    }
}

/// JSON, XML and plain text, in that order.
pub fn default_providers() -> ProviderList {
    vec![
        Arc::new(JsonProvider),
        Arc::new(XmlProvider),
        Arc::new(TextProvider),
    ]
}

impl DeserializerRegistry {
    pub fn new(providers: ProviderList) -> Self {
        Self {
            providers: ArcSwap::from_pointee(providers),
        }
    }

    /// Replace the provider list.
    pub fn set_providers(&self, providers: ProviderList) {
        self.providers.store(Arc::new(providers));
    }

    /// Snapshot of the current providers.
    pub fn providers(&self) -> ProviderList {
        self.providers.load().as_ref().clone()
    }

    /// Provider registered under `name`, ignoring case.
    pub fn by_name(&self, name: &str) -> Option<Arc<dyn DeserializationProvider>> {
        self.providers
            .load()
            .iter()
            .find(|p| p.name().eq_ignore_ascii_case(name))
            .cloned()
    }

    /// First provider accepting the response for `target`.
    pub fn find(
        &self,
        metadata: &ResponseMetadata,
        target: &TargetType,
    ) -> Option<Arc<dyn DeserializationProvider>> {
        self.providers
            .load()
            .iter()
            .find(|p| p.accepts(metadata, target))
            .cloned()
    }
}
