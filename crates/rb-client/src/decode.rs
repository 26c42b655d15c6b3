//! Content decoders for `Content-Encoding` response bodies.

use std::collections::BTreeMap;
use std::io::Read;
use std::sync::Arc;

use flate2::read::{GzDecoder, ZlibDecoder};

use crate::error::{Error, ErrorKind, Result};
use crate::transport::BlockingBody;

/// Wraps a compressed body in a decompressing reader.
pub trait ContentDecoder: Send + Sync {
    /// Wrap `body`.
    fn decode(&self, body: BlockingBody) -> BlockingBody;
}

/// `gzip` / `x-gzip`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GzipDecoder;

impl ContentDecoder for GzipDecoder {
    fn decode(&self, body: BlockingBody) -> BlockingBody {
        Box::new(GzDecoder::new(body))
    }
}

/// `deflate` (zlib-wrapped, as HTTP specifies).
#[derive(Debug, Clone, Copy, Default)]
pub struct DeflateDecoder;

impl ContentDecoder for DeflateDecoder {
    fn decode(&self, body: BlockingBody) -> BlockingBody {
        Box::new(ZlibDecoder::new(body))
    }
}

/// Decoders by lower-case encoding name.
#[derive(Clone)]
pub struct DecoderRegistry {
    decoders: BTreeMap<String, Arc<dyn ContentDecoder>>,
}

impl std::fmt::Debug for DecoderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.decoders.keys()).finish()
    }
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("gzip", Arc::new(GzipDecoder));
        registry.register("x-gzip", Arc::new(GzipDecoder));
        registry.register("deflate", Arc::new(DeflateDecoder));
        registry
    }
}

impl DecoderRegistry {
    /// A registry with no decoders.
    pub fn empty() -> Self {
        Self {
            decoders: BTreeMap::new(),
        }
    }

    /// Register a decoder, replacing any previous one for the same name.
    pub fn register(&mut self, name: &str, decoder: Arc<dyn ContentDecoder>) {
        self.decoders.insert(name.trim().to_ascii_lowercase(), decoder);
    }

    /// Look up a decoder. `identity` and unknown names yield None.
    pub fn get(&self, encoding: &str) -> Option<&Arc<dyn ContentDecoder>> {
        self.decoders.get(&encoding.trim().to_ascii_lowercase())
    }

    /// Registered encoding names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.decoders.keys().map(String::as_str)
    }

    /// Value for an `Accept-Encoding` header, or None if empty.
    pub fn accept_encoding(&self) -> Option<String> {
        let names: Vec<&str> = self.names().collect();
        (!names.is_empty()).then(|| names.join(", "))
    }

    /// Apply every encoding listed in `content_encoding`, last applied first.
    ///
    /// Encodings without a registered decoder (including `identity`) pass the
    /// body through unchanged.
    pub fn wrap(&self, content_encoding: Option<&str>, body: BlockingBody) -> BlockingBody {
        let Some(header) = content_encoding else {
            return body;
        };
        header
            .split(',')
            .rev()
            .fold(body, |body, name| match self.get(name) {
                Some(decoder) => decoder.decode(body),
                None => body,
            })
    }

    /// Decode a fully buffered body.
    ///
    /// A truncated or corrupt body fails with `ErrorKind::Deserialization`.
    pub fn decode_bytes(&self, content_encoding: Option<&str>, bytes: Vec<u8>) -> Result<Vec<u8>> {
        let Some(encoding) = content_encoding else {
            return Ok(bytes);
        };
        let mut reader = self.wrap(content_encoding, Box::new(std::io::Cursor::new(bytes)));
        let mut decoded = Vec::new();
        reader.read_to_end(&mut decoded).map_err(|err| {
            Error::with_source(
                ErrorKind::Deserialization(format!("cannot decode '{encoding}' body: {err}")),
                err,
            )
        })?;
        Ok(decoded)
    }
}
