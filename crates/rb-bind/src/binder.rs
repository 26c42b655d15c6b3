//! The binding context object.

use std::sync::{Arc, LazyLock};

use restbind_client::{
    AsyncBody, BlockingBody, DecoderRegistry, RequestMethod, Result, TransportOutcome,
    TransportRequest,
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cache::MetadataCache;
use crate::classify::{BindingTarget, ModelDescriptor};
use crate::context::BindingContext;
use crate::convert::Converter;
use crate::deserialize::{DeserializationProvider, DeserializerRegistry};
use crate::headers::{compose_headers, resolve_credentials};
use crate::model::Model;
use crate::profile::Owner;
use crate::response::{read_async, read_blocking, FromResponse};
use crate::url::compose_url;
use crate::body;

static GLOBAL: LazyLock<Arc<Binder>> = LazyLock::new(|| Arc::new(Binder::new()));

/// Owns the metadata cache, the deserialization providers and the content
/// decoders shared by clients.
///
/// [`Binder::global`] is the process default. Clients built with their own
/// binder do not see providers registered on the global one.
#[derive(Debug, Default)]
pub struct Binder {
    cache: MetadataCache,
    registry: DeserializerRegistry,
    decoders: DecoderRegistry,
}

impl Binder {
    /// A binder with the default providers and decoders.
    pub fn new() -> Self {
        Self::default()
    }

    /// A binder using `decoders` for response bodies.
    pub fn with_decoders(decoders: DecoderRegistry) -> Self {
        Self {
            decoders,
            ..Self::default()
        }
    }

    /// The process default binder.
    pub fn global() -> Arc<Binder> {
        GLOBAL.clone()
    }

    pub fn cache(&self) -> &MetadataCache {
        &self.cache
    }

    pub fn registry(&self) -> &DeserializerRegistry {
        &self.registry
    }

    pub fn decoders(&self) -> &DecoderRegistry {
        &self.decoders
    }

    /// Replace the deserialization providers.
    pub fn set_providers(&self, providers: Vec<Arc<dyn DeserializationProvider>>) {
        self.registry.set_providers(providers);
    }

    /// Snapshot of the deserialization providers.
    pub fn providers(&self) -> Vec<Arc<dyn DeserializationProvider>> {
        self.registry.providers()
    }

    /// Provider registered under `name`.
    pub fn provider_by_name(&self, name: &str) -> Option<Arc<dyn DeserializationProvider>> {
        self.registry.by_name(name)
    }

    /// Cached descriptor of `M` for `owner`.
    pub fn descriptor<M: Model>(&self, owner: &Owner) -> Result<Arc<ModelDescriptor<M>>> {
        self.cache.descriptor::<M>(owner)
    }

    /// Request URL for `model` against `base_url`.
    pub fn compose_url<M: Model>(
        &self,
        owner: &Owner,
        model: Option<&M>,
        base_url: &str,
    ) -> Result<String> {
        compose_url(&self.cache, owner, model, base_url)
    }

    /// Bind the context's model into a transport request.
    ///
    /// Sets the context's request URL.
    pub fn prepare<M: Model>(
        &self,
        owner: &Owner,
        context: &mut BindingContext<'_, M>,
        method: Option<RequestMethod>,
    ) -> Result<TransportRequest> {
        let descriptor = self.cache.descriptor::<M>(owner)?;
        let model = context.model;
        let endpoint = context.endpoint;

        let url = compose_url(&self.cache, owner, Some(model), context.base_url)?;
        context.request_url = Some(url.clone());

        let header_pairs = Converter::new(&self.cache, owner)
            .convert(&descriptor, model, |target| target == BindingTarget::Header)?;
        let headers = compose_headers(endpoint, &header_pairs, &self.decoders);
        let credentials = resolve_credentials(&descriptor, model, endpoint, &url)?;
        let plan = body::plan(&descriptor, owner, endpoint, model, method)?;

        let mut request = TransportRequest::new(plan.method, url);
        request.headers = headers;
        request.credentials = credentials;
        request.content_length = plan.content_length;
        request.timeout = Some(endpoint.timeout());
        if let Some(body) = plan.body {
            if !request.headers.contains_key_ignore_case("content-type") {
                request.headers.add("Content-Type", body.content_type);
            }
            request.body = Some(body.bytes);
        }

        debug!(
            client = context.client,
            model = std::any::type_name::<M>(),
            method = %request.method,
            "Bound request"
        );
        Ok(request)
    }

    /// Read a blocking transport outcome into `R`.
    pub fn read<R: FromResponse>(
        &self,
        owner: &Owner,
        outcome: Result<TransportOutcome<BlockingBody>>,
    ) -> Result<R> {
        read_blocking(&self.registry, &self.decoders, owner, outcome)
    }

    /// Read an async transport outcome into `R`.
    pub async fn read_async<R: FromResponse>(
        &self,
        owner: &Owner,
        outcome: Result<TransportOutcome<AsyncBody>>,
        cancellation: &CancellationToken,
    ) -> Result<R> {
        read_async(&self.registry, &self.decoders, owner, outcome, cancellation).await
    }
}
