//! Blocking HTTP client façade.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

use restbind_client::{
    BlockingReqwestTransport, CallSite, ClientConfig, EndpointConfig, ExecuteStrategy,
    RequestMethod, Result, RetryClassifier, RetryConfig, Transport,
};
use tracing::instrument;

use crate::binder::Binder;
use crate::context::BindingContext;
use crate::model::Model;
use crate::observer::{CallObserver, TracingObserver};
use crate::profile::{ClientProfile, DefaultProfile, Owner};
use crate::response::FromResponse;

/// Blocking counterpart of [`HttpClient`](crate::HttpClient).
///
/// Retry delays sleep the calling thread. Must not be used from inside an
/// async runtime.
pub struct BlockingHttpClient<P: ClientProfile = DefaultProfile> {
    transport: Arc<dyn Transport>,
    binder: Arc<Binder>,
    endpoint: Arc<EndpointConfig>,
    strategy: ExecuteStrategy,
    observer: Arc<dyn CallObserver>,
    owner: Owner,
    _profile: PhantomData<fn() -> P>,
}

impl<P: ClientProfile> Clone for BlockingHttpClient<P> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            binder: self.binder.clone(),
            endpoint: self.endpoint.clone(),
            strategy: self.strategy.clone(),
            observer: self.observer.clone(),
            owner: self.owner.clone(),
            _profile: PhantomData,
        }
    }
}

impl<P: ClientProfile> std::fmt::Debug for BlockingHttpClient<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingHttpClient")
            .field("client", &self.owner.name)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl BlockingHttpClient<DefaultProfile> {
    pub fn new(endpoint: EndpointConfig) -> Result<Self> {
        Self::builder(endpoint).build()
    }
}

impl<P: ClientProfile> BlockingHttpClient<P> {
    pub fn builder(endpoint: EndpointConfig) -> BlockingHttpClientBuilder<P> {
        BlockingHttpClientBuilder::new(endpoint)
    }

    pub fn endpoint(&self) -> &EndpointConfig {
        &self.endpoint
    }

    pub fn binder(&self) -> &Arc<Binder> {
        &self.binder
    }

    pub fn name(&self) -> &'static str {
        self.owner.name
    }

    /// Send `request` and read the response as `Resp`.
    #[instrument(skip(self, request), fields(client = self.owner.name))]
    pub fn call<Req, Resp>(&self, request: &Req) -> Result<Resp>
    where
        Req: Model,
        Resp: FromResponse,
    {
        self.execute(request, None)
    }

    /// Like [`call`](Self::call) with the HTTP method pinned.
    #[instrument(skip(self, request), fields(client = self.owner.name))]
    pub fn call_with_method<Req, Resp>(&self, request: &Req, method: RequestMethod) -> Result<Resp>
    where
        Req: Model,
        Resp: FromResponse,
    {
        self.execute(request, Some(method))
    }

    pub fn operation<Req, Resp>(&self) -> BlockingOperation<'_, P, Req, Resp>
    where
        Req: Model,
        Resp: FromResponse,
    {
        BlockingOperation {
            client: self,
            method: None,
            _types: PhantomData,
        }
    }

    fn execute<Req, Resp>(&self, request: &Req, method: Option<RequestMethod>) -> Result<Resp>
    where
        Req: Model,
        Resp: FromResponse,
    {
        let site = CallSite::new(&self.endpoint.base_url, self.owner.name);
        self.strategy
            .execute(&site, |_| self.attempt(request, method))
    }

    fn attempt<Req, Resp>(&self, request: &Req, method: Option<RequestMethod>) -> Result<Resp>
    where
        Req: Model,
        Resp: FromResponse,
    {
        let mut context = BindingContext::new(self.owner.name, request, &self.endpoint);
        let prepared = self.binder.prepare(&self.owner, &mut context, method)?;

        self.observer.on_request(self.owner.name, &prepared);
        let started = Instant::now();
        let outcome = self.transport.send(prepared);
        match &outcome {
            Ok(outcome) => {
                self.observer
                    .on_response(self.owner.name, outcome.metadata(), started.elapsed())
            }
            Err(error) => self
                .observer
                .on_error(self.owner.name, error, started.elapsed()),
        }

        self.binder.read(&self.owner, outcome)
    }
}

/// One request/response pair of a [`BlockingHttpClient`].
pub struct BlockingOperation<'c, P: ClientProfile, Req, Resp> {
    client: &'c BlockingHttpClient<P>,
    method: Option<RequestMethod>,
    _types: PhantomData<fn(&Req) -> Resp>,
}

impl<P: ClientProfile, Req, Resp> BlockingOperation<'_, P, Req, Resp>
where
    Req: Model,
    Resp: FromResponse,
{
    pub fn with_method(mut self, method: RequestMethod) -> Self {
        self.method = Some(method);
        self
    }

    pub fn call(&self, request: &Req) -> Result<Resp> {
        self.client.execute(request, self.method)
    }
}

/// Builder for [`BlockingHttpClient`].
pub struct BlockingHttpClientBuilder<P: ClientProfile = DefaultProfile> {
    endpoint: EndpointConfig,
    transport: Option<Arc<dyn Transport>>,
    binder: Option<Arc<Binder>>,
    config: ClientConfig,
    retry: Option<RetryConfig>,
    classifier: Option<Arc<dyn RetryClassifier>>,
    observer: Option<Arc<dyn CallObserver>>,
    _profile: PhantomData<fn() -> P>,
}

impl<P: ClientProfile> BlockingHttpClientBuilder<P> {
    pub fn new(endpoint: EndpointConfig) -> Self {
        Self {
            endpoint,
            transport: None,
            binder: None,
            config: ClientConfig::default(),
            retry: None,
            classifier: None,
            observer: None,
            _profile: PhantomData,
        }
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn binder(mut self, binder: Arc<Binder>) -> Self {
        self.binder = Some(binder);
        self
    }

    pub fn client_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn retry_classifier(mut self, classifier: Arc<dyn RetryClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn CallObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn build(self) -> Result<BlockingHttpClient<P>> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(BlockingReqwestTransport::new(
                &self.endpoint,
                self.config.clone(),
            )?),
        };
        let mut strategy = ExecuteStrategy::new(self.retry.unwrap_or(self.config.retry));
        if let Some(classifier) = self.classifier {
            strategy = strategy.with_classifier(classifier);
        }

        Ok(BlockingHttpClient {
            transport,
            binder: self.binder.unwrap_or_else(Binder::global),
            endpoint: Arc::new(self.endpoint),
            strategy,
            observer: self
                .observer
                .unwrap_or_else(|| Arc::new(TracingObserver)),
            owner: Owner::of::<P>(),
            _profile: PhantomData,
        })
    }
}
