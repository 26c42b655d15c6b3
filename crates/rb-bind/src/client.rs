//! Async HTTP client façade.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

use restbind_client::{
    AsyncTransport, CallSite, ClientConfig, EndpointConfig, ExecuteStrategy, ReqwestTransport,
    RequestMethod, Result, RetryClassifier, RetryConfig,
};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::binder::Binder;
use crate::context::BindingContext;
use crate::model::Model;
use crate::observer::{CallObserver, TracingObserver};
use crate::profile::{ClientProfile, DefaultProfile, Owner};
use crate::response::FromResponse;

/// Async client binding request models to calls against one endpoint.
///
/// The profile `P` identifies the client: its name tags errors and logs, and
/// its body and response markers apply to every call.
///
/// # Example
///
/// ```rust,ignore
/// use restbind_bind::{HttpClient, Model, Schema};
/// use restbind_client::EndpointConfig;
///
/// struct GetUser {
///     id: u64,
/// }
///
/// impl Model for GetUser {
///     fn describe(schema: &mut Schema<Self>) {
///         schema.field("id", |m| &m.id).path();
///     }
/// }
///
/// let client = HttpClient::new(EndpointConfig::new("https://api.example.com/users/{id}"))?;
/// let user: User = client.call(&GetUser { id: 7 }).await?;
/// ```
pub struct HttpClient<P: ClientProfile = DefaultProfile> {
    transport: Arc<dyn AsyncTransport>,
    binder: Arc<Binder>,
    endpoint: Arc<EndpointConfig>,
    strategy: ExecuteStrategy,
    observer: Arc<dyn CallObserver>,
    owner: Owner,
    _profile: PhantomData<fn() -> P>,
}

impl<P: ClientProfile> Clone for HttpClient<P> {
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

impl<P: ClientProfile> std::fmt::Debug for HttpClient<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("client", &self.owner.name)
            .field("endpoint", &self.endpoint)
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

impl HttpClient<DefaultProfile> {
    /// Create a client with the default profile, transport and retries.
    pub fn new(endpoint: EndpointConfig) -> Result<Self> {
        Self::builder(endpoint).build()
    }
}

impl<P: ClientProfile> HttpClient<P> {
    /// Start building a client for `endpoint`.
    pub fn builder(endpoint: EndpointConfig) -> HttpClientBuilder<P> {
        HttpClientBuilder::new(endpoint)
    }

    /// The endpoint this client calls.
    pub fn endpoint(&self) -> &EndpointConfig {
        &self.endpoint
    }

    /// The binder used for requests and responses.
    pub fn binder(&self) -> &Arc<Binder> {
        &self.binder
    }

    /// Client name used in errors and logs.
    pub fn name(&self) -> &'static str {
        self.owner.name
    }

    /// Send `request` and read the response as `Resp`.
    #[instrument(skip(self, request), fields(client = self.owner.name))]
    pub async fn call<Req, Resp>(&self, request: &Req) -> Result<Resp>
    where
        Req: Model,
        Resp: FromResponse,
    {
        self.execute(request, None, &CancellationToken::new()).await
    }

    /// Like [`call`](Self::call), aborting when `cancellation` fires.
    #[instrument(skip(self, request, cancellation), fields(client = self.owner.name))]
    pub async fn call_with_cancellation<Req, Resp>(
        &self,
        request: &Req,
        cancellation: &CancellationToken,
    ) -> Result<Resp>
    where
        Req: Model,
        Resp: FromResponse,
    {
        self.execute(request, None, cancellation).await
    }

    /// Like [`call`](Self::call) with the HTTP method pinned.
    #[instrument(skip(self, request), fields(client = self.owner.name))]
    pub async fn call_with_method<Req, Resp>(
        &self,
        request: &Req,
        method: RequestMethod,
    ) -> Result<Resp>
    where
        Req: Model,
        Resp: FromResponse,
    {
        self.execute(request, Some(method), &CancellationToken::new())
            .await
    }

    /// A typed handle for one request/response pair.
    pub fn operation<Req, Resp>(&self) -> Operation<'_, P, Req, Resp>
    where
        Req: Model,
        Resp: FromResponse,
    {
        Operation {
            client: self,
            method: None,
            _types: PhantomData,
        }
    }

    async fn execute<Req, Resp>(
        &self,
        request: &Req,
        method: Option<RequestMethod>,
        cancellation: &CancellationToken,
    ) -> Result<Resp>
    where
        Req: Model,
        Resp: FromResponse,
    {
        let site = CallSite::new(&self.endpoint.base_url, self.owner.name);
        self.strategy
            .execute_async(&site, cancellation, move |_| {
                self.attempt(request, method, cancellation)
            })
            .await
    }

    async fn attempt<Req, Resp>(
        &self,
        request: &Req,
        method: Option<RequestMethod>,
        cancellation: &CancellationToken,
    ) -> Result<Resp>
    where
        Req: Model,
        Resp: FromResponse,
    {
        let prepared = {
            let mut context = BindingContext::new(self.owner.name, request, &self.endpoint)
                .with_cancellation(cancellation);
            self.binder.prepare(&self.owner, &mut context, method)?
        };

        self.observer.on_request(self.owner.name, &prepared);
        let started = Instant::now();
        let outcome = self.transport.send(prepared).await;
        match &outcome {
            Ok(outcome) => {
                self.observer
                    .on_response(self.owner.name, outcome.metadata(), started.elapsed())
            }
            Err(error) => self
                .observer
                .on_error(self.owner.name, error, started.elapsed()),
        }

        self.binder
            .read_async(&self.owner, outcome, cancellation)
            .await
    }
}

/// One request/response pair of an [`HttpClient`].
pub struct Operation<'c, P: ClientProfile, Req, Resp> {
    client: &'c HttpClient<P>,
    method: Option<RequestMethod>,
    _types: PhantomData<fn(&Req) -> Resp>,
}

impl<P: ClientProfile, Req, Resp> Operation<'_, P, Req, Resp>
where
    Req: Model,
    Resp: FromResponse,
{
    /// Pin the HTTP method of this operation.
    pub fn with_method(mut self, method: RequestMethod) -> Self {
        self.method = Some(method);
        self
    }

    pub async fn call(&self, request: &Req) -> Result<Resp> {
        self.client
            .execute(request, self.method, &CancellationToken::new())
            .await
    }

    pub async fn call_with_cancellation(
        &self,
        request: &Req,
        cancellation: &CancellationToken,
    ) -> Result<Resp> {
        self.client.execute(request, self.method, cancellation).await
    }
}

/// Builder for [`HttpClient`].
pub struct HttpClientBuilder<P: ClientProfile = DefaultProfile> {
    endpoint: EndpointConfig,
    transport: Option<Arc<dyn AsyncTransport>>,
    binder: Option<Arc<Binder>>,
    config: ClientConfig,
    retry: Option<RetryConfig>,
    classifier: Option<Arc<dyn RetryClassifier>>,
    observer: Option<Arc<dyn CallObserver>>,
    _profile: PhantomData<fn() -> P>,
}

impl<P: ClientProfile> HttpClientBuilder<P> {
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

    /// Use `transport` instead of a reqwest transport.
    pub fn transport(mut self, transport: Arc<dyn AsyncTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Use an isolated binder instead of [`Binder::global`].
    pub fn binder(mut self, binder: Arc<Binder>) -> Self {
        self.binder = Some(binder);
        self
    }

    /// Transport and retry settings.
    pub fn client_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the retry delays of the client config.
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

    pub fn build(self) -> Result<HttpClient<P>> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(&self.endpoint, self.config.clone())?),
        };
        let mut strategy = ExecuteStrategy::new(self.retry.unwrap_or(self.config.retry));
        if let Some(classifier) = self.classifier {
            strategy = strategy.with_classifier(classifier);
        }

        Ok(HttpClient {
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
