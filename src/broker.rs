//! Process-wide broker wiring and per-session handles.

// self
use crate::{
	_prelude::*,
	card::CardBroker,
	clock::{Clock, system_clock},
	config::BrokerConfig,
	dispatch::Dispatcher,
	http::BackendHttpClient,
	oauth::{TokenClient, TokenMetrics, TransportErrorMapper},
	request::RequestBuilder,
	session::{Session, TokenCache},
	store::SessionStore,
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper};

#[cfg(feature = "reqwest")]
/// Broker specialized for the crate's default reqwest transport stack.
pub type ReqwestBroker = Broker<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Shares configuration, transport, session store, and clock across every session.
///
/// The broker itself holds no per-user state. Callers build a [`Session`] per incoming request
/// and ask the broker for a [`TokenClient`], [`Dispatcher`], or [`CardBroker`] bound to it.
pub struct Broker<C, M>
where
	C: ?Sized + BackendHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Validated, read-only configuration.
	pub config: Arc<BrokerConfig>,
	/// HTTP client used for every outbound request.
	pub http_client: Arc<C>,
	/// Mapper applied to transport-layer errors before surfacing them to callers.
	pub transport_mapper: Arc<M>,
	/// Session store holding cached tokens.
	pub store: Arc<dyn SessionStore>,
	/// Time source used to stamp and validate cached tokens.
	pub clock: Arc<dyn Clock>,
	/// Shared counters describing token resolution.
	pub token_metrics: Arc<TokenMetrics>,
}
impl<C, M> Broker<C, M>
where
	C: ?Sized + BackendHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a broker that reuses the caller-provided transport + mapper pair.
	pub fn with_http_client(
		config: BrokerConfig,
		store: Arc<dyn SessionStore>,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		Self {
			config: Arc::new(config),
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			store,
			clock: system_clock(),
			token_metrics: Default::default(),
		}
	}

	/// Replaces the time source.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Returns the token cache of `session`.
	pub fn token_cache(&self, session: &Session) -> TokenCache {
		TokenCache::new(session.id.clone(), self.store.clone())
	}

	/// Returns a token client bound to `session`.
	pub fn token_client(&self, session: &Session) -> TokenClient<C, M> {
		TokenClient::new(
			self.config.clone(),
			self.http_client.clone(),
			self.transport_mapper.clone(),
			self.clock.clone(),
			self.token_metrics.clone(),
			self.token_cache(session),
			session.principal.clone(),
		)
	}

	/// Returns a dispatcher bound to `session`.
	pub fn dispatcher(&self, session: &Session) -> Dispatcher<C, M> {
		Dispatcher::new(self.token_client(session))
	}

	/// Returns a card broker bound to `session`.
	pub fn card_broker(&self, session: &Session) -> CardBroker<C, M> {
		CardBroker::new(self.dispatcher(session), session.blockchain_cookie.clone())
	}

	/// Starts an empty request builder for the configured backend.
	pub fn request_builder(&self) -> RequestBuilder {
		RequestBuilder::new(self.config.clone())
	}

	/// Drops the cached token of `session`.
	pub async fn logout(&self, session: &Session) -> Result<()> {
		self.token_cache(session).clear().await?;

		tracing::debug!(session = %session.id, "Cleared cached access token.");

		Ok(())
	}
}
#[cfg(feature = "reqwest")]
impl Broker<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a broker backed by the default reqwest transport.
	pub fn new(config: BrokerConfig, store: Arc<dyn SessionStore>) -> Self {
		Self::with_http_client(
			config,
			store,
			ReqwestHttpClient::default(),
			Arc::new(ReqwestTransportErrorMapper),
		)
	}
}
impl<C, M> Clone for Broker<C, M>
where
	C: ?Sized + BackendHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self {
			config: self.config.clone(),
			http_client: self.http_client.clone(),
			transport_mapper: self.transport_mapper.clone(),
			store: self.store.clone(),
			clock: self.clock.clone(),
			token_metrics: self.token_metrics.clone(),
		}
	}
}
impl<C, M> Debug for Broker<C, M>
where
	C: ?Sized + BackendHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Broker")
			.field("config", &self.config)
			.field("token_metrics", &self.token_metrics)
			.finish()
	}
}
