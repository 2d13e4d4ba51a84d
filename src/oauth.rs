//! OAuth 2.0 token acquisition against the backend's token endpoint.
//!
//! [`TokenClient`] resolves the access token for one session: it serves the cached token while
//! it is valid and otherwise performs a `client_credentials` exchange that names the logged-in
//! user and the scopes of their role. [`TokenClient::bearer`] is the lenient entry point used by
//! the dispatcher, which proceeds without a token rather than failing the request.

mod metrics;

pub use self::metrics::*;

// crates.io
use url::form_urlencoded::Serializer;
// self
use crate::{
	_prelude::*,
	auth::{Principal, ScopeSet, TokenSecret},
	clock::Clock,
	config::BrokerConfig,
	error::{TransientError, TransportError},
	http::{BackendHttpClient, BackendResponse, Method, OutboundRequest, RequestBody, header},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	session::TokenCache,
};
#[cfg(feature = "reqwest")] use crate::error::ConfigError;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const JSON_ACCEPT: &str = "application/json";

/// Maps HTTP transport failures into broker [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an error emitted by the transport into a broker error.
	fn map_transport_error(&self, error: E) -> Error;
}

/// Default mapper for reqwest-backed transports.
///
/// Builder failures point at a broken configuration; timeouts and everything else mean the
/// backend could not be reached.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(&self, error: ReqwestError) -> Error {
		if error.is_builder() {
			return ConfigError::from(error).into();
		}
		if error.is_timeout() {
			return TransportError::timeout(error).into();
		}

		TransportError::network(error).into()
	}
}

/// Mapper that treats every transport failure as a network error.
///
/// Suitable for custom transports whose errors carry no further classification.
#[derive(Clone, Debug, Default)]
pub struct NetworkErrorMapper;
impl<E> TransportErrorMapper<E> for NetworkErrorMapper
where
	E: 'static + Send + Sync + StdError,
{
	fn map_transport_error(&self, error: E) -> Error {
		TransportError::network(error).into()
	}
}

/// Token endpoint success payload; extra fields are ignored.
#[derive(Debug, Deserialize)]
struct TokenEndpointResponse {
	access_token: String,
	expires_in: i64,
}

/// Error payload some token endpoints return alongside non-success statuses.
#[derive(Debug, Default, Deserialize)]
struct TokenEndpointError {
	#[serde(default)]
	error: Option<String>,
	#[serde(default)]
	error_description: Option<String>,
}

/// Per-session token client.
///
/// Obtain one through [`Broker::token_client`](crate::broker::Broker::token_client).
pub struct TokenClient<C, M>
where
	C: ?Sized + BackendHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	pub(crate) config: Arc<BrokerConfig>,
	pub(crate) http_client: Arc<C>,
	pub(crate) mapper: Arc<M>,
	pub(crate) clock: Arc<dyn Clock>,
	metrics: Arc<TokenMetrics>,
	cache: TokenCache,
	principal: Option<Principal>,
}
impl<C, M> TokenClient<C, M>
where
	C: ?Sized + BackendHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	pub(crate) fn new(
		config: Arc<BrokerConfig>,
		http_client: Arc<C>,
		mapper: Arc<M>,
		clock: Arc<dyn Clock>,
		metrics: Arc<TokenMetrics>,
		cache: TokenCache,
		principal: Option<Principal>,
	) -> Self {
		Self { config, http_client, mapper, clock, metrics, cache, principal }
	}

	/// Cache handle of the bound session.
	pub fn cache(&self) -> &TokenCache {
		&self.cache
	}

	/// Principal the client requests tokens for.
	pub fn principal(&self) -> Option<&Principal> {
		self.principal.as_ref()
	}

	/// Counters shared by every client of the same broker.
	pub fn metrics(&self) -> &TokenMetrics {
		&self.metrics
	}

	/// Returns an access token for the session's principal.
	///
	/// Unless `force_new` is set, a cached token that is still valid is returned without any
	/// network traffic. Otherwise a new token is exchanged, cached, and returned.
	pub async fn get_token(&self, force_new: bool) -> Result<TokenSecret> {
		let span = FlowSpan::new(FlowKind::Token, "get_token");

		span.instrument(async move {
			obs::record_flow_outcome(FlowKind::Token, FlowOutcome::Attempt);

			let result = self.resolve_token(force_new).await;

			match &result {
				Ok(_) => obs::record_flow_outcome(FlowKind::Token, FlowOutcome::Success),
				Err(_) => {
					self.metrics.record_failure();
					obs::record_flow_outcome(FlowKind::Token, FlowOutcome::Failure);
				},
			}

			result
		})
		.await
	}

	/// Lenient variant of [`get_token`](Self::get_token) used to decorate outbound requests.
	///
	/// Missing principals, unreachable token endpoints, and unusable token responses yield
	/// `Ok(None)` so the request can still be sent unauthenticated. Configuration and storage
	/// failures propagate.
	pub async fn bearer(&self, force_new: bool) -> Result<Option<TokenSecret>> {
		match self.get_token(force_new).await {
			Ok(token) => Ok(Some(token)),
			Err(e @ (Error::Config(_) | Error::Storage(_))) => Err(e),
			Err(Error::Unauthenticated) => {
				tracing::debug!("No principal on the session; sending without a token.");

				Ok(None)
			},
			Err(e) => {
				tracing::warn!(error = %e, "Token acquisition failed; sending without a token.");

				Ok(None)
			},
		}
	}

	async fn resolve_token(&self, force_new: bool) -> Result<TokenSecret> {
		self.metrics.record_lookup();

		if !force_new
			&& let Some(cached) = self.cache.get().await?
			&& cached.is_valid_at(self.clock.now())
		{
			self.metrics.record_cache_hit();
			tracing::debug!(expires_at = %cached.expires_at, "Reusing cached access token.");

			return Ok(cached.access_token);
		}

		let principal = self.principal.as_ref().ok_or(Error::Unauthenticated)?;
		let scopes = self.config.scopes_for(&principal.role)?;
		let request = self.token_request(principal, scopes)?;

		self.metrics.record_exchange();
		tracing::debug!(role = %principal.role, scope = %scopes, "Exchanging client credentials.");

		let response = self
			.http_client
			.execute(request)
			.await
			.map_err(|e| self.mapper.map_transport_error(e))?;
		let (access_token, expires_in) = parse_token_response(&response)?;
		let now = self.clock.now();
		let expires_at = now
			.checked_add(Duration::seconds(expires_in))
			.ok_or(TransientError::ExpiresInOutOfRange { expires_in })?;
		let pruned = self.cache.prune_expired(now).await?;

		if pruned > 0 {
			tracing::debug!(pruned, "Dropped expired tokens from the session store.");
		}

		self.cache.set(access_token.expose(), expires_at).await?;

		Ok(access_token)
	}

	fn token_request(&self, principal: &Principal, scopes: &ScopeSet) -> Result<OutboundRequest> {
		let body = Serializer::new(String::new())
			.append_pair("grant_type", "client_credentials")
			.append_pair("client_id", self.config.client.client_id.as_str())
			.append_pair("client_secret", self.config.client.client_secret.secret())
			.append_pair("scope", &scopes.normalized())
			.append_pair("user_id", &principal.username)
			.finish();
		let mut request = OutboundRequest::new(Method::POST, self.config.token_url()?);

		request
			.headers
			.insert(header::CONTENT_TYPE, header::HeaderValue::from_static(FORM_CONTENT_TYPE));
		request.headers.insert(header::ACCEPT, header::HeaderValue::from_static(JSON_ACCEPT));
		request.body = RequestBody::Bytes(body.into_bytes());
		request.timeout = Some(self.config.request_timeout);

		Ok(request)
	}
}
impl<C, M> Clone for TokenClient<C, M>
where
	C: ?Sized + BackendHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self {
			config: self.config.clone(),
			http_client: self.http_client.clone(),
			mapper: self.mapper.clone(),
			clock: self.clock.clone(),
			metrics: self.metrics.clone(),
			cache: self.cache.clone(),
			principal: self.principal.clone(),
		}
	}
}
impl<C, M> Debug for TokenClient<C, M>
where
	C: ?Sized + BackendHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenClient")
			.field("session", self.cache.session())
			.field("principal", &self.principal)
			.finish()
	}
}

fn parse_token_response(response: &BackendResponse) -> Result<(TokenSecret, i64), TransientError> {
	let status = response.status.as_u16();

	if !response.is_success() {
		let detail = serde_json::from_slice::<TokenEndpointError>(&response.body).unwrap_or_default();
		let message = match (detail.error, detail.error_description) {
			(Some(error), Some(description)) => format!("{error}: {description}"),
			(Some(error), None) => error,
			(None, Some(description)) => description,
			(None, None) => response.status_summary(),
		};

		return Err(TransientError::TokenEndpoint { message, status: Some(status) });
	}

	let mut deserializer = serde_json::Deserializer::from_slice(&response.body);
	let parsed: TokenEndpointResponse = serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|source| TransientError::TokenResponseParse { source, status: Some(status) })?;

	if parsed.expires_in <= 0 {
		return Err(TransientError::NonPositiveExpiresIn { expires_in: parsed.expires_in });
	}

	let token = TokenSecret::new(parsed.access_token);

	if !token.is_usable() {
		return Err(TransientError::InvalidAccessToken);
	}

	Ok((token, parsed.expires_in))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::http::StatusCode;

	fn response(status: StatusCode, body: &str) -> BackendResponse {
		BackendResponse::new(status, body)
	}

	#[test]
	fn success_payload_ignores_extra_fields() {
		let (token, expires_in) = parse_token_response(&response(
			StatusCode::OK,
			r#"{"access_token":"abc123","expires_in":3600,"token_type":"Bearer","scope":"x"}"#,
		))
		.expect("Valid payload should parse.");

		assert_eq!(token.expose(), "abc123");
		assert_eq!(expires_in, 3600);
	}

	#[test]
	fn non_positive_lifetimes_are_transient_errors() {
		let err = parse_token_response(&response(
			StatusCode::OK,
			r#"{"access_token":"abc123","expires_in":0}"#,
		))
		.expect_err("Zero lifetime must be rejected.");

		assert!(matches!(err, TransientError::NonPositiveExpiresIn { expires_in: 0 }));
	}

	#[test]
	fn malformed_payload_reports_field_path() {
		let err = parse_token_response(&response(
			StatusCode::OK,
			r#"{"access_token":"abc123","expires_in":"soon"}"#,
		))
		.expect_err("String lifetime must be rejected.");

		match err {
			TransientError::TokenResponseParse { source, status } => {
				assert_eq!(source.path().to_string(), "expires_in");
				assert_eq!(status, Some(200));
			},
			other => panic!("Unexpected error: {other:?}."),
		}
	}

	#[test]
	fn error_statuses_carry_endpoint_detail() {
		let err = parse_token_response(&response(
			StatusCode::UNAUTHORIZED,
			r#"{"error":"invalid_client","error_description":"Unknown client"}"#,
		))
		.expect_err("401 must be rejected.");

		assert!(matches!(
			err,
			TransientError::TokenEndpoint { ref message, status: Some(401) }
				if message == "invalid_client: Unknown client"
		));

		let bare = parse_token_response(&response(StatusCode::BAD_GATEWAY, "<html>"))
			.expect_err("502 must be rejected.");

		assert!(matches!(
			bare,
			TransientError::TokenEndpoint { ref message, status: Some(502) }
				if message == "502 Bad Gateway"
		));
	}

	#[test]
	fn network_mapper_classifies_everything_as_unreachable() {
		let err = NetworkErrorMapper
			.map_transport_error(std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out"));

		assert!(matches!(err, Error::BackendUnreachable(TransportError::Network { .. })));
	}
}
