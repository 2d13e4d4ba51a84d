//! Authenticated dispatch with a single forced-refresh retry on HTTP 401.
//!
//! Every call follows the same two-state machine:
//!
//! 1. Resolve the session token (cache first), attach it, send.
//! 2. If the backend answers `401 Unauthorized` and the policy allows it, force a fresh token,
//!    attach it, and resend the identical request once. Whatever comes back is final.
//!
//! HTTP statuses never become errors here; only transport and configuration failures do.

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	http::{BackendHttpClient, BackendResponse, Method, OutboundRequest, StatusCode, header},
	oauth::{TokenClient, TransportErrorMapper},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	request::{Parameters, RequestBuilder},
};

/// Whether a request is resent after the backend rejects the token.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryPolicy {
	/// Force a token refresh and resend exactly once after a 401.
	OnceOnUnauthorized,
	#[default]
	/// Return the first response as is.
	Never,
}

/// Per-session dispatcher that decorates requests with the session's access token.
///
/// Obtain one through [`Broker::dispatcher`](crate::broker::Broker::dispatcher).
pub struct Dispatcher<C, M>
where
	C: ?Sized + BackendHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	tokens: TokenClient<C, M>,
}
impl<C, M> Dispatcher<C, M>
where
	C: ?Sized + BackendHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	pub(crate) fn new(tokens: TokenClient<C, M>) -> Self {
		Self { tokens }
	}

	/// Token client the dispatcher resolves tokens through.
	pub fn token_client(&self) -> &TokenClient<C, M> {
		&self.tokens
	}

	/// Starts an empty request builder for the configured backend.
	pub fn request_builder(&self) -> RequestBuilder {
		RequestBuilder::new(self.tokens.config.clone())
	}

	/// Sends a GET to `endpoint` with the builder's parameters as the query string.
	pub async fn send_get_request(
		&self,
		builder: &RequestBuilder,
		endpoint: &str,
	) -> Result<BackendResponse> {
		let url = builder.construct_url(endpoint, builder.parameters())?;
		let request = builder.create_get_request(url)?;

		self.dispatch(request, RetryPolicy::OnceOnUnauthorized).await
	}

	/// Sends the builder's parameters as a JSON body to `endpoint` using `method`
	/// (POST, PUT, PATCH, or DELETE).
	pub async fn send_post_request(
		&self,
		builder: &RequestBuilder,
		endpoint: &str,
		method: Method,
	) -> Result<BackendResponse> {
		let url = builder.construct_url(endpoint, &Parameters::new())?;
		let request = builder.create_request(url, method)?;

		self.dispatch(request, RetryPolicy::OnceOnUnauthorized).await
	}

	/// Sends a prepared request, retrying once on 401 when `policy` allows it.
	pub async fn dispatch(
		&self,
		request: OutboundRequest,
		policy: RetryPolicy,
	) -> Result<BackendResponse> {
		let span = FlowSpan::new(FlowKind::Dispatch, "dispatch");

		span.instrument(async move {
			obs::record_flow_outcome(FlowKind::Dispatch, FlowOutcome::Attempt);

			let result = self.dispatch_inner(request, policy).await;

			match &result {
				Ok(_) => obs::record_flow_outcome(FlowKind::Dispatch, FlowOutcome::Success),
				Err(e) => {
					tracing::warn!(error = %e, "Backend request failed.");
					obs::record_flow_outcome(FlowKind::Dispatch, FlowOutcome::Failure);
				},
			}

			result
		})
		.await
	}

	async fn dispatch_inner(
		&self,
		request: OutboundRequest,
		policy: RetryPolicy,
	) -> Result<BackendResponse> {
		let token = self.tokens.bearer(false).await?;

		if policy == RetryPolicy::Never {
			return self.send(request, token.as_ref()).await;
		}

		let response = self.send(request.clone(), token.as_ref()).await?;

		if response.status != StatusCode::UNAUTHORIZED {
			return Ok(response);
		}

		obs::record_flow_outcome(FlowKind::Dispatch, FlowOutcome::Retry);
		tracing::warn!(url = %request.url, "Backend rejected the access token; retrying once.");

		let token = self.tokens.bearer(true).await?;

		self.send(request, token.as_ref()).await
	}

	async fn send(
		&self,
		mut request: OutboundRequest,
		token: Option<&TokenSecret>,
	) -> Result<BackendResponse> {
		if let Err(e) = request.set_authorization(self.tokens.config.authorization_scheme, token) {
			tracing::warn!(error = %e, "Sending without the unusable access token.");
			request.headers.remove(header::AUTHORIZATION);
		}

		tracing::debug!(method = %request.method, url = %request.url, "Sending backend request.");

		let response = self
			.tokens
			.http_client
			.execute(request)
			.await
			.map_err(|e| self.tokens.mapper.map_transport_error(e))?;

		obs::record_backend_status(response.status.as_u16());

		Ok(response)
	}
}
impl<C, M> Clone for Dispatcher<C, M>
where
	C: ?Sized + BackendHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self { tokens: self.tokens.clone() }
	}
}
impl<C, M> Debug for Dispatcher<C, M>
where
	C: ?Sized + BackendHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Dispatcher").field("tokens", &self.tokens).finish()
	}
}
