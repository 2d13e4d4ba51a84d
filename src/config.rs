//! Immutable broker configuration validated at startup.
//!
//! The configuration names the backend (`scheme://host:port`), the OAuth client registered
//! with the backend's token endpoint, and the role-to-scope mapping. It is built once through
//! [`BrokerConfigBuilder`] (or loaded from JSON) and shared read-only afterwards.

/// Builder API for assembling broker configuration.
pub mod builder;

pub use builder::*;

// crates.io
use oauth2::{ClientId, ClientSecret};
// self
use crate::{
	_prelude::*,
	auth::{RoleName, ScopeSet},
	dispatch::RetryPolicy,
	error::ConfigError,
};

/// Timeout applied to body-bearing requests unless configured otherwise.
pub const DEFAULT_REQUEST_TIMEOUT: StdDuration = StdDuration::from_secs(10);

/// URL scheme used to reach the backend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
	#[default]
	/// Plain HTTP.
	Http,
	/// HTTP over TLS.
	Https,
}
impl Scheme {
	/// Returns the scheme as it appears in URLs.
	pub const fn as_str(self) -> &'static str {
		match self {
			Scheme::Http => "http",
			Scheme::Https => "https",
		}
	}
}
impl Display for Scheme {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// How the access token is written into the `Authorization` header.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationScheme {
	#[default]
	/// The header carries the bare token, as the backend expects.
	Raw,
	/// The header carries `Bearer <token>`.
	Bearer,
}
impl AuthorizationScheme {
	/// Formats the header value for `token`.
	pub fn header_value(self, token: &str) -> String {
		match self {
			AuthorizationScheme::Raw => token.to_owned(),
			AuthorizationScheme::Bearer => format!("Bearer {token}"),
		}
	}
}

/// Query-string encoding applied by
/// [`RequestBuilder::construct_url`](crate::request::RequestBuilder::construct_url).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryEncoding {
	#[default]
	/// Keys and values are percent-encoded.
	Percent,
	/// Keys and values are concatenated verbatim, so `&`, `=` and `+` inside values are not
	/// escaped.
	Raw,
}

/// Network location of the backend resource API and its token endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendEndpoint {
	/// URL scheme.
	pub scheme: Scheme,
	/// Host name or address.
	pub host: String,
	/// TCP port.
	pub port: u16,
	base_url: Url,
}
impl BackendEndpoint {
	/// `scheme://host:port/` that every endpoint is resolved against.
	pub fn base_url(&self) -> &Url {
		&self.base_url
	}

	/// Resolves `endpoint` (e.g. `has_card`) against the base URL.
	pub fn endpoint_url(&self, endpoint: &str) -> Result<Url, ConfigError> {
		let path = endpoint.trim_start_matches('/');

		Url::parse(&format!("{}{path}", self.base_url)).map_err(|source| {
			ConfigError::InvalidEndpoint { endpoint: endpoint.to_owned(), source }
		})
	}
}

/// OAuth client registered with the backend's token endpoint.
#[derive(Clone, Debug)]
pub struct ClientCredentials {
	/// OAuth 2.0 client identifier.
	pub client_id: ClientId,
	/// OAuth 2.0 client secret; redacted in `Debug` output.
	pub client_secret: ClientSecret,
	/// Token endpoint path relative to the backend base URL.
	pub token_endpoint: String,
}

/// Role-to-scope mapping; every role maps to a non-empty [`ScopeSet`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleScopes(BTreeMap<RoleName, ScopeSet>);
impl RoleScopes {
	/// Returns the scopes for `role`, if mapped.
	pub fn get(&self, role: &str) -> Option<&ScopeSet> {
		self.0.get(role)
	}

	/// Adds or replaces the scopes for `role`.
	pub fn insert(&mut self, role: RoleName, scopes: ScopeSet) -> Option<ScopeSet> {
		self.0.insert(role, scopes)
	}

	/// Iterates over the mapping in role order.
	pub fn iter(&self) -> impl Iterator<Item = (&RoleName, &ScopeSet)> {
		self.0.iter()
	}

	/// Number of mapped roles.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Returns `true` when no role is mapped.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}
impl FromIterator<(RoleName, ScopeSet)> for RoleScopes {
	fn from_iter<I>(iter: I) -> Self
	where
		I: IntoIterator<Item = (RoleName, ScopeSet)>,
	{
		Self(iter.into_iter().collect())
	}
}

/// Validated, read-only broker configuration.
#[derive(Clone, Debug)]
pub struct BrokerConfig {
	/// Backend location shared by the resource API and the token endpoint.
	pub backend: BackendEndpoint,
	/// OAuth client credentials.
	pub client: ClientCredentials,
	/// Scopes requested per role.
	pub role_scopes: RoleScopes,
	/// `Authorization` header format.
	pub authorization_scheme: AuthorizationScheme,
	/// Query-string encoding for GET parameters.
	pub query_encoding: QueryEncoding,
	/// Timeout for body-bearing requests and token exchanges.
	pub request_timeout: StdDuration,
	/// Retry policy applied to card uploads.
	pub card_upload_retry: RetryPolicy,
}
impl BrokerConfig {
	/// Creates an empty builder.
	pub fn builder() -> BrokerConfigBuilder {
		BrokerConfigBuilder::default()
	}

	/// Loads and validates configuration from a JSON document.
	pub fn from_json_slice(bytes: &[u8]) -> Result<Self, ConfigBuildError> {
		let mut deserializer = serde_json::Deserializer::from_slice(bytes);
		let raw: RawBrokerConfig = serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source| ConfigBuildError::Parse { source })?;

		raw.into_builder().build()
	}

	/// Token endpoint URL resolved against the backend.
	pub fn token_url(&self) -> Result<Url, ConfigError> {
		self.backend.endpoint_url(&self.client.token_endpoint)
	}

	/// Scopes for `role`; a missing mapping is a deployment error.
	pub fn scopes_for(&self, role: &RoleName) -> Result<&ScopeSet, ConfigError> {
		self.role_scopes
			.get(role)
			.ok_or_else(|| ConfigError::MissingRoleScopes { role: role.to_string() })
	}
}
