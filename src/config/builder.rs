// crates.io
use oauth2::{ClientId, ClientSecret};
// self
use crate::{
	_prelude::*,
	auth::{IdentifierError, RoleName, ScopeSet, ScopeValidationError},
	config::{
		AuthorizationScheme, BackendEndpoint, BrokerConfig, ClientCredentials,
		DEFAULT_REQUEST_TIMEOUT, QueryEncoding, RoleScopes, Scheme,
	},
	dispatch::RetryPolicy,
};

/// Errors raised while constructing or validating [`BrokerConfig`] values.
#[derive(Debug, ThisError)]
pub enum ConfigBuildError {
	/// Configuration document could not be parsed.
	#[error("Configuration is malformed at `{}`.", source.path())]
	Parse {
		/// Structured parsing failure including the offending field path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Backend host is required.
	#[error("Missing backend host.")]
	MissingHost,
	/// Backend port is required and must be non-zero.
	#[error("Backend port must be between 1 and 65535.")]
	InvalidPort,
	/// Scheme, host, and port do not form a URL.
	#[error("Backend `{scheme}://{host}:{port}` is not a valid URL.")]
	InvalidBackend {
		/// Configured scheme.
		scheme: Scheme,
		/// Configured host.
		host: String,
		/// Configured port.
		port: u16,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// OAuth client identifier is required.
	#[error("Missing OAuth client identifier.")]
	MissingClientId,
	/// OAuth client secret is required.
	#[error("Missing OAuth client secret.")]
	MissingClientSecret,
	/// Token endpoint path is required.
	#[error("Missing token endpoint.")]
	MissingTokenEndpoint,
	/// Role name failed identifier validation.
	#[error("Role `{role}` is not a valid role name.")]
	InvalidRole {
		/// Offending role string.
		role: String,
		/// Underlying validation failure.
		#[source]
		source: IdentifierError,
	},
	/// Scope list for a role failed validation.
	#[error("Role `{role}` has an invalid scope list.")]
	InvalidScopes {
		/// Role whose scopes were rejected.
		role: String,
		/// Underlying validation failure.
		#[source]
		source: ScopeValidationError,
	},
	/// Every mapped role needs at least one scope.
	#[error("Role `{role}` maps to an empty scope set.")]
	EmptyRoleScopes {
		/// Role with no scopes.
		role: String,
	},
	/// Request timeout must be positive.
	#[error("Request timeout must be greater than zero.")]
	ZeroTimeout,
}

/// Builder for [`BrokerConfig`] values.
#[derive(Debug, Default)]
pub struct BrokerConfigBuilder {
	/// Backend URL scheme.
	pub scheme: Scheme,
	/// Backend host name.
	pub host: Option<String>,
	/// Backend port.
	pub port: Option<u16>,
	/// OAuth client identifier.
	pub client_id: Option<String>,
	/// OAuth client secret.
	pub client_secret: Option<String>,
	/// Token endpoint path relative to the backend.
	pub token_endpoint: Option<String>,
	/// Raw role-to-scope mapping, validated on [`build`](Self::build).
	pub role_scopes: BTreeMap<String, Vec<String>>,
	/// `Authorization` header format.
	pub authorization_scheme: AuthorizationScheme,
	/// Query-string encoding for GET parameters.
	pub query_encoding: QueryEncoding,
	/// Timeout for body-bearing requests; defaults to [`DEFAULT_REQUEST_TIMEOUT`].
	pub request_timeout: Option<StdDuration>,
	/// Retry policy applied to card uploads.
	pub card_upload_retry: RetryPolicy,
}
impl BrokerConfigBuilder {
	/// Sets scheme, host, and port of the backend.
	pub fn backend(mut self, scheme: Scheme, host: impl Into<String>, port: u16) -> Self {
		self.scheme = scheme;
		self.host = Some(host.into());
		self.port = Some(port);

		self
	}

	/// Sets the OAuth client credentials and the token endpoint path.
	pub fn client(
		mut self,
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
		token_endpoint: impl Into<String>,
	) -> Self {
		self.client_id = Some(client_id.into());
		self.client_secret = Some(client_secret.into());
		self.token_endpoint = Some(token_endpoint.into());

		self
	}

	/// Maps `role` to the provided scopes, replacing any previous mapping.
	pub fn role_scopes<I, S>(mut self, role: impl Into<String>, scopes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.role_scopes.insert(role.into(), scopes.into_iter().map(Into::into).collect());

		self
	}

	/// Overrides the `Authorization` header format.
	pub fn authorization_scheme(mut self, scheme: AuthorizationScheme) -> Self {
		self.authorization_scheme = scheme;

		self
	}

	/// Overrides the query-string encoding.
	pub fn query_encoding(mut self, encoding: QueryEncoding) -> Self {
		self.query_encoding = encoding;

		self
	}

	/// Overrides the body-bearing request timeout.
	pub fn request_timeout(mut self, timeout: StdDuration) -> Self {
		self.request_timeout = Some(timeout);

		self
	}

	/// Overrides the retry policy for card uploads.
	pub fn card_upload_retry(mut self, policy: RetryPolicy) -> Self {
		self.card_upload_retry = policy;

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<BrokerConfig, ConfigBuildError> {
		let host = self.host.filter(|h| !h.trim().is_empty()).ok_or(ConfigBuildError::MissingHost)?;
		let port = self.port.filter(|p| *p != 0).ok_or(ConfigBuildError::InvalidPort)?;
		let base_url = Url::parse(&format!("{}://{host}:{port}/", self.scheme)).map_err(|source| {
			ConfigBuildError::InvalidBackend { scheme: self.scheme, host: host.clone(), port, source }
		})?;
		let client_id =
			self.client_id.filter(|v| !v.is_empty()).ok_or(ConfigBuildError::MissingClientId)?;
		let client_secret = self
			.client_secret
			.filter(|v| !v.is_empty())
			.ok_or(ConfigBuildError::MissingClientSecret)?;
		let token_endpoint = self
			.token_endpoint
			.filter(|v| !v.trim().is_empty())
			.ok_or(ConfigBuildError::MissingTokenEndpoint)?;
		let role_scopes = validate_role_scopes(self.role_scopes)?;
		let request_timeout = self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT);

		if request_timeout.is_zero() {
			return Err(ConfigBuildError::ZeroTimeout);
		}

		Ok(BrokerConfig {
			backend: BackendEndpoint { scheme: self.scheme, host, port, base_url },
			client: ClientCredentials {
				client_id: ClientId::new(client_id),
				client_secret: ClientSecret::new(client_secret),
				token_endpoint,
			},
			role_scopes,
			authorization_scheme: self.authorization_scheme,
			query_encoding: self.query_encoding,
			request_timeout,
			card_upload_retry: self.card_upload_retry,
		})
	}
}

fn validate_role_scopes(
	raw: BTreeMap<String, Vec<String>>,
) -> Result<RoleScopes, ConfigBuildError> {
	let mut role_scopes = RoleScopes::default();

	for (role, scopes) in raw {
		let name = RoleName::new(&role)
			.map_err(|source| ConfigBuildError::InvalidRole { role: role.clone(), source })?;
		let set = ScopeSet::new(scopes)
			.map_err(|source| ConfigBuildError::InvalidScopes { role: role.clone(), source })?;

		if set.is_empty() {
			return Err(ConfigBuildError::EmptyRoleScopes { role });
		}

		role_scopes.insert(name, set);
	}

	Ok(role_scopes)
}

/// Serialized configuration document accepted by [`BrokerConfig::from_json_slice`].
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct RawBrokerConfig {
	backend: RawBackend,
	oauth: RawClient,
	#[serde(default)]
	role_scopes: BTreeMap<String, Vec<String>>,
	#[serde(default)]
	authorization_scheme: AuthorizationScheme,
	#[serde(default)]
	query_encoding: QueryEncoding,
	#[serde(default)]
	request_timeout_secs: Option<u64>,
	#[serde(default)]
	card_upload_retry: RetryPolicy,
}
impl RawBrokerConfig {
	pub(crate) fn into_builder(self) -> BrokerConfigBuilder {
		BrokerConfigBuilder {
			scheme: self.backend.scheme,
			host: Some(self.backend.host),
			port: Some(self.backend.port),
			client_id: Some(self.oauth.client_id),
			client_secret: Some(self.oauth.client_secret),
			token_endpoint: Some(self.oauth.token_endpoint),
			role_scopes: self.role_scopes,
			authorization_scheme: self.authorization_scheme,
			query_encoding: self.query_encoding,
			request_timeout: self.request_timeout_secs.map(StdDuration::from_secs),
			card_upload_retry: self.card_upload_retry,
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawBackend {
	#[serde(default)]
	scheme: Scheme,
	host: String,
	port: u16,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawClient {
	client_id: String,
	client_secret: String,
	token_endpoint: String,
}
