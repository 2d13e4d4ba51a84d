//! Broker-level error types shared across the token client, dispatcher, and card broker.

// self
use crate::_prelude::*;

/// Broker-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical broker error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Session storage failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem; signals a broken deployment.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Token endpoint answered, but not with a usable token.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS, timeout) on any outbound call.
	#[error(transparent)]
	BackendUnreachable(#[from] TransportError),
	/// Card input could not be prepared.
	#[error(transparent)]
	Card(#[from] crate::card::CardError),

	/// No logged-in principal is attached to the session.
	#[error("No authenticated principal is attached to the session.")]
	Unauthenticated,
	/// The principal lacks the capability required by the operation.
	#[error("Principal lacks the `{capability}` capability.")]
	Forbidden {
		/// Capability that was required.
		capability: String,
	},
	/// Backend still rejected the request after the token was refreshed.
	#[error("Backend rejected the access token: {reason}.")]
	Unauthorized {
		/// Backend- or broker-supplied reason string.
		reason: String,
	},
	/// Backend returned a well-formed response that carries an application error.
	#[error(transparent)]
	Backend(#[from] BackendApplicationError),
}
impl Error {
	/// Returns `true` for errors that indicate a broken deployment rather than a transient
	/// condition.
	pub fn is_fatal(&self) -> bool {
		matches!(self, Self::Config(_))
	}

	/// Message suitable for rendering to an end user.
	///
	/// Transport failures include the underlying transport's error text.
	pub fn user_message(&self) -> String {
		match self {
			Self::BackendUnreachable(err) => match StdError::source(err) {
				Some(source) => format!("Could not reach the backend: {source}"),
				None => format!("Could not reach the backend: {err}"),
			},
			Self::Backend(err) => err.message.clone(),
			_ => self.to_string(),
		}
	}
}

/// Configuration and validation failures raised by the broker.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Backend or token endpoint URL cannot be formed from the configuration.
	#[error("Endpoint `{endpoint}` does not form a valid URL.")]
	InvalidEndpoint {
		/// Endpoint path that was joined onto the backend base URL.
		endpoint: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Header name or value cannot be sent over HTTP.
	#[error("Header `{name}` is not a valid HTTP header.")]
	InvalidHeader {
		/// Offending header name.
		name: String,
	},
	/// Request parameters cannot be encoded as JSON.
	#[error("Request parameters cannot be serialized.")]
	Serialize(#[from] serde_json::Error),
	/// The principal's role has no scope mapping.
	#[error("Role `{role}` has no scope mapping.")]
	MissingRoleScopes {
		/// Role that was looked up.
		role: String,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Token endpoint failures that a later attempt may not repeat.
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Token endpoint answered with a non-success status.
	#[error("Token endpoint returned an unexpected response: {message}.")]
	TokenEndpoint {
		/// Endpoint- or broker-supplied message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Token endpoint responded with malformed JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	TokenResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Token endpoint returned a non-positive lifetime.
	#[error("The expires_in value must be positive, got {expires_in}.")]
	NonPositiveExpiresIn {
		/// Raw value supplied by the token endpoint.
		expires_in: i64,
	},
	/// Token endpoint returned a lifetime whose expiry cannot be represented.
	#[error("The expires_in value {expires_in} puts the expiry out of range.")]
	ExpiresInOutOfRange {
		/// Raw value supplied by the token endpoint.
		expires_in: i64,
	},
	/// Token endpoint returned an access token that cannot travel in a header.
	#[error("Token endpoint returned an access token that is not a valid header value.")]
	InvalidAccessToken,
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the backend.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Request exceeded its deadline.
	#[error("Request timed out while calling the backend.")]
	Timeout {
		/// Transport-specific timeout error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the backend.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}

	/// Wraps a transport-specific timeout error.
	pub fn timeout(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Timeout { source: Box::new(src) }
	}
}

/// Backend response that reports an application-level failure.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Backend responded with status {status}: {message}")]
pub struct BackendApplicationError {
	/// HTTP status code of the response.
	pub status: u16,
	/// Backend-supplied `error` field, or a status summary when absent.
	pub message: String,
}

#[cfg(test)]
mod tests {
	// std
	use std::io;
	// self
	use super::*;

	#[test]
	fn only_configuration_errors_are_fatal() {
		let config: Error = ConfigError::MissingRoleScopes { role: "participant".into() }.into();
		let transport: Error = TransportError::Io(io::Error::other("refused")).into();

		assert!(config.is_fatal());
		assert!(!transport.is_fatal());
		assert!(!Error::Unauthenticated.is_fatal());
	}

	#[test]
	fn user_message_carries_transport_text() {
		let err: Error =
			TransportError::network(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"))
				.into();

		assert_eq!(err.user_message(), "Could not reach the backend: refused");
	}

	#[test]
	fn user_message_prefers_backend_error_field() {
		let err: Error =
			BackendApplicationError { status: 400, message: "Study does not exist".into() }.into();

		assert_eq!(err.user_message(), "Study does not exist");
		assert_eq!(err.to_string(), "Backend responded with status 400: Study does not exist");
	}
}
