//! Access token material and its `Authorization` header rendering.

// self
use crate::{_prelude::*, config::AuthorizationScheme, error::TransientError, http::HeaderValue};

/// Access token issued by the backend's token endpoint.
///
/// Formatting never prints the token. [`expose`](Self::expose) is the only way to read it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps a token string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the raw token. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Whether the token is non-empty and can travel in an HTTP header.
	pub fn is_usable(&self) -> bool {
		!self.0.is_empty() && HeaderValue::from_str(&self.0).is_ok()
	}

	/// Renders the `Authorization` header value for `scheme`, marked sensitive.
	pub fn header_value(&self, scheme: AuthorizationScheme) -> Result<HeaderValue, TransientError> {
		if self.0.is_empty() {
			return Err(TransientError::InvalidAccessToken);
		}

		let mut value = HeaderValue::from_str(&scheme.header_value(&self.0))
			.map_err(|_| TransientError::InvalidAccessToken)?;

		value.set_sensitive(true);

		Ok(value)
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("TokenSecret").field(&"<redacted>").finish()
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}
