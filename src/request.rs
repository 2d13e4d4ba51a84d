//! Accumulates headers and parameters and materializes backend requests.

// crates.io
use serde_json::{Map, Value};
// self
use crate::{
	_prelude::*,
	config::{BrokerConfig, QueryEncoding},
	error::ConfigError,
	http::{HeaderMap, HeaderName, HeaderValue, Method, OutboundRequest, RequestBody, header},
};

const JSON_CONTENT_TYPE: &str = "application/json";

/// Request parameters keyed by name, in insertion order.
pub type Parameters = Map<String, Value>;

/// Builder for backend resource requests.
///
/// Headers and parameters are collected without validation; later insertions overwrite earlier
/// ones with the same key (header names compare case-insensitively). Problems surface when the
/// request is materialized through [`create_request`](Self::create_request) or
/// [`create_get_request`](Self::create_get_request).
#[derive(Clone, Debug)]
pub struct RequestBuilder {
	config: Arc<BrokerConfig>,
	headers: Vec<(String, String)>,
	parameters: Parameters,
}
impl RequestBuilder {
	/// Creates an empty builder for the configured backend.
	pub fn new(config: Arc<BrokerConfig>) -> Self {
		Self { config, headers: Vec::new(), parameters: Map::new() }
	}

	/// Sets a header, replacing any header with the same name.
	pub fn add_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		let name = name.into();
		let value = value.into();

		match self.headers.iter_mut().find(|(existing, _)| existing.eq_ignore_ascii_case(&name)) {
			Some(slot) => *slot = (name, value),
			None => self.headers.push((name, value)),
		}

		self
	}

	/// Sets a parameter, replacing any parameter with the same name.
	pub fn add_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
		self.parameters.insert(name.into(), value.into());

		self
	}

	/// Sets several parameters at once.
	pub fn add_parameters<I, K, V>(mut self, parameters: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<Value>,
	{
		for (name, value) in parameters {
			self.parameters.insert(name.into(), value.into());
		}

		self
	}

	/// Collected headers in insertion order.
	pub fn headers(&self) -> &[(String, String)] {
		&self.headers
	}

	/// Collected parameters in insertion order.
	pub fn parameters(&self) -> &Parameters {
		&self.parameters
	}

	/// Builds `scheme://host:port/endpoint`, appending `query` as the query string.
	///
	/// Booleans render as `true`/`false`, strings verbatim, numbers in decimal, and `null` as an
	/// empty value. Encoding follows [`BrokerConfig::query_encoding`].
	pub fn construct_url(&self, endpoint: &str, query: &Parameters) -> Result<Url> {
		let mut url = self.config.backend.endpoint_url(endpoint)?;

		if query.is_empty() {
			return Ok(url);
		}

		match self.config.query_encoding {
			QueryEncoding::Percent => {
				let mut pairs = url.query_pairs_mut();

				for (name, value) in query {
					pairs.append_pair(name, &query_value(value));
				}
			},
			QueryEncoding::Raw => {
				let raw = query
					.iter()
					.map(|(name, value)| format!("{name}={}", query_value(value)))
					.collect::<Vec<_>>()
					.join("&");

				url.set_query(Some(&raw));
			},
		}

		Ok(url)
	}

	/// Materializes a body-bearing request carrying the parameters as a JSON object.
	///
	/// Adds `Content-type: application/json` unless a content type was set explicitly and
	/// applies the configured request timeout.
	pub fn create_request(&self, url: Url, method: Method) -> Result<OutboundRequest> {
		let mut request = OutboundRequest::new(method, url);

		request.headers = self.header_map()?;

		if !request.headers.contains_key(header::CONTENT_TYPE) {
			request
				.headers
				.insert(header::CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
		}

		request.body = RequestBody::Bytes(
			serde_json::to_vec(&self.parameters).map_err(ConfigError::Serialize)?,
		);
		request.timeout = Some(self.config.request_timeout);

		Ok(request)
	}

	/// Materializes a GET request with headers only; parameters belong in the URL.
	pub fn create_get_request(&self, url: Url) -> Result<OutboundRequest> {
		let mut request = OutboundRequest::new(Method::GET, url);

		request.headers = self.header_map()?;

		Ok(request)
	}

	fn header_map(&self) -> Result<HeaderMap, ConfigError> {
		let mut map = HeaderMap::with_capacity(self.headers.len());

		for (name, value) in &self.headers {
			let invalid = || ConfigError::InvalidHeader { name: name.clone() };
			let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
			let header_value = HeaderValue::from_str(value).map_err(|_| invalid())?;

			map.insert(header_name, header_value);
		}

		Ok(map)
	}
}

fn query_value(value: &Value) -> String {
	match value {
		Value::Null => String::new(),
		Value::Bool(flag) => flag.to_string(),
		Value::Number(number) => number.to_string(),
		Value::String(text) => text.clone(),
		Value::Array(_) | Value::Object(_) => value.to_string(),
	}
}
