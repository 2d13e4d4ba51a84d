//! Transport primitives for backend and token-endpoint calls.
//!
//! The module exposes [`BackendHttpClient`] alongside the owned [`OutboundRequest`] and
//! [`BackendResponse`] values so downstream crates can plug in their own HTTP stack. The
//! broker never reads ambient state: everything a transport needs (method, URL, headers, body,
//! and an optional per-request timeout) travels inside the request value.

pub use oauth2::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header};

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// self
use crate::{_prelude::*, auth::TokenSecret, config::AuthorizationScheme, error::TransientError};

/// Boxed future returned by [`BackendHttpClient::execute`].
pub type TransportFuture<'a, E> =
	Pin<Box<dyn Future<Output = Result<BackendResponse, E>> + 'a + Send>>;

/// Abstraction over HTTP transports used for every outbound call.
///
/// Implementations must resolve with a [`BackendResponse`] for every HTTP answer, including
/// 4xx and 5xx statuses; only failures that prevent a response (DNS, TCP, TLS, timeouts) are
/// reported through [`BackendHttpClient::TransportError`]. Implementations must be
/// `Send + Sync + 'static` so one client can be shared by every session.
pub trait BackendHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// Sends `request` and collects the full response body.
	fn execute(&self, request: OutboundRequest) -> TransportFuture<'_, Self::TransportError>;
}

/// File part of a multipart upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MultipartFile {
	/// Form field name.
	pub field: String,
	/// File name announced in the part's `Content-Disposition`.
	pub file_name: String,
	/// MIME type of the part.
	pub content_type: String,
	/// Raw file contents.
	pub bytes: Vec<u8>,
}

/// `multipart/form-data` body made of text fields and file parts.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MultipartForm {
	/// Text fields in insertion order.
	pub fields: Vec<(String, String)>,
	/// File parts in insertion order.
	pub files: Vec<MultipartFile>,
}
impl MultipartForm {
	/// Appends a text field.
	pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.fields.push((name.into(), value.into()));

		self
	}

	/// Appends a file part.
	pub fn file(mut self, file: MultipartFile) -> Self {
		self.files.push(file);

		self
	}

	/// Returns the value of the named text field.
	pub fn field(&self, name: &str) -> Option<&str> {
		self.fields.iter().find(|(key, _)| key == name).map(|(_, value)| value.as_str())
	}
}

/// Body carried by an [`OutboundRequest`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum RequestBody {
	#[default]
	/// No body.
	Empty,
	/// Pre-encoded bytes; the content type travels in the headers.
	Bytes(Vec<u8>),
	/// Multipart form; the transport chooses the boundary and content type.
	Multipart(MultipartForm),
}

/// Fully prepared HTTP request.
#[derive(Clone, Debug)]
pub struct OutboundRequest {
	/// HTTP method.
	pub method: Method,
	/// Absolute target URL, query included.
	pub url: Url,
	/// Request headers.
	pub headers: HeaderMap,
	/// Request body.
	pub body: RequestBody,
	/// Per-request timeout; `None` leaves the transport default in place.
	pub timeout: Option<StdDuration>,
}
impl OutboundRequest {
	/// Creates a request without headers, body, or timeout.
	pub fn new(method: Method, url: Url) -> Self {
		Self { method, url, headers: HeaderMap::new(), body: RequestBody::Empty, timeout: None }
	}

	/// Sets or clears the `Authorization` header.
	///
	/// The value is marked sensitive so transports and `Debug` output never print it.
	pub fn set_authorization(
		&mut self,
		scheme: AuthorizationScheme,
		token: Option<&TokenSecret>,
	) -> Result<(), TransientError> {
		match token {
			Some(token) => {
				self.headers.insert(header::AUTHORIZATION, token.header_value(scheme)?);
			},
			None => {
				self.headers.remove(header::AUTHORIZATION);
			},
		}

		Ok(())
	}

	/// Returns the `Authorization` header value, if present and printable.
	pub fn authorization(&self) -> Option<&str> {
		self.headers.get(header::AUTHORIZATION).and_then(|value| value.to_str().ok())
	}

	/// Returns the request body bytes, if the body is [`RequestBody::Bytes`].
	pub fn body_bytes(&self) -> Option<&[u8]> {
		match &self.body {
			RequestBody::Bytes(bytes) => Some(bytes),
			_ => None,
		}
	}
}

/// Fully buffered HTTP response.
#[derive(Clone, Debug)]
pub struct BackendResponse {
	/// HTTP status code.
	pub status: StatusCode,
	/// Response headers.
	pub headers: HeaderMap,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl BackendResponse {
	/// Creates a response without headers.
	pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
		Self { status, headers: HeaderMap::new(), body: body.into() }
	}

	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		self.status.is_success()
	}

	/// Body decoded as UTF-8, replacing invalid sequences.
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}

	/// Short summary used when the body carries no better message.
	pub(crate) fn status_summary(&self) -> String {
		match self.status.canonical_reason() {
			Some(reason) => format!("{} {reason}", self.status.as_u16()),
			None => self.status.as_u16().to_string(),
		}
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Per-request timeouts from [`OutboundRequest::timeout`] are applied on top of whatever the
/// wrapped client was built with.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl BackendHttpClient for ReqwestHttpClient {
	type TransportError = ReqwestError;

	fn execute(&self, request: OutboundRequest) -> TransportFuture<'_, Self::TransportError> {
		let client = self.0.clone();

		Box::pin(async move {
			let OutboundRequest { method, url, headers, body, timeout } = request;
			let mut builder = client.request(method, url).headers(headers);

			if let Some(timeout) = timeout {
				builder = builder.timeout(timeout);
			}

			builder = match body {
				RequestBody::Empty => builder,
				RequestBody::Bytes(bytes) => builder.body(bytes),
				RequestBody::Multipart(form) => builder.multipart(to_reqwest_form(form)?),
			};

			let response = builder.send().await?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let body = response.bytes().await?.to_vec();

			Ok(BackendResponse { status, headers, body })
		})
	}
}

#[cfg(feature = "reqwest")]
fn to_reqwest_form(form: MultipartForm) -> Result<reqwest::multipart::Form, ReqwestError> {
	// crates.io
	use reqwest::multipart::{Form, Part};

	let mut out = Form::new();

	for (name, value) in form.fields {
		out = out.text(name, value);
	}
	for file in form.files {
		let part = Part::bytes(file.bytes).file_name(file.file_name).mime_str(&file.content_type)?;

		out = out.part(file.field, part);
	}

	Ok(out)
}
