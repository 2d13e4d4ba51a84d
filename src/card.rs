//! Blockchain identity card brokering.
//!
//! A participant holds one identity card per study, first as a temporary card issued by the
//! backend and later as a credentialed card once the browser has exchanged it with the
//! blockchain identity service. [`CardBroker`] checks for, downloads, and uploads those cards and
//! answers whether consent has been recorded, always on behalf of the session's principal.

// std
use std::{
	fs, io,
	path::{Path, PathBuf},
};
// crates.io
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	auth::{Principal, StudyId, UPDATE_CONSENT_CAPABILITY, Username},
	cookie::BlockchainCookie,
	dispatch::Dispatcher,
	error::BackendApplicationError,
	http::{
		BackendHttpClient, BackendResponse, Method, MultipartFile, MultipartForm, RequestBody,
		StatusCode,
	},
	oauth::TransportErrorMapper,
	obs::{FlowKind, FlowSpan},
};

/// Backend endpoint answering whether a card exists.
pub const HAS_CARD_ENDPOINT: &str = "has_card";
/// Backend endpoint returning the raw card.
pub const GET_CARD_ENDPOINT: &str = "get_card";
/// Backend endpoint accepting credentialed card uploads.
pub const SAVE_CARD_ENDPOINT: &str = "save_cred_card";
/// Backend endpoint answering whether consent has been recorded.
pub const HAS_CONSENT_ENDPOINT: &str = "has_consent";

const CARD_CONTENT_TYPE: &str = "application/octet-stream";

/// Errors raised while preparing card uploads or decoding card responses.
#[derive(Debug, ThisError)]
pub enum CardError {
	/// The card file could not be read.
	#[error("Card file {} cannot be read.", path.display())]
	Unreadable {
		/// Path that was read.
		path: PathBuf,
		/// Underlying I/O failure.
		#[source]
		source: io::Error,
	},
	/// The backend answered with a body that is not a `{data, error}` envelope.
	#[error("Backend returned a malformed `{endpoint}` response.")]
	MalformedResponse {
		/// Endpoint that was called.
		endpoint: &'static str,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// The envelope carried neither data nor an error.
	#[error("Backend `{endpoint}` response has no data.")]
	MissingData {
		/// Endpoint that was called.
		endpoint: &'static str,
	},
}

/// Whether a card is the temporary one issued by the backend or the credentialed one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardKind {
	/// Card issued by the backend, not yet exchanged with the identity service.
	Temporary,
	/// Card exchanged with the identity service.
	Credentialed,
}
impl CardKind {
	/// Value of the backend's `temp` flag.
	pub const fn is_temporary(self) -> bool {
		matches!(self, CardKind::Temporary)
	}
}
impl From<bool> for CardKind {
	fn from(temp: bool) -> Self {
		if temp { CardKind::Temporary } else { CardKind::Credentialed }
	}
}

/// Opaque card blob tied to a user and a study.
#[derive(Clone, PartialEq, Eq)]
pub struct Card {
	/// Raw card bytes as returned by the backend.
	pub bytes: Vec<u8>,
	/// Temporary or credentialed.
	pub kind: CardKind,
	/// Owner of the card.
	pub username: Username,
	/// Study the card belongs to.
	pub study_id: StudyId,
}
impl Card {
	/// File name announced when the card is uploaded from memory.
	pub fn file_name(&self) -> String {
		format!("{}.card", self.username)
	}
}
impl Debug for Card {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Card")
			.field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
			.field("kind", &self.kind)
			.field("username", &self.username)
			.field("study_id", &self.study_id)
			.finish()
	}
}

/// `{data, error}` shape rendered to the browser.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
	/// Payload, or its default when the operation failed.
	pub data: T,
	/// User-facing error message, present only on failure.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}
impl<T> Envelope<T> {
	/// Returns `true` when no error is attached.
	pub fn is_ok(&self) -> bool {
		self.error.is_none()
	}
}
impl Envelope<bool> {
	/// Renders a unit outcome as `{data: true}` or `{data: false, error}`.
	pub fn flag(result: Result<()>) -> Self {
		Self::from(result.map(|()| true))
	}
}
impl<T> From<Result<T>> for Envelope<T>
where
	T: Default,
{
	fn from(result: Result<T>) -> Self {
		match result {
			Ok(data) => Self { data, error: None },
			Err(e) => Self { data: T::default(), error: Some(e.user_message()) },
		}
	}
}

#[derive(Debug, Deserialize)]
struct RawEnvelope<T> {
	data: Option<T>,
	#[serde(default)]
	error: Option<String>,
}

impl BackendResponse {
	/// Decodes a `{data, error}` body, turning backend-reported failures into errors.
	///
	/// A 401 becomes [`Error::Unauthorized`]; a non-empty `error` field or any other non-success
	/// status becomes [`Error::Backend`].
	pub fn decode_envelope<T>(&self, endpoint: &'static str) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let mut deserializer = serde_json::Deserializer::from_slice(&self.body);
		let parsed: Result<RawEnvelope<T>, _> = serde_path_to_error::deserialize(&mut deserializer);
		let reported =
			parsed.as_ref().ok().and_then(|raw| raw.error.clone()).filter(|e| !e.is_empty());

		self.ensure_status(reported)?;

		let raw = parsed.map_err(|source| CardError::MalformedResponse { endpoint, source })?;

		raw.data.ok_or_else(|| CardError::MissingData { endpoint }.into())
	}

	fn ensure_status(&self, reported: Option<String>) -> Result<()> {
		if self.status == StatusCode::UNAUTHORIZED {
			return Err(Error::Unauthorized {
				reason: reported.unwrap_or_else(|| self.status_summary()),
			});
		}
		if let Some(message) = reported {
			return Err(BackendApplicationError { status: self.status.as_u16(), message }.into());
		}
		if !self.is_success() {
			return Err(self.application_error().into());
		}

		Ok(())
	}

	fn application_error(&self) -> BackendApplicationError {
		let message = serde_json::from_slice::<RawEnvelope<serde_json::Value>>(&self.body)
			.ok()
			.and_then(|raw| raw.error)
			.filter(|e| !e.is_empty())
			.unwrap_or_else(|| self.status_summary());

		BackendApplicationError { status: self.status.as_u16(), message }
	}
}

/// Per-session card broker.
///
/// Every operation requires a principal holding [`UPDATE_CONSENT_CAPABILITY`]; both checks run
/// before any network traffic. Obtain one through
/// [`Broker::card_broker`](crate::broker::Broker::card_broker).
pub struct CardBroker<C, M>
where
	C: ?Sized + BackendHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	dispatcher: Dispatcher<C, M>,
	blockchain_cookie: Option<BlockchainCookie>,
}
impl<C, M> CardBroker<C, M>
where
	C: ?Sized + BackendHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	pub(crate) fn new(
		dispatcher: Dispatcher<C, M>,
		blockchain_cookie: Option<BlockchainCookie>,
	) -> Self {
		Self { dispatcher, blockchain_cookie }
	}

	/// Dispatcher the broker sends through.
	pub fn dispatcher(&self) -> &Dispatcher<C, M> {
		&self.dispatcher
	}

	/// Token from the session's blockchain-access cookie, if the browser sent one.
	pub fn blockchain_access_token(&self) -> Option<&str> {
		self.blockchain_cookie.as_ref().map(BlockchainCookie::token)
	}

	/// Returns whether the principal holds a card of the given kind for `study_id`.
	pub async fn has_card(&self, temp: bool, study_id: &StudyId) -> Result<bool> {
		let principal = self.authorize()?;
		let span = FlowSpan::new(FlowKind::Card, "has_card");

		span.instrument(async move {
			let builder = self
				.dispatcher
				.request_builder()
				.add_parameter("username", principal.username.to_string())
				.add_parameter("temp", temp)
				.add_parameter("study_id", study_id.to_string());
			let response = self.dispatcher.send_get_request(&builder, HAS_CARD_ENDPOINT).await?;

			response.decode_envelope(HAS_CARD_ENDPOINT)
		})
		.await
	}

	/// Downloads the principal's card for `study_id` without decoding it.
	pub async fn get_card(&self, temp: bool, study_id: &StudyId) -> Result<Card> {
		let principal = self.authorize()?;
		let span = FlowSpan::new(FlowKind::Card, "get_card");

		span.instrument(async move {
			let builder = self
				.dispatcher
				.request_builder()
				.add_parameter("username", principal.username.to_string())
				.add_parameter("temp", temp)
				.add_parameter("study_id", study_id.to_string());
			let response = self.dispatcher.send_get_request(&builder, GET_CARD_ENDPOINT).await?;

			response.ensure_status(None)?;

			Ok(Card {
				bytes: response.body,
				kind: CardKind::from(temp),
				username: principal.username.clone(),
				study_id: study_id.clone(),
			})
		})
		.await
	}

	/// Uploads the credentialed card stored at `card_path` for the blockchain `address`.
	///
	/// Succeeds only when the backend answers HTTP 200.
	///
	/// The file is read with blocking I/O on the calling task before anything is sent. Cards are
	/// a few kilobytes; callers on a latency-sensitive executor can read the file themselves and
	/// use [`save_card_contents`](Self::save_card_contents) instead.
	pub async fn save_card(&self, card_path: &Path, address: &str) -> Result<()> {
		let principal = self.authorize()?;
		let bytes = fs::read(card_path)
			.map_err(|source| CardError::Unreadable { path: card_path.to_owned(), source })?;
		let file_name = card_path
			.file_name()
			.map(|name| name.to_string_lossy().into_owned())
			.unwrap_or_else(|| format!("{}.card", principal.username));

		self.upload(principal, file_name, bytes, address).await
	}

	/// Uploads card `bytes` already read by the caller, announced as `file_name`.
	pub async fn save_card_contents(
		&self,
		file_name: impl Into<String>,
		bytes: Vec<u8>,
		address: &str,
	) -> Result<()> {
		let principal = self.authorize()?;

		self.upload(principal, file_name.into(), bytes, address).await
	}

	/// Uploads an in-memory card for the blockchain `address`.
	pub async fn save_card_bytes(&self, card: &Card, address: &str) -> Result<()> {
		let principal = self.authorize()?;

		self.upload(principal, card.file_name(), card.bytes.clone(), address).await
	}

	/// Returns whether consent has been recorded for `study_id`.
	pub async fn has_consent(&self, study_id: &StudyId) -> Result<bool> {
		self.authorize()?;

		let span = FlowSpan::new(FlowKind::Card, "has_consent");

		span.instrument(async move {
			let builder =
				self.dispatcher.request_builder().add_parameter("study_id", study_id.to_string());
			let response =
				self.dispatcher.send_get_request(&builder, HAS_CONSENT_ENDPOINT).await?;

			response.decode_envelope(HAS_CONSENT_ENDPOINT)
		})
		.await
	}

	async fn upload(
		&self,
		principal: &Principal,
		file_name: String,
		bytes: Vec<u8>,
		address: &str,
	) -> Result<()> {
		let span = FlowSpan::new(FlowKind::Card, "save_card");

		span.instrument(async move {
			let builder = self.dispatcher.request_builder();
			let url = builder.construct_url(SAVE_CARD_ENDPOINT, builder.parameters())?;
			let mut request = builder.create_get_request(url)?;
			let form = MultipartForm::default()
				.file(MultipartFile {
					field: "card".into(),
					file_name,
					content_type: CARD_CONTENT_TYPE.into(),
					bytes,
				})
				.text("username", principal.username.to_string())
				.text("address", address);

			request.method = Method::POST;
			request.body = RequestBody::Multipart(form);
			request.timeout = Some(self.dispatcher.token_client().config.request_timeout);

			let policy = self.dispatcher.token_client().config.card_upload_retry;
			let response = self.dispatcher.dispatch(request, policy).await?;

			if response.status == StatusCode::OK {
				tracing::debug!(address, "Credentialed card saved.");

				return Ok(());
			}

			response.ensure_status(None)?;

			Err(BackendApplicationError {
				status: response.status.as_u16(),
				message: response.status_summary(),
			}
			.into())
		})
		.await
	}

	fn authorize(&self) -> Result<&Principal> {
		let principal =
			self.dispatcher.token_client().principal().ok_or(Error::Unauthenticated)?;

		if !principal.can(UPDATE_CONSENT_CAPABILITY) {
			tracing::debug!(username = %principal.username, "Card operation denied.");

			return Err(Error::Forbidden { capability: UPDATE_CONSENT_CAPABILITY.to_owned() });
		}

		Ok(principal)
	}
}
impl<C, M> Debug for CardBroker<C, M>
where
	C: ?Sized + BackendHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CardBroker")
			.field("dispatcher", &self.dispatcher)
			.field("blockchain_cookie", &self.blockchain_cookie)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::error::TransportError;

	fn response(status: StatusCode, body: &str) -> BackendResponse {
		BackendResponse::new(status, body)
	}

	#[test]
	fn envelope_decodes_data() {
		let value: bool = response(StatusCode::OK, r#"{"data":true,"error":""}"#)
			.decode_envelope(HAS_CARD_ENDPOINT)
			.expect("Envelope should decode.");

		assert!(value);
	}

	#[test]
	fn envelope_error_field_becomes_backend_error() {
		let err = response(StatusCode::OK, r#"{"data":false,"error":"Study does not exist"}"#)
			.decode_envelope::<bool>(HAS_CARD_ENDPOINT)
			.expect_err("Error field must surface.");

		assert!(matches!(
			err,
			Error::Backend(BackendApplicationError { status: 200, ref message })
				if message == "Study does not exist"
		));
	}

	#[test]
	fn unauthorized_envelopes_are_distinguished() {
		let err = response(StatusCode::UNAUTHORIZED, "")
			.decode_envelope::<bool>(HAS_CONSENT_ENDPOINT)
			.expect_err("401 must surface.");

		assert!(matches!(err, Error::Unauthorized { ref reason } if reason == "401 Unauthorized"));
	}

	#[test]
	fn malformed_and_empty_envelopes_are_card_errors() {
		assert!(matches!(
			response(StatusCode::OK, "not json").decode_envelope::<bool>(HAS_CARD_ENDPOINT),
			Err(Error::Card(CardError::MalformedResponse { endpoint: HAS_CARD_ENDPOINT, .. }))
		));
		assert!(matches!(
			response(StatusCode::OK, "{}").decode_envelope::<bool>(HAS_CARD_ENDPOINT),
			Err(Error::Card(CardError::MissingData { endpoint: HAS_CARD_ENDPOINT }))
		));
	}

	#[test]
	fn envelope_renders_results() {
		assert_eq!(Envelope::flag(Ok(())), Envelope { data: true, error: None });

		let unreachable = Envelope::flag(Err(
			TransportError::network(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"))
				.into(),
		));

		assert!(!unreachable.data);
		assert_eq!(unreachable.error.as_deref(), Some("Could not reach the backend: refused"));

		let rendered = serde_json::to_string(&Envelope::from(Ok::<_, Error>(true)))
			.expect("Envelope should serialize.");

		assert_eq!(rendered, r#"{"data":true}"#);
	}

	#[test]
	fn card_kind_follows_temp_flag() {
		assert_eq!(CardKind::from(true), CardKind::Temporary);
		assert!(!CardKind::from(false).is_temporary());
	}
}
