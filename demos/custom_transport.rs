//! Demonstrates running the broker over a custom transport with its own error type.
//!
//! 1. Implement [`BackendHttpClient`] for the transport.
//! 2. Provide a [`TransportErrorMapper`] that classifies the transport's errors.
//! 3. Pass both to [`Broker::with_http_client`] and use the per-session handles as usual.

// std
use std::{
	error::Error as StdError,
	fmt::{Display, Formatter, Result as FmtResult},
	sync::Arc,
};
// crates.io
use color_eyre::Result;
// self
use dwarna_broker::{
	auth::{
		Capability, Principal, RoleName, SessionId, StudyId, UPDATE_CONSENT_CAPABILITY, Username,
	},
	broker::Broker,
	config::{BrokerConfig, Scheme},
	error::{Error, TransportError},
	http::{BackendHttpClient, BackendResponse, OutboundRequest, StatusCode, TransportFuture},
	oauth::TransportErrorMapper,
	session::Session,
	store::{MemoryStore, SessionStore},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let config = BrokerConfig::builder()
		.backend(Scheme::Http, "biobank.internal", 3198)
		.client("dwarna-web", "demo-secret", "token")
		.role_scopes("participant", ["view_study", "update_consent", "change_card"])
		.build()?;
	let store: Arc<dyn SessionStore> = Arc::new(MemoryStore::default());
	let mapper = Arc::new(InProcessErrorMapper);
	let broker: Broker<InProcessBackend, InProcessErrorMapper> = Broker::with_http_client(
		config.clone(),
		Arc::clone(&store),
		InProcessBackend::Healthy,
		Arc::clone(&mapper),
	);
	let principal = Principal::new(Username::new("alice")?, RoleName::new("participant")?)
		.with_capability(Capability::new(UPDATE_CONSENT_CAPABILITY)?);
	let session = Session::authenticated(SessionId::new("demo-session")?, principal);
	let study = StudyId::new("STUDY1")?;
	let has_card = broker.card_broker(&session).has_card(true, &study).await?;

	println!("Temporary card present for {study}: {has_card}.");

	let offline: Broker<InProcessBackend, InProcessErrorMapper> =
		Broker::with_http_client(config, store, InProcessBackend::Offline, mapper);

	match offline.card_broker(&session).has_consent(&study).await {
		Ok(answer) => println!("Offline backend unexpectedly answered: {answer}."),
		Err(e) => println!("Mapped transport failure: {}.", e.user_message()),
	}

	Ok(())
}

#[derive(Debug)]
enum InProcessError {
	Offline,
}
impl Display for InProcessError {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Offline => write!(f, "backend process is not running"),
		}
	}
}
impl StdError for InProcessError {}

/// Answers the token endpoint and every backend call from memory.
enum InProcessBackend {
	Healthy,
	Offline,
}
impl BackendHttpClient for InProcessBackend {
	type TransportError = InProcessError;

	fn execute(&self, request: OutboundRequest) -> TransportFuture<'_, Self::TransportError> {
		let result = match self {
			Self::Offline => Err(InProcessError::Offline),
			Self::Healthy if request.url.path() == "/token" => Ok(BackendResponse::new(
				StatusCode::OK,
				r#"{"access_token":"in-process-token","expires_in":3600}"#,
			)),
			Self::Healthy => Ok(BackendResponse::new(StatusCode::OK, r#"{"data":true}"#)),
		};

		Box::pin(async move { result })
	}
}

struct InProcessErrorMapper;
impl TransportErrorMapper<InProcessError> for InProcessErrorMapper {
	fn map_transport_error(&self, error: InProcessError) -> Error {
		TransportError::network(error).into()
	}
}
