//! Shared fixtures for broker integration tests.

#![allow(dead_code)]

// std
pub use std::{
	collections::VecDeque,
	error::Error as StdError,
	fmt::{Display, Formatter, Result as FmtResult},
	sync::Arc,
	time::Duration as StdDuration,
};
// crates.io
pub use parking_lot::Mutex;
pub use time::{Duration, OffsetDateTime, macros};
// self
pub use dwarna_broker::{
	auth::{
		CachedToken, Capability, Principal, RoleName, SessionId, UPDATE_CONSENT_CAPABILITY,
		Username,
	},
	broker::Broker,
	clock::ManualClock,
	config::{BrokerConfig, BrokerConfigBuilder, Scheme},
	error::{Error, Result},
	http::{BackendHttpClient, BackendResponse, OutboundRequest, StatusCode, TransportFuture},
	oauth::NetworkErrorMapper,
	session::Session,
	store::{MemoryStore, SessionStore},
};

pub const TOKEN_PATH: &str = "/token";
pub const PARTICIPANT_SCOPES: [&str; 6] = [
	"view_study",
	"update_consent",
	"view_consent",
	"change_card",
	"view_subscription",
	"update_subscription",
];

pub type ScriptedBroker = Broker<ScriptedHttpClient, NetworkErrorMapper>;

/// Transport error produced by [`ScriptedHttpClient`].
#[derive(Debug)]
pub enum FakeTransportError {
	ConnectionRefused,
	Unscripted,
}
impl Display for FakeTransportError {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::ConnectionRefused => write!(f, "Connection refused."),
			Self::Unscripted => write!(f, "No scripted response left."),
		}
	}
}
impl StdError for FakeTransportError {}

enum Outcome {
	Respond(StatusCode, Vec<u8>),
	Fail,
}

#[derive(Default)]
struct Script {
	token: VecDeque<Outcome>,
	backend: VecDeque<Outcome>,
	sent: Vec<OutboundRequest>,
}

/// In-process transport that replays scripted outcomes and records every request.
///
/// Requests to [`TOKEN_PATH`] consume the token script; everything else consumes the backend
/// script.
#[derive(Clone, Default)]
pub struct ScriptedHttpClient(Arc<Mutex<Script>>);
impl ScriptedHttpClient {
	pub fn token_response(self, status: u16, body: impl Into<Vec<u8>>) -> Self {
		self.0.lock().token.push_back(Outcome::Respond(status_code(status), body.into()));

		self
	}

	pub fn token(self, access_token: &str, expires_in: i64) -> Self {
		self.token_response(200, token_body(access_token, expires_in))
	}

	pub fn token_failure(self) -> Self {
		self.0.lock().token.push_back(Outcome::Fail);

		self
	}

	pub fn backend_response(self, status: u16, body: impl Into<Vec<u8>>) -> Self {
		self.0.lock().backend.push_back(Outcome::Respond(status_code(status), body.into()));

		self
	}

	pub fn backend_failure(self) -> Self {
		self.0.lock().backend.push_back(Outcome::Fail);

		self
	}

	pub fn sent(&self) -> Vec<OutboundRequest> {
		self.0.lock().sent.clone()
	}

	pub fn token_requests(&self) -> Vec<OutboundRequest> {
		self.sent().into_iter().filter(|r| r.url.path() == TOKEN_PATH).collect()
	}

	pub fn backend_requests(&self) -> Vec<OutboundRequest> {
		self.sent().into_iter().filter(|r| r.url.path() != TOKEN_PATH).collect()
	}
}
impl BackendHttpClient for ScriptedHttpClient {
	type TransportError = FakeTransportError;

	fn execute(&self, request: OutboundRequest) -> TransportFuture<'_, Self::TransportError> {
		let result = {
			let mut script = self.0.lock();
			let outcome = if request.url.path() == TOKEN_PATH {
				script.token.pop_front()
			} else {
				script.backend.pop_front()
			};

			script.sent.push(request);

			match outcome {
				Some(Outcome::Respond(status, body)) => Ok(BackendResponse::new(status, body)),
				Some(Outcome::Fail) => Err(FakeTransportError::ConnectionRefused),
				None => Err(FakeTransportError::Unscripted),
			}
		};

		Box::pin(async move { result })
	}
}

fn status_code(status: u16) -> StatusCode {
	StatusCode::from_u16(status).expect("Scripted status should be a valid HTTP status.")
}

pub fn token_body(access_token: &str, expires_in: i64) -> String {
	format!("{{\"access_token\":\"{access_token}\",\"expires_in\":{expires_in}}}")
}

pub fn config_builder(host: &str, port: u16) -> BrokerConfigBuilder {
	BrokerConfig::builder()
		.backend(Scheme::Http, host, port)
		.client("dwarna-web", "dwarna-secret", "token")
		.role_scopes("participant", PARTICIPANT_SCOPES)
		.role_scopes("researcher", ["view_study"])
}

pub fn config() -> BrokerConfig {
	config_builder("backend.test", 3198).build().expect("Test configuration should validate.")
}

pub fn start_clock() -> ManualClock {
	ManualClock::new(macros::datetime!(2025-01-01 00:00 UTC))
}

pub fn session_id(id: &str) -> SessionId {
	SessionId::new(id).expect("Session fixture should be valid.")
}

pub fn participant(username: &str) -> Principal {
	Principal::new(
		Username::new(username).expect("Username fixture should be valid."),
		RoleName::new("participant").expect("Role fixture should be valid."),
	)
	.with_capability(
		Capability::new(UPDATE_CONSENT_CAPABILITY).expect("Capability fixture should be valid."),
	)
}

pub fn participant_session(id: &str, username: &str) -> Session {
	Session::authenticated(session_id(id), participant(username))
}

pub fn principal_with_role(username: &str, role: &str) -> Principal {
	Principal::new(
		Username::new(username).expect("Username fixture should be valid."),
		RoleName::new(role).expect("Role fixture should be valid."),
	)
}

/// Builds a broker over a scripted transport, an in-memory store, and a manual clock.
pub fn scripted_broker(
	config: BrokerConfig,
	client: &ScriptedHttpClient,
) -> (ScriptedBroker, Arc<MemoryStore>, ManualClock) {
	let store = Arc::new(MemoryStore::default());
	let clock = start_clock();
	let broker = ScriptedBroker::with_http_client(
		config,
		store.clone() as Arc<dyn SessionStore>,
		client.clone(),
		Arc::new(NetworkErrorMapper),
	)
	.with_clock(Arc::new(clock.clone()));

	(broker, store, clock)
}
