//! Explicit per-request session state and its token cache.

// self
use crate::{
	_prelude::*,
	auth::{CachedToken, Principal, SessionId},
	cookie::BlockchainCookie,
	store::{SessionStore, StoreError},
};

/// Everything the broker knows about the caller of one request.
///
/// The host application builds a `Session` per incoming request and hands it to the broker;
/// nothing is read from ambient request state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
	/// Server-side session identifier that keys the token cache.
	pub id: SessionId,
	/// Logged-in principal, or `None` for anonymous visitors.
	pub principal: Option<Principal>,
	/// Companion blockchain-access cookie, when the browser sent one.
	pub blockchain_cookie: Option<BlockchainCookie>,
}
impl Session {
	/// Creates an anonymous session.
	pub fn anonymous(id: SessionId) -> Self {
		Self { id, principal: None, blockchain_cookie: None }
	}

	/// Creates a session for a logged-in principal.
	pub fn authenticated(id: SessionId, principal: Principal) -> Self {
		Self { id, principal: Some(principal), blockchain_cookie: None }
	}

	/// Attaches the parsed blockchain-access cookie.
	pub fn with_blockchain_cookie(mut self, cookie: BlockchainCookie) -> Self {
		self.blockchain_cookie = Some(cookie);

		self
	}

	/// Returns `true` when a principal is logged in.
	pub fn is_authenticated(&self) -> bool {
		self.principal.is_some()
	}
}

/// Single cached bearer token of one session.
#[derive(Clone)]
pub struct TokenCache {
	session: SessionId,
	store: Arc<dyn SessionStore>,
}
impl TokenCache {
	/// Binds a cache handle to `session` inside `store`.
	pub fn new(session: SessionId, store: Arc<dyn SessionStore>) -> Self {
		Self { session, store }
	}

	/// Session this cache belongs to.
	pub fn session(&self) -> &SessionId {
		&self.session
	}

	/// Returns the cached token and expiry, if any.
	pub async fn get(&self) -> Result<Option<CachedToken>, StoreError> {
		self.store.load(&self.session).await
	}

	/// Overwrites the cached entry unconditionally.
	pub async fn set(
		&self,
		access_token: impl Into<String>,
		expires_at: OffsetDateTime,
	) -> Result<(), StoreError> {
		self.store.save(&self.session, CachedToken::new(access_token, expires_at)).await
	}

	/// Drops every session's entry that expired at or before `now`; returns how many went.
	pub async fn prune_expired(&self, now: OffsetDateTime) -> Result<usize, StoreError> {
		self.store.prune_expired(now).await
	}

	/// Removes the cached entry.
	pub async fn clear(&self) -> Result<(), StoreError> {
		self.store.remove(&self.session).await.map(|_| ())
	}
}
impl Debug for TokenCache {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenCache").field("session", &self.session).finish()
	}
}
