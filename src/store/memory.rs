//! Thread-safe in-memory [`SessionStore`] implementation.

// self
use crate::{
	_prelude::*,
	auth::{CachedToken, SessionId},
	store::{SessionStore, StoreError, StoreFuture},
};

type SessionMap = Arc<RwLock<HashMap<SessionId, CachedToken>>>;

/// Process-local session storage; entries vanish when the process exits.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(SessionMap);
impl MemoryStore {
	/// Number of sessions currently holding a token.
	pub fn len(&self) -> usize {
		self.0.read().len()
	}

	/// Returns `true` when no session holds a token.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}

	fn load_now(map: SessionMap, session: SessionId) -> Option<CachedToken> {
		map.read().get(&session).cloned()
	}

	fn save_now(map: SessionMap, session: SessionId, token: CachedToken) -> Result<(), StoreError> {
		map.write().insert(session, token);

		Ok(())
	}

	fn remove_now(map: SessionMap, session: SessionId) -> Option<CachedToken> {
		map.write().remove(&session)
	}

	fn prune_now(map: SessionMap, now: OffsetDateTime) -> usize {
		let mut guard = map.write();
		let before = guard.len();

		guard.retain(|_, token| token.is_valid_at(now));

		before - guard.len()
	}
}
impl SessionStore for MemoryStore {
	fn load<'a>(&'a self, session: &'a SessionId) -> StoreFuture<'a, Option<CachedToken>> {
		let map = self.0.clone();
		let session = session.to_owned();

		Box::pin(async move { Ok(Self::load_now(map, session)) })
	}

	fn save<'a>(&'a self, session: &'a SessionId, token: CachedToken) -> StoreFuture<'a, ()> {
		let map = self.0.clone();
		let session = session.to_owned();

		Box::pin(async move { Self::save_now(map, session, token) })
	}

	fn remove<'a>(&'a self, session: &'a SessionId) -> StoreFuture<'a, Option<CachedToken>> {
		let map = self.0.clone();
		let session = session.to_owned();

		Box::pin(async move { Ok(Self::remove_now(map, session)) })
	}

	fn prune_expired<'a>(&'a self, now: OffsetDateTime) -> StoreFuture<'a, usize> {
		let map = self.0.clone();

		Box::pin(async move { Ok(Self::prune_now(map, now)) })
	}
}
