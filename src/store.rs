//! Storage contracts and built-in session stores for cached access tokens.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{CachedToken, SessionId},
};

/// Boxed future returned by [`SessionStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Server-side session storage holding at most one cached token per session.
///
/// Writes replace the previous entry wholesale; implementations never merge entries and need
/// no compare-and-swap, so two concurrent writers for the same session resolve as
/// last-write-wins.
pub trait SessionStore
where
	Self: Send + Sync,
{
	/// Returns the token cached for `session`, if any.
	fn load<'a>(&'a self, session: &'a SessionId) -> StoreFuture<'a, Option<CachedToken>>;

	/// Stores `token` for `session`, replacing any previous entry.
	fn save<'a>(&'a self, session: &'a SessionId, token: CachedToken) -> StoreFuture<'a, ()>;

	/// Removes the entry for `session`, returning what was stored.
	fn remove<'a>(&'a self, session: &'a SessionId) -> StoreFuture<'a, Option<CachedToken>>;

	/// Drops every entry, for any session, that is no longer valid at `now`.
	///
	/// Returns the number of entries removed.
	fn prune_expired<'a>(&'a self, now: OffsetDateTime) -> StoreFuture<'a, usize>;
}

/// Error type produced by [`SessionStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

#[cfg(test)]
mod tests {
	// std
	use std::error::Error as StdError;
	// self
	use super::*;
	use crate::error::Error;

	#[test]
	fn store_error_converts_into_broker_error_with_source() {
		let store_error = StoreError::Backend { message: "session directory unwritable".into() };
		let broker_error: Error = store_error.clone().into();

		assert!(matches!(broker_error, Error::Storage(_)));
		assert!(broker_error.to_string().contains("session directory unwritable"));

		let source = StdError::source(&broker_error)
			.expect("Broker error should expose the original store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}
}
