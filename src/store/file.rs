//! File-backed [`SessionStore`] so cached tokens survive process restarts.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	auth::{CachedToken, SessionId},
	store::{SessionStore, StoreError, StoreFuture},
};

type SessionMap = HashMap<SessionId, CachedToken>;

/// Persists session entries to a JSON file after each mutation.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<SessionMap>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let snapshot = if path.exists() { Self::load_snapshot(&path)? } else { HashMap::new() };

		Ok(Self { path, inner: Arc::new(RwLock::new(snapshot)) })
	}

	/// Location of the JSON snapshot.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load_snapshot(path: &Path) -> Result<SessionMap, StoreError> {
		let metadata = path.metadata().map_err(|e| StoreError::Backend {
			message: format!("Failed to inspect {}: {e}", path.display()),
		})?;

		if metadata.len() == 0 {
			return Ok(HashMap::new());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;
		let entries: Vec<(SessionId, CachedToken)> =
			serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
				message: format!("Failed to parse {}: {e}", path.display()),
			})?;

		Ok(entries.into_iter().collect())
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create session directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	// Writes a temp file and renames it over the snapshot so readers never see partial JSON.
	fn persist_locked(&self, contents: &SessionMap) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let snapshot: Vec<_> = contents.iter().collect();
		let serialized =
			serde_json::to_vec_pretty(&snapshot).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize session snapshot: {e}"),
			})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}
}
impl SessionStore for FileStore {
	fn load<'a>(&'a self, session: &'a SessionId) -> StoreFuture<'a, Option<CachedToken>> {
		Box::pin(async move { Ok(self.inner.read().get(session).cloned()) })
	}

	fn save<'a>(&'a self, session: &'a SessionId, token: CachedToken) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			let mut guard = self.inner.write();
			let mut next = guard.clone();

			next.insert(session.to_owned(), token);
			self.persist_locked(&next)?;
			*guard = next;

			Ok(())
		})
	}

	fn remove<'a>(&'a self, session: &'a SessionId) -> StoreFuture<'a, Option<CachedToken>> {
		Box::pin(async move {
			let mut guard = self.inner.write();

			if !guard.contains_key(session) {
				return Ok(None);
			}

			let mut next = guard.clone();
			let removed = next.remove(session);

			self.persist_locked(&next)?;
			*guard = next;

			Ok(removed)
		})
	}

	fn prune_expired<'a>(&'a self, now: OffsetDateTime) -> StoreFuture<'a, usize> {
		Box::pin(async move {
			let mut guard = self.inner.write();
			let mut next = guard.clone();

			next.retain(|_, token| token.is_valid_at(now));

			let pruned = guard.len() - next.len();

			if pruned > 0 {
				self.persist_locked(&next)?;
				*guard = next;
			}

			Ok(pruned)
		})
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{env, process};
	// crates.io
	use time::macros;
	use tokio::runtime::Runtime;
	// self
	use super::*;

	fn temp_path(label: &str) -> PathBuf {
		let unique = format!(
			"dwarna_broker_file_store_{label}_{}_{}.json",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		);

		env::temp_dir().join(unique)
	}

	#[test]
	fn save_and_reload_round_trip() {
		let path = temp_path("reload");
		let store = FileStore::open(&path).expect("Failed to open file store snapshot.");
		let session = SessionId::new("sess-file").expect("Failed to build session fixture.");
		let token = CachedToken::new("file-token", macros::datetime!(2025-01-01 01:00 UTC));
		let rt = Runtime::new().expect("Failed to build Tokio runtime for file store test.");

		rt.block_on(store.save(&session, token.clone()))
			.expect("Failed to save fixture token to file store.");
		drop(store);

		let reopened = FileStore::open(&path).expect("Failed to reopen file store snapshot.");
		let fetched = rt
			.block_on(reopened.load(&session))
			.expect("Failed to load fixture token from file store.")
			.expect("File store lost the token after reopen.");

		assert_eq!(fetched, token);

		rt.block_on(reopened.remove(&session)).expect("Failed to remove fixture token.");

		let emptied = FileStore::open(&path).expect("Failed to reopen emptied snapshot.");

		assert!(rt.block_on(emptied.load(&session)).expect("Load should succeed.").is_none());

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store snapshot {}: {e}", path.display())
		});
	}

	#[test]
	fn corrupt_snapshot_reports_serialization_error() {
		let path = temp_path("corrupt");

		fs::write(&path, b"{not json").expect("Failed to write corrupt snapshot fixture.");

		let err = FileStore::open(&path).expect_err("Corrupt snapshots must be rejected.");

		assert!(matches!(err, StoreError::Serialization { .. }));

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary corrupt snapshot {}: {e}", path.display())
		});
	}

	#[test]
	fn pruning_persists_only_live_entries() {
		let path = temp_path("prune");
		let store = FileStore::open(&path).expect("Failed to open file store snapshot.");
		let stale = SessionId::new("sess-stale").expect("Failed to build session fixture.");
		let live = SessionId::new("sess-live").expect("Failed to build session fixture.");
		let rt = Runtime::new().expect("Failed to build Tokio runtime for file store test.");

		rt.block_on(
			store.save(&stale, CachedToken::new("stale", macros::datetime!(2025-01-01 11:00 UTC))),
		)
		.expect("Failed to save stale fixture token.");
		rt.block_on(
			store.save(&live, CachedToken::new("live", macros::datetime!(2025-01-01 13:00 UTC))),
		)
		.expect("Failed to save live fixture token.");

		let pruned = rt
			.block_on(store.prune_expired(macros::datetime!(2025-01-01 12:00 UTC)))
			.expect("Failed to prune expired tokens.");

		assert_eq!(pruned, 1);

		let reopened = FileStore::open(&path).expect("Failed to reopen pruned snapshot.");

		assert!(rt.block_on(reopened.load(&stale)).expect("Load should succeed.").is_none());
		assert!(rt.block_on(reopened.load(&live)).expect("Load should succeed.").is_some());

		fs::remove_file(&path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary pruned snapshot {}: {e}", path.display())
		});
	}

	#[test]
	fn failed_persist_leaves_entries_untouched() {
		let path = temp_path("unwritable");
		let store = FileStore::open(&path).expect("Failed to open file store snapshot.");
		let kept = SessionId::new("sess-kept").expect("Failed to build session fixture.");
		let rejected = SessionId::new("sess-rejected").expect("Failed to build session fixture.");
		let token = CachedToken::new("kept-token", macros::datetime!(2025-01-01 01:00 UTC));
		let rt = Runtime::new().expect("Failed to build Tokio runtime for file store test.");

		rt.block_on(store.save(&kept, token.clone())).expect("Failed to save fixture token.");
		fs::remove_file(&path).expect("Failed to remove snapshot before blocking it.");
		// A non-empty directory at the snapshot path makes the rename fail.
		fs::create_dir_all(path.join("blocker")).expect("Failed to block the snapshot path.");

		let rejected_token =
			CachedToken::new("rejected-token", macros::datetime!(2025-01-01 01:00 UTC));
		let save_err = rt
			.block_on(store.save(&rejected, rejected_token))
			.expect_err("Saving over a directory must fail.");
		let remove_err =
			rt.block_on(store.remove(&kept)).expect_err("Removing over a directory must fail.");

		assert!(matches!(save_err, StoreError::Backend { .. }));
		assert!(matches!(remove_err, StoreError::Backend { .. }));
		assert!(rt.block_on(store.load(&rejected)).expect("Load should succeed.").is_none());
		assert_eq!(rt.block_on(store.load(&kept)).expect("Load should succeed."), Some(token));

		fs::remove_dir_all(&path).unwrap_or_else(|e| {
			panic!("Failed to remove blocking directory {}: {e}", path.display())
		});

		let mut tmp_path = path.clone();

		tmp_path.set_extension("tmp");

		let _ = fs::remove_file(&tmp_path);
	}
}
