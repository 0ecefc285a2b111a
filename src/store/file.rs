//! Simple file-backed [`CredentialStore`] so credentials survive process restarts.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	store::{CredentialStore, StoreError, StoreFuture},
};

type Snapshot = BTreeMap<String, String>;

/// Persists credentials to a JSON object after each mutation.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<Snapshot>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let snapshot = Self::load_snapshot(&path)?;

		Ok(Self { path, inner: Arc::new(RwLock::new(snapshot)) })
	}

	/// Returns the snapshot path.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn load_snapshot(path: &Path) -> Result<Snapshot, StoreError> {
		if !path.exists() {
			return Ok(Snapshot::new());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		if bytes.is_empty() {
			return Ok(Snapshot::new());
		}

		serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
			message: format!("Failed to parse {}: {e}", path.display()),
		})
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn persist_locked(&self, contents: &Snapshot) -> Result<(), StoreError> {
		Self::ensure_parent_exists(&self.path)?;

		let serialized =
			serde_json::to_vec_pretty(contents).map_err(|e| StoreError::Serialization {
				message: format!("Failed to serialize store snapshot: {e}"),
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

	fn mutate<F>(&self, apply: F) -> Result<(), StoreError>
	where
		F: FnOnce(&mut Snapshot) -> bool,
	{
		let mut guard = self.inner.write();
		let mut next = guard.clone();

		if apply(&mut next) {
			self.persist_locked(&next)?;

			*guard = next;
		}

		Ok(())
	}
}
impl CredentialStore for FileStore {
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
		Box::pin(async move { Ok(self.inner.read().get(key).cloned()) })
	}

	fn set<'a>(&'a self, key: &'a str, value: String) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			self.mutate(|map| {
				map.insert(key.to_owned(), value);

				true
			})
		})
	}

	fn remove<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
		Box::pin(async move { self.mutate(|map| map.remove(key).is_some()) })
	}

	fn set_many<'a>(&'a self, entries: Vec<(&'a str, String)>) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			self.mutate(|map| {
				let changed = !entries.is_empty();

				for (key, value) in entries {
					map.insert(key.to_owned(), value);
				}

				changed
			})
		})
	}

	fn remove_many<'a>(&'a self, keys: &'a [&'a str]) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			self.mutate(|map| {
				keys.iter().fold(false, |changed, key| map.remove(*key).is_some() || changed)
			})
		})
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{env, process};
	// crates.io
	use tokio::runtime::Runtime;
	// self
	use super::*;

	fn temp_path(tag: &str) -> PathBuf {
		let unique = format!(
			"weila_client_file_store_{tag}_{}_{}.json",
			process::id(),
			OffsetDateTime::now_utc().unix_timestamp_nanos(),
		);

		env::temp_dir().join(unique)
	}

	fn cleanup(path: &Path) {
		fs::remove_file(path).unwrap_or_else(|e| {
			panic!("Failed to remove temporary file store snapshot {}: {e}", path.display())
		});
	}

	#[test]
	fn set_and_reload_round_trip() {
		let path = temp_path("reload");
		let store = FileStore::open(&path).expect("Failed to open file store snapshot.");
		let rt = Runtime::new().expect("Failed to build Tokio runtime for file store test.");

		rt.block_on(store.set_many(vec![
			("token", "access-token".into()),
			("login_time", "1700000000".into()),
		]))
		.expect("Failed to save fixture entries to file store.");
		drop(store);

		let reopened = FileStore::open(&path).expect("Failed to reopen file store snapshot.");
		let token = rt
			.block_on(reopened.get("token"))
			.expect("Failed to read fixture entry from file store.");

		assert_eq!(token.as_deref(), Some("access-token"));
		assert_eq!(
			rt.block_on(reopened.get("login_time")).expect("Failed to read login time."),
			Some("1700000000".into())
		);

		cleanup(&path);
	}

	#[test]
	fn removals_are_persisted() {
		let path = temp_path("remove");
		let store = FileStore::open(&path).expect("Failed to open file store snapshot.");
		let rt = Runtime::new().expect("Failed to build Tokio runtime for file store test.");

		rt.block_on(store.set("token", "doomed".into())).expect("Failed to save token.");
		rt.block_on(store.set("uuid", "instance".into())).expect("Failed to save instance id.");
		rt.block_on(store.remove_many(&["token", "missing"])).expect("Failed to remove keys.");

		let reopened = FileStore::open(store.path()).expect("Failed to reopen file store snapshot.");

		assert_eq!(rt.block_on(reopened.get("token")).expect("Failed to read token."), None);
		assert_eq!(
			rt.block_on(reopened.get("uuid")).expect("Failed to read instance id."),
			Some("instance".into())
		);

		cleanup(&path);
	}

	#[test]
	fn failed_write_leaves_memory_untouched() {
		let path = temp_path("failed_write");
		let store = FileStore::open(&path).expect("Failed to open file store snapshot.");
		let rt = Runtime::new().expect("Failed to build Tokio runtime for file store test.");

		rt.block_on(store.set("uuid", "instance".into())).expect("Failed to save instance id.");
		fs::remove_file(&path).expect("Failed to remove snapshot before blocking it.");
		// A directory at the snapshot path makes the final rename fail.
		fs::create_dir(&path).expect("Failed to create blocking directory.");

		let err = rt
			.block_on(store.set("token", "unsaved".into()))
			.expect_err("Writing over a directory should fail.");

		assert!(matches!(err, StoreError::Backend { .. }));
		assert_eq!(rt.block_on(store.get("token")).expect("Failed to read token."), None);
		assert_eq!(
			rt.block_on(store.get("uuid")).expect("Failed to read instance id."),
			Some("instance".into())
		);

		let mut tmp_path = path.clone();

		tmp_path.set_extension("tmp");

		let _ = fs::remove_file(&tmp_path);

		fs::remove_dir(&path).expect("Failed to remove blocking directory.");
	}

	#[test]
	fn corrupt_snapshot_is_reported() {
		let path = temp_path("corrupt");

		fs::write(&path, b"not json").expect("Failed to write corrupt snapshot.");

		let err = FileStore::open(&path).expect_err("Corrupt snapshots should fail to load.");

		assert!(matches!(err, StoreError::Serialization { .. }));

		cleanup(&path);
	}
}
