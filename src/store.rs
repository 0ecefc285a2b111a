//! Storage contracts and built-in credential store implementations.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::_prelude::*;

/// Boxed future returned by [`CredentialStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Async key-value capability persisting the client's credentials.
///
/// Keys are the stable strings listed by [`CredentialKey`]; values are plain strings, with
/// numbers written in decimal. Any backend that can get, set, and remove strings satisfies
/// the contract.
pub trait CredentialStore
where
	Self: Send + Sync,
{
	/// Reads the value stored under `key`, if present.
	fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>>;

	/// Stores or replaces the value under `key`.
	fn set<'a>(&'a self, key: &'a str, value: String) -> StoreFuture<'a, ()>;

	/// Removes the value under `key`; removing a missing key succeeds.
	fn remove<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()>;

	/// Writes several entries as one logical update.
	///
	/// The default applies [`set`](CredentialStore::set) sequentially; backends that can
	/// write a batch in one step should override it.
	fn set_many<'a>(&'a self, entries: Vec<(&'a str, String)>) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			for (key, value) in entries {
				self.set(key, value).await?;
			}

			Ok(())
		})
	}

	/// Removes several keys as one logical update.
	fn remove_many<'a>(&'a self, keys: &'a [&'a str]) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			for key in keys {
				self.remove(*key).await?;
			}

			Ok(())
		})
	}
}

/// Error type produced by [`CredentialStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures (e.g., serde) surfaced by the backend, or a stored value that
	/// cannot be parsed.
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

/// Stable keys under which credentials are persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CredentialKey {
	/// Access token.
	Token,
	/// Refresh token.
	RefreshToken,
	/// Token lifetime in seconds.
	ExpiresIn,
	/// Unix seconds at which the token was issued.
	LoginTime,
	/// Client instance identifier.
	InstanceId,
}
impl CredentialKey {
	/// Every key, in the order they are cleared.
	pub const ALL: [Self; 5] =
		[Self::Token, Self::RefreshToken, Self::ExpiresIn, Self::LoginTime, Self::InstanceId];

	/// Returns the stable storage key.
	pub const fn as_str(self) -> &'static str {
		match self {
			CredentialKey::Token => "token",
			CredentialKey::RefreshToken => "refresh_token",
			CredentialKey::ExpiresIn => "expires_in",
			CredentialKey::LoginTime => "login_time",
			CredentialKey::InstanceId => "uuid",
		}
	}
}
impl Display for CredentialKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[derive(Default)]
	struct CountingStore {
		inner: MemoryStore,
		writes: Mutex<Vec<String>>,
	}
	impl CredentialStore for CountingStore {
		fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
			self.inner.get(key)
		}

		fn set<'a>(&'a self, key: &'a str, value: String) -> StoreFuture<'a, ()> {
			self.writes.lock().push(format!("set:{key}"));

			self.inner.set(key, value)
		}

		fn remove<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
			self.writes.lock().push(format!("remove:{key}"));

			self.inner.remove(key)
		}
	}

	#[test]
	fn keys_are_stable() {
		let keys: Vec<_> = CredentialKey::ALL.iter().map(|key| key.as_str()).collect();

		assert_eq!(keys, ["token", "refresh_token", "expires_in", "login_time", "uuid"]);
		assert_eq!(CredentialKey::InstanceId.to_string(), "uuid");
	}

	#[tokio::test]
	async fn default_batch_operations_fall_back_to_single_writes() {
		let store = CountingStore::default();

		store
			.set_many(vec![("token", "t".into()), ("login_time", "1".into())])
			.await
			.expect("Default set_many should succeed.");

		assert_eq!(store.get("token").await.expect("Read should succeed."), Some("t".into()));

		store.remove_many(&["token", "login_time"]).await.expect("Default remove_many should succeed.");

		assert_eq!(store.get("login_time").await.expect("Read should succeed."), None);
		assert_eq!(
			*store.writes.lock(),
			["set:token", "set:login_time", "remove:token", "remove:login_time"]
		);
	}
}
