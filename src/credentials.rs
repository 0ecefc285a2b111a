//! Credential model persisted in a [`CredentialStore`] and the staleness rule applied to it.

// self
use crate::{
	_prelude::*,
	store::{CredentialKey, CredentialStore, StoreError},
};

/// Snapshot of every persisted credential field.
///
/// The token only counts once its issue time is known; see
/// [`is_authenticated`](Credentials::is_authenticated).
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
	/// Access token.
	pub token: Option<String>,
	/// Refresh token handed back to the refresh callback's owner.
	pub refresh_token: Option<String>,
	/// Unix seconds at which the token was stored.
	pub issued_at: Option<i64>,
	/// Token lifetime in seconds.
	pub expires_in: Option<i64>,
	/// Client instance identifier.
	pub instance_id: Option<String>,
}
impl Credentials {
	/// Loads every field from `store`.
	pub async fn load(store: &dyn CredentialStore) -> Result<Self> {
		Ok(Self {
			token: read_string(store, CredentialKey::Token).await?,
			refresh_token: read_string(store, CredentialKey::RefreshToken).await?,
			issued_at: read_seconds(store, CredentialKey::LoginTime).await?,
			expires_in: read_seconds(store, CredentialKey::ExpiresIn).await?,
			instance_id: read_string(store, CredentialKey::InstanceId).await?,
		})
	}

	/// Returns `true` when both the token and its issue time are present.
	pub fn is_authenticated(&self) -> bool {
		self.token.is_some() && self.issued_at.is_some()
	}

	/// Returns the token to attach to requests, if authenticated.
	pub fn access_token(&self) -> Option<&str> {
		if self.is_authenticated() { self.token.as_deref() } else { None }
	}

	/// Decides whether the token should be renewed at `now` (unix seconds).
	///
	/// Tokens are refreshed around their half-life: the token is stale once
	/// `issued_at + expires_in / 2 - now <= threshold`. Without a token, or without expiry
	/// metadata, there is nothing to judge and the token counts as fresh.
	pub fn is_stale_at(&self, now: i64, threshold: Duration) -> bool {
		let (Some(_), Some(issued_at), Some(expires_in)) =
			(self.token.as_ref(), self.issued_at, self.expires_in)
		else {
			return false;
		};
		// Doubled to keep the half-life exact for odd lifetimes.
		let doubled_remaining =
			2 * i128::from(issued_at) + i128::from(expires_in) - 2 * i128::from(now);

		doubled_remaining <= 2 * i128::from(threshold.whole_seconds())
	}
}
impl Debug for Credentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credentials")
			.field("token_set", &self.token.is_some())
			.field("refresh_token_set", &self.refresh_token.is_some())
			.field("issued_at", &self.issued_at)
			.field("expires_in", &self.expires_in)
			.field("instance_id", &self.instance_id)
			.finish()
	}
}

/// Credentials returned by a refresh callback or supplied after an out-of-band login.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshedToken {
	/// New access token.
	pub token: String,
	/// New refresh token.
	pub refresh_token: String,
	/// Token lifetime in seconds; when omitted the stored lifetime is left untouched.
	#[serde(default)]
	pub expires_in: Option<i64>,
}
impl RefreshedToken {
	/// Creates a token pair without lifetime information.
	pub fn new(token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
		Self { token: token.into(), refresh_token: refresh_token.into(), expires_in: None }
	}

	/// Sets the token lifetime in seconds.
	pub fn with_expires_in(mut self, seconds: i64) -> Self {
		self.expires_in = Some(seconds);

		self
	}
}
impl Debug for RefreshedToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshedToken")
			.field("token", &"<redacted>")
			.field("refresh_token", &"<redacted>")
			.field("expires_in", &self.expires_in)
			.finish()
	}
}

/// Current time as unix seconds.
pub fn unix_now() -> i64 {
	OffsetDateTime::now_utc().unix_timestamp()
}

/// Persists `refreshed` as issued at `issued_at` in one batch.
pub(crate) async fn persist(
	store: &dyn CredentialStore,
	refreshed: RefreshedToken,
	issued_at: i64,
) -> Result<()> {
	let mut entries = vec![
		(CredentialKey::Token.as_str(), refreshed.token),
		(CredentialKey::RefreshToken.as_str(), refreshed.refresh_token),
		(CredentialKey::LoginTime.as_str(), issued_at.to_string()),
	];

	if let Some(expires_in) = refreshed.expires_in.filter(|seconds| *seconds > 0) {
		entries.push((CredentialKey::ExpiresIn.as_str(), expires_in.to_string()));
	}

	store.set_many(entries).await?;

	Ok(())
}

/// Removes every credential key, the instance identifier included.
pub(crate) async fn clear(store: &dyn CredentialStore) -> Result<()> {
	let keys = CredentialKey::ALL.map(CredentialKey::as_str);

	store.remove_many(&keys).await?;

	Ok(())
}

pub(crate) async fn read_string(
	store: &dyn CredentialStore,
	key: CredentialKey,
) -> Result<Option<String>, StoreError> {
	Ok(store.get(key.as_str()).await?.filter(|value| !value.is_empty()))
}

/// Reads a positive number of seconds; zero carries no information and reads as absent.
pub(crate) async fn read_seconds(
	store: &dyn CredentialStore,
	key: CredentialKey,
) -> Result<Option<i64>, StoreError> {
	let Some(raw) = read_string(store, key).await? else {
		return Ok(None);
	};
	let seconds = raw.trim().parse::<i64>().map_err(|e| StoreError::Serialization {
		message: format!("Stored `{key}` value `{raw}` is not a number: {e}"),
	})?;

	Ok(Some(seconds).filter(|value| *value > 0))
}
