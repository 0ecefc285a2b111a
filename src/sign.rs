//! Per-request signed query fragment (`appid`, `et`, `sign`, `uuid`, `token`).

// crates.io
use md5::{Digest, Md5};
use rand::{Rng, distr::Alphanumeric};
// self
use crate::{
	_prelude::*,
	credentials::{self, Credentials},
	store::{CredentialKey, CredentialStore},
};

/// Offset of the signature slice within the hex digest.
pub const SIGNATURE_OFFSET: usize = 12;
/// Width of the signature slice.
pub const SIGNATURE_LEN: usize = 8;

const INSTANCE_ID_LEN: usize = 21;

/// Computes the request signature for `timestamp` (unix seconds) and the application secret.
///
/// The signature is the 8 hex characters at offset 12 of `md5("{timestamp}{secret}")`.
pub fn signature(timestamp: i64, secret: &str) -> String {
	let digest = Md5::digest(format!("{timestamp}{secret}").as_bytes());
	let hex = digest.iter().map(|byte| format!("{byte:02x}")).collect::<String>();

	hex[SIGNATURE_OFFSET..SIGNATURE_OFFSET + SIGNATURE_LEN].to_owned()
}

/// Query fragment attached to every outgoing request; never persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct SignedQuery {
	/// Application identifier (`appid`).
	pub app_id: String,
	/// Unix seconds the signature was computed for (`et`).
	pub timestamp: i64,
	/// Signature (`sign`).
	pub sign: String,
	/// Client instance identifier (`uuid`).
	pub instance_id: String,
	/// Current access token (`token`), when authenticated.
	pub token: Option<String>,
}
impl SignedQuery {
	/// Returns the fragment as wire-level query pairs.
	pub fn pairs(&self) -> Vec<(&'static str, String)> {
		let mut pairs = vec![
			("appid", self.app_id.clone()),
			("et", self.timestamp.to_string()),
			("sign", self.sign.clone()),
			("uuid", self.instance_id.clone()),
		];

		if let Some(token) = &self.token {
			pairs.push(("token", token.clone()));
		}

		pairs
	}

	/// Merges the fragment into `query`, overwriting colliding keys.
	pub fn merge_into(&self, query: &mut BTreeMap<String, String>) {
		for (key, value) in self.pairs() {
			query.insert(key.to_owned(), value);
		}
	}
}
impl Debug for SignedQuery {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SignedQuery")
			.field("app_id", &self.app_id)
			.field("timestamp", &self.timestamp)
			.field("sign", &self.sign)
			.field("instance_id", &self.instance_id)
			.field("token_set", &self.token.is_some())
			.finish()
	}
}

/// Produces [`SignedQuery`] values for one application.
#[derive(Clone)]
pub struct RequestSigner {
	app_id: String,
	app_key: String,
}
impl RequestSigner {
	/// Creates a signer for the application identity + secret pair.
	pub fn new(app_id: impl Into<String>, app_key: impl Into<String>) -> Self {
		Self { app_id: app_id.into(), app_key: app_key.into() }
	}

	/// Returns the application identifier.
	pub fn app_id(&self) -> &str {
		&self.app_id
	}

	/// Signs for the current time.
	pub async fn sign(&self, store: &dyn CredentialStore) -> Result<SignedQuery> {
		self.sign_at(store, credentials::unix_now()).await
	}

	/// Signs for `timestamp`, creating the client instance identifier on first use.
	pub async fn sign_at(&self, store: &dyn CredentialStore, timestamp: i64) -> Result<SignedQuery> {
		let instance_id = resolve_instance_id(store).await?;
		let token = Credentials::load(store).await?.access_token().map(str::to_owned);

		Ok(SignedQuery {
			app_id: self.app_id.clone(),
			timestamp,
			sign: signature(timestamp, &self.app_key),
			instance_id,
			token,
		})
	}
}
impl Debug for RequestSigner {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RequestSigner")
			.field("app_id", &self.app_id)
			.field("app_key", &"<redacted>")
			.finish()
	}
}

async fn resolve_instance_id(store: &dyn CredentialStore) -> Result<String> {
	if let Some(existing) = credentials::read_string(store, CredentialKey::InstanceId).await? {
		return Ok(existing);
	}

	let generated = random_instance_id();

	store.set(CredentialKey::InstanceId.as_str(), generated.clone()).await?;

	Ok(generated)
}

fn random_instance_id() -> String {
	rand::rng().sample_iter(Alphanumeric).take(INSTANCE_ID_LEN).map(char::from).collect()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::store::MemoryStore;

	#[test]
	fn signature_matches_known_digest_slice() {
		// md5("1700000000secret") = 4639dc588670101013c09d854e44d8c6
		assert_eq!(signature(1_700_000_000, "secret"), "101013c0");
		assert_eq!(signature(1_700_000_000, "secret").len(), SIGNATURE_LEN);
	}

	#[test]
	fn signature_depends_on_timestamp_and_secret() {
		assert_ne!(signature(1_700_000_000, "secret"), signature(1_700_000_001, "secret"));
		assert_ne!(signature(1_700_000_000, "secret"), signature(1_700_000_000, "other"));
	}

	#[tokio::test]
	async fn instance_id_is_created_once() {
		let store = MemoryStore::default();
		let signer = RequestSigner::new("app", "secret");
		let first = signer.sign_at(&store, 1).await.expect("First signature should succeed.");
		let second = signer.sign_at(&store, 2).await.expect("Second signature should succeed.");

		assert_eq!(first.instance_id.len(), INSTANCE_ID_LEN);
		assert_eq!(first.instance_id, second.instance_id);
		assert_eq!(
			store.get("uuid").await.expect("Reading the instance id should succeed."),
			Some(first.instance_id.clone())
		);
	}

	#[tokio::test]
	async fn token_is_attached_only_when_authenticated() {
		let store = MemoryStore::default();
		let signer = RequestSigner::new("app", "secret");

		store.set("token", "lonely-token".into()).await.expect("Seeding token should succeed.");

		let unauthenticated =
			signer.sign_at(&store, 1_700_000_000).await.expect("Signing should succeed.");

		assert_eq!(unauthenticated.token, None);
		assert!(unauthenticated.pairs().iter().all(|(key, _)| *key != "token"));

		store.set("login_time", "1700000000".into()).await.expect("Seeding login time should succeed.");

		let authenticated =
			signer.sign_at(&store, 1_700_000_000).await.expect("Signing should succeed.");

		assert_eq!(authenticated.token.as_deref(), Some("lonely-token"));
		assert_eq!(authenticated.sign, "101013c0");
	}

	#[tokio::test]
	async fn merge_overrides_colliding_caller_keys() {
		let store = MemoryStore::default();
		let signed = RequestSigner::new("app", "secret")
			.sign_at(&store, 1_700_000_000)
			.await
			.expect("Signing should succeed.");
		let mut query = BTreeMap::from([
			("appid".to_owned(), "spoofed".to_owned()),
			("page".to_owned(), "2".to_owned()),
		]);

		signed.merge_into(&mut query);

		assert_eq!(query.get("appid").map(String::as_str), Some("app"));
		assert_eq!(query.get("page").map(String::as_str), Some("2"));
		assert_eq!(query.get("et").map(String::as_str), Some("1700000000"));
		assert_eq!(query.get("sign").map(String::as_str), Some("101013c0"));
		assert!(!query.contains_key("token"));
	}

	#[test]
	fn debug_redacts_secrets() {
		let signer = RequestSigner::new("app", "very-secret");

		assert!(!format!("{signer:?}").contains("very-secret"));
	}
}
