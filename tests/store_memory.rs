// self
use weila_client::{
	credentials::Credentials,
	store::{CredentialKey, CredentialStore, MemoryStore},
};

async fn seed(store: &MemoryStore) {
	store
		.set_many(vec![
			("token", "token-1".to_owned()),
			("refresh_token", "refresh-1".to_owned()),
			("login_time", "1700000000".to_owned()),
			("expires_in", "7200".to_owned()),
			("uuid", "instance-1".to_owned()),
		])
		.await
		.expect("Seeding the memory store should succeed.");
}

#[tokio::test]
async fn set_get_remove_round_trip() {
	let store = MemoryStore::default();

	assert_eq!(store.get("token").await.expect("Reading a missing key should succeed."), None);

	store.set("token", "token-1".into()).await.expect("Setting a key should succeed.");
	store.set("token", "token-2".into()).await.expect("Replacing a key should succeed.");

	assert_eq!(
		store.get("token").await.expect("Reading a present key should succeed."),
		Some("token-2".into())
	);

	store.remove("token").await.expect("Removing a key should succeed.");
	store.remove("token").await.expect("Removing a missing key should succeed.");

	assert!(store.is_empty());
}

#[tokio::test]
async fn credentials_load_from_stored_strings() {
	let store = MemoryStore::default();

	seed(&store).await;

	let creds = Credentials::load(&store).await.expect("Credentials should load.");

	assert!(creds.is_authenticated());
	assert_eq!(creds.access_token(), Some("token-1"));
	assert_eq!(creds.issued_at, Some(1_700_000_000));
	assert_eq!(creds.expires_in, Some(7_200));
	assert_eq!(creds.instance_id.as_deref(), Some("instance-1"));
}

#[tokio::test]
async fn zero_expiry_metadata_reads_as_absent() {
	let store = MemoryStore::default();

	seed(&store).await;
	store.set("login_time", "0".into()).await.expect("Overwriting login time should succeed.");

	let creds = Credentials::load(&store).await.expect("Credentials should load.");

	assert_eq!(creds.issued_at, None);
	assert!(!creds.is_authenticated(), "A token without login time is unauthenticated.");
	assert_eq!(creds.access_token(), None);
}

#[tokio::test]
async fn clones_share_state_and_batches_apply_together() {
	let store = MemoryStore::default();
	let clone = store.clone();

	seed(&store).await;

	let keys = CredentialKey::ALL.map(CredentialKey::as_str);

	clone.remove_many(&keys).await.expect("Batch removal should succeed.");

	assert!(store.is_empty());
	assert!(store.snapshot().is_empty());
}
