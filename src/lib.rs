//! Signed, self-refreshing HTTP client for the Weila envelope API, with singleflight token
//! refresh, pluggable credential stores and a one-shot replay when the server invalidates a token.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod client;
pub mod config;
pub mod credentials;
pub mod envelope;
pub mod error;
pub mod http;
pub mod obs;
pub mod refresh;
pub mod sign;
pub mod store;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		client::{Client, ClientBuilder},
		config::ClientConfig,
		http::ReqwestTransport,
		store::{CredentialStore, MemoryStore},
	};

	/// Client type alias used by reqwest-backed integration tests.
	pub type ReqwestTestClient = Client<ReqwestTransport>;

	/// Application identifier shared by test fixtures.
	pub const TEST_APP_ID: &str = "app-test";
	/// Application secret shared by test fixtures.
	pub const TEST_APP_KEY: &str = "secret";

	/// Builds a reqwest transport that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_transport() -> ReqwestTransport {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestTransport::with_client(client)
	}

	/// Returns a [`ClientBuilder`] pointed at `base_url`, backed by a fresh in-memory store that
	/// is also handed back for seeding and inspection.
	pub fn reqwest_test_builder(base_url: &str) -> (ClientBuilder, Arc<MemoryStore>) {
		let store_backend = Arc::new(MemoryStore::default());
		let store: Arc<dyn CredentialStore> = store_backend.clone();
		let config = ClientConfig::new(TEST_APP_ID, TEST_APP_KEY).with_base_url(
			Url::parse(base_url).expect("Mock server base URL should parse successfully."),
		);

		(ClientBuilder::from_config(config).store(store), store_backend)
	}

	/// Finalizes a builder from [`reqwest_test_builder`] with the test transport.
	pub fn build_reqwest_test_client(builder: ClientBuilder) -> ReqwestTestClient {
		builder
			.build_with_transport(test_reqwest_transport())
			.expect("Test client configuration should be valid.")
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use serde_json::Value;
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use {serde_json, url};
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
