//! Signed, self-refreshing API client.
//!
//! [`Client`] wires the credential store, the [`RequestSigner`] and the
//! [`RefreshCoordinator`] around an [`ApiTransport`]. Every call passes through the request
//! interceptor (refresh when stale, then sign) and the response interceptor (unwrap the
//! envelope, or refresh and replay once when the server reports an invalid token).

mod request;
mod response;

// crates.io
use serde::de::DeserializeOwned;
// self
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;
use crate::{
	_prelude::*,
	config::ClientConfig,
	credentials::{self, Credentials, RefreshedToken},
	error::DecodeError,
	http::{ApiRequest, ApiTransport},
	obs::{self, OpKind},
	refresh::{
		LogoutCallback, LogoutFuture, RefreshCallback, RefreshCoordinator, RefreshFuture,
		RefreshMetrics,
	},
	sign::RequestSigner,
	store::{CredentialStore, MemoryStore},
};

#[cfg(feature = "reqwest")]
/// Client specialized for the crate's default reqwest transport.
pub type ReqwestApiClient = Client<ReqwestTransport>;

/// Consuming builder for [`Client`].
///
/// Plain options come from a [`ClientConfig`]; the store, the callbacks and the transport are
/// attached here. Without an explicit store the client keeps credentials in a fresh
/// [`MemoryStore`].
pub struct ClientBuilder {
	config: ClientConfig,
	store: Option<Arc<dyn CredentialStore>>,
	on_refresh: Option<RefreshCallback>,
	on_logout: Option<LogoutCallback>,
}
impl ClientBuilder {
	/// Starts a builder for the application identity + secret pair.
	pub fn new(app_id: impl Into<String>, app_key: impl Into<String>) -> Self {
		Self::from_config(ClientConfig::new(app_id, app_key))
	}

	/// Starts a builder from a deserialized configuration.
	pub fn from_config(config: ClientConfig) -> Self {
		Self { config, store: None, on_refresh: None, on_logout: None }
	}

	/// Sets the API root that request paths are resolved against.
	pub fn base_url(mut self, base_url: Url) -> Self {
		self.config.base_url = Some(base_url);

		self
	}

	/// Overrides the staleness margin (defaults to five minutes).
	pub fn refresh_threshold(mut self, threshold: Duration) -> Self {
		self.config = self.config.with_refresh_threshold(threshold);

		self
	}

	/// Uses `store` for credential persistence.
	pub fn store(mut self, store: Arc<dyn CredentialStore>) -> Self {
		self.store = Some(store);

		self
	}

	/// Registers the async callback that obtains new credentials.
	///
	/// The callback runs at most once per refresh no matter how many requests are waiting on
	/// it. Returning an error clears the stored credentials and triggers the logout callback.
	pub fn on_refresh_token<F, Fut>(mut self, callback: F) -> Self
	where
		F: 'static + Send + Sync + Fn() -> Fut,
		Fut: 'static + Send + Future<Output = Result<RefreshedToken>>,
	{
		self.on_refresh = Some(Arc::new(move || -> RefreshFuture { Box::pin(callback()) }));

		self
	}

	/// Registers the async callback invoked after credentials are cleared.
	pub fn on_logout<F, Fut>(mut self, callback: F) -> Self
	where
		F: 'static + Send + Sync + Fn() -> Fut,
		Fut: 'static + Send + Future<Output = ()>,
	{
		self.on_logout = Some(Arc::new(move || -> LogoutFuture { Box::pin(callback()) }));

		self
	}

	/// Validates the configuration and builds a client over `transport`.
	pub fn build_with_transport<T>(self, transport: T) -> Result<Client<T>>
	where
		T: ApiTransport,
	{
		self.build_with_shared_transport(Arc::new(transport))
	}

	/// Same as [`ClientBuilder::build_with_transport`] for a transport that is already shared.
	pub fn build_with_shared_transport<T>(self, transport: Arc<T>) -> Result<Client<T>>
	where
		T: ?Sized + ApiTransport,
	{
		self.config.validate()?;

		let store = self.store.unwrap_or_else(|| Arc::new(MemoryStore::default()));
		let refresh = RefreshCoordinator::new(store.clone())
			.with_refresh_callback(self.on_refresh)
			.with_logout_callback(self.on_logout)
			.with_threshold(self.config.refresh_threshold());
		let signer = RequestSigner::new(self.config.app_id.clone(), self.config.app_key.clone());

		Ok(Client {
			transport,
			config: Arc::new(self.config),
			signer,
			store,
			refresh: Arc::new(refresh),
		})
	}

	/// Validates the configuration and builds a client over a default reqwest transport.
	#[cfg(feature = "reqwest")]
	pub fn build(self) -> Result<ReqwestApiClient> {
		self.build_with_transport(ReqwestTransport::default())
	}
}
impl Debug for ClientBuilder {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientBuilder")
			.field("config", &self.config)
			.field("store_set", &self.store.is_some())
			.field("refresh_callback_set", &self.on_refresh.is_some())
			.field("logout_callback_set", &self.on_logout.is_some())
			.finish()
	}
}

/// Authenticated client for the envelope API.
///
/// Cloning is cheap and clones share the store, the transport and, importantly, the refresh
/// coordinator, so concurrent calls from any clone still trigger a single refresh.
pub struct Client<T>
where
	T: ?Sized + ApiTransport,
{
	transport: Arc<T>,
	config: Arc<ClientConfig>,
	signer: RequestSigner,
	store: Arc<dyn CredentialStore>,
	refresh: Arc<RefreshCoordinator>,
}
impl<T> Client<T>
where
	T: ?Sized + ApiTransport,
{
	/// Returns the validated configuration.
	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	/// Returns the transport.
	pub fn transport(&self) -> &Arc<T> {
		&self.transport
	}

	/// Returns the credential store.
	pub fn store(&self) -> &Arc<dyn CredentialStore> {
		&self.store
	}

	/// Returns the refresh counters shared by every clone of this client.
	pub fn refresh_metrics(&self) -> &Arc<RefreshMetrics> {
		self.refresh.metrics()
	}

	/// Issues `request` and returns the unwrapped payload.
	///
	/// Successful envelopes yield their (possibly single-key-unwrapped) `data`; bodies that are
	/// not envelopes are returned as decoded JSON, or as a string when they are not JSON.
	pub async fn call(&self, request: ApiRequest) -> Result<Value> {
		obs::observe(OpKind::Request, "call", async {
			let outbound = self.prepare(&request).await?;
			let response = self.transport.execute(&outbound).await?;

			self.settle(&request, response).await
		})
		.await
	}

	/// Issues `request` and deserializes the payload into `D`.
	pub async fn call_as<D>(&self, request: ApiRequest) -> Result<D>
	where
		D: DeserializeOwned,
	{
		let payload = self.call(request).await?;

		serde_path_to_error::deserialize(payload).map_err(|e| DecodeError::from(e).into())
	}

	/// Issues a `GET` for `path`.
	pub async fn get(&self, path: impl Into<String>) -> Result<Value> {
		self.call(ApiRequest::get(path)).await
	}

	/// Issues a `POST` for `path` with a JSON body.
	pub async fn post(&self, path: impl Into<String>, body: Value) -> Result<Value> {
		self.call(ApiRequest::post(path).json(body)).await
	}

	/// Reports whether the stored token is due for renewal.
	pub async fn is_stale(&self) -> Result<bool> {
		self.refresh.is_stale().await
	}

	/// Refreshes the token now, joining a refresh that is already running.
	pub async fn ensure_fresh(&self) -> Result<()> {
		self.refresh.ensure_fresh().await
	}

	/// Loads the stored credentials.
	pub async fn credentials(&self) -> Result<Credentials> {
		Credentials::load(self.store.as_ref()).await
	}

	/// Persists credentials obtained outside the client, such as after an interactive login.
	///
	/// The login time is recorded as now.
	pub async fn save_credentials(&self, token: RefreshedToken) -> Result<()> {
		credentials::persist(self.store.as_ref(), token, credentials::unix_now()).await
	}

	/// Clears every stored credential and invokes the logout callback.
	pub async fn sign_out(&self) {
		self.refresh.sign_out().await;
	}
}
impl<T> Clone for Client<T>
where
	T: ?Sized + ApiTransport,
{
	fn clone(&self) -> Self {
		Self {
			transport: self.transport.clone(),
			config: self.config.clone(),
			signer: self.signer.clone(),
			store: self.store.clone(),
			refresh: self.refresh.clone(),
		}
	}
}
impl<T> Debug for Client<T>
where
	T: ?Sized + ApiTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Client")
			.field("config", &self.config)
			.field("refresh", &self.refresh)
			.finish()
	}
}
#[cfg(feature = "reqwest")]
impl Client<ReqwestTransport> {
	/// Creates a client with default options over a reqwest transport.
	pub fn new(app_id: impl Into<String>, app_key: impl Into<String>, base_url: Url) -> Result<Self> {
		ClientBuilder::new(app_id, app_key).base_url(base_url).build()
	}
}
