//! Transport primitives for API calls.
//!
//! The client resolves and signs every request itself, then hands the transport a fully
//! formed [`OutboundRequest`]. [`ApiTransport`] is the client's only dependency on an HTTP
//! stack: [`ReqwestTransport`] is the default, and tests or embedders can plug in their own
//! implementation to script responses.

// crates.io
#[cfg(feature = "reqwest")] use reqwest::header::{CONTENT_TYPE, HeaderValue};
// self
use crate::{_prelude::*, error::TransportError};

pub use http::Method;

/// Boxed future returned by [`ApiTransport::execute`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<RawResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP transports able to execute signed API requests.
///
/// Implementations must be `Send + Sync + 'static` so a client (and the transport behind
/// its `Arc`) can be shared across tasks.
pub trait ApiTransport
where
	Self: 'static + Send + Sync,
{
	/// Sends `request` and returns the raw response, whatever its status.
	///
	/// Non-2xx statuses are not transport errors; the client inspects the body first.
	fn execute<'a>(&'a self, request: &'a OutboundRequest) -> TransportFuture<'a>;
}
impl<T> ApiTransport for Arc<T>
where
	T: ?Sized + ApiTransport,
{
	fn execute<'a>(&'a self, request: &'a OutboundRequest) -> TransportFuture<'a> {
		(**self).execute(request)
	}
}

/// Caller-facing description of an API call, before signing.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiRequest {
	/// HTTP method.
	pub method: Method,
	/// Path relative to the base URL, or an absolute URL.
	pub path: String,
	/// Caller query parameters; signed keys override colliding entries.
	pub query: BTreeMap<String, String>,
	/// Optional JSON body.
	pub body: Option<Value>,
}
impl ApiRequest {
	/// Creates a request for `method` + `path`.
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self { method, path: path.into(), query: BTreeMap::new(), body: None }
	}

	/// Creates a `GET` request.
	pub fn get(path: impl Into<String>) -> Self {
		Self::new(Method::GET, path)
	}

	/// Creates a `POST` request.
	pub fn post(path: impl Into<String>) -> Self {
		Self::new(Method::POST, path)
	}

	/// Adds or replaces a query parameter.
	pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.query.insert(key.into(), value.into());

		self
	}

	/// Sets the JSON body.
	pub fn json(mut self, body: Value) -> Self {
		self.body = Some(body);

		self
	}
}

/// Fully resolved, signed request handed to the transport.
#[derive(Clone, Debug, PartialEq)]
pub struct OutboundRequest {
	/// HTTP method.
	pub method: Method,
	/// Absolute URL including the merged query.
	pub url: Url,
	/// Optional JSON body.
	pub body: Option<Value>,
}
impl OutboundRequest {
	/// Returns the value of query parameter `key`, if present.
	pub fn query_value(&self, key: &str) -> Option<String> {
		self.url.query_pairs().find(|(name, _)| name == key).map(|(_, value)| value.into_owned())
	}
}

/// Raw response returned by a transport.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawResponse {
	/// HTTP status code.
	pub status: u16,
	/// Response body bytes.
	pub body: Vec<u8>,
}
impl RawResponse {
	/// Builds a response from a status and JSON value.
	pub fn json(status: u16, body: &Value) -> Self {
		Self { status, body: body.to_string().into_bytes() }
	}

	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl ApiTransport for ReqwestTransport {
	fn execute<'a>(&'a self, request: &'a OutboundRequest) -> TransportFuture<'a> {
		Box::pin(async move {
			let mut builder = self.0.request(request.method.clone(), request.url.clone());

			if let Some(body) = request.body.as_ref() {
				builder = builder
					.header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
					.body(body.to_string());
			}

			let response = builder.send().await?;
			let status = response.status().as_u16();
			let body = response.bytes().await?.to_vec();

			Ok(RawResponse { status, body })
		})
	}
}
