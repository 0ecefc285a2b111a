//! Client-level error types shared by the interceptors, the refresh coordinator, and stores.

// self
use crate::{_prelude::*, envelope::ErrorCode};

/// Client-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Shared, cloneable handle to a foreign error.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync>;

/// Canonical client error exposed by public APIs.
///
/// The type is [`Clone`] so a single refresh failure can be handed to every caller that was
/// waiting on the same in-flight refresh.
#[derive(Clone, Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Typed decoding of an unwrapped payload failed.
	#[error(transparent)]
	Decode(#[from] DecodeError),

	/// The server rejected the token and renewing it did not help, or no refresh callback is
	/// configured.
	#[error("Token is invalid: {0}.")]
	TokenInvalid(ApiError),
	/// The server reported a non-zero application error code.
	#[error("API call failed: {0}.")]
	Api(ApiError),
	/// The response carried no envelope and could not be passed through.
	#[error("Unexpected response with HTTP status {status}.")]
	UnexpectedResponse {
		/// HTTP status code of the response.
		status: u16,
		/// Decoded response body (`Value::String` for non-JSON bodies).
		body: Value,
	},
	/// A caller-supplied callback failed.
	#[error("Callback failed: {message}.")]
	Callback {
		/// Human-readable summary supplied by the callback.
		message: String,
		/// Underlying failure, when the callback wrapped one.
		#[source]
		source: Option<SharedError>,
	},
}
impl Error {
	/// Wraps a foreign failure raised inside a refresh or logout callback.
	pub fn callback(message: impl Into<String>, src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Callback { message: message.into(), source: Some(Arc::new(src)) }
	}

	/// Returns the server-side envelope error, if this error carries one.
	pub fn api_error(&self) -> Option<&ApiError> {
		match self {
			Self::TokenInvalid(err) | Self::Api(err) => Some(err),
			_ => None,
		}
	}

	/// Returns the numeric envelope code, if this error carries one.
	pub fn api_code(&self) -> Option<ErrorCode> {
		self.api_error().map(|err| err.code)
	}

	/// Returns `true` when the error belongs to the token-invalid class.
	pub fn is_token_invalid(&self) -> bool {
		matches!(self, Self::TokenInvalid(_))
	}
}

/// Error payload reported by the API envelope, kept verbatim.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
	/// Envelope status code (`errcode`).
	pub code: ErrorCode,
	/// Envelope message (`errmsg`).
	pub message: String,
	/// Envelope payload (`data`).
	pub data: Value,
}
impl ApiError {
	/// Creates a new error payload.
	pub fn new(code: ErrorCode, message: impl Into<String>, data: Value) -> Self {
		Self { code, message: message.into(), data }
	}

	/// Classifies the payload into [`Error::TokenInvalid`] or [`Error::Api`] by its code.
	pub fn into_error(self) -> Error {
		if self.code.is_token_invalid() { Error::TokenInvalid(self) } else { Error::Api(self) }
	}
}
impl Display for ApiError {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "[{}] {}", self.code, self.message)
	}
}

/// Configuration and validation failures raised by the client.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed: {message}.")]
	HttpClientBuild {
		/// Rendered builder failure.
		message: String,
	},
	/// A required option is blank.
	#[error("The `{field}` option must not be blank.")]
	MissingField {
		/// Name of the offending option.
		field: &'static str,
	},
	/// A relative request path was given without a base URL.
	#[error("Request path `{path}` is relative but no base URL is configured.")]
	MissingBaseUrl {
		/// Offending request path.
		path: String,
	},
	/// The request URL cannot be parsed.
	#[error("Request URL `{url}` is invalid.")]
	InvalidUrl {
		/// URL that failed to parse.
		url: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// The base URL cannot carry paths (e.g., `data:` or `mailto:`).
	#[error("Base URL `{url}` cannot be used as a request root.")]
	CannotBeABase {
		/// Offending base URL.
		url: String,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl Display) -> Self {
		Self::HttpClientBuild { message: src.to_string() }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Clone, Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the API.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: SharedError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the API.")]
	Io(#[source] Arc<std::io::Error>),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { source: Arc::new(src) }
	}
}
impl From<std::io::Error> for TransportError {
	fn from(e: std::io::Error) -> Self {
		Self::Io(Arc::new(e))
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

/// Typed payload decoding failure, carrying the JSON path that failed.
#[derive(Clone, Debug, ThisError)]
#[error("Failed to decode response payload at `{path}`.")]
pub struct DecodeError {
	/// JSON path to the offending value.
	pub path: String,
	/// Underlying deserialization failure.
	#[source]
	pub source: Arc<serde_json::Error>,
}
impl From<serde_path_to_error::Error<serde_json::Error>> for DecodeError {
	fn from(e: serde_path_to_error::Error<serde_json::Error>) -> Self {
		let path = e.path().to_string();

		Self { path, source: Arc::new(e.into_inner()) }
	}
}
