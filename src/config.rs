//! Serializable client configuration.

// self
use crate::{_prelude::*, error::ConfigError, refresh::DEFAULT_REFRESH_THRESHOLD};

/// Plain-data options for a [`Client`](crate::client::Client).
///
/// Callbacks, the credential store and the transport are not data; attach them through
/// [`ClientBuilder`](crate::client::ClientBuilder).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
	/// API identity sent with every request as `appid`.
	pub app_id: String,
	/// Shared secret used only to compute signatures; never transmitted.
	pub app_key: String,
	/// API root that relative request paths are resolved against.
	#[serde(default)]
	pub base_url: Option<Url>,
	/// Staleness margin, in seconds, before the token's half-life.
	#[serde(rename = "refresh_threshold", default = "default_refresh_threshold_secs")]
	pub refresh_threshold_secs: u64,
}
impl ClientConfig {
	/// Creates a configuration with the default threshold and no base URL.
	pub fn new(app_id: impl Into<String>, app_key: impl Into<String>) -> Self {
		Self {
			app_id: app_id.into(),
			app_key: app_key.into(),
			base_url: None,
			refresh_threshold_secs: default_refresh_threshold_secs(),
		}
	}

	/// Sets the API root.
	pub fn with_base_url(mut self, base_url: Url) -> Self {
		self.base_url = Some(base_url);

		self
	}

	/// Sets the staleness margin.
	pub fn with_refresh_threshold(mut self, threshold: Duration) -> Self {
		self.refresh_threshold_secs = u64::try_from(threshold.whole_seconds()).unwrap_or(0);

		self
	}

	/// Returns the staleness margin as a [`Duration`].
	pub fn refresh_threshold(&self) -> Duration {
		Duration::seconds(i64::try_from(self.refresh_threshold_secs).unwrap_or(i64::MAX))
	}

	/// Validates required options.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.app_id.trim().is_empty() {
			return Err(ConfigError::MissingField { field: "app_id" });
		}
		if self.app_key.trim().is_empty() {
			return Err(ConfigError::MissingField { field: "app_key" });
		}
		if let Some(base) = self.base_url.as_ref()
			&& base.cannot_be_a_base()
		{
			return Err(ConfigError::CannotBeABase { url: base.to_string() });
		}

		Ok(())
	}

	/// Resolves `path` against the base URL.
	///
	/// Absolute URLs are used verbatim. Relative paths are appended to the base URL's path,
	/// so `https://api.example.com/v2` + `/users/me` yields `https://api.example.com/v2/users/me`.
	pub fn resolve(&self, path: &str) -> Result<Url, ConfigError> {
		if let Ok(absolute) = Url::parse(path) {
			return Ok(absolute);
		}

		let base = self
			.base_url
			.as_ref()
			.ok_or_else(|| ConfigError::MissingBaseUrl { path: path.to_owned() })?;
		let joined = format!(
			"{}/{}",
			base.as_str().trim_end_matches('/'),
			path.trim_start_matches('/')
		);

		Url::parse(&joined).map_err(|source| ConfigError::InvalidUrl { url: joined, source })
	}
}
impl Debug for ClientConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientConfig")
			.field("app_id", &self.app_id)
			.field("app_key", &"<redacted>")
			.field("base_url", &self.base_url.as_ref().map(Url::as_str))
			.field("refresh_threshold_secs", &self.refresh_threshold_secs)
			.finish()
	}
}

fn default_refresh_threshold_secs() -> u64 {
	u64::try_from(DEFAULT_REFRESH_THRESHOLD.whole_seconds()).unwrap_or(300)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn base(url: &str) -> ClientConfig {
		ClientConfig::new("app", "secret")
			.with_base_url(Url::parse(url).expect("Fixture base URL should parse."))
	}

	#[test]
	fn deserializes_with_defaults() {
		let config: ClientConfig =
			serde_json::from_str(r#"{"app_id":"app","app_key":"secret"}"#)
				.expect("Minimal configuration should deserialize.");

		assert_eq!(config.refresh_threshold(), Duration::seconds(300));
		assert_eq!(config.base_url, None);
		assert!(config.validate().is_ok());

		let tuned: ClientConfig = serde_json::from_str(
			r#"{"app_id":"app","app_key":"secret","base_url":"https://api.example.com/v2","refresh_threshold":60}"#,
		)
		.expect("Full configuration should deserialize.");

		assert_eq!(tuned.refresh_threshold(), Duration::seconds(60));
		assert_eq!(tuned.base_url.as_ref().map(Url::as_str), Some("https://api.example.com/v2"));
	}

	#[test]
	fn blank_credentials_are_rejected() {
		assert_eq!(
			ClientConfig::new(" ", "secret").validate(),
			Err(ConfigError::MissingField { field: "app_id" })
		);
		assert_eq!(
			ClientConfig::new("app", "").validate(),
			Err(ConfigError::MissingField { field: "app_key" })
		);
	}

	#[test]
	fn paths_append_to_the_base_path() {
		let config = base("https://api.example.com/v2");

		assert_eq!(
			config.resolve("/users/me").expect("Path should resolve.").as_str(),
			"https://api.example.com/v2/users/me"
		);
		assert_eq!(
			base("https://api.example.com/v2/")
				.resolve("users/me?page=2")
				.expect("Path with query should resolve.")
				.as_str(),
			"https://api.example.com/v2/users/me?page=2"
		);
		assert_eq!(
			config.resolve("https://other.example.com/x").expect("Absolute URL should pass.").as_str(),
			"https://other.example.com/x"
		);
	}

	#[test]
	fn relative_paths_need_a_base() {
		let err = ClientConfig::new("app", "secret")
			.resolve("/users/me")
			.expect_err("Relative paths without a base URL should fail.");

		assert!(matches!(err, ConfigError::MissingBaseUrl { .. }));
	}

	#[test]
	fn debug_redacts_app_key() {
		assert!(!format!("{:?}", ClientConfig::new("app", "hunter2")).contains("hunter2"));
	}
}
