//! Token staleness checks and singleflight refresh coordination.
//!
//! [`RefreshCoordinator::ensure_fresh`] funnels every caller through one in-flight refresh.
//! The first caller leads: it invokes the refresh callback, persists the new credentials (or
//! clears them and signs out on failure) and publishes the outcome. Callers arriving while
//! the refresh runs join it and receive the very same outcome, so the refresh endpoint is
//! hit once no matter how many requests notice the stale token together.

mod metrics;

pub use metrics::{RefreshMetrics, RefreshStats};

// crates.io
use async_lock::MutexGuardArc;
// self
use crate::{
	_prelude::*,
	credentials::{self, Credentials, RefreshedToken},
	envelope::ErrorCode,
	error::ApiError,
	obs::{self, OpKind},
	store::CredentialStore,
};

/// Boxed future returned by a [`RefreshCallback`].
pub type RefreshFuture = Pin<Box<dyn Future<Output = Result<RefreshedToken>> + Send>>;
/// Boxed future returned by a [`LogoutCallback`].
pub type LogoutFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
/// Caller-supplied credential renewal.
pub type RefreshCallback = Arc<dyn Fn() -> RefreshFuture + Send + Sync>;
/// Caller-supplied hook invoked whenever credentials are cleared.
pub type LogoutCallback = Arc<dyn Fn() -> LogoutFuture + Send + Sync>;

/// Default staleness margin before the token's half-life.
pub const DEFAULT_REFRESH_THRESHOLD: Duration = Duration::seconds(300);

type Flight = AsyncMutex<Option<Result<()>>>;

/// Decides when the stored token is stale and runs at most one refresh at a time.
pub struct RefreshCoordinator {
	store: Arc<dyn CredentialStore>,
	on_refresh: Option<RefreshCallback>,
	on_logout: Option<LogoutCallback>,
	threshold: Duration,
	metrics: Arc<RefreshMetrics>,
	in_flight: Mutex<Option<Arc<Flight>>>,
}
impl RefreshCoordinator {
	/// Creates a coordinator over `store` without callbacks and with the default threshold.
	pub fn new(store: Arc<dyn CredentialStore>) -> Self {
		Self {
			store,
			on_refresh: None,
			on_logout: None,
			threshold: DEFAULT_REFRESH_THRESHOLD,
			metrics: Default::default(),
			in_flight: Mutex::new(None),
		}
	}

	/// Sets the callback that renews credentials.
	pub fn with_refresh_callback(mut self, callback: Option<RefreshCallback>) -> Self {
		self.on_refresh = callback;

		self
	}

	/// Sets the callback invoked after credentials are cleared.
	pub fn with_logout_callback(mut self, callback: Option<LogoutCallback>) -> Self {
		self.on_logout = callback;

		self
	}

	/// Overrides the staleness margin; negative values clamp to zero.
	pub fn with_threshold(mut self, threshold: Duration) -> Self {
		self.threshold = if threshold.is_negative() { Duration::ZERO } else { threshold };

		self
	}

	/// Returns the staleness margin.
	pub fn threshold(&self) -> Duration {
		self.threshold
	}

	/// Returns the shared refresh counters.
	pub fn metrics(&self) -> &Arc<RefreshMetrics> {
		&self.metrics
	}

	/// Returns `true` while a refresh is running.
	pub fn is_refreshing(&self) -> bool {
		self.in_flight.lock().is_some()
	}

	/// Reports whether the stored token is close enough to its half-life to renew it.
	pub async fn is_stale(&self) -> Result<bool> {
		let creds = Credentials::load(self.store.as_ref()).await?;

		Ok(creds.is_stale_at(credentials::unix_now(), self.threshold))
	}

	/// Ensures a refresh has completed, starting one unless another caller already has.
	///
	/// Every caller that overlaps a running refresh observes its outcome, success or the
	/// same error. Failures have already cleared the stored credentials and invoked the
	/// logout callback by the time they are returned.
	pub async fn ensure_fresh(&self) -> Result<()> {
		loop {
			match self.join_or_lead() {
				Role::Lead(lease) => return self.lead(lease).await,
				Role::Join(flight) => {
					self.metrics.record_join();

					if let Some(outcome) = flight.lock().await.as_ref() {
						return outcome.clone();
					}
					// The leader was dropped before settling; compete for the lead again.
				},
			}
		}
	}

	/// Clears every stored credential and invokes the logout callback.
	///
	/// A store failure is reported through tracing and does not prevent the callback.
	pub async fn sign_out(&self) {
		if let Err(err) = credentials::clear(self.store.as_ref()).await {
			obs::warn_suppressed("sign_out", &err);
		}
		if let Some(on_logout) = self.on_logout.as_ref() {
			on_logout().await;
		}
	}

	fn join_or_lead(&self) -> Role<'_> {
		let mut slot = self.in_flight.lock();

		if let Some(flight) = slot.as_ref() {
			return Role::Join(flight.clone());
		}

		let flight = Arc::new(Flight::new(None));
		let Some(guard) = flight.try_lock_arc() else {
			// An unpublished mutex cannot be contended; joining it just retries the lead.
			return Role::Join(flight);
		};

		*slot = Some(flight.clone());

		Role::Lead(FlightLease { coordinator: self, flight, guard })
	}

	async fn lead(&self, mut lease: FlightLease<'_>) -> Result<()> {
		let outcome = obs::observe(OpKind::Refresh, "ensure_fresh", self.refresh_once()).await;

		*lease.guard = Some(outcome.clone());

		outcome
	}

	async fn refresh_once(&self) -> Result<()> {
		self.metrics.record_attempt();

		match self.renew().await {
			Ok(()) => {
				self.metrics.record_success();

				Ok(())
			},
			Err(err) => {
				self.metrics.record_failure();
				self.sign_out().await;

				Err(err)
			},
		}
	}

	async fn renew(&self) -> Result<()> {
		let Some(on_refresh) = self.on_refresh.as_ref() else {
			return Err(Error::TokenInvalid(ApiError::new(
				ErrorCode::TOKEN_INVALID,
				"Token refresh needed but no refresh callback is configured",
				Value::Null,
			)));
		};
		let refreshed = on_refresh().await?;

		credentials::persist(self.store.as_ref(), refreshed, credentials::unix_now()).await
	}
}
impl Debug for RefreshCoordinator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshCoordinator")
			.field("threshold", &self.threshold)
			.field("refresh_callback_set", &self.on_refresh.is_some())
			.field("logout_callback_set", &self.on_logout.is_some())
			.field("refreshing", &self.is_refreshing())
			.finish()
	}
}

enum Role<'a> {
	Lead(FlightLease<'a>),
	Join(Arc<Flight>),
}

/// Leader's hold on the published flight; dropping it unpublishes the flight before the
/// guard releases waiting callers.
struct FlightLease<'a> {
	coordinator: &'a RefreshCoordinator,
	flight: Arc<Flight>,
	guard: MutexGuardArc<Option<Result<()>>>,
}
impl Drop for FlightLease<'_> {
	fn drop(&mut self) {
		let mut slot = self.coordinator.in_flight.lock();

		if slot.as_ref().is_some_and(|current| Arc::ptr_eq(current, &self.flight)) {
			*slot = None;
		}
	}
}
