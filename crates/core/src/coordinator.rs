//! Per-page-load bootstrap coordinator.
//!
//! Runs once per page load and always terminates in [`RunStatus::Complete`]:
//! every error, the bootstrap timeout, a panic in a collaborator, and even
//! dropping the run future all end the run. Results that resolve after the
//! run was torn down or superseded are discarded by the generation check.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Serialize;
use suite_sso_protocol::{BootstrapRequest, BootstrapResponse};
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::device_cache::DeviceSessionCache;
use crate::error::{Result, SsoError};
use crate::flight::{RunSlot, RunStatus, SingleFlight};
use crate::identity::{AuthState, Identity, IdentityProvider};
use crate::record::SessionRecordStore;
use crate::transport::SessionTransport;

pub const DEFAULT_BOOTSTRAP_TIMEOUT: Duration = Duration::from_millis(1500);

/// Which response field the identity was hydrated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HydrationPath {
	Snapshot,
	SessionCookie,
	CustomToken,
}

/// Result of the optional custom-token sign-in on the development path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SecondarySignIn {
	NotAttempted,
	Succeeded,
	Failed,
}

/// What a single run did. Purely informational; callers observe the status
/// signal and the auth state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BootstrapOutcome {
	/// Guard rejected the call (already running/complete, or SSO in flight).
	Skipped,
	/// Existing identity confirmed by the backend.
	Revalidated,
	/// Existing identity revoked remotely; local state purged.
	Revoked,
	Hydrated {
		path: HydrationPath,
		secondary: SecondarySignIn,
	},
	Unauthenticated,
	TimedOut,
	Failed {
		reason: String,
	},
	/// Result arrived after the run was torn down or superseded.
	Discarded,
}

/// Collaborators the coordinator drives.
pub struct CoordinatorDeps {
	pub transport: Arc<dyn SessionTransport>,
	pub provider: Arc<dyn IdentityProvider>,
	pub auth: AuthState,
	pub record: SessionRecordStore,
	pub cache: DeviceSessionCache,
	/// Held by the bridge while an SSO exchange is in flight.
	pub sso_flight: Arc<SingleFlight>,
}

struct Inner {
	slot: RunSlot,
	/// Set when a run stood down for an SSO exchange; the bridge resumes it.
	deferred: AtomicBool,
	status_tx: watch::Sender<RunStatus>,
	deps: CoordinatorDeps,
	timeout: Duration,
}

impl Inner {
	fn publish(&self) {
		self.status_tx.send_replace(self.slot.status());
	}

	fn finish(&self, generation: u64) {
		if self.slot.complete(generation) {
			self.publish();
		}
	}
}

/// Forces `Complete` when a run ends by any path, including unwinding or the
/// run future being dropped.
struct CompletionGuard<'a> {
	inner: &'a Inner,
	generation: u64,
}

impl Drop for CompletionGuard<'_> {
	fn drop(&mut self) {
		self.inner.finish(self.generation);
	}
}

#[derive(Clone)]
pub struct BootstrapCoordinator {
	inner: Arc<Inner>,
}

impl BootstrapCoordinator {
	pub fn new(deps: CoordinatorDeps) -> Self {
		let (status_tx, _rx) = watch::channel(RunStatus::Idle);
		Self {
			inner: Arc::new(Inner {
				slot: RunSlot::new(),
				deferred: AtomicBool::new(false),
				status_tx,
				deps,
				timeout: DEFAULT_BOOTSTRAP_TIMEOUT,
			}),
		}
	}

	/// Overrides the bootstrap timeout. Only meaningful before the first run.
	pub fn with_timeout(self, bootstrap_timeout: Duration) -> Self {
		match Arc::try_unwrap(self.inner) {
			Ok(mut inner) => {
				inner.timeout = bootstrap_timeout;
				Self { inner: Arc::new(inner) }
			}
			Err(inner) => {
				warn!(target = "sso.bootstrap", "coordinator already shared; keeping existing timeout");
				Self { inner }
			}
		}
	}

	pub fn status(&self) -> RunStatus {
		self.inner.slot.status()
	}

	pub fn subscribe(&self) -> watch::Receiver<RunStatus> {
		self.inner.status_tx.subscribe()
	}

	pub fn auth(&self) -> &AuthState {
		&self.inner.deps.auth
	}

	/// Resolves once the current run reaches `Complete`.
	pub async fn wait_complete(&self) {
		let mut rx = self.subscribe();
		let _ = rx.wait_for(|status| *status == RunStatus::Complete).await;
	}

	/// Page-load entry point; a no-op unless the coordinator is `Idle`.
	pub async fn run(&self) -> BootstrapOutcome {
		self.start(&[RunStatus::Idle]).await
	}

	/// Runs the bootstrap again after a completed run, e.g. once the bridge
	/// has cached a freshly exchanged session.
	pub async fn rerun(&self) -> BootstrapOutcome {
		self.start(&[RunStatus::Idle, RunStatus::Complete]).await
	}

	/// Runs a bootstrap that stood down while an SSO exchange held the
	/// flight. `None` if no run was deferred.
	pub async fn resume_deferred(&self) -> Option<BootstrapOutcome> {
		if !self.inner.deferred.swap(false, Ordering::SeqCst) {
			return None;
		}
		debug!(target = "sso.bootstrap", "resuming deferred bootstrap");
		Some(self.run().await)
	}

	/// Returns to `Idle` and invalidates any in-flight run (sign-out).
	pub fn teardown(&self) {
		self.inner.deferred.store(false, Ordering::SeqCst);
		let generation = self.inner.slot.reset();
		self.inner.publish();
		debug!(target = "sso.bootstrap", generation, "coordinator torn down");
	}

	async fn start(&self, from: &[RunStatus]) -> BootstrapOutcome {
		let inner = &*self.inner;
		if inner.deps.sso_flight.is_busy() {
			inner.deferred.store(true, Ordering::SeqCst);
			// Checked again so a flight released in between cannot miss the deferral.
			if inner.deps.sso_flight.is_busy() {
				debug!(target = "sso.bootstrap", "sso exchange in flight; deferring bootstrap");
				return BootstrapOutcome::Skipped;
			}
		}
		let Some(generation) = inner.slot.try_begin(from) else {
			debug!(target = "sso.bootstrap", status = ?inner.slot.status(), "bootstrap already started; skipping");
			return BootstrapOutcome::Skipped;
		};
		inner.deferred.store(false, Ordering::SeqCst);
		inner.publish();
		let _guard = CompletionGuard { inner, generation };

		let outcome = if inner.deps.auth.is_hydrated() {
			self.revalidate(generation).await
		} else {
			self.full_bootstrap(generation).await
		};

		info!(target = "sso.bootstrap", generation, outcome = ?outcome, "bootstrap finished");
		outcome
	}

	async fn request(&self, request: &BootstrapRequest) -> std::result::Result<BootstrapResponse, BootstrapOutcome> {
		let deps = &self.inner.deps;
		match timeout(self.inner.timeout, deps.transport.bootstrap(request)).await {
			Ok(Ok(response)) => Ok(response.normalized()),
			Ok(Err(err)) => {
				warn!(target = "sso.bootstrap", error = %err, "bootstrap request failed");
				Err(BootstrapOutcome::Failed { reason: err.to_string() })
			}
			Err(_) => {
				warn!(target = "sso.bootstrap", timeout_ms = self.inner.timeout.as_millis() as u64, "bootstrap timed out");
				Err(BootstrapOutcome::TimedOut)
			}
		}
	}

	async fn revalidate(&self, generation: u64) -> BootstrapOutcome {
		let response = match self.request(&BootstrapRequest::empty()).await {
			Ok(response) => response,
			// Unreachable backend: keep the restored identity, revocation was not observed.
			Err(outcome) => return outcome,
		};
		if !self.inner.slot.is_current(generation) {
			return BootstrapOutcome::Discarded;
		}

		if response.authenticated {
			debug!(target = "sso.bootstrap", source = ?response.source, "hydrated identity revalidated");
			return BootstrapOutcome::Revalidated;
		}

		info!(target = "sso.bootstrap", "session revoked remotely; signing out locally");
		self.purge_local_session().await;
		BootstrapOutcome::Revoked
	}

	async fn full_bootstrap(&self, generation: u64) -> BootstrapOutcome {
		let deps = &self.inner.deps;
		let cached = deps.cache.read();
		debug!(target = "sso.bootstrap", has_cached = cached.is_some(), "starting full bootstrap");

		let response = match self.request(&BootstrapRequest::with_cached(cached.clone())).await {
			Ok(response) => response,
			Err(outcome) => return outcome,
		};
		if !self.inner.slot.is_current(generation) {
			return BootstrapOutcome::Discarded;
		}

		if !response.authenticated {
			if cached.is_some() {
				debug!(target = "sso.bootstrap", "cached device session rejected");
			}
			log_storage(deps.cache.clear(), "clear device session");
			return BootstrapOutcome::Unauthenticated;
		}

		let result = if response.is_dev_mode() {
			self.hydrate_development(generation, response).await
		} else {
			self.hydrate_production(generation, response).await
		};
		result.unwrap_or_else(|err| {
			warn!(target = "sso.bootstrap", error = %err, "hydration failed");
			BootstrapOutcome::Failed { reason: err.to_string() }
		})
	}

	async fn hydrate_development(&self, generation: u64, response: BootstrapResponse) -> Result<BootstrapOutcome> {
		let deps = &self.inner.deps;
		match &response.session_cookie {
			Some(cookie) => {
				log_storage(deps.cache.store(cookie), "write device session");
				self.ensure_record(cookie);
			}
			None => log_storage(deps.cache.refresh().map(|_| ()), "refresh device session"),
		}

		let mut hydrated = match (&response.user, &response.session_cookie) {
			(Some(user), _) => Some((Identity::from_snapshot(user), HydrationPath::Snapshot)),
			(None, Some(cookie)) => match Identity::from_session_cookie(cookie) {
				Ok(identity) => Some((identity, HydrationPath::SessionCookie)),
				Err(err) => {
					debug!(target = "sso.bootstrap", error = %err, "session cookie carries no readable claims");
					None
				}
			},
			(None, None) => None,
		};
		if let Some((identity, _)) = &hydrated {
			deps.auth.hydrate(identity.clone());
		}

		let secondary = match &response.custom_token {
			None => SecondarySignIn::NotAttempted,
			Some(token) => match deps.provider.sign_in_with_custom_token(token).await {
				Ok(signed_in) => {
					debug!(target = "sso.bootstrap", uid = %signed_in.uid, "secondary sign-in succeeded");
					if hydrated.is_none() && self.inner.slot.is_current(generation) {
						deps.auth.hydrate(signed_in.clone());
						hydrated = Some((signed_in, HydrationPath::CustomToken));
					}
					SecondarySignIn::Succeeded
				}
				Err(err) => {
					warn!(target = "sso.bootstrap", error = %err, "secondary sign-in failed; storage-backed features degraded");
					SecondarySignIn::Failed
				}
			},
		};

		if !self.inner.slot.is_current(generation) {
			return Ok(BootstrapOutcome::Discarded);
		}
		// The session itself is the primary hydration; a failed secondary sign-in only degrades.
		if hydrated.is_none() {
			if let Some(cookie) = &response.session_cookie {
				let identity = Identity::from_opaque_session(cookie);
				deps.auth.hydrate(identity.clone());
				hydrated = Some((identity, HydrationPath::SessionCookie));
			}
		}
		match hydrated {
			Some((_, path)) => Ok(BootstrapOutcome::Hydrated { path, secondary }),
			None => Err(SsoError::Decode("development bootstrap carries no usable identity".into())),
		}
	}

	async fn hydrate_production(&self, generation: u64, response: BootstrapResponse) -> Result<BootstrapOutcome> {
		let deps = &self.inner.deps;
		let token = response
			.custom_token
			.as_deref()
			.ok_or_else(|| SsoError::Decode("authenticated bootstrap carries no customToken".into()))?;

		let identity = deps.provider.sign_in_with_custom_token(token).await?;
		if !self.inner.slot.is_current(generation) {
			// Torn down while signing in; do not leave a provider session behind.
			log_storage(deps.provider.sign_out().await, "sign out stale provider session");
			return Ok(BootstrapOutcome::Discarded);
		}

		deps.auth.hydrate(identity);
		if let Some(cookie) = &response.session_cookie {
			self.ensure_record(cookie);
		}
		Ok(BootstrapOutcome::Hydrated {
			path: HydrationPath::CustomToken,
			secondary: SecondarySignIn::NotAttempted,
		})
	}

	fn ensure_record(&self, cookie: &str) {
		let record = &self.inner.deps.record;
		if !record.validate().valid {
			log_storage(record.initialize(cookie).map(|_| ()), "initialize session record");
		}
	}

	async fn purge_local_session(&self) {
		let deps = &self.inner.deps;
		deps.auth.clear();
		log_storage(deps.provider.sign_out().await, "provider sign-out");
		log_storage(deps.record.clear(), "clear session record");
		log_storage(deps.cache.clear(), "clear device session");
	}
}

fn log_storage(result: Result<()>, action: &str) {
	if let Err(err) = result {
		warn!(target = "sso.bootstrap", error = %err, action, "non-fatal step failed");
	}
}

#[cfg(test)]
mod tests {
	use suite_sso_protocol::UserSnapshot;

	use super::*;
	use crate::clock::{Clock, ManualClock};
	use crate::fake::{FakeIdentityProvider, FakeTransport};
	use crate::storage::{CookieJar, DeviceStore, MemoryCookieJar, MemoryDeviceStore};

	struct Fixture {
		coordinator: BootstrapCoordinator,
		transport: FakeTransport,
		flight: Arc<SingleFlight>,
	}

	fn fixture() -> Fixture {
		let clock: Arc<dyn Clock> = Arc::new(ManualClock::at_millis(1_700_000_000_000));
		let store: Arc<dyn DeviceStore> = Arc::new(MemoryDeviceStore::new());
		let jar: Arc<dyn CookieJar> = Arc::new(MemoryCookieJar::new("localhost").with_clock(Arc::clone(&clock)));
		let transport = FakeTransport::new();
		let flight = SingleFlight::new();
		let coordinator = BootstrapCoordinator::new(CoordinatorDeps {
			transport: Arc::new(transport.clone()),
			provider: Arc::new(FakeIdentityProvider::accepting_any()),
			auth: AuthState::new(),
			record: SessionRecordStore::new(jar, Arc::clone(&store), Arc::clone(&clock), None),
			cache: DeviceSessionCache::new(store, clock),
			sso_flight: Arc::clone(&flight),
		});
		Fixture {
			coordinator,
			transport,
			flight,
		}
	}

	fn dev_user(uid: &str) -> BootstrapResponse {
		BootstrapResponse {
			authenticated: true,
			dev_mode: Some(true),
			user: Some(UserSnapshot::new(uid)),
			..BootstrapResponse::default()
		}
	}

	#[tokio::test(start_paused = true)]
	async fn second_run_while_running_is_skipped() {
		let fx = fixture();
		fx.transport.set_bootstrap_delay(Duration::from_millis(100));

		let first = tokio::spawn({
			let coordinator = fx.coordinator.clone();
			async move { coordinator.run().await }
		});
		tokio::task::yield_now().await;
		assert_eq!(fx.coordinator.status(), RunStatus::Running);
		assert_eq!(fx.coordinator.run().await, BootstrapOutcome::Skipped);

		assert_eq!(first.await.unwrap(), BootstrapOutcome::Unauthenticated);
		assert_eq!(fx.transport.bootstrap_requests().len(), 1);
		assert_eq!(fx.coordinator.run().await, BootstrapOutcome::Skipped, "one run per page load");
	}

	#[tokio::test]
	async fn sso_flight_defers_bootstrap_until_resumed() {
		let fx = fixture();
		let held = fx.flight.try_acquire().unwrap();
		assert_eq!(fx.coordinator.run().await, BootstrapOutcome::Skipped);
		assert_eq!(fx.coordinator.status(), RunStatus::Idle);
		assert!(fx.transport.calls().is_empty());

		drop(held);
		assert_eq!(fx.coordinator.resume_deferred().await, Some(BootstrapOutcome::Unauthenticated));
		assert_eq!(fx.coordinator.status(), RunStatus::Complete);
		assert_eq!(fx.coordinator.resume_deferred().await, None, "resumed once");
	}

	#[tokio::test]
	async fn nothing_to_resume_without_a_deferred_run() {
		let fx = fixture();
		assert_eq!(fx.coordinator.resume_deferred().await, None);
		assert_eq!(fx.coordinator.status(), RunStatus::Idle);
		assert!(fx.transport.calls().is_empty());
	}

	#[tokio::test(start_paused = true)]
	async fn dropped_run_still_completes() {
		let fx = fixture();
		fx.transport.set_bootstrap_delay(Duration::from_secs(10));

		let abandoned = tokio::time::timeout(Duration::from_millis(10), fx.coordinator.run()).await;
		assert!(abandoned.is_err());
		assert_eq!(fx.coordinator.status(), RunStatus::Complete);
	}

	#[tokio::test(start_paused = true)]
	async fn late_result_after_teardown_is_discarded() {
		let fx = fixture();
		fx.transport.respond_bootstrap(dev_user("u-late"));
		fx.transport.set_bootstrap_delay(Duration::from_millis(500));

		let run = tokio::spawn({
			let coordinator = fx.coordinator.clone();
			async move { coordinator.run().await }
		});
		tokio::task::yield_now().await;
		fx.coordinator.teardown();

		assert_eq!(run.await.unwrap(), BootstrapOutcome::Discarded);
		assert_eq!(fx.coordinator.status(), RunStatus::Idle, "stale run must not complete the reset slot");
		assert!(!fx.coordinator.auth().is_hydrated());
	}

	#[tokio::test]
	async fn rerun_starts_from_complete() {
		let fx = fixture();
		fx.transport.queue_bootstrap(BootstrapResponse::unauthenticated());
		fx.transport.respond_bootstrap(dev_user("u-1"));

		assert_eq!(fx.coordinator.run().await, BootstrapOutcome::Unauthenticated);
		let rerun = fx.coordinator.rerun().await;
		assert_eq!(
			rerun,
			BootstrapOutcome::Hydrated {
				path: HydrationPath::Snapshot,
				secondary: SecondarySignIn::NotAttempted,
			}
		);
		assert_eq!(fx.coordinator.status(), RunStatus::Complete);
		assert_eq!(fx.coordinator.auth().current().unwrap().uid, "u-1");
	}

	#[tokio::test]
	async fn status_signal_reports_transitions() {
		let fx = fixture();
		let mut rx = fx.coordinator.subscribe();
		assert_eq!(*rx.borrow_and_update(), RunStatus::Idle);

		fx.coordinator.run().await;
		assert!(rx.has_changed().unwrap());
		assert_eq!(*rx.borrow_and_update(), RunStatus::Complete);
		fx.coordinator.wait_complete().await;
	}
}
