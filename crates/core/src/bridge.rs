//! Best-effort recovery of the hub's session on a spoke that could not share
//! the session cookie (different port in development, foreign preview host).

use std::sync::Arc;

use serde::Serialize;
use suite_sso_protocol::{TokenExchangeRequest, TokenExchangeResponse};
use tracing::{debug, info, warn};

use crate::coordinator::{BootstrapCoordinator, BootstrapOutcome};
use crate::device_cache::DeviceSessionCache;
use crate::environment::EnvironmentResolver;
use crate::error::{Result, SsoError};
use crate::flight::{FlightGuard, SingleFlight};
use crate::identity::{AuthState, IdentityProvider};
use crate::transport::SessionTransport;

/// What a bridge attempt did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BridgeOutcome {
	Disabled,
	/// This origin is the hub; nothing to bridge from.
	OnHub,
	AlreadyAuthenticated,
	/// Another exchange holds the flight guard.
	InFlight,
	NoHubSession,
	/// Development exchange cached and the bootstrap ran again.
	Rebootstrapped { bootstrap: BootstrapOutcome },
	SignedIn { uid: String },
	Failed { reason: String },
	/// The attempt was dropped before it finished.
	Cancelled,
}

/// Collaborators the bridge drives.
pub struct BridgeDeps {
	pub resolver: EnvironmentResolver,
	pub transport: Arc<dyn SessionTransport>,
	pub provider: Arc<dyn IdentityProvider>,
	pub auth: AuthState,
	pub cache: DeviceSessionCache,
	pub coordinator: BootstrapCoordinator,
	/// Shared with the coordinator, which stands down while this is held.
	pub sso_flight: Arc<SingleFlight>,
}

pub struct SsoBridge {
	enabled: bool,
	deps: BridgeDeps,
}

/// Fires the completion callback exactly once, with [`BridgeOutcome::Cancelled`]
/// if the attempt is dropped first.
struct Completion<F: FnOnce(&BridgeOutcome)> {
	callback: Option<F>,
}

impl<F: FnOnce(&BridgeOutcome)> Completion<F> {
	fn fire(mut self, outcome: &BridgeOutcome) {
		if let Some(callback) = self.callback.take() {
			callback(outcome);
		}
	}
}

impl<F: FnOnce(&BridgeOutcome)> Drop for Completion<F> {
	fn drop(&mut self) {
		if let Some(callback) = self.callback.take() {
			callback(&BridgeOutcome::Cancelled);
		}
	}
}

impl SsoBridge {
	pub fn new(deps: BridgeDeps) -> Self {
		Self { enabled: true, deps }
	}

	pub fn with_enabled(mut self, enabled: bool) -> Self {
		self.enabled = enabled;
		self
	}

	pub fn is_enabled(&self) -> bool {
		self.enabled
	}

	pub async fn run(&self) -> BridgeOutcome {
		self.run_then(|_| {}).await
	}

	/// Runs one bridge attempt and reports the outcome to `on_complete`.
	pub async fn run_then<F>(&self, on_complete: F) -> BridgeOutcome
	where
		F: FnOnce(&BridgeOutcome) + Send,
	{
		let completion = Completion { callback: Some(on_complete) };
		let outcome = self.attempt().await;
		info!(target = "sso.bridge", outcome = ?outcome, "bridge finished");
		completion.fire(&outcome);
		outcome
	}

	async fn attempt(&self) -> BridgeOutcome {
		let deps = &self.deps;
		if !self.enabled {
			return BridgeOutcome::Disabled;
		}
		if deps.resolver.is_hub() {
			return BridgeOutcome::OnHub;
		}
		if deps.auth.is_hydrated() {
			return BridgeOutcome::AlreadyAuthenticated;
		}
		let Some(guard) = deps.sso_flight.try_acquire() else {
			debug!(target = "sso.bridge", "exchange already in flight");
			return BridgeOutcome::InFlight;
		};

		let outcome = self.exchange_and_sign_in(guard).await;
		// A bootstrap that stood down for this exchange still has to complete.
		if let Some(bootstrap) = deps.coordinator.resume_deferred().await {
			debug!(target = "sso.bridge", bootstrap = ?bootstrap, "deferred bootstrap finished");
		}
		outcome
	}

	/// Runs while holding the flight guard; the guard is released on every exit.
	async fn exchange_and_sign_in(&self, guard: FlightGuard) -> BridgeOutcome {
		let deps = &self.deps;
		let exchanged = match self.exchange_hub_session().await {
			Ok(Some(exchanged)) => exchanged,
			Ok(None) => return BridgeOutcome::NoHubSession,
			Err(err) => {
				debug!(target = "sso.bridge", error = %err, "hub session unavailable");
				return BridgeOutcome::Failed { reason: err.to_string() };
			}
		};

		match exchanged {
			TokenExchangeResponse::Development { session_cookie } => {
				if let Err(err) = deps.cache.store(&session_cookie) {
					warn!(target = "sso.bridge", error = %err, "could not cache exchanged session");
					return BridgeOutcome::Failed { reason: err.to_string() };
				}
				// The coordinator stands down while the flight is held.
				drop(guard);
				info!(target = "sso.bridge", "cached hub session; bootstrapping again");
				let bootstrap = deps.coordinator.rerun().await;
				BridgeOutcome::Rebootstrapped { bootstrap }
			}
			TokenExchangeResponse::Production { custom_token } => match deps.provider.sign_in_with_custom_token(&custom_token).await {
				Ok(identity) => {
					if deps.auth.is_hydrated() {
						// The provider holds one current user; the bootstrap's identity rests on it too.
						debug!(target = "sso.bridge", "bootstrap hydrated first; keeping its identity");
						return BridgeOutcome::AlreadyAuthenticated;
					}
					let uid = identity.uid.clone();
					deps.auth.hydrate(identity);
					BridgeOutcome::SignedIn { uid }
				}
				Err(err) => {
					warn!(target = "sso.bridge", error = %err, "custom-token sign-in failed");
					BridgeOutcome::Failed { reason: err.to_string() }
				}
			},
		}
	}

	/// Hub live-session query followed by the spoke's own exchange.
	async fn exchange_hub_session(&self) -> Result<Option<TokenExchangeResponse>> {
		let deps = &self.deps;
		let hub = deps.resolver.resolve_hub_base_url();
		debug!(target = "sso.bridge", %hub, "querying hub session");

		let live = deps.transport.hub_session(&hub).await?;
		let Some(session_cookie) = live.live_session() else {
			debug!(target = "sso.bridge", "hub reports no session");
			return Ok(None);
		};

		let exchanged = deps
			.transport
			.exchange(&TokenExchangeRequest {
				session_cookie: session_cookie.to_string(),
			})
			.await
			.map_err(|err| match err {
				SsoError::Status { status, message, .. } => SsoError::SignIn(format!("exchange rejected ({status}): {message}")),
				other => other,
			})?;
		Ok(Some(exchanged))
	}
}
