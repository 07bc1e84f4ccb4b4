//! One page (or app instance) worth of session components.
//!
//! [`SessionContext`] owns the coordinator, the bridge and the stores they
//! share, so setup and teardown are explicit instead of living in globals.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::bridge::{BridgeDeps, BridgeOutcome, SsoBridge};
use crate::clock::{Clock, SystemClock};
use crate::config::SuiteConfig;
use crate::coordinator::{BootstrapCoordinator, BootstrapOutcome, CoordinatorDeps};
use crate::device_cache::DeviceSessionCache;
use crate::environment::EnvironmentResolver;
use crate::error::Result;
use crate::flight::{RunStatus, SingleFlight};
use crate::http::HttpTransport;
use crate::identity::{AuthState, Identity, IdentityProvider};
use crate::record::SessionRecordStore;
use crate::storage::{CookieJar, DeviceStore, MemoryCookieJar, MemoryDeviceStore};
use crate::toolkit::ToolkitIdentityProvider;
use crate::transport::SessionTransport;

/// What a page load did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageLoadReport {
	pub bootstrap: BootstrapOutcome,
	pub bridge: BridgeOutcome,
	pub status: RunStatus,
	pub identity: Option<Identity>,
}

pub struct SessionContextBuilder {
	resolver: EnvironmentResolver,
	config: SuiteConfig,
	clock: Option<Arc<dyn Clock>>,
	jar: Option<Arc<dyn CookieJar>>,
	device_store: Option<Arc<dyn DeviceStore>>,
	transport: Option<Arc<dyn SessionTransport>>,
	provider: Option<Arc<dyn IdentityProvider>>,
	auth: Option<AuthState>,
}

impl SessionContextBuilder {
	pub fn with_config(mut self, config: SuiteConfig) -> Self {
		self.config = config;
		self
	}

	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = Some(clock);
		self
	}

	pub fn with_cookie_jar(mut self, jar: Arc<dyn CookieJar>) -> Self {
		self.jar = Some(jar);
		self
	}

	pub fn with_device_store(mut self, store: Arc<dyn DeviceStore>) -> Self {
		self.device_store = Some(store);
		self
	}

	pub fn with_transport(mut self, transport: Arc<dyn SessionTransport>) -> Self {
		self.transport = Some(transport);
		self
	}

	pub fn with_identity_provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
		self.provider = Some(provider);
		self
	}

	/// Starts from an identity restored out of long-lived persistence.
	pub fn with_auth_state(mut self, auth: AuthState) -> Self {
		self.auth = Some(auth);
		self
	}

	/// Wires the components, defaulting unset ports to in-memory stores, the
	/// system clock, [`HttpTransport`] and [`ToolkitIdentityProvider`].
	pub fn build(self) -> Result<SessionContext> {
		let config = self.config;
		let resolver = self.resolver;
		let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
		let jar = match self.jar {
			Some(jar) => jar,
			None => Arc::new(MemoryCookieJar::new(resolver.origin().host.clone()).with_clock(Arc::clone(&clock))),
		};
		let device_store = self.device_store.unwrap_or_else(|| Arc::new(MemoryDeviceStore::new()));
		let transport: Arc<dyn SessionTransport> = match self.transport {
			Some(transport) => transport,
			None => Arc::new(
				HttpTransport::new(&resolver.origin().to_string(), config.endpoints.clone(), config.request_timeout())?
					.with_cookies(Arc::clone(&jar)),
			),
		};
		let provider: Arc<dyn IdentityProvider> = match self.provider {
			Some(provider) => provider,
			None => Arc::new(ToolkitIdentityProvider::new(
				&config.toolkit.endpoint,
				config.toolkit.api_key.as_deref(),
				config.request_timeout(),
			)?),
		};
		let auth = self.auth.unwrap_or_default();

		let record = SessionRecordStore::new(Arc::clone(&jar), Arc::clone(&device_store), Arc::clone(&clock), resolver.cookie_domain());
		let cache = DeviceSessionCache::new(Arc::clone(&device_store), Arc::clone(&clock));
		let sso_flight = SingleFlight::new();

		let coordinator = BootstrapCoordinator::new(CoordinatorDeps {
			transport: Arc::clone(&transport),
			provider: Arc::clone(&provider),
			auth: auth.clone(),
			record: record.clone(),
			cache: cache.clone(),
			sso_flight: Arc::clone(&sso_flight),
		})
		.with_timeout(config.bootstrap_timeout());

		let bridge = SsoBridge::new(BridgeDeps {
			resolver: resolver.clone(),
			transport,
			provider: Arc::clone(&provider),
			auth: auth.clone(),
			cache: cache.clone(),
			coordinator: coordinator.clone(),
			sso_flight,
		})
		.with_enabled(config.bridge_enabled);

		debug!(
			target = "sso.env",
			origin = %resolver.origin(),
			environment = %resolver.environment(),
			hub = %resolver.resolve_hub_base_url(),
			is_hub = resolver.is_hub(),
			"session context ready"
		);

		Ok(SessionContext {
			resolver,
			auth,
			record,
			cache,
			provider,
			coordinator,
			bridge,
		})
	}
}

pub struct SessionContext {
	resolver: EnvironmentResolver,
	auth: AuthState,
	record: SessionRecordStore,
	cache: DeviceSessionCache,
	provider: Arc<dyn IdentityProvider>,
	coordinator: BootstrapCoordinator,
	bridge: SsoBridge,
}

impl SessionContext {
	pub fn builder(resolver: EnvironmentResolver) -> SessionContextBuilder {
		SessionContextBuilder {
			resolver,
			config: SuiteConfig::default(),
			clock: None,
			jar: None,
			device_store: None,
			transport: None,
			provider: None,
			auth: None,
		}
	}

	pub fn resolver(&self) -> &EnvironmentResolver {
		&self.resolver
	}

	pub fn auth(&self) -> &AuthState {
		&self.auth
	}

	pub fn record(&self) -> &SessionRecordStore {
		&self.record
	}

	pub fn cache(&self) -> &DeviceSessionCache {
		&self.cache
	}

	pub fn coordinator(&self) -> &BootstrapCoordinator {
		&self.coordinator
	}

	pub fn bridge(&self) -> &SsoBridge {
		&self.bridge
	}

	/// Page-load entry: bootstrap first, then the bridge if nobody is signed in.
	pub async fn on_page_load(&self) -> PageLoadReport {
		let bootstrap = self.coordinator.run().await;
		let bridge = self.bridge.run().await;
		if self.auth.is_hydrated() {
			self.touch_activity();
		}

		let report = PageLoadReport {
			bootstrap,
			bridge,
			status: self.coordinator.status(),
			identity: self.auth.current(),
		};
		info!(
			target = "sso.bootstrap",
			origin = %self.resolver.origin(),
			authenticated = report.identity.is_some(),
			"page load finished"
		);
		report
	}

	/// Like [`on_page_load`](Self::on_page_load) but gives up waiting after
	/// `limit`; the coordinator still ends in `Complete`.
	pub async fn init(&self, limit: Duration) -> Option<PageLoadReport> {
		tokio::time::timeout(limit, self.on_page_load()).await.ok()
	}

	/// Activity tick on the session record.
	pub fn touch_activity(&self) {
		if let Err(err) = self.record.touch() {
			debug!(target = "sso.record", error = %err, "activity tick not recorded");
		}
	}

	/// Local sign-out: drops the identity everywhere on this device and
	/// returns the coordinator to `Idle` for the next page load.
	pub async fn sign_out(&self) -> Result<()> {
		self.coordinator.teardown();
		let previous = self.auth.clear();
		if let Err(err) = self.provider.sign_out().await {
			warn!(target = "sso.bootstrap", error = %err, "provider sign-out failed");
		}
		let record = self.record.clear();
		let cache = self.cache.clear();
		info!(target = "sso.bootstrap", uid = ?previous.as_ref().map(|i| &i.uid), "signed out");
		record.and(cache)
	}
}
