// suite-sso: session bootstrap and cross-application SSO for suite apps
//
// Every suite application embeds one `SessionContext` per page load. The
// coordinator recovers or revalidates the session; the bridge borrows the Auth
// Hub's session when cookies could not be shared.

pub mod bridge;
pub mod clock;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod device_cache;
pub mod environment;
pub mod error;
pub mod fake;
pub mod flight;
pub mod http;
pub mod identity;
pub mod record;
pub mod storage;
pub mod toolkit;
pub mod transport;

pub use bridge::{BridgeDeps, BridgeOutcome, SsoBridge};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{SuiteConfig, ToolkitConfig};
pub use context::{PageLoadReport, SessionContext, SessionContextBuilder};
pub use coordinator::{BootstrapCoordinator, BootstrapOutcome, CoordinatorDeps, DEFAULT_BOOTSTRAP_TIMEOUT, HydrationPath, SecondarySignIn};
pub use device_cache::{DEVICE_SESSION_TTL, DeviceSessionCache};
pub use environment::{Environment, EnvironmentResolver, Origin, SuiteDomains};
pub use error::{Result, SsoError};
pub use flight::{FlightGuard, RunSlot, RunStatus, SingleFlight};
pub use http::{AuthEndpoints, HttpTransport};
pub use identity::{AuthState, Identity, IdentityProvider, Provenance};
pub use record::{SESSION_COOKIE_NAME, SESSION_MAX_AGE, SessionRecordStore, SessionTimeout, SessionValidation};
pub use storage::{CookieJar, CookieRecords, DeviceStore, MemoryCookieJar, MemoryDeviceStore, StoredCookie};
pub use suite_sso_protocol as protocol;
pub use toolkit::{ToolkitCredential, ToolkitIdentityProvider};
pub use transport::SessionTransport;
