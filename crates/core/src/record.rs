//! Shared session cookie plus its client-side timeout record.
//!
//! A readable cookie alone never means "signed in": [`SessionRecordStore::validate`]
//! pairs it with the locally stored [`SessionTimeout`]. Storage failures are
//! treated as "no session".

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use suite_sso_protocol::{CookieAttributes, SECONDS_PER_DAY};
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::error::Result;
use crate::storage::{CookieJar, DeviceStore};

pub const SESSION_COOKIE_NAME: &str = "suite_session";
pub const SESSION_MAX_AGE: Duration = Duration::from_secs(14 * SECONDS_PER_DAY);
pub const EXPIRING_SOON_WINDOW: Duration = Duration::from_secs(300);

const TIMEOUT_KEY: &str = "suite.sessionTimeout";

/// When the local session should be treated as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTimeout {
	pub expires_at_ms: u64,
	pub last_activity_ms: u64,
}

impl SessionTimeout {
	pub fn starting_at(now_ms: u64, max_age: Duration) -> Self {
		Self {
			expires_at_ms: now_ms.saturating_add(max_age.as_millis() as u64),
			last_activity_ms: now_ms,
		}
	}

	pub fn is_expired(&self, now_ms: u64) -> bool {
		now_ms > self.expires_at_ms
	}

	/// More than 75% of `max_age` has elapsed since the last activity.
	pub fn needs_refresh(&self, now_ms: u64, max_age: Duration) -> bool {
		let elapsed = now_ms.saturating_sub(self.last_activity_ms) as u128;
		elapsed * 4 > max_age.as_millis() * 3
	}

	pub fn remaining(&self, now_ms: u64) -> Duration {
		Duration::from_millis(self.expires_at_ms.saturating_sub(now_ms))
	}

	pub fn expiring_soon(&self, now_ms: u64) -> bool {
		self.remaining(now_ms) < EXPIRING_SOON_WINDOW
	}
}

/// Result of [`SessionRecordStore::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionValidation {
	pub valid: bool,
	pub expired: bool,
	pub needs_refresh: bool,
	pub has_cookie: bool,
	pub expiring_soon: bool,
	pub remaining_secs: u64,
}

#[derive(Clone)]
pub struct SessionRecordStore {
	jar: Arc<dyn CookieJar>,
	local: Arc<dyn DeviceStore>,
	clock: Arc<dyn Clock>,
	cookie_domain: Option<String>,
	cookie_name: String,
	max_age: Duration,
}

impl SessionRecordStore {
	pub fn new(jar: Arc<dyn CookieJar>, local: Arc<dyn DeviceStore>, clock: Arc<dyn Clock>, cookie_domain: Option<String>) -> Self {
		Self {
			jar,
			local,
			clock,
			cookie_domain,
			cookie_name: SESSION_COOKIE_NAME.to_string(),
			max_age: SESSION_MAX_AGE,
		}
	}

	pub fn with_max_age(mut self, max_age: Duration) -> Self {
		self.max_age = max_age;
		self
	}

	pub fn max_age(&self) -> Duration {
		self.max_age
	}

	pub fn cookie_name(&self) -> &str {
		&self.cookie_name
	}

	fn attributes(&self) -> CookieAttributes {
		CookieAttributes::session(self.cookie_domain.clone(), self.max_age.as_secs())
	}

	pub fn set(&self, value: &str) -> Result<()> {
		self.jar.set(&self.cookie_name, value, &self.attributes())
	}

	pub fn get(&self) -> Option<String> {
		match self.jar.get(&self.cookie_name) {
			Ok(value) => value.filter(|v| !v.is_empty()),
			Err(err) => {
				debug!(target = "sso.record", error = %err, "cookie jar unavailable; treating as no session");
				None
			}
		}
	}

	pub fn remove(&self) -> Result<()> {
		self.jar.remove(&self.cookie_name, &CookieAttributes::removal(self.cookie_domain.clone()))
	}

	pub fn timeout(&self) -> Option<SessionTimeout> {
		let raw = match self.local.get(TIMEOUT_KEY) {
			Ok(raw) => raw?,
			Err(err) => {
				debug!(target = "sso.record", error = %err, "timeout record unavailable");
				return None;
			}
		};
		match serde_json::from_str(&raw) {
			Ok(timeout) => Some(timeout),
			Err(err) => {
				warn!(target = "sso.record", error = %err, "discarding unreadable timeout record");
				let _ = self.local.remove(TIMEOUT_KEY);
				None
			}
		}
	}

	fn write_timeout(&self, timeout: &SessionTimeout) -> Result<()> {
		self.local.set(TIMEOUT_KEY, &serde_json::to_string(timeout)?)
	}

	/// Establishes the session locally: cookie, expiry and activity stamp.
	pub fn initialize(&self, value: &str) -> Result<SessionTimeout> {
		self.set(value)?;
		let timeout = SessionTimeout::starting_at(self.clock.now_millis(), self.max_age);
		self.write_timeout(&timeout)?;
		debug!(target = "sso.record", expires_at_ms = timeout.expires_at_ms, "session record initialized");
		Ok(timeout)
	}

	/// Activity tick: stamps `last_activity` on an existing record.
	pub fn touch(&self) -> Result<bool> {
		let Some(mut timeout) = self.timeout() else {
			return Ok(false);
		};
		timeout.last_activity_ms = self.clock.now_millis();
		self.write_timeout(&timeout)?;
		Ok(true)
	}

	pub fn validate(&self) -> SessionValidation {
		let now = self.clock.now_millis();
		let has_cookie = self.get().is_some();
		let timeout = self.timeout();

		let expired = timeout.is_none_or(|t| t.is_expired(now));
		SessionValidation {
			valid: has_cookie && !expired,
			expired,
			needs_refresh: timeout.is_some_and(|t| t.needs_refresh(now, self.max_age)),
			has_cookie,
			expiring_soon: timeout.is_some_and(|t| t.expiring_soon(now)),
			remaining_secs: timeout.map(|t| t.remaining(now).as_secs()).unwrap_or(0),
		}
	}

	/// Destroys cookie and timeout record together.
	pub fn clear(&self) -> Result<()> {
		let cookie = self.remove();
		let local = self.local.remove(TIMEOUT_KEY);
		cookie.and(local)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::clock::ManualClock;
	use crate::storage::{MemoryCookieJar, MemoryDeviceStore};

	const DAY_MS: u64 = SECONDS_PER_DAY * 1000;

	fn store(clock: &ManualClock) -> (SessionRecordStore, MemoryCookieJar) {
		let clock: Arc<dyn Clock> = Arc::new(clock.clone());
		let jar = MemoryCookieJar::new("notes.app.example.com").with_clock(Arc::clone(&clock));
		let store = SessionRecordStore::new(
			Arc::new(jar.clone()),
			Arc::new(MemoryDeviceStore::new()),
			clock,
			Some(".app.example.com".into()),
		);
		(store, jar)
	}

	#[test]
	fn cookie_without_timeout_is_not_valid() {
		let clock = ManualClock::at_millis(10 * DAY_MS);
		let (store, _jar) = store(&clock);
		store.set("abc").unwrap();

		let v = store.validate();
		assert!(v.has_cookie);
		assert!(v.expired);
		assert!(!v.valid);
	}

	#[test]
	fn initialize_produces_valid_session() {
		let clock = ManualClock::at_millis(10 * DAY_MS);
		let (store, jar) = store(&clock);
		let timeout = store.initialize("abc").unwrap();

		assert_eq!(timeout.expires_at_ms, 24 * DAY_MS);
		let v = store.validate();
		assert!(v.valid && v.has_cookie && !v.expired && !v.needs_refresh && !v.expiring_soon);
		assert_eq!(v.remaining_secs, 14 * SECONDS_PER_DAY);
		assert_eq!(jar.for_host("app.example.com").get(SESSION_COOKIE_NAME).unwrap().as_deref(), Some("abc"));
	}

	#[test]
	fn expiry_is_strictly_after_deadline() {
		let t = SessionTimeout::starting_at(0, Duration::from_secs(100));
		assert!(!t.is_expired(100_000));
		assert!(t.is_expired(100_001));
	}

	#[test]
	fn needs_refresh_boundary_is_exclusive() {
		let max_age = Duration::from_secs(100);
		let t = SessionTimeout::starting_at(0, max_age);
		assert!(!t.needs_refresh(75_000, max_age));
		assert!(t.needs_refresh(75_001, max_age));
	}

	#[test]
	fn expiring_soon_under_five_minutes() {
		let t = SessionTimeout::starting_at(0, Duration::from_secs(3600));
		assert!(!t.expiring_soon(3_300_000));
		assert!(t.expiring_soon(3_300_001));
		assert!(t.expiring_soon(4_000_000));
	}

	#[test]
	fn touch_moves_last_activity_only() {
		let clock = ManualClock::at_millis(0);
		let (store, _jar) = store(&clock);
		assert!(!store.touch().unwrap());

		let initial = store.initialize("abc").unwrap();
		clock.advance(Duration::from_secs(11 * SECONDS_PER_DAY));
		assert!(store.validate().needs_refresh);

		assert!(store.touch().unwrap());
		let touched = store.timeout().unwrap();
		assert_eq!(touched.expires_at_ms, initial.expires_at_ms);
		assert_eq!(touched.last_activity_ms, 11 * DAY_MS);
		assert!(!store.validate().needs_refresh);
	}

	#[test]
	fn session_expires_after_max_age() {
		let clock = ManualClock::at_millis(0);
		let (store, _jar) = store(&clock);
		store.initialize("abc").unwrap();
		clock.advance(Duration::from_millis(14 * DAY_MS + 1));

		let v = store.validate();
		assert!(v.expired);
		assert!(!v.valid);
		assert!(v.expiring_soon);
		assert_eq!(v.remaining_secs, 0);
	}

	#[test]
	fn clear_removes_cookie_and_timeout() {
		let clock = ManualClock::at_millis(0);
		let (store, _jar) = store(&clock);
		store.initialize("abc").unwrap();
		store.clear().unwrap();

		assert!(store.get().is_none());
		assert!(store.timeout().is_none());
		assert!(!store.validate().valid);
	}

	#[test]
	fn unavailable_storage_reads_as_no_session() {
		let clock: Arc<dyn Clock> = Arc::new(ManualClock::at_millis(0));
		let store = SessionRecordStore::new(
			Arc::new(MemoryCookieJar::new("localhost")),
			Arc::new(MemoryDeviceStore::unavailable()),
			clock,
			None,
		);
		assert!(store.initialize("abc").is_err());
		let v = store.validate();
		assert!(!v.valid);
		assert!(v.expired);
	}
}
