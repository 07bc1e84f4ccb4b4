//! Cookie jar and device-store ports plus in-memory implementations.
//!
//! A [`CookieJar`] is the view of the cookies visible to one host, the way
//! `document.cookie` is. A [`DeviceStore`] is origin-scoped key/value storage
//! shared by every page of that origin (all tabs see the same entries).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use suite_sso_protocol::{CookieAttributes, SameSite, domain_matches};

use crate::clock::{Clock, SystemClock};
use crate::error::{Result, SsoError};

pub trait CookieJar: Send + Sync {
	/// Value of the cookie `name` visible to this jar's host.
	fn get(&self, name: &str) -> Result<Option<String>>;

	fn set(&self, name: &str, value: &str, attributes: &CookieAttributes) -> Result<()>;

	/// Deletes the cookie at the domain/path given by `attributes`.
	fn remove(&self, name: &str, attributes: &CookieAttributes) -> Result<()>;

	/// `Cookie` header a credentialed request to `host` would carry.
	fn header_for(&self, _host: &str) -> Option<String> {
		None
	}
}

pub trait DeviceStore: Send + Sync {
	fn get(&self, key: &str) -> Result<Option<String>>;

	fn set(&self, key: &str, value: &str) -> Result<()>;

	fn remove(&self, key: &str) -> Result<()>;
}

/// One persisted cookie.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCookie {
	pub name: String,
	pub value: String,
	/// Domain attribute; `None` for host-only cookies.
	#[serde(default)]
	pub domain: Option<String>,
	/// Host that wrote the cookie (used for host-only matching).
	pub host: String,
	pub path: String,
	pub secure: bool,
	pub same_site: SameSite,
	#[serde(default)]
	pub expires_at_ms: Option<u64>,
}

impl StoredCookie {
	fn visible_to(&self, host: &str, now_ms: u64) -> bool {
		if self.expires_at_ms.is_some_and(|at| at <= now_ms) {
			return false;
		}
		match &self.domain {
			Some(domain) => domain_matches(host, domain),
			None => self.host.eq_ignore_ascii_case(host),
		}
	}

	fn same_slot(&self, name: &str, host: &str, attributes: &CookieAttributes) -> bool {
		if self.name != name || self.path != attributes.path {
			return false;
		}
		match (&self.domain, &attributes.domain) {
			(Some(a), Some(b)) => a.trim_start_matches('.').eq_ignore_ascii_case(b.trim_start_matches('.')),
			(None, None) => self.host.eq_ignore_ascii_case(host),
			_ => false,
		}
	}
}

/// Cookie storage with domain-matching semantics, shared by jar implementations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CookieRecords {
	#[serde(default)]
	pub cookies: Vec<StoredCookie>,
}

impl CookieRecords {
	pub fn lookup(&self, host: &str, name: &str, now_ms: u64) -> Option<&StoredCookie> {
		// Most specific (longest) domain wins, as browsers order them first.
		self.cookies
			.iter()
			.filter(|c| c.name == name && c.visible_to(host, now_ms))
			.max_by_key(|c| c.domain.as_deref().map(str::len).unwrap_or(usize::MAX))
	}

	pub fn upsert(&mut self, host: &str, name: &str, value: &str, attributes: &CookieAttributes, now_ms: u64) {
		self.cookies.retain(|c| !c.same_slot(name, host, attributes));
		let max_age_ms = attributes.max_age_secs().saturating_mul(1000);
		if max_age_ms <= 0 {
			return;
		}
		self.cookies.push(StoredCookie {
			name: name.to_string(),
			value: value.to_string(),
			domain: attributes.domain.clone(),
			host: host.to_string(),
			path: attributes.path.clone(),
			secure: attributes.secure,
			same_site: attributes.same_site,
			expires_at_ms: Some(now_ms.saturating_add(max_age_ms as u64)),
		});
	}

	pub fn remove(&mut self, host: &str, name: &str, attributes: &CookieAttributes) -> bool {
		let before = self.cookies.len();
		self.cookies.retain(|c| !c.same_slot(name, host, attributes));
		before != self.cookies.len()
	}

	/// Drops expired cookies.
	pub fn prune(&mut self, now_ms: u64) {
		self.cookies.retain(|c| c.expires_at_ms.is_none_or(|at| at > now_ms));
	}

	/// `name=value` pairs visible to `host`, formatted for a `Cookie` header.
	pub fn header_for(&self, host: &str, now_ms: u64) -> Option<String> {
		let pairs: Vec<String> = self
			.cookies
			.iter()
			.filter(|c| c.visible_to(host, now_ms))
			.map(|c| format!("{}={}", c.name, c.value))
			.collect();
		if pairs.is_empty() { None } else { Some(pairs.join("; ")) }
	}
}

/// In-memory cookie jar bound to one host.
///
/// Jars created with [`MemoryCookieJar::for_host`] share storage, so a cookie
/// written with a parent domain on one host is visible on its siblings.
#[derive(Clone)]
pub struct MemoryCookieJar {
	host: String,
	records: Arc<Mutex<CookieRecords>>,
	clock: Arc<dyn Clock>,
}

impl MemoryCookieJar {
	pub fn new(host: impl Into<String>) -> Self {
		Self {
			host: host.into(),
			records: Arc::new(Mutex::new(CookieRecords::default())),
			clock: Arc::new(SystemClock),
		}
	}

	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;
		self
	}

	/// A jar for another host sharing the same cookie storage.
	pub fn for_host(&self, host: impl Into<String>) -> Self {
		Self {
			host: host.into(),
			records: Arc::clone(&self.records),
			clock: Arc::clone(&self.clock),
		}
	}

	pub fn host(&self) -> &str {
		&self.host
	}

	pub fn snapshot(&self) -> CookieRecords {
		self.records.lock().clone()
	}
}

impl CookieJar for MemoryCookieJar {
	fn get(&self, name: &str) -> Result<Option<String>> {
		let now = self.clock.now_millis();
		Ok(self.records.lock().lookup(&self.host, name, now).map(|c| c.value.clone()))
	}

	fn set(&self, name: &str, value: &str, attributes: &CookieAttributes) -> Result<()> {
		let now = self.clock.now_millis();
		self.records.lock().upsert(&self.host, name, value, attributes, now);
		Ok(())
	}

	fn remove(&self, name: &str, attributes: &CookieAttributes) -> Result<()> {
		self.records.lock().remove(&self.host, name, attributes);
		Ok(())
	}

	fn header_for(&self, host: &str) -> Option<String> {
		let now = self.clock.now_millis();
		self.records.lock().header_for(host, now)
	}
}

/// In-memory device store; clones share entries like tabs of one origin.
#[derive(Debug, Clone, Default)]
pub struct MemoryDeviceStore {
	entries: Arc<Mutex<HashMap<String, String>>>,
	unavailable: bool,
}

impl MemoryDeviceStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Store whose every operation fails, like storage disabled by the browser.
	pub fn unavailable() -> Self {
		Self {
			unavailable: true,
			..Self::default()
		}
	}

	pub fn len(&self) -> usize {
		self.entries.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.lock().is_empty()
	}

	fn check(&self) -> Result<()> {
		if self.unavailable {
			return Err(SsoError::Storage("device storage is disabled".into()));
		}
		Ok(())
	}
}

impl DeviceStore for MemoryDeviceStore {
	fn get(&self, key: &str) -> Result<Option<String>> {
		self.check()?;
		Ok(self.entries.lock().get(key).cloned())
	}

	fn set(&self, key: &str, value: &str) -> Result<()> {
		self.check()?;
		self.entries.lock().insert(key.to_string(), value.to_string());
		Ok(())
	}

	fn remove(&self, key: &str) -> Result<()> {
		self.check()?;
		self.entries.lock().remove(key);
		Ok(())
	}
}
