//! Device-scoped bridge for session values across origins that cannot share
//! cookies (every spoke on its own port during local development).
//!
//! Entries slide: [`DeviceSessionCache::refresh`] rewrites only the timestamp.
//! Concurrent tabs are last-writer-wins; the cache is advisory and never the
//! source of truth.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::clock::Clock;
use crate::error::Result;
use crate::storage::DeviceStore;

pub const DEVICE_SESSION_TTL: Duration = Duration::from_secs(8 * 60 * 60);

const VALUE_KEY: &str = "suite.deviceSession";
const WRITTEN_AT_KEY: &str = "suite.deviceSessionAt";

#[derive(Clone)]
pub struct DeviceSessionCache {
	store: Arc<dyn DeviceStore>,
	clock: Arc<dyn Clock>,
	ttl: Duration,
}

impl DeviceSessionCache {
	pub fn new(store: Arc<dyn DeviceStore>, clock: Arc<dyn Clock>) -> Self {
		Self {
			store,
			clock,
			ttl: DEVICE_SESSION_TTL,
		}
	}

	pub fn store(&self, value: &str) -> Result<()> {
		self.store.set(VALUE_KEY, value)?;
		self.stamp()
	}

	/// Cached value, or `None` after purging a stale or half-written entry.
	pub fn read(&self) -> Option<String> {
		let value = match self.store.get(VALUE_KEY) {
			Ok(value) => value?,
			Err(err) => {
				debug!(target = "sso.cache", error = %err, "device store unavailable");
				return None;
			}
		};

		let written_at = self
			.store
			.get(WRITTEN_AT_KEY)
			.ok()
			.flatten()
			.and_then(|raw| raw.parse::<u64>().ok());
		let now = self.clock.now_millis();

		match written_at {
			Some(at) if now.saturating_sub(at) <= self.ttl.as_millis() as u64 => Some(value),
			_ => {
				debug!(target = "sso.cache", written_at = ?written_at, "purging stale device session");
				let _ = self.clear();
				None
			}
		}
	}

	/// Slides the expiry of an existing entry without touching its value.
	pub fn refresh(&self) -> Result<bool> {
		if self.store.get(VALUE_KEY)?.is_none() {
			return Ok(false);
		}
		self.stamp()?;
		Ok(true)
	}

	pub fn clear(&self) -> Result<()> {
		let value = self.store.remove(VALUE_KEY);
		let stamp = self.store.remove(WRITTEN_AT_KEY);
		value.and(stamp)
	}

	/// Write timestamp of the current entry, if any.
	pub fn written_at_millis(&self) -> Option<u64> {
		self.store.get(WRITTEN_AT_KEY).ok().flatten()?.parse().ok()
	}

	fn stamp(&self) -> Result<()> {
		self.store.set(WRITTEN_AT_KEY, &self.clock.now_millis().to_string())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::clock::ManualClock;
	use crate::storage::MemoryDeviceStore;

	fn cache() -> (DeviceSessionCache, ManualClock, MemoryDeviceStore) {
		let clock = ManualClock::at_millis(1_000_000);
		let store = MemoryDeviceStore::new();
		let cache = DeviceSessionCache::new(Arc::new(store.clone()), Arc::new(clock.clone()));
		(cache, clock, store)
	}

	#[test]
	fn read_within_ttl_returns_value() {
		let (cache, clock, _) = cache();
		cache.store("abc").unwrap();
		clock.advance(DEVICE_SESSION_TTL);
		assert_eq!(cache.read().as_deref(), Some("abc"));
	}

	#[test]
	fn stale_entry_is_purged_on_read() {
		let (cache, clock, store) = cache();
		cache.store("abc").unwrap();
		clock.advance(DEVICE_SESSION_TTL + Duration::from_millis(1));

		assert_eq!(cache.read(), None);
		assert!(store.is_empty(), "both keys should be removed");
	}

	#[test]
	fn refresh_slides_timestamp_only() {
		let (cache, clock, _) = cache();
		assert!(!cache.refresh().unwrap());

		cache.store("abc").unwrap();
		clock.advance(Duration::from_secs(7 * 3600));
		assert!(cache.refresh().unwrap());
		clock.advance(Duration::from_secs(7 * 3600));

		assert_eq!(cache.read().as_deref(), Some("abc"));
		assert_eq!(cache.written_at_millis(), Some(1_000_000 + 7 * 3600 * 1000));
	}

	#[test]
	fn entry_without_timestamp_is_stale() {
		let (cache, _, store) = cache();
		store.set(VALUE_KEY, "abc").unwrap();
		assert_eq!(cache.read(), None);
		assert!(store.is_empty());
	}

	#[test]
	fn last_writer_wins_across_tabs() {
		let (tab_a, _, store) = cache();
		let tab_b = DeviceSessionCache::new(Arc::new(store.clone()), Arc::new(ManualClock::at_millis(1_000_000)));
		tab_a.store("first").unwrap();
		tab_b.store("second").unwrap();
		assert_eq!(tab_a.read().as_deref(), Some("second"));
	}

	#[test]
	fn clear_removes_both_fields() {
		let (cache, _, store) = cache();
		cache.store("abc").unwrap();
		cache.clear().unwrap();
		assert!(store.is_empty());
		assert_eq!(cache.read(), None);
	}
}
