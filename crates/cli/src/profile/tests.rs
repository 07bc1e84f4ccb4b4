use std::sync::Arc;
use std::time::Duration;

use sso::protocol::CookieAttributes;
use sso::{Clock, CookieJar, DeviceStore, Identity, ManualClock, Origin, Provenance};
use tempfile::TempDir;

use super::*;

fn clock() -> Arc<dyn Clock> {
	Arc::new(ManualClock::at_millis(1_700_000_000_000))
}

#[test]
fn parent_domain_cookie_is_visible_from_sibling_jar() {
	let tmp = TempDir::new().unwrap();
	let store = ProfileStore::new(tmp.path());
	let clock = clock();

	let hub = store.cookie_jar("app.example.com", Arc::clone(&clock));
	hub.set("suite_session", "v1", &CookieAttributes::session(Some(".app.example.com".into()), 3600))
		.unwrap();

	let notes = store.cookie_jar("notes.app.example.com", Arc::clone(&clock));
	assert_eq!(notes.get("suite_session").unwrap().as_deref(), Some("v1"));
	assert_eq!(notes.header_for("notes.app.example.com").as_deref(), Some("suite_session=v1"));

	notes.remove("suite_session", &CookieAttributes::removal(Some(".app.example.com".into()))).unwrap();
	assert_eq!(hub.get("suite_session").unwrap(), None);
}

#[test]
fn expired_cookies_are_pruned_on_write() {
	let tmp = TempDir::new().unwrap();
	let store = ProfileStore::new(tmp.path());
	let manual = ManualClock::at_millis(1_700_000_000_000);
	let jar = store.cookie_jar("localhost", Arc::new(manual.clone()));

	jar.set("short", "x", &CookieAttributes::session(None, 60)).unwrap();
	manual.advance(Duration::from_secs(61));
	jar.set("other", "y", &CookieAttributes::session(None, 60)).unwrap();

	let records = jar.records().unwrap();
	assert_eq!(records.cookies.len(), 1);
	assert_eq!(records.cookies[0].name, "other");
}

#[test]
fn device_stores_are_scoped_per_origin() {
	let tmp = TempDir::new().unwrap();
	let store = ProfileStore::new(tmp.path());
	let spoke = store.device_store(&Origin::parse("http://localhost:3001").unwrap());
	let other = store.device_store(&Origin::parse("http://localhost:3002").unwrap());

	spoke.set("suite.deviceSession", "abc").unwrap();
	assert_eq!(spoke.get("suite.deviceSession").unwrap().as_deref(), Some("abc"));
	assert_eq!(other.get("suite.deviceSession").unwrap(), None);

	spoke.remove("suite.deviceSession").unwrap();
	assert_eq!(spoke.get("suite.deviceSession").unwrap(), None);
	other.remove("never-written").unwrap();
	assert!(!other.path().exists());
}

#[test]
fn corrupt_device_store_reports_storage_error() {
	let tmp = TempDir::new().unwrap();
	let store = ProfileStore::new(tmp.path());
	let device = store.device_store(&Origin::parse("http://localhost:3001").unwrap());
	std::fs::create_dir_all(device.path().parent().unwrap()).unwrap();
	std::fs::write(device.path(), "{not json").unwrap();

	assert!(matches!(device.get("k"), Err(SsoError::Storage(_))));
}

#[test]
fn identity_repository_roundtrips_and_clears() {
	let tmp = TempDir::new().unwrap();
	let store = ProfileStore::new(tmp.path());
	let repo = store.identities(&Origin::parse("https://notes.app.example.com").unwrap());

	assert_eq!(repo.load().unwrap(), None);
	let identity = Identity::new("u-1", Provenance::CustomToken);
	repo.save(&identity).unwrap();
	assert_eq!(repo.load().unwrap(), Some(identity));
	assert!(repo.clear().unwrap());
	assert!(!repo.clear().unwrap());
}

#[test]
fn origin_keys_are_filesystem_safe() {
	let origin = Origin::parse("http://[::1]:3001").unwrap();
	let key = origin_key(&origin);
	assert!(key.chars().all(|c| c.is_ascii_alphanumeric() || "._-".contains(c)), "{key}");
	assert_eq!(origin_key(&Origin::parse("https://app.example.com").unwrap()), "https_app.example.com_443");
}
