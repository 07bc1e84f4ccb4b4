//! File-backed stand-ins for browser storage, kept under a profile directory.
//!
//! Layout:
//!
//! ```text
//! <profile>/cookies.json                 cookie jar shared by every host
//! <profile>/origins/<origin>/storage.json  device store of one origin
//! <profile>/origins/<origin>/identity.json identity persisted by `load`
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sso::{Clock, CookieJar, CookieRecords, DeviceStore, Identity, Origin, SsoError};
use sso::protocol::CookieAttributes;
use tracing::debug;

use crate::error::{CliError, Result};

#[cfg(test)]
mod tests;

const STORAGE_SCHEMA_VERSION: u32 = 1;

/// Root of one profile's persisted state.
#[derive(Debug, Clone)]
pub struct ProfileStore {
	root: PathBuf,
}

impl ProfileStore {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	/// `<data dir>/suite-sso/profile`.
	pub fn default_root() -> Result<PathBuf> {
		dirs::data_dir()
			.map(|dir| dir.join("suite-sso").join("profile"))
			.ok_or(CliError::NoHomeDir)
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	fn origin_dir(&self, origin: &Origin) -> PathBuf {
		self.root.join("origins").join(origin_key(origin))
	}

	pub fn cookie_jar(&self, host: &str, clock: Arc<dyn Clock>) -> FileCookieJar {
		FileCookieJar {
			path: self.root.join("cookies.json"),
			host: host.to_string(),
			clock,
		}
	}

	pub fn device_store(&self, origin: &Origin) -> FileDeviceStore {
		FileDeviceStore {
			path: self.origin_dir(origin).join("storage.json"),
		}
	}

	pub fn identities(&self, origin: &Origin) -> IdentityRepository {
		IdentityRepository {
			path: self.origin_dir(origin).join("identity.json"),
		}
	}
}

/// Directory-safe name for an origin, e.g. `http_localhost_3001`.
fn origin_key(origin: &Origin) -> String {
	let port = origin.effective_port().map(|p| p.to_string()).unwrap_or_default();
	format!("{}_{}_{}", origin.scheme, origin.host, port)
		.chars()
		.map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
		.collect()
}

fn read_json<T: DeserializeOwned + Default>(path: &Path) -> sso::Result<T> {
	match fs::read_to_string(path) {
		Ok(content) => serde_json::from_str(&content).map_err(|e| SsoError::Storage(format!("{}: {e}", path.display()))),
		Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
		Err(err) => Err(err.into()),
	}
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> sso::Result<()> {
	if let Some(parent) = path.parent() {
		fs::create_dir_all(parent)?;
	}
	fs::write(path, serde_json::to_string_pretty(value)?)?;
	Ok(())
}

/// Cookie jar persisted as JSON; every operation is a read-modify-write.
pub struct FileCookieJar {
	path: PathBuf,
	host: String,
	clock: Arc<dyn Clock>,
}

impl FileCookieJar {
	pub fn records(&self) -> sso::Result<CookieRecords> {
		read_json(&self.path)
	}

	fn update(&self, apply: impl FnOnce(&mut CookieRecords, u64)) -> sso::Result<()> {
		let now = self.clock.now_millis();
		let mut records = self.records()?;
		records.prune(now);
		apply(&mut records, now);
		write_json(&self.path, &records)
	}
}

impl CookieJar for FileCookieJar {
	fn get(&self, name: &str) -> sso::Result<Option<String>> {
		let now = self.clock.now_millis();
		Ok(self.records()?.lookup(&self.host, name, now).map(|c| c.value.clone()))
	}

	fn set(&self, name: &str, value: &str, attributes: &CookieAttributes) -> sso::Result<()> {
		debug!(target = "sso.cli", host = %self.host, name, domain = ?attributes.domain, "writing cookie");
		self.update(|records, now| records.upsert(&self.host, name, value, attributes, now))
	}

	fn remove(&self, name: &str, attributes: &CookieAttributes) -> sso::Result<()> {
		self.update(|records, _| {
			records.remove(&self.host, name, attributes);
		})
	}

	fn header_for(&self, host: &str) -> Option<String> {
		let now = self.clock.now_millis();
		self.records().ok()?.header_for(host, now)
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeviceStoreFile {
	schema: u32,
	#[serde(default)]
	entries: BTreeMap<String, String>,
}

impl Default for DeviceStoreFile {
	fn default() -> Self {
		Self {
			schema: STORAGE_SCHEMA_VERSION,
			entries: BTreeMap::new(),
		}
	}
}

/// Origin-scoped key/value store persisted as JSON.
pub struct FileDeviceStore {
	path: PathBuf,
}

impl FileDeviceStore {
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn update(&self, apply: impl FnOnce(&mut BTreeMap<String, String>)) -> sso::Result<()> {
		let mut file: DeviceStoreFile = read_json(&self.path)?;
		apply(&mut file.entries);
		write_json(&self.path, &file)
	}
}

impl DeviceStore for FileDeviceStore {
	fn get(&self, key: &str) -> sso::Result<Option<String>> {
		let file: DeviceStoreFile = read_json(&self.path)?;
		Ok(file.entries.get(key).cloned())
	}

	fn set(&self, key: &str, value: &str) -> sso::Result<()> {
		self.update(|entries| {
			entries.insert(key.to_string(), value.to_string());
		})
	}

	fn remove(&self, key: &str) -> sso::Result<()> {
		if !self.path.exists() {
			return Ok(());
		}
		self.update(|entries| {
			entries.remove(key);
		})
	}
}

/// Identity persisted between `load` invocations, like a provider's
/// long-lived client persistence.
pub struct IdentityRepository {
	path: PathBuf,
}

impl IdentityRepository {
	pub fn load(&self) -> sso::Result<Option<Identity>> {
		match fs::read_to_string(&self.path) {
			Ok(content) => serde_json::from_str(&content)
				.map(Some)
				.map_err(|e| SsoError::Storage(format!("{}: {e}", self.path.display()))),
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
			Err(err) => Err(err.into()),
		}
	}

	pub fn save(&self, identity: &Identity) -> sso::Result<()> {
		write_json(&self.path, identity)
	}

	/// Removes the identity file if present.
	pub fn clear(&self) -> sso::Result<bool> {
		match fs::remove_file(&self.path) {
			Ok(()) => Ok(true),
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
			Err(err) => Err(err.into()),
		}
	}
}
