//! Suite-wide settings shared by every component of a [`SessionContext`].
//!
//! Stored as camelCase JSON; every field has a default so partial files are
//! fine and a missing file means "all defaults".
//!
//! [`SessionContext`]: crate::SessionContext

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::coordinator::DEFAULT_BOOTSTRAP_TIMEOUT;
use crate::environment::SuiteDomains;
use crate::error::{Result, SsoError};
use crate::http::AuthEndpoints;
use crate::toolkit::DEFAULT_TOOLKIT_ENDPOINT;

pub const BRIDGE_DISABLED_ENV: &str = "SSO_BRIDGE_DISABLED";
pub const TOOLKIT_API_KEY_ENV: &str = "SSO_TOOLKIT_API_KEY";

const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ToolkitConfig {
	pub endpoint: String,
	pub api_key: Option<String>,
}

impl Default for ToolkitConfig {
	fn default() -> Self {
		Self {
			endpoint: DEFAULT_TOOLKIT_ENDPOINT.to_string(),
			api_key: None,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SuiteConfig {
	pub domains: SuiteDomains,
	pub endpoints: AuthEndpoints,
	/// Soft deadline for the bootstrap request.
	pub bootstrap_timeout_ms: u64,
	/// Hard per-request timeout of the HTTP client.
	pub request_timeout_ms: u64,
	pub bridge_enabled: bool,
	pub toolkit: ToolkitConfig,
}

impl Default for SuiteConfig {
	fn default() -> Self {
		Self {
			domains: SuiteDomains::default(),
			endpoints: AuthEndpoints::default(),
			bootstrap_timeout_ms: DEFAULT_BOOTSTRAP_TIMEOUT.as_millis() as u64,
			request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
			bridge_enabled: true,
			toolkit: ToolkitConfig::default(),
		}
	}
}

impl SuiteConfig {
	/// Reads `path`, falling back to defaults when it does not exist, then
	/// applies environment overrides.
	pub fn load(path: &Path) -> Result<Self> {
		let config = match fs::read_to_string(path) {
			Ok(content) => serde_json::from_str(&content).map_err(|e| SsoError::Config(format!("{}: {e}", path.display())))?,
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
				debug!(target = "sso.config", path = %path.display(), "no config file; using defaults");
				Self::default()
			}
			Err(err) => return Err(err.into()),
		};
		Ok(config.with_env_overrides(|key| std::env::var(key).ok()))
	}

	/// Applies `SSO_BRIDGE_DISABLED` and `SSO_TOOLKIT_API_KEY` as seen by `lookup`.
	pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
		if let Some(raw) = lookup(BRIDGE_DISABLED_ENV) {
			let disabled = matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on");
			self.bridge_enabled = !disabled;
		}
		if let Some(key) = lookup(TOOLKIT_API_KEY_ENV).filter(|k| !k.is_empty()) {
			self.toolkit.api_key = Some(key);
		}
		self
	}

	pub fn bootstrap_timeout(&self) -> Duration {
		Duration::from_millis(self.bootstrap_timeout_ms)
	}

	pub fn request_timeout(&self) -> Duration {
		Duration::from_millis(self.request_timeout_ms)
	}

	pub fn save(&self, path: &Path) -> Result<()> {
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)?;
		}
		fs::write(path, serde_json::to_string_pretty(self)?)?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use std::collections::HashMap;

	use super::*;

	#[test]
	fn partial_file_keeps_defaults() {
		let config: SuiteConfig = serde_json::from_str(r#"{"bootstrapTimeoutMs": 500, "domains": {"apex": "suite.test"}}"#).unwrap();
		assert_eq!(config.bootstrap_timeout(), Duration::from_millis(500));
		assert_eq!(config.domains.apex, "suite.test");
		assert_eq!(config.endpoints, AuthEndpoints::default());
		assert!(config.bridge_enabled);
	}

	#[test]
	fn missing_file_means_defaults() {
		let config = SuiteConfig::load(Path::new("/nonexistent/suite-sso/config.json")).unwrap();
		assert_eq!(config.bootstrap_timeout_ms, 1500);
		assert_eq!(config.toolkit.endpoint, DEFAULT_TOOLKIT_ENDPOINT);
	}

	#[test]
	fn env_overrides_apply() {
		let env: HashMap<&str, &str> = HashMap::from([(BRIDGE_DISABLED_ENV, "true"), (TOOLKIT_API_KEY_ENV, "k-123")]);
		let config = SuiteConfig::default().with_env_overrides(|key| env.get(key).map(|v| v.to_string()));
		assert!(!config.bridge_enabled);
		assert_eq!(config.toolkit.api_key.as_deref(), Some("k-123"));
	}

	#[test]
	fn falsy_override_keeps_bridge_enabled() {
		let config = SuiteConfig::default().with_env_overrides(|key| (key == BRIDGE_DISABLED_ENV).then(|| "0".to_string()));
		assert!(config.bridge_enabled);
	}
}
