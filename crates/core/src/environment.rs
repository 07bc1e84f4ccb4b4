//! Hub/spoke classification from the current origin.
//!
//! Everything here is a pure function of the origin's host and port plus the
//! fixed [`SuiteDomains`]; no other component repeats this hostname logic.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, SsoError};

const LOOPBACK_HOSTS: &[&str] = &["localhost", "127.0.0.1", "[::1]"];

/// Fixed hostnames of the suite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SuiteDomains {
	/// Apex suite domain; it and its `www` alias are the Auth Hub.
	pub apex: String,
	/// Canonical production hub base URL.
	pub production_hub: String,
	/// Port the hub listens on during local development.
	pub local_hub_port: u16,
}

impl Default for SuiteDomains {
	fn default() -> Self {
		Self {
			apex: "app.example.com".to_string(),
			production_hub: "https://app.example.com".to_string(),
			local_hub_port: 3000,
		}
	}
}

impl SuiteDomains {
	pub fn local_hub(&self) -> String {
		format!("http://localhost:{}", self.local_hub_port)
	}

	fn www_alias(&self) -> String {
		format!("www.{}", self.apex)
	}
}

/// Deployment topology the origin belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
	/// Loopback host; every app on its own port, no cookie sharing.
	Local,
	/// Apex suite domain or one of its subdomains.
	Production,
	/// Any other host, e.g. a preview deployment.
	Preview,
}

impl fmt::Display for Environment {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Environment::Local => write!(f, "local"),
			Environment::Production => write!(f, "production"),
			Environment::Preview => write!(f, "preview"),
		}
	}
}

/// Origin of the page being loaded: scheme, host and port only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
	pub scheme: String,
	pub host: String,
	pub port: Option<u16>,
}

impl Origin {
	pub fn parse(input: &str) -> Result<Self> {
		let url = Url::parse(input)?;
		let host = url
			.host_str()
			.ok_or_else(|| SsoError::Config(format!("origin has no host: {input}")))?
			.to_ascii_lowercase();
		Ok(Self {
			scheme: url.scheme().to_string(),
			host,
			port: url.port(),
		})
	}

	/// Port in effect, falling back to the scheme default.
	pub fn effective_port(&self) -> Option<u16> {
		self.port.or(match self.scheme.as_str() {
			"http" => Some(80),
			"https" => Some(443),
			_ => None,
		})
	}

	pub fn is_loopback(&self) -> bool {
		LOOPBACK_HOSTS.contains(&self.host.as_str())
	}
}

impl fmt::Display for Origin {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.port {
			Some(port) => write!(f, "{}://{}:{}", self.scheme, self.host, port),
			None => write!(f, "{}://{}", self.scheme, self.host),
		}
	}
}

#[derive(Debug, Clone)]
pub struct EnvironmentResolver {
	origin: Origin,
	domains: SuiteDomains,
}

impl EnvironmentResolver {
	pub fn new(origin: Origin, domains: SuiteDomains) -> Self {
		Self { origin, domains }
	}

	pub fn from_url(origin: &str, domains: SuiteDomains) -> Result<Self> {
		Ok(Self::new(Origin::parse(origin)?, domains))
	}

	pub fn origin(&self) -> &Origin {
		&self.origin
	}

	pub fn domains(&self) -> &SuiteDomains {
		&self.domains
	}

	pub fn environment(&self) -> Environment {
		if self.origin.is_loopback() {
			Environment::Local
		} else if self.is_suite_host() {
			Environment::Production
		} else {
			Environment::Preview
		}
	}

	pub fn is_production(&self) -> bool {
		self.environment() == Environment::Production
	}

	/// Base URL of the Auth Hub as seen from this origin.
	pub fn resolve_hub_base_url(&self) -> String {
		if self.origin.is_loopback() {
			return self.domains.local_hub();
		}
		if self.is_apex_or_alias() {
			return self.origin.to_string();
		}
		// Suite subdomains and unrecognised preview hosts both defer to production.
		self.domains.production_hub.trim_end_matches('/').to_string()
	}

	pub fn is_hub(&self) -> bool {
		if self.origin.is_loopback() {
			return self.origin.effective_port() == Some(self.domains.local_hub_port);
		}
		self.is_apex_or_alias()
	}

	/// Parent domain for the shared session cookie, `None` where it cannot be shared.
	pub fn cookie_domain(&self) -> Option<String> {
		self.is_suite_host().then(|| format!(".{}", self.domains.apex))
	}

	fn is_apex_or_alias(&self) -> bool {
		let host = self.origin.host.as_str();
		host == self.domains.apex || host == self.domains.www_alias()
	}

	fn is_suite_host(&self) -> bool {
		let host = self.origin.host.as_str();
		host == self.domains.apex || host.ends_with(&format!(".{}", self.domains.apex))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn resolver(origin: &str) -> EnvironmentResolver {
		EnvironmentResolver::from_url(origin, SuiteDomains::default()).unwrap()
	}

	#[test]
	fn apex_and_www_alias_are_the_hub() {
		for origin in ["https://app.example.com", "https://www.app.example.com"] {
			let env = resolver(origin);
			assert!(env.is_hub(), "{origin} should be the hub");
			assert_eq!(env.resolve_hub_base_url(), origin);
			assert_eq!(env.environment(), Environment::Production);
		}
	}

	#[test]
	fn suite_subdomain_is_a_spoke() {
		let env = resolver("https://notes.app.example.com");
		assert!(!env.is_hub());
		assert_eq!(env.resolve_hub_base_url(), "https://app.example.com");
		assert_eq!(env.cookie_domain().as_deref(), Some(".app.example.com"));
	}

	#[test]
	fn preview_host_falls_back_to_production_hub() {
		let env = resolver("https://notes-git-feature.vercel.app");
		assert!(!env.is_hub());
		assert_eq!(env.environment(), Environment::Preview);
		assert_eq!(env.resolve_hub_base_url(), "https://app.example.com");
		assert_eq!(env.cookie_domain(), None);
	}

	#[test]
	fn lookalike_host_is_not_suite() {
		let env = resolver("https://evilapp.example.com");
		assert_eq!(env.environment(), Environment::Preview);
		assert!(!env.is_hub());
	}

	#[test]
	fn loopback_hub_is_decided_by_port() {
		let hub = resolver("http://localhost:3000");
		assert!(hub.is_hub());
		assert_eq!(hub.resolve_hub_base_url(), "http://localhost:3000");

		let spoke = resolver("http://127.0.0.1:3001");
		assert!(!spoke.is_hub());
		assert_eq!(spoke.resolve_hub_base_url(), "http://localhost:3000");
		assert_eq!(spoke.environment(), Environment::Local);
		assert_eq!(spoke.cookie_domain(), None);

		assert!(!resolver("http://localhost").is_hub());
		assert!(resolver("http://[::1]:3000").is_hub());
	}

	#[test]
	fn custom_domains_are_honoured() {
		let domains = SuiteDomains {
			apex: "suite.test".into(),
			production_hub: "https://suite.test/".into(),
			local_hub_port: 4000,
		};
		let env = EnvironmentResolver::from_url("https://habits.suite.test", domains.clone()).unwrap();
		assert_eq!(env.resolve_hub_base_url(), "https://suite.test");
		assert!(EnvironmentResolver::from_url("http://localhost:4000", domains).unwrap().is_hub());
	}

	#[test]
	fn origin_display_round_trips() {
		let origin = Origin::parse("HTTP://LocalHost:3001/some/path").unwrap();
		assert_eq!(origin.to_string(), "http://localhost:3001");
		assert_eq!(Origin::parse("https://app.example.com").unwrap().effective_port(), Some(443));
	}
}
