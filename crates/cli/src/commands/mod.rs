//! Command implementations.
//!
//! Every command works on one origin and returns its payload as JSON; the
//! binary wraps it in the result envelope.

mod cache;
mod load;
mod resolve;
mod sign_out;
mod status;

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use sso::{AuthState, Clock, EnvironmentResolver, SessionContext, SuiteConfig, SystemClock};
use tracing::debug;

use crate::cli::{CacheAction, Cli, Commands};
use crate::error::{CliError, Result};
use crate::profile::{IdentityRepository, ProfileStore};

/// Configuration and profile shared by every command of one invocation.
pub struct CommandContext {
	pub config: SuiteConfig,
	pub profile: ProfileStore,
	pub clock: Arc<dyn Clock>,
}

impl CommandContext {
	pub fn new(config: SuiteConfig, profile: ProfileStore) -> Self {
		Self {
			config,
			profile,
			clock: Arc::new(SystemClock),
		}
	}

	/// Loads `--config` (or the default config file) and opens `--profile`.
	pub fn from_cli(cli: &Cli) -> Result<Self> {
		let config_path = match &cli.config {
			Some(path) => path.clone(),
			None => default_config_path()?,
		};
		let config = SuiteConfig::load(&config_path)?;
		let profile = ProfileStore::new(match &cli.profile {
			Some(dir) => dir.clone(),
			None => ProfileStore::default_root()?,
		});
		debug!(target = "sso.cli", config = %config_path.display(), profile = %profile.root().display(), "command context ready");
		Ok(Self::new(config, profile))
	}

	pub fn resolver(&self, origin: &str) -> Result<EnvironmentResolver> {
		EnvironmentResolver::from_url(origin, self.config.domains.clone()).map_err(|err| CliError::InvalidOrigin {
			origin: origin.to_string(),
			reason: err.to_string(),
		})
	}

	/// Session components of one page of `origin`, backed by the profile.
	pub fn page(&self, origin: &str, config: SuiteConfig) -> Result<(SessionContext, IdentityRepository)> {
		let resolver = self.resolver(origin)?;
		let identities = self.profile.identities(resolver.origin());
		let auth = match identities.load()? {
			Some(identity) => AuthState::restored(identity),
			None => AuthState::new(),
		};
		let jar = self.profile.cookie_jar(&resolver.origin().host, Arc::clone(&self.clock));
		let store = self.profile.device_store(resolver.origin());

		let context = SessionContext::builder(resolver)
			.with_config(config)
			.with_clock(Arc::clone(&self.clock))
			.with_cookie_jar(Arc::new(jar))
			.with_device_store(Arc::new(store))
			.with_auth_state(auth)
			.build()?;
		Ok((context, identities))
	}
}

/// `<config dir>/suite-sso/config.json`.
pub fn default_config_path() -> Result<PathBuf> {
	dirs::config_dir()
		.map(|dir| dir.join("suite-sso").join("config.json"))
		.ok_or(CliError::NoHomeDir)
}

fn to_json<T: Serialize>(data: &T) -> Result<serde_json::Value> {
	Ok(serde_json::to_value(data)?)
}

pub async fn dispatch(command: Commands, ctx: &CommandContext) -> Result<serde_json::Value> {
	match command {
		Commands::Load {
			origin,
			timeout_ms,
			no_bridge,
		} => to_json(&load::execute(ctx, &origin, timeout_ms, no_bridge).await?),
		Commands::Status { origin } => to_json(&status::execute(ctx, &origin)?),
		Commands::Resolve { origin } => to_json(&resolve::execute(ctx, &origin)?),
		Commands::Cache { action } => match action {
			CacheAction::Show { origin } => to_json(&cache::show(ctx, &origin)?),
			CacheAction::Clear { origin } => to_json(&cache::clear(ctx, &origin)?),
		},
		Commands::SignOut { origin } => to_json(&sign_out::execute(ctx, &origin).await?),
	}
}
