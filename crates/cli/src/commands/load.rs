use serde::Serialize;
use sso::{Environment, PageLoadReport};
use tracing::info;

use super::CommandContext;
use crate::error::Result;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadData {
	pub environment: Environment,
	pub hub: String,
	#[serde(flatten)]
	pub report: PageLoadReport,
}

/// Runs one page load of `origin` and persists the resulting identity.
pub async fn execute(ctx: &CommandContext, origin: &str, timeout_ms: Option<u64>, no_bridge: bool) -> Result<LoadData> {
	let mut config = ctx.config.clone();
	if let Some(ms) = timeout_ms {
		config.bootstrap_timeout_ms = ms;
	}
	if no_bridge {
		config.bridge_enabled = false;
	}

	let (page, identities) = ctx.page(origin, config)?;
	let report = page.on_page_load().await;

	match &report.identity {
		Some(identity) => identities.save(identity)?,
		None => {
			identities.clear()?;
		}
	}
	info!(target = "sso.cli", %origin, authenticated = report.identity.is_some(), "page load persisted");

	Ok(LoadData {
		environment: page.resolver().environment(),
		hub: page.resolver().resolve_hub_base_url(),
		report,
	})
}
