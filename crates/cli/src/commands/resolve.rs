use serde::Serialize;
use sso::Environment;

use super::CommandContext;
use crate::error::Result;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveData {
	pub origin: String,
	pub environment: Environment,
	pub hub_base_url: String,
	pub is_hub: bool,
	pub cookie_domain: Option<String>,
}

pub fn execute(ctx: &CommandContext, origin: &str) -> Result<ResolveData> {
	let resolver = ctx.resolver(origin)?;
	Ok(ResolveData {
		origin: resolver.origin().to_string(),
		environment: resolver.environment(),
		hub_base_url: resolver.resolve_hub_base_url(),
		is_hub: resolver.is_hub(),
		cookie_domain: resolver.cookie_domain(),
	})
}
