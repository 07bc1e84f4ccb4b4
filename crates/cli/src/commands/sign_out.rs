use serde::Serialize;
use tracing::info;

use super::CommandContext;
use crate::error::Result;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignOutData {
	pub signed_out: bool,
	pub uid: Option<String>,
}

pub async fn execute(ctx: &CommandContext, origin: &str) -> Result<SignOutData> {
	let (page, identities) = ctx.page(origin, ctx.config.clone())?;
	let uid = page.auth().current().map(|identity| identity.uid);

	page.sign_out().await?;
	identities.clear()?;
	info!(target = "sso.cli", %origin, uid = ?uid, "signed out");

	Ok(SignOutData { signed_out: true, uid })
}
