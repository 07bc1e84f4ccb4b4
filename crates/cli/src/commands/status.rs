use std::sync::Arc;

use serde::Serialize;
use sso::{DeviceSessionCache, Environment, Identity, SessionRecordStore, SessionValidation};

use super::CommandContext;
use crate::error::Result;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusData {
	pub environment: Environment,
	pub session: SessionValidation,
	pub device_session: bool,
	pub device_session_written_at_ms: Option<u64>,
	pub identity: Option<Identity>,
}

pub fn execute(ctx: &CommandContext, origin: &str) -> Result<StatusData> {
	let resolver = ctx.resolver(origin)?;
	let store = Arc::new(ctx.profile.device_store(resolver.origin()));
	let jar = Arc::new(ctx.profile.cookie_jar(&resolver.origin().host, Arc::clone(&ctx.clock)));

	let record = SessionRecordStore::new(jar, store.clone(), Arc::clone(&ctx.clock), resolver.cookie_domain());
	let cache = DeviceSessionCache::new(store, Arc::clone(&ctx.clock));
	let device_session = cache.read().is_some();

	Ok(StatusData {
		environment: resolver.environment(),
		session: record.validate(),
		device_session,
		device_session_written_at_ms: device_session.then(|| cache.written_at_millis()).flatten(),
		identity: ctx.profile.identities(resolver.origin()).load()?,
	})
}
