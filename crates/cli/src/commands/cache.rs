use std::sync::Arc;

use serde::Serialize;
use sso::{DEVICE_SESSION_TTL, DeviceSessionCache};
use tracing::info;

use super::CommandContext;
use crate::error::Result;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheView {
	pub value: Option<String>,
	pub written_at_ms: Option<u64>,
	pub age_secs: Option<u64>,
	pub ttl_secs: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheCleared {
	pub cleared: bool,
}

fn cache_for(ctx: &CommandContext, origin: &str) -> Result<DeviceSessionCache> {
	let resolver = ctx.resolver(origin)?;
	let store = Arc::new(ctx.profile.device_store(resolver.origin()));
	Ok(DeviceSessionCache::new(store, Arc::clone(&ctx.clock)))
}

/// Reads the cache, which purges a stale entry as a side effect.
pub fn show(ctx: &CommandContext, origin: &str) -> Result<CacheView> {
	let cache = cache_for(ctx, origin)?;
	let value = cache.read();
	let written_at_ms = value.as_ref().and_then(|_| cache.written_at_millis());
	let now = ctx.clock.now_millis();
	Ok(CacheView {
		value,
		written_at_ms,
		age_secs: written_at_ms.map(|at| now.saturating_sub(at) / 1000),
		ttl_secs: DEVICE_SESSION_TTL.as_secs(),
	})
}

pub fn clear(ctx: &CommandContext, origin: &str) -> Result<CacheCleared> {
	let cache = cache_for(ctx, origin)?;
	let cleared = cache.written_at_millis().is_some() || cache.read().is_some();
	cache.clear()?;
	info!(target = "sso.cli", %origin, cleared, "device session cleared");
	Ok(CacheCleared { cleared })
}
