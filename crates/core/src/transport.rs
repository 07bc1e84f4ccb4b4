//! Network port used by the coordinator and the bridge.
//!
//! These three calls are the only suspension points of the protocol besides
//! the bootstrap timer.

use async_trait::async_trait;
use suite_sso_protocol::{BootstrapRequest, BootstrapResponse, HubSessionResponse, TokenExchangeRequest, TokenExchangeResponse};

use crate::error::Result;

#[async_trait]
pub trait SessionTransport: Send + Sync {
	/// Same-origin bootstrap request.
	async fn bootstrap(&self, request: &BootstrapRequest) -> Result<BootstrapResponse>;

	/// Cross-origin, credentialed query of the hub's live session.
	async fn hub_session(&self, hub_base_url: &str) -> Result<HubSessionResponse>;

	/// Same-origin exchange of a hub session value for a local credential.
	async fn exchange(&self, request: &TokenExchangeRequest) -> Result<TokenExchangeResponse>;
}
