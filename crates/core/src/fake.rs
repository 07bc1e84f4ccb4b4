//! Scripted fakes of the network ports for testing without a backend.
//!
//! # Example
//!
//! ```ignore
//! let transport = FakeTransport::new();
//! transport.respond_bootstrap(BootstrapResponse::unauthenticated());
//! transport.set_bootstrap_delay(Duration::from_secs(5));
//!
//! let outcome = coordinator.run().await;
//! assert_eq!(transport.bootstrap_requests().len(), 1);
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use suite_sso_protocol::{BootstrapRequest, BootstrapResponse, HubSessionResponse, TokenExchangeRequest, TokenExchangeResponse};

use crate::error::{Result, SsoError};
use crate::identity::{Identity, IdentityProvider, Provenance};
use crate::transport::SessionTransport;

type Reply<T> = std::result::Result<T, String>;

/// A request the fake transport has seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeCall {
	Bootstrap(BootstrapRequest),
	HubSession(String),
	Exchange(TokenExchangeRequest),
}

struct TransportScript {
	queued_bootstrap: VecDeque<Reply<BootstrapResponse>>,
	bootstrap: Reply<BootstrapResponse>,
	bootstrap_delay: Duration,
	hub: Reply<HubSessionResponse>,
	hub_delay: Duration,
	exchange: Reply<TokenExchangeResponse>,
	calls: Vec<FakeCall>,
	completed_bootstraps: usize,
}

impl Default for TransportScript {
	fn default() -> Self {
		Self {
			queued_bootstrap: VecDeque::new(),
			bootstrap: Ok(BootstrapResponse::unauthenticated()),
			bootstrap_delay: Duration::ZERO,
			hub: Ok(HubSessionResponse::default()),
			hub_delay: Duration::ZERO,
			exchange: Err("no exchange scripted".to_string()),
			calls: Vec::new(),
			completed_bootstraps: 0,
		}
	}
}

/// In-memory [`SessionTransport`]; clones share the script and call log.
///
/// Bootstrap replies come from the queue first, then from the standing reply.
#[derive(Clone, Default)]
pub struct FakeTransport {
	script: Arc<Mutex<TransportScript>>,
}

impl FakeTransport {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn respond_bootstrap(&self, response: BootstrapResponse) {
		self.script.lock().bootstrap = Ok(response);
	}

	pub fn fail_bootstrap(&self, message: &str) {
		self.script.lock().bootstrap = Err(message.to_string());
	}

	/// One-shot reply consumed by the next bootstrap call.
	pub fn queue_bootstrap(&self, response: BootstrapResponse) {
		self.script.lock().queued_bootstrap.push_back(Ok(response));
	}

	/// Delay before every bootstrap reply; combine with paused tokio time.
	pub fn set_bootstrap_delay(&self, delay: Duration) {
		self.script.lock().bootstrap_delay = delay;
	}

	pub fn respond_hub(&self, response: HubSessionResponse) {
		self.script.lock().hub = Ok(response);
	}

	pub fn fail_hub(&self, message: &str) {
		self.script.lock().hub = Err(message.to_string());
	}

	/// Delay before every hub session reply.
	pub fn set_hub_delay(&self, delay: Duration) {
		self.script.lock().hub_delay = delay;
	}

	pub fn respond_exchange(&self, response: TokenExchangeResponse) {
		self.script.lock().exchange = Ok(response);
	}

	pub fn fail_exchange(&self, message: &str) {
		self.script.lock().exchange = Err(message.to_string());
	}

	pub fn calls(&self) -> Vec<FakeCall> {
		self.script.lock().calls.clone()
	}

	pub fn bootstrap_requests(&self) -> Vec<BootstrapRequest> {
		self.calls()
			.into_iter()
			.filter_map(|call| match call {
				FakeCall::Bootstrap(request) => Some(request),
				_ => None,
			})
			.collect()
	}

	/// Bootstrap calls that ran to the end, i.e. were not dropped mid-delay.
	pub fn completed_bootstraps(&self) -> usize {
		self.script.lock().completed_bootstraps
	}
}

fn replay<T: Clone>(reply: &Reply<T>) -> Result<T> {
	reply.clone().map_err(SsoError::Transport)
}

#[async_trait]
impl SessionTransport for FakeTransport {
	async fn bootstrap(&self, request: &BootstrapRequest) -> Result<BootstrapResponse> {
		let (reply, delay) = {
			let mut script = self.script.lock();
			script.calls.push(FakeCall::Bootstrap(request.clone()));
			let reply = match script.queued_bootstrap.pop_front() {
				Some(reply) => reply,
				None => script.bootstrap.clone(),
			};
			(reply, script.bootstrap_delay)
		};
		if !delay.is_zero() {
			tokio::time::sleep(delay).await;
		}
		self.script.lock().completed_bootstraps += 1;
		replay(&reply)
	}

	async fn hub_session(&self, hub_base_url: &str) -> Result<HubSessionResponse> {
		let (reply, delay) = {
			let mut script = self.script.lock();
			script.calls.push(FakeCall::HubSession(hub_base_url.to_string()));
			(script.hub.clone(), script.hub_delay)
		};
		if !delay.is_zero() {
			tokio::time::sleep(delay).await;
		}
		replay(&reply)
	}

	async fn exchange(&self, request: &TokenExchangeRequest) -> Result<TokenExchangeResponse> {
		let mut script = self.script.lock();
		script.calls.push(FakeCall::Exchange(request.clone()));
		replay(&script.exchange)
	}
}

#[derive(Default)]
struct ProviderScript {
	identities: HashMap<String, Identity>,
	accept_any: bool,
	sign_in_delay: Duration,
	signed_in: Option<Identity>,
	sign_in_calls: Vec<String>,
	sign_out_calls: usize,
}

/// In-memory [`IdentityProvider`] that accepts only the tokens it was given.
#[derive(Clone, Default)]
pub struct FakeIdentityProvider {
	script: Arc<Mutex<ProviderScript>>,
}

impl FakeIdentityProvider {
	pub fn new() -> Self {
		Self::default()
	}

	/// Accepts every token, using the token itself as the uid.
	pub fn accepting_any() -> Self {
		let provider = Self::new();
		provider.script.lock().accept_any = true;
		provider
	}

	/// Accepts `token`, signing in as `uid`.
	pub fn accept(&self, token: &str, uid: &str) {
		self.script
			.lock()
			.identities
			.insert(token.to_string(), Identity::new(uid, Provenance::CustomToken));
	}

	pub fn set_sign_in_delay(&self, delay: Duration) {
		self.script.lock().sign_in_delay = delay;
	}

	pub fn signed_in(&self) -> Option<Identity> {
		self.script.lock().signed_in.clone()
	}

	pub fn sign_in_calls(&self) -> Vec<String> {
		self.script.lock().sign_in_calls.clone()
	}

	pub fn sign_out_calls(&self) -> usize {
		self.script.lock().sign_out_calls
	}
}

#[async_trait]
impl IdentityProvider for FakeIdentityProvider {
	async fn sign_in_with_custom_token(&self, token: &str) -> Result<Identity> {
		let delay = {
			let mut script = self.script.lock();
			script.sign_in_calls.push(token.to_string());
			script.sign_in_delay
		};
		if !delay.is_zero() {
			tokio::time::sleep(delay).await;
		}

		let mut script = self.script.lock();
		let identity = match script.identities.get(token) {
			Some(identity) => identity.clone(),
			None if script.accept_any => Identity::new(token, Provenance::CustomToken),
			None => return Err(SsoError::SignIn(format!("custom token rejected: {token}"))),
		};
		script.signed_in = Some(identity.clone());
		Ok(identity)
	}

	async fn sign_out(&self) -> Result<()> {
		let mut script = self.script.lock();
		script.sign_out_calls += 1;
		script.signed_in = None;
		Ok(())
	}
}
