//! Identity provider backed by an identity-toolkit style REST endpoint
//! (`accounts:signInWithCustomToken`).

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use suite_sso_protocol::ErrorBody;
use tracing::{debug, info};
use url::Url;

use crate::error::{Result, SsoError};
use crate::identity::{Identity, IdentityProvider, Provenance, decode_jwt_claims};

pub const DEFAULT_TOOLKIT_ENDPOINT: &str = "https://identitytoolkit.googleapis.com/v1/accounts:signInWithCustomToken";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignInRequest<'a> {
	token: &'a str,
	return_secure_token: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
	id_token: String,
	#[serde(default)]
	refresh_token: Option<String>,
}

/// Tokens held after a successful sign-in.
#[derive(Debug, Clone)]
pub struct ToolkitCredential {
	pub id_token: String,
	pub refresh_token: Option<String>,
}

pub struct ToolkitIdentityProvider {
	client: Client,
	endpoint: Url,
	credential: Mutex<Option<ToolkitCredential>>,
}

impl ToolkitIdentityProvider {
	pub fn new(endpoint: &str, api_key: Option<&str>, request_timeout: Duration) -> Result<Self> {
		let mut endpoint = Url::parse(endpoint)?;
		if let Some(key) = api_key {
			endpoint.query_pairs_mut().append_pair("key", key);
		}
		let client = Client::builder()
			.timeout(request_timeout)
			.build()
			.map_err(|e| SsoError::Config(format!("Failed to create HTTP client: {e}")))?;
		Ok(Self {
			client,
			endpoint,
			credential: Mutex::new(None),
		})
	}

	pub fn credential(&self) -> Option<ToolkitCredential> {
		self.credential.lock().clone()
	}
}

#[async_trait]
impl IdentityProvider for ToolkitIdentityProvider {
	async fn sign_in_with_custom_token(&self, token: &str) -> Result<Identity> {
		let response = self
			.client
			.post(self.endpoint.clone())
			.json(&SignInRequest {
				token,
				return_secure_token: true,
			})
			.send()
			.await?;

		let status = response.status();
		let bytes = response.bytes().await?;
		if !status.is_success() {
			let message = serde_json::from_slice::<ErrorBody>(&bytes)
				.map(|body| body.error)
				.unwrap_or_else(|_| format!("HTTP {status}"));
			return Err(SsoError::SignIn(message));
		}

		let body: SignInResponse = serde_json::from_slice(&bytes).map_err(|e| SsoError::SignIn(format!("unreadable sign-in response: {e}")))?;
		let claims = decode_jwt_claims(&body.id_token)?;
		let identity = Identity::from_claims(&claims, Provenance::CustomToken)?;

		info!(target = "sso.toolkit", uid = %identity.uid, "signed in with custom token");
		*self.credential.lock() = Some(ToolkitCredential {
			id_token: body.id_token,
			refresh_token: body.refresh_token,
		});
		Ok(identity)
	}

	async fn sign_out(&self) -> Result<()> {
		if self.credential.lock().take().is_some() {
			debug!(target = "sso.toolkit", "dropped toolkit credential");
		}
		Ok(())
	}
}
