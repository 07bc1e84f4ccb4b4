//! reqwest-backed [`SessionTransport`].
//!
//! Requests carry the cookies the given jar would attach in a browser:
//! same-origin calls send the page host's cookies, the hub query sends the
//! hub host's cookies (credentialed cross-origin request).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, COOKIE};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use suite_sso_protocol::{BootstrapRequest, BootstrapResponse, ErrorBody, HubSessionResponse, TokenExchangeRequest, TokenExchangeResponse};
use tracing::debug;
use url::Url;

use crate::error::{Result, SsoError};
use crate::storage::CookieJar;
use crate::transport::SessionTransport;

/// Paths of the auth endpoints, relative to an app or hub origin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthEndpoints {
	pub bootstrap: String,
	pub hub_session: String,
	pub exchange: String,
}

impl Default for AuthEndpoints {
	fn default() -> Self {
		Self {
			bootstrap: "/api/auth/bootstrap".to_string(),
			hub_session: "/api/auth/session".to_string(),
			exchange: "/api/auth/exchange".to_string(),
		}
	}
}

pub struct HttpTransport {
	client: Client,
	origin: Url,
	endpoints: AuthEndpoints,
	cookies: Option<Arc<dyn CookieJar>>,
}

impl HttpTransport {
	/// Creates a transport for the app served at `origin`.
	pub fn new(origin: &str, endpoints: AuthEndpoints, request_timeout: Duration) -> Result<Self> {
		let client = Client::builder()
			.timeout(request_timeout)
			.build()
			.map_err(|e| SsoError::Config(format!("Failed to create HTTP client: {e}")))?;
		Ok(Self {
			client,
			origin: Url::parse(origin)?,
			endpoints,
			cookies: None,
		})
	}

	/// Attaches cookies from `jar` the way a browser would.
	pub fn with_cookies(mut self, jar: Arc<dyn CookieJar>) -> Self {
		self.cookies = Some(jar);
		self
	}

	fn credentialed(&self, builder: RequestBuilder, url: &Url) -> RequestBuilder {
		let header = url
			.host_str()
			.and_then(|host| self.cookies.as_ref().and_then(|jar| jar.header_for(host)));
		match header {
			Some(header) => builder.header(COOKIE, header),
			None => builder,
		}
	}

	async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
		let url = self.origin.join(path)?;
		debug!(target = "sso.http", %url, "POST");
		let request = self
			.client
			.post(url.clone())
			.header(CONTENT_TYPE, "application/json")
			.body(serde_json::to_vec(body)?);
		let response = self.credentialed(request, &url).send().await?;
		decode(url.path(), response).await
	}
}

async fn decode<T: DeserializeOwned>(endpoint: &str, response: Response) -> Result<T> {
	let status = response.status();
	let bytes = response.bytes().await?;

	if !status.is_success() {
		let message = serde_json::from_slice::<ErrorBody>(&bytes)
			.map(|body| body.error)
			.unwrap_or_else(|_| String::from_utf8_lossy(&bytes).chars().take(200).collect());
		return Err(SsoError::Status {
			endpoint: endpoint.to_string(),
			status: status.as_u16(),
			message,
		});
	}

	serde_json::from_slice(&bytes).map_err(|e| SsoError::Decode(format!("{endpoint}: {e}")))
}

#[async_trait]
impl SessionTransport for HttpTransport {
	async fn bootstrap(&self, request: &BootstrapRequest) -> Result<BootstrapResponse> {
		self.post_json(&self.endpoints.bootstrap, request).await
	}

	async fn hub_session(&self, hub_base_url: &str) -> Result<HubSessionResponse> {
		let url = Url::parse(hub_base_url)?.join(&self.endpoints.hub_session)?;
		debug!(target = "sso.http", %url, "GET");
		let request = self.client.get(url.clone());
		let response = self.credentialed(request, &url).send().await?;
		decode(url.path(), response).await
	}

	async fn exchange(&self, request: &TokenExchangeRequest) -> Result<TokenExchangeResponse> {
		self.post_json(&self.endpoints.exchange, request).await
	}
}
