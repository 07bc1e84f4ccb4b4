//! Bootstrap, hub live-session and token-exchange payloads.

use serde::{Deserialize, Serialize};

use crate::types::UserSnapshot;

/// Body of the same-origin bootstrap request.
///
/// `session_cookie` is only present when the caller recovers a value from the
/// device session cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapRequest {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session_cookie: Option<String>,
}

impl BootstrapRequest {
	/// Request carrying no cached value (revalidation, or nothing cached).
	pub fn empty() -> Self {
		Self::default()
	}

	pub fn with_cached(session_cookie: Option<String>) -> Self {
		Self { session_cookie }
	}
}

/// Response to a bootstrap request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapResponse {
	pub authenticated: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session_cookie: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub custom_token: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub user: Option<UserSnapshot>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub dev_mode: Option<bool>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub source: Option<String>,
}

impl BootstrapResponse {
	pub fn unauthenticated() -> Self {
		Self::default()
	}

	/// Drops every optional field when `authenticated` is false.
	///
	/// Callers must never act on a token or snapshot attached to an
	/// unauthenticated response.
	pub fn normalized(self) -> Self {
		if self.authenticated { self } else { Self::default() }
	}

	pub fn is_dev_mode(&self) -> bool {
		self.dev_mode.unwrap_or(false)
	}
}

/// Cross-origin response from the Hub's live-session endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HubSessionResponse {
	pub authenticated: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session_cookie: Option<String>,
}

impl HubSessionResponse {
	/// Returns the hub's session value when it reports a usable session.
	pub fn live_session(&self) -> Option<&str> {
		if !self.authenticated {
			return None;
		}
		self.session_cookie.as_deref().filter(|value| !value.is_empty())
	}
}

/// Body sent to a spoke's own token-exchange endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenExchangeRequest {
	pub session_cookie: String,
}

/// Result of a token exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTokenExchange", into = "RawTokenExchange")]
pub enum TokenExchangeResponse {
	/// Production backends mint a short-lived custom token.
	Production { custom_token: String },
	/// Development backends hand the raw session value back for the device cache.
	Development { session_cookie: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTokenExchange {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	dev_mode: Option<bool>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	session_cookie: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	custom_token: Option<String>,
}

impl TryFrom<RawTokenExchange> for TokenExchangeResponse {
	type Error = String;

	fn try_from(raw: RawTokenExchange) -> Result<Self, Self::Error> {
		if raw.dev_mode.unwrap_or(false) {
			return match raw.session_cookie {
				Some(session_cookie) if !session_cookie.is_empty() => Ok(Self::Development { session_cookie }),
				_ => Err("development exchange response is missing sessionCookie".to_string()),
			};
		}

		match raw.custom_token {
			Some(custom_token) if !custom_token.is_empty() => Ok(Self::Production { custom_token }),
			_ => Err("exchange response carries neither customToken nor a development session".to_string()),
		}
	}
}

impl From<TokenExchangeResponse> for RawTokenExchange {
	fn from(response: TokenExchangeResponse) -> Self {
		match response {
			TokenExchangeResponse::Production { custom_token } => Self {
				custom_token: Some(custom_token),
				..Self::default()
			},
			TokenExchangeResponse::Development { session_cookie } => Self {
				dev_mode: Some(true),
				session_cookie: Some(session_cookie),
				custom_token: None,
			},
		}
	}
}
