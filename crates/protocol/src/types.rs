//! Shared payload types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Snapshot of the signed-in user as reported by a bootstrap response.
///
/// Only `uid` is required; anything the backend adds beyond the known fields
/// is preserved in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSnapshot {
	pub uid: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub email: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub display_name: Option<String>,
	#[serde(default, rename = "photoURL", skip_serializing_if = "Option::is_none")]
	pub photo_url: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub email_verified: Option<bool>,
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}

impl UserSnapshot {
	pub fn new(uid: impl Into<String>) -> Self {
		Self {
			uid: uid.into(),
			email: None,
			display_name: None,
			photo_url: None,
			email_verified: None,
			extra: Map::new(),
		}
	}

	pub fn with_email(mut self, email: impl Into<String>) -> Self {
		self.email = Some(email.into());
		self
	}

	pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
		self.display_name = Some(name.into());
		self
	}
}

/// JSON error body returned by the auth endpoints on non-2xx responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
	pub error: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub code: Option<String>,
}
