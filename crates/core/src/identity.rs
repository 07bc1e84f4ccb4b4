//! Locally hydrated identity and the identity-provider port.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use suite_sso_protocol::UserSnapshot;
use tokio::sync::watch;

use crate::error::{Result, SsoError};

/// How an identity reached this page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
	/// `user` snapshot attached to a development bootstrap response.
	Snapshot,
	/// Development session cookie, from its claims or a digest of its value.
	SessionCookie,
	/// Custom-token sign-in with the identity provider.
	CustomToken,
	/// Restored from long-lived client persistence before bootstrap ran.
	Restored,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
	pub uid: String,
	#[serde(default)]
	pub email: Option<String>,
	#[serde(default)]
	pub display_name: Option<String>,
	pub provenance: Provenance,
}

impl Identity {
	pub fn new(uid: impl Into<String>, provenance: Provenance) -> Self {
		Self {
			uid: uid.into(),
			email: None,
			display_name: None,
			provenance,
		}
	}

	pub fn from_snapshot(user: &UserSnapshot) -> Self {
		Self {
			uid: user.uid.clone(),
			email: user.email.clone(),
			display_name: user.display_name.clone(),
			provenance: Provenance::Snapshot,
		}
	}

	/// Reads identity claims from a session cookie without verifying it.
	///
	/// Session cookies are JWTs signed by the identity provider; the backend
	/// already verified this one before handing it back.
	pub fn from_session_cookie(cookie: &str) -> Result<Self> {
		let claims = decode_jwt_claims(cookie)?;
		Self::from_claims(&claims, Provenance::SessionCookie)
	}

	/// Identity for a session cookie whose value is opaque to the client.
	///
	/// The uid is a stable digest of the cookie, so the raw session value
	/// never shows up in logs or persisted identities.
	pub fn from_opaque_session(cookie: &str) -> Self {
		let mut hasher = DefaultHasher::new();
		cookie.hash(&mut hasher);
		Self::new(format!("session-{:016x}", hasher.finish()), Provenance::SessionCookie)
	}

	pub(crate) fn from_claims(claims: &Value, provenance: Provenance) -> Result<Self> {
		let uid = ["user_id", "sub", "uid"]
			.iter()
			.find_map(|key| claims.get(key).and_then(Value::as_str))
			.filter(|uid| !uid.is_empty())
			.ok_or_else(|| SsoError::Decode("token carries no subject claim".into()))?;

		Ok(Self {
			uid: uid.to_string(),
			email: claims.get("email").and_then(Value::as_str).map(String::from),
			display_name: claims.get("name").and_then(Value::as_str).map(String::from),
			provenance,
		})
	}
}

/// Decodes the payload segment of a compact JWT.
pub fn decode_jwt_claims(token: &str) -> Result<Value> {
	let mut parts = token.split('.');
	let payload = match (parts.next(), parts.next(), parts.next(), parts.next()) {
		(Some(_), Some(payload), Some(_), None) => payload,
		_ => return Err(SsoError::Decode("token is not a compact JWT".into())),
	};
	let bytes = URL_SAFE_NO_PAD
		.decode(payload.trim_end_matches('='))
		.map_err(|e| SsoError::Decode(format!("token payload is not base64url: {e}")))?;
	let claims: Value = serde_json::from_slice(&bytes)?;
	if !claims.is_object() {
		return Err(SsoError::Decode("token payload is not a JSON object".into()));
	}
	Ok(claims)
}

/// Identity provider operations the protocol depends on.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
	/// Exchanges a short-lived custom token for a local sign-in.
	async fn sign_in_with_custom_token(&self, token: &str) -> Result<Identity>;

	/// Drops the provider-side local credential.
	async fn sign_out(&self) -> Result<()>;
}

/// The identity currently hydrated on this page, with change notification.
#[derive(Debug, Clone)]
pub struct AuthState {
	tx: Arc<watch::Sender<Option<Identity>>>,
}

impl Default for AuthState {
	fn default() -> Self {
		Self::new()
	}
}

impl AuthState {
	pub fn new() -> Self {
		let (tx, _rx) = watch::channel(None);
		Self { tx: Arc::new(tx) }
	}

	/// State restored from long-lived persistence.
	pub fn restored(identity: Identity) -> Self {
		let state = Self::new();
		state.hydrate(Identity {
			provenance: Provenance::Restored,
			..identity
		});
		state
	}

	pub fn current(&self) -> Option<Identity> {
		self.tx.borrow().clone()
	}

	pub fn is_hydrated(&self) -> bool {
		self.tx.borrow().is_some()
	}

	pub fn hydrate(&self, identity: Identity) {
		self.tx.send_replace(Some(identity));
	}

	/// Clears the identity, returning what was hydrated.
	pub fn clear(&self) -> Option<Identity> {
		self.tx.send_replace(None)
	}

	pub fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
		self.tx.subscribe()
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	fn jwt(claims: Value) -> String {
		let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
		let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
		format!("{header}.{payload}.signature")
	}

	#[test]
	fn session_cookie_claims_hydrate_identity() {
		let cookie = jwt(json!({ "sub": "u-42", "email": "ada@example.com", "name": "Ada" }));
		let identity = Identity::from_session_cookie(&cookie).unwrap();
		assert_eq!(identity.uid, "u-42");
		assert_eq!(identity.email.as_deref(), Some("ada@example.com"));
		assert_eq!(identity.display_name.as_deref(), Some("Ada"));
		assert_eq!(identity.provenance, Provenance::SessionCookie);
	}

	#[test]
	fn user_id_claim_wins_over_sub() {
		let cookie = jwt(json!({ "user_id": "firebase-uid", "sub": "other" }));
		assert_eq!(Identity::from_session_cookie(&cookie).unwrap().uid, "firebase-uid");
	}

	#[test]
	fn opaque_cookie_is_rejected() {
		assert!(matches!(Identity::from_session_cookie("abc"), Err(SsoError::Decode(_))));
		let no_subject = jwt(json!({ "email": "x@example.com" }));
		assert!(Identity::from_session_cookie(&no_subject).is_err());
	}

	#[test]
	fn opaque_session_identity_is_stable_and_hides_the_cookie() {
		let first = Identity::from_opaque_session("abc");
		assert_eq!(first, Identity::from_opaque_session("abc"));
		assert_ne!(first.uid, Identity::from_opaque_session("abd").uid);
		assert!(first.uid.starts_with("session-"));
		assert_eq!(first.uid.len(), "session-".len() + 16);
		assert_eq!(first.provenance, Provenance::SessionCookie);
	}

	#[test]
	fn auth_state_notifies_subscribers() {
		let state = AuthState::new();
		let rx = state.subscribe();
		state.hydrate(Identity::new("u-1", Provenance::CustomToken));
		assert!(rx.has_changed().unwrap());
		assert_eq!(rx.borrow().as_ref().map(|i| i.uid.as_str()), Some("u-1"));

		let cleared = state.clear();
		assert_eq!(cleared.map(|i| i.uid), Some("u-1".to_string()));
		assert!(!state.is_hydrated());
	}

	#[test]
	fn restored_state_marks_provenance() {
		let state = AuthState::restored(Identity::new("u-1", Provenance::CustomToken));
		assert_eq!(state.current().unwrap().provenance, Provenance::Restored);
	}
}
