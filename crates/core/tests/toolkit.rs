//! `ToolkitIdentityProvider` against a local sign-in endpoint.

use std::collections::HashMap;
use std::time::Duration;

use axum::extract::Query;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Value, json};
use sso::{IdentityProvider, Provenance, SsoError, ToolkitIdentityProvider};
use tokio::net::TcpListener;

fn id_token(claims: Value) -> String {
	let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256"}"#);
	format!("{header}.{}.sig", URL_SAFE_NO_PAD.encode(claims.to_string()))
}

async fn sign_in(Query(query): Query<HashMap<String, String>>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
	if query.get("key").map(String::as_str) != Some("test-key") {
		return (StatusCode::FORBIDDEN, Json(json!({ "error": "missing api key" })));
	}
	match body["token"].as_str() {
		Some("ct-good") if body["returnSecureToken"] == json!(true) => (
			StatusCode::OK,
			Json(json!({
				"idToken": id_token(json!({ "user_id": "u-5", "email": "grace@example.com" })),
				"refreshToken": "refresh-5"
			})),
		),
		_ => (StatusCode::BAD_REQUEST, Json(json!({ "error": "INVALID_CUSTOM_TOKEN" }))),
	}
}

async fn endpoint() -> String {
	let app = Router::new().route("/v1/signInWithCustomToken", post(sign_in));
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	tokio::spawn(async move {
		axum::serve(listener, app).await.unwrap();
	});
	format!("http://{addr}/v1/signInWithCustomToken")
}

#[tokio::test]
async fn custom_token_sign_in_yields_identity() {
	let provider = ToolkitIdentityProvider::new(&endpoint().await, Some("test-key"), Duration::from_secs(5)).unwrap();

	let identity = provider.sign_in_with_custom_token("ct-good").await.unwrap();
	assert_eq!(identity.uid, "u-5");
	assert_eq!(identity.email.as_deref(), Some("grace@example.com"));
	assert_eq!(identity.provenance, Provenance::CustomToken);
	assert_eq!(provider.credential().unwrap().refresh_token.as_deref(), Some("refresh-5"));

	provider.sign_out().await.unwrap();
	assert!(provider.credential().is_none());
}

#[tokio::test]
async fn rejected_token_is_a_sign_in_error() {
	let provider = ToolkitIdentityProvider::new(&endpoint().await, Some("test-key"), Duration::from_secs(5)).unwrap();
	let err = provider.sign_in_with_custom_token("ct-bad").await.unwrap_err();
	match err {
		SsoError::SignIn(message) => assert_eq!(message, "INVALID_CUSTOM_TOKEN"),
		other => panic!("unexpected error: {other:?}"),
	}
	assert!(provider.credential().is_none());
}
