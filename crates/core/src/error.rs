//! Error types for session recovery.
//!
//! Errors stay inside the crate's components: the coordinator and bridge entry
//! points convert every variant into a terminal `Complete` state, so callers
//! only meet these through the lower-level ports and transports.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SsoError>;

#[derive(Debug, Error)]
pub enum SsoError {
	/// Network failure talking to the app backend or the hub.
	#[error("Transport error: {0}")]
	Transport(String),

	/// Endpoint answered with a non-success HTTP status.
	#[error("{endpoint} returned HTTP {status}: {message}")]
	Status { endpoint: String, status: u16, message: String },

	/// Response body could not be understood.
	#[error("Malformed response: {0}")]
	Decode(String),

	/// Cookie jar or device store could not be read or written.
	#[error("Storage unavailable: {0}")]
	Storage(String),

	/// Custom-token sign-in rejected or failed.
	#[error("Sign-in failed: {0}")]
	SignIn(String),

	#[error("Invalid configuration: {0}")]
	Config(String),

	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

impl SsoError {
	/// True for failures caused by an unreachable or misbehaving dependency.
	pub fn is_unreachable(&self) -> bool {
		matches!(self, SsoError::Transport(_) | SsoError::Status { .. })
	}
}

impl From<reqwest::Error> for SsoError {
	fn from(err: reqwest::Error) -> Self {
		if err.is_decode() {
			SsoError::Decode(err.to_string())
		} else {
			SsoError::Transport(err.to_string())
		}
	}
}

impl From<url::ParseError> for SsoError {
	fn from(err: url::ParseError) -> Self {
		SsoError::Config(format!("invalid URL: {err}"))
	}
}
