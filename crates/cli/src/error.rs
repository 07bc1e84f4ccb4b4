use sso::SsoError;
use thiserror::Error;

use crate::output::ErrorCode;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
	#[error(transparent)]
	Sso(#[from] SsoError),

	#[error("Invalid origin '{origin}': {reason}")]
	InvalidOrigin { origin: String, reason: String },

	#[error("No home directory; pass --profile and --config explicitly")]
	NoHomeDir,

	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

impl CliError {
	/// Error code reported in the result envelope.
	pub fn code(&self) -> ErrorCode {
		match self {
			CliError::InvalidOrigin { .. } => ErrorCode::InvalidInput,
			CliError::NoHomeDir => ErrorCode::ConfigError,
			CliError::Io(_) => ErrorCode::IoError,
			CliError::Json(_) => ErrorCode::InternalError,
			CliError::Sso(err) if err.is_unreachable() => ErrorCode::NetworkError,
			CliError::Sso(SsoError::Storage(_)) => ErrorCode::StorageError,
			CliError::Sso(SsoError::Config(_)) => ErrorCode::ConfigError,
			CliError::Sso(SsoError::SignIn(_)) => ErrorCode::AuthError,
			CliError::Sso(SsoError::Io(_)) => ErrorCode::IoError,
			CliError::Sso(_) => ErrorCode::InternalError,
		}
	}
}
