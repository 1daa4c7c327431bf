use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, E2cError>;

#[derive(Debug, Error)]
pub enum E2cError {
	#[error("invalid URL {url:?}: {source}")]
	InvalidUrl {
		url: String,
		#[source]
		source: url::ParseError,
	},

	/// The dispatcher resolved the request with a failure.
	#[error("redirect failed: {0}")]
	Redirect(String),

	#[error("no native-messaging directory is known for this platform; pass --output")]
	NoManifestDir,

	#[error("failed to read {path}: {source}")]
	Read {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("failed to write {path}: {source}")]
	Write {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("{failed} of {total} checks failed")]
	ChecksFailed { failed: usize, total: usize },

	#[error(transparent)]
	Io(#[from] std::io::Error),

	#[error(transparent)]
	Json(#[from] serde_json::Error),

	#[error(transparent)]
	Core(#[from] e2c::Error),

	#[error(transparent)]
	Runtime(#[from] e2c_runtime::Error),

	#[error(transparent)]
	Anyhow(#[from] anyhow::Error),
}

impl E2cError {
	/// Stable machine-readable code for the JSON envelope.
	pub fn code(&self) -> &'static str {
		match self {
			E2cError::InvalidUrl { .. } => "INVALID_URL",
			E2cError::Redirect(_) => "REDIRECT_FAILED",
			E2cError::NoManifestDir => "NO_MANIFEST_DIR",
			E2cError::Read { .. } | E2cError::Write { .. } | E2cError::Io(_) => "IO_ERROR",
			E2cError::ChecksFailed { .. } => "CHECKS_FAILED",
			E2cError::Json(_) => "INVALID_JSON",
			E2cError::Core(e2c::Error::RuleTooShort { .. })
			| E2cError::Core(e2c::Error::DuplicateRule(_))
			| E2cError::Core(e2c::Error::RuleIndex { .. }) => "INVALID_RULE",
			E2cError::Core(_) | E2cError::Runtime(_) | E2cError::Anyhow(_) => "INTERNAL_ERROR",
		}
	}
}
