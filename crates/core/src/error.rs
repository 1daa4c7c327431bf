//! Error types for the core library.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
	/// Rule rejected because it is too short to be a useful pattern.
	#[error("rule is too short (minimum {min} characters): {rule:?}")]
	RuleTooShort { rule: String, min: usize },

	/// Rule rejected because an identical rule is already configured.
	#[error("rule already exists: {0}")]
	DuplicateRule(String),

	/// Rule index out of range.
	#[error("no rule at index {index} ({len} rules configured)")]
	RuleIndex { index: usize, len: usize },

	/// Settings file could not be written.
	#[error("failed to write settings to {path}: {source}")]
	SettingsWrite {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	/// Settings document is valid JSON but not an object.
	#[error("settings must be a JSON object")]
	SettingsNotObject,

	#[error(transparent)]
	Json(#[from] serde_json::Error),
}
