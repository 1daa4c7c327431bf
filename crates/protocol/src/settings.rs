//! Persisted user settings.
//!
//! A flat, versionless record. Every field has a default, so a partial or
//! empty document still yields a complete [`Settings`].

use serde::{Deserialize, Serialize};

use crate::messages::DEFAULT_LAUNCH_ARGS;

/// Rule shipped with a fresh install.
pub const DEFAULT_RULE: &str = "*.zhihu.*";

/// Label shown on the redirect affordance.
pub const DEFAULT_BUTTON_TEXT: &str = "Chrome";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
	/// Wildcard patterns; a link is redirected when any of them matches.
	#[serde(default = "default_rules")]
	pub url_rules: Vec<String>,
	#[serde(default = "default_true")]
	pub show_notifications: bool,
	#[serde(default)]
	pub enable_logging: bool,
	#[serde(default = "default_button_text")]
	pub button_text: String,
	/// Opaque arguments forwarded to the external browser.
	#[serde(default = "default_chrome_args")]
	pub chrome_args: String,
}

impl Default for Settings {
	fn default() -> Self {
		Self {
			url_rules: default_rules(),
			show_notifications: true,
			enable_logging: false,
			button_text: default_button_text(),
			chrome_args: default_chrome_args(),
		}
	}
}

fn default_rules() -> Vec<String> {
	vec![DEFAULT_RULE.to_string()]
}

fn default_true() -> bool {
	true
}

fn default_button_text() -> String {
	DEFAULT_BUTTON_TEXT.to_string()
}

fn default_chrome_args() -> String {
	DEFAULT_LAUNCH_ARGS.to_string()
}
