//! Message types for the redirect pipeline.
//!
//! Two hops carry JSON between the parts of the system:
//!
//! 1. Page context to background worker: [`ExtensionRequest::OpenInChrome`],
//!    answered with a [`RedirectEnvelope`](crate::exchange::RedirectEnvelope).
//! 2. Background worker to launcher host: [`LaunchRequest`] over native
//!    messaging, answered with a [`LaunchReply`].
//!
//! # Main Types
//!
//! - [`ExtensionRequest`] - Messages from the page context to the background worker
//! - [`LaunchRequest`] - Request sent to the launcher host
//! - [`LaunchReply`] - Reply produced by the launcher host

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Registered native-messaging host name.
pub const HOST_NAME: &str = "com.edge2chrome.launcher";

/// Source tag stamped on every [`LaunchRequest`] built by this crate family.
pub const SOURCE_TAG: &str = "e2c";

/// URL schemes the launcher hands to a browser. Links with any other scheme
/// are never marked and never launched.
pub const LAUNCHABLE_SCHEMES: &[&str] = &["http", "https"];

/// Launch arguments used when none are configured.
pub const DEFAULT_LAUNCH_ARGS: &str = "--new-window";

/// Message sent from a page context to the background worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum ExtensionRequest {
	/// Redirect a link to the external browser.
	#[serde(rename = "openInChrome")]
	OpenInChrome {
		/// Absolute address to open.
		url: String,
		/// Opaque arguments for the external browser invocation.
		#[serde(rename = "chromeArgs", default, skip_serializing_if = "Option::is_none")]
		launch_args: Option<String>,
	},
}

/// Request sent to the launcher host over the native-messaging channel.
///
/// The launch-argument string travels as `chromeArgs`; `launchArgs` is accepted
/// when decoding so older senders keep working.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchRequest {
	/// Absolute address to open.
	pub url: String,
	/// Tag identifying the calling context.
	#[serde(default = "default_source")]
	pub source: String,
	/// Opaque arguments forwarded to the external browser invocation.
	#[serde(rename = "chromeArgs", alias = "launchArgs", default = "default_launch_args")]
	pub launch_args: String,
	/// Milliseconds since the Unix epoch, for diagnostics only.
	#[serde(default)]
	pub timestamp: u64,
}

fn default_source() -> String {
	"unknown".to_string()
}

fn default_launch_args() -> String {
	DEFAULT_LAUNCH_ARGS.to_string()
}

impl LaunchRequest {
	/// Builds a request stamped with the current wall-clock time.
	pub fn new(url: impl Into<String>, launch_args: impl Into<String>) -> Self {
		Self {
			url: url.into(),
			source: SOURCE_TAG.to_string(),
			launch_args: launch_args.into(),
			timestamp: now_millis(),
		}
	}

	/// Overrides the source tag.
	pub fn with_source(mut self, source: impl Into<String>) -> Self {
		self.source = source.into();
		self
	}

	/// Splits the launch-argument string into browser arguments.
	///
	/// Whitespace separates arguments except inside double quotes, which group
	/// text and are dropped, so `--user-data-dir="C:\My Profile"` stays one
	/// argument. An empty result yields [`DEFAULT_LAUNCH_ARGS`].
	pub fn launch_arg_list(&self) -> Vec<String> {
		let args = split_launch_args(&self.launch_args);
		if args.is_empty() {
			vec![DEFAULT_LAUNCH_ARGS.to_string()]
		} else {
			args
		}
	}
}

fn split_launch_args(raw: &str) -> Vec<String> {
	let mut args = Vec::new();
	let mut current = String::new();
	let mut in_quotes = false;
	for ch in raw.chars() {
		match ch {
			'"' => in_quotes = !in_quotes,
			c if c.is_whitespace() && !in_quotes => {
				if !current.is_empty() {
					args.push(std::mem::take(&mut current));
				}
			}
			c => current.push(c),
		}
	}
	if !current.is_empty() {
		args.push(current);
	}
	args
}

/// Reply written by the launcher host.
///
/// The dispatcher forwards this verbatim; only the host and diagnostic tooling
/// read the individual fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchReply {
	pub success: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub url: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub pid: Option<u32>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub chrome_path: Option<String>,
	/// Arguments the browser was started with, URL excluded.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub chrome_args: Option<Vec<String>>,
	/// Unix epoch seconds.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub timestamp: Option<u64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

impl LaunchReply {
	/// Reply for a browser process that was started.
	pub fn launched(url: impl Into<String>, pid: u32, browser: impl Into<String>, args: Vec<String>) -> Self {
		Self {
			success: true,
			message: Some("browser launched".to_string()),
			url: Some(url.into()),
			pid: Some(pid),
			chrome_path: Some(browser.into()),
			chrome_args: Some(args),
			timestamp: Some(now_millis() / 1000),
			error: None,
		}
	}

	/// Reply for a request that could not be served.
	pub fn failed(error: impl Into<String>) -> Self {
		Self {
			success: false,
			message: None,
			url: None,
			pid: None,
			chrome_path: None,
			chrome_args: None,
			timestamp: None,
			error: Some(error.into()),
		}
	}

	/// Serializes into the opaque payload shape the dispatcher forwards.
	pub fn to_value(&self) -> Value {
		serde_json::to_value(self).unwrap_or(Value::Null)
	}
}

/// Milliseconds since the Unix epoch, saturating to zero before it.
pub fn now_millis() -> u64 {
	std::time::SystemTime::now()
		.duration_since(std::time::UNIX_EPOCH)
		.map(|d| d.as_millis() as u64)
		.unwrap_or_default()
}
