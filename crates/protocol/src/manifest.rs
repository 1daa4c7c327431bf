//! Native-messaging host manifest.
//!
//! The browser reads this file to find the launcher host binary and decide
//! which extensions may talk to it.

use serde::{Deserialize, Serialize};

use crate::messages::HOST_NAME;

/// Manifest describing a stdio native-messaging host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostManifest {
	pub name: String,
	pub description: String,
	/// Absolute path of the host executable.
	pub path: String,
	#[serde(rename = "type")]
	pub kind: String,
	pub allowed_origins: Vec<String>,
}

impl HostManifest {
	/// Builds the manifest for the launcher host at `path`.
	pub fn launcher(path: impl Into<String>, extension_ids: &[String]) -> Self {
		Self {
			name: HOST_NAME.to_string(),
			description: "Edge2Chrome launcher - opens matching links in an external browser".to_string(),
			path: path.into(),
			kind: "stdio".to_string(),
			allowed_origins: extension_ids.iter().map(|id| extension_origin(id)).collect(),
		}
	}

	/// Returns true if the extension with `id` may connect.
	pub fn allows(&self, id: &str) -> bool {
		let origin = extension_origin(id);
		self.allowed_origins.iter().any(|o| o == &origin)
	}
}

/// Origin string the browser uses for an extension id.
pub fn extension_origin(id: &str) -> String {
	format!("chrome-extension://{id}/")
}
