//! File locations and launcher host configuration.
//!
//! Everything lives under `<config dir>/e2c/` (`~/.config/e2c` on Linux,
//! `~/Library/Application Support/e2c` on macOS, `%APPDATA%\e2c` on Windows).
//! `E2C_CONFIG_DIR` replaces that directory outright.

use std::fs;
use std::path::{Path, PathBuf};

use e2c_protocol::HOST_NAME;
use e2c_runtime::BrowserLocator;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{E2cError, Result};

pub const CONFIG_DIR_ENV: &str = "E2C_CONFIG_DIR";
pub const LOG_DIR_ENV: &str = "E2C_LOG_DIR";

const APP_DIR: &str = "e2c";
const SETTINGS_FILE: &str = "settings.json";
const HOST_CONFIG_FILE: &str = "host.json";

pub fn config_dir() -> PathBuf {
	if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
		return PathBuf::from(dir);
	}
	dirs::config_dir()
		.map(|d| d.join(APP_DIR))
		.unwrap_or_else(|| PathBuf::from(".").join(APP_DIR))
}

pub fn settings_path() -> PathBuf {
	config_dir().join(SETTINGS_FILE)
}

pub fn host_config_path() -> PathBuf {
	config_dir().join(HOST_CONFIG_FILE)
}

/// File name of the host manifest inside a NativeMessagingHosts directory.
pub fn manifest_file_name() -> String {
	format!("{HOST_NAME}.json")
}

/// Per-user NativeMessagingHosts directories, one per Chromium-family browser.
///
/// Empty on Windows, where hosts are registered through the registry.
pub fn native_messaging_dirs() -> Vec<(&'static str, PathBuf)> {
	let Some(base) = dirs::config_dir() else {
		return Vec::new();
	};

	#[cfg(target_os = "macos")]
	let browsers: &[(&str, &str)] = &[
		("Microsoft Edge", "Microsoft Edge"),
		("Google Chrome", "Google/Chrome"),
		("Chromium", "Chromium"),
	];
	#[cfg(all(unix, not(target_os = "macos")))]
	let browsers: &[(&str, &str)] = &[
		("Microsoft Edge", "microsoft-edge"),
		("Google Chrome", "google-chrome"),
		("Chromium", "chromium"),
	];
	#[cfg(not(unix))]
	let browsers: &[(&str, &str)] = &[];

	browsers
		.iter()
		.map(|(name, dir)| (*name, base.join(dir).join("NativeMessagingHosts")))
		.collect()
}

/// Launcher host configuration (`host.json`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostConfig {
	/// Browser executable, checked before any discovery.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub browser_path: Option<PathBuf>,
	/// Directory for daily log files.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub log_dir: Option<PathBuf>,
	/// Arguments used when a request carries none.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub default_args: Option<String>,
}

impl HostConfig {
	/// Reads `path`. A missing file is the default configuration.
	pub fn load(path: &Path) -> Result<Self> {
		let content = match fs::read_to_string(path) {
			Ok(content) => content,
			Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
				debug!(target = "e2c", path = %path.display(), "no host config");
				return Ok(Self::default());
			}
			Err(source) => {
				return Err(E2cError::Read {
					path: path.to_path_buf(),
					source,
				});
			}
		};
		Ok(serde_json::from_str(&content)?)
	}

	/// Applies `E2C_LOG_DIR`.
	pub fn with_env(mut self) -> Self {
		if let Some(dir) = std::env::var_os(LOG_DIR_ENV) {
			self.log_dir = Some(PathBuf::from(dir));
		}
		self
	}

	pub fn locator(&self) -> BrowserLocator {
		BrowserLocator::from_env().configured(self.browser_path.clone())
	}
}
