//! External browser discovery and launch.
//!
//! [`BrowserLocator`] searches, in order:
//! 1. An explicit path from host configuration
//! 2. The `E2C_BROWSER` environment variable
//! 3. Platform install locations (Program Files, /Applications, /usr/bin, ...)
//! 4. `PATH`, by executable name
//!
//! A configured path that does not exist is logged and skipped rather than
//! treated as fatal, so a stale override still falls through to discovery.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Environment variable naming the browser executable.
pub const BROWSER_ENV: &str = "E2C_BROWSER";

/// Executable names tried on `PATH`.
#[cfg(windows)]
const PATH_NAMES: &[&str] = &["chrome"];
#[cfg(not(windows))]
const PATH_NAMES: &[&str] = &[
	"google-chrome",
	"google-chrome-stable",
	"chromium",
	"chromium-browser",
];

/// Platform install locations, most common first.
pub fn default_candidates() -> Vec<PathBuf> {
	#[cfg(windows)]
	{
		let mut paths = vec![
			PathBuf::from(r"C:\Program Files\Google\Chrome\Application\chrome.exe"),
			PathBuf::from(r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe"),
		];
		if let Some(local) = std::env::var_os("LOCALAPPDATA") {
			paths.push(PathBuf::from(local).join(r"Google\Chrome\Application\chrome.exe"));
		}
		paths
	}

	#[cfg(target_os = "macos")]
	{
		vec![
			PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
			PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"),
		]
	}

	#[cfg(all(not(windows), not(target_os = "macos")))]
	{
		vec![
			PathBuf::from("/usr/bin/google-chrome"),
			PathBuf::from("/usr/bin/google-chrome-stable"),
			PathBuf::from("/opt/google/chrome/chrome"),
			PathBuf::from("/usr/bin/chromium"),
			PathBuf::from("/usr/bin/chromium-browser"),
			PathBuf::from("/snap/bin/chromium"),
		]
	}
}

/// Ordered search for the external browser executable.
#[derive(Debug, Clone, Default)]
pub struct BrowserLocator {
	configured: Option<PathBuf>,
	env_override: Option<PathBuf>,
	candidates: Vec<PathBuf>,
	search_path: bool,
}

impl BrowserLocator {
	/// Locator using the environment, platform candidates and `PATH`.
	pub fn from_env() -> Self {
		Self {
			configured: None,
			env_override: std::env::var_os(BROWSER_ENV).map(PathBuf::from),
			candidates: default_candidates(),
			search_path: true,
		}
	}

	/// Locator that only checks the given candidates.
	pub fn with_candidates(candidates: Vec<PathBuf>) -> Self {
		Self {
			candidates,
			..Self::default()
		}
	}

	/// Sets the path from host configuration, checked first.
	pub fn configured(mut self, path: Option<PathBuf>) -> Self {
		self.configured = path;
		self
	}

	pub fn locate(&self) -> Result<PathBuf> {
		let overrides = [
			("host config", self.configured.as_deref()),
			(BROWSER_ENV, self.env_override.as_deref()),
		];
		for (source, path) in overrides {
			if let Some(path) = path {
				if path.is_file() {
					info!(target = "e2c", source, path = %path.display(), "using configured browser");
					return Ok(path.to_path_buf());
				}
				warn!(
					target = "e2c",
					source,
					path = %path.display(),
					"configured browser does not exist; continuing search"
				);
			}
		}

		if let Some(path) = self.candidates.iter().find(|p| p.is_file()) {
			debug!(target = "e2c", path = %path.display(), "found browser at install location");
			return Ok(path.clone());
		}

		if self.search_path {
			for name in PATH_NAMES {
				if let Ok(path) = which::which(name) {
					debug!(target = "e2c", name, path = %path.display(), "found browser on PATH");
					return Ok(path);
				}
			}
		}

		Err(Error::BrowserNotFound)
	}
}

/// Starts `browser` with `args` followed by `url`, detached from this process.
///
/// Returns the child's pid. The child is not waited on; the host exits right
/// after replying and the browser keeps running.
pub fn launch_browser(browser: &Path, args: &[String], url: &str) -> Result<u32> {
	let mut command = Command::new(browser);
	command
		.args(args)
		.arg(url)
		.stdin(Stdio::null())
		.stdout(Stdio::null())
		.stderr(Stdio::null());
	detach(&mut command);

	info!(target = "e2c", browser = %browser.display(), ?args, url, "launching browser");
	let child = command
		.spawn()
		.map_err(|e| Error::LaunchFailed(format!("{}: {e}", browser.display())))?;
	Ok(child.id())
}

#[cfg(unix)]
fn detach(command: &mut Command) {
	use std::os::unix::process::CommandExt;
	command.process_group(0);
}

#[cfg(windows)]
fn detach(command: &mut Command) {
	use std::os::windows::process::CommandExt;
	const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
	const CREATE_NO_WINDOW: u32 = 0x0800_0000;
	command.creation_flags(CREATE_NEW_PROCESS_GROUP | CREATE_NO_WINDOW);
}

#[cfg(not(any(unix, windows)))]
fn detach(_command: &mut Command) {}

#[cfg(test)]
mod tests {
	use std::fs;

	use tempfile::TempDir;

	use super::*;

	#[test]
	fn configured_path_wins() {
		let temp = TempDir::new().unwrap();
		let configured = temp.path().join("my-chrome");
		let candidate = temp.path().join("chrome");
		fs::write(&configured, "").unwrap();
		fs::write(&candidate, "").unwrap();

		let locator = BrowserLocator::with_candidates(vec![candidate]).configured(Some(configured.clone()));
		assert_eq!(locator.locate().unwrap(), configured);
	}

	#[test]
	fn missing_configured_path_falls_through() {
		let temp = TempDir::new().unwrap();
		let candidate = temp.path().join("chrome");
		fs::write(&candidate, "").unwrap();

		let locator = BrowserLocator::with_candidates(vec![temp.path().join("absent"), candidate.clone()])
			.configured(Some(temp.path().join("stale-override")));
		assert_eq!(locator.locate().unwrap(), candidate);
	}

	#[test]
	fn directories_are_not_browsers() {
		let temp = TempDir::new().unwrap();
		let locator = BrowserLocator::with_candidates(vec![temp.path().to_path_buf()]);
		assert!(matches!(locator.locate(), Err(Error::BrowserNotFound)));
	}

	#[test]
	fn nothing_found_is_browser_not_found() {
		let locator = BrowserLocator::with_candidates(Vec::new());
		let err = locator.locate().unwrap_err();
		assert!(err.to_string().contains("E2C_BROWSER"));
	}

	#[cfg(unix)]
	#[test]
	fn launch_reports_missing_executable() {
		let err = launch_browser(Path::new("/nonexistent/chrome"), &[], "https://a.test").unwrap_err();
		assert!(matches!(err, Error::LaunchFailed(_)));
	}

	#[cfg(unix)]
	#[test]
	fn launch_returns_pid() {
		let pid = launch_browser(Path::new("/bin/sh"), &["-c".to_string(), "exit 0".to_string()], "ignored").unwrap();
		assert!(pid > 0);
	}
}
