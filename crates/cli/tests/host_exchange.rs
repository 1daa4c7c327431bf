//! End-to-end exchanges with the built `e2c-host` binary.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use e2c::{Dispatcher, RedirectResult};
use e2c_runtime::ProcessConnector;
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

fn host_binary() -> PathBuf {
	PathBuf::from(env!("CARGO_BIN_EXE_e2c-host"))
}

/// Isolated config dir plus a fake browser that exits immediately.
struct Sandbox {
	dir: TempDir,
}

impl Sandbox {
	fn new() -> Self {
		Self {
			dir: TempDir::new().unwrap(),
		}
	}

	fn config_dir(&self) -> PathBuf {
		self.dir.path().join("config")
	}

	#[cfg(unix)]
	fn fake_browser(&self) -> PathBuf {
		use std::os::unix::fs::PermissionsExt;
		let path = self.dir.path().join("fake-chrome");
		std::fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
		std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
		path
	}

	fn command(&self, browser: &Path) -> Command {
		let mut command = Command::new(host_binary());
		command
			.arg("chrome-extension://test/")
			.env("E2C_CONFIG_DIR", self.config_dir())
			.env("E2C_BROWSER", browser)
			.env_remove("E2C_LOG_DIR")
			.stdin(Stdio::piped())
			.stdout(Stdio::piped())
			.stderr(Stdio::null());
		command
	}
}

async fn exchange(mut command: Command, message: &Value) -> Value {
	let mut child = command.spawn().unwrap();
	let mut stdin = child.stdin.take().unwrap();
	let body = serde_json::to_vec(message).unwrap();
	let mut frame = (body.len() as u32).to_le_bytes().to_vec();
	frame.extend_from_slice(&body);
	// The host may answer and exit without reading, e.g. on a bad config.
	let _ = stdin.write_all(&frame).await;
	drop(stdin);

	let mut stdout = child.stdout.take().unwrap();
	let mut len = [0u8; 4];
	stdout.read_exact(&mut len).await.unwrap();
	let mut reply = vec![0u8; u32::from_le_bytes(len) as usize];
	stdout.read_exact(&mut reply).await.unwrap();

	let status = child.wait().await.unwrap();
	assert!(status.success());
	serde_json::from_slice(&reply).unwrap()
}

#[cfg(unix)]
#[tokio::test]
async fn host_launches_configured_browser() {
	let sandbox = Sandbox::new();
	let browser = sandbox.fake_browser();

	let reply = exchange(
		sandbox.command(&browser),
		&json!({"url": "https://www.zhihu.com/question/1", "source": "test", "chromeArgs": "--new-window", "timestamp": 1}),
	)
	.await;

	assert_eq!(reply["success"], true, "{reply}");
	assert_eq!(reply["url"], "https://www.zhihu.com/question/1");
	assert_eq!(reply["chrome_path"], browser.display().to_string());
	assert_eq!(reply["chrome_args"], json!(["--new-window"]));
	assert!(reply["pid"].as_u64().is_some());
}

#[tokio::test]
async fn host_rejects_message_without_url() {
	let sandbox = Sandbox::new();
	let reply = exchange(sandbox.command(Path::new("/nonexistent")), &json!({"action": "ping"})).await;

	assert_eq!(reply["success"], false);
	assert_eq!(reply["error"], "invalid message format");
}

#[tokio::test]
async fn host_reports_unreadable_config() {
	let sandbox = Sandbox::new();
	std::fs::create_dir_all(sandbox.config_dir()).unwrap();
	std::fs::write(sandbox.config_dir().join("host.json"), "{ nope").unwrap();

	let reply = exchange(sandbox.command(Path::new("/nonexistent")), &json!({"url": "https://a.test/"})).await;

	assert_eq!(reply["success"], false);
	assert!(reply["error"].as_str().unwrap().contains("host config unreadable"));
}

#[cfg(unix)]
#[tokio::test]
async fn dispatcher_round_trip_through_real_host() {
	let sandbox = Sandbox::new();
	let browser = sandbox.fake_browser();

	// ProcessConnector inherits our environment, so point the child at the sandbox.
	let wrapper = sandbox.dir.path().join("host-wrapper");
	{
		use std::os::unix::fs::PermissionsExt;
		let script = format!(
			"#!/bin/sh\nE2C_CONFIG_DIR='{}' E2C_BROWSER='{}' exec '{}' \"$@\" 2>/dev/null\n",
			sandbox.config_dir().display(),
			browser.display(),
			host_binary().display()
		);
		std::fs::write(&wrapper, script).unwrap();
		std::fs::set_permissions(&wrapper, std::fs::Permissions::from_mode(0o755)).unwrap();
	}

	let connector = ProcessConnector::new(&wrapper).with_origin("chrome-extension://test/");
	let dispatcher = Dispatcher::new(Arc::new(connector));
	let result = dispatcher.redirect("https://www.zhihu.com/", "--new-window").await;

	match result {
		RedirectResult::Success(reply) => {
			assert_eq!(reply["success"], true, "{reply}");
			assert_eq!(reply["url"], "https://www.zhihu.com/");
		}
		other => panic!("unexpected result: {other:?}"),
	}
}

#[cfg(unix)]
#[tokio::test]
async fn dispatcher_reports_missing_host() {
	let connector = ProcessConnector::new("/nonexistent/e2c-host");
	let result = Dispatcher::new(Arc::new(connector)).redirect("https://a.test/", "").await;
	assert!(matches!(result, RedirectResult::Failure(e2c::FailureReason::ConnectionException(_))));
}
