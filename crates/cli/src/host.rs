//! The launcher host.
//!
//! The browser starts `e2c-host` once per redirect, writes one framed
//! [`LaunchRequest`] to its stdin, and waits for one framed reply on stdout.
//! Every outcome, including unreadable input, is answered with a
//! [`LaunchReply`] so the extension never has to infer failure from a bare
//! disconnect.

use std::path::{Path, PathBuf};

use e2c_protocol::{LAUNCHABLE_SCHEMES, LaunchReply, LaunchRequest};
use e2c_runtime::{BrowserLocator, MAX_MESSAGE_LEN, launch_browser, read_message, write_frame};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{error, info, warn};
use url::Url;

use crate::config::HostConfig;
use crate::error::Result;

/// Starts a browser for a validated request.
pub trait Launch {
	/// Returns the pid of the started process and the executable used.
	fn launch(&self, url: &str, args: &[String]) -> e2c_runtime::Result<(u32, PathBuf)>;
}

/// Locates the browser on this machine and spawns it detached.
pub struct SystemLauncher {
	locator: BrowserLocator,
}

impl SystemLauncher {
	pub fn new(locator: BrowserLocator) -> Self {
		Self { locator }
	}
}

impl Launch for SystemLauncher {
	fn launch(&self, url: &str, args: &[String]) -> e2c_runtime::Result<(u32, PathBuf)> {
		let browser = self.locator.locate()?;
		let pid = launch_browser(&browser, args, url)?;
		Ok((pid, browser))
	}
}

/// Turns one decoded message into the reply for it.
pub fn handle_message(message: &Value, config: &HostConfig, launcher: &dyn Launch) -> LaunchReply {
	if !message.get("url").is_some_and(Value::is_string) {
		warn!(target = "e2c", %message, "message without url");
		return LaunchReply::failed("invalid message format");
	}
	let mut request: LaunchRequest = match serde_json::from_value(message.clone()) {
		Ok(request) => request,
		Err(err) => {
			warn!(target = "e2c", error = %err, "undecodable launch request");
			return LaunchReply::failed(format!("invalid message format: {err}"));
		}
	};

	if let Err(reason) = check_url(&request.url) {
		warn!(target = "e2c", url = %request.url, reason, "refusing to launch");
		return LaunchReply::failed(reason);
	}

	if request.launch_args.trim().is_empty() {
		if let Some(default_args) = &config.default_args {
			request.launch_args = default_args.clone();
		}
	}
	let args = request.launch_arg_list();
	info!(target = "e2c", url = %request.url, source = %request.source, ?args, "launch requested");

	match launcher.launch(&request.url, &args) {
		Ok((pid, browser)) => {
			info!(target = "e2c", pid, browser = %browser.display(), "browser started");
			LaunchReply::launched(request.url, pid, browser.display().to_string(), args)
		}
		Err(err) => {
			error!(target = "e2c", url = %request.url, error = %err, "launch failed");
			LaunchReply::failed(err.to_string())
		}
	}
}

fn check_url(raw: &str) -> std::result::Result<(), String> {
	let url = Url::parse(raw).map_err(|e| format!("invalid url: {e}"))?;
	if LAUNCHABLE_SCHEMES.contains(&url.scheme()) {
		Ok(())
	} else {
		Err(format!("unsupported url scheme: {}", url.scheme()))
	}
}

/// Serves one exchange: read a request, act on it, write the reply.
pub async fn serve<R, W>(reader: &mut R, writer: &mut W, config: &HostConfig, launcher: &dyn Launch) -> Result<LaunchReply>
where
	R: AsyncRead + Unpin,
	W: AsyncWrite + Unpin,
{
	let reply = match read_message(reader, MAX_MESSAGE_LEN).await {
		Ok(message) => handle_message(&message, config, launcher),
		Err(err) if err.is_closed() => {
			warn!(target = "e2c", "stdin closed before a message arrived");
			LaunchReply::failed("no message received")
		}
		Err(err) => {
			warn!(target = "e2c", error = %err, "unreadable message");
			LaunchReply::failed(err.to_string())
		}
	};

	let payload = serde_json::to_vec(&reply)?;
	write_frame(writer, &payload, MAX_MESSAGE_LEN).await?;
	writer.flush().await?;
	Ok(reply)
}

/// Where the host binary is expected next to the running executable.
pub fn sibling_host_path() -> Option<PathBuf> {
	let exe = std::env::current_exe().ok()?;
	let dir = exe.parent()?;
	Some(host_path_in(dir))
}

pub fn host_path_in(dir: &Path) -> PathBuf {
	dir.join(format!("e2c-host{}", std::env::consts::EXE_SUFFIX))
}

#[cfg(test)]
mod tests {
	use std::cell::RefCell;

	use e2c_runtime::Error;
	use serde_json::json;
	use tokio::io::{AsyncReadExt, duplex};

	use super::*;

	#[derive(Default)]
	struct RecordingLauncher {
		calls: RefCell<Vec<(String, Vec<String>)>>,
		fail: bool,
	}

	impl Launch for RecordingLauncher {
		fn launch(&self, url: &str, args: &[String]) -> e2c_runtime::Result<(u32, PathBuf)> {
			self.calls.borrow_mut().push((url.to_string(), args.to_vec()));
			if self.fail {
				return Err(Error::BrowserNotFound);
			}
			Ok((4242, PathBuf::from("/usr/bin/google-chrome")))
		}
	}

	#[test]
	fn launches_with_split_args() {
		let launcher = RecordingLauncher::default();
		let message = json!({
			"url": "https://www.zhihu.com/question/1",
			"source": "e2c",
			"chromeArgs": "--new-window  --incognito",
			"timestamp": 1_700_000_000_000u64
		});

		let reply = handle_message(&message, &HostConfig::default(), &launcher);

		assert!(reply.success);
		assert_eq!(reply.pid, Some(4242));
		assert_eq!(reply.url.as_deref(), Some("https://www.zhihu.com/question/1"));
		assert_eq!(reply.chrome_path.as_deref(), Some("/usr/bin/google-chrome"));
		assert_eq!(reply.chrome_args, Some(vec!["--new-window".to_string(), "--incognito".to_string()]));
		assert_eq!(
			launcher.calls.borrow()[0].1,
			vec!["--new-window".to_string(), "--incognito".to_string()]
		);
	}

	#[test]
	fn empty_args_use_config_then_builtin_default() {
		let launcher = RecordingLauncher::default();
		let message = json!({"url": "https://a.test/", "chromeArgs": " "});

		let config = HostConfig {
			default_args: Some("--profile-directory=Work".into()),
			..HostConfig::default()
		};
		handle_message(&message, &config, &launcher);
		handle_message(&message, &HostConfig::default(), &launcher);

		let calls = launcher.calls.borrow();
		assert_eq!(calls[0].1, vec!["--profile-directory=Work".to_string()]);
		assert_eq!(calls[1].1, vec!["--new-window".to_string()]);
	}

	#[test]
	fn missing_url_is_invalid_format() {
		let launcher = RecordingLauncher::default();
		for message in [json!({}), json!({"url": 5}), json!("https://a.test"), json!(null)] {
			let reply = handle_message(&message, &HostConfig::default(), &launcher);
			assert!(!reply.success);
			assert_eq!(reply.error.as_deref(), Some("invalid message format"));
		}
		assert!(launcher.calls.borrow().is_empty());
	}

	#[test]
	fn non_web_urls_are_refused() {
		let launcher = RecordingLauncher::default();
		for url in ["javascript:alert(1)", "file:///etc/passwd", "--disable-web-security", "relative/path"] {
			let reply = handle_message(&json!({"url": url}), &HostConfig::default(), &launcher);
			assert!(!reply.success, "{url} should be refused");
		}
		assert!(launcher.calls.borrow().is_empty());
	}

	#[test]
	fn launch_failure_is_reported() {
		let launcher = RecordingLauncher {
			fail: true,
			..RecordingLauncher::default()
		};
		let reply = handle_message(&json!({"url": "https://a.test/"}), &HostConfig::default(), &launcher);
		assert!(!reply.success);
		assert!(reply.error.unwrap().contains("not found"));
	}

	async fn read_reply(reader: &mut (impl AsyncRead + Unpin)) -> Value {
		let mut len = [0u8; 4];
		reader.read_exact(&mut len).await.unwrap();
		let mut body = vec![0u8; u32::from_le_bytes(len) as usize];
		reader.read_exact(&mut body).await.unwrap();
		serde_json::from_slice(&body).unwrap()
	}

	#[tokio::test]
	async fn serve_answers_one_framed_request() {
		let launcher = RecordingLauncher::default();
		let body = serde_json::to_vec(&json!({"url": "https://a.test/", "chromeArgs": "--new-window"})).unwrap();
		let mut input = (body.len() as u32).to_le_bytes().to_vec();
		input.extend_from_slice(&body);

		let (mut out_writer, mut out_reader) = duplex(1024);
		let reply = serve(&mut input.as_slice(), &mut out_writer, &HostConfig::default(), &launcher)
			.await
			.unwrap();

		assert!(reply.success);
		let written = read_reply(&mut out_reader).await;
		assert_eq!(written["success"], true);
		assert_eq!(written["pid"], 4242);
	}

	#[tokio::test]
	async fn serve_replies_even_without_input() {
		let launcher = RecordingLauncher::default();
		let (mut out_writer, mut out_reader) = duplex(1024);

		let reply = serve(&mut (&[] as &[u8]), &mut out_writer, &HostConfig::default(), &launcher)
			.await
			.unwrap();

		assert!(!reply.success);
		let written = read_reply(&mut out_reader).await;
		assert_eq!(written["success"], false);
		assert_eq!(written["error"], "no message received");
	}

	#[tokio::test]
	async fn serve_replies_to_malformed_json() {
		let launcher = RecordingLauncher::default();
		let mut input = 4u32.to_le_bytes().to_vec();
		input.extend_from_slice(b"{oops");
		let (mut out_writer, mut out_reader) = duplex(1024);

		serve(&mut &input[..], &mut out_writer, &HostConfig::default(), &launcher)
			.await
			.unwrap();

		let written = read_reply(&mut out_reader).await;
		assert_eq!(written["success"], false);
		assert!(launcher.calls.borrow().is_empty());
	}
}
