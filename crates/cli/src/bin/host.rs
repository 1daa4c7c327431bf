//! Native-messaging launcher host.
//!
//! Started by the browser with the caller's origin as the first argument.
//! Reads one request from stdin, writes one reply to stdout, and exits.

use e2c_cli::config::{self, HostConfig};
use e2c_cli::host::{self, SystemLauncher};
use e2c_cli::logging;
use e2c_protocol::LaunchReply;
use e2c_runtime::{MAX_MESSAGE_LEN, write_frame};
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};

#[tokio::main(flavor = "current_thread")]
async fn main() {
	let loaded = HostConfig::load(&config::host_config_path()).map(HostConfig::with_env);
	let config = loaded.as_ref().cloned().unwrap_or_else(|_| HostConfig::default().with_env());
	let _guard = logging::init_host_logging(config.log_dir.as_deref());

	let origin = std::env::args().nth(1).unwrap_or_default();
	info!(target = "e2c", %origin, pid = std::process::id(), "launcher host started");

	let mut stdout = tokio::io::stdout();
	if let Err(err) = &loaded {
		// Without a usable config the request cannot be served reliably.
		error!(target = "e2c", error = %err, "host config unreadable");
		let reply = LaunchReply::failed(format!("host config unreadable: {err}"));
		if let Ok(payload) = serde_json::to_vec(&reply) {
			let _ = write_frame(&mut stdout, &payload, MAX_MESSAGE_LEN).await;
			let _ = stdout.flush().await;
		}
		return;
	}

	let launcher = SystemLauncher::new(config.locator());
	let mut stdin = tokio::io::stdin();
	match host::serve(&mut stdin, &mut stdout, &config, &launcher).await {
		Ok(reply) if reply.success => info!(target = "e2c", "request served"),
		Ok(reply) => warn!(target = "e2c", error = ?reply.error, "request refused"),
		Err(err) => {
			error!(target = "e2c", error = %err, "failed to write reply");
			std::process::exit(1);
		}
	}
}
