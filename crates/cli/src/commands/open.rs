use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use e2c::{Dispatcher, DispatcherConfig, RedirectResult};
use e2c_protocol::{RedirectEnvelope, extension_origin};
use e2c_runtime::ProcessConnector;
use serde_json::Value;
use tracing::info;
use url::Url;

use crate::cli::OpenArgs;
use crate::context::CommandContext;
use crate::error::{E2cError, Result};
use crate::host::sibling_host_path;
use crate::output::{self, Render};

/// Source tag for requests sent from the command line.
const CLI_SOURCE: &str = "e2c-cli";

pub async fn execute(args: OpenArgs, ctx: &CommandContext) -> Result<()> {
	let url = Url::parse(&args.url).map_err(|source| E2cError::InvalidUrl {
		url: args.url.clone(),
		source,
	})?;
	let launch_args = args.args.unwrap_or_else(|| ctx.settings().chrome_args);

	let host = args
		.host
		.or_else(sibling_host_path)
		.ok_or_else(|| anyhow::anyhow!("cannot locate e2c-host; pass --host"))?;
	info!(target = "e2c", host = %host.display(), "using launcher host");

	let connector = ProcessConnector::new(host).with_origin(extension_origin(CLI_SOURCE));
	let dispatcher = Dispatcher::with_config(
		Arc::new(connector),
		DispatcherConfig {
			timeout: Duration::from_millis(args.timeout_ms),
			source: CLI_SOURCE.to_string(),
		},
	);

	let result = dispatcher.redirect(url.as_str(), &launch_args).await;
	match &result {
		RedirectResult::Success(reply) => {
			// The dispatcher forwards the host's reply untouched; a refusal is
			// still a failed command here.
			if reply.get("success").and_then(Value::as_bool) == Some(false) {
				let error = reply.get("error").and_then(Value::as_str).unwrap_or("unknown error");
				return Err(E2cError::Redirect(format!("host could not launch the browser: {error}")));
			}
			output::print_success("open", &OpenReport(RedirectEnvelope::from(&result)), ctx.format);
			Ok(())
		}
		RedirectResult::Failure(reason) => Err(E2cError::Redirect(reason.to_string())),
	}
}

#[derive(serde::Serialize)]
#[serde(transparent)]
struct OpenReport(RedirectEnvelope);

impl Render for OpenReport {
	fn render(&self, out: &mut dyn Write) -> io::Result<()> {
		let reply = self.0.response.as_ref();
		let pid = reply.and_then(|r| r.get("pid")).and_then(Value::as_u64);
		let browser = reply.and_then(|r| r.get("chrome_path")).and_then(Value::as_str);
		match (pid, browser) {
			(Some(pid), Some(browser)) => writeln!(out, "opened in {browser} (pid {pid})"),
			(Some(pid), None) => writeln!(out, "opened (pid {pid})"),
			_ => writeln!(out, "opened"),
		}
	}
}
