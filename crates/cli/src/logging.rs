use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Log file name prefix for the launcher host.
const HOST_LOG_PREFIX: &str = "e2c-host";

pub fn init_logging(verbosity: u8) {
	// 0 = errors only, library warnings included
	// 1 (-v) = info for e2c
	// 2+ (-vv) = debug for everything
	let filter = match verbosity {
		0 => "warn",
		1 => "info",
		_ => "debug",
	};

	let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

	let stderr = std::io::stderr.with_max_level(tracing::Level::TRACE);

	tracing_subscriber::fmt()
		.with_env_filter(env_filter)
		.with_writer(stderr)
		.with_target(true)
		.with_level(true)
		.compact()
		.init();
}

/// Logging for the launcher host.
///
/// Stdout carries the native-messaging frames, so events go to stderr (which
/// the browser collects) and, when `log_dir` is set, to a daily rolling file.
/// Keep the returned guard alive until exit or buffered lines are lost.
pub fn init_host_logging(log_dir: Option<&Path>) -> Option<WorkerGuard> {
	let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
	let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_ansi(false).compact();

	let file = log_dir.and_then(|dir| {
		let appender = RollingFileAppender::builder()
			.rotation(Rotation::DAILY)
			.filename_prefix(HOST_LOG_PREFIX)
			.filename_suffix("log")
			.max_log_files(7)
			.build(dir);
		match appender {
			Ok(appender) => Some(tracing_appender::non_blocking(appender)),
			Err(err) => {
				eprintln!("e2c-host: cannot log to {}: {err}", dir.display());
				None
			}
		}
	});

	let (file_layer, guard) = match file {
		Some((writer, guard)) => (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard)),
		None => (None, None),
	};

	tracing_subscriber::registry()
		.with(env_filter)
		.with(stderr_layer)
		.with(file_layer)
		.init();

	guard
}
