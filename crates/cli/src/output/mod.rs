//! Result envelope for CLI commands.
//!
//! With `--format json` every command writes one envelope to stdout:
//!
//! ```json
//! { "ok": true, "command": "rules.add", "data": { ... } }
//! ```
//!
//! On failure:
//!
//! ```json
//! { "ok": false, "command": "open", "error": { "code": "REDIRECT_FAILED", "message": "..." } }
//! ```
//!
//! Text output is for people and has no stable shape.


use std::io::{self, Write};

use colored::Colorize;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
	/// Human-readable text
	#[default]
	Text,
	/// JSON envelope
	Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandError {
	pub code: String,
	pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommandResult<T> {
	pub ok: bool,
	pub command: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub data: Option<T>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<CommandError>,
}

impl<T: Serialize> CommandResult<T> {
	pub fn success(command: impl Into<String>, data: T) -> Self {
		Self {
			ok: true,
			command: command.into(),
			data: Some(data),
			error: None,
		}
	}
}

impl CommandResult<()> {
	pub fn failure(command: impl Into<String>, code: &str, message: impl Into<String>) -> Self {
		Self {
			ok: false,
			command: command.into(),
			data: None,
			error: Some(CommandError {
				code: code.to_string(),
				message: message.into(),
			}),
		}
	}
}

/// Something a command can render for people.
pub trait Render {
	fn render(&self, out: &mut dyn Write) -> io::Result<()>;
}

/// Prints a successful result.
pub fn print_success<T: Serialize + Render>(command: &str, data: &T, format: OutputFormat) {
	let mut stdout = io::stdout().lock();
	let written = match format {
		OutputFormat::Text => data.render(&mut stdout),
		OutputFormat::Json => write_json(&mut stdout, &CommandResult::success(command, data)),
	};
	if let Err(err) = written {
		tracing::debug!(target = "e2c", error = %err, "stdout closed");
	}
}

/// Prints a failure: always to stderr, and as an envelope on stdout in JSON mode.
pub fn print_failure(command: &str, code: &str, message: &str, format: OutputFormat) {
	eprintln!("{} {message}", "error:".red().bold());
	if format == OutputFormat::Json {
		let _ = write_json(&mut io::stdout().lock(), &CommandResult::failure(command, code, message));
	}
}

fn write_json<T: Serialize>(out: &mut dyn Write, value: &T) -> io::Result<()> {
	let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
	writeln!(out, "{json}")
}

/// Marks a check result for text output.
pub fn status_mark(ok: bool) -> colored::ColoredString {
	if ok { "ok".green().bold() } else { "FAIL".red().bold() }
}
