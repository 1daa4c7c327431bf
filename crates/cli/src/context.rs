//! Shared state handed to every command.

use std::path::{Path, PathBuf};

use e2c::{FileSettingsStore, Settings, SettingsStore};

use crate::cli::Cli;
use crate::config;
use crate::output::OutputFormat;

#[derive(Debug, Clone)]
pub struct CommandContext {
	pub format: OutputFormat,
	settings_path: PathBuf,
}

impl CommandContext {
	pub fn new(format: OutputFormat, settings_path: PathBuf) -> Self {
		Self { format, settings_path }
	}

	pub fn from_cli(cli: &Cli) -> Self {
		Self::new(cli.format, cli.settings.clone().unwrap_or_else(config::settings_path))
	}

	pub fn settings_path(&self) -> &Path {
		&self.settings_path
	}

	pub fn settings_store(&self) -> FileSettingsStore {
		FileSettingsStore::open(&self.settings_path)
	}

	pub fn settings(&self) -> Settings {
		self.settings_store().current()
	}
}
