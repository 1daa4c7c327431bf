//! Settings stores.
//!
//! The page agent and dispatcher never reach for global state; they receive a
//! [`SettingsStore`] and subscribe to it. Subscribers see every replacement
//! through a [`watch`] channel and re-read the whole record, so a value that
//! changes mid-evaluation is picked up by the next notification.

use std::fs;
use std::path::{Path, PathBuf};

use e2c_protocol::Settings;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::pattern::{Pattern, RuleSet};

/// Shortest rule accepted by [`add_rule`].
pub const MIN_RULE_LEN: usize = 3;

/// Persisted key-value settings with change notification.
pub trait SettingsStore: Send + Sync {
	/// Snapshot of the current settings.
	fn current(&self) -> Settings;

	/// Receiver notified on every replacement.
	fn subscribe(&self) -> watch::Receiver<Settings>;

	/// Replaces the stored settings and notifies subscribers.
	fn replace(&self, settings: Settings) -> Result<()>;
}

/// Applies `edit` to a copy of the current settings and stores the result.
///
/// Nothing is stored when `edit` fails.
pub fn modify<F>(store: &dyn SettingsStore, edit: F) -> Result<Settings>
where
	F: FnOnce(&mut Settings) -> Result<()>,
{
	let mut settings = store.current();
	edit(&mut settings)?;
	store.replace(settings.clone())?;
	Ok(settings)
}

/// Appends a rule after trimming it.
pub fn add_rule(settings: &mut Settings, rule: &str) -> Result<()> {
	let rule = rule.trim();
	if rule.chars().count() < MIN_RULE_LEN {
		return Err(Error::RuleTooShort {
			rule: rule.to_string(),
			min: MIN_RULE_LEN,
		});
	}
	if settings.url_rules.iter().any(|r| r == rule) {
		return Err(Error::DuplicateRule(rule.to_string()));
	}
	settings.url_rules.push(rule.to_string());
	Ok(())
}

/// Removes and returns the rule at `index`.
pub fn remove_rule(settings: &mut Settings, index: usize) -> Result<String> {
	let len = settings.url_rules.len();
	if index >= len {
		return Err(Error::RuleIndex { index, len });
	}
	Ok(settings.url_rules.remove(index))
}

/// Every configured rule that matches `url`, in configured order.
pub fn test_url(settings: &Settings, url: &str) -> Vec<String> {
	RuleSet::new(&settings.url_rules)
		.matching(url)
		.map(Pattern::as_str)
		.map(str::to_string)
		.collect()
}

/// In-memory store, used by tests and embedders that persist elsewhere.
#[derive(Debug)]
pub struct MemorySettingsStore {
	tx: watch::Sender<Settings>,
}

impl MemorySettingsStore {
	pub fn new(settings: Settings) -> Self {
		let (tx, _rx) = watch::channel(settings);
		Self { tx }
	}
}

impl Default for MemorySettingsStore {
	fn default() -> Self {
		Self::new(Settings::default())
	}
}

impl SettingsStore for MemorySettingsStore {
	fn current(&self) -> Settings {
		self.tx.borrow().clone()
	}

	fn subscribe(&self) -> watch::Receiver<Settings> {
		self.tx.subscribe()
	}

	fn replace(&self, settings: Settings) -> Result<()> {
		self.tx.send_replace(settings);
		Ok(())
	}
}

/// JSON file store.
///
/// A missing file yields defaults silently; a malformed file yields defaults
/// with a warning and is left untouched until the next [`replace`](SettingsStore::replace).
#[derive(Debug)]
pub struct FileSettingsStore {
	path: PathBuf,
	tx: watch::Sender<Settings>,
}

impl FileSettingsStore {
	pub fn open(path: impl Into<PathBuf>) -> Self {
		let path = path.into();
		let settings = load_settings(&path);
		let (tx, _rx) = watch::channel(settings);
		Self { path, tx }
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Re-reads the file, notifying subscribers only if the contents changed.
	pub fn reload(&self) -> Settings {
		let fresh = load_settings(&self.path);
		self.tx.send_if_modified(|current| {
			if *current == fresh {
				false
			} else {
				*current = fresh.clone();
				true
			}
		});
		fresh
	}
}

impl SettingsStore for FileSettingsStore {
	fn current(&self) -> Settings {
		self.tx.borrow().clone()
	}

	fn subscribe(&self) -> watch::Receiver<Settings> {
		self.tx.subscribe()
	}

	fn replace(&self, settings: Settings) -> Result<()> {
		save_settings(&self.path, &settings)?;
		self.tx.send_replace(settings);
		Ok(())
	}
}

/// Loads settings, falling back to defaults on a missing or malformed file.
pub fn load_settings(path: &Path) -> Settings {
	let content = match fs::read_to_string(path) {
		Ok(content) => content,
		Err(err) => {
			debug!(target = "e2c", path = %path.display(), error = %err, "settings file unavailable; using defaults");
			return Settings::default();
		}
	};
	match parse_settings(&content) {
		Ok(settings) => settings,
		Err(err) => {
			warn!(target = "e2c", path = %path.display(), error = %err, "malformed settings file; using defaults");
			Settings::default()
		}
	}
}

/// Parses a settings document.
///
/// Only a JSON object is accepted; serde would otherwise read a bare array as
/// an all-defaults record.
pub fn parse_settings(content: &str) -> Result<Settings> {
	let value: serde_json::Value = serde_json::from_str(content)?;
	if !value.is_object() {
		return Err(Error::SettingsNotObject);
	}
	Ok(serde_json::from_value(value)?)
}

fn save_settings(path: &Path, settings: &Settings) -> Result<()> {
	let write = |path: &Path| -> std::io::Result<()> {
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent)?;
		}
		let json = serde_json::to_string_pretty(settings).map_err(std::io::Error::other)?;
		fs::write(path, json)
	};
	write(path).map_err(|source| Error::SettingsWrite {
		path: path.to_path_buf(),
		source,
	})
}
