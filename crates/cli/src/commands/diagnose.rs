use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use e2c::{Pattern, Settings, parse_settings};
use e2c_protocol::HostManifest;
use serde::Serialize;

use crate::cli::DiagnoseArgs;
use crate::config::{self, HostConfig};
use crate::context::CommandContext;
use crate::error::{E2cError, Result};
use crate::output::{self, Render, status_mark};

#[derive(Debug, Clone, Serialize)]
pub struct Check {
	pub name: &'static str,
	pub ok: bool,
	pub detail: String,
}

impl Check {
	fn pass(name: &'static str, detail: impl Into<String>) -> Self {
		Self {
			name,
			ok: true,
			detail: detail.into(),
		}
	}

	fn fail(name: &'static str, detail: impl Into<String>) -> Self {
		Self {
			name,
			ok: false,
			detail: detail.into(),
		}
	}
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnoseReport {
	pub checks: Vec<Check>,
}

impl DiagnoseReport {
	pub fn failed(&self) -> usize {
		self.checks.iter().filter(|c| !c.ok).count()
	}
}

impl Render for DiagnoseReport {
	fn render(&self, out: &mut dyn Write) -> io::Result<()> {
		for check in &self.checks {
			writeln!(out, "[{:>4}] {:<18} {}", status_mark(check.ok), check.name, check.detail)?;
		}
		Ok(())
	}
}

pub fn execute(args: DiagnoseArgs, ctx: &CommandContext) -> Result<()> {
	let manifests = match args.manifest {
		Some(path) => vec![path],
		None => config::native_messaging_dirs()
			.into_iter()
			.map(|(_, dir)| dir.join(config::manifest_file_name()))
			.collect(),
	};

	let mut checks = check_manifest(&manifests, args.extension_id.as_deref());
	checks.push(check_browser());
	checks.push(check_settings(ctx.settings_path()));

	let report = DiagnoseReport { checks };
	output::print_success("diagnose", &report, ctx.format);
	match report.failed() {
		0 => Ok(()),
		failed => Err(E2cError::ChecksFailed {
			failed,
			total: report.checks.len(),
		}),
	}
}

fn check_manifest(candidates: &[PathBuf], extension_id: Option<&str>) -> Vec<Check> {
	let Some(path) = candidates.iter().find(|p| p.is_file()) else {
		let searched = candidates.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", ");
		return vec![Check::fail("manifest", format!("not found (searched: {searched}); run `e2c install`"))];
	};

	let manifest: HostManifest = match fs::read_to_string(path)
		.map_err(|e| e.to_string())
		.and_then(|s| serde_json::from_str(&s).map_err(|e| e.to_string()))
	{
		Ok(manifest) => manifest,
		Err(err) => return vec![Check::fail("manifest", format!("{}: {err}", path.display()))],
	};

	let mut checks = vec![Check::pass("manifest", path.display().to_string())];

	let host = Path::new(&manifest.path);
	checks.push(if !host.is_absolute() {
		Check::fail("host binary", format!("{} is not an absolute path", manifest.path))
	} else if host.is_file() {
		Check::pass("host binary", manifest.path.clone())
	} else {
		Check::fail("host binary", format!("{} does not exist", manifest.path))
	});

	checks.push(match extension_id {
		Some(id) if manifest.allows(id) => Check::pass("allowed origin", id),
		Some(id) => Check::fail(
			"allowed origin",
			format!("{id} not in [{}]", manifest.allowed_origins.join(", ")),
		),
		None if manifest.allowed_origins.is_empty() => Check::fail("allowed origin", "no extensions allowed"),
		None => Check::pass("allowed origin", manifest.allowed_origins.join(", ")),
	});

	checks
}

fn check_browser() -> Check {
	let config = match HostConfig::load(&config::host_config_path()) {
		Ok(config) => config,
		Err(err) => return Check::fail("browser", format!("host config unreadable: {err}")),
	};
	match config.locator().locate() {
		Ok(path) => Check::pass("browser", path.display().to_string()),
		Err(err) => Check::fail("browser", err.to_string()),
	}
}

fn check_settings(path: &Path) -> Check {
	if !path.exists() {
		return Check::pass("settings", "not saved yet; using defaults");
	}
	let parsed: std::result::Result<Settings, String> = fs::read_to_string(path)
		.map_err(|e| e.to_string())
		.and_then(|s| parse_settings(&s).map_err(|e| e.to_string()));
	match parsed {
		Ok(settings) => {
			let dead = settings.url_rules.iter().filter(|r| !Pattern::compile(r).is_valid()).count();
			if dead == 0 {
				Check::pass("settings", format!("{} rules", settings.url_rules.len()))
			} else {
				Check::fail("settings", format!("{dead} of {} rules never match", settings.url_rules.len()))
			}
		}
		Err(err) => Check::fail("settings", format!("malformed, defaults in use: {err}")),
	}
}
