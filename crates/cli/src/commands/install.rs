use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use e2c_protocol::{HOST_NAME, HostManifest};
use serde::Serialize;
use tracing::info;

use crate::cli::InstallArgs;
use crate::config;
use crate::context::CommandContext;
use crate::error::{E2cError, Result};
use crate::host::sibling_host_path;
use crate::output::{self, Render};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallReport {
	pub manifest: HostManifest,
	pub written: Vec<PathBuf>,
	/// Registry command to run by hand on Windows.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub registry_command: Option<String>,
}

impl Render for InstallReport {
	fn render(&self, out: &mut dyn Write) -> io::Result<()> {
		for path in &self.written {
			writeln!(out, "wrote {}", path.display())?;
		}
		writeln!(out, "host: {}", self.manifest.path)?;
		for origin in &self.manifest.allowed_origins {
			writeln!(out, "allowed: {origin}")?;
		}
		if let Some(command) = &self.registry_command {
			writeln!(out, "\nRegister the host by running:\n  {command}")?;
		}
		Ok(())
	}
}

pub fn execute(args: InstallArgs, ctx: &CommandContext) -> Result<()> {
	let host = args
		.host
		.or_else(sibling_host_path)
		.ok_or_else(|| anyhow::anyhow!("cannot locate e2c-host; pass --host"))?;
	let host = fs::canonicalize(&host).unwrap_or(host);
	let report = install(&host, &args.extension_ids, args.output, &targets())?;
	output::print_success("install", &report, ctx.format);
	Ok(())
}

/// Where manifests go when no `--output` is given.
fn targets() -> Vec<PathBuf> {
	let dirs = config::native_messaging_dirs();
	if dirs.is_empty() {
		// Registry-based platforms: keep the manifest with our own config.
		return vec![config::config_dir()];
	}
	dirs.into_iter().map(|(_, dir)| dir).collect()
}

fn install(host: &Path, extension_ids: &[String], output: Option<PathBuf>, dirs: &[PathBuf]) -> Result<InstallReport> {
	let manifest = HostManifest::launcher(host.display().to_string(), extension_ids);
	let json = serde_json::to_string_pretty(&manifest)?;

	let paths = match output {
		Some(path) => vec![path],
		None if dirs.is_empty() => return Err(E2cError::NoManifestDir),
		None => dirs.iter().map(|dir| dir.join(config::manifest_file_name())).collect(),
	};

	for path in &paths {
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent).map_err(|source| E2cError::Write {
				path: parent.to_path_buf(),
				source,
			})?;
		}
		fs::write(path, &json).map_err(|source| E2cError::Write {
			path: path.clone(),
			source,
		})?;
		info!(target = "e2c", path = %path.display(), "host manifest written");
	}

	let registry_command = cfg!(windows).then(|| registry_command(&paths[0]));
	Ok(InstallReport {
		manifest,
		written: paths,
		registry_command,
	})
}

fn registry_command(manifest: &Path) -> String {
	format!(
		r#"REG ADD "HKCU\Software\Microsoft\Edge\NativeMessagingHosts\{HOST_NAME}" /ve /t REG_SZ /d "{}" /f"#,
		manifest.display()
	)
}

#[cfg(test)]
mod tests {
	use tempfile::TempDir;

	use super::*;

	#[test]
	fn writes_manifest_into_each_dir() {
		let tmp = TempDir::new().unwrap();
		let dirs = vec![tmp.path().join("edge"), tmp.path().join("chrome")];

		let report = install(Path::new("/opt/e2c/e2c-host"), &["abc".to_string()], None, &dirs).unwrap();

		assert_eq!(report.written.len(), 2);
		for dir in &dirs {
			let written: HostManifest =
				serde_json::from_str(&fs::read_to_string(dir.join("com.edge2chrome.launcher.json")).unwrap()).unwrap();
			assert_eq!(written.path, "/opt/e2c/e2c-host");
			assert!(written.allows("abc"));
		}
	}

	#[test]
	fn explicit_output_wins() {
		let tmp = TempDir::new().unwrap();
		let out = tmp.path().join("custom").join("host.json");

		let report = install(Path::new("/h"), &["abc".to_string()], Some(out.clone()), &[]).unwrap();
		assert_eq!(report.written, vec![out.clone()]);
		assert!(out.is_file());
	}

	#[test]
	fn no_target_is_an_error() {
		let err = install(Path::new("/h"), &["abc".to_string()], None, &[]).unwrap_err();
		assert!(matches!(err, E2cError::NoManifestDir));
	}

	#[test]
	fn registry_command_names_host() {
		let command = registry_command(Path::new(r"C:\e2c\host.json"));
		assert!(command.contains(r"NativeMessagingHosts\com.edge2chrome.launcher"));
		assert!(command.contains(r#"/d "C:\e2c\host.json""#));
	}
}
