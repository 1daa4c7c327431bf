
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::output::OutputFormat;

/// Edge2Chrome: open matching links in an external browser.
#[derive(Parser, Debug)]
#[command(name = "e2c")]
#[command(about = "Edge2Chrome - manage link rules and the native-messaging launcher")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Output format
	#[arg(short = 'f', long, global = true, value_enum, default_value = "text")]
	pub format: OutputFormat,

	/// Settings file (defaults to <config dir>/e2c/settings.json)
	#[arg(long, global = true, value_name = "FILE")]
	pub settings: Option<PathBuf>,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Send a URL to the external browser through the launcher host.
	Open(OpenArgs),
	/// List the links in a saved HTML page that the rules would redirect.
	Scan(ScanArgs),
	/// Manage URL rules.
	Rules(RulesArgs),
	/// Register the launcher host with the browser.
	Install(InstallArgs),
	/// Check that the extension, host and browser can find each other.
	Diagnose(DiagnoseArgs),
}

#[derive(Args, Debug, Clone)]
pub struct OpenArgs {
	/// Absolute URL to open.
	#[arg(value_name = "URL")]
	pub url: String,

	/// Browser arguments (defaults to the configured chromeArgs).
	#[arg(long, value_name = "ARGS", allow_hyphen_values = true)]
	pub args: Option<String>,

	/// Launcher host executable (defaults to e2c-host next to this binary).
	#[arg(long, value_name = "PATH")]
	pub host: Option<PathBuf>,

	/// Milliseconds to wait for the host's reply.
	#[arg(long, value_name = "MS", default_value_t = 3000)]
	pub timeout_ms: u64,
}

#[derive(Args, Debug, Clone)]
pub struct ScanArgs {
	/// HTML file to scan.
	#[arg(value_name = "FILE")]
	pub file: PathBuf,

	/// Address the page was saved from, for resolving relative links.
	#[arg(long, value_name = "URL")]
	pub base: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct RulesArgs {
	#[command(subcommand)]
	pub action: RulesAction,
}

#[derive(Subcommand, Debug, Clone)]
pub enum RulesAction {
	/// Show configured rules with their index.
	List,
	/// Append a rule, e.g. "*.zhihu.*".
	Add {
		#[arg(value_name = "PATTERN")]
		rule: String,
	},
	/// Remove the rule at INDEX.
	Remove {
		#[arg(value_name = "INDEX")]
		index: usize,
	},
	/// Report which rules match URL.
	Test {
		#[arg(value_name = "URL")]
		url: String,
	},
}

#[derive(Args, Debug, Clone)]
pub struct InstallArgs {
	/// Extension id allowed to talk to the host (repeatable).
	#[arg(long = "extension-id", value_name = "ID", required = true)]
	pub extension_ids: Vec<String>,

	/// Launcher host executable to register (defaults to e2c-host next to this binary).
	#[arg(long, value_name = "PATH")]
	pub host: Option<PathBuf>,

	/// Write the manifest to this file instead of the browsers' directories.
	#[arg(short, long, value_name = "FILE")]
	pub output: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct DiagnoseArgs {
	/// Extension id expected in the manifest's allowed origins.
	#[arg(long = "extension-id", value_name = "ID")]
	pub extension_id: Option<String>,

	/// Manifest to check instead of the installed ones.
	#[arg(long, value_name = "FILE")]
	pub manifest: Option<PathBuf>,
}
