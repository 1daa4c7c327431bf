mod diagnose;
mod install;
mod open;
mod rules;
mod scan;

use crate::cli::{Cli, Commands};
use crate::context::CommandContext;
use crate::error::Result;

pub use diagnose::{Check, DiagnoseReport};
pub use install::InstallReport;
pub use scan::{ScanHit, ScanReport};

pub async fn dispatch(cli: Cli) -> Result<()> {
	let ctx = CommandContext::from_cli(&cli);
	match cli.command {
		Commands::Open(args) => open::execute(args, &ctx).await,
		Commands::Scan(args) => scan::execute(args, &ctx),
		Commands::Rules(args) => rules::execute(args.action, &ctx),
		Commands::Install(args) => install::execute(args, &ctx),
		Commands::Diagnose(args) => diagnose::execute(args, &ctx),
	}
}

/// Dotted name used in the JSON envelope.
pub fn command_name(command: &Commands) -> &'static str {
	use crate::cli::RulesAction;
	match command {
		Commands::Open(_) => "open",
		Commands::Scan(_) => "scan",
		Commands::Rules(args) => match args.action {
			RulesAction::List => "rules.list",
			RulesAction::Add { .. } => "rules.add",
			RulesAction::Remove { .. } => "rules.remove",
			RulesAction::Test { .. } => "rules.test",
		},
		Commands::Install(_) => "install",
		Commands::Diagnose(_) => "diagnose",
	}
}
