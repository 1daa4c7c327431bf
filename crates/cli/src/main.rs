use clap::Parser;
use e2c_cli::cli::Cli;
use e2c_cli::commands;
use e2c_cli::error::E2cError;
use e2c_cli::logging;
use e2c_cli::output::{self, OutputFormat};

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	let format = cli.format;
	let command = commands::command_name(&cli.command);

	if let Err(err) = commands::dispatch(cli).await {
		handle_error(command, &err, format);
		std::process::exit(1);
	}
}

fn handle_error(command: &str, err: &E2cError, format: OutputFormat) {
	// Diagnose already printed its report; only the summary is left.
	output::print_failure(command, err.code(), &err.to_string(), format);
}
