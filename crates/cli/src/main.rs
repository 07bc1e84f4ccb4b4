use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use suite_sso_cli::cli::Cli;
use suite_sso_cli::commands::{self, CommandContext};
use suite_sso_cli::error::CliError;
use suite_sso_cli::logging;
use suite_sso_cli::output::{ErrorCode, ResultBuilder, print_result};
use tracing::error;

async fn run(cli: Cli) -> anyhow::Result<serde_json::Value> {
	let ctx = CommandContext::from_cli(&cli).context("failed to prepare command context")?;
	let data = commands::dispatch(cli.command, &ctx).await?;
	Ok(data)
}

#[tokio::main]
async fn main() -> ExitCode {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	let format = cli.format;
	let builder = ResultBuilder::new(cli.command.name()).origin(cli.command.origin());

	let result = match run(cli).await {
		Ok(data) => builder.data(data).build(),
		Err(err) => {
			error!(target = "sso.cli", error = %format!("{err:#}"), "command failed");
			let code = err.downcast_ref::<CliError>().map(CliError::code).unwrap_or(ErrorCode::InternalError);
			builder.error(code, format!("{err:#}")).build()
		}
	};

	print_result(&result, format);
	if result.ok { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}
