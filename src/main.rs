mod cli;

use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = cli::Cli::parse();
    if let Err(error) = init_tracing(cli.verbose) {
        eprintln!("continuumcon-ics: {error:#}");
        return ExitCode::from(continuumcon_ics::EXIT_FATAL);
    }

    match continuumcon_ics::run(&cli.options()) {
        Ok(outcome) => {
            outcome.report();
            ExitCode::from(outcome.exit_code())
        }
        Err(error) => {
            eprintln!("Error: {}", error);
            ExitCode::from(continuumcon_ics::EXIT_FATAL)
        }
    }
}

fn init_tracing(verbose: bool) -> anyhow::Result<()> {
    let level = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_env("CONTINUUMCON_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}
