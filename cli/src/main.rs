use std::process::ExitCode;

use clap::Parser;

mod cli;
mod commands;
mod config;
mod error;

use cli::{Cli, Commands};
use config::{load_config, merge_config};
use error::{CliResult, to_exit_code};

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr; with --stdio, stdout carries frames only
    let filter = if cli.verbose {
        "wdk_bridge=debug,wdk_bridge_cli=debug"
    } else {
        "wdk_bridge=warn,wdk_bridge_cli=info"
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    // smol's global executor runs spawned connection tasks on its own threads
    let result = smol::block_on(async_main(cli));
    to_exit_code(result)
}

async fn async_main(cli: Cli) -> CliResult<()> {
    let file_config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve(args) => {
            let config = merge_config(file_config, args.socket.as_deref(), None, &args.common)?;
            commands::serve::execute(args, config).await
        }
        Commands::Call(args) => {
            let config = merge_config(
                file_config,
                args.socket.as_deref(),
                args.timeout,
                &args.common,
            )?;
            commands::call::execute(args, config).await
        }
    }
}
