//! grace - graceful port forwarder

use clap::Parser;
use std::process::ExitCode;

use grace::cli::commands;
use grace::cli::exit_code::ExitCode as GraceExitCode;
use grace::cli::{Cli, Commands};
use grace::config::GraceDir;
use grace::logging::{LogConfig, init_with_config};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            GraceExitCode::for_error(&e).into()
        }
    }
}

async fn dispatch(cli: Cli) -> anyhow::Result<ExitCode> {
    let dir = GraceDir::from_arg(&cli.dir)?;

    // The background daemon has no terminal; it logs into its base directory
    let mut log_config = LogConfig::new(cli.verbose, cli.quiet);
    if let Commands::Run(args) = &cli.command
        && !args.foreground
    {
        std::fs::create_dir_all(dir.root())?;
        log_config = log_config.with_log_file(dir.log_file());
    }
    init_with_config(log_config)?;

    match cli.command {
        Commands::Start(args) => return commands::start::execute(args, &dir).await,
        Commands::Stop(args) => commands::stop::execute(args, &dir).await?,
        Commands::Ls(args) => commands::ls::execute(args, &dir).await?,
        Commands::Switch(args) => commands::switch::execute(args, &dir).await?,
        Commands::Wait(args) => commands::wait::execute(args, &dir).await?,
        Commands::Add(args) => commands::add::execute(args, &dir).await?,
        Commands::Rm(args) => commands::rm::execute(args, &dir).await?,
        Commands::Run(_) => commands::run::execute(&dir).await?,
    }

    Ok(ExitCode::SUCCESS)
}
