mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use tracing::error;

use metaload_core::config::{load_dotenv, Config};

use crate::cli::{CliArgs, Command};
use crate::commands::App;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!(error = %format!("{e:#}"), "metaload failed");
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = CliArgs::parse();
    let config = Config::from_env();
    config.log_summary();

    let app = App::new(config, args.jobs_dir, args.variables)?;

    match args.command {
        Command::List => commands::list(&app),
        Command::Render {
            job,
            format,
            show_secrets,
        } => commands::render(&app, &job, format, show_secrets)?,
        Command::Run {
            job,
            no_retry,
            dry_run,
        } => commands::run(&app, &job, no_retry, dry_run).await?,
        Command::Serve => commands::serve(app).await?,
    }
    Ok(())
}
