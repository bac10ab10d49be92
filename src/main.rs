use anyhow::{Context, Result};
use clap::Parser;
use stars_courier::{cli_args, config::Settings, infra::telemetry, run_courier};
use std::process::ExitCode;
use tracing::info;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = ?err, "Fatal error");
            eprintln!("Fatal error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let args = cli_args::parse();
    let settings = Settings::load(args.config.as_deref()).context("load configuration")?;
    let _guard = telemetry::init(&settings.logs_dir);

    info!("Starting");

    run_courier(&settings).await
}
