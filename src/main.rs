use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    let cli = ledscore::cli::Cli::parse();
    ledscore::logging::init(&cli.log_level).context("init logging")?;
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        ledscore::cli::Command::Run(args) => {
            ledscore::pipeline::run(args).await.context("run")?;
        }
        ledscore::cli::Command::Inspect(args) => {
            ledscore::pipeline::inspect(args).await.context("inspect")?;
        }
        ledscore::cli::Command::Score(args) => {
            ledscore::score::run(args).context("score")?;
        }
    }

    Ok(())
}
