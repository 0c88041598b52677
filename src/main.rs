use anyhow::Context;
use clap::Parser;

use provider_search_etl::{bench, cli, extract, feed, queries, settings::Settings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = cli::Args::parse();
    let settings = Settings::load(&args.settings)
        .with_context(|| format!("Failed loading settings {}", args.settings.display()))?;

    match args.cmd {
        cli::Command::Extract => extract::run(&settings).context("extract failed"),
        cli::Command::Feed => feed::run(&settings).await.context("feed failed"),
        cli::Command::Queries => queries::run(&settings).context("queries failed"),
        cli::Command::Bench => bench::run(&settings).context("bench failed"),
    }
}
