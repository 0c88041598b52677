use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "provider_search_etl")]
#[command(
    about = "Flatten provider extracts, feed a document search engine, and benchmark query throughput",
    long_about = None
)]
pub struct Args {
    /// Path to the TOML settings file.
    #[arg(long, default_value = "settings.toml")]
    pub settings: PathBuf,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Flatten raw provider extracts into tabular datasets.
    Extract,
    /// Feed the tabular datasets into the search engine.
    Feed,
    /// Sample stored records into a synthetic query file.
    Queries,
    /// Run the external load generator and print its report.
    Bench,
}
