use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod args;
mod report;
mod search;

use search::SearchArgs;

#[derive(Debug, Parser)]
#[command(name = "geodisc")]
#[command(about = "Search places and happenings around a map view")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one discovery search and print the visible results
    Search(SearchArgs),
    /// List the category catalog
    Categories,
}

fn init_tracing(log_level: &str) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(log_level))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("geodisc: pass `search` or `categories`; see --help");
        return Ok(());
    };

    let config = geodisc_core::load_app_config()?;
    init_tracing(&config.log_level)?;

    match command {
        Commands::Search(args) => search::run_search(&config, &args).await?,
        Commands::Categories => search::run_categories(&config).await?,
    }

    Ok(())
}
