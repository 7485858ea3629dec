//! `search` and `categories` command handlers.
//!
//! A search spins up a discovery driver against the configured backend,
//! feeds it the command-line criteria as if a user had set them one by one,
//! waits for the session to settle and prints what is visible.

use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use geodisc_client::DiscoveryClient;
use geodisc_core::{AppConfig, CategoryCatalog, Coordinate, TypeSelector};
use geodisc_engine::{
    channel, BoundingBox, Command, DiscoverySession, EngineConfig, GeolocationError, Snapshot,
    StaticGeolocation,
};

use crate::args::{parse_bounds, parse_coordinate};
use crate::report;

const COMMAND_CAPACITY: usize = 32;

#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Free-text search
    #[arg(long, default_value = "")]
    pub text: String,
    /// Entity types to search: all, places or happenings
    #[arg(long = "type", default_value = "all")]
    pub type_selector: TypeSelector,
    /// Category slug from the catalog
    #[arg(long)]
    pub category: Option<String>,
    /// Only featured records
    #[arg(long)]
    pub featured: bool,
    /// Anchor proximity mode at LAT,LNG
    #[arg(long, value_parser = parse_coordinate, allow_hyphen_values = true)]
    pub near: Option<Coordinate>,
    /// Proximity radius in meters
    #[arg(long)]
    pub radius: Option<f64>,
    /// Map viewport as SOUTH,WEST,NORTH,EAST
    #[arg(long, value_parser = parse_bounds, allow_hyphen_values = true)]
    pub bounds: Option<BoundingBox>,
    /// Map zoom level
    #[arg(long)]
    pub zoom: Option<f64>,
    /// Extra pages to load after the first
    #[arg(long, default_value = "0")]
    pub pages: u32,
    /// Expand the marker group with this key
    #[arg(long)]
    pub expand: Option<String>,
    /// Print the final snapshot as JSON
    #[arg(long)]
    pub json: bool,
}

impl SearchArgs {
    /// Whether any criterion will itself commit a search.
    fn commits_search(&self) -> bool {
        !self.text.trim().is_empty()
            || self.type_selector != TypeSelector::All
            || self.category.is_some()
            || self.featured
    }
}

/// Loads the catalog from `GEODISC_CATEGORIES_PATH` when set, otherwise
/// from the backend.
async fn load_catalog(
    config: &AppConfig,
    client: &DiscoveryClient,
) -> anyhow::Result<CategoryCatalog> {
    match &config.categories_path {
        Some(path) => geodisc_core::load_categories(path)
            .with_context(|| format!("failed to load categories from {}", path.display())),
        None => client
            .categories()
            .await
            .context("failed to fetch categories from backend"),
    }
}

/// Run one discovery search and print the result.
///
/// # Errors
///
/// Returns an error if the client cannot be built, the catalog cannot be
/// loaded, a criterion is rejected, or the driver stops unexpectedly.
/// Backend failures during the search are reported in the output, not
/// propagated.
pub(crate) async fn run_search(config: &AppConfig, args: &SearchArgs) -> anyhow::Result<()> {
    let client = DiscoveryClient::from_app_config(config)?;
    let catalog = load_catalog(config, &client).await?;
    let session = DiscoverySession::new(EngineConfig::from_app_config(config), catalog);

    let geolocation = match args.near {
        Some(at) => StaticGeolocation::at(at),
        None => StaticGeolocation::failing(GeolocationError::Unavailable(
            "no --near coordinate given".to_string(),
        )),
    };

    let (driver, mut handle) = channel(
        session,
        Arc::new(client),
        Arc::new(geolocation),
        COMMAND_CAPACITY,
    );
    let task = tokio::spawn(driver.run());

    let mut commands = Vec::new();
    if let Some(zoom) = args.zoom {
        commands.push(Command::SetZoom(zoom));
    }
    if let Some(bounds) = args.bounds {
        commands.push(Command::SetBounds(Some(bounds)));
    }
    if let Some(radius) = args.radius {
        commands.push(Command::SetRadius(radius));
    }
    if args.near.is_some() {
        commands.push(Command::Locate);
    }
    if !args.commits_search() {
        commands.push(Command::Refresh);
    }
    if !args.text.trim().is_empty() {
        commands.push(Command::SetFreeText(args.text.clone()));
    }
    if args.type_selector != TypeSelector::All {
        commands.push(Command::SetTypeSelector(args.type_selector));
    }
    if let Some(slug) = &args.category {
        commands.push(Command::SetCategory(Some(slug.clone())));
    }
    if args.featured {
        commands.push(Command::SetFeaturedOnly(true));
    }

    for command in commands {
        tracing::debug!(?command, "sending");
        handle.send(command).await?;
    }
    let mut snapshot = checked(handle.settled().await?)?;

    for page in 0..args.pages {
        if snapshot.cursors.all_exhausted(args.type_selector) {
            tracing::info!(page, "no more results to load");
            break;
        }
        handle.send(Command::FetchMore).await?;
        snapshot = checked(handle.settled().await?)?;
        if snapshot.status.retry.is_some() {
            break;
        }
    }

    if let Some(key) = &args.expand {
        handle.send(Command::ActivateGroup(key.clone())).await?;
        snapshot = checked(handle.settled().await?)?;
    }

    drop(handle);
    task.await.context("discovery driver panicked")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print!("{}", report::render(&snapshot));
    }

    Ok(())
}

/// Fails on a rejected command, which for a one-shot run means bad input.
fn checked(snapshot: Snapshot) -> anyhow::Result<Snapshot> {
    match &snapshot.last_error {
        Some(error) => anyhow::bail!("{error}"),
        None => Ok(snapshot),
    }
}

/// Print the category catalog.
///
/// # Errors
///
/// Returns an error if the catalog cannot be loaded.
pub(crate) async fn run_categories(config: &AppConfig) -> anyhow::Result<()> {
    let client = DiscoveryClient::from_app_config(config)?;
    let catalog = load_catalog(config, &client).await?;
    print!("{}", report::render_categories(&catalog));
    Ok(())
}
