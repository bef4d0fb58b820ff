//! lanecheck - Lane configuration inspection tool
//!
//! Loads a site configuration, builds the lane tree against the built-in
//! taxonomy, and reports it. A configuration the browse services would
//! reject makes lanecheck exit nonzero, so it doubles as a deploy-time
//! check.

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;
use stacks_browse::{store, Lane, LaneInput, LaneList, Taxonomy};
use stacks_common::config::{load_policy, resolve_config_file, resolve_database_path};
use stacks_common::db::open_database_readonly;
use stacks_common::BrowsePolicy;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for lanecheck
#[derive(Parser, Debug)]
#[command(name = "lanecheck")]
#[command(about = "Validate and inspect a Stacks lane configuration")]
#[command(version)]
struct Args {
    /// Site configuration file
    #[arg(short, long, env = "STACKS_CONFIG")]
    config: Option<String>,

    /// Catalog database (read only with --counts)
    #[arg(short, long, env = "STACKS_DATABASE")]
    database: Option<String>,

    /// Emit the resolved lane tree as JSON
    #[arg(long)]
    json: bool,

    /// Report per-lane record counts from the catalog
    #[arg(long)]
    counts: bool,
}

/// The lane-bearing part of the site configuration file. Policy and the
/// database path are read through their own loaders.
#[derive(Debug, Deserialize)]
struct SiteFile {
    #[serde(default)]
    lanes: Vec<LaneInput>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lanecheck=info,stacks_browse=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config_path = resolve_config_file(args.config.as_deref(), "STACKS_CONFIG")
        .context("No site configuration file found")?;
    info!("Configuration: {}", config_path.display());

    let policy = load_policy(Some(&config_path)).context("Invalid [policy] table")?;
    let raw = std::fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read {}", config_path.display()))?;
    let site: SiteFile = toml::from_str(&raw)
        .with_context(|| format!("Failed to parse {}", config_path.display()))?;

    let list = LaneList::build(Taxonomy::builtin(), None, site.lanes)
        .context("Lane configuration is invalid")?;
    info!("Built {} top-level lanes", list.len());

    if args.counts {
        let db_path = resolve_database_path(
            args.database.as_deref(),
            "STACKS_DATABASE",
            Some(&config_path),
        )?;
        info!("Catalog: {}", db_path.display());
        let pool = open_database_readonly(&db_path)
            .await
            .with_context(|| format!("Failed to open {}", db_path.display()))?;
        print_counts(&pool, &policy, list.lanes(), 0).await?;
    } else if args.json {
        let tree: Vec<_> = list.lanes().iter().map(|lane| lane_json(lane)).collect();
        println!("{}", serde_json::to_string_pretty(&json!({ "lanes": tree }))?);
    } else {
        print_tree(list.lanes(), 0);
    }

    Ok(())
}

fn describe(lane: &Lane) -> String {
    let audiences = if lane.audiences().is_empty() {
        "all".to_string()
    } else {
        lane.audiences()
            .iter()
            .map(|a| a.to_db_string())
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!(
        "{} ({}; {} genres; audiences: {}; {} sublanes)",
        lane.name(),
        lane.fiction(),
        lane.genres().len(),
        audiences,
        lane.sublanes().len()
    )
}

fn print_tree(lanes: &[Arc<Lane>], depth: usize) {
    for lane in lanes {
        println!("{}{}", "  ".repeat(depth), describe(lane));
        print_tree(lane.sublanes().lanes(), depth + 1);
    }
}

fn lane_json(lane: &Lane) -> serde_json::Value {
    json!({
        "name": lane.name(),
        "display_name": lane.display_name(),
        "url_name": lane.url_name(),
        "fiction": lane.fiction().as_str(),
        "genres": lane.genres().iter().collect::<Vec<_>>(),
        "audiences": lane.audiences().iter().map(|a| a.to_db_string()).collect::<Vec<_>>(),
        "age_range": lane.age_range().map(|r| json!([r.lower, r.upper])),
        "languages": lane.languages(),
        "sublanes": lane
            .sublanes()
            .lanes()
            .iter()
            .map(|sublane| lane_json(sublane))
            .collect::<Vec<_>>(),
    })
}

/// Count every lane's records from the precomputed representation, the
/// same representation patron-facing feeds read.
async fn print_counts(
    pool: &SqlitePool,
    policy: &BrowsePolicy,
    lanes: &[Arc<Lane>],
    depth: usize,
) -> Result<()> {
    for lane in lanes {
        let query = lane.summary_query(policy);
        let count = store::count(pool, &query).await?;
        println!("{}{}: {}", "  ".repeat(depth), lane.name(), count);
        Box::pin(print_counts(pool, policy, lane.sublanes().lanes(), depth + 1)).await?;
    }
    Ok(())
}
