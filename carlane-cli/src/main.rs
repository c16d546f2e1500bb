use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::warn;

use carlane_feed::load_from_csv;
use carlane_gateway::{CatalogGateway, HttpGateway};
use carlane_store::{IdentityStore, SqliteStore};
use carlane_sync::{RetryPolicy, SyncConfig, SyncEngine};

mod config;
mod render;

use config::Settings;

#[derive(Parser)]
#[command(name = "carlane")]
#[command(about = "Synchronize a partner vehicle feed with the Carlane leasing catalog", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Synchronize a feed file with the platform
    Sync {
        /// Path to the partner CSV export
        feed: PathBuf,

        /// Close vehicles that are missing from the feed
        #[arg(long)]
        close_missing: bool,

        /// Push price changes for existing vehicles
        #[arg(long)]
        update_prices: bool,

        /// Compute and print the plan without calling the platform
        #[arg(long)]
        dry_run: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Preview the operation plan for a feed file
    Plan {
        /// Path to the partner CSV export
        feed: PathBuf,

        /// Close vehicles that are missing from the feed
        #[arg(long)]
        close_missing: bool,

        /// Push price changes for existing vehicles
        #[arg(long)]
        update_prices: bool,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Cross-check the identity store against the platform
    Check {
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Drift between the identity store and the live platform listing.
#[derive(Debug, Serialize)]
struct DriftReport {
    /// Known locally but not listed on the platform.
    missing_remotely: Vec<String>,
    /// Listed on the platform but unknown locally.
    untracked_locally: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    match cli.command {
        Commands::Sync {
            feed,
            close_missing,
            update_prices,
            dry_run,
            json,
        } => {
            if dry_run {
                return plan_command(feed, close_missing, update_prices, json).await;
            }
            sync_command(feed, close_missing, update_prices, json).await
        }
        Commands::Plan {
            feed,
            close_missing,
            update_prices,
            json,
        } => plan_command(feed, close_missing, update_prices, json).await,
        Commands::Check { json } => check_command(json).await,
    }
}

async fn sync_command(
    feed: PathBuf,
    close_missing: bool,
    update_prices: bool,
    json: bool,
) -> Result<()> {
    let settings = Settings::from_env()?;
    let batch = load_from_csv(&feed)
        .with_context(|| format!("Failed to load feed from {}", feed.display()))?;
    for error in &batch.errors {
        warn!("Rejected feed row: {error}");
    }

    let store = open_store(&settings).await?;
    let gateway = build_gateway(&settings)?;
    let engine = SyncEngine::new(
        store,
        gateway,
        SyncConfig {
            close_missing,
            update_prices,
            retry: RetryPolicy {
                max_attempts: settings.max_attempts,
                ..RetryPolicy::default()
            },
            concurrency: settings.concurrency,
        },
    );

    // Ctrl-C stops dispatching; in-flight calls drain first.
    let cancel = engine.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight operations");
            cancel.cancel();
        }
    });

    let report = engine.run(&batch.records, batch.errors).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render::render_report(&report));
    }
    Ok(())
}

async fn plan_command(
    feed: PathBuf,
    close_missing: bool,
    update_prices: bool,
    json: bool,
) -> Result<()> {
    let settings = Settings::from_env()?;
    let batch = load_from_csv(&feed)
        .with_context(|| format!("Failed to load feed from {}", feed.display()))?;

    let store = open_store(&settings).await?;
    let options = carlane_sync::PlanOptions {
        close_missing,
        update_prices,
    };
    let plan = carlane_sync::Reconciler::new(store.as_ref(), options)
        .plan(&batch.records)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        print!("{}", render::render_plan(&plan));
        for error in &batch.errors {
            println!("rejected row: {error}");
        }
    }
    Ok(())
}

async fn check_command(json: bool) -> Result<()> {
    let settings = Settings::from_env()?;
    let store = open_store(&settings).await?;
    let gateway = build_gateway(&settings)?;

    let known = store.known_external_ids().await?;
    let listings = gateway
        .list_active_vehicles()
        .await
        .context("Failed to list active vehicles")?;
    let remote: BTreeSet<String> = listings
        .into_iter()
        .map(|listing| listing.external_id)
        .collect();

    let drift = DriftReport {
        missing_remotely: known.difference(&remote).cloned().collect(),
        untracked_locally: remote.difference(&known).cloned().collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&drift)?);
    } else if drift.missing_remotely.is_empty() && drift.untracked_locally.is_empty() {
        println!("Identity store and platform agree on {} vehicles.", known.len());
    } else {
        for vin in &drift.missing_remotely {
            println!("known locally, missing on platform: {vin}");
        }
        for vin in &drift.untracked_locally {
            println!("listed on platform, unknown locally: {vin}");
        }
    }
    Ok(())
}

async fn open_store(settings: &Settings) -> Result<Arc<dyn IdentityStore>> {
    if let Some(parent) = settings.state_db.parent() {
        std::fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create state directory {}", parent.display())
        })?;
    }
    let store = SqliteStore::open(&settings.state_db)
        .await
        .with_context(|| {
            format!("Failed to open identity store {}", settings.state_db.display())
        })?;
    Ok(Arc::new(store))
}

fn build_gateway(settings: &Settings) -> Result<Arc<dyn CatalogGateway>> {
    let token = settings.require_token()?;
    let gateway = HttpGateway::new(&settings.api_base_url, token, settings.timeout)
        .context("Failed to build platform gateway")?;
    Ok(Arc::new(gateway))
}
