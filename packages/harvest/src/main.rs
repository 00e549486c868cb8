#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the ord inscription harvester.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use ord_harvest::{HarvestProgress, config::HarvestConfig, run_harvest};
use ord_harvest_cli_utils::{IndicatifProgress, init_logger};
use ord_harvest_database::{InscriptionStore, duckdb_store::DuckDbStore, memory::MemoryStore};
use ord_harvest_models::Height;
use ord_harvest_source::{InscriptionSource, client::OrdClient};

#[derive(Parser)]
#[command(name = "ord_harvest", about = "Incremental ord inscription harvester")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Harvest every block from the stored checkpoint up to the server's
    /// current height
    Run {
        #[command(flatten)]
        config: HarvestConfig,
        /// `DuckDB` database file
        #[arg(long, env = "ORD_HARVEST_DATABASE", required_unless_present = "dry_run")]
        database: Option<PathBuf>,
        /// Harvest into memory instead of the database and only report
        /// counts
        #[arg(long)]
        dry_run: bool,
    },
    /// Show how far the store is behind the server
    Status {
        #[command(flatten)]
        config: HarvestConfig,
        /// `DuckDB` database file
        #[arg(long, env = "ORD_HARVEST_DATABASE")]
        database: PathBuf,
    },
    /// Delete every stored inscription revealed in one block
    Rollback {
        /// Block height to delete
        height: Height,
        /// `DuckDB` database file
        #[arg(long, env = "ORD_HARVEST_DATABASE")]
        database: PathBuf,
    },
    /// Create the database schema and indexes
    Migrate {
        /// `DuckDB` database file
        #[arg(long, env = "ORD_HARVEST_DATABASE")]
        database: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            database,
            dry_run,
        } => {
            config.validate()?;
            let source = Arc::new(OrdClient::new(&config.ord_host, &config.client_options())?);
            let progress = HarvestProgress {
                blocks: IndicatifProgress::blocks_bar(&multi),
                inscriptions: IndicatifProgress::inscriptions_bar(&multi),
            };

            let summary = match database {
                Some(path) if !dry_run => {
                    let store = open_store(&path)?;
                    run_harvest(&source, &store, &config.harvest_options(), &progress).await?
                }
                _ => {
                    log::info!("Dry run: harvesting into memory");
                    let store = MemoryStore::new();
                    run_harvest(&source, &store, &config.harvest_options(), &progress).await?
                }
            };
            progress.inscriptions.finish_and_clear();

            log::info!(
                "{} blocks, {} inscriptions fetched, {} rows written, {} skipped, {} listings truncated",
                summary.blocks_processed,
                summary.inscriptions_fetched,
                summary.rows_written,
                summary.inscriptions_skipped,
                summary.blocks_truncated,
            );
        }
        Commands::Status { config, database } => {
            config.validate()?;
            let source = OrdClient::new(&config.ord_host, &config.client_options())?;
            let store = open_store(&database)?;

            let frontier = source.current_height().await?;
            let checkpoint = store.max_genesis_height()?;
            let rows = store.count()?;

            println!("Server height:   {frontier}");
            match checkpoint {
                Some(height) => {
                    println!("Checkpoint:      {height}");
                    println!("Blocks behind:   {}", frontier.saturating_sub(height));
                }
                None => println!("Checkpoint:      none (starts at {})", config.genesis_height),
            }
            println!("Stored rows:     {rows}");
        }
        Commands::Rollback { height, database } => {
            let store = open_store(&database)?;
            let removed = ord_harvest::checkpoint::rollback(&store, height)?;
            println!("Deleted {removed} rows at block {height}");
        }
        Commands::Migrate { database } => {
            open_store(&database)?;
            log::info!("Schema ready at {}", database.display());
        }
    }

    Ok(())
}

fn open_store(path: &Path) -> Result<DuckDbStore, Box<dyn std::error::Error>> {
    log::debug!("Opening store at {}", path.display());
    Ok(DuckDbStore::open(path)?)
}
