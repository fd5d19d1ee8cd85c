//! Operator CLI for the complaints pipeline.
//!
//! Usage:
//!   cargo run --bin ingest -- download
//!   cargo run --bin ingest -- load-all --batch-size 1000
//!   cargo run --bin ingest -- load-batch --page 0 --page-size 500

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use ingest::config::{Config, DATASET, DEFAULT_BATCH_SIZE};
use ingest::download::download_dataset;
use ingest::{load_all, load_page, LoadReport};

#[derive(Parser, Debug)]
#[command(name = "ingest", about = "Loads the consumer complaints dataset into Postgres")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download the Kaggle dataset (skipped when the CSV is already present)
    Download,
    /// Load the whole file: stage batch by batch, merge once at the end
    LoadAll {
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,
    },
    /// Load a single page and merge it immediately
    LoadBatch {
        /// 0-based page index; skip = page * page_size rows
        #[arg(long)]
        page: usize,
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        page_size: usize,
    },
}

async fn connect(config: &Config) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_uri)
        .await
        .context("Failed to connect to database")
}

fn print_report(report: &LoadReport) {
    println!("Rows read:     {}", report.rows_read);
    println!("Rows inserted: {}", report.rows_inserted);
    println!("Rows updated:  {}", report.rows_updated);
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    let config = Config::from_env()?;

    match args.command {
        Command::Download => {
            let client = reqwest::Client::builder()
                .timeout(Duration::from_secs(600))
                .build()?;
            println!("Downloading {} ...", DATASET);
            let path = download_dataset(&client, &config).await?;
            println!("Dataset ready at {}", path.display());
        }
        Command::LoadAll { batch_size } => {
            let pool = connect(&config).await?;
            println!(
                "Loading {} in batches of {}...",
                config.data_path().display(),
                batch_size
            );
            let report = load_all(&pool, &config.data_path(), batch_size).await?;
            println!("\n=== Load Complete ===");
            print_report(&report);
        }
        Command::LoadBatch { page, page_size } => {
            let pool = connect(&config).await?;
            println!("Loading page {} (size {})...", page, page_size);
            let report = load_page(&pool, &config.data_path(), page, page_size).await?;
            println!("\n=== Page Load Complete ===");
            print_report(&report);
        }
    }

    Ok(())
}
