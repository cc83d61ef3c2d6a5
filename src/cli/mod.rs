pub mod commands;

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::FetchKind;

#[derive(Parser)]
#[command(name = "catalog-mirror")]
#[command(about = "Mirror a product catalog into local SQLite", long_about = None)]
pub struct Cli {
    /// Config file (default: ~/.config/catalog-mirror/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// SQLite database file, overriding the config
    #[arg(short, long, global = true)]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Overrides for the configured ingest settings.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Items per provider request (at most 100)
    #[arg(long)]
    pub hits: Option<i64>,
    /// 1-based offset of the first request
    #[arg(long)]
    pub offset: Option<i64>,
    /// Items to ingest in this run (at most 1000)
    #[arg(long)]
    pub total: Option<i64>,
    /// Provider sort order
    #[arg(long)]
    pub sort: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one ingestion
    Ingest {
        #[command(flatten)]
        run: RunArgs,
        /// How the run was triggered, as recorded in the fetch log
        /// (manual, scheduled)
        #[arg(long, default_value_t = FetchKind::Manual)]
        kind: FetchKind,
    },
    /// Show the requests an ingestion would make
    Plan {
        #[command(flatten)]
        run: RunArgs,
    },
    /// Fetch the newest items and store them
    Recent {
        /// Number of items (at most 100)
        #[arg(short = 'n', long, default_value_t = 20)]
        count: i64,
    },
    /// Fetch one item by provider id and store it
    Lookup {
        /// Provider content id
        id: String,
    },
    /// List stored items
    List {
        #[arg(short, long)]
        keyword: Option<String>,
        #[arg(short, long)]
        maker: Option<String>,
        #[arg(short, long)]
        limit: Option<i64>,
        #[arg(short, long)]
        offset: Option<i64>,
    },
    /// Show one stored item
    Show {
        /// External id of the item
        external_id: String,
    },
    /// Show recent ingestion runs
    Logs {
        #[arg(short, long, default_value_t = 10)]
        limit: i64,
    },
    /// Serve the HTTP API
    Serve {
        /// Listen address, overriding the config
        #[arg(short, long)]
        bind: Option<SocketAddr>,
    },
}
