use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use catalog_mirror::api;
use catalog_mirror::app::AppContext;
use catalog_mirror::cli::{commands, Cli, Commands};
use catalog_mirror::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_path(path)?,
        None => Config::load()?,
    };
    if let Some(database) = cli.database {
        config.database.path = Some(database);
    }

    let ctx = AppContext::new(config)?;

    match cli.command {
        Commands::Ingest { run, kind } => {
            commands::ingest(&ctx, &run, kind).await?;
        }
        Commands::Plan { run } => {
            commands::plan(&ctx, &run)?;
        }
        Commands::Recent { count } => {
            commands::recent(&ctx, count).await?;
        }
        Commands::Lookup { id } => {
            commands::lookup(&ctx, &id).await?;
        }
        Commands::List {
            keyword,
            maker,
            limit,
            offset,
        } => {
            commands::list_items(&ctx, keyword, maker, limit, offset)?;
        }
        Commands::Show { external_id } => {
            commands::show_item(&ctx, &external_id)?;
        }
        Commands::Logs { limit } => {
            commands::list_logs(&ctx, limit)?;
        }
        Commands::Serve { bind } => {
            let mut ctx = ctx;
            if let Some(bind) = bind {
                ctx.config.server.bind = bind;
            }
            if ctx.config.admin_token().is_none() {
                tracing::warn!("No admin token configured; /admin routes are disabled");
            }
            api::serve(Arc::new(ctx)).await?;
        }
    }

    Ok(())
}
