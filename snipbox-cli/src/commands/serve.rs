//! HTTP server command
//!
//! Runs the snipbox API over PostgreSQL, or over the in-memory store
//! with `--in-memory`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use snipbox_server::db::{create_pool_with_options, migrations, MemoryStore, PgSnippetStore, SnippetStore};
use snipbox_server::http::{run_server, AppState, ServerConfig};

/// Arguments for the serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to bind to
    #[arg(long, short = 'b', env = "SNIPBOX_BIND", default_value = "127.0.0.1:3030")]
    pub bind: SocketAddr,

    /// Allow permissive CORS (all origins) - use with caution
    #[arg(long)]
    pub cors_permissive: bool,

    /// PostgreSQL connection string
    #[arg(long, env = "DATABASE_URL", required_unless_present = "in_memory")]
    pub database_url: Option<String>,

    /// Maximum pooled database connections
    #[arg(long, env = "SNIPBOX_MAX_CONNECTIONS", default_value_t = 5)]
    pub max_connections: u32,

    /// Seconds to remember top snippets and site counters
    #[arg(long, env = "SNIPBOX_CACHE_TTL_SECS", default_value_t = 5)]
    pub cache_ttl_secs: u64,

    /// Keep everything in memory (nothing survives a restart)
    #[arg(long)]
    pub in_memory: bool,
}

async fn open_store(args: &ServeArgs) -> Result<Arc<dyn SnippetStore>> {
    let Some(database_url) = args.database_url.as_deref().filter(|_| !args.in_memory) else {
        tracing::warn!("Using in-memory store; data is lost on shutdown");
        return Ok(Arc::new(MemoryStore::new()));
    };

    let pool = create_pool_with_options(database_url, args.max_connections)
        .await
        .context("Failed to create database pool")?;
    migrations::run(&pool)
        .await
        .context("Failed to apply migrations")?;

    Ok(Arc::new(PgSnippetStore::new(pool)))
}

/// Run the HTTP server
pub async fn run_serve(args: ServeArgs) -> Result<()> {
    tracing::info!("Starting snipbox server on {}", args.bind);

    let store = open_store(&args).await?;
    let state = AppState::from_store(store, Duration::from_secs(args.cache_ttl_secs));

    let config = ServerConfig {
        bind_addr: args.bind,
        cors_permissive: args.cors_permissive,
    };

    // Run server (blocks until shutdown)
    run_server(state, config).await.context("Server error")?;

    Ok(())
}
