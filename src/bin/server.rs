//! Category OData HTTP server.
//!
//! Loads configuration, opens the connection pool, makes sure the category
//! table exists and serves the API until the process is stopped.

use anyhow::Context;
use category_odata::api::CategoryService;
use category_odata::config::{AppConfig, DEFAULT_CONFIG_PATH};
use category_odata::connection::redact_connection_string;
use category_odata::schema::ensure_schema;
use category_odata::{DbPool, PgCategoryStore};
use clap::Parser;
use may_minihttp::HttpServer;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "category-odata")]
#[command(about = "OData-style HTTP API over the category table")]
#[command(version)]
struct Cli {
    /// Configuration file (optional; environment variables still apply)
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Database connection URL, overrides the configuration
    #[arg(long)]
    database_url: Option<String>,

    /// Listen address, overrides the configuration
    #[arg(long)]
    bind: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet output (errors only)
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut config = AppConfig::load_from(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    if let Some(url) = cli.database_url {
        config.database.url = Some(url);
    }
    if let Some(bind) = cli.bind {
        config.server.bind = bind;
    }
    config.validate().context("Invalid configuration")?;
    let database_url = config.database_url()?.to_string();

    if config.server.workers > 0 {
        may::config().set_workers(config.server.workers);
    }
    if config.server.stack_size > 0 {
        may::config().set_stack_size(config.server.stack_size);
    }

    log::info!("Connecting to {}", redact_connection_string(&database_url));
    let pool = DbPool::connect(
        &database_url,
        config.database.max_connections,
        Duration::from_secs(config.database.pool_timeout_seconds),
    )
    .context("Failed to open connection pool")?;

    {
        let connection = pool.acquire().context("No connection available for schema setup")?;
        ensure_schema(&*connection).context("Failed to create category table")?;
    }

    let service = CategoryService::new(PgCategoryStore::new(pool), config.seed.batch_size);
    let server = HttpServer(service)
        .start(&config.server.bind)
        .map_err(|e| anyhow::anyhow!("Failed to start server on {}: {}", config.server.bind, e))?;
    log::info!("Listening on http://{}", config.server.bind);

    server
        .join()
        .map_err(|e| anyhow::anyhow!("Server encountered an error: {:?}", e))?;
    Ok(())
}
