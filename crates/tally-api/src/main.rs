//! tally-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) layered under
//! `TALLY_*` environment variables, opens the SQLite store, and serves the
//! leaderboard API over HTTP.
//!
//! ```text
//! TALLY_PORT=9000 TALLY_CACHE_ENABLED=false cargo run -p tally-api --bin tally-server
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::Context as _;
use clap::Parser;
use tally_api::ServerConfig;
use tally_cache::{MemoryCache, NoCache};
use tally_service::LeaderboardService;
use tally_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Tally leaderboard server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("TALLY"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let store = Arc::new(store);

  let service_cfg = server_cfg.service_config();
  let app = if server_cfg.cache_enabled {
    let cache = Arc::new(MemoryCache::new());
    spawn_sweeper(Arc::clone(&cache), service_cfg.cache_ttl);
    tally_api::router(LeaderboardService::new(store, cache, service_cfg))
  } else {
    tracing::info!("cache disabled; every read goes to the store");
    tally_api::router(LeaderboardService::new(store, Arc::new(NoCache), service_cfg))
  };

  let address = format!("{}:{}", server_cfg.host, server_cfg.port);
  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  Ok(())
}

/// Periodically drop expired entries so idle keys do not pin memory.
fn spawn_sweeper(cache: Arc<MemoryCache>, ttl: Duration) {
  let period = ttl.clamp(Duration::from_secs(1), Duration::from_secs(3600));
  tokio::spawn(async move {
    let mut ticker = tokio::time::interval(period);
    loop {
      ticker.tick().await;
      cache.purge_expired();
    }
  });
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::warn!(error = %e, "failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  tracing::info!("shutting down");
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
