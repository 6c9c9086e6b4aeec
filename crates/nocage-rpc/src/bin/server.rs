//! nocage-rpc server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) layered under
//! `NOCAGE_*` environment variables, opens the SQLite user store, and serves
//! the RPC surface over HTTP.
//!
//! ```
//! NOCAGE_DATABASE_URL=sqlite://hub.db \
//! NOCAGE_AUTH_URL=https://auth.example.com \
//! NOCAGE_ENVIRONMENT=production \
//! cargo run -p nocage-rpc --bin server
//! ```

use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use nocage_rpc::{AppState, RawConfig};
use nocage_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Nocage Hub RPC server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Start with development fallbacks for any missing required values.
  #[arg(long, env = "SKIP_ENV_VALIDATION")]
  skip_env_validation: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load and validate configuration before touching anything else.
  let server_cfg = RawConfig::load(&cli.config)
    .and_then(|raw| raw.validate(cli.skip_env_validation))
    .context("configuration rejected")?;

  if cli.skip_env_validation {
    tracing::warn!("environment validation skipped; missing values use development fallbacks");
  }

  let store_path = server_cfg.store_path();
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let address = server_cfg.address();
  tracing::info!(
    environment = %server_cfg.environment,
    auth_url = %server_cfg.auth_url,
    identity_header = %server_cfg.identity_header,
    "configuration loaded"
  );

  let app = nocage_rpc::router(AppState::new(store, server_cfg));

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}
