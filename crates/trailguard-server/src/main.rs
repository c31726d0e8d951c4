//! trailguard-server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`) layered with
//! `TRAILGUARD_*` environment variables, opens the SQLite store, and serves
//! the tracking API over HTTP under `/api`.
//!
//! # Password hash generation
//!
//! To generate the argon2 PHC string for `auth_password_hash`:
//!
//! ```
//! cargo run -p trailguard-server -- --hash-password
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use clap::Parser;
use rand_core::OsRng;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use trailguard_core::service::TrackingService;
use trailguard_server::{
  AppState, ServerConfig,
  background::{os_unit, spawn_retention_sweeper, with_retry},
};
use trailguard_store_sqlite::SqliteStore;

#[derive(Parser)]
#[command(author, version, about = "Trailguard tourist tracking server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print the argon2 hash for a password entered on stdin and exit.
  #[arg(long)]
  hash_password: bool,
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

  if cli.hash_password {
    let password = read_password()?;
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?
      .to_string();
    println!("{hash}");
    return Ok(());
  }

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("TRAILGUARD"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let auth = server_cfg.auth()?.map(Arc::new);
  if auth.is_none() {
    tracing::warn!("no auth configured; the API is open to anyone who can reach it");
  }

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = with_retry(&server_cfg.retry_policy(), "opening store", os_unit, || {
    SqliteStore::open(&store_path)
  })
  .await
  .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let service = Arc::new(TrackingService::new(store, server_cfg.service_policy()));

  if let Some(every) = server_cfg.sweep_interval() {
    tracing::info!(?every, "history retention sweep enabled");
    spawn_retention_sweeper(service.clone(), every);
  }

  let app = trailguard_server::router(AppState { service, auth });
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Read a password from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  Ok(line.trim_end_matches(['\n', '\r']).to_string())
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
