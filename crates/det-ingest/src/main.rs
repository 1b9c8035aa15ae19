//! det-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`), layers an optional
//! `config.<profile>.toml` and `DET_*` environment variables on top, opens the
//! SQLite store, and serves the ingestion WebSockets and the HTTP API.
//!
//! # Password hash generation
//!
//! To generate the argon2 PHC string for `auth_password_hash`:
//!
//! ```
//! cargo run -p det-ingest --bin det-server -- --hash-password
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::Parser;
use det_ingest::{AppState, ServerConfig};
use det_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Detection result ingestion server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Also read `config.<PROFILE>.toml` next to the main file.
  #[arg(short, long)]
  profile: Option<String>,

  /// Override the configured listen address.
  #[arg(long)]
  host: Option<String>,

  /// Override the configured listen port.
  #[arg(long)]
  port: Option<u16>,

  /// Print the argon2 hash for a password entered on stdin and exit.
  #[arg(long)]
  hash_password: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  let cli = Cli::parse();

  // Helper mode: hash a password and exit.
  if cli.hash_password {
    let password = read_password()?;
    let hash = det_core::user::hash_password(&password).context("failed to hash password")?;
    println!("{hash}");
    return Ok(());
  }

  let server_cfg = load_config(&cli)?;
  init_tracing(server_cfg.log_json);

  let store_path = expand_tilde(&server_cfg.store_path);
  let images_root = expand_tilde(&server_cfg.images_root);
  tokio::fs::create_dir_all(&images_root)
    .await
    .with_context(|| format!("failed to create image directory {images_root:?}"))?;

  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let address = format!("{}:{}", server_cfg.host, server_cfg.port);
  let state = AppState::new(store, ServerConfig {
    store_path,
    images_root,
    ..server_cfg
  });
  let app = det_ingest::router(state);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<ServerConfig> {
  let mut builder = config::Config::builder()
    .add_source(config::File::from(cli.config.clone()).required(false));

  if let Some(profile) = &cli.profile {
    let profile_path = cli.config.with_extension(format!("{profile}.toml"));
    builder = builder.add_source(config::File::from(profile_path).required(false));
  }

  let settings = builder
    .add_source(config::Environment::with_prefix("DET"))
    .set_override_option("host", cli.host.clone())?
    .set_override_option("port", cli.port.map(i64::from))?
    .build()
    .context("failed to read configuration")?;

  settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")
}

fn init_tracing(json: bool) {
  let filter = EnvFilter::builder()
    .with_default_directive(LevelFilter::INFO.into())
    .from_env_lossy();
  let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
  if json {
    subscriber.json().init();
  } else {
    subscriber.init();
  }
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
