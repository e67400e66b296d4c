mod catalog;
mod config;
mod countdown;
mod db;
mod error;
mod http;
mod models;
mod router;
mod upstream;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;
use db::{Database, DEFAULT_SNAPSHOT_KEY};
use http::{start_server, AppState};
use upstream::OpenRouterBackend;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(err) = run().await {
        eprintln!("startup error: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let config = Config::from_env()?;
    info!(db = %config.db_path.display(), "starting brand studio backend");

    let db = Database::new(config.db_path.clone(), DEFAULT_SNAPSHOT_KEY)?;
    let backend = OpenRouterBackend::new(
        config.upstream_base_url.clone(),
        config.upstream_api_key.clone(),
    )?;

    let state = AppState::new(db, Arc::new(backend), config.password_sha256.clone());
    start_server(state, &config.addr).await
}
