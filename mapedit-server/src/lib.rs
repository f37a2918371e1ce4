//! HTTP server for the map editor.
//!
//! The `mapedit serve` command opens the feature database, builds the
//! Overpass client and serves the API until interrupted.
#![forbid(unsafe_code)]

mod config;
mod error;
mod routes;
mod state;
mod style;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use log::info;
use mapedit_core::SqliteFeatureStore;
use mapedit_data::{HttpOverpassSource, OsmImporter};
use tokio::net::TcpListener;

pub use config::{ServeArgs, ServerConfig};
pub use error::{ApiError, ServerError};
pub use routes::{API_VERSION, router};
pub use state::AppState;
pub use style::{StyleError, StyleProxy, StyleSettings};

/// Run the map editor CLI with the current process arguments and environment.
pub fn run() -> Result<(), ServerError> {
    let cli = Cli::try_parse().map_err(ServerError::ArgumentParsing)?;
    match cli.command {
        Command::Serve(args) => {
            let config = args.into_config()?;
            serve_blocking(config)
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "mapedit",
    about = "Geospatial feature editing API with OpenStreetMap import",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the HTTP API.
    Serve(ServeArgs),
}

/// Open the services described by `config`.
pub fn build_state(config: &ServerConfig) -> Result<AppState, ServerError> {
    let store = SqliteFeatureStore::open(config.database.clone()).map_err(|source| {
        ServerError::OpenStore {
            path: config.database.clone(),
            source,
        }
    })?;
    let source = HttpOverpassSource::with_config(config.overpass.clone())?;
    let importer = OsmImporter::new(Arc::new(source));
    Ok(AppState::new(
        store,
        importer,
        StyleProxy::new(config.style.clone()),
    ))
}

fn serve_blocking(config: ServerConfig) -> Result<(), ServerError> {
    let state = build_state(&config)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(ServerError::Runtime)?;
    runtime.block_on(serve(config, state))
}

/// Serve `state` on the configured address until Ctrl-C.
pub async fn serve(config: ServerConfig, state: AppState) -> Result<(), ServerError> {
    let listener = TcpListener::bind(config.bind)
        .await
        .map_err(|source| ServerError::Bind {
            addr: config.bind,
            source,
        })?;
    info!(
        "listening on {} with database {}",
        config.bind, config.database
    );
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(ServerError::Serve)?;
    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        log::warn!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests;
