//! Layered configuration for the `serve` subcommand.
//!
//! Values come from CLI flags, `MAPEDIT_CMDS_SERVE_*` environment variables
//! and configuration files, merged by `ortho_config`. Every option has a
//! default, so an empty invocation starts a working server.

use std::net::SocketAddr;
use std::time::Duration;

use camino::Utf8PathBuf;
use clap::Parser;
use mapedit_data::OverpassConfig;
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ServerError;
use crate::style::StyleSettings;

pub(crate) const ARG_BIND: &str = "bind";
pub(crate) const ARG_DATABASE: &str = "database";
pub(crate) const ARG_STYLE_PATH: &str = "style-path";
pub(crate) const ARG_STYLE_SOURCE: &str = "style-source";
pub(crate) const ARG_TILE_URL_TEMPLATE: &str = "tile-url-template";
pub(crate) const ARG_OVERPASS_ENDPOINTS: &str = "overpass-endpoints";
pub(crate) const ARG_OVERPASS_TIMEOUT_SECS: &str = "overpass-timeout-secs";

const DEFAULT_BIND: &str = "0.0.0.0:8000";
const DEFAULT_DATABASE: &str = "mapedit.db";
const DEFAULT_STYLE_PATH: &str = "static/style.json";
const DEFAULT_STYLE_SOURCE: &str = "openmaptiles";
const DEFAULT_TILE_URL_TEMPLATE: &str = "http://localhost:8080/data/v3/{z}/{x}/{y}.pbf";
const DEFAULT_OVERPASS_TIMEOUT_SECS: u64 = 30;

/// CLI arguments for the `serve` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    name = "serve",
    about = "Serve the map editor HTTP API",
    long_about = "Serve the map editor HTTP API. Options can come from CLI \
                  flags, configuration files, or MAPEDIT_CMDS_SERVE_* \
                  environment variables."
)]
#[ortho_config(prefix = "MAPEDIT")]
pub struct ServeArgs {
    /// Socket address to listen on.
    #[arg(long = ARG_BIND, value_name = "addr")]
    #[serde(default)]
    pub bind: Option<String>,
    /// Path to the SQLite feature database; created when absent.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub database: Option<Utf8PathBuf>,
    /// Path to the map style document served at `/map-style`.
    #[arg(long = ARG_STYLE_PATH, value_name = "path")]
    #[serde(default)]
    pub style_path: Option<Utf8PathBuf>,
    /// Style source whose tile URLs are rewritten.
    #[arg(long = ARG_STYLE_SOURCE, value_name = "name")]
    #[serde(default)]
    pub style_source: Option<String>,
    /// Vector tile URL template written into the style.
    #[arg(long = ARG_TILE_URL_TEMPLATE, value_name = "url")]
    #[serde(default)]
    pub tile_url_template: Option<String>,
    /// Comma-separated Overpass endpoints, tried in order.
    #[arg(long = ARG_OVERPASS_ENDPOINTS, value_name = "urls")]
    #[serde(default)]
    pub overpass_endpoints: Option<String>,
    /// Timeout for each Overpass attempt.
    #[arg(long = ARG_OVERPASS_TIMEOUT_SECS, value_name = "seconds")]
    #[serde(default)]
    pub overpass_timeout_secs: Option<u64>,
}

impl ServeArgs {
    /// Merge configuration layers and validate the result.
    pub(crate) fn into_config(self) -> Result<ServerConfig, ServerError> {
        let merged = self.load_and_merge().map_err(ServerError::Configuration)?;
        ServerConfig::try_from(merged)
    }
}

/// Validated server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listening address.
    pub bind: SocketAddr,
    /// SQLite database path.
    pub database: Utf8PathBuf,
    /// Style proxy settings.
    pub style: StyleSettings,
    /// Overpass client settings.
    pub overpass: OverpassConfig,
}

impl TryFrom<ServeArgs> for ServerConfig {
    type Error = ServerError;

    fn try_from(args: ServeArgs) -> Result<Self, Self::Error> {
        let bind_text = args.bind.unwrap_or_else(|| DEFAULT_BIND.to_owned());
        let bind = bind_text
            .parse::<SocketAddr>()
            .map_err(|source| ServerError::InvalidBind {
                value: bind_text.clone(),
                source,
            })?;

        let timeout_secs = args
            .overpass_timeout_secs
            .unwrap_or(DEFAULT_OVERPASS_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(ServerError::InvalidTimeout {
                field: ARG_OVERPASS_TIMEOUT_SECS,
            });
        }

        let overpass = match args.overpass_endpoints {
            Some(list) => OverpassConfig::new(parse_endpoints(&list)?),
            None => OverpassConfig::default(),
        }
        .with_timeout(Duration::from_secs(timeout_secs));

        Ok(Self {
            bind,
            database: args
                .database
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_DATABASE)),
            style: StyleSettings {
                path: args
                    .style_path
                    .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_STYLE_PATH)),
                source: args
                    .style_source
                    .unwrap_or_else(|| DEFAULT_STYLE_SOURCE.to_owned()),
                tile_url_template: args
                    .tile_url_template
                    .unwrap_or_else(|| DEFAULT_TILE_URL_TEMPLATE.to_owned()),
            },
            overpass,
        })
    }
}

/// Split a comma-separated endpoint list, ignoring blank entries.
fn parse_endpoints(list: &str) -> Result<Vec<Url>, ServerError> {
    let endpoints = list
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            Url::parse(entry).map_err(|source| ServerError::InvalidEndpoint {
                value: entry.to_owned(),
                source,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    if endpoints.is_empty() {
        return Err(ServerError::MissingArgument {
            field: ARG_OVERPASS_ENDPOINTS,
            env: "MAPEDIT_CMDS_SERVE_OVERPASS_ENDPOINTS",
        });
    }
    Ok(endpoints)
}
