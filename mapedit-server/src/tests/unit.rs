//! Focused unit tests covering `serve` configuration validation.

use super::*;
use crate::config::{ARG_OVERPASS_ENDPOINTS, ARG_OVERPASS_TIMEOUT_SECS};
use camino::Utf8PathBuf;
use rstest::rstest;
use std::time::Duration;
use tempfile::TempDir;

#[rstest]
fn empty_arguments_use_defaults() {
    let config = ServerConfig::try_from(ServeArgs::default()).expect("defaults are valid");
    assert_eq!(config.bind.to_string(), "0.0.0.0:8000");
    assert_eq!(config.database, Utf8PathBuf::from("mapedit.db"));
    assert_eq!(config.style.path, Utf8PathBuf::from("static/style.json"));
    assert_eq!(config.style.source, "openmaptiles");
    assert_eq!(
        config.style.tile_url_template,
        "http://localhost:8080/data/v3/{z}/{x}/{y}.pbf"
    );
    assert_eq!(config.overpass.endpoints.len(), 3);
    assert_eq!(config.overpass.timeout, Duration::from_secs(30));
}

#[rstest]
fn explicit_arguments_override_defaults() {
    let args = ServeArgs {
        bind: Some("127.0.0.1:9000".to_owned()),
        database: Some(Utf8PathBuf::from("data/features.db")),
        overpass_endpoints: Some(
            " https://a.example/api/interpreter , ,https://b.example/api/interpreter".to_owned(),
        ),
        overpass_timeout_secs: Some(5),
        ..ServeArgs::default()
    };
    let config = ServerConfig::try_from(args).expect("valid arguments");
    assert_eq!(config.bind.port(), 9000);
    assert_eq!(config.database, Utf8PathBuf::from("data/features.db"));
    let endpoints: Vec<&str> = config
        .overpass
        .endpoints
        .iter()
        .map(url::Url::as_str)
        .collect();
    assert_eq!(
        endpoints,
        [
            "https://a.example/api/interpreter",
            "https://b.example/api/interpreter"
        ]
    );
    assert_eq!(config.overpass.timeout, Duration::from_secs(5));
}

#[rstest]
#[case("localhost")]
#[case("0.0.0.0")]
#[case("")]
fn rejects_malformed_bind_addresses(#[case] bind: &str) {
    let args = ServeArgs {
        bind: Some(bind.to_owned()),
        ..ServeArgs::default()
    };
    let err = ServerConfig::try_from(args).expect_err("bind should be rejected");
    match err {
        ServerError::InvalidBind { value, .. } => assert_eq!(value, bind),
        other => panic!("expected InvalidBind, found {other:?}"),
    }
}

#[rstest]
fn rejects_unparseable_endpoint() {
    let args = ServeArgs {
        overpass_endpoints: Some("https://ok.example,not a url".to_owned()),
        ..ServeArgs::default()
    };
    let err = ServerConfig::try_from(args).expect_err("endpoint should be rejected");
    match err {
        ServerError::InvalidEndpoint { value, .. } => assert_eq!(value, "not a url"),
        other => panic!("expected InvalidEndpoint, found {other:?}"),
    }
}

#[rstest]
#[case(" ")]
#[case(",,")]
fn blank_endpoint_list_is_missing(#[case] list: &str) {
    let args = ServeArgs {
        overpass_endpoints: Some(list.to_owned()),
        ..ServeArgs::default()
    };
    let err = ServerConfig::try_from(args).expect_err("blank list should be rejected");
    match err {
        ServerError::MissingArgument { field, env } => {
            assert_eq!(field, ARG_OVERPASS_ENDPOINTS);
            assert_eq!(env, "MAPEDIT_CMDS_SERVE_OVERPASS_ENDPOINTS");
        }
        other => panic!("expected MissingArgument, found {other:?}"),
    }
}

#[rstest]
fn zero_timeout_is_rejected() {
    let args = ServeArgs {
        overpass_timeout_secs: Some(0),
        ..ServeArgs::default()
    };
    let err = ServerConfig::try_from(args).expect_err("zero timeout should be rejected");
    match err {
        ServerError::InvalidTimeout { field } => assert_eq!(field, ARG_OVERPASS_TIMEOUT_SECS),
        other => panic!("expected InvalidTimeout, found {other:?}"),
    }
}

#[rstest]
fn build_state_creates_database_directories() {
    let tmp = TempDir::new().expect("tempdir");
    let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).expect("utf-8 tempdir");
    let database = root.join("nested").join("features.db");
    let args = ServeArgs {
        database: Some(database.clone()),
        ..ServeArgs::default()
    };
    let config = ServerConfig::try_from(args).expect("valid arguments");

    build_state(&config).expect("state should build");

    assert!(database.is_file());
}
