//! Entry point for the map editor server.
#![forbid(unsafe_code)]

use env_logger::Env;

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    if let Err(err) = mapedit_server::run() {
        eprintln!("mapedit: {err}");
        std::process::exit(1);
    }
}
