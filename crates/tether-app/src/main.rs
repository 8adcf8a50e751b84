//! `tether`: drive one PTY session over stdin/stdout.
//!
//! Reads JSON requests line by line from stdin and writes session events as
//! JSON lines to stdout. Logs go to stderr (`RUST_LOG`, default `warn`).

mod commands;
mod config;
mod ipc;
mod state;

use std::io::BufRead;

use config::AppConfig;
use state::{AppState, EventSink};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let config = AppConfig::from_env();
    log::debug!("starting with {config:?}");

    let mut state = AppState::new(config, EventSink::new(std::io::stdout()));

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        match line {
            Ok(line) => commands::handle_line(&mut state, &line),
            Err(e) => {
                log::error!("failed to read stdin: {e}");
                break;
            }
        }
    }

    // The controlling side went away; take the child down with us.
    state.shutdown();
}
