//! Host configuration, read from the environment at startup.

use tether_pty::{default_shell, WindowSize};

/// Defaults applied to `start` requests that leave fields out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Program launched when a request has no `sh`.
    pub shell: String,
    pub cols: u16,
    pub rows: u16,
}

impl AppConfig {
    /// Read `TETHER_SHELL`, `TETHER_COLS` and `TETHER_ROWS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    ///
    /// Unset or empty `TETHER_SHELL` falls back to the user's shell.
    /// Dimensions that are not positive integers fall back to 80x24.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let shell = lookup("TETHER_SHELL")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(default_shell);

        Self {
            shell,
            cols: dimension(&lookup, "TETHER_COLS", WindowSize::DEFAULT_COLS),
            rows: dimension(&lookup, "TETHER_ROWS", WindowSize::DEFAULT_ROWS),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            shell: default_shell(),
            cols: WindowSize::DEFAULT_COLS,
            rows: WindowSize::DEFAULT_ROWS,
        }
    }
}

fn dimension(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u16) -> u16 {
    let Some(raw) = lookup(key) else {
        return default;
    };
    match raw.trim().parse::<u16>() {
        Ok(value) if value > 0 => value,
        _ => {
            log::warn!("ignoring {key}={raw:?}: expected a positive integer, using {default}");
            default
        }
    }
}
