use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

pub mod commands;

/// Default log filter when neither `RUST_LOG` nor a flag/config level is set.
pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// Install the global tracing subscriber, writing to stderr.
///
/// `RUST_LOG` wins over `level`; an unparsable `level` falls back to
/// [`DEFAULT_LOG_LEVEL`]. Only the first call in a process takes effect.
pub fn init_tracing(level: Option<&str>, json: bool) {
    let level = level.unwrap_or(DEFAULT_LOG_LEVEL);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr).json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
            .ok();
    }
}

/// Resolve a user-supplied path against the current directory without
/// requiring it to exist yet.
pub fn absolutize(path: &str) -> Result<PathBuf> {
    let path = Path::new(path);
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    match path.canonicalize() {
        Ok(p) => Ok(p),
        Err(_) => {
            let cwd = env::current_dir().context("Failed to get current directory")?;
            Ok(cwd.join(path))
        }
    }
}

/// Render an empty version the way listings show it.
pub fn display_version(version: &str) -> &str {
    if version.is_empty() {
        "(none)"
    } else {
        version
    }
}
