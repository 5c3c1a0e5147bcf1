use anyhow::Result;
use clap::{Parser, Subcommand};
use layerscan::commands::{
    inspect_command, list_ecosystems_command, load_scan_config, scan_command, severity_command,
};
use layerscan::{absolutize, init_tracing};

/// Software inventory for container image layers.
///
/// This CLI is a thin wrapper around `layerscan-core` (exposed in code as
/// `layerscan_core`). All substantive logic lives in the library so it can be
/// tested thoroughly and reused from other frontends.
#[derive(Parser, Debug)]
#[command(
    name = "layerscan",
    version,
    about = "Inventory Go modules embedded in container image layers",
    long_about = None
)]
struct Cli {
    /// Log filter when `RUST_LOG` is not set (e.g., `info`, `debug`).
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit logs as newline-delimited JSON on stderr.
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan a layer archive (tar or tar.gz) for packages and repositories.
    ///
    /// Every executable in the layer is checked for embedded Go build info;
    /// each one found contributes its main module, `stdlib`, and dependencies.
    Scan {
        /// Path to the layer archive.
        #[arg(long)]
        layer: String,

        /// Scan config file (JSON, or YAML for `.yaml`/`.yml`).
        #[arg(long)]
        config: Option<String>,

        /// Ecosystem to run; repeatable. Overrides the config file.
        #[arg(long = "ecosystem")]
        ecosystems: Vec<String>,

        /// Skip repository scanners.
        #[arg(long, default_value_t = false)]
        no_repository_scan: bool,

        /// Emit the layer report as JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Print the build info embedded in one executable, like `go version -m`.
    Inspect {
        /// Path to the executable.
        #[arg(long)]
        binary: String,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// List the ecosystems compiled into this binary and their scanners.
    Ecosystems {
        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Normalize an upstream severity label (e.g., `Moderate` -> `medium`).
    Severity {
        /// Severity label as published upstream.
        value: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Scan config may carry a log level, so it is loaded before tracing starts.
    let scan_config = match &cli.command {
        Command::Scan { config, ecosystems, no_repository_scan, .. } => {
            let config_path = config.as_deref().map(absolutize).transpose()?;
            Some(load_scan_config(config_path.as_deref(), ecosystems, *no_repository_scan)?)
        }
        _ => None,
    };
    let level = cli
        .log_level
        .as_deref()
        .or_else(|| scan_config.as_ref().and_then(|cfg| cfg.log_level.as_deref()));
    init_tracing(level, cli.log_json);

    match cli.command {
        Command::Scan { layer, json, .. } => {
            scan_command(&absolutize(&layer)?, &scan_config.unwrap_or_default(), json)?
        }
        Command::Inspect { binary, json } => inspect_command(&absolutize(&binary)?, json)?,
        Command::Ecosystems { json } => list_ecosystems_command(json)?,
        Command::Severity { value } => severity_command(&value)?,
    }

    Ok(())
}
