use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use layerscan_core::services::golang::{buildinfo, BuildInfo};

#[derive(Debug, Serialize)]
pub struct InspectOutput {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_info: Option<BuildInfo>,
    /// Why the file carries no build info, when it doesn't.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Decode the build info of one file on disk.
///
/// Files without build info are reported, not treated as errors.
pub fn inspect_binary(path: &Path) -> Result<InspectOutput> {
    let bytes =
        fs::read(path).with_context(|| format!("Failed to read binary: {}", path.display()))?;
    let (build_info, reason) = match buildinfo::read(&bytes) {
        Ok(info) => (Some(info), None),
        Err(err) => (None, Some(err.to_string())),
    };
    Ok(InspectOutput { path: path.display().to_string(), build_info, reason })
}

/// Print build info in the `go version -m` layout (or as JSON).
pub fn inspect_command(path: &Path, json: bool) -> Result<()> {
    let out = inspect_binary(path)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    match (&out.build_info, &out.reason) {
        (Some(info), _) => {
            println!("{}: {}", out.path, info.go_version);
            let text = info.to_string();
            for line in text.lines().filter(|line| !line.starts_with("go\t")) {
                println!("\t{line}");
            }
        }
        (None, reason) => {
            println!("{}: {}", out.path, reason.as_deref().unwrap_or("no build info"));
        }
    }

    Ok(())
}
