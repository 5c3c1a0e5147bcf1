use anyhow::Result;
use serde::Serialize;

use layerscan_core::services::indexer::{default_ecosystem_registry, ScannerInfo};

#[derive(Debug, Serialize)]
pub struct EcosystemInfo {
    pub name: String,
    pub scanners: Vec<ScannerInfo>,
}

/// Ecosystems compiled into this binary, sorted by name.
pub fn list_ecosystems() -> Vec<EcosystemInfo> {
    let registry = default_ecosystem_registry();
    registry
        .names()
        .into_iter()
        .filter_map(|name| {
            let scanners = registry.get(&name)?.scanners();
            Some(EcosystemInfo { name, scanners })
        })
        .collect()
}

pub fn list_ecosystems_command(json: bool) -> Result<()> {
    let entries = list_ecosystems();

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("Ecosystems: (none)");
        return Ok(());
    }

    println!("Ecosystems:");
    for entry in entries {
        println!("- {}", entry.name);
        for scanner in entry.scanners {
            println!("    {} {} ({})", scanner.name, scanner.version, scanner.kind.as_str());
        }
    }

    Ok(())
}
