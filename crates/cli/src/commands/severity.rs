use anyhow::Result;

use layerscan_core::services::severity::normalize_severity;

/// Print the normalized severity for an upstream label.
pub fn severity_command(value: &str) -> Result<()> {
    println!("{}", normalize_severity(value));
    Ok(())
}
