//! VIF descriptor loading.

use anyhow::{Context, Result};
use std::path::Path;
use vifplug_plugins::Vif;

/// Load and check a VIF descriptor from a YAML file.
pub fn load_vif<P: AsRef<Path>>(path: P) -> Result<Vif> {
    let path = path.as_ref();

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read VIF descriptor: {}", path.display()))?;

    let vif: Vif = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse VIF descriptor: {}", path.display()))?;

    vif.network
        .validate()
        .with_context(|| format!("Invalid network in {}", path.display()))?;

    Ok(vif)
}
