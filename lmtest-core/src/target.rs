use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Target descriptor: everything the harness knows about one lab device.
///
/// Only the `ssh` section is interpreted here; the rest of the file belongs
/// to other drivers and is carried through opaquely.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetDescriptor {
    pub ssh: SshTarget,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_yaml::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SshTarget {
    pub host: String,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_user() -> String {
    "root".to_string()
}

fn default_port() -> u16 {
    22
}

impl TargetDescriptor {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read target descriptor {}", path.display()))?;
        serde_yaml::from_str(&raw)
            .with_context(|| format!("Failed to parse target descriptor {}", path.display()))
    }
}
