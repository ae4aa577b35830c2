use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use crate::config::HarnessConfig;

/// Lab topology descriptor file, relative to the repository root.
pub const LABNET_FILE: &str = "labnet.yaml";

/// Lab topology: known devices plus the per-lab instance groupings that map
/// named device instances back to a base device.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Labnet {
    #[serde(default)]
    pub devices: HashMap<String, DeviceEntry>,
    #[serde(default)]
    pub labs: HashMap<String, LabEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceEntry {
    /// Name of the target descriptor under `targets/`, without extension.
    /// Defaults to the device name itself.
    #[serde(default)]
    pub target_file: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LabEntry {
    #[serde(default)]
    pub device_instances: HashMap<String, Vec<String>>,
}

impl Labnet {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_yaml::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Path of the target descriptor for a base device, if the device is
    /// known and its descriptor exists on disk.
    fn descriptor_for(&self, repo_root: &Path, device: &str) -> Option<PathBuf> {
        let entry = self.devices.get(device)?;
        let target_name = entry.target_file.as_deref().unwrap_or(device);
        let path = repo_root.join("targets").join(format!("{target_name}.yaml"));
        path.exists().then_some(path)
    }

    /// Resolve a device instance to a target descriptor path: direct device
    /// hit first, then every lab's instance groupings.
    fn resolve_instance(&self, repo_root: &Path, instance: &str) -> Option<PathBuf> {
        if self.devices.contains_key(instance)
            && let Some(path) = self.descriptor_for(repo_root, instance)
        {
            return Some(path);
        }

        for lab in self.labs.values() {
            for (base_device, instances) in &lab.device_instances {
                if instances.iter().any(|i| i == instance)
                    && let Some(path) = self.descriptor_for(repo_root, base_device)
                {
                    return Some(path);
                }
            }
        }

        None
    }
}

/// A place identifier of the form `<lab>-<segment>-<device_instance>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Place {
    pub lab: String,
    pub segment: String,
    pub device_instance: String,
}

impl Place {
    /// Split on `-` into at most 3 parts. Fewer than 3 parts is not a place.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.splitn(3, '-');
        let lab = parts.next()?.to_string();
        let segment = parts.next()?.to_string();
        let device_instance = parts.next()?.to_string();
        Some(Self {
            lab,
            segment,
            device_instance,
        })
    }
}

/// Outcome of target resolution.
///
/// Every variant other than `Resolved` degrades to "no override" at the call
/// site; the variants exist so the log can say which way resolution fell
/// through instead of collapsing everything to one silent `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// An explicit target override is set; the resolver did not run.
    Overridden(String),
    /// No place identifier configured.
    NoPlace,
    /// The place identifier has fewer than 3 hyphen-separated parts.
    BadPlace,
    /// `labnet.yaml` does not exist under the repository root.
    NoTopologyFile,
    /// `labnet.yaml` exists but could not be parsed.
    MalformedTopology(String),
    /// The device instance matched nothing, or its descriptor is missing.
    NoMatch,
    /// Resolved to an existing target descriptor.
    Resolved(PathBuf),
}

impl Resolution {
    /// The resolved descriptor path, if resolution produced one.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Resolved(path) => Some(path),
            _ => None,
        }
    }

    pub fn into_path(self) -> Option<PathBuf> {
        match self {
            Self::Resolved(path) => Some(path),
            _ => None,
        }
    }
}

/// Resolve the target descriptor for the configured place.
///
/// The explicit override wins unconditionally. Indirect resolution walks the
/// lab topology; any failure along the way is reported as a non-`Resolved`
/// variant, never as an error.
pub fn resolve_target(config: &HarnessConfig) -> Resolution {
    if let Some(env) = &config.env_override {
        debug!("Target override set, skipping place resolution");
        return Resolution::Overridden(env.clone());
    }

    let Some(raw_place) = &config.place else {
        debug!("No place configured");
        return Resolution::NoPlace;
    };

    let Some(place) = Place::parse(raw_place) else {
        debug!("Place {raw_place:?} is not of the form lab-segment-instance");
        return Resolution::BadPlace;
    };

    let labnet_path = config.repo_root.join(LABNET_FILE);
    if !labnet_path.exists() {
        debug!("No topology file at {}", labnet_path.display());
        return Resolution::NoTopologyFile;
    }

    let labnet = match Labnet::load(&labnet_path) {
        Ok(labnet) => labnet,
        Err(e) => {
            debug!("Malformed topology file: {e:#}");
            return Resolution::MalformedTopology(format!("{e:#}"));
        }
    };

    match labnet.resolve_instance(&config.repo_root, &place.device_instance) {
        Some(path) => {
            debug!(
                "Resolved instance {instance} to {path}",
                instance = place.device_instance,
                path = path.display()
            );
            Resolution::Resolved(path)
        }
        None => {
            debug!(
                "No target descriptor for instance {instance}",
                instance = place.device_instance
            );
            Resolution::NoMatch
        }
    }
}
