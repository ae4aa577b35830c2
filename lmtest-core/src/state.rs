use std::collections::HashMap;

use anyhow::{Context, Result, ensure};
use serde::Deserialize;
use serde_json::Value;

use crate::rpc::extract_json_from_mixed;
use crate::session::ShellSession;

/// Remove colons from a MAC address and lowercase it.
pub fn strip_mac(mac: &str) -> String {
    mac.replace(':', "").to_lowercase()
}

/// Order-independent key for an undirected link between two MAC-addressed
/// endpoints: both MACs stripped and lowercased, the pair sorted
/// lexicographically, then concatenated.
pub fn canonical_link_key(mac_a: &str, mac_b: &str) -> Result<String> {
    let a = strip_mac(mac_a);
    let b = strip_mac(mac_b);

    for (raw, stripped) in [(mac_a, &a), (mac_b, &b)] {
        let octets = hex::decode(stripped)
            .with_context(|| format!("`{raw}` is not a MAC address"))?;
        ensure!(octets.len() == 6, "`{raw}` is not a 6-octet MAC address");
    }

    if a <= b {
        Ok(format!("{a}{b}"))
    } else {
        Ok(format!("{b}{a}"))
    }
}

/// Shared mesh state as published by the nodes, keyed by hostname.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MeshState(pub HashMap<String, NodeRecord>);

/// Per-node record: links keyed by canonical link key, plus whatever else
/// the publishing node included.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeRecord {
    #[serde(default)]
    pub links: HashMap<String, LinkMetrics>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Link-metric data. Fields vary between firmware versions; anything not
/// modelled explicitly lands in `extra`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LinkMetrics {
    #[serde(default)]
    pub tq: Option<f64>,
    #[serde(default)]
    pub iface: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl MeshState {
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).context("Shared state is not a hostname-keyed object")
    }

    pub fn node(&self, hostname: &str) -> Option<&NodeRecord> {
        self.0.get(hostname)
    }

    pub fn hostnames(&self) -> Vec<&str> {
        self.0.keys().map(String::as_str).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has_link(&self, hostname: &str, link_key: &str) -> bool {
        self.node(hostname)
            .map(|node| node.links.contains_key(link_key))
            .unwrap_or(false)
    }
}

/// Command wrappers for the on-device shared-state mechanism.
pub struct SharedState<'a> {
    session: &'a ShellSession,
}

impl<'a> SharedState<'a> {
    pub fn new(session: &'a ShellSession) -> Self {
        Self { session }
    }

    /// Publish every locally known data type into the shared state.
    pub async fn publish_all(&self) -> Result<()> {
        self.session
            .run_check("shared-state-async-publish-all")
            .await?;
        Ok(())
    }

    /// Ask the node to sync one data type with its neighbors.
    pub async fn sync(&self, key: &str) -> Result<()> {
        self.session
            .run_check(&format!("shared-state-async sync {key}"))
            .await?;
        Ok(())
    }

    /// Fetch one data type. The command mixes log lines into its output, so
    /// the JSON payload is extracted rather than parsed wholesale.
    pub async fn get(&self, key: &str) -> Result<Value> {
        let output = self
            .session
            .run(&format!("shared-state-async get {key}"))
            .await?;
        ensure!(
            output.success(),
            "shared-state-async get {key} failed (status {status}): {stderr}",
            status = output.status,
            stderr = output.joined_stderr()
        );
        extract_json_from_mixed(&output.joined_stdout())
    }
}
