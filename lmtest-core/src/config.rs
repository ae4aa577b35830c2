use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Once;

use tracing::info;

/// Environment variable naming a target descriptor directly.
pub const ENV_TARGET_VAR: &str = "LG_ENV";
/// Environment variable naming a place of the form `lab-segment-instance`.
pub const ENV_PLACE_VAR: &str = "LG_PLACE";

static EXPORT_TARGET: Once = Once::new();

/// Explicit harness configuration
///
/// Collects everything the resolver and the session setup need, instead of
/// having them read process globals on their own. `from_env` is the one place
/// that touches the environment.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Direct target descriptor override (`LG_ENV`). Wins over `place`.
    pub env_override: Option<String>,
    /// Place identifier (`LG_PLACE`) used for indirect topology lookup.
    pub place: Option<String>,
    /// Repository root holding `labnet.yaml` and `targets/`.
    pub repo_root: PathBuf,
    /// Firmware image injected into the session configuration.
    pub firmware: PathBuf,
}

impl HarnessConfig {
    /// Build a configuration from the process environment.
    ///
    /// Empty variables are treated as unset, matching how the device
    /// management layer interprets them.
    pub fn from_env(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            env_override: env::var(ENV_TARGET_VAR).ok().filter(|v| !v.is_empty()),
            place: env::var(ENV_PLACE_VAR).ok().filter(|v| !v.is_empty()),
            repo_root: repo_root.into(),
            firmware: PathBuf::from("firmware.bin"),
        }
    }

    pub fn with_firmware(mut self, firmware: impl Into<PathBuf>) -> Self {
        self.firmware = firmware.into();
        self
    }

    /// Image table handed to the device management layer, keyed the way its
    /// session configuration expects (`images.firmware`).
    pub fn session_images(&self) -> HashMap<String, PathBuf> {
        let mut images = HashMap::new();
        images.insert("firmware".to_string(), self.firmware.clone());
        images
    }
}

/// Publish a resolved target descriptor to the environment variable the
/// device management layer reads during session setup.
///
/// Runs at most once per process; the resolved reference is immutable for the
/// rest of the session.
pub fn export_target(path: &Path) {
    EXPORT_TARGET.call_once(|| {
        info!("Using target descriptor {}", path.display());
        // SAFETY: called once during single-threaded session configuration,
        // before any device is acquired.
        unsafe {
            env::set_var(ENV_TARGET_VAR, path);
        }
    });
}
