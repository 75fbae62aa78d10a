// Toggle configuration loading

use crate::error::Result;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

/// Directories searched for JSON toggle definitions (`:` separated)
pub const ENV_CONFIG_DIRS: &str = "ARMATURE_TOGGLE_CONFIG_DIRS";
/// Service name selecting service-specific definitions
pub const ENV_SERVICE: &str = "ARMATURE_TOGGLE_SERVICE";
/// Initial overrides, `id=fraction,...`
pub const ENV_OVERRIDES: &str = "ARMATURE_TOGGLE_OVERRIDES";

/// Toggle configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ToggleConfig {
    /// Directories searched for `<library>.json` and `<library>-<service>.json`
    pub config_dirs: Vec<PathBuf>,

    /// Service name for service-specific definitions
    pub service_name: Option<String>,

    /// Initial process-wide overrides, `id=fraction` pairs separated by commas
    pub overrides: Option<String>,
}

impl ToggleConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from `ARMATURE_TOGGLE_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config = serde_json::from_str(&text)?;
        tracing::debug!(
            target: "armature::toggle",
            "Loaded toggle config from {}",
            path.as_ref().display()
        );
        Ok(config)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let config_dirs = lookup(ENV_CONFIG_DIRS)
            .map(|dirs| {
                env::split_paths(&dirs)
                    .filter(|p| !p.as_os_str().is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            config_dirs,
            service_name: lookup(ENV_SERVICE).filter(|s| !s.is_empty()),
            overrides: lookup(ENV_OVERRIDES).filter(|s| !s.is_empty()),
        }
    }

    /// Add a definition directory
    pub fn with_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dirs.push(dir.into());
        self
    }

    /// Set service name
    pub fn with_service_name(mut self, service_name: impl Into<String>) -> Self {
        self.service_name = Some(service_name.into());
        self
    }

    /// Set initial overrides
    pub fn with_overrides(mut self, overrides: impl Into<String>) -> Self {
        self.overrides = Some(overrides.into());
        self
    }
}
