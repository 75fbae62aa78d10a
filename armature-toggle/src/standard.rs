//! Standard per-library toggle map
//!
//! Composes the usual sources for a library, highest precedence first:
//!
//! 1. process-wide overrides ([`FlagsToggleMap::global`])
//! 2. the library's runtime registry ([`StandardToggleMap::mutable`])
//! 3. `<library>-<service>.json` from each configured directory
//! 4. `<library>.json` from each configured directory
//!
//! The result is [`Observed`] under the `toggles/<library>` stats scope.

use crate::config::ToggleConfig;
use crate::error::Result;
use crate::flags::FlagsToggleMap;
use crate::json;
use crate::map::{MetadataIter, ToggleMap, ToggleMapExt};
use crate::metadata::validate_id;
use crate::mutable::MutableToggleMap;
use crate::observed::Observed;
use crate::stats::{ScopedStatsReceiver, StatsReceiver};
use crate::toggle::Toggle;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::sync::Arc;

static MUTABLES: Lazy<DashMap<String, MutableToggleMap>> = Lazy::new(DashMap::new);

type Layers = Arc<dyn ToggleMap>;

/// Canonical toggle map for a library
pub struct StandardToggleMap {
    library: String,
    map: Observed<Layers>,
}

impl StandardToggleMap {
    /// Build the composed map for `library`.
    ///
    /// `library` must be a valid toggle id, since it names the definition
    /// files. Missing definition files are skipped; unreadable or invalid ones
    /// fail.
    pub fn build(
        library: &str,
        stats: Arc<dyn StatsReceiver>,
        config: &ToggleConfig,
    ) -> Result<Self> {
        validate_id(library)?;
        let mut layers: Layers =
            Arc::new(FlagsToggleMap::global().or_else(Self::mutable(library)));

        let mut files = Vec::new();
        if let Some(service) = &config.service_name {
            files.push(format!("{library}-{service}.json"));
        }
        files.push(format!("{library}.json"));

        for file in &files {
            for dir in &config.config_dirs {
                let path = dir.join(file);
                if path.is_file() {
                    layers = Arc::new(layers.or_else(json::load_file(&path)?));
                }
            }
        }

        let scoped = ScopedStatsReceiver::new(stats, "toggles").scope(library);
        tracing::debug!(target: "armature::toggle", "Built standard toggle map for {}", library);

        Ok(Self {
            library: library.to_string(),
            map: layers.observed(&scoped),
        })
    }

    /// Process-wide runtime registry for `library`.
    ///
    /// Every call with the same name returns a handle to the same registry.
    pub fn mutable(library: &str) -> MutableToggleMap {
        MUTABLES.entry(library.to_string()).or_default().clone()
    }

    /// Library name
    pub fn library(&self) -> &str {
        &self.library
    }
}

impl ToggleMap for StandardToggleMap {
    fn get(&self, id: &str) -> Toggle {
        self.map.get(id)
    }

    fn iter(&self) -> MetadataIter {
        self.map.iter()
    }
}

impl std::fmt::Debug for StandardToggleMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StandardToggleMap")
            .field("library", &self.library)
            .finish_non_exhaustive()
    }
}
