//! Toggle map built once from a fixed list of definitions

use crate::map::{MetadataIter, ToggleMap};
use crate::metadata::Metadata;
use crate::toggle::{Toggle, fractional};
use std::collections::HashMap;
use std::sync::Arc;

/// Fixed set of fractional toggles
///
/// When the same id appears more than once the last definition decides
/// evaluation, while [`ToggleMap::iter`] still returns the input unchanged.
#[derive(Debug, Clone)]
pub struct ImmutableToggleMap {
    metadata: Arc<[Metadata]>,
    toggles: Arc<HashMap<String, Toggle>>,
}

impl ImmutableToggleMap {
    /// Build from a list of definitions. Fractions are assumed valid.
    pub fn new(metadata: Vec<Metadata>) -> Self {
        let toggles = metadata
            .iter()
            .map(|md| (md.id.clone(), fractional(&md.id, md.fraction)))
            .collect();

        Self {
            metadata: metadata.into(),
            toggles: Arc::new(toggles),
        }
    }

    /// Number of definitions
    pub fn len(&self) -> usize {
        self.metadata.len()
    }

    /// Whether there are no definitions
    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
    }
}

impl ToggleMap for ImmutableToggleMap {
    fn get(&self, id: &str) -> Toggle {
        self.toggles
            .get(id)
            .cloned()
            .unwrap_or_else(|| Toggle::undefined(id))
    }

    fn iter(&self) -> MetadataIter {
        let metadata = Arc::clone(&self.metadata);
        Box::new((0..metadata.len()).map(move |i| metadata[i].clone()))
    }
}
