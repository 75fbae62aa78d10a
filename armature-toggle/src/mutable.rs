//! Runtime-updatable toggle map

use crate::map::{MetadataIter, ToggleMap};
use crate::metadata::{Metadata, is_valid_fraction};
use crate::toggle::{Toggle, fractional};
use dashmap::DashMap;
use std::sync::Arc;

const SOURCE: &str = "MutableToggleMap";

struct Entry {
    fraction: f64,
    toggle: Toggle,
}

/// Concurrent toggle registry that can be changed at runtime
///
/// Toggles handed out by [`ToggleMap::get`] look the id up again on every
/// evaluation, so they follow later [`put`](Self::put) and
/// [`remove`](Self::remove) calls. Clones share the same registry.
///
/// # Examples
///
/// ```
/// use armature_toggle::*;
///
/// let map = MutableToggleMap::new();
/// let toggle = map.get("com.example.beta");
/// assert!(!toggle.is_defined_at(1));
///
/// map.put("com.example.beta", 1.0);
/// assert_eq!(toggle.evaluate(1), Some(true));
///
/// map.remove("com.example.beta");
/// assert!(!toggle.is_defined_at(1));
/// ```
#[derive(Clone, Default)]
pub struct MutableToggleMap {
    entries: Arc<DashMap<String, Entry>>,
}

impl MutableToggleMap {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the fraction for `id`.
    ///
    /// Fractions outside `[0.0, 1.0]` are logged and ignored, leaving any
    /// existing definition in place.
    pub fn put(&self, id: &str, fraction: f64) {
        if !is_valid_fraction(fraction) {
            tracing::warn!(
                target: "armature::toggle",
                "ignoring invalid fraction={:?} for {}",
                fraction,
                id
            );
            return;
        }

        let entry = Entry {
            fraction,
            toggle: fractional(id, fraction),
        };
        self.entries.insert(id.to_string(), entry);
        tracing::info!(target: "armature::toggle", "{} set to fraction={:?}", id, fraction);
    }

    /// Remove the definition for `id`, if any.
    pub fn remove(&self, id: &str) {
        if self.entries.remove(id).is_some() {
            tracing::info!(target: "armature::toggle", "{} removed", id);
        }
    }

    /// Current fraction for `id`
    pub fn fraction(&self, id: &str) -> Option<f64> {
        self.entries.get(id).map(|entry| entry.fraction)
    }

    /// Number of defined ids
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no ids are defined
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ToggleMap for MutableToggleMap {
    fn get(&self, id: &str) -> Toggle {
        let entries = Arc::clone(&self.entries);
        let key = id.to_string();
        Toggle::new(id, move |input| {
            let toggle = entries.get(&key).map(|entry| entry.toggle.clone())?;
            toggle.evaluate(input)
        })
    }

    fn iter(&self) -> MetadataIter {
        let snapshot: Vec<Metadata> = self
            .entries
            .iter()
            .map(|entry| Metadata::new(entry.key().as_str(), entry.fraction, SOURCE))
            .collect();
        Box::new(snapshot.into_iter())
    }
}

impl std::fmt::Debug for MutableToggleMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutableToggleMap")
            .field("len", &self.entries.len())
            .finish()
    }
}
