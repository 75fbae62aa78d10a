//! Toggle map backed by an override store

use crate::map::{MetadataIter, ToggleMap};
use crate::metadata::{Metadata, is_valid_fraction};
use crate::overrides::{OverrideStore, global_overrides};
use crate::toggle::{Toggle, bucket, id_seed};
use std::sync::Arc;

const SOURCE: &str = "FlagsToggleMap";

/// Toggle map reading fractions from an [`OverrideStore`] on every access
///
/// Out of range fractions are dropped silently: they are neither enumerated
/// nor evaluated.
///
/// # Examples
///
/// ```
/// use armature_toggle::*;
/// use std::collections::HashMap;
/// use std::sync::Arc;
///
/// let store = Arc::new(ScopedOverrides::new());
/// let map = FlagsToggleMap::new(store.clone());
/// let toggle = map.get("com.example");
///
/// let mapping = HashMap::from([("com.example".to_string(), 1.0)]);
/// store.with_overrides(mapping, || assert_eq!(toggle.evaluate(1), Some(true)));
/// assert!(!toggle.is_defined_at(1));
/// ```
#[derive(Clone)]
pub struct FlagsToggleMap {
    store: Arc<dyn OverrideStore>,
}

impl FlagsToggleMap {
    /// Read overrides from `store`
    pub fn new(store: Arc<dyn OverrideStore>) -> Self {
        Self { store }
    }

    /// Read overrides from the process-wide store
    pub fn global() -> Self {
        Self::new(Arc::new(GlobalStore))
    }
}

impl ToggleMap for FlagsToggleMap {
    fn get(&self, id: &str) -> Toggle {
        let store = Arc::clone(&self.store);
        let key = id.to_string();
        let seed = id_seed(id);
        Toggle::new(id, move |input| {
            let fraction = store
                .snapshot()
                .get(&key)
                .copied()
                .filter(|f| is_valid_fraction(*f))?;
            Some(bucket(seed, input) < fraction)
        })
    }

    fn iter(&self) -> MetadataIter {
        let snapshot = self.store.snapshot();
        let metadata: Vec<Metadata> = snapshot
            .iter()
            .filter(|(_, fraction)| is_valid_fraction(**fraction))
            .map(|(id, fraction)| Metadata::new(id.as_str(), *fraction, SOURCE))
            .collect();
        Box::new(metadata.into_iter())
    }
}

impl std::fmt::Debug for FlagsToggleMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FlagsToggleMap")
    }
}

struct GlobalStore;

impl OverrideStore for GlobalStore {
    fn snapshot(&self) -> crate::overrides::Overrides {
        global_overrides().snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overrides::ScopedOverrides;
    use crate::toggle::fractional;
    use std::collections::HashMap;

    fn mapping(entries: &[(&str, f64)]) -> HashMap<String, f64> {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_reads_live_store() {
        let store = Arc::new(ScopedOverrides::new());
        let map = FlagsToggleMap::new(store.clone());
        let toggle = map.get("com.example");

        assert!(!toggle.is_defined_at(0));
        store.set(mapping(&[("com.example", 0.0)]));
        assert_eq!(toggle.evaluate(0), Some(false));
        store.set(mapping(&[("com.example", 1.0)]));
        assert_eq!(toggle.evaluate(0), Some(true));
    }

    #[test]
    fn test_filters_invalid_fractions() {
        let store = Arc::new(ScopedOverrides::with_mapping(mapping(&[
            ("ok", 0.5),
            ("neg", -0.1),
            ("big", 1.1),
        ])));
        let map = FlagsToggleMap::new(store);

        let ids: Vec<String> = map.iter().map(|md| md.id).collect();
        assert_eq!(ids, vec!["ok".to_string()]);

        for input in 0..100 {
            assert!(!map.get("neg").is_defined_at(input));
            assert!(!map.get("big").is_defined_at(input));
            assert!(map.get("ok").is_defined_at(input));
        }
    }

    #[test]
    fn test_matches_fractional_decisions() {
        let store = Arc::new(ScopedOverrides::with_mapping(mapping(&[("com.x", 0.3)])));
        let map = FlagsToggleMap::new(store);
        let expected = fractional("com.x", 0.3);

        for input in 0..200 {
            assert_eq!(map.get("com.x").evaluate(input), expected.evaluate(input));
        }
    }

    #[test]
    fn test_metadata_source() {
        let store = Arc::new(ScopedOverrides::with_mapping(mapping(&[("com.x", 0.3)])));
        let md = FlagsToggleMap::new(store).iter().next().unwrap();
        assert_eq!(md, Metadata::new("com.x", 0.3, SOURCE));
    }
}
