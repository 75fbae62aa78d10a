//! Toggle maps
//!
//! A [`ToggleMap`] looks up [`Toggle`]s by id and enumerates the [`Metadata`]
//! of every toggle it currently knows. Unknown ids are not an error; they yield
//! a toggle that is undefined for every input.

use crate::metadata::Metadata;
use crate::observed::Observed;
use crate::or_else::OrElse;
use crate::stats::StatsReceiver;
use crate::toggle::Toggle;
use std::sync::Arc;

/// Point-in-time sequence of toggle metadata
pub type MetadataIter = Box<dyn Iterator<Item = Metadata> + Send>;

/// Registry of toggles keyed by id
pub trait ToggleMap: Send + Sync {
    /// Toggle for `id`. Never fails; unknown ids give an undefined toggle.
    fn get(&self, id: &str) -> Toggle;

    /// Snapshot of the metadata for every id this map currently defines.
    fn iter(&self) -> MetadataIter;
}

impl<T: ToggleMap + ?Sized> ToggleMap for Arc<T> {
    fn get(&self, id: &str) -> Toggle {
        (**self).get(id)
    }

    fn iter(&self) -> MetadataIter {
        (**self).iter()
    }
}

impl<T: ToggleMap + ?Sized> ToggleMap for Box<T> {
    fn get(&self, id: &str) -> Toggle {
        (**self).get(id)
    }

    fn iter(&self) -> MetadataIter {
        (**self).iter()
    }
}

/// Composition helpers available on every sized [`ToggleMap`]
pub trait ToggleMapExt: ToggleMap + Sized {
    /// Chain with `other`; `self` takes precedence.
    ///
    /// # Examples
    ///
    /// ```
    /// use armature_toggle::*;
    ///
    /// let overrides = MutableToggleMap::new();
    /// let defaults = ImmutableToggleMap::new(vec![Metadata::new("com.example", 0.0, "defaults")]);
    /// let map = overrides.clone().or_else(defaults);
    ///
    /// let toggle = map.get("com.example");
    /// assert_eq!(toggle.evaluate(1), Some(false));
    ///
    /// overrides.put("com.example", 1.0);
    /// assert_eq!(toggle.evaluate(1), Some(true));
    /// ```
    fn or_else<M: ToggleMap>(self, other: M) -> OrElse<Self, M> {
        OrElse::new(self, other)
    }

    /// Wrap with a `checksum` gauge registered on `stats`.
    fn observed(self, stats: &dyn StatsReceiver) -> Observed<Self>
    where
        Self: 'static,
    {
        Observed::new(self, stats)
    }
}

impl<T: ToggleMap + Sized> ToggleMapExt for T {}

/// Toggle map that defines nothing
///
/// Identity for [`ToggleMapExt::or_else`] on either side.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullToggleMap;

impl ToggleMap for NullToggleMap {
    fn get(&self, id: &str) -> Toggle {
        Toggle::undefined(id)
    }

    fn iter(&self) -> MetadataIter {
        Box::new(std::iter::empty())
    }
}

/// Toggle map returning the same constant decision for every id
///
/// Enumerates nothing, since it has no concrete definitions.
#[derive(Debug, Clone, Copy)]
pub struct ConstToggleMap {
    value: bool,
}

impl ConstToggleMap {
    /// Every toggle is defined and `true`
    pub fn on() -> Self {
        Self { value: true }
    }

    /// Every toggle is defined and `false`
    pub fn off() -> Self {
        Self { value: false }
    }
}

impl ToggleMap for ConstToggleMap {
    fn get(&self, id: &str) -> Toggle {
        if self.value {
            Toggle::on(id)
        } else {
            Toggle::off(id)
        }
    }

    fn iter(&self) -> MetadataIter {
        Box::new(std::iter::empty())
    }
}
