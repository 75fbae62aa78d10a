//! Scoped fraction overrides
//!
//! An override store holds a mapping of toggle id to fraction that
//! [`FlagsToggleMap`](crate::FlagsToggleMap) reads on every access. The store
//! keeps a shared base mapping, replaced with [`ScopedOverrides::set`], and a
//! stack of scopes per thread, pushed with [`ScopedOverrides::push`] or the
//! closure helpers. A scope is only visible on the thread that pushed it and
//! removes exactly its own layer when it ends, including on panic, so scopes
//! on other threads never see or undo each other.

use crate::config::ToggleConfig;
use crate::error::{Result, ToggleError};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::cell::RefCell;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Immutable id to fraction mapping
pub type Overrides = Arc<HashMap<String, f64>>;

/// Source of the current override mapping
pub trait OverrideStore: Send + Sync {
    /// Current mapping. Values are not validated.
    fn snapshot(&self) -> Overrides;
}

static NEXT_STORE: AtomicU64 = AtomicU64::new(0);
static NEXT_SCOPE: AtomicU64 = AtomicU64::new(0);

enum Layer {
    Set(HashMap<String, f64>),
    Clear(String),
}

struct Scope {
    store: u64,
    token: u64,
    layer: Layer,
}

thread_local! {
    // innermost scope last; holds scopes of every store used on this thread
    static SCOPES: RefCell<Vec<Scope>> = const { RefCell::new(Vec::new()) };
}

/// Override store with push/pop scoping
#[derive(Debug)]
pub struct ScopedOverrides {
    id: u64,
    base: RwLock<Overrides>,
}

impl Default for ScopedOverrides {
    fn default() -> Self {
        Self::with_mapping(HashMap::new())
    }
}

impl ScopedOverrides {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with `mapping`
    pub fn with_mapping(mapping: HashMap<String, f64>) -> Self {
        Self {
            id: NEXT_STORE.fetch_add(1, Ordering::Relaxed),
            base: RwLock::new(Arc::new(mapping)),
        }
    }

    /// Parse `id=fraction` pairs separated by commas.
    ///
    /// # Examples
    ///
    /// ```
    /// use armature_toggle::ScopedOverrides;
    ///
    /// let mapping = ScopedOverrides::parse("com.a=0.5, com.b=1.0").unwrap();
    /// assert_eq!(mapping.get("com.b"), Some(&1.0));
    /// ```
    pub fn parse(text: &str) -> Result<HashMap<String, f64>> {
        text.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                let (id, fraction) = entry
                    .split_once('=')
                    .ok_or_else(|| ToggleError::InvalidOverride(entry.to_string()))?;
                let id = id.trim();
                let fraction: f64 = fraction
                    .trim()
                    .parse()
                    .map_err(|_| ToggleError::InvalidOverride(entry.to_string()))?;
                if id.is_empty() {
                    return Err(ToggleError::InvalidOverride(entry.to_string()));
                }
                Ok((id.to_string(), fraction))
            })
            .collect()
    }

    /// Replace the shared base mapping. Visible to every thread.
    pub fn set(&self, mapping: HashMap<String, f64>) {
        *self.base.write() = Arc::new(mapping);
    }

    /// Layer `mapping` over the current overrides on this thread until the
    /// guard is dropped.
    pub fn push(&self, mapping: HashMap<String, f64>) -> OverrideGuard<'_> {
        self.push_layer(Layer::Set(mapping))
    }

    /// Hide `id` on this thread until the guard is dropped.
    pub fn push_without(&self, id: &str) -> OverrideGuard<'_> {
        self.push_layer(Layer::Clear(id.to_string()))
    }

    /// Run `body` with `mapping` layered over the current overrides.
    pub fn with_overrides<R>(&self, mapping: HashMap<String, f64>, body: impl FnOnce() -> R) -> R {
        let _guard = self.push(mapping);
        body()
    }

    /// Run `body` with `id` cleared from the current overrides.
    pub fn without_override<R>(&self, id: &str, body: impl FnOnce() -> R) -> R {
        let _guard = self.push_without(id);
        body()
    }

    fn push_layer(&self, layer: Layer) -> OverrideGuard<'_> {
        let token = NEXT_SCOPE.fetch_add(1, Ordering::Relaxed);
        SCOPES.with(|scopes| {
            scopes.borrow_mut().push(Scope {
                store: self.id,
                token,
                layer,
            })
        });
        OverrideGuard {
            token,
            _store: PhantomData,
            _thread: PhantomData,
        }
    }
}

impl OverrideStore for ScopedOverrides {
    fn snapshot(&self) -> Overrides {
        let base = self.base.read().clone();
        SCOPES.with(|scopes| {
            let scopes = scopes.borrow();
            let mut layers = scopes
                .iter()
                .filter(|scope| scope.store == self.id)
                .peekable();
            if layers.peek().is_none() {
                return base;
            }

            let mut merged = (*base).clone();
            for scope in layers {
                match &scope.layer {
                    Layer::Set(mapping) => {
                        merged.extend(mapping.iter().map(|(id, f)| (id.clone(), *f)));
                    }
                    Layer::Clear(id) => {
                        merged.remove(id);
                    }
                }
            }
            Arc::new(merged)
        })
    }
}

/// Ends an override scope when dropped
///
/// Dropping removes only this scope's layer, so guards may be dropped in any
/// order. The guard is tied to the thread that created it.
#[must_use = "the override scope ends as soon as the guard is dropped"]
pub struct OverrideGuard<'a> {
    token: u64,
    _store: PhantomData<&'a ScopedOverrides>,
    _thread: PhantomData<Rc<()>>,
}

impl Drop for OverrideGuard<'_> {
    fn drop(&mut self) {
        let token = self.token;
        // the thread local is gone once the thread is being torn down
        let _ = SCOPES.try_with(|scopes| {
            scopes.borrow_mut().retain(|scope| scope.token != token);
        });
    }
}

impl std::fmt::Debug for OverrideGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverrideGuard").field("token", &self.token).finish()
    }
}

static GLOBAL_OVERRIDES: Lazy<ScopedOverrides> = Lazy::new(|| {
    let config = ToggleConfig::from_env();
    match config.overrides.as_deref().map(ScopedOverrides::parse) {
        Some(Ok(mapping)) => ScopedOverrides::with_mapping(mapping),
        Some(Err(e)) => {
            tracing::warn!(target: "armature::toggle", "Ignoring toggle overrides: {}", e);
            ScopedOverrides::new()
        }
        None => ScopedOverrides::new(),
    }
});

/// Process-wide override store
///
/// Seeded from `ARMATURE_TOGGLE_OVERRIDES` on first access.
pub fn global_overrides() -> &'static ScopedOverrides {
    &GLOBAL_OVERRIDES
}
