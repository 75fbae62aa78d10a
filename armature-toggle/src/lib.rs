//! Feature Toggles for Armature
//!
//! Runtime toggles that switch behaviour on for a deterministic fraction of
//! requests, without redeploying.
//!
//! # Features
//!
//! - 🎲 **Fractional Toggles** - Stable per-input decisions for a share of traffic
//! - 🧱 **Layered Sources** - Overrides, runtime registry and JSON defaults via `or_else`
//! - 🔄 **Live Handles** - Toggles follow later changes to their source
//! - 📊 **Checksum Gauge** - Detect divergent toggle state across instances
//!
//! # Quick Start
//!
//! ```
//! use armature_toggle::*;
//!
//! let defaults = ImmutableToggleMap::new(vec![
//!     Metadata::new("com.example.new-ui", 0.25, "defaults"),
//! ]);
//! let runtime = MutableToggleMap::new();
//! let toggles = runtime.clone().or_else(defaults);
//!
//! let new_ui = toggles.get("com.example.new-ui");
//! let request_id: i64 = 1234;
//! if new_ui.apply(request_id) {
//!     // Serve new UI
//! }
//!
//! // Ramp to everyone without a redeploy
//! runtime.put("com.example.new-ui", 1.0);
//! assert!(new_ui.apply(request_id));
//! ```
//!
//! # Scoped Overrides
//!
//! ```
//! use armature_toggle::*;
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! let overrides = Arc::new(ScopedOverrides::new());
//! let toggles = FlagsToggleMap::new(overrides.clone()).or_else(ConstToggleMap::off());
//! let toggle = toggles.get("com.example.beta");
//!
//! let on = HashMap::from([("com.example.beta".to_string(), 1.0)]);
//! overrides.with_overrides(on, || assert!(toggle.apply(7)));
//! assert!(!toggle.apply(7));
//! ```
//!
//! # Observability
//!
//! ```
//! use armature_toggle::*;
//!
//! let stats = InMemoryStatsReceiver::new();
//! let runtime = MutableToggleMap::new();
//! let _toggles = runtime.clone().observed(&stats);
//!
//! let before = stats.gauge("checksum");
//! runtime.put("com.example.beta", 0.5);
//! assert_ne!(stats.gauge("checksum"), before);
//! ```

pub mod config;
pub mod error;
pub mod flags;
pub mod immutable;
pub mod json;
pub mod map;
pub mod metadata;
pub mod mutable;
pub mod observed;
pub mod or_else;
pub mod overrides;
pub mod standard;
pub mod stats;
pub mod toggle;

pub use config::ToggleConfig;
pub use error::{Result, ToggleError};
pub use flags::FlagsToggleMap;
pub use immutable::ImmutableToggleMap;
pub use map::{ConstToggleMap, MetadataIter, NullToggleMap, ToggleMap, ToggleMapExt};
pub use metadata::{Metadata, is_valid_fraction, validate_id};
pub use mutable::MutableToggleMap;
pub use observed::{CHECKSUM_GAUGE, Observed, checksum};
pub use or_else::OrElse;
pub use overrides::{OverrideGuard, OverrideStore, Overrides, ScopedOverrides, global_overrides};
pub use standard::StandardToggleMap;
pub use stats::{
    Gauge, GaugeFn, InMemoryStatsReceiver, PrometheusStatsReceiver, ScopedStatsReceiver,
    StatsReceiver,
};
pub use toggle::{Toggle, fractional};
