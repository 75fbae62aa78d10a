//! Gauge registration
//!
//! Toggle maps export pull-style gauges: the value is computed by a closure each
//! time the sink reads it. A [`Gauge`] handle keeps the registration alive and
//! removes it when dropped.

use dashmap::DashMap;
use prometheus::Registry;
use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Gauge value supplier
pub type GaugeFn = Box<dyn Fn() -> f32 + Send + Sync>;

/// Sink accepting named gauges
pub trait StatsReceiver: Send + Sync {
    /// Register `f` under `name`. The gauge lives as long as the returned handle.
    fn add_gauge(&self, name: &str, f: GaugeFn) -> Gauge;
}

impl<T: StatsReceiver + ?Sized> StatsReceiver for Arc<T> {
    fn add_gauge(&self, name: &str, f: GaugeFn) -> Gauge {
        (**self).add_gauge(name, f)
    }
}

/// Registration handle; deregisters the gauge on drop
#[must_use = "the gauge is removed as soon as the handle is dropped"]
pub struct Gauge {
    remove: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Gauge {
    /// Handle running `remove` when dropped
    pub fn new(remove: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            remove: Some(Box::new(remove)),
        }
    }

    /// Handle with nothing to clean up
    pub fn detached() -> Self {
        Self { remove: None }
    }
}

impl Drop for Gauge {
    fn drop(&mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl std::fmt::Debug for Gauge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gauge")
            .field("registered", &self.remove.is_some())
            .finish()
    }
}

// ============================================================================
// In-memory receiver
// ============================================================================

struct Registered {
    generation: u64,
    f: Arc<dyn Fn() -> f32 + Send + Sync>,
}

/// Receiver that keeps gauges in memory and reads them on request
///
/// # Examples
///
/// ```
/// use armature_toggle::*;
///
/// let stats = InMemoryStatsReceiver::new();
/// let _gauge = stats.add_gauge("answer", Box::new(|| 42.0));
/// assert_eq!(stats.gauge("answer"), Some(42.0));
/// ```
#[derive(Clone, Default)]
pub struct InMemoryStatsReceiver {
    gauges: Arc<DashMap<String, Registered>>,
    generation: Arc<AtomicU64>,
}

impl InMemoryStatsReceiver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pull the current value of gauge `name`
    pub fn gauge(&self, name: &str) -> Option<f32> {
        // run outside the shard guard; the closure may touch this receiver
        let f = self
            .gauges
            .get(name)
            .map(|registered| Arc::clone(&registered.f))?;
        Some(f())
    }

    /// Names of all registered gauges, sorted
    pub fn gauge_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.gauges.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

impl StatsReceiver for InMemoryStatsReceiver {
    fn add_gauge(&self, name: &str, f: GaugeFn) -> Gauge {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        self.gauges.insert(
            name.to_string(),
            Registered {
                generation,
                f: Arc::from(f),
            },
        );

        let gauges = Arc::clone(&self.gauges);
        let name = name.to_string();
        Gauge::new(move || {
            // a later registration under the same name must survive
            gauges.remove_if(&name, |_, registered| registered.generation == generation);
        })
    }
}

// ============================================================================
// Scoping
// ============================================================================

/// Receiver prefixing every gauge name with `scope/`
#[derive(Clone)]
pub struct ScopedStatsReceiver {
    inner: Arc<dyn StatsReceiver>,
    prefix: String,
}

impl ScopedStatsReceiver {
    pub fn new(inner: Arc<dyn StatsReceiver>, scope: &str) -> Self {
        Self {
            inner,
            prefix: scope.to_string(),
        }
    }

    /// Nest a further scope
    pub fn scope(&self, scope: &str) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            prefix: format!("{}/{}", self.prefix, scope),
        }
    }
}

impl StatsReceiver for ScopedStatsReceiver {
    fn add_gauge(&self, name: &str, f: GaugeFn) -> Gauge {
        self.inner
            .add_gauge(&format!("{}/{}", self.prefix, name), f)
    }
}

// ============================================================================
// Prometheus
// ============================================================================

/// Receiver exposing gauges through a Prometheus [`Registry`]
///
/// Each gauge becomes a collector whose value is computed at scrape time.
/// Names are sanitised to the Prometheus charset (`toggles/lib/checksum`
/// becomes `toggles_lib_checksum`).
#[derive(Clone)]
pub struct PrometheusStatsReceiver {
    registry: Registry,
}

impl PrometheusStatsReceiver {
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }

    /// Registry gauges are exported to
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl Default for PrometheusStatsReceiver {
    fn default() -> Self {
        Self::new(prometheus::default_registry().clone())
    }
}

impl StatsReceiver for PrometheusStatsReceiver {
    fn add_gauge(&self, name: &str, f: GaugeFn) -> Gauge {
        let metric_name = prometheus_name(name);
        let help = format!("Toggle gauge {name}");
        let gauge = match prometheus::Gauge::new(metric_name.as_str(), help) {
            Ok(gauge) => gauge,
            Err(e) => {
                tracing::warn!(
                    target: "armature::toggle",
                    "Failed to create gauge {}: {}",
                    metric_name,
                    e
                );
                return Gauge::detached();
            }
        };

        let collector = PullGauge {
            gauge,
            f: Arc::new(f),
        };
        if let Err(e) = self.registry.register(Box::new(collector.clone())) {
            tracing::warn!(
                target: "armature::toggle",
                "Failed to register gauge {}: {}",
                metric_name,
                e
            );
            return Gauge::detached();
        }

        let registry = self.registry.clone();
        Gauge::new(move || {
            let _ = registry.unregister(Box::new(collector));
        })
    }
}

#[derive(Clone)]
struct PullGauge {
    gauge: prometheus::Gauge,
    f: Arc<GaugeFn>,
}

impl Collector for PullGauge {
    fn desc(&self) -> Vec<&Desc> {
        self.gauge.desc()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        self.gauge.set(f64::from((self.f)()));
        self.gauge.collect()
    }
}

fn prometheus_name(name: &str) -> String {
    let mut sanitized: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == ':' { c } else { '_' })
        .collect();
    if sanitized.starts_with(|c: char| c.is_ascii_digit()) {
        sanitized.insert(0, '_');
    }
    sanitized
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::{Encoder, TextEncoder};

    #[test]
    fn test_in_memory_gauge_lifecycle() {
        let stats = InMemoryStatsReceiver::new();
        let gauge = stats.add_gauge("g", Box::new(|| 1.5));
        assert_eq!(stats.gauge("g"), Some(1.5));

        drop(gauge);
        assert_eq!(stats.gauge("g"), None);
    }

    #[test]
    fn test_replaced_gauge_survives_old_handle() {
        let stats = InMemoryStatsReceiver::new();
        let old = stats.add_gauge("g", Box::new(|| 1.0));
        let _new = stats.add_gauge("g", Box::new(|| 2.0));

        drop(old);
        assert_eq!(stats.gauge("g"), Some(2.0));
    }

    #[test]
    fn test_gauge_may_register_on_same_receiver() {
        let stats = InMemoryStatsReceiver::new();
        let receiver = stats.clone();
        let _outer = stats.add_gauge(
            "g",
            Box::new(move || {
                let _replacement = receiver.add_gauge("g", Box::new(|| 2.0));
                1.0
            }),
        );

        assert_eq!(stats.gauge("g"), Some(1.0));
        assert_eq!(stats.gauge("g"), None);
    }

    #[test]
    fn test_scoped_names() {
        let stats = InMemoryStatsReceiver::new();
        let scoped = ScopedStatsReceiver::new(Arc::new(stats.clone()), "toggles").scope("lib");
        let _gauge = scoped.add_gauge("checksum", Box::new(|| 0.0));

        assert_eq!(stats.gauge_names(), vec!["toggles/lib/checksum".to_string()]);
    }

    #[test]
    fn test_prometheus_name() {
        assert_eq!(prometheus_name("toggles/com.lib/checksum"), "toggles_com_lib_checksum");
        assert_eq!(prometheus_name("9lives"), "_9lives");
    }

    #[test]
    fn test_prometheus_pulls_on_gather() {
        let stats = PrometheusStatsReceiver::new(Registry::new());
        let gauge = stats.add_gauge("toggles/checksum", Box::new(|| 7.0));

        let families = stats.registry().gather();
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&families, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("toggles_checksum 7"), "unexpected export: {text}");

        drop(gauge);
        assert!(stats.registry().gather().is_empty());
    }

    #[test]
    fn test_prometheus_duplicate_is_detached() {
        let stats = PrometheusStatsReceiver::new(Registry::new());
        let _first = stats.add_gauge("dup", Box::new(|| 1.0));
        let second = stats.add_gauge("dup", Box::new(|| 2.0));

        assert!(format!("{second:?}").contains("registered: false"));
        assert_eq!(stats.registry().gather().len(), 1);
    }
}
