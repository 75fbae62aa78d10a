//! Integration tests for layered and observed toggle maps

use armature_toggle::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};

fn mapping(entries: &[(&str, f64)]) -> HashMap<String, f64> {
    entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

fn immutable(entries: &[(&str, f64)], source: &str) -> ImmutableToggleMap {
    ImmutableToggleMap::new(
        entries
            .iter()
            .map(|(id, f)| Metadata::new(*id, *f, source))
            .collect(),
    )
}

#[test]
fn test_or_else_precedence_and_enumeration() {
    let tm0 = immutable(&[("com.x", 1.0)], "tm0");
    let tm1 = immutable(&[("com.x", 0.0), ("com.y", 1.0)], "tm1");
    let map = tm0.or_else(tm1);

    for x in 0..100 {
        assert_eq!(map.get("com.x").evaluate(x), Some(true));
        assert_eq!(map.get("com.y").evaluate(x), Some(true));
        assert!(!map.get("com.z").is_defined_at(x));
    }

    let xs: Vec<Metadata> = map.iter().filter(|md| md.id == "com.x").collect();
    assert_eq!(xs, vec![Metadata::new("com.x", 1.0, "tm0")]);
}

#[test]
fn test_full_stack_precedence() {
    let overrides = Arc::new(ScopedOverrides::new());
    let runtime = MutableToggleMap::new();
    let defaults = immutable(&[("com.feature", 0.0)], "defaults");
    let stats = InMemoryStatsReceiver::new();

    let toggles = FlagsToggleMap::new(overrides.clone())
        .or_else(runtime.clone())
        .or_else(defaults)
        .observed(&stats);
    let toggle = toggles.get("com.feature");

    assert_eq!(toggle.evaluate(1), Some(false));

    runtime.put("com.feature", 1.0);
    assert_eq!(toggle.evaluate(1), Some(true));

    overrides.with_overrides(mapping(&[("com.feature", 0.0)]), || {
        assert_eq!(toggle.evaluate(1), Some(false));
    });
    assert_eq!(toggle.evaluate(1), Some(true));

    runtime.remove("com.feature");
    assert_eq!(toggle.evaluate(1), Some(false));
}

#[test]
fn test_scoped_override_restores_prior_visibility() {
    let overrides = Arc::new(ScopedOverrides::new());
    let map = FlagsToggleMap::new(overrides.clone());
    let toggle = map.get("com.scoped");

    assert!(!toggle.is_defined_at(0));
    overrides.with_overrides(mapping(&[("com.scoped", 1.0)]), || {
        assert_eq!(toggle.evaluate(0), Some(true));

        overrides.with_overrides(mapping(&[("com.scoped", 0.0)]), || {
            assert_eq!(toggle.evaluate(0), Some(false));
        });
        assert_eq!(toggle.evaluate(0), Some(true));

        overrides.without_override("com.scoped", || {
            assert!(!toggle.is_defined_at(0));
        });
        assert_eq!(toggle.evaluate(0), Some(true));
    });
    assert!(!toggle.is_defined_at(0));
    assert_eq!(map.iter().count(), 0);
}

#[test]
fn test_scoped_override_restores_after_panic() {
    let overrides = Arc::new(ScopedOverrides::new());
    let toggle = FlagsToggleMap::new(overrides.clone()).get("com.panic");

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        overrides.with_overrides(mapping(&[("com.panic", 1.0)]), || {
            if toggle.apply(0) {
                panic!("scoped body failed");
            }
        });
    }));

    assert!(result.is_err());
    assert!(!toggle.is_defined_at(0));
}

#[test]
fn test_overlapping_scopes_on_separate_threads() {
    let overrides = Arc::new(ScopedOverrides::new());
    let map = FlagsToggleMap::new(overrides.clone());
    let first = map.get("com.first");
    let second = map.get("com.second");
    let entered = Barrier::new(2);
    let first_exited = Barrier::new(2);

    std::thread::scope(|s| {
        s.spawn(|| {
            overrides.with_overrides(mapping(&[("com.first", 1.0)]), || {
                entered.wait();
                assert_eq!(first.evaluate(3), Some(true));
                assert!(!second.is_defined_at(3));
            });
            first_exited.wait();
        });
        s.spawn(|| {
            overrides.with_overrides(mapping(&[("com.second", 1.0)]), || {
                entered.wait();
                first_exited.wait();
                assert_eq!(second.evaluate(3), Some(true));
                assert!(!first.is_defined_at(3));
            });
        });
    });

    assert!(!first.is_defined_at(3));
    assert!(!second.is_defined_at(3));
    assert_eq!(map.iter().count(), 0);
}

#[test]
fn test_checksum_pulls_during_mutation() {
    let stats = InMemoryStatsReceiver::new();
    let runtime = MutableToggleMap::new();
    runtime.put("com.fixed", 0.5);
    let _toggles = runtime.clone().observed(&stats);

    let fixed = Metadata::new("com.fixed", 0.5, "MutableToggleMap");
    let consistent: Vec<f32> = [None, Some(0.25), Some(0.75)]
        .into_iter()
        .map(|fraction| {
            let mut mds = vec![fixed.clone()];
            mds.extend(fraction.map(|f| Metadata::new("com.moving", f, "MutableToggleMap")));
            checksum(mds)
        })
        .collect();

    let done = AtomicBool::new(false);
    let pulls = std::thread::scope(|s| {
        let reader = s.spawn(|| {
            let mut pulls = 0;
            while !done.load(Ordering::Acquire) {
                let value = stats.gauge(CHECKSUM_GAUGE).unwrap();
                assert!(consistent.contains(&value), "inconsistent checksum {value}");
                pulls += 1;
            }
            pulls
        });

        for i in 0..2000 {
            match i % 3 {
                0 => runtime.put("com.moving", 0.25),
                1 => runtime.put("com.moving", 0.75),
                _ => runtime.remove("com.moving"),
            }
        }
        runtime.put("com.moving", 0.75);
        done.store(true, Ordering::Release);
        reader.join().unwrap()
    });

    assert!(pulls > 0);
    assert_eq!(stats.gauge(CHECKSUM_GAUGE), Some(consistent[2]));
}

#[test]
fn test_invalid_overrides_are_filtered_silently() {
    let overrides = Arc::new(ScopedOverrides::new());
    let map = FlagsToggleMap::new(overrides.clone()).or_else(immutable(&[("com.neg", 1.0)], "d"));

    overrides.with_overrides(mapping(&[("com.neg", -0.5), ("com.big", 1.5), ("com.ok", 0.0)]), || {
        let ids: Vec<String> = map.iter().map(|md| md.id).collect();
        assert!(ids.contains(&"com.ok".to_string()));
        assert!(!ids.contains(&"com.big".to_string()));
        assert_eq!(ids.iter().filter(|id| *id == "com.neg").count(), 1);

        for x in 0..50 {
            // the invalid override falls through to the default layer
            assert_eq!(map.get("com.neg").evaluate(x), Some(true));
            assert!(!map.get("com.big").is_defined_at(x));
        }
    });
}

#[test]
fn test_null_toggle_map_identity() {
    let base = immutable(&[("com.a", 1.0), ("com.b", 0.3)], "base");
    let variants: Vec<Box<dyn ToggleMap>> = vec![
        Box::new(NullToggleMap.or_else(base.clone())),
        Box::new(base.clone().or_else(NullToggleMap)),
    ];

    for variant in &variants {
        assert_eq!(variant.iter().collect::<Vec<_>>(), base.iter().collect::<Vec<_>>());
        for id in ["com.a", "com.b", "com.c"] {
            for x in 0..100 {
                assert_eq!(variant.get(id).evaluate(x), base.get(id).evaluate(x));
            }
        }
    }
}

#[test]
fn test_checksum_gauge_on_composed_map() {
    let stats = InMemoryStatsReceiver::new();
    let runtime = MutableToggleMap::new();
    let _toggles = runtime
        .clone()
        .or_else(immutable(&[("com.static", 0.5)], "defaults"))
        .observed(&stats);

    let initial = stats.gauge(CHECKSUM_GAUGE).unwrap();
    assert_eq!(initial, checksum(vec![Metadata::new("com.static", 0.5, "defaults")]));
    assert_eq!(stats.gauge(CHECKSUM_GAUGE).unwrap(), initial);

    // shadowing the default with the same fraction leaves the definitions unchanged
    runtime.put("com.static", 0.5);
    assert_eq!(stats.gauge(CHECKSUM_GAUGE).unwrap(), initial);

    runtime.put("com.static", 0.7);
    assert_ne!(stats.gauge(CHECKSUM_GAUGE).unwrap(), initial);

    runtime.put("com.new", 0.1);
    let with_new = stats.gauge(CHECKSUM_GAUGE).unwrap();
    assert_eq!(with_new, stats.gauge(CHECKSUM_GAUGE).unwrap());
}

#[test]
fn test_empty_map_checksum_constant() {
    let stats = InMemoryStatsReceiver::new();
    let _toggles = NullToggleMap.observed(&stats);

    assert_eq!(stats.gauge(CHECKSUM_GAUGE), Some(0.0));
    assert_eq!(stats.gauge(CHECKSUM_GAUGE), Some(0.0));
}

#[test]
fn test_checksum_exported_to_prometheus() {
    use prometheus::{Encoder, Registry, TextEncoder};

    let stats = Arc::new(PrometheusStatsReceiver::new(Registry::new()));
    let scoped = ScopedStatsReceiver::new(stats.clone(), "toggles").scope("com.lib");
    let runtime = MutableToggleMap::new();
    let _toggles = runtime.clone().observed(&scoped);
    runtime.put("com.lib.a", 1.0);

    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&stats.registry().gather(), &mut buffer)
        .unwrap();
    let text = String::from_utf8(buffer).unwrap();

    let expected = checksum(runtime.iter());
    assert!(
        text.contains(&format!("toggles_com_lib_checksum {expected}")),
        "unexpected export: {text}"
    );
}
