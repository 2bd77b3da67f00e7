use quantedgar::aliases::{AliasMap, AliasRegistry};
use std::collections::BTreeMap;
use std::fs;
use tempfile::tempdir;

#[test]
fn test_load_or_create_seeds_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("metric_aliases.json");
    let registry = AliasRegistry::new(&path);

    let aliases = registry.aliases().unwrap();
    assert!(path.exists(), "alias store should be created on first read");
    assert!(aliases.contains_key("Revenues"));
    assert!(aliases.contains_key("Assets"));
    assert!(aliases["Revenues"].contains(&"us-gaap_Revenues".to_string()));
}

#[test]
fn test_save_then_reload_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("metric_aliases.json");

    let first = AliasRegistry::new(&path).aliases().unwrap();
    let second = AliasRegistry::new(&path).aliases().unwrap();
    assert_eq!(first, second);

    // The persisted form is one JSON object of metric -> tag arrays.
    let raw: AliasMap = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(raw, first);
}

#[test]
fn test_merge_adds_and_invalidates() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("metric_aliases.json");
    let registry = AliasRegistry::new(&path);
    registry.aliases().unwrap();

    let mut discovered = BTreeMap::new();
    discovered.insert("Revenues".to_string(), "us-gaap_SalesRevenueNet".to_string());
    assert_eq!(registry.merge(&discovered).unwrap(), 1);

    // The same handle observes the write without explicit invalidation.
    let aliases = registry.aliases().unwrap();
    assert!(aliases["Revenues"].contains(&"us-gaap_SalesRevenueNet".to_string()));

    // A fresh handle sharing the file observes it too.
    let other = AliasRegistry::new(&path);
    let aliases = other.aliases().unwrap();
    assert!(aliases["Revenues"].contains(&"us-gaap_SalesRevenueNet".to_string()));
}

#[test]
fn test_merge_is_idempotent() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("metric_aliases.json");
    let registry = AliasRegistry::new(&path);

    let mut discovered = BTreeMap::new();
    discovered.insert("Revenues".to_string(), "us-gaap_SalesRevenueNet".to_string());
    assert_eq!(registry.merge(&discovered).unwrap(), 1);
    let after_first = registry.aliases().unwrap();

    // Merging the same alias again adds nothing and leaves the persisted
    // map unchanged.
    assert_eq!(registry.merge(&discovered).unwrap(), 0);
    let after_second = registry.aliases().unwrap();
    assert_eq!(after_first, after_second);

    let count = after_second["Revenues"]
        .iter()
        .filter(|t| t.as_str() == "us-gaap_SalesRevenueNet")
        .count();
    assert_eq!(count, 1, "no duplicate tag entries");
}

#[test]
fn test_merge_skips_empty_entries() {
    let dir = tempdir().unwrap();
    let registry = AliasRegistry::new(dir.path().join("metric_aliases.json"));

    let mut discovered = BTreeMap::new();
    discovered.insert("Revenues".to_string(), String::new());
    discovered.insert(String::new(), "us-gaap_Whatever".to_string());
    assert_eq!(registry.merge(&discovered).unwrap(), 0);
}

#[test]
fn test_stale_handle_reloads_after_invalidate() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("metric_aliases.json");

    let reader = AliasRegistry::new(&path);
    let writer = AliasRegistry::new(&path);
    reader.aliases().unwrap();

    let mut discovered = BTreeMap::new();
    discovered.insert("Assets".to_string(), "us-gaap_AssetsTotal".to_string());
    writer.merge(&discovered).unwrap();

    // The reader cached before the write; invalidation forces a reload
    // from the shared file.
    reader.invalidate();
    let aliases = reader.aliases().unwrap();
    assert!(aliases["Assets"].contains(&"us-gaap_AssetsTotal".to_string()));
}
