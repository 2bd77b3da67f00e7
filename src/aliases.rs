use anyhow::{Context, Result};
use log::{debug, info};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Standard metric name -> known filer-specific tag names. Matching is
/// set-membership; the vector order only keeps the JSON file readable.
pub type AliasMap = BTreeMap<String, Vec<String>>;

/// The fixed metric keys and the tag names most filers use for them.
/// Discovery only ever adds tags under these keys, never new keys.
fn default_aliases() -> AliasMap {
    let mut map = AliasMap::new();
    map.insert(
        "Revenues".to_string(),
        vec![
            "us-gaap_Revenues".to_string(),
            "us-gaap_RevenueFromContractWithCustomerExcludingAssessedTax".to_string(),
        ],
    );
    map.insert(
        "NetIncomeLoss".to_string(),
        vec!["us-gaap_NetIncomeLoss".to_string()],
    );
    map.insert("Assets".to_string(), vec!["us-gaap_Assets".to_string()]);
    map.insert(
        "Liabilities".to_string(),
        vec!["us-gaap_Liabilities".to_string()],
    );
    map.insert(
        "StockholdersEquity".to_string(),
        vec!["us-gaap_StockholdersEquity".to_string()],
    );
    map
}

/// Owns the persisted alias store and an in-memory copy of it. The file
/// is the source of truth; the cache is populated lazily on first read
/// and cleared by every writer so later reads observe the write.
///
/// Concurrent writers on a shared file can still race and drop each
/// other's additions; callers running documents in parallel must
/// serialize merges.
pub struct AliasRegistry {
    path: PathBuf,
    cache: Mutex<Option<AliasMap>>,
}

impl AliasRegistry {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            cache: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the alias map, loading it from disk on first access.
    pub fn aliases(&self) -> Result<AliasMap> {
        let mut cache = self.cache.lock().expect("alias cache lock");
        if cache.is_none() {
            *cache = Some(self.load()?);
        }
        Ok(cache.clone().expect("alias cache populated above"))
    }

    /// Clears the in-memory cache; the next read reloads from disk.
    pub fn invalidate(&self) {
        *self.cache.lock().expect("alias cache lock") = None;
    }

    /// Merges newly discovered tag names under their metric keys, skipping
    /// names already present, then rewrites the store and invalidates the
    /// cache. Returns the number of tags actually added.
    pub fn merge(&self, discovered: &BTreeMap<String, String>) -> Result<usize> {
        let mut map = self.aliases()?;
        let mut added = 0;

        for (metric, tag) in discovered {
            if metric.is_empty() || tag.is_empty() {
                continue;
            }
            let tags = map.entry(metric.clone()).or_default();
            if !tags.iter().any(|t| t == tag) {
                tags.push(tag.clone());
                added += 1;
                debug!("Alias added: {} -> {}", metric, tag);
            }
        }

        self.persist(&map)?;
        self.invalidate();
        Ok(added)
    }

    fn load(&self) -> Result<AliasMap> {
        if !self.path.exists() {
            let defaults = default_aliases();
            self.persist(&defaults)?;
            info!(
                "Created alias store at {:?} with {} metrics",
                self.path,
                defaults.len()
            );
            return Ok(defaults);
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read alias store {:?}", self.path))?;
        let map: AliasMap = serde_json::from_str(&content)
            .with_context(|| format!("Alias store {:?} is not valid JSON", self.path))?;
        Ok(map)
    }

    fn persist(&self, map: &AliasMap) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(map)?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write alias store {:?}", self.path))?;
        Ok(())
    }
}
