use anyhow::Result;
use std::path::Path;

use crate::edgar::xbrl::Fact;

/// Embedded store for extracted facts, keyed so that re-processing the
/// same filing is idempotent.
pub struct FactStore {
    db: sled::Db,
}

impl FactStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    fn fact_key(fact: &Fact) -> String {
        format!(
            "{}|{}|{}|{}",
            fact.cik, fact.metric, fact.period_end_date, fact.form_type
        )
    }

    /// Inserts facts, returning how many were not already present.
    pub fn insert_facts(&self, facts: &[Fact]) -> Result<usize> {
        let mut inserted = 0;
        for fact in facts {
            let key = Self::fact_key(fact);
            let value = serde_json::to_vec(fact)?;
            if self.db.insert(key.as_bytes(), value)?.is_none() {
                inserted += 1;
            }
        }
        self.db.flush()?;
        Ok(inserted)
    }

    /// All stored facts for one company, in key order.
    pub fn facts_for_cik(&self, cik: &str) -> Result<Vec<Fact>> {
        let prefix = format!("{}|", cik);
        let mut facts = Vec::new();
        for entry in self.db.scan_prefix(prefix.as_bytes()) {
            let (_, value) = entry?;
            facts.push(serde_json::from_slice(&value)?);
        }
        Ok(facts)
    }

    pub fn len(&self) -> usize {
        self.db.len()
    }

    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }
}
