//! In-memory [`VectorIndex`] for tests and library callers.
//!
//! Uses `HashMap` behind `std::sync::RwLock`. Upserts overwrite by id and
//! reject vectors whose length differs from the index dimension, like the
//! managed service does.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::models::VectorRecord;

use super::{IndexDescription, IndexSpec, VectorIndex};

struct StoredIndex {
    description: IndexDescription,
    // namespace -> id -> record
    namespaces: HashMap<String, BTreeMap<String, VectorRecord>>,
}

pub struct InMemoryIndex {
    indexes: RwLock<HashMap<String, StoredIndex>>,
    created: RwLock<usize>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self {
            indexes: RwLock::new(HashMap::new()),
            created: RwLock::new(0),
        }
    }

    /// Number of `create_index` calls that succeeded.
    pub fn created_count(&self) -> usize {
        self.created.read().map(|n| *n).unwrap_or(0)
    }

    /// All records in `index`/`namespace`, ordered by id.
    pub fn records(&self, index: &str, namespace: &str) -> Vec<VectorRecord> {
        let Ok(indexes) = self.indexes.read() else {
            return Vec::new();
        };
        indexes
            .get(index)
            .and_then(|stored| stored.namespaces.get(namespace))
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> anyhow::Error {
    anyhow::anyhow!("in-memory index lock poisoned")
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn list_indexes(&self) -> Result<Vec<String>> {
        let indexes = self.indexes.read().map_err(|_| poisoned())?;
        let mut names: Vec<String> = indexes.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn describe_index(&self, name: &str) -> Result<Option<IndexDescription>> {
        let indexes = self.indexes.read().map_err(|_| poisoned())?;
        Ok(indexes.get(name).map(|stored| stored.description.clone()))
    }

    async fn create_index(&self, spec: &IndexSpec) -> Result<IndexDescription> {
        let mut indexes = self.indexes.write().map_err(|_| poisoned())?;
        if indexes.contains_key(&spec.name) {
            bail!("Index '{}' already exists", spec.name);
        }
        let description = IndexDescription {
            name: spec.name.clone(),
            dimension: spec.dimension,
            metric: spec.metric,
            host: None,
            ready: true,
        };
        indexes.insert(
            spec.name.clone(),
            StoredIndex {
                description: description.clone(),
                namespaces: HashMap::new(),
            },
        );
        *self.created.write().map_err(|_| poisoned())? += 1;
        Ok(description)
    }

    async fn upsert(
        &self,
        index: &str,
        namespace: &str,
        records: &[VectorRecord],
    ) -> Result<usize> {
        let mut indexes = self.indexes.write().map_err(|_| poisoned())?;
        let stored = indexes
            .get_mut(index)
            .ok_or_else(|| anyhow::anyhow!("Index '{}' not found", index))?;

        let dimension = stored.description.dimension;
        if let Some(bad) = records.iter().find(|r| r.values.len() != dimension) {
            bail!(
                "Vector dimension {} does not match the dimension of the index {} (id '{}')",
                bad.values.len(),
                dimension,
                bad.id
            );
        }

        let target = stored.namespaces.entry(namespace.to_string()).or_default();
        for record in records {
            target.insert(record.id.clone(), record.clone());
        }
        Ok(records.len())
    }
}
