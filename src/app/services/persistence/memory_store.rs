//! In-memory entity store

use super::entity_store::{EntityStore, Filter, Pagination, StoredEntity};
use crate::{Error, Result};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

type EntityKey = (String, String);

/// Entity store backed by an ordered map, keyed by `(kind, id)`
#[derive(Debug, Default)]
pub struct InMemoryEntityStore {
    entities: Mutex<BTreeMap<EntityKey, StoredEntity>>,
    indexes: Mutex<HashMap<String, BTreeSet<Vec<String>>>>,
}

impl InMemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entities of `kind`
    pub fn count(&self, kind: &str) -> Result<usize> {
        Ok(self
            .entities()?
            .keys()
            .filter(|(entity_kind, _)| entity_kind == kind)
            .count())
    }

    /// Declared indexes for `kind`
    pub fn indexes(&self, kind: &str) -> Result<Vec<Vec<String>>> {
        let indexes = self
            .indexes
            .lock()
            .map_err(|_| Error::persistence("index registry lock poisoned"))?;
        Ok(indexes
            .get(kind)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn entities(&self) -> Result<MutexGuard<'_, BTreeMap<EntityKey, StoredEntity>>> {
        self.entities
            .lock()
            .map_err(|_| Error::persistence("entity map lock poisoned"))
    }
}

impl EntityStore for InMemoryEntityStore {
    fn bulk_upsert(&self, entities: Vec<StoredEntity>) -> Result<usize> {
        let mut map = self.entities()?;
        let written = entities.len();
        for entity in entities {
            map.insert((entity.kind.clone(), entity.id.clone()), entity);
        }
        Ok(written)
    }

    fn query(
        &self,
        kind: &str,
        filter: &Filter,
        pagination: Pagination,
    ) -> Result<Vec<StoredEntity>> {
        let map = self.entities()?;
        let matching = map
            .iter()
            .filter(|((entity_kind, _), entity)| entity_kind == kind && filter.matches(entity))
            .map(|(_, entity)| entity.clone());
        Ok(pagination.apply(matching))
    }

    fn delete(&self, kind: &str, ids: &[String]) -> Result<usize> {
        let mut map = self.entities()?;
        Ok(ids
            .iter()
            .filter(|id| map.remove(&(kind.to_string(), (*id).clone())).is_some())
            .count())
    }

    fn ensure_index(&self, kind: &str, fields: &[&str]) -> Result<()> {
        let mut indexes = self
            .indexes
            .lock()
            .map_err(|_| Error::persistence("index registry lock poisoned"))?;
        indexes
            .entry(kind.to_string())
            .or_default()
            .insert(fields.iter().map(|field| field.to_string()).collect());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entity(id: &str, kind: &str, clicks: i64) -> StoredEntity {
        StoredEntity::new(id, kind, json!({ "clicks": clicks }))
    }

    #[test]
    fn test_upsert_replaces_by_kind_and_id() {
        let store = InMemoryEntityStore::new();
        store
            .bulk_upsert(vec![entity("a", "K", 1), entity("b", "K", 2), entity("a", "J", 3)])
            .unwrap();
        store.bulk_upsert(vec![entity("a", "K", 10)]).unwrap();

        assert_eq!(store.count("K").unwrap(), 2);
        assert_eq!(store.count("J").unwrap(), 1);

        let found = store
            .query("K", &Filter::all().eq("id", "a"), Pagination::all())
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].document["clicks"], 10);
    }

    #[test]
    fn test_query_filters_and_pages() {
        let store = InMemoryEntityStore::new();
        let batch = (0..6).map(|i| entity(&format!("id-{i}"), "K", i % 2)).collect();
        store.bulk_upsert(batch).unwrap();

        let odd = store
            .query("K", &Filter::all().eq("clicks", 1), Pagination::all())
            .unwrap();
        assert_eq!(odd.len(), 3);

        let page = store.query("K", &Filter::all(), Pagination::page(4, 10)).unwrap();
        let ids: Vec<&str> = page.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["id-4", "id-5"]);
    }

    #[test]
    fn test_delete_and_indexes() {
        let store = InMemoryEntityStore::new();
        store.bulk_upsert(vec![entity("a", "K", 1), entity("b", "K", 2)]).unwrap();

        let removed = store
            .delete("K", &["a".to_string(), "zzz".to_string()])
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.count("K").unwrap(), 1);

        store.ensure_index("K", &["account_id", "date_start"]).unwrap();
        store.ensure_index("K", &["account_id", "date_start"]).unwrap();
        assert_eq!(store.indexes("K").unwrap().len(), 1);
    }
}
