//! Entity store contract
//!
//! The row pipeline only ever calls [`EntityStore::bulk_upsert`]. Querying,
//! deletion and index management exist for downstream consumers and for
//! inspecting ingested data.

use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A persisted document keyed by `(kind, id)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEntity {
    pub id: String,
    pub kind: String,
    pub document: Value,
}

impl StoredEntity {
    pub fn new(id: impl Into<String>, kind: impl Into<String>, document: Value) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            document,
        }
    }

    /// Top-level document field, with `id` resolving to the entity id
    pub fn field(&self, name: &str) -> Option<Value> {
        if name == "id" {
            return Some(Value::String(self.id.clone()));
        }
        self.document.get(name).cloned()
    }
}

/// Conjunction of equality conditions on top-level document fields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
}

impl Filter {
    /// Filter matching every entity
    pub fn all() -> Self {
        Self::default()
    }

    /// Add an equality condition
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((field.into(), value.into()));
        self
    }

    pub fn matches(&self, entity: &StoredEntity) -> bool {
        self.conditions
            .iter()
            .all(|(field, expected)| entity.field(field).as_ref() == Some(expected))
    }
}

/// Offset/limit window over query results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pagination {
    pub offset: usize,
    pub limit: Option<usize>,
}

impl Pagination {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn page(offset: usize, limit: usize) -> Self {
        Self {
            offset,
            limit: Some(limit),
        }
    }

    pub fn apply<T>(&self, items: impl IntoIterator<Item = T>) -> Vec<T> {
        let iter = items.into_iter().skip(self.offset);
        match self.limit {
            Some(limit) => iter.take(limit).collect(),
            None => iter.collect(),
        }
    }
}

/// Storage backend for ingested records
///
/// Implementations must accept concurrent callers; the pipeline invokes
/// `bulk_upsert` from many workers at once without serializing them.
pub trait EntityStore: Send + Sync {
    /// Insert or replace entities by `(kind, id)`, returning how many were written
    fn bulk_upsert(&self, entities: Vec<StoredEntity>) -> Result<usize>;

    /// Entities of `kind` matching `filter`, ordered by id
    fn query(
        &self,
        kind: &str,
        filter: &Filter,
        pagination: Pagination,
    ) -> Result<Vec<StoredEntity>>;

    /// Remove entities of `kind` by id, returning how many existed
    fn delete(&self, kind: &str, ids: &[String]) -> Result<usize>;

    /// Declare an index over `fields` for entities of `kind`
    fn ensure_index(&self, kind: &str, fields: &[&str]) -> Result<()>;
}
