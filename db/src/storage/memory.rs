use std::{
    cmp::Ordering,
    path::Path,
    sync::atomic::{AtomicUsize, Ordering as AtomicOrdering},
};

use async_trait::async_trait;
use hnf1b_common::params::SortDirection;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::instrument;

use crate::{
    models::DbPhenopacket,
    query::{OrderKey, RecordFields},
    storage::{ListQuery, PhenopacketStore, StoreError, Storage},
};

/// An in-process store with the same query semantics as [`super::postgres::PgStore`].
///
/// Each call holds a single read guard, which gives it a consistent snapshot.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<Vec<DbPhenopacket>>,
    queries: AtomicUsize,
}

impl MemoryStore {
    pub fn new(records: Vec<DbPhenopacket>) -> Self {
        Self {
            records: RwLock::new(records),
            queries: AtomicUsize::new(0),
        }
    }

    /// Seed from a file holding a JSON array of phenopacket documents.
    pub async fn load_json(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let raw = tokio::fs::read(path.as_ref())
            .await
            .map_err(|e| StoreError::Internal(Box::new(e)))?;
        let documents: Vec<Value> =
            serde_json::from_slice(&raw).map_err(|e| StoreError::Internal(Box::new(e)))?;

        let records = documents
            .into_iter()
            .map(DbPhenopacket::from_document)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Internal(Box::new(e)))?;

        tracing::info!(
            path = %path.as_ref().display(),
            records = records.len(),
            "Seeded memory store"
        );
        Ok(Self::new(records))
    }

    pub async fn insert(&self, record: DbPhenopacket) {
        self.records.write().await.push(record);
    }

    /// Remove a record by phenopacket id, returning it if it existed.
    pub async fn remove(&self, phenopacket_id: &str) -> Option<DbPhenopacket> {
        let mut records = self.records.write().await;
        let index = records
            .iter()
            .position(|r| r.phenopacket_id == phenopacket_id)?;
        Some(records.remove(index))
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Number of storage queries served so far.
    pub fn queries_issued(&self) -> usize {
        self.queries.load(AtomicOrdering::SeqCst)
    }

    fn select(records: &[DbPhenopacket], query: &ListQuery) -> Vec<DbPhenopacket> {
        let mut matching: Vec<&DbPhenopacket> = records
            .iter()
            .filter(|r| query.predicate.matches(*r))
            .collect();
        matching.sort_by(|a, b| compare(*a, *b, &query.order));

        matching
            .into_iter()
            .skip(usize::try_from(query.offset).unwrap_or(usize::MAX))
            .take(usize::try_from(query.limit).unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }
}

/// Postgres ordering: NULLs sort last ascending and first descending.
fn compare<R: RecordFields>(a: &R, b: &R, order: &[OrderKey]) -> Ordering {
    for key in order {
        let ordering = match (a.field(&key.target), b.field(&key.target)) {
            (Some(x), Some(y)) => x.compare(&y).unwrap_or(Ordering::Equal),
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (None, None) => Ordering::Equal,
        };
        let ordering = match key.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

#[async_trait]
impl PhenopacketStore for MemoryStore {
    async fn get(&self, phenopacket_id: &str) -> Result<Option<DbPhenopacket>, StoreError> {
        self.queries.fetch_add(1, AtomicOrdering::SeqCst);
        let records = self.records.read().await;
        Ok(records
            .iter()
            .find(|r| r.phenopacket_id == phenopacket_id)
            .cloned())
    }

    #[instrument(skip_all, fields(limit = query.limit, offset = query.offset))]
    async fn list(&self, query: &ListQuery) -> Result<Vec<DbPhenopacket>, StoreError> {
        self.queries.fetch_add(1, AtomicOrdering::SeqCst);
        let records = self.records.read().await;
        Ok(Self::select(&records, query))
    }

    #[instrument(skip_all, fields(limit = query.limit, offset = query.offset))]
    async fn list_with_count(
        &self,
        query: &ListQuery,
    ) -> Result<(Vec<DbPhenopacket>, u64), StoreError> {
        self.queries.fetch_add(2, AtomicOrdering::SeqCst);
        let records = self.records.read().await;
        let total = records
            .iter()
            .filter(|r| query.predicate.matches(*r))
            .count() as u64;
        Ok((Self::select(&records, query), total))
    }
}

#[async_trait]
impl Storage for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use hnf1b_common::value::FieldValue;
    use serde_json::json;

    use super::*;
    use crate::query::{CmpOp, FieldRegistry, FieldTarget, Predicate};

    fn record(n: u32, sex: &str) -> DbPhenopacket {
        let mut r = DbPhenopacket::from_document(json!({
            "id": format!("PP-{n:03}"),
            "subject": { "id": format!("S-{n:03}"), "sex": sex },
        }))
        .unwrap();
        r.created_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(n.into());
        r
    }

    fn query(predicate: Predicate, sort: &str, limit: u64, offset: u64) -> ListQuery {
        let registry = FieldRegistry::phenopackets().unwrap();
        let sort = hnf1b_common::params::SortParam::parse_list(sort).unwrap();
        let compiled = registry.compile(&[], &sort).unwrap();
        ListQuery {
            predicate,
            order: compiled.order,
            limit,
            offset,
        }
    }

    fn ids(records: &[DbPhenopacket]) -> Vec<&str> {
        records.iter().map(|r| r.phenopacket_id.as_str()).collect()
    }

    #[tokio::test]
    async fn filters_sorts_and_slices() {
        let store = MemoryStore::new(vec![
            record(3, "MALE"),
            record(1, "FEMALE"),
            record(2, "MALE"),
            record(4, "MALE"),
        ]);
        let male = Predicate::Compare {
            target: FieldTarget::Column("sex"),
            op: CmpOp::Eq,
            value: FieldValue::Text("MALE".into()),
        };

        let (page, total) = store
            .list_with_count(&query(male.clone(), "-created_at", 2, 1))
            .await
            .unwrap();
        assert_eq!(total, 3);
        assert_eq!(ids(&page), vec!["PP-003", "PP-002"]);

        let page = store.list(&query(male, "created_at", 10, 0)).await.unwrap();
        assert_eq!(ids(&page), vec!["PP-002", "PP-003", "PP-004"]);

        assert_eq!(store.queries_issued(), 3);
    }

    #[tokio::test]
    async fn insert_get_and_remove() {
        let store = MemoryStore::default();
        store.insert(record(1, "FEMALE")).await;

        assert!(store.get("PP-001").await.unwrap().is_some());
        assert!(store.remove("PP-001").await.is_some());
        assert!(store.get("PP-001").await.unwrap().is_none());
        assert!(store.remove("PP-001").await.is_none());
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn seeds_from_json_file() {
        let path = std::env::temp_dir().join(format!("hnf1b-seed-{}.json", uuid::Uuid::new_v4()));
        let seed = json!([
            { "id": "A", "subject": { "id": "SA" } },
            { "id": "B", "subject": { "id": "SB", "sex": "MALE" } },
        ]);
        tokio::fs::write(&path, seed.to_string()).await.unwrap();

        let store = MemoryStore::load_json(&path).await.unwrap();
        assert_eq!(store.len().await, 2);
        assert_eq!(store.get("B").await.unwrap().unwrap().sex, "MALE");

        tokio::fs::write(&path, "[{\"id\": 1}]").await.unwrap();
        assert!(matches!(
            MemoryStore::load_json(&path).await,
            Err(StoreError::Internal(_))
        ));

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn loads_bundled_fixture() {
        let store = MemoryStore::load_json(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/fixed-data/phenopackets.json"
        ))
        .await
        .unwrap();

        let first = store.get("HNF1B-demo-0001").await.unwrap().unwrap();
        assert!(first.has_variants);
        let third = store.get("HNF1B-demo-0003").await.unwrap().unwrap();
        assert_eq!(third.sex, "UNKNOWN_SEX");
        assert!(!third.has_variants);
    }
}
