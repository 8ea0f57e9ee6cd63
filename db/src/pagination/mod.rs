//! The dual-mode pagination engine.
//!
//! [`Paginator::paginate`] takes a raw query string through the whole
//! pipeline: mode routing, filter/sort compilation, cursor validation,
//! storage and response assembly. Everything up to the storage call is
//! synchronous and fails fast, so a rejected request never reaches storage.

use hnf1b_common::{
    error::PageError,
    params::{PageLimits, PageMode, PageRequest},
    views::{Page, Phenopacket},
};
use thiserror::Error;
use tracing::instrument;

use crate::{
    query::FieldRegistry,
    storage::{PhenopacketStore, StoreError},
};

mod assemble;
mod execute;

pub use assemble::*;
pub use execute::*;

#[derive(Debug, Error)]
pub enum PaginateError {
    #[error(transparent)]
    Request(#[from] PageError),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub struct Paginator {
    registry: FieldRegistry,
    limits: PageLimits,
}

impl Paginator {
    pub fn new(registry: FieldRegistry, limits: PageLimits) -> Self {
        Self { registry, limits }
    }

    #[instrument(skip(self, store))]
    pub async fn paginate<S>(
        &self,
        store: &S,
        path: &str,
        raw_query: Option<&str>,
    ) -> Result<Page<Phenopacket>, PaginateError>
    where
        S: PhenopacketStore + Sync + ?Sized,
    {
        let ctx = LinkContext::new(path, raw_query)?;
        let request = PageRequest::from_query(ctx.params(), &self.limits)?;
        let compiled = self.registry.compile(&request.filters, &request.sort)?;

        tracing::debug!(
            mode = ?request.mode,
            size = request.size,
            fingerprint = %compiled.fingerprint,
            "Compiled list request"
        );

        match &request.mode {
            PageMode::Offset { number } => {
                let page = fetch_offset(store, &compiled, *number, request.size).await?;
                Ok(offset_page(&ctx, page, *number, request.size))
            }
            PageMode::Cursor(position) => {
                let page = fetch_cursor(store, &compiled, position, request.size).await?;
                Ok(cursor_page(&ctx, &compiled, page, request.size))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::{Duration, TimeZone, Utc};
    use hnf1b_common::{
        cursor::Cursor,
        value::FieldValue,
        views::{CursorPageInfo, OffsetPageInfo, PageInfo},
    };
    use serde_json::json;

    use super::*;
    use crate::{models::DbPhenopacket, storage::memory::MemoryStore};

    const PATH: &str = "/api/v2/phenopackets";

    fn record(n: u32) -> DbPhenopacket {
        let sex = if n % 2 == 0 { "FEMALE" } else { "MALE" };
        let mut r = DbPhenopacket::from_document(json!({
            "id": format!("PP-{n:04}"),
            "subject": { "id": format!("S-{n:04}"), "sex": sex },
        }))
        .unwrap();
        r.created_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(n.into());
        r.updated_at = r.created_at;
        r
    }

    fn store(n: u32) -> MemoryStore {
        MemoryStore::new((1..=n).map(record).collect())
    }

    fn paginator() -> Paginator {
        Paginator::new(FieldRegistry::phenopackets().unwrap(), PageLimits::default())
    }

    async fn get(store: &MemoryStore, query: &str) -> Page<Phenopacket> {
        paginator().paginate(store, PATH, Some(query)).await.unwrap()
    }

    fn ids(page: &Page<Phenopacket>) -> Vec<String> {
        page.data.iter().map(|r| r.id.clone()).collect()
    }

    fn cursor_info(page: &Page<Phenopacket>) -> &CursorPageInfo {
        match &page.meta.page {
            PageInfo::Cursor(info) => info,
            other => panic!("expected cursor meta, got {other:?}"),
        }
    }

    fn query_of(link: &str) -> &str {
        link.split_once('?').map_or("", |(_, q)| q)
    }

    #[tokio::test]
    async fn empty_store_first_page() {
        let page = get(&store(0), "page[number]=1&page[size]=20").await;
        assert!(page.data.is_empty());
        assert_eq!(
            page.meta.page,
            PageInfo::Offset(OffsetPageInfo {
                current_page: 1,
                page_size: 20,
                total_pages: 0,
                total_records: 0,
            })
        );
        assert!(page.links.next.is_none());
    }

    #[tokio::test]
    async fn page_past_the_end_is_empty() {
        let page = get(&store(20), "page[number]=2&page[size]=20").await;
        assert!(page.data.is_empty());
        assert!(page.links.next.is_none());
        assert!(page.links.prev.is_some());
    }

    #[tokio::test]
    async fn cursor_mode_returns_everything_that_fits() {
        let page = get(&store(5), "page[after]=&page[size]=10").await;
        assert_eq!(page.data.len(), 5);

        let info = cursor_info(&page);
        assert!(!info.has_next_page);
        assert!(!info.has_previous_page);
        assert!(page.links.next.is_none());
        assert!(page.links.last.is_none());

        let end = Cursor::decode(info.end_cursor.as_deref().unwrap()).unwrap();
        let fifth = record(5);
        assert_eq!(end.keys[0], FieldValue::Timestamp(fifth.created_at));
    }

    #[tokio::test]
    async fn equal_timestamps_break_ties_by_subject() {
        let store = MemoryStore::default();
        let at = Utc.with_ymd_and_hms(2023, 5, 5, 5, 5, 5).unwrap();
        for (pp, subject) in [("PP-B", "S-2"), ("PP-A", "S-1"), ("PP-C", "S-0")] {
            let mut r = DbPhenopacket::from_document(json!({
                "id": pp,
                "subject": { "id": subject },
            }))
            .unwrap();
            r.created_at = if pp == "PP-C" { at - Duration::days(1) } else { at };
            store.insert(r).await;
        }

        let query = "sort=-created_at,subject_id";
        let first = get(&store, query).await;
        assert_eq!(ids(&first), vec!["PP-A", "PP-B", "PP-C"]);
        for _ in 0..3 {
            assert_eq!(ids(&get(&store, query).await), ids(&first));
        }
    }

    #[tokio::test]
    async fn offset_requests_are_idempotent() {
        let store = store(47);
        let query = "filter[sex]=MALE&sort=-created_at&page[number]=2&page[size]=7";
        let a = serde_json::to_vec(&get(&store, query).await).unwrap();
        let b = serde_json::to_vec(&get(&store, query).await).unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn page_size_is_clamped() {
        let store = store(1200);
        let page = get(&store, "page[size]=99999").await;
        assert_eq!(page.data.len(), 1000);

        let page = get(&store, "page[after]=&page[size]=99999").await;
        assert_eq!(page.data.len(), 1000);
        assert!(cursor_info(&page).has_next_page);

        let page = get(&store, "page[size]=99999999999999999999").await;
        assert_eq!(page.data.len(), 1000);
    }

    #[tokio::test]
    async fn rejected_requests_never_reach_storage() {
        let store = store(3);
        for query in [
            "filter[nonexistent_field]=x",
            "sort=bogus",
            "page[number]=0",
            "page[number]=1&page[after]=abc",
            "page[after]=not-a-cursor",
            "filter[sex]=ROBOT",
        ] {
            let err = paginator().paginate(&store, PATH, Some(query)).await.unwrap_err();
            assert!(matches!(err, PaginateError::Request(_)), "{query}: {err:?}");
        }
        assert_eq!(store.queries_issued(), 0);

        let err = paginator()
            .paginate(&store, PATH, Some("filter[nonexistent_field]=x"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PaginateError::Request(PageError::UnknownFilterField(ref f)) if f == "nonexistent_field"
        ));
    }

    #[tokio::test]
    async fn cursor_from_another_sort_is_rejected() {
        let store = store(10);
        let page = get(&store, "page[after]=&page[size]=3&sort=created_at").await;
        let cursor = cursor_info(&page).end_cursor.clone().unwrap();

        let err = paginator()
            .paginate(&store, PATH, Some(&format!("page[after]={cursor}&sort=-created_at")))
            .await
            .unwrap_err();
        assert!(matches!(err, PaginateError::Request(PageError::InvalidCursor(_))));
    }

    #[tokio::test]
    async fn links_preserve_filters_and_sort() {
        let store = store(30);
        let query = "filter[sex]=FEMALE&sort=-created_at&page[size]=4&page[number]=2";
        let page = get(&store, query).await;

        let links = [
            Some(page.links.first.clone()),
            page.links.prev.clone(),
            page.links.next.clone(),
            page.links.last.clone(),
        ];
        for link in links.into_iter().flatten() {
            let q = query_of(&link);
            assert!(q.starts_with("filter[sex]=FEMALE&sort=-created_at&"), "{link}");
        }

        let page = get(&store, "filter[sex]=FEMALE&sort=-created_at&page[after]=&page[size]=4").await;
        let next = page.links.next.clone().unwrap();
        assert!(query_of(&next).starts_with("filter[sex]=FEMALE&sort=-created_at&"));
        assert!(query_of(&page.links.first).starts_with("filter[sex]=FEMALE&sort=-created_at&"));
    }

    #[tokio::test]
    async fn walks_forward_and_back_with_cursors() {
        let store = store(10);
        let mut seen = Vec::new();
        let mut query = "page[after]=&page[size]=3".to_string();
        loop {
            let page = get(&store, &query).await;
            seen.extend(ids(&page));
            match page.links.next {
                Some(next) => query = query_of(&next).to_string(),
                None => break,
            }
        }
        let expected: Vec<String> = (1..=10).map(|n| format!("PP-{n:04}")).collect();
        assert_eq!(seen, expected);

        // From the end backwards.
        let last = get(&store, "page[before]=&page[size]=3").await;
        assert_eq!(ids(&last), vec!["PP-0008", "PP-0009", "PP-0010"]);
        let info = cursor_info(&last);
        assert!(info.has_previous_page);
        assert!(!info.has_next_page);

        let prev = get(&store, query_of(last.links.prev.as_deref().unwrap())).await;
        assert_eq!(ids(&prev), vec!["PP-0005", "PP-0006", "PP-0007"]);
        assert!(cursor_info(&prev).has_next_page);
    }

    #[tokio::test]
    async fn empty_cursor_page_links_back_to_data() {
        let store = store(4);
        let page = get(&store, "page[after]=&page[size]=4").await;
        let end = cursor_info(&page).end_cursor.clone().unwrap();

        let beyond = get(&store, &format!("page[after]={end}&page[size]=4")).await;
        assert!(beyond.data.is_empty());
        let prev = beyond.links.prev.clone().unwrap();
        assert!(prev.ends_with("page[before]="));
        assert_eq!(get(&store, query_of(&prev)).await.data.len(), 4);
    }

    #[tokio::test]
    async fn cursor_walk_is_stable_under_concurrent_writes() {
        let store = store(20);
        let first = get(&store, "page[after]=&page[size]=5").await;
        let boundary = record(5).created_at;
        let next = first.links.next.clone().unwrap();

        // Writes on both sides of the boundary, plus deletions of a returned
        // record and an unreturned one.
        let mut early = record(100);
        early.phenopacket_id = "PP-EARLY".into();
        early.created_at = boundary - Duration::seconds(30);
        store.insert(early).await;

        let mut late = record(101);
        late.phenopacket_id = "PP-LATE".into();
        late.created_at = boundary + Duration::seconds(30);
        store.insert(late).await;

        store.remove("PP-0005").await;
        store.remove("PP-0009").await;

        let mut seen = HashSet::new();
        let mut query = query_of(&next).to_string();
        loop {
            let page = get(&store, &query).await;
            for id in ids(&page) {
                assert!(seen.insert(id.clone()), "{id} returned twice");
            }
            match page.links.next {
                Some(next) => query = query_of(&next).to_string(),
                None => break,
            }
        }

        assert!(!seen.contains("PP-EARLY"));
        assert!(seen.contains("PP-LATE"));
        assert!(!seen.contains("PP-0009"));
        for n in [6, 7, 8, 10, 20] {
            assert!(seen.contains(&format!("PP-{n:04}")));
        }
        for n in 1..=5 {
            assert!(!seen.contains(&format!("PP-{n:04}")));
        }
    }
}
