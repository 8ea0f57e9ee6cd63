use hnf1b_common::params::CursorPosition;
use tracing::instrument;

use crate::{
    models::DbPhenopacket,
    query::{CompiledQuery, OrderKey, Predicate, keyset},
    storage::{ListQuery, PhenopacketStore, StoreError},
};

use super::PaginateError;

#[derive(Debug, Clone, PartialEq)]
pub struct OffsetPage {
    pub records: Vec<DbPhenopacket>,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CursorPage {
    pub records: Vec<DbPhenopacket>,
    pub has_next: bool,
    pub has_prev: bool,
}

/// Fetch page `number` of `size` records together with the total count.
#[instrument(skip(store, compiled))]
pub async fn fetch_offset<S>(
    store: &S,
    compiled: &CompiledQuery,
    number: u64,
    size: u64,
) -> Result<OffsetPage, StoreError>
where
    S: PhenopacketStore + Sync + ?Sized,
{
    let query = ListQuery {
        predicate: compiled.predicate.clone(),
        order: compiled.order.clone(),
        limit: size,
        offset: number.saturating_sub(1).saturating_mul(size),
    };

    let (records, total) = store.list_with_count(&query).await?;
    Ok(OffsetPage { records, total })
}

/// Fetch `size` records on one side of a cursor boundary.
///
/// One extra row is requested to learn whether more records exist in the
/// direction of travel; no count is issued.
#[instrument(skip(store, compiled))]
pub async fn fetch_cursor<S>(
    store: &S,
    compiled: &CompiledQuery,
    position: &CursorPosition,
    size: u64,
) -> Result<CursorPage, PaginateError>
where
    S: PhenopacketStore + Sync + ?Sized,
{
    let boundary = position
        .token()
        .map(|token| compiled.boundary(token))
        .transpose()?;

    let (seek, order, backwards) = match (position, &boundary) {
        (CursorPosition::After(_), Some(keys)) => {
            (keyset::after(&compiled.order, keys), compiled.order.clone(), false)
        }
        (CursorPosition::After(_), None) => (Predicate::True, compiled.order.clone(), false),
        (CursorPosition::Before(_), Some(keys)) => {
            (keyset::before(&compiled.order, keys), reversed(&compiled.order), true)
        }
        (CursorPosition::Before(_), None) => (Predicate::True, reversed(&compiled.order), true),
    };

    let query = ListQuery {
        predicate: Predicate::and(vec![compiled.predicate.clone(), seek]),
        order,
        limit: size.saturating_add(1),
        offset: 0,
    };

    let mut records = store.list(&query).await?;
    let more = records.len() as u64 > size;
    records.truncate(usize::try_from(size).unwrap_or(usize::MAX));

    let from_token = boundary.is_some();
    if backwards {
        records.reverse();
        Ok(CursorPage {
            records,
            has_next: from_token,
            has_prev: more,
        })
    } else {
        Ok(CursorPage {
            records,
            has_next: more,
            has_prev: from_token,
        })
    }
}

fn reversed(order: &[OrderKey]) -> Vec<OrderKey> {
    order.iter().map(OrderKey::reversed).collect()
}

