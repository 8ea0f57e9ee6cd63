use std::time::Duration;

use async_trait::async_trait;
use diesel::{
    QueryableByName,
    pg::Pg,
    query_builder::{BoxedSqlQuery, SqlQuery},
    sql_query,
    sql_types::{BigInt, Bool, Text, Timestamptz},
};
use diesel_async::{
    AsyncPgConnection, RunQueryDsl, SimpleAsyncConnection,
    pooled_connection::{
        AsyncDieselConnectionManager,
        bb8::{Pool, PooledConnection},
    },
    scoped_futures::ScopedFutureExt,
};
use hnf1b_common::value::FieldValue;
use tracing::instrument;

use crate::{
    models::{DbPhenopacket, PHENOPACKET_COLUMNS, PHENOPACKETS_TABLE},
    query::{
        CmpOp, FieldTarget, Predicate,
        render::{Bind, SqlStatement, render_count, render_select},
    },
    storage::{ListQuery, PhenopacketStore, StoreError, Storage},
};

#[derive(QueryableByName)]
struct CountRow {
    #[diesel(sql_type = BigInt)]
    total: i64,
}

/// Phenopacket storage on PostgreSQL.
///
/// Every list call runs in a read-only REPEATABLE READ transaction with a
/// local statement timeout, so the page and its count see the same data.
pub struct PgStore {
    pool: Pool<AsyncPgConnection>,
    statement_timeout: Duration,
}

impl std::fmt::Debug for PgStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgStore")
            .field("statement_timeout", &self.statement_timeout)
            .finish_non_exhaustive()
    }
}

impl PgStore {
    pub async fn connect(
        url: &str,
        pool_size: u32,
        pool_timeout: Duration,
        statement_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(url);
        let pool = Pool::builder()
            .max_size(pool_size)
            .connection_timeout(pool_timeout)
            .build(manager)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        tracing::info!(pool_size, ?pool_timeout, ?statement_timeout, "Connected to PostgreSQL");
        Ok(Self {
            pool,
            statement_timeout,
        })
    }

    async fn conn(&self) -> Result<PooledConnection<'_, AsyncPgConnection>, StoreError> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    fn set_timeout(&self) -> String {
        format!(
            "SET LOCAL statement_timeout = {}",
            self.statement_timeout.as_millis()
        )
    }
}

fn bind_all<'f>(
    mut query: BoxedSqlQuery<'f, Pg, SqlQuery>,
    binds: &[Bind],
) -> BoxedSqlQuery<'f, Pg, SqlQuery> {
    for bind in binds {
        query = match bind.clone() {
            Bind::Int(v) => query.bind::<BigInt, _>(v),
            Bind::Value(FieldValue::Text(v)) => query.bind::<Text, _>(v),
            Bind::Value(FieldValue::Bool(v)) => query.bind::<Bool, _>(v),
            Bind::Value(FieldValue::Timestamp(v)) => query.bind::<Timestamptz, _>(v),
            Bind::Value(FieldValue::Uuid(v)) => query.bind::<diesel::sql_types::Uuid, _>(v),
        };
    }
    query
}

async fn load_rows(
    conn: &mut AsyncPgConnection,
    stmt: &SqlStatement,
) -> Result<Vec<DbPhenopacket>, StoreError> {
    tracing::debug!(sql = %stmt.sql, binds = stmt.binds.len(), "Loading phenopackets");
    let query = bind_all(sql_query(stmt.sql.clone()).into_boxed(), &stmt.binds);
    Ok(query.load::<DbPhenopacket>(conn).await?)
}

async fn count_rows(conn: &mut AsyncPgConnection, stmt: &SqlStatement) -> Result<u64, StoreError> {
    tracing::debug!(sql = %stmt.sql, binds = stmt.binds.len(), "Counting phenopackets");
    let query = bind_all(sql_query(stmt.sql.clone()).into_boxed(), &stmt.binds);
    let row = query.get_result::<CountRow>(conn).await?;
    Ok(row.total.max(0) as u64)
}

fn select(query: &ListQuery) -> SqlStatement {
    render_select(
        PHENOPACKETS_TABLE,
        PHENOPACKET_COLUMNS,
        &query.predicate,
        &query.order,
        i64::try_from(query.limit).unwrap_or(i64::MAX),
        i64::try_from(query.offset).unwrap_or(i64::MAX),
    )
}

#[async_trait]
impl PhenopacketStore for PgStore {
    #[instrument(skip(self))]
    async fn get(&self, phenopacket_id: &str) -> Result<Option<DbPhenopacket>, StoreError> {
        let stmt = render_select(
            PHENOPACKETS_TABLE,
            PHENOPACKET_COLUMNS,
            &Predicate::Compare {
                target: FieldTarget::Column("phenopacket_id"),
                op: CmpOp::Eq,
                value: FieldValue::Text(phenopacket_id.to_string()),
            },
            &[],
            1,
            0,
        );

        let mut conn = self.conn().await?;
        let rows = load_rows(&mut conn, &stmt).await?;
        Ok(rows.into_iter().next())
    }

    #[instrument(skip_all, fields(limit = query.limit, offset = query.offset))]
    async fn list(&self, query: &ListQuery) -> Result<Vec<DbPhenopacket>, StoreError> {
        let page = select(query);
        let set_timeout = self.set_timeout();
        let (page, set_timeout) = (&page, &set_timeout);

        let mut conn = self.conn().await?;
        conn.build_transaction()
            .repeatable_read()
            .read_only()
            .run(|conn| {
                async move {
                    conn.batch_execute(set_timeout).await?;
                    load_rows(conn, page).await
                }
                .scope_boxed()
            })
            .await
    }

    #[instrument(skip_all, fields(limit = query.limit, offset = query.offset))]
    async fn list_with_count(
        &self,
        query: &ListQuery,
    ) -> Result<(Vec<DbPhenopacket>, u64), StoreError> {
        let page = select(query);
        let count = render_count(PHENOPACKETS_TABLE, &query.predicate);
        let set_timeout = self.set_timeout();
        let (page, count, set_timeout) = (&page, &count, &set_timeout);

        let mut conn = self.conn().await?;
        conn.build_transaction()
            .repeatable_read()
            .read_only()
            .run(|conn| {
                async move {
                    conn.batch_execute(set_timeout).await?;
                    let records = load_rows(conn, page).await?;
                    let total = count_rows(conn, count).await?;
                    Ok((records, total))
                }
                .scope_boxed()
            })
            .await
    }
}

#[async_trait]
impl Storage for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn().await?;
        conn.batch_execute("SELECT 1").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use diesel::sql_types::Jsonb;
    use hnf1b_common::params::SortParam;
    use serde_json::json;
    use uuid::Uuid;

    use super::*;
    use crate::query::{FieldRegistry, RecordFields, keyset};

    const SCHEMA: &str = include_str!("../../schema/phenopackets.sql");

    async fn store() -> Option<PgStore> {
        let url = std::env::var("HNF1B_API_DATABASE_URL").ok()?;
        let store = PgStore::connect(&url, 2, Duration::from_secs(5), Duration::from_secs(5))
            .await
            .unwrap();
        store.conn().await.unwrap().batch_execute(SCHEMA).await.unwrap();
        Some(store)
    }

    fn record(subject: &str, n: u32) -> DbPhenopacket {
        let mut r = DbPhenopacket::from_document(json!({
            "id": format!("{subject}-{n}"),
            "subject": { "id": subject, "sex": if n % 2 == 0 { "FEMALE" } else { "MALE" } },
        }))
        .unwrap();
        // Two records share each timestamp so the id tiebreak is exercised.
        r.created_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
            + chrono::Duration::hours((n / 2).into());
        r.updated_at = r.created_at;
        r.has_variants = n % 3 == 0;
        r
    }

    async fn insert(store: &PgStore, r: &DbPhenopacket) {
        let mut conn = store.conn().await.unwrap();
        sql_query(
            "INSERT INTO phenopackets (id, phenopacket_id, subject_id, sex, has_variants, \
             created_at, updated_at, document) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind::<diesel::sql_types::Uuid, _>(r.id)
        .bind::<Text, _>(r.phenopacket_id.clone())
        .bind::<Text, _>(r.subject_id.clone())
        .bind::<Text, _>(r.sex.clone())
        .bind::<Bool, _>(r.has_variants)
        .bind::<Timestamptz, _>(r.created_at)
        .bind::<Timestamptz, _>(r.updated_at)
        .bind::<Jsonb, _>(r.document.clone())
        .execute(&mut *conn)
        .await
        .unwrap();
    }

    async fn cleanup(store: &PgStore, subject: &str) {
        let mut conn = store.conn().await.unwrap();
        sql_query("DELETE FROM phenopackets WHERE subject_id = $1")
            .bind::<Text, _>(subject.to_string())
            .execute(&mut *conn)
            .await
            .unwrap();
    }

    fn ids(records: &[DbPhenopacket]) -> Vec<&str> {
        records.iter().map(|r| r.phenopacket_id.as_str()).collect()
    }

    #[tokio::test]
    #[ignore = "needs a PostgreSQL database in HNF1B_API_DATABASE_URL"]
    async fn lists_pages_counts_and_seeks_against_postgres() {
        let Some(store) = store().await else {
            return;
        };
        store.ping().await.unwrap();

        let subject = format!("pgtest-{}", Uuid::new_v4());
        let records: Vec<_> = (0..6).map(|n| record(&subject, n)).collect();
        for r in &records {
            insert(&store, r).await;
        }

        let registry = FieldRegistry::phenopackets().unwrap();
        let sort = SortParam::parse_list("-created_at").unwrap();
        let compiled = registry.compile(&[], &sort).unwrap();
        let same_subject = Predicate::Compare {
            target: FieldTarget::Column("subject_id"),
            op: CmpOp::Eq,
            value: FieldValue::Text(subject.clone()),
        };

        let mut expected = records.clone();
        expected.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        let expected_ids = ids(&expected);

        let (page, total) = store
            .list_with_count(&ListQuery {
                predicate: same_subject.clone(),
                order: compiled.order.clone(),
                limit: 2,
                offset: 1,
            })
            .await
            .unwrap();
        assert_eq!(total, 6);
        assert_eq!(ids(&page), expected_ids[1..3].to_vec());

        // Timestamp and UUID binds on the keyset seek.
        let boundary: Vec<FieldValue> = compiled
            .order
            .iter()
            .map(|key| expected[2].field(&key.target).unwrap())
            .collect();
        let rest = store
            .list(&ListQuery {
                predicate: Predicate::and(vec![
                    same_subject.clone(),
                    keyset::after(&compiled.order, &boundary),
                ]),
                order: compiled.order.clone(),
                limit: 10,
                offset: 0,
            })
            .await
            .unwrap();
        assert_eq!(ids(&rest), expected_ids[3..].to_vec());

        // Bool bind.
        let (with_variants, total) = store
            .list_with_count(&ListQuery {
                predicate: Predicate::and(vec![
                    same_subject,
                    Predicate::Compare {
                        target: FieldTarget::Column("has_variants"),
                        op: CmpOp::Eq,
                        value: FieldValue::Bool(true),
                    },
                ]),
                order: compiled.order.clone(),
                limit: 10,
                offset: 0,
            })
            .await
            .unwrap();
        assert_eq!(total, 2);
        assert!(with_variants.iter().all(|r| r.has_variants));

        let fetched = store.get(&records[0].phenopacket_id).await.unwrap().unwrap();
        assert_eq!(fetched, records[0]);

        cleanup(&store, &subject).await;
    }
}
