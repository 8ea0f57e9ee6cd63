use std::fmt::Debug;

use async_trait::async_trait;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use thiserror::Error;

use crate::{
    models::DbPhenopacket,
    query::{OrderKey, Predicate},
};

pub mod memory;
pub mod postgres;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not serve the request right now: unreachable, pool
    /// exhausted, statement timeout or a dropped connection.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Query Error: {0}")]
    Query(DieselError),

    #[error(transparent)]
    Internal(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl From<DieselError> for StoreError {
    fn from(err: DieselError) -> Self {
        match &err {
            DieselError::DatabaseError(
                DatabaseErrorKind::ClosedConnection | DatabaseErrorKind::SerializationFailure,
                _,
            )
            | DieselError::BrokenTransactionManager => StoreError::Unavailable(err.to_string()),
            DieselError::DatabaseError(_, info) if info.message().contains("statement timeout") => {
                StoreError::Unavailable(err.to_string())
            }
            _ => StoreError::Query(err),
        }
    }
}

#[async_trait]
pub trait Storage: PhenopacketStore + Send + Sync + 'static {
    async fn ping(&self) -> Result<(), StoreError>;
}

/// One ordered, limited fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub predicate: Predicate,
    pub order: Vec<OrderKey>,
    pub limit: u64,
    pub offset: u64,
}

#[async_trait]
pub trait PhenopacketStore {
    /// Look up a record by its phenopacket id.
    async fn get(&self, phenopacket_id: &str) -> Result<Option<DbPhenopacket>, StoreError>;

    async fn list(&self, query: &ListQuery) -> Result<Vec<DbPhenopacket>, StoreError>;

    /// The page selected by `query` together with the number of records
    /// matching its predicate, both read from the same snapshot.
    async fn list_with_count(
        &self,
        query: &ListQuery,
    ) -> Result<(Vec<DbPhenopacket>, u64), StoreError>;
}
