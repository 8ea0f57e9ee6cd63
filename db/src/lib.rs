//! Storage and query engine for phenopacket records.
//!
//! - [`models`]: the stored record and its conversion to API views
//! - [`query`]: the field whitelist, the filter/sort compiler and SQL rendering
//! - [`storage`]: the store traits with PostgreSQL and in-memory backends
//! - [`pagination`]: the query executor and JSON:API response assembly

pub mod models;
pub mod pagination;
pub mod query;
pub mod storage;
