//! HNF1B phenopacket API service.
//!
//! Serves phenopackets over a JSON:API list endpoint with offset and cursor
//! pagination, filtering and sorting. See [`config::Hnf1bApiConfig`] for
//! configuration options.

pub mod config;
pub mod server;

pub(crate) mod context;
pub(crate) mod error;
pub(crate) mod handlers;
