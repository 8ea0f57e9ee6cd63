//! Shared types for the HNF1B phenopacket service.
//!
//! Holds everything that is independent of storage: request parameter
//! parsing and pagination mode selection ([`params`]), the opaque cursor
//! codec ([`cursor`]), typed field values ([`value`]) and the JSON:API
//! response views ([`views`]).

pub mod cursor;
pub mod error;
pub mod params;
pub mod value;
pub mod views;
