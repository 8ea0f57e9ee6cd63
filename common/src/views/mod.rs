//! Output views for the list and lookup endpoints.
//!
//! Responses follow the JSON:API document layout: a `data` member holding
//! resource objects, `meta.page` describing the page and `links` for
//! navigation.

use std::fmt::Debug;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

mod phenopacket;
pub use phenopacket::*;

/// A JSON:API resource object.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct Resource<T> {
    #[serde(rename = "type")]
    pub kind: String,

    pub id: String,

    pub attributes: T,
}

/// A single-resource document, returned by lookups.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct Document<T> {
    pub data: Resource<T>,
}

/// A page of resources with its pagination metadata and navigation links.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct Page<T> {
    pub data: Vec<Resource<T>>,
    pub meta: PageMeta,
    pub links: PageLinks,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
pub struct PageMeta {
    pub page: PageInfo,
}

/// Mode-dependent page description. Offset pages carry totals; cursor pages
/// carry boundary cursors instead, since they never run a full count.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
#[serde(untagged)]
pub enum PageInfo {
    Offset(OffsetPageInfo),
    Cursor(CursorPageInfo),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OffsetPageInfo {
    pub current_page: u64,
    pub page_size: u64,
    pub total_pages: u64,
    pub total_records: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CursorPageInfo {
    pub page_size: u64,
    pub has_next_page: bool,
    pub has_previous_page: bool,

    /// Cursor of the first record on this page, usable as `page[before]`.
    pub start_cursor: Option<String>,

    /// Cursor of the last record on this page, usable as `page[after]`.
    pub end_cursor: Option<String>,
}

/// Navigation links. Absent links are serialized as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
pub struct PageLinks {
    #[serde(rename = "self")]
    pub self_: String,
    pub first: String,
    pub prev: Option<String>,
    pub next: Option<String>,
    pub last: Option<String>,
}

/// An error response for an API endpoint. This is used to return errors to the
/// client in a consistent format.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct ApiErrorResponse {
    /// The error kind, e.g. `UnknownFilterField` or `StorageUnavailable`.
    pub error: String,

    /// A human-readable message describing the error that occurred.
    pub detail: String,
}
