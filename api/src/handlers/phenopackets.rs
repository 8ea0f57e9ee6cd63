use axum::{
    Json,
    extract::{OriginalUri, Path, RawQuery, State},
};
use hnf1b_common::views::{Document, Page, Phenopacket};

use crate::{context::ApiContext, error::ApiError};

/// List phenopackets, one page at a time.
///
/// Offset mode (`page[number]`) reports totals. Cursor mode (`page[after]` /
/// `page[before]`) skips the count and stays stable while records are
/// written.
#[utoipa::path(
    get,
    path = "/api/v2/phenopackets",
    tags = ["phenopackets"],
    params(
        ("page[number]" = Option<u64>, Query, description = "1-based page number (offset mode)"),
        ("page[size]" = Option<u64>, Query, description = "Records per page, clamped to the configured maximum"),
        ("page[after]" = Option<String>, Query, description = "Cursor; return records after it. Empty starts at the first record"),
        ("page[before]" = Option<String>, Query, description = "Cursor; return records before it. Empty starts at the last record"),
        ("sort" = Option<String>, Query, description = "Comma-separated sort fields, `-` prefix for descending"),
        ("filter[field]" = Option<String>, Query, description = "Filter on a whitelisted field; `filter[field][op]` selects an operator"),
    ),
    responses((status = 200, description = "A page of phenopackets", body = Page<Phenopacket>))
)]
pub async fn list_phenopackets(
    State(ctx): State<ApiContext>,
    OriginalUri(uri): OriginalUri,
    RawQuery(query): RawQuery,
) -> Result<Json<Page<Phenopacket>>, ApiError> {
    let page = ctx
        .paginator
        .paginate(&*ctx.db, uri.path(), query.as_deref())
        .await?;

    Ok(Json(page))
}

#[utoipa::path(
    get,
    path = "/api/v2/phenopackets/{id}",
    tags = ["phenopackets"],
    params(("id" = String, Path, description = "Phenopacket id")),
    responses((status = 200, description = "Resolved phenopacket", body = Document<Phenopacket>))
)]
pub async fn get_phenopacket(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<Document<Phenopacket>>, ApiError> {
    let record = ctx.db.get(&id).await?.ok_or_else(ApiError::not_found)?;

    Ok(Json(Document {
        data: record.into_resource(),
    }))
}
