use hnf1b_common::{
    error::PageError,
    params::{PAGE_AFTER, PAGE_BEFORE, PAGE_NUMBER, PAGE_SIZE},
    views::{
        CursorPageInfo, OffsetPageInfo, Page, PageInfo, PageLinks, PageMeta, Phenopacket,
    },
};

use super::{CursorPage, OffsetPage};
use crate::{models::DbPhenopacket, query::CompiledQuery};

const PAGE_PREFIX: &str = "page[";

/// The request a page is being built for: its path and raw query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkContext {
    path: String,
    raw_query: String,

    /// Decoded query pairs, in request order.
    params: Vec<(String, String)>,

    /// Raw `key=value` segments of every non-pagination parameter.
    kept: Vec<String>,
}

impl LinkContext {
    pub fn new(path: impl Into<String>, raw_query: Option<&str>) -> Result<Self, PageError> {
        let raw_query = raw_query.unwrap_or_default().to_string();
        let mut params = Vec::new();
        let mut kept = Vec::new();

        for segment in raw_query.split('&').filter(|s| !s.is_empty()) {
            let decoded: Vec<(String, String)> = serde_urlencoded::from_str(segment)
                .map_err(|e| PageError::invalid_params(format!("malformed query string: {e}")))?;
            let Some((key, value)) = decoded.into_iter().next() else {
                continue;
            };
            if !key.starts_with(PAGE_PREFIX) {
                kept.push(segment.to_string());
            }
            params.push((key, value));
        }

        Ok(Self {
            path: path.into(),
            raw_query,
            params,
            kept,
        })
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn self_link(&self) -> String {
        if self.raw_query.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, self.raw_query)
        }
    }

    /// A link to another page of the same query: non-page parameters are
    /// carried over untouched, `page[...]` is replaced.
    fn link(&self, size: u64, key: &str, value: &str) -> String {
        let mut segments = self.kept.clone();
        segments.push(format!("{PAGE_SIZE}={size}"));
        segments.push(format!("{key}={value}"));
        format!("{}?{}", self.path, segments.join("&"))
    }
}

fn resources(records: Vec<DbPhenopacket>) -> Vec<hnf1b_common::views::Resource<Phenopacket>> {
    records
        .into_iter()
        .map(DbPhenopacket::into_resource)
        .collect()
}

pub fn offset_page(ctx: &LinkContext, page: OffsetPage, number: u64, size: u64) -> Page<Phenopacket> {
    let total_pages = page.total.div_ceil(size.max(1));
    let number_link = |n: u64| ctx.link(size, PAGE_NUMBER, &n.to_string());

    Page {
        data: resources(page.records),
        meta: PageMeta {
            page: PageInfo::Offset(OffsetPageInfo {
                current_page: number,
                page_size: size,
                total_pages,
                total_records: page.total,
            }),
        },
        links: PageLinks {
            self_: ctx.self_link(),
            first: number_link(1),
            prev: (number > 1).then(|| number_link(number - 1)),
            next: (number < total_pages).then(|| number_link(number + 1)),
            last: Some(number_link(total_pages.max(1))),
        },
    }
}

pub fn cursor_page(
    ctx: &LinkContext,
    compiled: &CompiledQuery,
    page: CursorPage,
    size: u64,
) -> Page<Phenopacket> {
    let start_cursor = page.records.first().and_then(|r| compiled.cursor_for(r));
    let end_cursor = page.records.last().and_then(|r| compiled.cursor_for(r));

    // An empty page only happens when the request ran off one end, so the
    // opposite end is exactly where navigation should resume.
    let next = page.has_next.then(|| match &end_cursor {
        Some(cursor) => ctx.link(size, PAGE_AFTER, cursor),
        None => ctx.link(size, PAGE_AFTER, ""),
    });
    let prev = page.has_prev.then(|| match &start_cursor {
        Some(cursor) => ctx.link(size, PAGE_BEFORE, cursor),
        None => ctx.link(size, PAGE_BEFORE, ""),
    });

    Page {
        data: resources(page.records),
        meta: PageMeta {
            page: PageInfo::Cursor(CursorPageInfo {
                page_size: size,
                has_next_page: page.has_next,
                has_previous_page: page.has_prev,
                start_cursor,
                end_cursor,
            }),
        },
        links: PageLinks {
            self_: ctx.self_link(),
            first: ctx.link(size, PAGE_AFTER, ""),
            prev,
            next,
            last: None,
        },
    }
}
